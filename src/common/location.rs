use binrw::binrw;
use serde::{Deserialize, Serialize};

use super::{read_half, write_half};

/// A quaternion rotation, packed as four binary16 values on the wire.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    #[br(map = read_half)]
    #[bw(map = write_half)]
    pub x: f32,
    #[br(map = read_half)]
    #[bw(map = write_half)]
    pub y: f32,
    #[br(map = read_half)]
    #[bw(map = write_half)]
    pub z: f32,
    #[br(map = read_half)]
    #[bw(map = write_half)]
    pub w: f32,
}

/// A position, packed as three binary16 values on the wire.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[br(map = read_half)]
    #[bw(map = write_half)]
    pub x: f32,
    #[br(map = read_half)]
    #[bw(map = write_half)]
    pub y: f32,
    #[br(map = read_half)]
    #[bw(map = write_half)]
    pub z: f32,
}

/// A full pose: rotation first, then position. 14 bytes on the wire.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(default)]
    pub position: Position,
}

impl Location {
    pub const SIZE: usize = 14;

    pub fn new(rotation: Rotation, position: Position) -> Self {
        Self { rotation, position }
    }
}
