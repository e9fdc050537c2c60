use std::time::{SystemTime, UNIX_EPOCH};

use binrw::binrw;
use serde::{Deserialize, Serialize};

mod half;
pub use half::{float_to_half, half_to_float, read_half, write_half};

mod location;
pub use location::{Location, Position, Rotation};

mod object;
pub use object::{GameObject, OBJECT_NAME_SIZE};

/// The kind of entity an `ObjectHeader` refers to.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityType(pub u16);

impl EntityType {
    pub const PLAYER: EntityType = EntityType(4);
    pub const MAP: EntityType = EntityType(5);
    pub const OBJECT: EntityType = EntityType(6);
}

/// Identifies an entity on the wire. Always 12 bytes.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectHeader {
    pub id: u64,
    pub entity_type: EntityType,
    #[serde(default)]
    pub unknown: u16,
}

impl ObjectHeader {
    pub const SIZE: usize = 12;

    pub fn new(id: u64, entity_type: EntityType) -> Self {
        Self {
            id,
            entity_type,
            unknown: 0,
        }
    }
}

/// Reads a NUL-padded ASCII string.
pub(crate) fn read_string(byte_stream: Vec<u8>) -> String {
    let end = byte_stream
        .iter()
        .position(|b| *b == 0)
        .unwrap_or(byte_stream.len());
    String::from_utf8_lossy(&byte_stream[..end]).to_string()
}

/// Writes `value` into exactly `size` bytes, truncating or padding with NUL as needed.
pub(crate) fn write_fixed_string(value: &str, size: usize) -> Vec<u8> {
    let mut bytes: Vec<u8> = value.bytes().take(size).collect();
    bytes.resize(size, 0);
    bytes
}

/// Get the number of seconds since UNIX epoch.
pub fn timestamp_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Failed to get UNIX timestamp!")
        .as_secs() as u32
}

/// Get the number of milliseconds since UNIX epoch.
pub fn timestamp_msecs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Failed to get UNIX timestamp!")
        .as_millis() as u64
}

/// A uniquely named directory under the system temp dir, removed again on drop.
#[cfg(test)]
pub(crate) struct TempDir(std::path::PathBuf);

#[cfg(test)]
impl TempDir {
    pub fn new(prefix: &str) -> Self {
        let path = std::env::temp_dir().join(format!("{prefix}-{}", fastrand::u64(..)));
        std::fs::create_dir_all(&path).unwrap();
        Self(path)
    }

    pub fn path(&self) -> &std::path::Path {
        &self.0
    }
}

#[cfg(test)]
impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}
