use std::io::Cursor;

use binrw::{BinRead, BinResult, BinWrite, binrw};
use serde::{Deserialize, Serialize};

use super::{EntityType, Location, ObjectHeader, read_string, write_fixed_string};

/// Size of the fixed name field.
pub const OBJECT_NAME_SIZE: usize = 0x34;

/// A positioned, named world entity. The binary form is the body of an object spawn packet.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameObject {
    pub header: ObjectHeader,
    #[serde(default)]
    pub location: Location,
    #[brw(pad_before = 2)]
    #[br(count = OBJECT_NAME_SIZE)]
    #[br(map = read_string)]
    #[bw(map = |name: &String| write_fixed_string(name, OBJECT_NAME_SIZE))]
    pub name: String,
    #[serde(default)]
    pub thing_flag: u32,
    #[br(temp)]
    #[bw(calc = things.len() as u32)]
    thing_count: u32,
    /// Type-specific values, opaque to the server.
    #[br(count = thing_count)]
    #[serde(default)]
    pub things: Vec<u32>,
}

impl GameObject {
    pub fn new(id: u64, name: &str, location: Location) -> Self {
        Self {
            header: ObjectHeader::new(id, EntityType::OBJECT),
            location,
            name: name.to_string(),
            thing_flag: 0,
            things: Vec::new(),
        }
    }

    /// Stands in for an object we have no data for.
    pub fn placeholder(id: u64) -> Self {
        Self::new(id, "Unknown", Location::default())
    }

    pub fn id(&self) -> u64 {
        self.header.id
    }

    /// Parses a captured object spawn packet, skipping its frame header.
    pub fn from_packet_bin(data: &[u8]) -> BinResult<Self> {
        let mut cursor = Cursor::new(data);
        cursor.set_position(8);
        GameObject::read_le(&mut cursor)
    }

    /// The body of the object spawn packet for this object.
    pub fn spawn_blob(&self) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_le(&mut cursor)
            .expect("writing to a Vec cannot fail");
        cursor.into_inner()
    }
}
