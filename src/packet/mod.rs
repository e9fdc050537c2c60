use bitflags::bitflags;

mod encryption;
pub use encryption::{
    KEY_BLOB_SIZE, KeyMaterial, KeyUnwrapper, PlainKeyUnwrapper, Rc4, StaticKeyUnwrapper,
};

mod frame;
pub use frame::{
    FRAME_HEADER_SIZE, Frame, FrameBuffer, FrameHeader, MAX_FRAME_SIZE, Overrun,
    RECEIVE_BUFFER_SIZE, build_frame,
};

mod reader;
pub use reader::PacketReader;

mod writer;
pub use writer::PacketWriter;

mod dump;
pub use dump::{Direction, PacketDump};

/// Identifies a frame by its (type, subtype) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Opcode {
    pub kind: u8,
    pub subtype: u8,
}

impl Opcode {
    pub const fn new(kind: u8, subtype: u8) -> Self {
        Self { kind, subtype }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#04X}:{:#04X}", self.kind, self.subtype)
    }
}

bitflags! {
    /// The primary flag byte of a frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PacketFlags: u8 {
        const PACKED = 0x04;
        const FLAG_10 = 0x10;
        const FULL_MOVEMENT = 0x20;
        const OBJECT_RELATED = 0x40;
    }
}
