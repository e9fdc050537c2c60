//! Bodies of the packets the server understands or sends.

use crate::{
    common::{EntityType, GameObject, Location, ObjectHeader},
    opcodes,
    packet::{Opcode, PacketFlags, PacketWriter},
};

mod movement;
pub use movement::{
    ActionUpdate, FullMovementData, MovementAction, MovementFlags, PackedMovement,
};

/// A packet the server can build and send.
pub trait ServerPacket {
    fn opcode(&self) -> Opcode;

    fn flags(&self) -> PacketFlags {
        PacketFlags::empty()
    }

    /// The payload, without the frame header.
    fn build(&self) -> Vec<u8>;
}

/// Sent unencrypted as soon as a connection is accepted.
#[derive(Debug, Clone, Copy)]
pub struct WelcomePacket;

impl ServerPacket for WelcomePacket {
    fn opcode(&self) -> Opcode {
        opcodes::server::WELCOME
    }

    fn build(&self) -> Vec<u8> {
        let mut writer = PacketWriter::new();
        writer.write_u16(3);
        writer.write_u16(201);
        writer.write_u16(0);
        writer.write_u16(0);
        writer.into_inner()
    }
}

/// Any packet whose opcode alone carries the meaning.
#[derive(Debug, Clone, Copy)]
pub struct NoPayloadPacket(pub Opcode);

impl ServerPacket for NoPayloadPacket {
    fn opcode(&self) -> Opcode {
        self.0
    }

    fn build(&self) -> Vec<u8> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MessageType {
    GoldenTicker = 0,
    AdminMessage = 1,
    AdminMessageInstant = 2,
    SystemMessage = 3,
    GenericMessage = 4,
}

#[derive(Debug, Clone)]
pub struct SystemMessagePacket {
    pub message: String,
    pub message_type: MessageType,
}

impl SystemMessagePacket {
    const XOR: u32 = 0x78F7;
    const SUB: u32 = 0xA2;

    pub fn new(message: &str, message_type: MessageType) -> Self {
        Self {
            message: message.to_string(),
            message_type,
        }
    }
}

impl ServerPacket for SystemMessagePacket {
    fn opcode(&self) -> Opcode {
        opcodes::server::SYSTEM_MESSAGE
    }

    fn flags(&self) -> PacketFlags {
        PacketFlags::PACKED
    }

    fn build(&self) -> Vec<u8> {
        let mut writer = PacketWriter::new();
        writer.write_utf16(&self.message, Self::XOR, Self::SUB);
        writer.write_u32(self.message_type as u32);
        writer.into_inner()
    }
}

/// Moves the client to `destination` through the teleporter object `source`.
#[derive(Debug, Clone, Copy)]
pub struct TeleportTransferPacket {
    pub source: ObjectHeader,
    pub destination: Location,
}

impl ServerPacket for TeleportTransferPacket {
    fn opcode(&self) -> Opcode {
        opcodes::server::TELEPORT_TRANSFER
    }

    fn flags(&self) -> PacketFlags {
        PacketFlags::OBJECT_RELATED
    }

    fn build(&self) -> Vec<u8> {
        let mut writer = PacketWriter::new();
        writer.write_zeros(ObjectHeader::SIZE);
        writer.write_header(&self.source);
        writer.write_location(&self.destination);
        writer.write_zeros(2);
        writer.into_inner()
    }
}

/// Makes a player character appear for the receiving client.
#[derive(Debug, Clone)]
pub struct CharacterSpawnPacket {
    pub player_id: u32,
    pub location: Location,
    pub name: String,
    pub nickname: String,
    /// Whether the receiving client controls this character.
    pub is_it_me: bool,
}

impl CharacterSpawnPacket {
    /// Appearance and class levels, sent zeroed.
    pub const APPEARANCE_SIZE: usize = 0x130;
    pub const SIZE: usize = 0x8C + Self::APPEARANCE_SIZE + 0xA8;
}

impl ServerPacket for CharacterSpawnPacket {
    fn opcode(&self) -> Opcode {
        opcodes::server::CHARACTER_SPAWN
    }

    fn build(&self) -> Vec<u8> {
        let mut writer = PacketWriter::new();
        writer.write_header(&ObjectHeader::new(self.player_id as u64, EntityType::PLAYER));
        writer.write_location(&self.location);
        writer.write_zeros(2);
        writer.write_fixed_ascii("Character", 32);

        writer.write_u16(1);
        writer.write_u16(0);
        writer.write_u32(602);
        writer.write_u32(1);
        writer.write_u32(53);
        writer.write_u32(0);
        writer.write_u32(if self.is_it_me { 47 } else { 39 });
        writer.write_u16(559);
        writer.write_u16(306);

        writer.write_u32(self.player_id);
        writer.write_zeros(12);
        writer.write_fixed_utf16(&self.name, 16);
        writer.write_zeros(4);
        writer.write_zeros(Self::APPEARANCE_SIZE);
        // title
        writer.write_fixed_utf16("", 32);
        writer.write_u32(0);
        writer.write_u32(0);
        writer.write_fixed_utf16(&self.nickname, 16);
        writer.write_zeros(64);
        writer.into_inner()
    }
}

pub struct ObjectSpawnPacket<'a>(pub &'a GameObject);

impl ServerPacket for ObjectSpawnPacket<'_> {
    fn opcode(&self) -> Opcode {
        opcodes::server::OBJECT_SPAWN
    }

    fn build(&self) -> Vec<u8> {
        self.0.spawn_blob()
    }
}
