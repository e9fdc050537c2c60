use std::io::Cursor;

use binrw::{BinRead, BinResult, BinWrite, binrw};
use bitflags::bitflags;

use crate::{
    common::{EntityType, ObjectHeader, Position, Rotation},
    packet::{PacketReader, PacketWriter},
};

bitflags! {
    /// Which fields follow in a packed movement update. Fields appear in bit order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MovementFlags: u32 {
        const ENTITY1_ID = 0x01;
        const ENTITY1_TYPE = 0x02;
        const ENTITY1_UNKNOWN = 0x04;
        const ENTITY2_ID = 0x08;
        const ENTITY2_TYPE = 0x10;
        const ENTITY2_UNKNOWN = 0x20;
        const TIMESTAMP = 0x40;
        const ROTATION_X = 0x80;
        const ROTATION_Y = 0x100;
        const ROTATION_Z = 0x200;
        const ROTATION_W = 0x400;
        const CURRENT_X = 0x800;
        const CURRENT_Y = 0x1000;
        const CURRENT_Z = 0x2000;
        const UNKNOWN1 = 0x4000;
        const UNKNOWN_X = 0x8000;
        const UNKNOWN_Y = 0x10000;
        const UNKNOWN_Z = 0x20000;
        const UNKNOWN2 = 0x40000;
        const UNKNOWN3 = 0x80000;
        /// Shrinks the `UNKNOWN3` field to a single byte. Carries no field of its own.
        const UNKNOWN4 = 0x100000;
    }
}

impl MovementFlags {
    /// Bytes of field data these flags announce, not counting the prefix.
    pub fn encoded_len(&self) -> usize {
        let mut size = 0;
        for (flag, width) in [
            (Self::ENTITY1_ID, 8),
            (Self::ENTITY1_TYPE, 2),
            (Self::ENTITY1_UNKNOWN, 2),
            (Self::ENTITY2_ID, 8),
            (Self::ENTITY2_TYPE, 2),
            (Self::ENTITY2_UNKNOWN, 2),
            (Self::TIMESTAMP, 4),
            (Self::ROTATION_X, 2),
            (Self::ROTATION_Y, 2),
            (Self::ROTATION_Z, 2),
            (Self::ROTATION_W, 2),
            (Self::CURRENT_X, 2),
            (Self::CURRENT_Y, 2),
            (Self::CURRENT_Z, 2),
            (Self::UNKNOWN1, 2),
            (Self::UNKNOWN_X, 2),
            (Self::UNKNOWN_Y, 2),
            (Self::UNKNOWN_Z, 2),
            (Self::UNKNOWN2, 2),
        ] {
            if self.contains(flag) {
                size += width;
            }
        }
        if self.contains(Self::UNKNOWN3) {
            size += if self.contains(Self::UNKNOWN4) { 1 } else { 4 };
        }
        size
    }
}

/// The complete movement record, as sent with the movement end opcode. Always 0x38 bytes.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FullMovementData {
    /// Offset 0x00.
    pub entity1: ObjectHeader,
    /// Offset 0x0C.
    pub entity2: ObjectHeader,
    /// Offset 0x18.
    pub timestamp: u32,
    /// Offset 0x1C.
    pub rotation: Rotation,
    /// Offset 0x24.
    pub current_position: Position,
    /// Offset 0x2A.
    pub unknown2: u16,
    /// Offset 0x2C.
    pub unknown_position: Position,
    /// Offset 0x32.
    pub unknown3: u16,
    /// Offset 0x34.
    pub unknown4: u32,
}

impl FullMovementData {
    pub const SIZE: usize = 0x38;

    pub fn read(payload: &[u8]) -> BinResult<Self> {
        Self::read_le(&mut Cursor::new(payload))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::with_capacity(Self::SIZE));
        self.write_le(&mut cursor)
            .expect("writing to a Vec cannot fail");
        cursor.into_inner()
    }
}

/// Bytes before the flag word of a packed movement update.
const PACKED_MOVEMENT_PADDING: usize = 6;

/// A decoded live movement update. Fields not announced by `flags` are left at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PackedMovement {
    pub flags: MovementFlags,
    pub data: FullMovementData,
    /// Bytes consumed from the payload, including the prefix.
    pub size: usize,
}

impl PackedMovement {
    /// Size of the padding and the 24-bit flag word.
    pub const PREFIX_SIZE: usize = PACKED_MOVEMENT_PADDING + 3;

    pub fn read(payload: &[u8]) -> BinResult<Self> {
        let mut reader = PacketReader::new(payload);
        reader.skip(PACKED_MOVEMENT_PADDING)?;

        let flags = MovementFlags::from_bits_retain(reader.read_u24()?);
        let mut data = FullMovementData::default();

        if flags.contains(MovementFlags::ENTITY1_ID) {
            data.entity1.id = reader.read_u64()?;
        }
        if flags.contains(MovementFlags::ENTITY1_TYPE) {
            data.entity1.entity_type = EntityType(reader.read_u16()?);
        }
        if flags.contains(MovementFlags::ENTITY1_UNKNOWN) {
            data.entity1.unknown = reader.read_u16()?;
        }
        if flags.contains(MovementFlags::ENTITY2_ID) {
            data.entity2.id = reader.read_u64()?;
        }
        if flags.contains(MovementFlags::ENTITY2_TYPE) {
            data.entity2.entity_type = EntityType(reader.read_u16()?);
        }
        if flags.contains(MovementFlags::ENTITY2_UNKNOWN) {
            data.entity2.unknown = reader.read_u16()?;
        }
        if flags.contains(MovementFlags::TIMESTAMP) {
            data.timestamp = reader.read_u32()?;
        }
        if flags.contains(MovementFlags::ROTATION_X) {
            data.rotation.x = reader.read_half()?;
        }
        if flags.contains(MovementFlags::ROTATION_Y) {
            data.rotation.y = reader.read_half()?;
        }
        if flags.contains(MovementFlags::ROTATION_Z) {
            data.rotation.z = reader.read_half()?;
        }
        if flags.contains(MovementFlags::ROTATION_W) {
            data.rotation.w = reader.read_half()?;
        }
        if flags.contains(MovementFlags::CURRENT_X) {
            data.current_position.x = reader.read_half()?;
        }
        if flags.contains(MovementFlags::CURRENT_Y) {
            data.current_position.y = reader.read_half()?;
        }
        if flags.contains(MovementFlags::CURRENT_Z) {
            data.current_position.z = reader.read_half()?;
        }
        if flags.contains(MovementFlags::UNKNOWN1) {
            data.unknown2 = reader.read_u16()?;
        }
        if flags.contains(MovementFlags::UNKNOWN_X) {
            data.unknown_position.x = reader.read_half()?;
        }
        if flags.contains(MovementFlags::UNKNOWN_Y) {
            data.unknown_position.y = reader.read_half()?;
        }
        if flags.contains(MovementFlags::UNKNOWN_Z) {
            data.unknown_position.z = reader.read_half()?;
        }
        if flags.contains(MovementFlags::UNKNOWN2) {
            data.unknown3 = reader.read_u16()?;
        }
        if flags.contains(MovementFlags::UNKNOWN3) {
            data.unknown4 = if flags.contains(MovementFlags::UNKNOWN4) {
                reader.read_u8()? as u32
            } else {
                reader.read_u32()?
            };
        }

        Ok(Self {
            flags,
            data,
            size: reader.position(),
        })
    }

    /// Writes the announced fields back out, mirroring `read`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let flags = self.flags;
        let data = &self.data;

        let mut writer = PacketWriter::new();
        writer.write_zeros(PACKED_MOVEMENT_PADDING);
        let bits = flags.bits();
        writer.write_bytes(&bits.to_le_bytes()[..3]);

        if flags.contains(MovementFlags::ENTITY1_ID) {
            writer.write_u64(data.entity1.id);
        }
        if flags.contains(MovementFlags::ENTITY1_TYPE) {
            writer.write_u16(data.entity1.entity_type.0);
        }
        if flags.contains(MovementFlags::ENTITY1_UNKNOWN) {
            writer.write_u16(data.entity1.unknown);
        }
        if flags.contains(MovementFlags::ENTITY2_ID) {
            writer.write_u64(data.entity2.id);
        }
        if flags.contains(MovementFlags::ENTITY2_TYPE) {
            writer.write_u16(data.entity2.entity_type.0);
        }
        if flags.contains(MovementFlags::ENTITY2_UNKNOWN) {
            writer.write_u16(data.entity2.unknown);
        }
        if flags.contains(MovementFlags::TIMESTAMP) {
            writer.write_u32(data.timestamp);
        }
        for (flag, value) in [
            (MovementFlags::ROTATION_X, data.rotation.x),
            (MovementFlags::ROTATION_Y, data.rotation.y),
            (MovementFlags::ROTATION_Z, data.rotation.z),
            (MovementFlags::ROTATION_W, data.rotation.w),
            (MovementFlags::CURRENT_X, data.current_position.x),
            (MovementFlags::CURRENT_Y, data.current_position.y),
            (MovementFlags::CURRENT_Z, data.current_position.z),
        ] {
            if flags.contains(flag) {
                writer.write_half(value);
            }
        }
        if flags.contains(MovementFlags::UNKNOWN1) {
            writer.write_u16(data.unknown2);
        }
        for (flag, value) in [
            (MovementFlags::UNKNOWN_X, data.unknown_position.x),
            (MovementFlags::UNKNOWN_Y, data.unknown_position.y),
            (MovementFlags::UNKNOWN_Z, data.unknown_position.z),
        ] {
            if flags.contains(flag) {
                writer.write_half(value);
            }
        }
        if flags.contains(MovementFlags::UNKNOWN2) {
            writer.write_u16(data.unknown3);
        }
        if flags.contains(MovementFlags::UNKNOWN3) {
            if flags.contains(MovementFlags::UNKNOWN4) {
                writer.write_u8(data.unknown4 as u8);
            } else {
                writer.write_u32(data.unknown4);
            }
        }

        writer.into_inner()
    }
}

/// A character performing an action such as sitting, sent with an obfuscated command name.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementAction {
    pub performer: ObjectHeader,
    pub pre_data: Vec<u8>,
    pub command: String,
    pub rest: Vec<u8>,
    pub things: Vec<u32>,
    pub final_data: Vec<u8>,
}

impl MovementAction {
    const PRE_DATA_SIZE: usize = 40;
    const READ_XOR: u32 = 0x922D;
    const READ_SUB: u32 = 0x45;
    const WRITE_XOR: u32 = 0x4315;
    const WRITE_SUB: u32 = 0x7A;

    pub fn read(payload: &[u8]) -> BinResult<Self> {
        let mut reader = PacketReader::new(payload);
        reader.skip(ObjectHeader::SIZE)?;

        let performer = reader.read_header()?;
        let pre_data = reader.read_bytes(Self::PRE_DATA_SIZE)?;
        let command = reader.read_ascii(Self::READ_XOR, Self::READ_SUB)?;
        let rest = reader.read_bytes(4)?;
        let thing_count = reader.read_magic(Self::READ_XOR, Self::READ_SUB)? as usize;
        // each thing takes four bytes, so a count that cannot fit is garbage
        if thing_count > reader.remaining() / 4 {
            return Err(binrw::Error::AssertFail {
                pos: reader.position() as u64,
                message: format!("{thing_count} things do not fit in the packet"),
            });
        }
        let mut things = Vec::with_capacity(thing_count);
        for _ in 0..thing_count {
            things.push(reader.read_u32()?);
        }
        let final_data = reader.read_bytes(4)?;

        Ok(Self {
            performer,
            pre_data,
            command,
            rest,
            things,
            final_data,
        })
    }

    /// The body relayed to other players, attributed to `sender`.
    pub fn build(&self, sender: ObjectHeader) -> Vec<u8> {
        let mut writer = PacketWriter::new();
        writer.write_header(&sender);
        writer.write_header(&self.performer);
        writer.write_bytes(&self.pre_data);
        writer.write_ascii(&self.command, Self::WRITE_XOR, Self::WRITE_SUB);
        writer.write_bytes(&self.rest);
        writer.write_magic(self.things.len() as u32, Self::WRITE_XOR, Self::WRITE_SUB);
        for thing in &self.things {
            writer.write_u32(*thing);
        }
        writer.write_bytes(&self.final_data);
        writer.into_inner()
    }
}

/// An update to an actor's current action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionUpdate {
    pub actor: ObjectHeader,
    pub data: Vec<u8>,
}

impl ActionUpdate {
    const DATA_SIZE: usize = 32;

    pub fn read(payload: &[u8]) -> BinResult<Self> {
        let mut reader = PacketReader::new(payload);
        reader.skip(ObjectHeader::SIZE)?;

        Ok(Self {
            actor: reader.read_header()?,
            data: reader.read_bytes(Self::DATA_SIZE)?,
        })
    }

    /// The body sent to the player owning `recipient`.
    pub fn build(&self, recipient: ObjectHeader) -> Vec<u8> {
        let mut writer = PacketWriter::new();
        writer.write_header(&recipient);
        writer.write_header(&self.actor);
        writer.write_bytes(&self.data);
        writer.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_record() -> FullMovementData {
        FullMovementData {
            entity1: ObjectHeader {
                id: 0x1111,
                entity_type: EntityType::PLAYER,
                unknown: 7,
            },
            entity2: ObjectHeader {
                id: 0x2222,
                entity_type: EntityType::OBJECT,
                unknown: 9,
            },
            timestamp: 0xCAFEBABE,
            rotation: Rotation {
                x: 0.0,
                y: 0.5,
                z: -0.25,
                w: 1.0,
            },
            current_position: Position {
                x: 100.0,
                y: -8.5,
                z: 33.0,
            },
            unknown2: 0x1234,
            unknown_position: Position {
                x: 99.0,
                y: -8.0,
                z: 32.5,
            },
            unknown3: 0x5678,
            unknown4: 0xAB,
        }
    }

    /// Keeps only the fields `flags` announce.
    fn masked(flags: MovementFlags) -> FullMovementData {
        let full = full_record();
        let mut data = FullMovementData::default();
        let pick = |flag: MovementFlags| flags.contains(flag);

        if pick(MovementFlags::ENTITY1_ID) {
            data.entity1.id = full.entity1.id;
        }
        if pick(MovementFlags::ENTITY1_TYPE) {
            data.entity1.entity_type = full.entity1.entity_type;
        }
        if pick(MovementFlags::ENTITY1_UNKNOWN) {
            data.entity1.unknown = full.entity1.unknown;
        }
        if pick(MovementFlags::ENTITY2_ID) {
            data.entity2.id = full.entity2.id;
        }
        if pick(MovementFlags::ENTITY2_TYPE) {
            data.entity2.entity_type = full.entity2.entity_type;
        }
        if pick(MovementFlags::ENTITY2_UNKNOWN) {
            data.entity2.unknown = full.entity2.unknown;
        }
        if pick(MovementFlags::TIMESTAMP) {
            data.timestamp = full.timestamp;
        }
        if pick(MovementFlags::ROTATION_X) {
            data.rotation.x = full.rotation.x;
        }
        if pick(MovementFlags::ROTATION_Y) {
            data.rotation.y = full.rotation.y;
        }
        if pick(MovementFlags::ROTATION_Z) {
            data.rotation.z = full.rotation.z;
        }
        if pick(MovementFlags::ROTATION_W) {
            data.rotation.w = full.rotation.w;
        }
        if pick(MovementFlags::CURRENT_X) {
            data.current_position.x = full.current_position.x;
        }
        if pick(MovementFlags::CURRENT_Y) {
            data.current_position.y = full.current_position.y;
        }
        if pick(MovementFlags::CURRENT_Z) {
            data.current_position.z = full.current_position.z;
        }
        if pick(MovementFlags::UNKNOWN1) {
            data.unknown2 = full.unknown2;
        }
        if pick(MovementFlags::UNKNOWN_X) {
            data.unknown_position.x = full.unknown_position.x;
        }
        if pick(MovementFlags::UNKNOWN_Y) {
            data.unknown_position.y = full.unknown_position.y;
        }
        if pick(MovementFlags::UNKNOWN_Z) {
            data.unknown_position.z = full.unknown_position.z;
        }
        if pick(MovementFlags::UNKNOWN2) {
            data.unknown3 = full.unknown3;
        }
        if pick(MovementFlags::UNKNOWN3) {
            data.unknown4 = full.unknown4;
        }
        data
    }

    #[test]
    fn test_full_record_layout() {
        let bytes = full_record().to_bytes();
        assert_eq!(bytes.len(), FullMovementData::SIZE);

        assert_eq!(&bytes[0x00..0x08], &0x1111u64.to_le_bytes());
        assert_eq!(&bytes[0x0C..0x14], &0x2222u64.to_le_bytes());
        assert_eq!(&bytes[0x18..0x1C], &0xCAFEBABEu32.to_le_bytes());
        // rotation y = 0.5
        assert_eq!(&bytes[0x1E..0x20], &[0x00, 0x38]);
        assert_eq!(&bytes[0x2A..0x2C], &0x1234u16.to_le_bytes());
        assert_eq!(&bytes[0x32..0x34], &0x5678u16.to_le_bytes());
        assert_eq!(&bytes[0x34..0x38], &0xABu32.to_le_bytes());

        assert_eq!(FullMovementData::read(&bytes).unwrap(), full_record());
        assert!(FullMovementData::read(&bytes[..0x37]).is_err());
    }

    #[test]
    fn test_subsets_consume_exactly() {
        let mut rng = fastrand::Rng::with_seed(0x0407);

        let mut subsets = vec![
            MovementFlags::empty(),
            MovementFlags::all(),
            MovementFlags::ROTATION_Y | MovementFlags::CURRENT_X | MovementFlags::CURRENT_Z,
            MovementFlags::UNKNOWN3,
            MovementFlags::UNKNOWN3 | MovementFlags::UNKNOWN4,
            MovementFlags::UNKNOWN4,
        ];
        for _ in 0..200 {
            subsets.push(MovementFlags::from_bits_truncate(rng.u32(..0x200000)));
        }

        for flags in subsets {
            let movement = PackedMovement {
                flags,
                data: masked(flags),
                size: PackedMovement::PREFIX_SIZE + flags.encoded_len(),
            };
            let mut payload = movement.to_bytes();
            assert_eq!(payload.len(), movement.size, "{flags:?}");

            // trailing bytes must be left alone
            payload.extend_from_slice(&[0xEE; 5]);
            let decoded = PackedMovement::read(&payload).unwrap();
            assert_eq!(decoded, movement, "{flags:?}");

            // and one byte short must fail instead of reading past the end
            if flags.encoded_len() > 0 {
                assert!(PackedMovement::read(&payload[..movement.size - 1]).is_err());
            }
        }
    }

    #[test]
    fn test_fields_follow_bit_order() {
        let mut payload = vec![0u8; 6];
        let flags = MovementFlags::TIMESTAMP | MovementFlags::ROTATION_W | MovementFlags::UNKNOWN2;
        payload.extend_from_slice(&flags.bits().to_le_bytes()[..3]);
        payload.extend_from_slice(&0x01020304u32.to_le_bytes());
        payload.extend_from_slice(&[0x00, 0x3C]);
        payload.extend_from_slice(&[0x99, 0x88]);

        let decoded = PackedMovement::read(&payload).unwrap();
        assert_eq!(decoded.data.timestamp, 0x01020304);
        assert_eq!(decoded.data.rotation.w, 1.0);
        assert_eq!(decoded.data.unknown3, 0x8899);
        assert_eq!(decoded.data.entity1, ObjectHeader::default());
        assert_eq!(decoded.data.current_position, Position::default());
        assert_eq!(decoded.size, payload.len());
    }

    #[test]
    fn test_entity2_is_kept_separate() {
        let flags = MovementFlags::ENTITY2_ID | MovementFlags::ENTITY2_TYPE;
        let movement = PackedMovement {
            flags,
            data: masked(flags),
            size: PackedMovement::PREFIX_SIZE + 10,
        };

        let decoded = PackedMovement::read(&movement.to_bytes()).unwrap();
        assert_eq!(decoded.data.entity1, ObjectHeader::default());
        assert_eq!(decoded.data.entity2.id, 0x2222);
        assert_eq!(decoded.data.entity2.entity_type, EntityType::OBJECT);
    }

    fn action_payload(command: &str, things: &[u32]) -> Vec<u8> {
        let mut writer = PacketWriter::new();
        writer.write_zeros(ObjectHeader::SIZE);
        writer.write_header(&ObjectHeader::new(5, EntityType::PLAYER));
        writer.write_bytes(&[0x11; 40]);
        writer.write_ascii(command, 0x922D, 0x45);
        writer.write_bytes(&[1, 2, 3, 4]);
        writer.write_magic(things.len() as u32, 0x922D, 0x45);
        for thing in things {
            writer.write_u32(*thing);
        }
        writer.write_bytes(&[5, 6, 7, 8]);
        writer.into_inner()
    }

    #[test]
    fn test_movement_action_reencodes() {
        let action = MovementAction::read(&action_payload("sit", &[10, 20])).unwrap();
        assert_eq!(action.performer.id, 5);
        assert_eq!(action.command, "sit");
        assert_eq!(action.things, [10, 20]);
        assert_eq!(action.final_data, [5, 6, 7, 8]);

        let sender = ObjectHeader::new(77, EntityType::PLAYER);
        let built = action.build(sender);

        let mut reader = PacketReader::new(&built);
        assert_eq!(reader.read_header().unwrap(), sender);
        assert_eq!(reader.read_header().unwrap().id, 5);
        assert_eq!(reader.read_bytes(40).unwrap(), [0x11; 40]);
        assert_eq!(reader.read_ascii(0x4315, 0x7A).unwrap(), "sit");
        assert_eq!(reader.read_bytes(4).unwrap(), [1, 2, 3, 4]);
        assert_eq!(reader.read_magic(0x4315, 0x7A).unwrap(), 2);
        assert_eq!(reader.read_u32().unwrap(), 10);
        assert_eq!(reader.read_u32().unwrap(), 20);
        assert_eq!(reader.read_bytes(4).unwrap(), [5, 6, 7, 8]);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_movement_action_rejects_garbage_count() {
        let mut payload = action_payload("sit", &[]);
        // overwrite the count with something enormous
        let count_offset = 12 + 12 + 40 + 8 + 4;
        payload[count_offset..count_offset + 4].copy_from_slice(&0x7FFF_FFFFu32.to_le_bytes());
        assert!(MovementAction::read(&payload).is_err());
    }

    #[test]
    fn test_action_update() {
        let mut payload = vec![0u8; 12];
        payload.extend_from_slice(&{
            let mut writer = PacketWriter::new();
            writer.write_header(&ObjectHeader::new(9, EntityType::PLAYER));
            writer.into_inner()
        });
        payload.extend_from_slice(&[0x42; 32]);

        let update = ActionUpdate::read(&payload).unwrap();
        let built = update.build(ObjectHeader::new(3, EntityType::PLAYER));
        assert_eq!(built.len(), 12 + 12 + 32);
        assert_eq!(&built[..8], &3u64.to_le_bytes());
        assert_eq!(&built[12..20], &9u64.to_le_bytes());
        assert_eq!(&built[24..], &[0x42; 32]);
    }
}
