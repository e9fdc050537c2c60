use crate::common::{Location, ObjectHeader, float_to_half, write_fixed_string};

/// Little-endian packet body builder.
#[derive(Debug, Default)]
pub struct PacketWriter {
    buffer: Vec<u8>,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_half(&mut self, value: f32) {
        self.write_u16(float_to_half(value));
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn write_zeros(&mut self, count: usize) {
        self.buffer.resize(self.buffer.len() + count, 0);
    }

    /// Offset 0x0 id, 0x8 entity type, 0xA unknown.
    pub fn write_header(&mut self, header: &ObjectHeader) {
        self.write_u64(header.id);
        self.write_u16(header.entity_type.0);
        self.write_u16(header.unknown);
    }

    /// Rotation x, y, z, w then position x, y, z, each as binary16.
    pub fn write_location(&mut self, location: &Location) {
        let rotation = location.rotation;
        let position = location.position;
        for value in [
            rotation.x, rotation.y, rotation.z, rotation.w, position.x, position.y, position.z,
        ] {
            self.write_half(value);
        }
    }

    /// Writes an obfuscated count as `(value + sub) ^ xor`.
    pub fn write_magic(&mut self, value: u32, xor: u32, sub: u32) {
        self.write_u32(value.wrapping_add(sub) ^ xor);
    }

    /// Writes `value` as exactly `size` bytes of NUL-padded ASCII.
    pub fn write_fixed_ascii(&mut self, value: &str, size: usize) {
        self.buffer.extend_from_slice(&write_fixed_string(value, size));
    }

    /// Writes `value` as exactly `length` NUL-padded UTF-16 code units.
    pub fn write_fixed_utf16(&mut self, value: &str, length: usize) {
        let mut units: Vec<u16> = value.encode_utf16().take(length).collect();
        units.resize(length, 0);
        for unit in units {
            self.write_u16(unit);
        }
    }

    /// Writes an ASCII string prefixed by its obfuscated length plus one, padded with
    /// `4 - (len % 4)` NUL bytes. An empty string is only the obfuscated zero.
    pub fn write_ascii(&mut self, value: &str, xor: u32, sub: u32) {
        if value.is_empty() {
            self.write_magic(0, xor, sub);
            return;
        }

        let length = value.len();
        self.write_magic(length as u32 + 1, xor, sub);
        self.write_fixed_ascii(value, length + 4 - (length & 3));
    }

    /// Writes a UTF-16 string prefixed by its obfuscated length including the terminator,
    /// padded to a multiple of four bytes.
    pub fn write_utf16(&mut self, value: &str, xor: u32, sub: u32) {
        let length = value.encode_utf16().count() + 1;
        self.write_magic(length as u32, xor, sub);
        self.write_fixed_utf16(value, length + (length & 1));
    }
}
