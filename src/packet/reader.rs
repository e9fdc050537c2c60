use std::io::{Cursor, ErrorKind};

use binrw::{BinRead, BinResult};

use crate::common::{Location, ObjectHeader, half_to_float, read_string};

fn eof(pos: u64) -> binrw::Error {
    binrw::Error::Io(std::io::Error::new(
        ErrorKind::UnexpectedEof,
        format!("packet ended at {pos:#X}"),
    ))
}

/// Little-endian read cursor over a frame payload. Never reads past the end of `data`.
pub struct PacketReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn remaining(&self) -> usize {
        self.cursor.get_ref().len().saturating_sub(self.position())
    }

    pub fn skip(&mut self, count: usize) -> BinResult<()> {
        if count > self.remaining() {
            return Err(eof(self.cursor.position()));
        }
        self.cursor.set_position((self.position() + count) as u64);
        Ok(())
    }

    pub fn read_u8(&mut self) -> BinResult<u8> {
        u8::read_le(&mut self.cursor)
    }

    pub fn read_u16(&mut self) -> BinResult<u16> {
        u16::read_le(&mut self.cursor)
    }

    pub fn read_u32(&mut self) -> BinResult<u32> {
        u32::read_le(&mut self.cursor)
    }

    pub fn read_u64(&mut self) -> BinResult<u64> {
        u64::read_le(&mut self.cursor)
    }

    /// Reads a 24-bit little-endian integer.
    pub fn read_u24(&mut self) -> BinResult<u32> {
        let bytes = self.read_bytes(3)?;
        Ok(bytes[0] as u32 | (bytes[1] as u32) << 8 | (bytes[2] as u32) << 16)
    }

    pub fn read_half(&mut self) -> BinResult<f32> {
        Ok(half_to_float(self.read_u16()?))
    }

    pub fn read_bytes(&mut self, count: usize) -> BinResult<Vec<u8>> {
        let start = self.position();
        if count > self.remaining() {
            return Err(eof(start as u64));
        }
        self.cursor.set_position((start + count) as u64);
        Ok(self.cursor.get_ref()[start..start + count].to_vec())
    }

    pub fn read_header(&mut self) -> BinResult<ObjectHeader> {
        ObjectHeader::read_le(&mut self.cursor)
    }

    pub fn read_location(&mut self) -> BinResult<Location> {
        Location::read_le(&mut self.cursor)
    }

    /// Reads an obfuscated count. See `PacketWriter::write_magic`.
    pub fn read_magic(&mut self, xor: u32, sub: u32) -> BinResult<u32> {
        Ok((self.read_u32()? ^ xor).wrapping_sub(sub))
    }

    /// Reads `size` bytes of NUL-padded ASCII.
    pub fn read_fixed_ascii(&mut self, size: usize) -> BinResult<String> {
        Ok(read_string(self.read_bytes(size)?))
    }

    /// Reads `length` UTF-16 code units, stopping the string at the first NUL.
    pub fn read_fixed_utf16(&mut self, length: usize) -> BinResult<String> {
        let bytes = self.read_bytes(length * 2)?;
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .take_while(|unit| *unit != 0)
            .collect();
        Ok(String::from_utf16_lossy(&units))
    }

    /// Reads an obfuscated-length ASCII string. See `PacketWriter::write_ascii`.
    pub fn read_ascii(&mut self, xor: u32, sub: u32) -> BinResult<String> {
        let magic = self.read_magic(xor, sub)? as usize;
        if magic == 0 {
            return Ok(String::new());
        }

        let length = magic - 1;
        let value = self.read_fixed_ascii(length)?;
        self.skip(4 - (length & 3))?;

        Ok(value)
    }

    /// Reads an obfuscated-length UTF-16 string. See `PacketWriter::write_utf16`.
    pub fn read_utf16(&mut self, xor: u32, sub: u32) -> BinResult<String> {
        let length = self.read_magic(xor, sub)? as usize;
        if length == 0 {
            return Ok(String::new());
        }

        let value = self.read_fixed_utf16(length)?;
        if length & 1 == 1 {
            self.skip(2)?;
        }

        Ok(value)
    }
}
