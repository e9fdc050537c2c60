use std::io::Cursor;

use binrw::{BinRead, BinWrite, binrw};

use super::{Opcode, PacketFlags, Rc4};

/// Size of the header at the start of every frame.
pub const FRAME_HEADER_SIZE: usize = 8;

/// Frames claiming to be larger than this are never dispatched.
pub const MAX_FRAME_SIZE: usize = 0x100_0000;

/// Capacity of a session's receive buffer.
pub const RECEIVE_BUFFER_SIZE: usize = 64 * 1024;

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Total size including this header.
    pub size: u32,
    pub kind: u8,
    pub subtype: u8,
    pub flags: u8,
    pub flags2: u8,
}

/// One complete frame taken out of the receive buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: Opcode,
    pub flags: PacketFlags,
    pub flags2: u8,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn to_bytes(&self) -> Vec<u8> {
        build_frame_with(self.opcode, self.flags, self.flags2, &self.payload)
    }
}

/// Prepends a frame header to `payload`.
pub fn build_frame(opcode: Opcode, flags: PacketFlags, payload: &[u8]) -> Vec<u8> {
    build_frame_with(opcode, flags, 0, payload)
}

fn build_frame_with(opcode: Opcode, flags: PacketFlags, flags2: u8, payload: &[u8]) -> Vec<u8> {
    let header = FrameHeader {
        size: (FRAME_HEADER_SIZE + payload.len()) as u32,
        kind: opcode.kind,
        subtype: opcode.subtype,
        flags: flags.bits(),
        flags2,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(FRAME_HEADER_SIZE + payload.len()));
    header.write_le(&mut cursor)
        .expect("writing to a Vec cannot fail");
    let mut bytes = cursor.into_inner();
    bytes.extend_from_slice(payload);
    bytes
}

/// Returned when a chunk does not fit into the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("receive buffer overrun: {buffered} bytes buffered, {incoming} incoming")]
pub struct Overrun {
    pub buffered: usize,
    pub incoming: usize,
}

/// Fixed-capacity receive buffer that splits a decrypted byte stream into frames.
///
/// Bytes are decrypted exactly once, as they are pushed, so the cipher never sees the same byte twice
/// no matter how the stream is chunked or how often the buffer is compacted.
pub struct FrameBuffer {
    data: Vec<u8>,
    /// End of the valid bytes.
    filled: usize,
    /// Start of the bytes that have not been taken as a frame yet.
    consumed: usize,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::with_capacity(RECEIVE_BUFFER_SIZE)
    }
}

impl FrameBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            filled: 0,
            consumed: 0,
        }
    }

    /// Number of buffered bytes not yet taken as a frame.
    pub fn len(&self) -> usize {
        self.filled - self.consumed
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends `chunk`, decrypting only the new bytes when a cipher is given. The chunk is dropped
    /// whole if it does not fit.
    pub fn push(&mut self, chunk: &[u8], cipher: Option<&mut Rc4>) -> Result<(), Overrun> {
        if self.filled + chunk.len() > self.data.len() {
            return Err(Overrun {
                buffered: self.filled,
                incoming: chunk.len(),
            });
        }

        let region = &mut self.data[self.filled..self.filled + chunk.len()];
        region.copy_from_slice(chunk);
        if let Some(cipher) = cipher {
            cipher.apply(region);
        }
        self.filled += chunk.len();

        Ok(())
    }

    /// Takes the next complete frame, if there is one.
    pub fn next_frame(&mut self) -> Option<Frame> {
        let available = &self.data[self.consumed..self.filled];
        if available.len() < FRAME_HEADER_SIZE {
            return None;
        }

        let header = FrameHeader::read_le(&mut Cursor::new(available)).ok()?;

        // a length smaller than the header would never advance the stream
        let size = (header.size as usize).max(FRAME_HEADER_SIZE);
        if size > MAX_FRAME_SIZE || size > available.len() {
            return None;
        }

        let payload = available[FRAME_HEADER_SIZE..size].to_vec();
        self.consumed += size;

        Some(Frame {
            opcode: Opcode::new(header.kind, header.subtype),
            flags: PacketFlags::from_bits_retain(header.flags),
            flags2: header.flags2,
            payload,
        })
    }

    /// Moves the unconsumed bytes to the front of the buffer.
    pub fn compact(&mut self) {
        if self.consumed == 0 {
            return;
        }

        self.data.copy_within(self.consumed..self.filled, 0);
        self.filled -= self.consumed;
        self.consumed = 0;
    }
}
