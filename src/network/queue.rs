use std::io::{self, Write};

use super::NetworkError;

/// Default capacity of a connection's write queue.
pub const WRITE_BUFFER_SIZE: usize = 1024 * 1024;

/// Bounded queue of bytes waiting for the socket to become writable.
#[derive(Debug)]
pub struct OutboundQueue {
    data: Vec<u8>,
    capacity: usize,
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::with_capacity(WRITE_BUFFER_SIZE)
    }
}

impl OutboundQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Queues `bytes` whole, or not at all.
    pub fn push(&mut self, bytes: &[u8]) -> Result<(), NetworkError> {
        if self.data.len() + bytes.len() > self.capacity {
            return Err(NetworkError::QueueFull {
                queued: self.data.len(),
                incoming: bytes.len(),
            });
        }

        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Writes as much as the writer accepts. Stops quietly on `WouldBlock`, and treats a zero-length
    /// write as a lost connection.
    pub fn egress<W: Write>(&mut self, writer: &mut W) -> io::Result<usize> {
        let mut written = 0;

        while written < self.data.len() {
            match writer.write(&self.data[written..]) {
                Ok(0) => {
                    self.data.drain(..written);
                    return Err(io::ErrorKind::WriteZero.into());
                }
                Ok(count) => written += count,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) => {
                    self.data.drain(..written);
                    return Err(err);
                }
            }
        }

        self.data.drain(..written);
        Ok(written)
    }
}
