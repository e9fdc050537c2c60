use std::path::{Path, PathBuf};

use super::Opcode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Sent by the client.
    Client,
    /// Sent by us.
    Server,
}

/// Writes every decrypted frame of one session to its own directory, for packet debugging.
#[derive(Debug)]
pub struct PacketDump {
    directory: PathBuf,
    count: u32,
}

impl PacketDump {
    pub fn new(directory: impl AsRef<Path>) -> std::io::Result<Self> {
        std::fs::create_dir_all(directory.as_ref())?;

        Ok(Self {
            directory: directory.as_ref().to_path_buf(),
            count: 0,
        })
    }

    /// File name of the next recorded frame.
    fn file_name(&self, opcode: Opcode, direction: Direction) -> String {
        let direction = match direction {
            Direction::Client => 'C',
            Direction::Server => 'S',
        };
        format!(
            "{}.{:02X}.{:02X}.{direction}.bin",
            self.count, opcode.kind, opcode.subtype
        )
    }

    pub fn record(&mut self, opcode: Opcode, direction: Direction, frame: &[u8]) {
        let path = self.directory.join(self.file_name(opcode, direction));
        if let Err(err) = std::fs::write(&path, frame) {
            tracing::warn!("Failed to dump packet to {}: {err}", path.display());
        }
        self.count += 1;
    }
}
