use std::net::SocketAddr;

use crate::{
    common::{EntityType, Location, ObjectHeader, Position},
    ipc::{MovementFlags, PackedMovement, ServerPacket},
    network::{ClientId, OutboundQueue},
    packet::{Direction, Frame, FrameBuffer, Opcode, PacketDump, PacketFlags, Rc4, build_frame},
};

use super::zone::MapRef;

/// The account behind a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub player_id: u32,
    pub username: String,
}

/// The character a session is playing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Character {
    pub character_id: u32,
    pub name: String,
}

/// Per-connection protocol state: the receive buffer, both cipher directions and the outbound queue,
/// plus what the world needs to know about the player.
pub struct Session {
    pub id: ClientId,
    pub address: Option<SocketAddr>,
    receive_buffer: FrameBuffer,
    input_cipher: Option<Rc4>,
    output_cipher: Option<Rc4>,
    outbound: OutboundQueue,
    closed: bool,
    dump: Option<PacketDump>,

    pub user: Option<User>,
    pub character: Option<Character>,
    /// The map this session currently occupies.
    pub current_map: Option<MapRef>,
    pub location: Location,
    pub last_position: Position,
    pub movement_timestamp: u32,
}

impl Session {
    pub fn new(id: ClientId) -> Self {
        Self {
            id,
            address: None,
            receive_buffer: FrameBuffer::default(),
            input_cipher: None,
            output_cipher: None,
            outbound: OutboundQueue::default(),
            closed: false,
            dump: None,
            user: None,
            character: None,
            current_map: None,
            location: Location::default(),
            last_position: Position::default(),
            movement_timestamp: 0,
        }
    }

    pub fn with_dump(mut self, dump: PacketDump) -> Self {
        self.dump = Some(dump);
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Marks the session closed. No further frames are dispatched from it.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_encrypted(&self) -> bool {
        self.input_cipher.is_some()
    }

    /// Starts encrypting both directions with `key`, from the next byte on.
    pub fn set_key(&mut self, key: &[u8]) {
        self.input_cipher = Some(Rc4::new(key));
        self.output_cipher = Some(Rc4::new(key));
    }

    pub fn set_user(&mut self, player_id: u32, username: &str) {
        self.user = Some(User {
            player_id,
            username: username.to_string(),
        });
    }

    pub fn set_character(&mut self, character_id: u32, name: &str) {
        self.character = Some(Character {
            character_id,
            name: name.to_string(),
        });
    }

    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.username.as_str())
    }

    /// The header other clients use to refer to this player.
    pub fn player_header(&self) -> Option<ObjectHeader> {
        self.user
            .as_ref()
            .map(|user| ObjectHeader::new(user.player_id as u64, EntityType::PLAYER))
    }

    /// Buffers and decrypts incoming bytes. Returns false if they did not fit and were dropped.
    pub fn receive(&mut self, data: &[u8]) -> bool {
        match self
            .receive_buffer
            .push(data, self.input_cipher.as_mut())
        {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("{}: {err}, dropping data", self.id);
                false
            }
        }
    }

    /// The next complete frame, if any. Nothing comes out once the session is closed.
    pub fn next_frame(&mut self) -> Option<Frame> {
        if self.closed {
            return None;
        }

        let frame = self.receive_buffer.next_frame()?;
        if let Some(dump) = &mut self.dump {
            dump.record(frame.opcode, Direction::Client, &frame.to_bytes());
        }

        Some(frame)
    }

    /// Moves unconsumed bytes to the front of the receive buffer.
    pub fn compact(&mut self) {
        self.receive_buffer.compact();
    }

    /// Queues a complete frame. The frame is copied before encryption, so `packet` is never modified.
    pub fn send(&mut self, packet: &[u8]) {
        if self.closed {
            return;
        }

        if let Some(dump) = &mut self.dump {
            if packet.len() >= 6 {
                dump.record(Opcode::new(packet[4], packet[5]), Direction::Server, packet);
            }
        }

        let mut data = packet.to_vec();
        if let Some(cipher) = &mut self.output_cipher {
            cipher.apply(&mut data);
        }

        if let Err(err) = self.outbound.push(&data) {
            tracing::warn!("Failed to send to {}: {err}", self.id);
        }
    }

    pub fn send_packet(&mut self, opcode: Opcode, flags: PacketFlags, payload: &[u8]) {
        self.send(&build_frame(opcode, flags, payload));
    }

    pub fn send_ipc(&mut self, packet: &impl ServerPacket) {
        self.send_packet(packet.opcode(), packet.flags(), &packet.build());
    }

    pub fn outbound_mut(&mut self) -> &mut OutboundQueue {
        &mut self.outbound
    }

    /// Updates the tracked pose with the fields a movement update carries.
    pub fn apply_movement(&mut self, movement: &PackedMovement) {
        let flags = movement.flags;
        let data = &movement.data;

        if flags.contains(MovementFlags::TIMESTAMP) {
            self.movement_timestamp = data.timestamp;
        }

        let rotation = &mut self.location.rotation;
        for (flag, target, value) in [
            (MovementFlags::ROTATION_X, &mut rotation.x, data.rotation.x),
            (MovementFlags::ROTATION_Y, &mut rotation.y, data.rotation.y),
            (MovementFlags::ROTATION_Z, &mut rotation.z, data.rotation.z),
            (MovementFlags::ROTATION_W, &mut rotation.w, data.rotation.w),
        ] {
            if flags.contains(flag) {
                *target = value;
            }
        }

        let position = &mut self.location.position;
        for (flag, target, value) in [
            (MovementFlags::CURRENT_X, &mut position.x, data.current_position.x),
            (MovementFlags::CURRENT_Y, &mut position.y, data.current_position.y),
            (MovementFlags::CURRENT_Z, &mut position.z, data.current_position.z),
        ] {
            if flags.contains(flag) {
                *target = value;
            }
        }

        let last = &mut self.last_position;
        for (flag, target, value) in [
            (MovementFlags::UNKNOWN_X, &mut last.x, data.unknown_position.x),
            (MovementFlags::UNKNOWN_Y, &mut last.y, data.unknown_position.y),
            (MovementFlags::UNKNOWN_Z, &mut last.z, data.unknown_position.z),
        ] {
            if flags.contains(flag) {
                *target = value;
            }
        }
    }
}
