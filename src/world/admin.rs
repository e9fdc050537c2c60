//! Operations the operator console drives. They run on the reactor thread, between `run_once` calls.

use std::path::Path;

use crate::{
    common::{GameObject, Location, Position, Rotation},
    ipc::{
        CharacterSpawnPacket, MessageType, NoPayloadPacket, ObjectSpawnPacket,
        SystemMessagePacket, TeleportTransferPacket,
    },
    network::ClientId,
    opcodes,
    packet::{FRAME_HEADER_SIZE, Opcode, PacketFlags},
};

use super::{
    GenerationParams, GENERATED_MAP_NAME, Map, MapFlags, MapRef, MapType, Session, ShipServer,
    WorldError, ZoneManager,
};

/// Object id of the lobby teleporter, which every teleport is routed through.
const TELEPORTER_OBJECT_ID: u64 = 443;

/// Where clones appear along any axis given as zero.
const DEFAULT_CLONE_POSITION: Position = Position {
    x: -0.417969,
    y: 0.000031,
    z: 134.375,
};

impl ShipServer {
    /// Finds a session by username, or else by character name.
    pub fn find_session(&self, name: &str) -> Option<ClientId> {
        self.sessions.find_by_name(name)
    }

    pub fn session_ids(&self) -> Vec<ClientId> {
        self.sessions.ids()
    }

    fn live_session(&mut self, id: ClientId) -> Result<&mut Session, WorldError> {
        self.sessions
            .get_mut(id)
            .filter(|session| !session.is_closed())
            .ok_or(WorldError::SessionNotFound(id))
    }

    pub fn send_to(
        &mut self,
        id: ClientId,
        opcode: Opcode,
        flags: PacketFlags,
        payload: &[u8],
    ) -> Result<(), WorldError> {
        self.live_session(id)?.send_packet(opcode, flags, payload);
        Ok(())
    }

    /// Sends bytes that already form a complete frame.
    pub fn send_raw_to(&mut self, id: ClientId, frame: &[u8]) -> Result<(), WorldError> {
        self.live_session(id)?.send(frame);
        Ok(())
    }

    /// Sends a frame captured to disk. The size field is recomputed from the file length.
    pub fn send_file_to(&mut self, id: ClientId, path: impl AsRef<Path>) -> Result<(), WorldError> {
        let mut frame = std::fs::read(path)?;
        if frame.len() < FRAME_HEADER_SIZE {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "file is shorter than a frame header",
            )
            .into());
        }

        let size = frame.len() as u32;
        frame[..4].copy_from_slice(&size.to_le_bytes());
        self.send_raw_to(id, &frame)
    }

    /// Sends every file in `directory` as a frame, in file name order. Returns how many were sent.
    pub fn send_directory_to(
        &mut self,
        id: ClientId,
        directory: impl AsRef<Path>,
    ) -> Result<usize, WorldError> {
        self.live_session(id)?;

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(directory)? {
            let path = entry?.path();
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        for path in &paths {
            self.send_file_to(id, path)?;
            tracing::info!("Sent {} to {id}", path.display());
        }

        Ok(paths.len())
    }

    /// Sends a system message to every session with a character. Returns how many got it.
    pub fn announce(&mut self, message: &str, message_type: MessageType) -> usize {
        let packet = SystemMessagePacket::new(message, message_type);

        let mut count = 0;
        for session in self.sessions.iter_mut() {
            if session.character.is_some() && !session.is_closed() {
                session.send_ipc(&packet);
                count += 1;
            }
        }

        tracing::info!("Announced \"{message}\" to {count} sessions");
        count
    }

    /// Detaches the session and closes it. The reactor drops the connection once its queue is flushed.
    pub fn kick(&mut self, id: ClientId) -> Result<(), WorldError> {
        let session = self
            .sessions
            .get_mut(id)
            .ok_or(WorldError::SessionNotFound(id))?;

        self.world.detach(session);
        session.close();
        tracing::info!("Kicked {id}");

        Ok(())
    }

    pub fn kick_all(&mut self) {
        for id in self.sessions.ids() {
            if let Err(err) = self.kick(id) {
                tracing::warn!("Failed to kick {id}: {err}");
            }
        }
    }

    /// Moves the session within its current map through the lobby teleporter.
    pub fn teleport(&mut self, id: ClientId, destination: Location) -> Result<(), WorldError> {
        let teleporter = self
            .world
            .objects
            .get_object_in_zone(ZoneManager::LOBBY, TELEPORTER_OBJECT_ID);

        let session = self.live_session(id)?;
        session.location = destination;
        session.send_ipc(&TeleportTransferPacket {
            source: teleporter.header,
            destination,
        });

        Ok(())
    }

    /// Moves the session into `map`: it appears at the map's default location and gets sent the map's objects.
    pub fn move_to_map(&mut self, id: ClientId, map: &MapRef) -> Result<Location, WorldError> {
        let session = self
            .sessions
            .get_mut(id)
            .filter(|session| !session.is_closed())
            .ok_or(WorldError::SessionNotFound(id))?;

        // check the target before leaving the current map
        let map_name = self.world.zones.map(map)?.name.clone();

        if let Some(previous) = session.current_map.take() {
            self.world.zones.remove_client(&previous, id);
        }
        let location = self.world.zones.spawn_client(map, id)?;
        session.current_map = Some(map.clone());
        session.location = location;

        for object in self.world.objects.get_objects_for_zone(&map_name) {
            session.send_ipc(&ObjectSpawnPacket(object));
        }
        session.send_ipc(&NoPayloadPacket(opcodes::server::UNLOCK_CONTROLS));

        tracing::info!("Moved {id} to {map}");

        Ok(location)
    }

    /// Moves the session to a generated map, creating its instance first if needed.
    pub fn change_map(
        &mut self,
        id: ClientId,
        zone_id: u32,
        variant_id: u32,
        map_type: MapType,
        flags: MapFlags,
        generation: GenerationParams,
    ) -> Result<Location, WorldError> {
        let instance = format!("tpinstance_{zone_id}_{variant_id}");
        if !self.world.zones.instance_exists(&instance) {
            let map = Map::new(GENERATED_MAP_NAME, zone_id, variant_id, map_type, flags)
                .with_generation(generation);
            self.world.zones.new_instance(&instance, map);
        }

        self.move_to_map(id, &MapRef::new(&instance, GENERATED_MAP_NAME))
    }

    /// Shows the session a character that exists only on its own screen. Returns the clone's player id.
    pub fn spawn_clone(
        &mut self,
        id: ClientId,
        username: &str,
        character_name: &str,
        position: Position,
    ) -> Result<u32, WorldError> {
        let session = self.live_session(id)?;

        let pick = |value: f32, default: f32| if value == 0.0 { default } else { value };
        let position = Position {
            x: pick(position.x, DEFAULT_CLONE_POSITION.x),
            y: pick(position.y, DEFAULT_CLONE_POSITION.y),
            z: pick(position.z, DEFAULT_CLONE_POSITION.z),
        };
        let rotation = Rotation {
            x: 0.0,
            y: 1.0,
            z: 0.0,
            w: 0.0,
        };

        let player_id = fastrand::u32(12_345_678..);
        session.send_ipc(&CharacterSpawnPacket {
            player_id,
            location: Location::new(rotation, position),
            name: character_name.to_string(),
            nickname: character_name.to_string(),
            is_it_me: false,
        });

        tracing::info!("Spawned a clone of {username} named {character_name} for {id}");

        Ok(player_id)
    }

    /// Creates an object next to the session and shows it to everyone in that map. Returns its id.
    pub fn spawn_object(
        &mut self,
        id: ClientId,
        name: &str,
        location: Location,
    ) -> Result<u64, WorldError> {
        let session = self
            .sessions
            .get(id)
            .filter(|session| !session.is_closed())
            .ok_or(WorldError::SessionNotFound(id))?;
        let map = session.current_map.clone();
        let zone = match &map {
            Some(map) => self.world.zones.map(map)?.name.clone(),
            None => ZoneManager::LOBBY.to_string(),
        };

        let object = GameObject::new(self.world.objects.unused_id(), name, location);
        let object_id = object.id();
        let packet = ObjectSpawnPacket(&object);

        if let Some(session) = self.sessions.get_mut(id) {
            session.send_ipc(&packet);
        }
        if let Some(map) = &map {
            self.sessions
                .for_each_in_map(map, id, |other| other.send_ipc(&packet));
        }

        self.world.objects.insert(&zone, object);
        tracing::info!("Spawned object {object_id} ({name}) in {zone}");

        Ok(object_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        common::{EntityType, ObjectHeader, TempDir, float_to_half, half_to_float},
        network::Service,
        packet::{PacketReader, PlainKeyUnwrapper, build_frame},
        world::{
            HandlerRegistry, WorldState,
            handlers::tests::{player, sent},
        },
    };

    fn server_with_players(count: usize) -> ShipServer {
        let mut server = ShipServer::new(
            WorldState::new("resources"),
            HandlerRegistry::with_default_handlers(Box::new(PlainKeyUnwrapper)),
        );
        for id in 1..=count {
            server.connected(ClientId(id), "127.0.0.1:50000".parse().unwrap());
            let session = server.session_mut(ClientId(id)).unwrap();
            let ready = player(id);
            session.user = ready.user;
            session.character = ready.character;
            sent(session);
        }
        server
    }

    /// A temporary resources directory with one `.json` object in the lobby.
    fn resources_with_teleporter() -> TempDir {
        let resources = TempDir::new("arks-admin");
        let lobby = resources.path().join("objects").join("lobby");
        std::fs::create_dir_all(&lobby).unwrap();

        let teleporter = GameObject::new(TELEPORTER_OBJECT_ID, "oTeleporter", Location::default());
        std::fs::write(
            lobby.join("teleporter.json"),
            serde_json::to_string(&teleporter).unwrap(),
        )
        .unwrap();

        resources
    }

    #[test]
    fn test_find_and_enumerate() {
        let server = server_with_players(3);
        assert_eq!(server.find_session("user2"), Some(ClientId(2)));
        assert_eq!(server.find_session("Character3"), Some(ClientId(3)));
        assert_eq!(server.find_session("user9"), None);
        assert_eq!(
            server.session_ids(),
            [ClientId(1), ClientId(2), ClientId(3)]
        );
    }

    #[test]
    fn test_send_to_unknown() {
        let mut server = server_with_players(1);
        assert!(matches!(
            server.send_to(ClientId(7), Opcode::new(1, 2), PacketFlags::empty(), &[]),
            Err(WorldError::SessionNotFound(ClientId(7)))
        ));
    }

    #[test]
    fn test_send_file_fixes_size() {
        let mut server = server_with_players(1);

        let mut frame = build_frame(Opcode::new(0x0B, 0x22), PacketFlags::PACKED, &[1, 2, 3]);
        frame[..4].copy_from_slice(&0xFFFFu32.to_le_bytes());
        let temp = TempDir::new("arks-frame");
        let path = temp.path().join("frame.bin");
        std::fs::write(&path, &frame).unwrap();

        server.send_file_to(ClientId(1), &path).unwrap();
        assert_eq!(
            sent(server.session_mut(ClientId(1)).unwrap()),
            [(Opcode::new(0x0B, 0x22), PacketFlags::PACKED, vec![1, 2, 3])]
        );

        std::fs::write(&path, [1u8, 2, 3]).unwrap();
        assert!(matches!(
            server.send_file_to(ClientId(1), &path),
            Err(WorldError::Io(_))
        ));
    }

    #[test]
    fn test_send_directory_in_name_order() {
        let mut server = server_with_players(1);

        let temp = TempDir::new("arks-frames");
        let first = build_frame(Opcode::new(0x0B, 0x22), PacketFlags::empty(), &[1, 2]);
        let second = build_frame(Opcode::new(0x03, 0x2B), PacketFlags::PACKED, &[]);
        std::fs::write(temp.path().join("1.bin"), &second).unwrap();
        std::fs::write(temp.path().join("0.bin"), &first).unwrap();
        std::fs::create_dir(temp.path().join("skipped")).unwrap();

        assert_eq!(server.send_directory_to(ClientId(1), temp.path()).unwrap(), 2);
        assert_eq!(
            sent(server.session_mut(ClientId(1)).unwrap()),
            [
                (Opcode::new(0x0B, 0x22), PacketFlags::empty(), vec![1, 2]),
                (Opcode::new(0x03, 0x2B), PacketFlags::PACKED, vec![]),
            ]
        );

        assert!(matches!(
            server.send_directory_to(ClientId(1), temp.path().join("missing")),
            Err(WorldError::Io(_))
        ));
        assert!(matches!(
            server.send_directory_to(ClientId(5), temp.path()),
            Err(WorldError::SessionNotFound(ClientId(5)))
        ));
    }

    #[test]
    fn test_announce_skips_sessions_without_character() {
        let mut server = server_with_players(2);
        server.connected(ClientId(3), "127.0.0.1:50000".parse().unwrap());
        sent(server.session_mut(ClientId(3)).unwrap());

        assert_eq!(server.announce("Hello", MessageType::AdminMessage), 2);

        let expected = SystemMessagePacket::new("Hello", MessageType::AdminMessage);
        let frames = sent(server.session_mut(ClientId(1)).unwrap());
        assert_eq!(
            frames,
            [(
                opcodes::server::SYSTEM_MESSAGE,
                PacketFlags::PACKED,
                crate::ipc::ServerPacket::build(&expected)
            )]
        );
        assert!(sent(server.session_mut(ClientId(3)).unwrap()).is_empty());
    }

    #[test]
    fn test_kick() {
        let mut server = server_with_players(2);
        server
            .move_to_map(ClientId(1), &MapRef::new("lobby", "lobby"))
            .unwrap();

        server.kick(ClientId(1)).unwrap();
        assert!(server.is_closed(ClientId(1)));
        assert_eq!(server.world().zones.instance("lobby").unwrap().player_count(), 0);

        server.kick_all();
        assert!(server.is_closed(ClientId(2)));
        assert!(server.send_to(ClientId(2), Opcode::new(1, 2), PacketFlags::empty(), &[]).is_err());
    }

    #[test]
    fn test_move_to_map() {
        let mut server = server_with_players(1);
        let lobby = MapRef::new("lobby", "lobby");
        let casino = MapRef::new("lobby", "casino");

        server.move_to_map(ClientId(1), &lobby).unwrap();
        server.move_to_map(ClientId(1), &casino).unwrap();

        let zones = &server.world().zones;
        assert!(zones.map(&lobby).unwrap().clients().is_empty());
        assert_eq!(zones.map(&casino).unwrap().clients(), [ClientId(1)]);
        assert_eq!(zones.instance("lobby").unwrap().player_count(), 1);

        let session = server.session_mut(ClientId(1)).unwrap();
        assert_eq!(session.current_map, Some(casino));
        let frames = sent(session);
        assert_eq!(frames.last().unwrap().0, opcodes::server::UNLOCK_CONTROLS);
    }

    #[test]
    fn test_move_to_missing_map_stays() {
        let mut server = server_with_players(1);
        let lobby = MapRef::new("lobby", "lobby");
        server.move_to_map(ClientId(1), &lobby).unwrap();

        assert!(matches!(
            server.move_to_map(ClientId(1), &MapRef::new("lobby", "nowhere")),
            Err(WorldError::MapNotFound(_))
        ));
        assert_eq!(
            server.session_mut(ClientId(1)).unwrap().current_map,
            Some(lobby)
        );
    }

    #[test]
    fn test_change_map_creates_instance_once() {
        let mut server = server_with_players(2);
        let generation = GenerationParams {
            seed: 1234,
            x_size: 4,
            y_size: 4,
        };

        for id in [1, 2] {
            server
                .change_map(ClientId(id), 300, 2, MapType::Field, MapFlags::empty(), generation)
                .unwrap();
        }

        let instance = server.world().zones.instance("tpinstance_300_2").unwrap();
        assert_eq!(instance.maps().len(), 1);
        assert_eq!(instance.maps()[0].generation, Some(generation));
        assert_eq!(instance.player_count(), 2);

        // generated maps have no static objects
        let frames = sent(server.session_mut(ClientId(2)).unwrap());
        assert_eq!(
            frames,
            [(opcodes::server::UNLOCK_CONTROLS, PacketFlags::empty(), vec![])]
        );
    }

    #[test]
    fn test_teleport_through_lobby_teleporter() {
        let resources = resources_with_teleporter();
        let mut server = server_with_players(1);
        server.world = WorldState::new(resources.path());

        let destination = Location::new(
            Rotation {
                x: 0.0,
                y: 1.0,
                z: 0.0,
                w: 0.0,
            },
            Position {
                x: 12.0,
                y: 0.5,
                z: -8.0,
            },
        );
        server.teleport(ClientId(1), destination).unwrap();

        let session = server.session_mut(ClientId(1)).unwrap();
        assert_eq!(session.location, destination);

        let expected = TeleportTransferPacket {
            source: ObjectHeader::new(TELEPORTER_OBJECT_ID, EntityType::OBJECT),
            destination,
        };
        assert_eq!(
            sent(session),
            [(
                opcodes::server::TELEPORT_TRANSFER,
                PacketFlags::OBJECT_RELATED,
                crate::ipc::ServerPacket::build(&expected)
            )]
        );
    }

    #[test]
    fn test_spawn_clone_layout() {
        let mut server = server_with_players(2);

        let player_id = server
            .spawn_clone(
                ClientId(1),
                "user2",
                "Clone",
                Position {
                    x: 0.0,
                    y: 2.0,
                    z: 0.0,
                },
            )
            .unwrap();
        assert!(sent(server.session_mut(ClientId(2)).unwrap()).is_empty());

        let frames = sent(server.session_mut(ClientId(1)).unwrap());
        assert_eq!(frames.len(), 1);
        let (opcode, flags, payload) = &frames[0];
        assert_eq!(*opcode, Opcode::new(0x08, 0x04));
        assert_eq!(*flags, PacketFlags::empty());
        assert_eq!(payload.len(), CharacterSpawnPacket::SIZE);

        let mut reader = PacketReader::new(payload);
        let header = reader.read_header().unwrap();
        assert_eq!(header.id, player_id as u64);
        assert_eq!(header.entity_type, EntityType::PLAYER);

        // zero axes fall back to the default spawn point
        let location = reader.read_location().unwrap();
        assert_eq!(location.rotation.y, 1.0);
        assert_eq!(
            location.position.x,
            half_to_float(float_to_half(DEFAULT_CLONE_POSITION.x))
        );
        assert_eq!(location.position.y, 2.0);
        assert_eq!(location.position.z, 134.375);

        assert_eq!(&payload[0x1C..0x25], b"Character");
        assert!(payload[0x25..0x3C].iter().all(|b| *b == 0));

        // offsets below count the 8 byte frame header, like packet captures do
        let word = |offset: usize| u32::from_le_bytes(payload[offset - 8..][..4].try_into().unwrap());
        assert_eq!(word(0x44), 1);
        assert_eq!(word(0x48), 602);
        assert_eq!(word(0x4C), 1);
        assert_eq!(word(0x50), 53);
        assert_eq!(word(0x54), 0);
        // not the receiving client's own character
        assert_eq!(word(0x58), 39);
        assert_eq!(word(0x5C), 559 | (306 << 16));
        assert_eq!(word(0x60), player_id);

        let name: Vec<u16> = payload[0x68..0x88]
            .chunks(2)
            .map(|unit| u16::from_le_bytes([unit[0], unit[1]]))
            .collect();
        assert_eq!(String::from_utf16_lossy(&name[..5]), "Clone");
        assert!(name[5..].iter().all(|unit| *unit == 0));

        let nickname = 0x8C + CharacterSpawnPacket::APPEARANCE_SIZE + 64 + 8;
        assert_eq!(&payload[nickname..nickname + 4], [b'C', 0, b'l', 0]);
        assert!(payload[nickname + 32..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_spawn_clone_needs_a_live_session() {
        let mut server = server_with_players(1);
        server.kick(ClientId(1)).unwrap();
        assert!(matches!(
            server.spawn_clone(ClientId(1), "user1", "Clone", Position::default()),
            Err(WorldError::SessionNotFound(ClientId(1)))
        ));
    }

    #[test]
    fn test_spawn_object() {
        let mut server = server_with_players(3);
        let lobby = MapRef::new("lobby", "lobby");
        server.move_to_map(ClientId(1), &lobby).unwrap();
        server.move_to_map(ClientId(2), &lobby).unwrap();
        for id in 1..=3 {
            sent(server.session_mut(ClientId(id)).unwrap());
        }

        let object_id = server
            .spawn_object(ClientId(1), "oCrate", Location::default())
            .unwrap();

        for id in [1, 2] {
            let frames = sent(server.session_mut(ClientId(id)).unwrap());
            assert_eq!(frames.len(), 1);
            assert_eq!(frames[0].0, opcodes::server::OBJECT_SPAWN);
        }
        assert!(sent(server.session_mut(ClientId(3)).unwrap()).is_empty());

        let object = server.world_mut().objects.get_object_in_zone("lobby", object_id);
        assert_eq!(object.name, "oCrate");
    }

    #[test]
    fn test_movement_reaches_moved_sessions() {
        let mut server = server_with_players(2);
        let casino = MapRef::new("lobby", "casino");
        server.move_to_map(ClientId(1), &casino).unwrap();
        server.move_to_map(ClientId(2), &casino).unwrap();
        sent(server.session_mut(ClientId(2)).unwrap());

        let payload = crate::ipc::PackedMovement::default().to_bytes();
        server.received(
            ClientId(1),
            &build_frame(opcodes::client::MOVEMENT, PacketFlags::empty(), &payload),
        );

        assert_eq!(
            sent(server.session_mut(ClientId(2)).unwrap()),
            [(opcodes::server::MOVEMENT, PacketFlags::empty(), payload)]
        );
    }
}
