//! Everything past the socket: sessions, packet handlers and the shared registries.

use std::{collections::HashMap, path::Path};

use crate::network::ClientId;

mod zone;
pub use zone::{GenerationParams, Instance, Map, MapFlags, MapRef, MapType, ZoneManager};

mod object;
pub use object::{GENERATED_MAP_NAME, ObjectError, ObjectManager};

mod social;
pub use social::{MAX_PARTY_SIZE, Party, PartyId, PartyManager};

mod session;
pub use session::{Character, Session, User};

mod handlers;
pub use handlers::{HandlerContext, HandlerError, HandlerRegistry, PacketHandler};

mod server;
pub use server::ShipServer;

mod admin;

#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("instance {0} does not exist")]
    InstanceNotFound(String),
    #[error("map {0} does not exist")]
    MapNotFound(MapRef),
    #[error("no session {0}")]
    SessionNotFound(ClientId),
    #[error("party {0:?} does not exist")]
    PartyNotFound(PartyId),
    #[error("party {0:?} is full")]
    PartyFull(PartyId),
    #[error("{0} is already in a party")]
    AlreadyInParty(ClientId),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The registries shared by every session.
#[derive(Debug)]
pub struct WorldState {
    pub zones: ZoneManager,
    pub objects: ObjectManager,
    pub parties: PartyManager,
}

impl WorldState {
    pub fn new(resources: impl AsRef<Path>) -> Self {
        Self {
            zones: ZoneManager::new(),
            objects: ObjectManager::new(resources),
            parties: PartyManager::default(),
        }
    }

    /// Takes `session` out of its map and party.
    pub fn detach(&mut self, session: &mut Session) {
        if let Some(map) = session.current_map.take() {
            self.zones.remove_client(&map, session.id);
        }

        if self.parties.party_of(session.id).is_some() {
            self.parties.remove_from_party(session.id);
        }
    }
}

/// Live sessions by connection.
#[derive(Default)]
pub struct Sessions {
    sessions: HashMap<ClientId, Session>,
}

impl Sessions {
    pub fn insert(&mut self, session: Session) {
        self.sessions.insert(session.id, session);
    }

    pub fn remove(&mut self, id: ClientId) -> Option<Session> {
        self.sessions.remove(&id)
    }

    pub fn get(&self, id: ClientId) -> Option<&Session> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut Session> {
        self.sessions.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Ids of every live session, in connection order.
    pub fn ids(&self) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self.sessions.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session> {
        self.sessions.values_mut()
    }

    /// Looks a session up by username, or failing that by character name.
    pub fn find_by_name(&self, name: &str) -> Option<ClientId> {
        self.sessions
            .values()
            .find(|session| session.username() == Some(name))
            .or_else(|| {
                self.sessions.values().find(|session| {
                    session
                        .character
                        .as_ref()
                        .is_some_and(|character| character.name == name)
                })
            })
            .map(|session| session.id)
    }

    /// Calls `f` for every session with a character in `map`, except `except`.
    pub fn for_each_in_map(
        &mut self,
        map: &MapRef,
        except: ClientId,
        mut f: impl FnMut(&mut Session),
    ) {
        for session in self.sessions.values_mut() {
            if session.id == except || session.is_closed() || session.character.is_none() {
                continue;
            }

            if session.current_map.as_ref() == Some(map) {
                f(session);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_in(id: usize, map: Option<MapRef>, character: bool) -> Session {
        let mut session = Session::new(ClientId(id));
        session.current_map = map;
        if character {
            session.set_character(id as u32, &format!("Character{id}"));
        }
        session
    }

    #[test]
    fn test_for_each_in_map() {
        let lobby = MapRef::new("lobby", "lobby");
        let casino = MapRef::new("lobby", "casino");

        let mut sessions = Sessions::default();
        sessions.insert(session_in(1, Some(lobby.clone()), true));
        sessions.insert(session_in(2, Some(lobby.clone()), true));
        sessions.insert(session_in(3, Some(lobby.clone()), false));
        sessions.insert(session_in(4, Some(casino), true));
        sessions.insert(session_in(5, None, true));

        let mut visited = Vec::new();
        sessions.for_each_in_map(&lobby, ClientId(1), |session| visited.push(session.id));
        assert_eq!(visited, [ClientId(2)]);
    }

    #[test]
    fn test_find_by_name() {
        let mut sessions = Sessions::default();
        let mut first = session_in(1, None, true);
        first.set_user(100, "alice");
        sessions.insert(first);
        sessions.insert(session_in(2, None, true));

        assert_eq!(sessions.find_by_name("alice"), Some(ClientId(1)));
        assert_eq!(sessions.find_by_name("Character2"), Some(ClientId(2)));
        assert_eq!(sessions.find_by_name("nobody"), None);
        assert_eq!(sessions.ids(), [ClientId(1), ClientId(2)]);
    }

    #[test]
    fn test_detach() {
        let mut world = WorldState::new("resources");
        let lobby = MapRef::new("lobby", "lobby");

        let mut host = Session::new(ClientId(1));
        world.zones.spawn_client(&lobby, host.id).unwrap();
        host.current_map = Some(lobby.clone());
        let party = world.parties.create_party(host.id, "party").unwrap();
        world.parties.add_to_party(party, ClientId(2)).unwrap();

        world.detach(&mut host);

        assert!(host.current_map.is_none());
        assert!(world.zones.map(&lobby).unwrap().clients().is_empty());
        assert_eq!(world.parties.party_of(ClientId(1)), None);
        assert_eq!(world.parties.party_of(ClientId(2)), None);
    }
}
