use std::{net::SocketAddr, path::PathBuf};

use crate::{
    ipc::WelcomePacket,
    network::{ClientId, OutboundQueue, Service},
    packet::PacketDump,
};

use super::{HandlerContext, HandlerRegistry, Session, Sessions, WorldState};

/// The ship server: every session, the shared registries and the handler table.
///
/// Frames from one connection are handled strictly in order. While a frame is handled its session is taken
/// out of `sessions`, so a handler owns its session and sees every other one through [`HandlerContext`].
pub struct ShipServer {
    pub(super) sessions: Sessions,
    pub(super) world: WorldState,
    handlers: HandlerRegistry,
    dump_directory: Option<PathBuf>,
}

impl ShipServer {
    pub fn new(world: WorldState, handlers: HandlerRegistry) -> Self {
        Self {
            sessions: Sessions::default(),
            world,
            handlers,
            dump_directory: None,
        }
    }

    /// Dumps every frame each session sends or receives under `directory/<client id>/`.
    pub fn with_packet_dumps(mut self, directory: impl Into<PathBuf>) -> Self {
        self.dump_directory = Some(directory.into());
        self
    }

    pub fn sessions(&self) -> &Sessions {
        &self.sessions
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut WorldState {
        &mut self.world
    }

    pub fn session_mut(&mut self, id: ClientId) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }
}

impl Service for ShipServer {
    fn connected(&mut self, id: ClientId, address: SocketAddr) {
        tracing::info!("New connection {id} from {address}");

        let mut session = Session::new(id);
        session.address = Some(address);
        if let Some(directory) = &self.dump_directory {
            match PacketDump::new(directory.join(id.0.to_string())) {
                Ok(dump) => session = session.with_dump(dump),
                Err(err) => tracing::warn!("Failed to set up packet dumps for {id}: {err}"),
            }
        }

        session.send_ipc(&WelcomePacket);
        self.sessions.insert(session);
    }

    fn received(&mut self, id: ClientId, data: &[u8]) {
        let Some(mut session) = self.sessions.remove(id) else {
            tracing::warn!("Received data for unknown session {id}");
            return;
        };

        session.receive(data);
        while let Some(frame) = session.next_frame() {
            let mut ctx = HandlerContext {
                session: &mut session,
                sessions: &mut self.sessions,
                world: &mut self.world,
            };
            self.handlers.dispatch(&mut ctx, &frame);
        }
        session.compact();

        self.sessions.insert(session);
    }

    fn outbound(&mut self, id: ClientId) -> Option<&mut OutboundQueue> {
        self.sessions.get_mut(id).map(Session::outbound_mut)
    }

    fn is_closed(&self, id: ClientId) -> bool {
        self.sessions.get(id).is_none_or(Session::is_closed)
    }

    fn disconnected(&mut self, id: ClientId) {
        let Some(mut session) = self.sessions.remove(id) else {
            return;
        };

        self.world.detach(&mut session);
        tracing::info!(
            "Lost connection {id} ({})",
            session.username().unwrap_or("no user")
        );
    }
}
