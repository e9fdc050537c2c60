use std::collections::HashMap;

use crate::{
    network::ClientId,
    opcodes,
    packet::{Frame, KeyUnwrapper, Opcode, PacketFlags},
};

use super::{Session, Sessions, WorldError, WorldState};

mod encryption;
pub use encryption::KeyExchangeHandler;

mod movement;
pub use movement::{ActionUpdateHandler, MovementActionHandler, MovementEndHandler, MovementHandler};

mod simple;
pub use simple::{ClientTimeHandler, LogoutHandler, PingHandler, ZeroReplyHandler};

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("malformed packet: {0}")]
    Decode(#[from] binrw::Error),
    #[error("{0} has no user yet")]
    MissingUser(ClientId),
    #[error("key exchange failed: {0}")]
    KeyExchange(&'static str),
    #[error(transparent)]
    World(#[from] WorldError),
}

/// What a handler may touch: the session the frame came from, every other session and the registries.
pub struct HandlerContext<'a> {
    pub session: &'a mut Session,
    pub sessions: &'a mut Sessions,
    pub world: &'a mut WorldState,
}

impl HandlerContext<'_> {
    /// Calls `f` for every other session with a character in the same map as this one.
    pub fn broadcast(&mut self, f: impl FnMut(&mut Session)) {
        let Some(map) = &self.session.current_map else {
            return;
        };

        self.sessions.for_each_in_map(map, self.session.id, f);
    }

    /// Closes this session and detaches it from the world. No later frames are dispatched.
    pub fn close_session(&mut self) {
        self.world.detach(self.session);
        self.session.close();
    }
}

pub trait PacketHandler {
    fn handle(
        &self,
        ctx: &mut HandlerContext,
        flags: PacketFlags,
        payload: &[u8],
    ) -> Result<(), HandlerError>;
}

/// Handlers by exact opcode. Filled once at startup.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<Opcode, Box<dyn PacketHandler>>,
}

impl HandlerRegistry {
    /// Every handler the ship server implements.
    pub fn with_default_handlers(unwrapper: Box<dyn KeyUnwrapper>) -> Self {
        let mut registry = Self::default();

        registry.register(opcodes::client::PING_RESPONSE, PingHandler);
        registry.register(opcodes::client::KEY_EXCHANGE, KeyExchangeHandler::new(unwrapper));
        registry.register(opcodes::client::CLIENT_TIME, ClientTimeHandler);
        registry.register(opcodes::client::LOGOUT, LogoutHandler);
        registry.register(
            opcodes::client::CHARACTER_CREATE_ONE,
            ZeroReplyHandler {
                reply: opcodes::server::CHARACTER_CREATE_ONE_RESPONSE,
                size: 16,
            },
        );
        registry.register(
            opcodes::client::CHARACTER_CREATE_TWO,
            ZeroReplyHandler {
                reply: opcodes::server::CHARACTER_CREATE_TWO_RESPONSE,
                size: 4,
            },
        );

        registry.register(opcodes::client::MOVEMENT, MovementHandler);
        registry.register(opcodes::client::MOVEMENT_END, MovementEndHandler);
        registry.register(opcodes::client::MOVEMENT_ACTION, MovementActionHandler);
        registry.register(opcodes::client::ACTION_UPDATE, ActionUpdateHandler);

        registry
    }

    pub fn register(&mut self, opcode: Opcode, handler: impl PacketHandler + 'static) {
        if self.handlers.insert(opcode, Box::new(handler)).is_some() {
            tracing::warn!("Handler for {opcode} registered twice, keeping the last one");
        }
    }

    pub fn get(&self, opcode: Opcode) -> Option<&dyn PacketHandler> {
        self.handlers.get(&opcode).map(|handler| handler.as_ref())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Runs the handler for `frame`. Unknown opcodes and handler failures are logged, never propagated.
    pub fn dispatch(&self, ctx: &mut HandlerContext, frame: &Frame) {
        let Some(handler) = self.get(frame.opcode) else {
            tracing::warn!(
                "Unimplemented packet {} ({}) from {}",
                frame.opcode,
                opcodes::client::get_name(frame.opcode),
                ctx.session.id
            );
            return;
        };

        if let Err(err) = handler.handle(ctx, frame.flags, &frame.payload) {
            tracing::warn!(
                "Failed to handle {} ({}) from {}: {err}",
                frame.opcode,
                opcodes::client::get_name(frame.opcode),
                ctx.session.id
            );
        }
    }
}
