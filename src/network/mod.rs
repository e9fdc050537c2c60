use std::net::SocketAddr;

mod queue;
pub use queue::{OutboundQueue, WRITE_BUFFER_SIZE};

mod reactor;
pub use reactor::Reactor;

/// Identifies one accepted connection for its whole lifetime. Never reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub usize);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("write queue is full ({queued} queued, {incoming} incoming)")]
    QueueFull { queued: usize, incoming: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// What the reactor drives. Every call happens on the reactor thread, one at a time.
pub trait Service {
    /// A connection was accepted.
    fn connected(&mut self, id: ClientId, address: SocketAddr);

    /// Bytes arrived on a connection, in order.
    fn received(&mut self, id: ClientId, data: &[u8]);

    /// Bytes waiting to be written to a connection.
    fn outbound(&mut self, id: ClientId) -> Option<&mut OutboundQueue>;

    /// Whether the service wants this connection torn down.
    fn is_closed(&self, id: ClientId) -> bool;

    /// The connection is gone, either lost or closed by the service.
    fn disconnected(&mut self, id: ClientId);
}
