use std::{
    collections::HashMap,
    io::{self, Read},
    net::SocketAddr,
    time::Duration,
};

use mio::{
    Events, Interest, Poll, Token,
    net::{TcpListener, TcpStream},
};

use super::{ClientId, Service};

const LISTENER: Token = Token(0);

/// Size of the scratch buffer sockets are read into.
const READ_BUFFER_SIZE: usize = 16 * 1024;

/// Single-threaded readiness loop over the listening socket and every live connection.
///
/// Each connection's bytes reach the service in arrival order, and the service is only ever called from
/// inside `run_once`, so it never needs locking. Nothing is promised about the order between two
/// different connections.
pub struct Reactor {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    /// The listener has reported readiness and `accept` has not hit `WouldBlock` since.
    accept_pending: bool,
    connections: HashMap<ClientId, TcpStream>,
    next_id: usize,
    timeout: Duration,
    read_buffer: Box<[u8]>,
}

impl Reactor {
    pub fn bind(address: SocketAddr, timeout: Duration) -> io::Result<Self> {
        let poll = Poll::new()?;
        let mut listener = TcpListener::bind(address)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;

        Ok(Self {
            poll,
            events: Events::with_capacity(1024),
            listener,
            accept_pending: false,
            connections: HashMap::new(),
            next_id: 1,
            timeout,
            read_buffer: vec![0; READ_BUFFER_SIZE].into_boxed_slice(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Waits at most the configured timeout, then accepts one pending connection, reads every readable
    /// connection and flushes every connection that has queued output.
    pub fn run_once<S: Service>(&mut self, service: &mut S) -> io::Result<()> {
        let timeout = if self.accept_pending {
            Duration::ZERO
        } else {
            self.timeout
        };

        match self.poll.poll(&mut self.events, Some(timeout)) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::Interrupted => return Ok(()),
            Err(err) => return Err(err),
        }

        let mut readable = Vec::new();
        for event in self.events.iter() {
            match event.token() {
                LISTENER => self.accept_pending = true,
                Token(id) => {
                    if event.is_readable() || event.is_read_closed() || event.is_error() {
                        readable.push(ClientId(id));
                    }
                }
            }
        }

        if self.accept_pending {
            self.accept_one(service);
        }

        for id in readable {
            self.pump_readable(id, service);
        }

        self.flush_all(service);

        Ok(())
    }

    fn accept_one<S: Service>(&mut self, service: &mut S) {
        match self.listener.accept() {
            Ok((mut stream, address)) => {
                let id = ClientId(self.next_id);
                self.next_id += 1;

                if let Err(err) = self.poll.registry().register(
                    &mut stream,
                    Token(id.0),
                    Interest::READABLE | Interest::WRITABLE,
                ) {
                    tracing::warn!("Failed to register connection from {address}: {err}");
                    return;
                }

                self.connections.insert(id, stream);
                service.connected(id, address);
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => self.accept_pending = false,
            Err(err) => tracing::warn!("Failed to accept connection: {err}"),
        }
    }

    fn pump_readable<S: Service>(&mut self, id: ClientId, service: &mut S) {
        let Some(stream) = self.connections.get_mut(&id) else {
            return;
        };

        let lost = loop {
            match stream.read(&mut self.read_buffer) {
                Ok(0) => break true,
                Ok(count) => {
                    service.received(id, &self.read_buffer[..count]);
                    if service.is_closed(id) {
                        break false;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break false,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    tracing::warn!("Failed to read from {id}: {err}");
                    break true;
                }
            }
        };

        if lost {
            self.drop_connection(id, service);
        }
    }

    fn flush_all<S: Service>(&mut self, service: &mut S) {
        let ids: Vec<ClientId> = self.connections.keys().copied().collect();

        for id in ids {
            let Some(stream) = self.connections.get_mut(&id) else {
                continue;
            };

            let mut lost = false;
            if let Some(queue) = service.outbound(id)
                && !queue.is_empty()
                && let Err(err) = queue.egress(stream)
            {
                tracing::warn!("Failed to write to {id}: {err}");
                lost = true;
            }

            if lost || service.is_closed(id) {
                self.drop_connection(id, service);
            }
        }
    }

    fn drop_connection<S: Service>(&mut self, id: ClientId, service: &mut S) {
        if let Some(mut stream) = self.connections.remove(&id) {
            if let Err(err) = self.poll.registry().deregister(&mut stream) {
                tracing::debug!("Failed to deregister {id}: {err}");
            }
            service.disconnected(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::Write,
        net::{SocketAddr, TcpStream as StdTcpStream},
    };

    use super::*;
    use crate::network::OutboundQueue;

    /// Echoes everything back and records what happened.
    #[derive(Default)]
    struct EchoService {
        connected: Vec<ClientId>,
        disconnected: Vec<ClientId>,
        received: HashMap<ClientId, Vec<u8>>,
        queues: HashMap<ClientId, OutboundQueue>,
        closing: Vec<ClientId>,
    }

    impl Service for EchoService {
        fn connected(&mut self, id: ClientId, _address: SocketAddr) {
            self.connected.push(id);
            self.queues.insert(id, OutboundQueue::default());
        }

        fn received(&mut self, id: ClientId, data: &[u8]) {
            self.received.entry(id).or_default().extend_from_slice(data);
            if let Some(queue) = self.queues.get_mut(&id) {
                queue.push(data).unwrap();
            }
        }

        fn outbound(&mut self, id: ClientId) -> Option<&mut OutboundQueue> {
            self.queues.get_mut(&id)
        }

        fn is_closed(&self, id: ClientId) -> bool {
            self.closing.contains(&id)
        }

        fn disconnected(&mut self, id: ClientId) {
            self.disconnected.push(id);
            self.queues.remove(&id);
        }
    }

    fn run_until(
        reactor: &mut Reactor,
        service: &mut EchoService,
        mut done: impl FnMut(&EchoService) -> bool,
    ) {
        for _ in 0..200 {
            reactor.run_once(service).unwrap();
            if done(service) {
                return;
            }
        }
        panic!("reactor did not reach the expected state");
    }

    fn local_reactor() -> Reactor {
        Reactor::bind("127.0.0.1:0".parse().unwrap(), Duration::from_millis(10)).unwrap()
    }

    #[test]
    fn test_accept_echo_and_lose() {
        let mut reactor = local_reactor();
        let mut service = EchoService::default();

        let mut client = StdTcpStream::connect(reactor.local_addr().unwrap()).unwrap();
        run_until(&mut reactor, &mut service, |s| s.connected.len() == 1);
        let id = service.connected[0];

        client.write_all(b"hello").unwrap();
        run_until(&mut reactor, &mut service, |s| {
            s.received.get(&id).map(Vec::len) == Some(5)
        });

        let mut echoed = [0u8; 5];
        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        client.read_exact(&mut echoed).unwrap();
        assert_eq!(&echoed, b"hello");

        drop(client);
        run_until(&mut reactor, &mut service, |s| s.disconnected == [id]);
        assert_eq!(reactor.connection_count(), 0);
    }

    #[test]
    fn test_one_accept_per_iteration() {
        let mut reactor = local_reactor();
        let mut service = EchoService::default();
        let address = reactor.local_addr().unwrap();

        let _clients: Vec<StdTcpStream> = (0..3)
            .map(|_| StdTcpStream::connect(address).unwrap())
            .collect();

        let mut previous = 0;
        run_until(&mut reactor, &mut service, |s| {
            assert!(s.connected.len() <= previous + 1);
            previous = s.connected.len();
            s.connected.len() == 3
        });

        // ids are handed out in order and never reused
        assert_eq!(
            service.connected,
            [ClientId(1), ClientId(2), ClientId(3)]
        );
    }

    #[test]
    fn test_service_close_drops_connection() {
        let mut reactor = local_reactor();
        let mut service = EchoService::default();

        let mut client = StdTcpStream::connect(reactor.local_addr().unwrap()).unwrap();
        run_until(&mut reactor, &mut service, |s| s.connected.len() == 1);
        let id = service.connected[0];

        service.closing.push(id);
        client.write_all(b"bye").unwrap();
        run_until(&mut reactor, &mut service, |s| s.disconnected == [id]);
        assert_eq!(reactor.connection_count(), 0);
    }
}
