use std::path::PathBuf;

use arks::common::timestamp_secs;
use arks::config::{KeyExchangeMode, get_config};
use arks::network::Reactor;
use arks::world::{HandlerRegistry, ShipServer, WorldState};

fn main() {
    tracing_subscriber::fmt::init();

    let config = get_config();

    if config.key_exchange.mode == KeyExchangeMode::Plain {
        tracing::warn!(
            "Key exchange blobs are read unwrapped, retail clients will not be able to finish the handshake!"
        );
    }
    let unwrapper = match config.key_exchange.unwrapper() {
        Ok(unwrapper) => unwrapper,
        Err(err) => {
            tracing::error!(
                "Failed to read key file {}: {err}",
                config.key_exchange.key_file
            );
            return;
        }
    };
    let handlers = HandlerRegistry::with_default_handlers(unwrapper);

    let mut server = ShipServer::new(WorldState::new(&config.filesystem.resources), handlers);
    if config.packet_debugging {
        let directory = PathBuf::from("packets").join(timestamp_secs().to_string());
        tracing::info!("Dumping packets to {}", directory.display());
        server = server.with_packet_dumps(directory);
    }

    let addr = config.ship.get_socketaddr();
    let mut reactor = match Reactor::bind(addr, config.ship.poll_timeout()) {
        Ok(reactor) => reactor,
        Err(err) => {
            tracing::error!("Failed to listen on {addr}: {err}");
            return;
        }
    };

    tracing::info!("Server started on {addr}");

    loop {
        if let Err(err) = reactor.run_once(&mut server) {
            tracing::error!("Failed to poll sockets: {err}");
        }
    }
}
