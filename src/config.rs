use std::{
    net::{IpAddr, SocketAddr},
    str::FromStr,
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::packet::{KeyUnwrapper, PlainKeyUnwrapper, StaticKeyUnwrapper};

fn default_listen_address() -> String {
    "0.0.0.0".to_string()
}

/// Configuration for the ship server.
#[derive(Serialize, Deserialize)]
pub struct ShipConfig {
    #[serde(default = "ShipConfig::default_port")]
    pub port: u16,
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Longest the reactor waits for socket readiness before looping, in milliseconds.
    #[serde(default = "ShipConfig::default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

impl Default for ShipConfig {
    fn default() -> Self {
        Self {
            port: Self::default_port(),
            listen_address: default_listen_address(),
            poll_timeout_ms: Self::default_poll_timeout_ms(),
        }
    }
}

impl ShipConfig {
    /// Returns the configured IP address & port as a `SocketAddr`.
    pub fn get_socketaddr(&self) -> SocketAddr {
        SocketAddr::from((
            IpAddr::from_str(&self.listen_address).expect("Invalid IP address format in config!"),
            self.port,
        ))
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    fn default_port() -> u16 {
        12205
    }

    fn default_poll_timeout_ms() -> u64 {
        1000
    }
}

/// Configuration for server-side resources.
#[derive(Serialize, Deserialize)]
pub struct FilesystemConfig {
    /// Directory holding `objects/<zone>/`, with object definitions as captured `.bin` packets or `.json`.
    #[serde(default = "FilesystemConfig::default_resources")]
    pub resources: String,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            resources: Self::default_resources(),
        }
    }
}

impl FilesystemConfig {
    fn default_resources() -> String {
        "resources".to_string()
    }
}

/// How the session key is recovered from the client's key exchange blob.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KeyExchangeMode {
    /// The blob holds the token and key unwrapped.
    #[default]
    Plain,
    /// The key comes from `key_file`, shared with the client ahead of time.
    Static,
}

/// Configuration for the key exchange.
#[derive(Serialize, Deserialize)]
pub struct KeyExchangeConfig {
    #[serde(default)]
    pub mode: KeyExchangeMode,
    #[serde(default = "KeyExchangeConfig::default_key_file")]
    pub key_file: String,
}

impl Default for KeyExchangeConfig {
    fn default() -> Self {
        Self {
            mode: KeyExchangeMode::default(),
            key_file: Self::default_key_file(),
        }
    }
}

impl KeyExchangeConfig {
    /// Builds the unwrapper for the configured mode, reading the key file if it needs one.
    pub fn unwrapper(&self) -> std::io::Result<Box<dyn KeyUnwrapper>> {
        Ok(match self.mode {
            KeyExchangeMode::Plain => Box::new(PlainKeyUnwrapper),
            KeyExchangeMode::Static => Box::new(StaticKeyUnwrapper::from_file(&self.key_file)?),
        })
    }

    fn default_key_file() -> String {
        "key.bin".to_string()
    }
}

/// Global and all-encompassing config.
#[derive(Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub ship: ShipConfig,

    #[serde(default)]
    pub filesystem: FilesystemConfig,

    #[serde(default)]
    pub key_exchange: KeyExchangeConfig,

    /// Dumps every decrypted frame, in both directions, to `packets/<startup time>/<client id>/`.
    #[serde(default)]
    pub packet_debugging: bool,
}

pub fn get_config() -> Config {
    if let Ok(data) = std::fs::read_to_string("config.yaml") {
        serde_yaml_ng::from_str(&data).expect("Failed to parse")
    } else {
        Config::default()
    }
}
