//! A ship server replacement for a certain online action RPG.

/// Common functions and structures used in parsing and also useful for the server.
pub mod common;

/// Config management.
pub mod config;

/// Everything packet framing and encryption related.
pub mod packet;

#[rustfmt::skip]
#[doc(hidden)]
pub mod opcodes;

/// Packet bodies.
pub mod ipc;

/// The socket reactor.
pub mod network;

/// Sessions, handlers and the shared world registries.
pub mod world;
