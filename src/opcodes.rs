pub mod client {
use crate::packet::Opcode;

pub const PING_RESPONSE: Opcode = Opcode::new(0x03, 0x0C);
pub const MOVEMENT: Opcode = Opcode::new(0x04, 0x07);
pub const MOVEMENT_ACTION: Opcode = Opcode::new(0x04, 0x08);
pub const ACTION_UPDATE: Opcode = Opcode::new(0x04, 0x3C);
pub const MOVEMENT_END: Opcode = Opcode::new(0x04, 0x71);
pub const KEY_EXCHANGE: Opcode = Opcode::new(0x11, 0x0B);
pub const CLIENT_TIME: Opcode = Opcode::new(0x11, 0x0D);
pub const GUILD_INFO_REQUEST: Opcode = Opcode::new(0x11, 0x1D);
pub const LOGOUT: Opcode = Opcode::new(0x11, 0x2B);
pub const CHARACTER_CREATE_ONE: Opcode = Opcode::new(0x11, 0x41);
pub const CHARACTER_CREATE_TWO: Opcode = Opcode::new(0x11, 0x54);

/// Returns a human-readable name of the opcode.
pub fn get_name(opcode: Opcode) -> &'static str {
match (opcode.kind, opcode.subtype) {
(0x03, 0x0C) => "PingResponse",
(0x04, 0x07) => "Movement",
(0x04, 0x08) => "MovementAction",
(0x04, 0x3C) => "ActionUpdate",
(0x04, 0x71) => "MovementEnd",
(0x11, 0x0B) => "KeyExchange",
(0x11, 0x0D) => "ClientTime",
(0x11, 0x1D) => "GuildInfoRequest",
(0x11, 0x2B) => "Logout",
(0x11, 0x41) => "CharacterCreateOne",
(0x11, 0x54) => "CharacterCreateTwo",
_ => "Unknown",
}
}
}

pub mod server {
use crate::packet::Opcode;

pub const WELCOME: Opcode = Opcode::new(0x03, 0x08);
pub const UNLOCK_CONTROLS: Opcode = Opcode::new(0x03, 0x2B);
pub const TELEPORT_TRANSFER: Opcode = Opcode::new(0x04, 0x02);
pub const MOVEMENT: Opcode = Opcode::new(0x04, 0x07);
pub const MOVEMENT_END: Opcode = Opcode::new(0x04, 0x71);
pub const MOVEMENT_ACTION: Opcode = Opcode::new(0x04, 0x80);
pub const ACTION_UPDATE: Opcode = Opcode::new(0x04, 0x81);
pub const CHARACTER_SPAWN: Opcode = Opcode::new(0x08, 0x04);
pub const OBJECT_SPAWN: Opcode = Opcode::new(0x08, 0x0B);
pub const KEY_EXCHANGE_RESPONSE: Opcode = Opcode::new(0x11, 0x0C);
pub const SERVER_TIME: Opcode = Opcode::new(0x11, 0x0E);
pub const CHARACTER_CREATE_ONE_RESPONSE: Opcode = Opcode::new(0x11, 0x42);
pub const CHARACTER_CREATE_TWO_RESPONSE: Opcode = Opcode::new(0x11, 0x55);
pub const SYSTEM_MESSAGE: Opcode = Opcode::new(0x19, 0x01);

/// Returns a human-readable name of the opcode.
pub fn get_name(opcode: Opcode) -> &'static str {
match (opcode.kind, opcode.subtype) {
(0x03, 0x08) => "Welcome",
(0x03, 0x2B) => "UnlockControls",
(0x04, 0x02) => "TeleportTransfer",
(0x04, 0x07) => "Movement",
(0x04, 0x71) => "MovementEnd",
(0x04, 0x80) => "MovementAction",
(0x04, 0x81) => "ActionUpdate",
(0x08, 0x04) => "CharacterSpawn",
(0x08, 0x0B) => "ObjectSpawn",
(0x11, 0x0C) => "KeyExchangeResponse",
(0x11, 0x0E) => "ServerTime",
(0x11, 0x42) => "CharacterCreateOneResponse",
(0x11, 0x55) => "CharacterCreateTwoResponse",
(0x19, 0x01) => "SystemMessage",
_ => "Unknown",
}
}
}

