//! Network Layer
//!
//! WebSocket server, wire protocol and session management.
//! All game rules live in `game/`; this layer turns their outcomes into events.

pub mod protocol;
pub mod session;
pub mod server;

pub use protocol::{ClientMessage, ServerMessage, DecodeError, ErrorCode};
pub use session::{GameSession, SessionId, SessionConfig, SessionManager, SessionError, Outbound};
pub use server::{GameServer, ServerConfig, GameServerError, ConfigError};
