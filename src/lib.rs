//! # Memory Match Game Server
//!
//! Authoritative coordinator for a two-player memory matching game with
//! on-chain stakes.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   MEMORY MATCH SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  └── rng.rs      - Seeded PRNG and deal seed derivation      │
//! │                                                              │
//! │  game/           - Game rules (transport independent)        │
//! │  ├── card.rs     - Faces, cards and the deck                 │
//! │  ├── state.rs    - Seats, players, join/register/leave       │
//! │  └── flip.rs     - Flip resolution and game over             │
//! │                                                              │
//! │  network/        - Networking                                │
//! │  ├── server.rs   - WebSocket server                          │
//! │  ├── protocol.rs - Message types                             │
//! │  └── session.rs  - Game session management                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Session Model
//!
//! One lobby session holds at most two seated players. Every mutation of
//! a session happens under its write lock, including the delayed
//! turn-back of a mismatched pair, which is tagged with the deck
//! generation it belongs to and skipped once that deck is gone.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use crate::core::rng::DeterministicRng;
pub use game::card::{Card, Deck, Face};
pub use game::state::{ConnectionId, MatchState, Seat, Winner};
pub use network::server::{GameServer, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
