//! Game Logic Module
//!
//! Rules of the memory match, independent of any transport.
//!
//! ## Module Structure
//!
//! - `card`: Faces, cards and the twelve-card deck
//! - `state`: Seats, players and the match state machine
//! - `flip`: Flip validation, pair resolution and game over

pub mod card;
pub mod state;
pub mod flip;

// Re-export key types
pub use card::{Card, CardId, Deck, Face, DECK_SIZE};
pub use state::{ConnectionId, MatchState, Player, Seat, StakeAmount, Winner, MAX_PLAYERS};
pub use flip::{FlipOutcome, GameResult, PendingReset, ResetOutcome, Resolution};
