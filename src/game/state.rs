//! Match State
//!
//! The authoritative record for one match: seated players, the deck and
//! whose turn it is. Lobby operations (join, register, leave, start) live
//! here; card resolution lives in `flip.rs`.

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::rng::DeterministicRng;
use crate::game::card::{Card, Deck};

/// Seats available in a match.
pub const MAX_PLAYERS: usize = 2;

// =============================================================================
// CONNECTION ID
// =============================================================================

/// Transport connection identifier (UUID as bytes), assigned at accept time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub [u8; 16]);

impl ConnectionId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Fresh random id.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().into_bytes())
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..4]))
    }
}

// =============================================================================
// SEAT / WINNER
// =============================================================================

/// Seat 1 or 2. Doubles as the turn indicator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Seat {
    /// First player to join.
    One,
    /// Second player to join.
    Two,
}

impl Seat {
    /// Seat for a zero-based player index.
    pub fn from_index(index: usize) -> Option<Seat> {
        match index {
            0 => Some(Seat::One),
            1 => Some(Seat::Two),
            _ => None,
        }
    }

    /// Zero-based player index.
    pub fn index(self) -> usize {
        match self {
            Seat::One => 0,
            Seat::Two => 1,
        }
    }

    /// The other seat.
    pub fn other(self) -> Seat {
        match self {
            Seat::One => Seat::Two,
            Seat::Two => Seat::One,
        }
    }
}

impl From<Seat> for u8 {
    fn from(seat: Seat) -> u8 {
        seat.index() as u8 + 1
    }
}

impl TryFrom<u8> for Seat {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Seat::One),
            2 => Ok(Seat::Two),
            other => Err(format!("invalid seat {}", other)),
        }
    }
}

/// Outcome of a finished match. Serializes as 1, 2, or 0 for a draw.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Winner {
    /// Equal scores.
    Draw,
    /// The seat with strictly more pairs.
    Seat(Seat),
}

impl Winner {
    /// Decide from two scores.
    pub fn from_scores(first: u32, second: u32) -> Winner {
        if first > second {
            Winner::Seat(Seat::One)
        } else if second > first {
            Winner::Seat(Seat::Two)
        } else {
            Winner::Draw
        }
    }
}

impl From<Winner> for u8 {
    fn from(winner: Winner) -> u8 {
        match winner {
            Winner::Draw => 0,
            Winner::Seat(seat) => seat.into(),
        }
    }
}

impl TryFrom<u8> for Winner {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Winner::Draw),
            other => Seat::try_from(other).map(Winner::Seat),
        }
    }
}

// =============================================================================
// PLAYER
// =============================================================================

/// Stake amount as entered in the client (an ether decimal string).
///
/// Opaque to the server; recorded for the presentation layer and logs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StakeAmount(pub String);

/// A seated player.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Player {
    /// Connection that joined with this wallet.
    pub connection: ConnectionId,
    /// Wallet identifier, unique among seated players.
    pub wallet: String,
    /// Pairs found.
    pub score: u32,
    /// Registered (staked) and ready to play.
    pub registered: bool,
    /// Stake recorded at registration.
    pub stake_amount: Option<StakeAmount>,
}

impl Player {
    fn new(connection: ConnectionId, wallet: String) -> Self {
        Self {
            connection,
            wallet,
            score: 0,
            registered: false,
            stake_amount: None,
        }
    }
}

// =============================================================================
// OUTCOMES
// =============================================================================

/// Result of a wallet-connect attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Wallet already seated; carries the current roster.
    AlreadyConnected(Vec<String>),
    /// New player seated.
    Seated(Seat),
    /// Both seats taken.
    Full,
}

/// Result of a registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// Connection has no seat.
    UnknownPlayer,
    /// Player registered; `all_ready` when both seats are filled and registered.
    Registered {
        /// Both players are now registered.
        all_ready: bool,
    },
}

/// Result of a connection leaving.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Connection had no seat.
    NotSeated,
    /// Player removed.
    Left {
        /// Fewer than two players remain, so the match was reset.
        reset: bool,
    },
}

/// Reasons a match cannot start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StartError {
    /// Not exactly two registered players.
    #[error("Players not ready")]
    NotReady,
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// Authoritative state for one match.
#[derive(Clone, Debug, Default)]
pub struct MatchState {
    /// Seated players in join order (seat 1 first).
    pub(crate) players: Vec<Player>,
    /// The board.
    pub(crate) deck: Deck,
    /// Whose turn it is, when a match is running.
    pub(crate) turn: Option<Seat>,
    /// Bumped whenever the deck is dealt or cleared.
    pub(crate) generation: u64,
}

impl MatchState {
    /// Empty lobby.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seated players.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Current board.
    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    /// Cards in board order.
    pub fn cards(&self) -> &[Card] {
        self.deck.cards()
    }

    /// Current turn.
    pub fn turn(&self) -> Option<Seat> {
        self.turn
    }

    /// Deck generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wallet roster in seat order.
    pub fn wallets(&self) -> Vec<String> {
        self.players.iter().map(|p| p.wallet.clone()).collect()
    }

    /// Scores in seat order.
    pub fn scores(&self) -> Vec<u32> {
        self.players.iter().map(|p| p.score).collect()
    }

    /// Seat held by a connection.
    pub fn seat_of(&self, connection: &ConnectionId) -> Option<Seat> {
        self.players
            .iter()
            .position(|p| p.connection == *connection)
            .and_then(Seat::from_index)
    }

    /// Player in a seat.
    pub fn player(&self, seat: Seat) -> Option<&Player> {
        self.players.get(seat.index())
    }

    /// Both seats filled and registered.
    pub fn all_registered(&self) -> bool {
        self.players.len() == MAX_PLAYERS && self.players.iter().all(|p| p.registered)
    }

    /// Seat a wallet, or report why not.
    pub fn join(&mut self, connection: ConnectionId, wallet: &str) -> JoinOutcome {
        if self.players.iter().any(|p| p.wallet == wallet) {
            return JoinOutcome::AlreadyConnected(self.wallets());
        }

        if self.players.len() >= MAX_PLAYERS {
            return JoinOutcome::Full;
        }

        self.players.push(Player::new(connection, wallet.to_string()));
        match Seat::from_index(self.players.len() - 1) {
            Some(seat) => JoinOutcome::Seated(seat),
            None => JoinOutcome::Full,
        }
    }

    /// Mark a connection's player as registered with a stake.
    ///
    /// Not idempotence-guarded: `all_ready` is reported on every call while
    /// both players are registered.
    pub fn register(
        &mut self,
        connection: &ConnectionId,
        stake: Option<StakeAmount>,
    ) -> RegisterOutcome {
        let Some(player) = self.players.iter_mut().find(|p| p.connection == *connection) else {
            return RegisterOutcome::UnknownPlayer;
        };
        player.registered = true;
        player.stake_amount = stake;

        RegisterOutcome::Registered {
            all_ready: self.all_registered(),
        }
    }

    /// Remove a connection's player. Dropping below two players discards the
    /// deck and clears the turn.
    pub fn leave(&mut self, connection: &ConnectionId) -> LeaveOutcome {
        let Some(index) = self.players.iter().position(|p| p.connection == *connection) else {
            return LeaveOutcome::NotSeated;
        };
        self.players.remove(index);

        let reset = self.players.len() < MAX_PLAYERS;
        if reset {
            self.deck.clear();
            self.turn = None;
            self.generation += 1;
        }

        LeaveOutcome::Left { reset }
    }

    /// Deal a fresh shuffled deck and hand the turn to seat 1.
    ///
    /// Restarting a running match is allowed and redeals with scores at zero.
    pub fn start(&mut self, rng: &mut DeterministicRng) -> Result<(), StartError> {
        if !self.all_registered() {
            return Err(StartError::NotReady);
        }
        self.install_deck(Deck::shuffled(rng));
        Ok(())
    }

    /// Replace the board with `deck`, zero the scores and give seat 1 the turn.
    pub(crate) fn install_deck(&mut self, deck: Deck) {
        for player in &mut self.players {
            player.score = 0;
        }
        self.deck = deck;
        self.turn = Some(Seat::One);
        self.generation += 1;
    }
}
