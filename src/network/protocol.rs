//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every frame is a JSON text message `{"event": <name>, "data": <payload>}`,
//! with `data` omitted for payload-less events.

use serde::{Serialize, Deserialize};
use serde_json::Value;

use crate::game::card::{Card, CardId};
use crate::game::flip::GameResult;
use crate::game::state::{Seat, StakeAmount};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Claim a seat with a wallet.
    ConnectWallet(String),

    /// Register a stake.
    Register(RegisterRequest),

    /// Deal and start (or restart) the match.
    StartGame,

    /// Turn a card face up.
    FlipCard(CardId),

    /// Request a full state snapshot (for resynchronisation).
    SyncState,

    /// Ping for latency measurement.
    Ping(u64),
}

/// Registration payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Amount staked on-chain by the client, if it sent one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stake_amount: Option<StakeAmount>,
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Inbound decode failures.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Not a JSON envelope.
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Envelope named an event we do not handle.
    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    /// Payload had the wrong shape for the event.
    #[error("Invalid payload for {event}: {reason}")]
    InvalidPayload {
        /// Event name.
        event: String,
        /// What was wrong.
        reason: String,
    },
}

fn payload<T: serde::de::DeserializeOwned>(event: &str, data: Value) -> Result<T, DecodeError> {
    serde_json::from_value(data).map_err(|e| DecodeError::InvalidPayload {
        event: event.to_string(),
        reason: e.to_string(),
    })
}

/// Accepts `"0.5"` or `0.5`; a missing or null stake still registers.
fn stake_amount(event: &str, data: Value) -> Result<Option<StakeAmount>, DecodeError> {
    let raw = match data {
        Value::Object(mut map) => map.remove("stakeAmount").unwrap_or(Value::Null),
        other => other,
    };
    match raw {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(StakeAmount(s))),
        Value::Number(n) => Ok(Some(StakeAmount(n.to_string()))),
        other => Err(DecodeError::InvalidPayload {
            event: event.to_string(),
            reason: format!("stakeAmount must be a string or number, got {}", other),
        }),
    }
}

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    ///
    /// Payloads on payload-less events (the client sends `start-game` with
    /// its stake attached) are ignored.
    pub fn from_json(s: &str) -> Result<Self, DecodeError> {
        let Envelope { event, data } = serde_json::from_str(s)?;

        let msg = match event.as_str() {
            "connect-wallet" => ClientMessage::ConnectWallet(payload(&event, data)?),
            "register" => ClientMessage::Register(RegisterRequest {
                stake_amount: stake_amount(&event, data)?,
            }),
            "start-game" => ClientMessage::StartGame,
            "flip-card" => ClientMessage::FlipCard(payload(&event, data)?),
            "sync-state" => ClientMessage::SyncState,
            "ping" => ClientMessage::Ping(payload(&event, data)?),
            _ => return Err(DecodeError::UnknownEvent(event)),
        };

        Ok(msg)
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Wallet already seated; current roster.
    WalletConnected(Vec<String>),

    /// Seat assigned to the caller.
    PlayerInfo(Seat),

    /// Both seats taken; the connection is closed next.
    GameFull,

    /// Both players registered.
    ShowPlayButton,

    /// Fresh deal.
    StartGame(GameStart),

    /// Start refused.
    NotReady,

    /// Full board.
    UpdateBoard(Vec<Card>),

    /// Scores in seat order.
    UpdateScores(Vec<u32>),

    /// Turn passed.
    ChangeTurn(Seat),

    /// Every card matched.
    GameOver(GameResult),

    /// A player disconnected and the match was reset.
    PlayerLeft,

    /// Full state for a resynchronising client.
    StateSnapshot(StateSnapshot),

    /// Pong response.
    Pong(Pong),

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    ServerShutdown(Shutdown),
}

/// Payload of `start-game`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStart {
    /// Shuffled deck.
    pub cards: Vec<Card>,
    /// Opening turn.
    pub turn: Seat,
}

/// Payload of `state-snapshot`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Board (empty in the lobby).
    pub cards: Vec<Card>,
    /// Current turn, if a match is running.
    pub turn: Option<Seat>,
    /// Scores in seat order.
    pub scores: Vec<u32>,
    /// Wallet roster in seat order.
    pub wallets: Vec<String>,
    /// Caller's seat, if seated.
    pub seat: Option<Seat>,
}

/// Payload of `pong`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pong {
    /// Echoed client timestamp.
    pub timestamp: u64,
    /// Server wall clock (Unix ms).
    pub server_time: i64,
}

/// Payload of `server-shutdown`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shutdown {
    /// Why.
    pub reason: String,
}

/// Server error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Frame could not be decoded.
    InvalidInput,
    /// Connection limit reached.
    ServerOverloaded,
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Wire event name, for logs.
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMessage::WalletConnected(_) => "wallet-connected",
            ServerMessage::PlayerInfo(_) => "player-info",
            ServerMessage::GameFull => "game-full",
            ServerMessage::ShowPlayButton => "show-play-button",
            ServerMessage::StartGame(_) => "start-game",
            ServerMessage::NotReady => "not-ready",
            ServerMessage::UpdateBoard(_) => "update-board",
            ServerMessage::UpdateScores(_) => "update-scores",
            ServerMessage::ChangeTurn(_) => "change-turn",
            ServerMessage::GameOver(_) => "game-over",
            ServerMessage::PlayerLeft => "player-left",
            ServerMessage::StateSnapshot(_) => "state-snapshot",
            ServerMessage::Pong(_) => "pong",
            ServerMessage::Error(_) => "error",
            ServerMessage::ServerShutdown(_) => "server-shutdown",
        }
    }
}
