//! Game Session Management
//!
//! A `GameSession` owns the authoritative `MatchState` for one match plus the
//! outbound queue of every connection attached to it, and turns game
//! outcomes into wire events. The `SessionManager` is the registry of
//! sessions keyed by `SessionId`; the server runs exactly one.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::core::rng::{derive_deal_seed, DeterministicRng};
use crate::game::card::CardId;
use crate::game::flip::{FlipOutcome, PendingReset, ResetOutcome, Resolution};
use crate::game::state::{
    ConnectionId, JoinOutcome, LeaveOutcome, MatchState, RegisterOutcome, StakeAmount,
};
use crate::network::protocol::{GameStart, ServerMessage, StateSnapshot};

/// Unique session identifier.
pub type SessionId = [u8; 16];

/// Item on a connection's outbound queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Deliver a message.
    Message(ServerMessage),
    /// Close the connection after everything queued before it.
    Close,
}

/// Configuration for a game session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a mismatched pair stays face up.
    pub mismatch_reset_delay: Duration,
    /// Fixed entropy for reproducible deals; fresh entropy per deal if `None`.
    pub deal_seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mismatch_reset_delay: Duration::from_secs(1),
            deal_seed: None,
        }
    }
}

/// A game session.
pub struct GameSession {
    /// Unique session identifier.
    pub id: SessionId,
    /// Session configuration.
    pub config: SessionConfig,
    /// Authoritative game state.
    state: MatchState,
    /// Every attached connection, seated or not.
    connections: BTreeMap<ConnectionId, mpsc::Sender<Outbound>>,
    /// Deals so far (feeds seed derivation).
    deals: u64,
}

impl GameSession {
    /// Create a new session.
    pub fn new(id: SessionId, config: SessionConfig) -> Self {
        Self {
            id,
            config,
            state: MatchState::new(),
            connections: BTreeMap::new(),
            deals: 0,
        }
    }

    /// Authoritative state (read-only).
    pub fn match_state(&self) -> &MatchState {
        &self.state
    }

    /// Number of attached connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn short_id(&self) -> String {
        hex::encode(&self.id[..4])
    }

    // =========================================================================
    // Delivery
    // =========================================================================

    fn deliver(connection: &ConnectionId, sender: &mpsc::Sender<Outbound>, item: Outbound) {
        match sender.try_send(item) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(item)) => {
                warn!("Outbound queue full for {}, dropping {:?}", connection, item);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Outbound queue closed for {}", connection);
            }
        }
    }

    /// Send a message to one connection.
    pub fn send_to(&self, connection: &ConnectionId, message: ServerMessage) {
        if let Some(sender) = self.connections.get(connection) {
            Self::deliver(connection, sender, Outbound::Message(message));
        }
    }

    /// Broadcast a message to every attached connection.
    pub fn broadcast(&self, message: ServerMessage) {
        debug!("Broadcasting {} to {} connections", message.event_name(), self.connections.len());
        for (connection, sender) in &self.connections {
            Self::deliver(connection, sender, Outbound::Message(message.clone()));
        }
    }

    /// Stop routing session traffic to `connection` and queue its close.
    ///
    /// A close that finds the queue full waits for room instead of being dropped.
    fn close(&mut self, connection: &ConnectionId) {
        let Some(sender) = self.connections.remove(connection) else {
            return;
        };
        if let Err(mpsc::error::TrySendError::Full(item)) = sender.try_send(Outbound::Close) {
            debug!("Outbound queue full for {}, close deferred", connection);
            tokio::spawn(async move {
                let _ = sender.send(item).await;
            });
        }
    }

    // =========================================================================
    // Connection lifecycle
    // =========================================================================

    /// Attach a transport connection.
    pub fn attach(&mut self, connection: ConnectionId, sender: mpsc::Sender<Outbound>) {
        self.connections.insert(connection, sender);
        debug!("Connection {} attached to session {}", connection, self.short_id());
    }

    /// Detach a connection and run the disconnect rules for its seat.
    pub fn detach(&mut self, connection: &ConnectionId) {
        self.connections.remove(connection);

        match self.state.leave(connection) {
            LeaveOutcome::NotSeated => {
                debug!("Connection {} left without a seat", connection);
            }
            LeaveOutcome::Left { reset } => {
                info!("Player {} disconnected", connection);
                if reset {
                    info!("Not enough players, game reset");
                    self.broadcast(ServerMessage::PlayerLeft);
                }
            }
        }
    }

    /// Close every connection with a final message.
    pub fn close_all(&mut self, message: ServerMessage) {
        self.broadcast(message);
        let connections: Vec<ConnectionId> = self.connections.keys().copied().collect();
        for connection in connections {
            self.close(&connection);
        }
    }

    // =========================================================================
    // Inbound events
    // =========================================================================

    /// `connect-wallet`
    pub fn connect_wallet(&mut self, connection: ConnectionId, wallet: &str) {
        info!("Wallet connection request from {} for {}", connection, wallet);

        match self.state.join(connection, wallet) {
            JoinOutcome::AlreadyConnected(roster) => {
                info!("Wallet {} already connected", wallet);
                self.send_to(&connection, ServerMessage::WalletConnected(roster));
            }
            JoinOutcome::Seated(seat) => {
                info!("New player joined with wallet {} in seat {}", wallet, u8::from(seat));
                self.send_to(&connection, ServerMessage::PlayerInfo(seat));
            }
            JoinOutcome::Full => {
                info!("Game is full, rejecting {}", connection);
                self.send_to(&connection, ServerMessage::GameFull);
                self.close(&connection);
            }
        }
    }

    /// `register`
    pub fn register(&mut self, connection: ConnectionId, stake: Option<StakeAmount>) {
        let shown = stake.as_ref().map_or("none", |s| s.0.as_str());
        info!("Player {} registering with stake {}", connection, shown);

        match self.state.register(&connection, stake) {
            RegisterOutcome::UnknownPlayer => {
                debug!("Register from unseated connection {}", connection);
            }
            RegisterOutcome::Registered { all_ready: true } => {
                info!("Both players registered, ready to start");
                self.broadcast(ServerMessage::ShowPlayButton);
            }
            RegisterOutcome::Registered { all_ready: false } => {}
        }
    }

    /// `start-game`
    pub fn start_game(&mut self, connection: ConnectionId) {
        info!("Start game request from {}", connection);

        if !self.state.all_registered() {
            info!("Not all players are ready");
            self.send_to(&connection, ServerMessage::NotReady);
            return;
        }

        self.deals += 1;
        let entropy = match self.config.deal_seed {
            Some(seed) => seed.to_le_bytes().to_vec(),
            None => uuid::Uuid::new_v4().into_bytes().to_vec(),
        };
        let mut rng = DeterministicRng::new(derive_deal_seed(&self.id, self.deals, &entropy));

        if self.state.start(&mut rng).is_err() {
            self.send_to(&connection, ServerMessage::NotReady);
            return;
        }

        info!("Both players are ready, dealing deck #{}", self.deals);
        if let Some(turn) = self.state.turn() {
            self.broadcast(ServerMessage::StartGame(GameStart {
                cards: self.state.cards().to_vec(),
                turn,
            }));
        }
    }

    /// `flip-card`. Returns the mismatch-reset to schedule, if any.
    pub fn flip_card(&mut self, connection: ConnectionId, card_id: CardId) -> Option<PendingReset> {
        debug!("Player {} flipped card {}", connection, card_id);

        let (resolution, game_over) = match self.state.flip(card_id) {
            FlipOutcome::Ignored => return None,
            FlipOutcome::Flipped { resolution, game_over } => (resolution, game_over),
        };

        self.broadcast(ServerMessage::UpdateBoard(self.state.cards().to_vec()));

        let pending = match resolution {
            Resolution::Unresolved => None,
            Resolution::Matched { .. } => {
                info!("Cards match");
                self.broadcast(ServerMessage::UpdateScores(self.state.scores()));
                None
            }
            Resolution::Mismatched(pending) => {
                info!("Cards {} and {} don't match, flipping back", pending.first, pending.second);
                Some(pending)
            }
        };

        if let Some(result) = game_over {
            info!("Game over, scores {:?}, winner {}", result.final_scores, u8::from(result.winner));
            self.broadcast(ServerMessage::GameOver(result));
        }

        pending
    }

    /// Deferred half of a mismatch: unflip, broadcast board, pass turn.
    pub fn resolve_mismatch(&mut self, pending: PendingReset) {
        match self.state.apply_reset(pending) {
            ResetOutcome::Stale => {
                debug!(
                    "Dropping stale mismatch reset for cards {} and {}",
                    pending.first, pending.second
                );
            }
            ResetOutcome::Reset { turn } => {
                self.broadcast(ServerMessage::UpdateBoard(self.state.cards().to_vec()));
                if let Some(turn) = turn {
                    self.broadcast(ServerMessage::ChangeTurn(turn));
                }
            }
        }
    }

    /// `sync-state`
    pub fn send_snapshot(&self, connection: &ConnectionId) {
        self.send_to(connection, ServerMessage::StateSnapshot(StateSnapshot {
            cards: self.state.cards().to_vec(),
            turn: self.state.turn(),
            scores: self.state.scores(),
            wallets: self.state.wallets(),
            seat: self.state.seat_of(connection),
        }));
    }
}

/// Session errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// No session with this id.
    #[error("Session not found")]
    SessionNotFound,

    /// Connection is not attached to any session.
    #[error("Connection not attached")]
    NotAttached,
}

// =============================================================================
// SESSION MANAGER
// =============================================================================

/// Registry of sessions and the connections routed to them.
pub struct SessionManager {
    /// Active sessions.
    sessions: RwLock<BTreeMap<SessionId, Arc<RwLock<GameSession>>>>,
    /// Connection to session mapping.
    connection_sessions: RwLock<BTreeMap<ConnectionId, SessionId>>,
}

impl SessionManager {
    /// Create a manager holding one session, returning its id.
    pub fn with_session(config: SessionConfig) -> (Self, SessionId) {
        let id = uuid::Uuid::new_v4().into_bytes();
        let mut sessions = BTreeMap::new();
        sessions.insert(id, Arc::new(RwLock::new(GameSession::new(id, config))));

        let manager = Self {
            sessions: RwLock::new(sessions),
            connection_sessions: RwLock::new(BTreeMap::new()),
        };
        (manager, id)
    }

    /// Get a session by ID.
    pub async fn get_session(&self, id: &SessionId) -> Option<Arc<RwLock<GameSession>>> {
        let sessions = self.sessions.read().await;
        sessions.get(id).cloned()
    }

    /// Get the session a connection is attached to.
    pub async fn get_connection_session(
        &self,
        connection: &ConnectionId,
    ) -> Option<Arc<RwLock<GameSession>>> {
        let session_id = {
            let connection_sessions = self.connection_sessions.read().await;
            connection_sessions.get(connection).copied()
        };
        match session_id {
            Some(id) => self.get_session(&id).await,
            None => None,
        }
    }

    /// Attach a connection to a session.
    pub async fn attach(
        &self,
        session_id: SessionId,
        connection: ConnectionId,
        sender: mpsc::Sender<Outbound>,
    ) -> Result<(), SessionError> {
        let session = self
            .get_session(&session_id)
            .await
            .ok_or(SessionError::SessionNotFound)?;

        session.write().await.attach(connection, sender);
        self.connection_sessions.write().await.insert(connection, session_id);
        Ok(())
    }

    /// Detach a connection from its session, running the disconnect rules.
    pub async fn detach(&self, connection: &ConnectionId) -> Result<(), SessionError> {
        let session_id = self
            .connection_sessions
            .write()
            .await
            .remove(connection)
            .ok_or(SessionError::NotAttached)?;

        let session = self
            .get_session(&session_id)
            .await
            .ok_or(SessionError::SessionNotFound)?;
        session.write().await.detach(connection);
        Ok(())
    }

    /// All sessions.
    pub async fn all_sessions(&self) -> Vec<Arc<RwLock<GameSession>>> {
        let sessions = self.sessions.read().await;
        sessions.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::card::{Deck, DECK_SIZE};
    use crate::game::flip::GameResult;
    use crate::game::state::{Seat, Winner};

    fn create_test_session() -> GameSession {
        let config = SessionConfig {
            deal_seed: Some(7),
            ..Default::default()
        };
        GameSession::new([0; 16], config)
    }

    fn conn(n: u8) -> ConnectionId {
        ConnectionId::new([n; 16])
    }

    fn attach(session: &mut GameSession, n: u8) -> mpsc::Receiver<Outbound> {
        let (tx, rx) = mpsc::channel(64);
        session.attach(conn(n), tx);
        rx
    }

    fn drain(rx: &mut mpsc::Receiver<Outbound>) -> Vec<Outbound> {
        let mut items = Vec::new();
        while let Ok(item) = rx.try_recv() {
            items.push(item);
        }
        items
    }

    fn messages(rx: &mut mpsc::Receiver<Outbound>) -> Vec<ServerMessage> {
        drain(rx)
            .into_iter()
            .filter_map(|item| match item {
                Outbound::Message(m) => Some(m),
                Outbound::Close => None,
            })
            .collect()
    }

    fn stake() -> Option<StakeAmount> {
        Some(StakeAmount("0.01".to_string()))
    }

    /// Two seated, registered players; receivers already drained.
    fn ready_session() -> (GameSession, mpsc::Receiver<Outbound>, mpsc::Receiver<Outbound>) {
        let mut session = create_test_session();
        let mut rx1 = attach(&mut session, 1);
        let mut rx2 = attach(&mut session, 2);
        session.connect_wallet(conn(1), "0xaaa");
        session.connect_wallet(conn(2), "0xbbb");
        session.register(conn(1), stake());
        session.register(conn(2), stake());
        drain(&mut rx1);
        drain(&mut rx2);
        (session, rx1, rx2)
    }

    /// Like `ready_session` but with the unshuffled deck dealt.
    fn running_session() -> (GameSession, mpsc::Receiver<Outbound>, mpsc::Receiver<Outbound>) {
        let (mut session, rx1, rx2) = ready_session();
        session.state.install_deck(Deck::ordered());
        (session, rx1, rx2)
    }

    #[tokio::test]
    async fn test_join_sends_seat() {
        let mut session = create_test_session();
        let mut rx1 = attach(&mut session, 1);
        let mut rx2 = attach(&mut session, 2);

        session.connect_wallet(conn(1), "0xaaa");
        session.connect_wallet(conn(2), "0xbbb");

        assert_eq!(messages(&mut rx1), vec![ServerMessage::PlayerInfo(Seat::One)]);
        assert_eq!(messages(&mut rx2), vec![ServerMessage::PlayerInfo(Seat::Two)]);
    }

    #[tokio::test]
    async fn test_duplicate_wallet_gets_roster() {
        let mut session = create_test_session();
        let mut rx1 = attach(&mut session, 1);
        session.connect_wallet(conn(1), "0xaaa");
        drain(&mut rx1);

        session.connect_wallet(conn(1), "0xaaa");
        assert_eq!(
            messages(&mut rx1),
            vec![ServerMessage::WalletConnected(vec!["0xaaa".to_string()])]
        );
        assert_eq!(session.match_state().players().len(), 1);
    }

    #[tokio::test]
    async fn test_third_wallet_rejected_and_closed() {
        let (mut session, mut rx1, _rx2) = ready_session();
        let mut rx3 = attach(&mut session, 3);

        session.connect_wallet(conn(3), "0xccc");
        assert_eq!(
            drain(&mut rx3),
            vec![Outbound::Message(ServerMessage::GameFull), Outbound::Close]
        );
        assert!(drain(&mut rx1).is_empty());

        // Leaving without a seat changes nothing for the others
        session.detach(&conn(3));
        assert!(drain(&mut rx1).is_empty());
        assert_eq!(session.match_state().players().len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_connection_closed_when_queue_full() {
        let (mut session, _rx1, _rx2) = ready_session();
        let (tx, mut rx3) = mpsc::channel(1);
        session.attach(conn(3), tx);

        session.connect_wallet(conn(3), "0xccc");
        assert_eq!(session.connection_count(), 2);

        // No longer routed to once rejected
        session.broadcast(ServerMessage::ShowPlayButton);

        assert_eq!(rx3.recv().await, Some(Outbound::Message(ServerMessage::GameFull)));
        let next = tokio::time::timeout(Duration::from_secs(1), rx3.recv())
            .await
            .unwrap();
        assert_eq!(next, Some(Outbound::Close));
    }

    #[tokio::test]
    async fn test_show_play_button_once_both_registered() {
        let mut session = create_test_session();
        let mut rx1 = attach(&mut session, 1);
        let mut rx2 = attach(&mut session, 2);
        let mut spectator = attach(&mut session, 3);
        session.connect_wallet(conn(1), "0xaaa");
        session.connect_wallet(conn(2), "0xbbb");
        drain(&mut rx1);
        drain(&mut rx2);

        session.register(conn(1), stake());
        assert!(drain(&mut rx1).is_empty());

        session.register(conn(2), stake());
        assert_eq!(messages(&mut rx1), vec![ServerMessage::ShowPlayButton]);
        assert_eq!(messages(&mut rx2), vec![ServerMessage::ShowPlayButton]);
        assert_eq!(messages(&mut spectator), vec![ServerMessage::ShowPlayButton]);

        // Re-registering re-broadcasts
        session.register(conn(1), stake());
        assert_eq!(messages(&mut rx2), vec![ServerMessage::ShowPlayButton]);
    }

    #[tokio::test]
    async fn test_start_without_ready_replies_to_caller_only() {
        let mut session = create_test_session();
        let mut rx1 = attach(&mut session, 1);
        let mut rx2 = attach(&mut session, 2);
        session.connect_wallet(conn(1), "0xaaa");
        drain(&mut rx1);

        session.start_game(conn(2));
        assert_eq!(messages(&mut rx2), vec![ServerMessage::NotReady]);
        assert!(drain(&mut rx1).is_empty());
        assert!(session.match_state().deck().is_empty());
    }

    #[tokio::test]
    async fn test_start_broadcasts_deck_and_turn() {
        let (mut session, mut rx1, mut rx2) = ready_session();

        session.start_game(conn(1));

        let sent = messages(&mut rx2);
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            ServerMessage::StartGame(start) => {
                assert_eq!(start.turn, Seat::One);
                assert_eq!(start.cards.len(), DECK_SIZE);
                assert_eq!(&start.cards[..], session.match_state().cards());
            }
            other => panic!("expected start-game, got {:?}", other),
        }
        assert_eq!(messages(&mut rx1).len(), 1);
        assert!(session.match_state().deck().is_well_formed());
    }

    #[tokio::test]
    async fn test_seeded_sessions_deal_identically() {
        let (mut a, _, _) = ready_session();
        let (mut b, _, _) = ready_session();

        a.start_game(conn(1));
        b.start_game(conn(1));
        assert_eq!(a.match_state().cards(), b.match_state().cards());

        // Restart redeals with the next deal seed
        let first = a.match_state().cards().to_vec();
        a.start_game(conn(2));
        assert_ne!(a.match_state().cards(), &first[..]);
        assert_eq!(a.match_state().turn(), Some(Seat::One));
    }

    #[tokio::test]
    async fn test_ignored_flip_sends_nothing() {
        let (mut session, mut rx1, _rx2) = running_session();

        assert!(session.flip_card(conn(1), 99).is_none());
        assert!(drain(&mut rx1).is_empty());

        session.flip_card(conn(1), 1);
        drain(&mut rx1);
        assert!(session.flip_card(conn(2), 1).is_none());
        assert!(drain(&mut rx1).is_empty());
    }

    #[tokio::test]
    async fn test_match_broadcasts_board_then_scores() {
        let (mut session, mut rx1, _rx2) = running_session();

        assert!(session.flip_card(conn(1), 1).is_none());
        assert!(session.flip_card(conn(1), 2).is_none());

        let sent = messages(&mut rx1);
        assert_eq!(sent.len(), 3);
        assert!(matches!(sent[0], ServerMessage::UpdateBoard(_)));
        assert!(matches!(sent[1], ServerMessage::UpdateBoard(_)));
        assert_eq!(sent[2], ServerMessage::UpdateScores(vec![1, 0]));
    }

    #[tokio::test]
    async fn test_mismatch_resolves_later() {
        let (mut session, mut rx1, mut rx2) = running_session();

        session.flip_card(conn(1), 1);
        let pending = session.flip_card(conn(1), 3).expect("mismatch");
        assert_eq!(messages(&mut rx1).len(), 2);
        assert_eq!(session.match_state().turn(), Some(Seat::One));

        session.resolve_mismatch(pending);
        let sent = messages(&mut rx2);
        assert_eq!(sent.len(), 4);
        match &sent[2] {
            ServerMessage::UpdateBoard(cards) => assert!(cards.iter().all(|c| !c.flipped)),
            other => panic!("expected update-board, got {:?}", other),
        }
        assert_eq!(sent[3], ServerMessage::ChangeTurn(Seat::Two));
    }

    #[tokio::test]
    async fn test_wrong_seat_may_flip() {
        let (mut session, _rx1, _rx2) = running_session();

        // Seat 2 flips during seat 1's turn; seat 1 gets the credit
        session.flip_card(conn(2), 1);
        session.flip_card(conn(2), 2);
        assert_eq!(session.match_state().scores(), vec![1, 0]);
    }

    #[tokio::test]
    async fn test_game_over_broadcast() {
        let (mut session, mut rx1, _rx2) = running_session();

        for id in 1..=DECK_SIZE as CardId {
            session.flip_card(conn(1), id);
        }

        let sent = messages(&mut rx1);
        assert_eq!(
            sent.last(),
            Some(&ServerMessage::GameOver(GameResult {
                final_scores: vec![6, 0],
                winner: Winner::Seat(Seat::One),
            }))
        );
        assert_eq!(
            sent.iter().filter(|m| matches!(m, ServerMessage::GameOver(_))).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_disconnect_resets_and_notifies() {
        let (mut session, mut rx1, _rx2) = running_session();
        session.flip_card(conn(1), 1);
        let pending = session.flip_card(conn(1), 3).expect("mismatch");
        drain(&mut rx1);

        session.detach(&conn(2));
        assert_eq!(messages(&mut rx1), vec![ServerMessage::PlayerLeft]);
        assert!(session.match_state().deck().is_empty());
        assert_eq!(session.match_state().turn(), None);

        // The reset scheduled before the disconnect does nothing now
        session.resolve_mismatch(pending);
        assert!(drain(&mut rx1).is_empty());
        assert_eq!(session.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_snapshot() {
        let (mut session, _rx1, mut rx2) = running_session();
        session.flip_card(conn(1), 1);
        session.flip_card(conn(1), 2);
        drain(&mut rx2);

        session.send_snapshot(&conn(2));
        match messages(&mut rx2).pop() {
            Some(ServerMessage::StateSnapshot(snapshot)) => {
                assert_eq!(snapshot.seat, Some(Seat::Two));
                assert_eq!(snapshot.turn, Some(Seat::One));
                assert_eq!(snapshot.scores, vec![1, 0]);
                assert_eq!(snapshot.wallets, vec!["0xaaa", "0xbbb"]);
                assert_eq!(snapshot.cards.len(), DECK_SIZE);
            }
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let mut session = create_test_session();
        let (tx, mut rx) = mpsc::channel(1);
        session.attach(conn(1), tx);

        session.broadcast(ServerMessage::ShowPlayButton);
        session.broadcast(ServerMessage::PlayerLeft);

        assert_eq!(drain(&mut rx), vec![Outbound::Message(ServerMessage::ShowPlayButton)]);
    }

    #[tokio::test]
    async fn test_connection_routing() {
        let (manager, session_id) = SessionManager::with_session(SessionConfig::default());
        assert!(manager.get_session(&session_id).await.is_some());
        assert_eq!(manager.all_sessions().await.len(), 1);
        let (tx, _rx) = mpsc::channel(8);

        manager.attach(session_id, conn(1), tx).await.unwrap();
        assert!(manager.get_connection_session(&conn(1)).await.is_some());

        manager.detach(&conn(1)).await.unwrap();
        assert!(manager.get_connection_session(&conn(1)).await.is_none());
        assert!(matches!(
            manager.detach(&conn(1)).await,
            Err(SessionError::NotAttached)
        ));

        let (tx, _rx) = mpsc::channel(8);
        assert!(matches!(
            manager.attach([9; 16], conn(2), tx).await,
            Err(SessionError::SessionNotFound)
        ));
    }
}
