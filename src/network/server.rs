//! WebSocket Game Server
//!
//! Async WebSocket server for the memory match lobby.
//! Accepts connections, routes every one of them to the lobby session,
//! and runs the deferred mismatch-resets and idle cleanup.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, instrument, warn};

use crate::game::flip::PendingReset;
use crate::game::state::ConnectionId;
use crate::network::protocol::{
    ClientMessage, ErrorCode, Pong, ServerError, ServerMessage, Shutdown,
};
use crate::network::session::{
    GameSession, Outbound, SessionConfig, SessionError, SessionId, SessionManager,
};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Connections silent for longer than this are closed.
    pub idle_timeout: Duration,
    /// Per-connection outbound queue capacity.
    pub outbound_buffer: usize,
    /// How long a mismatched pair stays face up.
    pub mismatch_reset_delay: Duration,
    /// Fixed deal entropy (reproducible shuffles).
    pub deal_seed: Option<u64>,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 4000)),
            max_connections: 1000,
            idle_timeout: Duration::from_secs(300),
            outbound_buffer: 64,
            mismatch_reset_delay: Duration::from_secs(1),
            deal_seed: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Create config from `MEMORY_MATCH_*` environment variables.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = parse_var(&lookup, "MEMORY_MATCH_BIND_ADDR")? {
            config.bind_addr = addr;
        }
        if let Some(max) = parse_var(&lookup, "MEMORY_MATCH_MAX_CONNECTIONS")? {
            config.max_connections = max;
        }
        if let Some(secs) = parse_var(&lookup, "MEMORY_MATCH_IDLE_TIMEOUT_SECS")? {
            config.idle_timeout = Duration::from_secs(secs);
        }
        if let Some(size) = parse_var(&lookup, "MEMORY_MATCH_OUTBOUND_BUFFER")? {
            config.outbound_buffer = size;
        }
        if let Some(ms) = parse_var(&lookup, "MEMORY_MATCH_MISMATCH_DELAY_MS")? {
            config.mismatch_reset_delay = Duration::from_millis(ms);
        }
        config.deal_seed = parse_var(&lookup, "MEMORY_MATCH_DEAL_SEED")?;

        if config.outbound_buffer == 0 {
            return Err(ConfigError::Zero("MEMORY_MATCH_OUTBOUND_BUFFER"));
        }
        if config.idle_timeout.is_zero() {
            return Err(ConfigError::Zero("MEMORY_MATCH_IDLE_TIMEOUT_SECS"));
        }

        Ok(config)
    }

    /// Session settings derived from this config.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            mismatch_reset_delay: self.mismatch_reset_delay,
            deal_seed: self.deal_seed,
        }
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Variable present but unparseable.
    #[error("Invalid value for {name}: {value:?}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
    },

    /// Variable must be non-zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Session error.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Connected client state.
struct ConnectedClient {
    /// Peer address.
    addr: SocketAddr,
    /// Last inbound frame.
    last_activity: Instant,
    /// Outbound queue (used to close idle connections).
    sender: mpsc::Sender<Outbound>,
}

type Clients = Arc<RwLock<BTreeMap<ConnectionId, ConnectedClient>>>;

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Session manager.
    sessions: Arc<SessionManager>,
    /// The one session every connection joins.
    lobby: SessionId,
    /// Connected clients.
    clients: Clients,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server with its lobby session.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let (sessions, lobby) = SessionManager::with_session(config.session_config());

        Self {
            config,
            sessions: Arc::new(sessions),
            lobby,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Bind and run the server.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.run_with_listener(listener).await
    }

    /// Run the server on an already bound listener.
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!(
            "Memory match server v{} listening on {}",
            self.config.version,
            listener.local_addr()?
        );

        let cleanup_clients = self.clients.clone();
        let idle_timeout = self.config.idle_timeout;
        let cleanup_handle = tokio::spawn(async move {
            Self::run_cleanup_loop(cleanup_clients, idle_timeout).await;
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.connection_count().await >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                Self::reject_connection(stream, addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        cleanup_handle.abort();

        Ok(())
    }

    /// Tell an over-limit client why and hang up.
    fn reject_connection(stream: TcpStream, addr: SocketAddr) {
        tokio::spawn(async move {
            let mut ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    debug!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let reply = ServerMessage::Error(ServerError {
                code: ErrorCode::ServerOverloaded,
                message: "Connection limit reached".to_string(),
            });
            if let Ok(text) = reply.to_json() {
                let _ = ws_stream.send(Message::Text(text)).await;
            }
            let _ = ws_stream.close(None).await;
        });
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let sessions = self.sessions.clone();
        let lobby = self.lobby;
        let outbound_buffer = self.config.outbound_buffer;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let connection = ConnectionId::random();
            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<Outbound>(outbound_buffer);

            // Register client
            {
                let mut clients = clients.write().await;
                clients.insert(connection, ConnectedClient {
                    addr,
                    last_activity: Instant::now(),
                    sender: msg_tx.clone(),
                });
            }

            let session = match Self::attach_to(&sessions, lobby, connection, msg_tx.clone()).await {
                Ok(session) => session,
                Err(e) => {
                    error!("Failed to attach {} to lobby: {}", connection, e);
                    clients.write().await.remove(&connection);
                    return;
                }
            };
            debug!("Connection {} assigned to {}", connection, addr);

            // Spawn message sender task
            let mut sender_task = tokio::spawn(async move {
                while let Some(item) = msg_rx.recv().await {
                    match item {
                        Outbound::Message(msg) => {
                            let text = match msg.to_json() {
                                Ok(t) => t,
                                Err(e) => {
                                    error!("Failed to serialize message: {}", e);
                                    continue;
                                }
                            };
                            if ws_sender.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Outbound::Close => {
                            let _ = ws_sender.close().await;
                            break;
                        }
                    }
                }
            });

            // Handle incoming messages
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                // Update activity
                                {
                                    let mut clients = clients.write().await;
                                    if let Some(client) = clients.get_mut(&connection) {
                                        client.last_activity = Instant::now();
                                    }
                                }

                                match ClientMessage::from_json(&text) {
                                    Ok(client_msg) => {
                                        Self::handle_client_message(connection, client_msg, &session).await;
                                    }
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", connection, e);
                                        let reply = ServerMessage::Error(ServerError {
                                            code: ErrorCode::InvalidInput,
                                            message: e.to_string(),
                                        });
                                        if msg_tx.try_send(Outbound::Message(reply)).is_err() {
                                            debug!("Dropped error reply for {}", connection);
                                        }
                                    }
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", connection);
                                break;
                            }
                            Some(Err(e)) => {
                                warn!("WebSocket error for {}: {}", connection, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = &mut sender_task => {
                        debug!("Outbound stream for {} finished", connection);
                        break;
                    }
                    _ = shutdown_rx.recv() => {
                        // `shutdown` already queued the farewell; let it flush
                        let _ = tokio::time::timeout(Duration::from_secs(1), &mut sender_task).await;
                        break;
                    }
                }
            }

            // Cleanup
            sender_task.abort();
            clients.write().await.remove(&connection);
            if let Err(e) = sessions.detach(&connection).await {
                debug!("Detach of {} skipped: {}", connection, e);
            }

            info!("Client {} ({}) cleaned up", connection, addr);
        });
    }

    async fn attach_to(
        sessions: &SessionManager,
        lobby: SessionId,
        connection: ConnectionId,
        sender: mpsc::Sender<Outbound>,
    ) -> Result<Arc<RwLock<GameSession>>, SessionError> {
        sessions.attach(lobby, connection, sender).await?;
        sessions
            .get_session(&lobby)
            .await
            .ok_or(SessionError::SessionNotFound)
    }

    /// Handle a client message.
    async fn handle_client_message(
        connection: ConnectionId,
        msg: ClientMessage,
        session: &Arc<RwLock<GameSession>>,
    ) {
        match msg {
            ClientMessage::ConnectWallet(wallet) => {
                session.write().await.connect_wallet(connection, &wallet);
            }
            ClientMessage::Register(req) => {
                session.write().await.register(connection, req.stake_amount);
            }
            ClientMessage::StartGame => {
                session.write().await.start_game(connection);
            }
            ClientMessage::FlipCard(card_id) => {
                let mut guard = session.write().await;
                if let Some(pending) = guard.flip_card(connection, card_id) {
                    let delay = guard.config.mismatch_reset_delay;
                    Self::schedule_mismatch_reset(session.clone(), pending, delay);
                }
            }
            ClientMessage::SyncState => {
                session.read().await.send_snapshot(&connection);
            }
            ClientMessage::Ping(timestamp) => {
                session.read().await.send_to(&connection, ServerMessage::Pong(Pong {
                    timestamp,
                    server_time: chrono::Utc::now().timestamp_millis(),
                }));
            }
        }
    }

    /// Turn a mismatched pair back over once `delay` has passed.
    fn schedule_mismatch_reset(
        session: Arc<RwLock<GameSession>>,
        pending: PendingReset,
        delay: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            session.write().await.resolve_mismatch(pending);
        })
    }

    // =========================================================================
    // In-process entry points (transport-independent)
    // =========================================================================

    /// Attach a connection to the lobby with an arbitrary outbound queue.
    pub async fn attach(
        &self,
        connection: ConnectionId,
        sender: mpsc::Sender<Outbound>,
    ) -> Result<(), GameServerError> {
        Self::attach_to(&self.sessions, self.lobby, connection, sender).await?;
        Ok(())
    }

    /// Handle one decoded message from an attached connection.
    pub async fn dispatch(
        &self,
        connection: ConnectionId,
        msg: ClientMessage,
    ) -> Result<(), GameServerError> {
        let session = self
            .sessions
            .get_connection_session(&connection)
            .await
            .ok_or(SessionError::NotAttached)?;
        Self::handle_client_message(connection, msg, &session).await;
        Ok(())
    }

    /// Detach a connection, running the disconnect rules.
    pub async fn detach(&self, connection: &ConnectionId) -> Result<(), GameServerError> {
        self.sessions.detach(connection).await?;
        Ok(())
    }

    /// The lobby session.
    pub async fn lobby(&self) -> Option<Arc<RwLock<GameSession>>> {
        self.sessions.get_session(&self.lobby).await
    }

    /// Run cleanup loop.
    async fn run_cleanup_loop(clients: Clients, idle_timeout: Duration) {
        let mut interval = interval((idle_timeout / 4).max(Duration::from_secs(1)));

        loop {
            interval.tick().await;

            let now = Instant::now();
            let clients = clients.read().await;
            for (connection, client) in clients.iter() {
                if now.duration_since(client.last_activity) <= idle_timeout {
                    continue;
                }
                // The connection task runs the disconnect path once the
                // close is flushed.
                match client.sender.try_send(Outbound::Close) {
                    Ok(()) => info!("Closing idle client {} ({})", connection, client.addr),
                    Err(e) => warn!("Could not close idle client {}: {}", connection, e),
                }
            }
        }
    }

    /// Notify every connection and stop accepting.
    pub async fn shutdown(&self) {
        info!("Shutting down");
        for session in self.sessions.all_sessions().await {
            session.write().await.close_all(ServerMessage::ServerShutdown(Shutdown {
                reason: "Server shutting down".to_string(),
            }));
        }
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }
}
