//! HTTP and WebSocket front end for the avatar client.
//!
//! ## Endpoints
//!
//! - `GET /health` - liveness probe
//! - `POST /chat` - model reply, optionally with synthesized audio
//! - `GET /audio/{ticket}` - parked reply audio
//! - `GET /lipsync/{ticket}` - one mouth sample for a whole reply
//! - `GET /chats`, `GET /messages/{chat_id}` - chat history
//! - `POST /stt` - transcription of an uploaded recording
//! - `GET /ws/lipsync` - paced lip-sync stream for spoken text

mod routes;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::collab::{
    ChatModel, HttpSpeechSynthesizer, HttpTranscriber, OllamaChat, SpeechSynthesizer, Transcriber,
};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::store::ChatStore;
use crate::ticket::TicketStore;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BridgeConfig>,
    pub chat: Arc<dyn ChatModel>,
    pub tts: Arc<dyn SpeechSynthesizer>,
    pub stt: Arc<dyn Transcriber>,
    pub store: Arc<ChatStore>,
    pub tickets: TicketStore,
}

impl AppState {
    /// Assemble state from already-built parts.
    pub fn new(
        config: BridgeConfig,
        chat: Arc<dyn ChatModel>,
        tts: Arc<dyn SpeechSynthesizer>,
        stt: Arc<dyn Transcriber>,
        store: ChatStore,
    ) -> Self {
        let tickets = TicketStore::new(
            config.tickets.dir.clone(),
            Duration::from_secs(config.tickets.ttl_secs),
        );
        Self {
            config: Arc::new(config),
            chat,
            tts,
            stt,
            store: Arc::new(store),
            tickets,
        }
    }

    /// State wired to the HTTP collaborators and on-disk store named in `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the chat database cannot be opened.
    pub fn from_config(config: BridgeConfig) -> Result<Self> {
        let store = ChatStore::open(&config.store.db_path)?;
        let chat = Arc::new(OllamaChat::new(&config.llm));
        let tts = Arc::new(HttpSpeechSynthesizer::new(&config.tts));
        let stt = Arc::new(HttpTranscriber::new(&config.stt));
        Ok(Self::new(config, chat, tts, stt, store))
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/chat", post(routes::chat))
        .route("/audio/{ticket}", get(routes::audio))
        .route("/lipsync/{ticket}", get(routes::lipsync))
        .route("/chats", get(routes::chats))
        .route("/messages/{chat_id}", get(routes::messages))
        .route("/stt", post(routes::stt))
        .route("/ws/lipsync", get(ws::lipsync_ws))
        .with_state(state)
}

/// A running server.
pub struct BridgeServer {
    addr: SocketAddr,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl BridgeServer {
    /// Bind `{host}:{port}` from the config (port `0` picks a free port) and
    /// serve in a background task. Also starts the ticket sweeper.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot bind.
    pub async fn start(state: AppState) -> Result<Self> {
        let bind_addr = format!("{}:{}", state.config.server.host, state.config.server.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| BridgeError::Config(format!("server bind {bind_addr} failed: {e}")))?;
        let addr = listener.local_addr()?;

        let cancel = CancellationToken::new();
        let sweep_every = Duration::from_secs(state.config.tickets.sweep_interval_secs.max(1));
        let sweeper = state.tickets.spawn_sweeper(sweep_every, cancel.child_token());

        let app = router(state);
        let shutdown = cancel.clone();
        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown.clone().cancelled_owned())
                .await;
            if let Err(e) = served {
                tracing::error!("server error: {e}");
            }
            shutdown.cancel();
            let _ = sweeper.await;
        });

        info!("lip-sync bridge listening on http://{addr}");
        Ok(Self {
            addr,
            cancel,
            handle,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Token that stops the server when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait until the server stops.
    pub async fn wait(self) {
        let _ = self.handle.await;
    }

    /// Stop accepting connections and wait for the server task.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}
