//! `/ws/lipsync`: speak text and stream the mouth track in step with playback.
//!
//! A session runs three pieces. A reader task forwards client requests and
//! cancels the session when the socket closes. A writer task owns the sink.
//! The session loop handles requests one at a time: synthesize, decode, then
//! hand the frame to [`LipSyncStreamer`].

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::AppState;
use super::routes::decode_off_thread;
use crate::stream::{LipSyncEvent, LipSyncStreamer, StreamOutcome};

/// Outbound queue depth per session.
const OUTBOUND_CAPACITY: usize = 32;

#[derive(Debug, Deserialize)]
struct SpeakRequest {
    #[serde(default)]
    text: Option<String>,
}

pub(super) async fn lipsync_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let cancel = CancellationToken::new();
    info!("lip-sync client connected");

    let (out_tx, mut out_rx) = mpsc::channel::<Message>(OUTBOUND_CAPACITY);
    let writer = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if sender.send(msg).await.is_err() {
                    cancel.cancel();
                    break;
                }
            }
        })
    };

    let (req_tx, mut req_rx) = mpsc::unbounded_channel::<String>();
    let reader = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            while let Some(msg) = receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if req_tx.send(text.as_str().to_owned()).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            cancel.cancel();
        })
    };

    let streamer = LipSyncStreamer::from_config(&state.config.audio);
    loop {
        let raw = tokio::select! {
            _ = cancel.cancelled() => break,
            raw = req_rx.recv() => match raw {
                Some(raw) => raw,
                None => break,
            },
        };
        if let Err(message) = speak(&state, &streamer, &raw, &out_tx, &cancel).await
            && out_tx.send(error_message(&message)).await.is_err()
        {
            break;
        }
    }

    cancel.cancel();
    drop(out_tx);
    reader.abort();
    let _ = writer.await;
    info!("lip-sync client disconnected");
}

/// Handle one request. `Err` carries a message for the client; the
/// connection stays open either way.
async fn speak(
    state: &AppState,
    streamer: &LipSyncStreamer,
    raw: &str,
    out_tx: &mpsc::Sender<Message>,
    cancel: &CancellationToken,
) -> std::result::Result<(), String> {
    let request: SpeakRequest =
        serde_json::from_str(raw).map_err(|e| format!("invalid request: {e}"))?;
    let text = request.text.unwrap_or_default();
    if text.trim().is_empty() {
        return Err("No text provided".to_owned());
    }
    debug!(chars = text.chars().count(), "speaking text");

    let audio = state.tts.synthesize(&text).await.map_err(|e| e.to_string())?;
    let frame = decode_off_thread(audio.to_vec(), state.config.audio.sample_rate)
        .await
        .map_err(|e| e.to_string())?;

    let (ev_tx, mut ev_rx) = mpsc::channel::<LipSyncEvent>(OUTBOUND_CAPACITY);
    let produce = async move {
        let outcome = streamer.run(&frame, &ev_tx, cancel).await;
        drop(ev_tx);
        outcome
    };
    let forward = async move {
        while let Some(event) = ev_rx.recv().await {
            if out_tx.send(Message::Text(event.to_json().into())).await.is_err() {
                break;
            }
        }
    };
    let (outcome, ()) = tokio::join!(produce, forward);

    match outcome {
        StreamOutcome::Completed { frames } => debug!(frames, "utterance streamed"),
        StreamOutcome::Cancelled { frames } => warn!(frames, "utterance stream cancelled"),
    }
    Ok(())
}

fn error_message(message: &str) -> Message {
    Message::Text(serde_json::json!({"error": message}).to_string().into())
}
