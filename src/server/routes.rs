//! Plain HTTP handlers.

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use base64::Engine as _;
use bytes::Bytes;
use serde::Deserialize;
use tracing::{info, warn};

use super::AppState;
use crate::audio::{AudioFrame, decode_and_normalize};
use crate::error::{BridgeError, Result};
use crate::store::{ChatStore, ChatStoreError};
use crate::viseme::estimate_frame;

/// Extension under which reply audio is parked.
const REPLY_AUDIO_EXT: &str = "mp3";

pub(super) fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({"error": message.into()}))).into_response()
}

/// Decode on the blocking pool; symphonia is CPU-bound.
pub(super) async fn decode_off_thread(audio: Vec<u8>, sample_rate: u32) -> Result<AudioFrame> {
    tokio::task::spawn_blocking(move || decode_and_normalize(&audio, sample_rate))
        .await
        .map_err(|e| BridgeError::Decode(format!("decode task failed: {e}")))?
}

/// Run a store call on the blocking pool; rusqlite holds the connection lock synchronously.
async fn with_store<T, F>(state: &AppState, call: F) -> Result<T>
where
    F: FnOnce(&ChatStore) -> std::result::Result<T, ChatStoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = state.store.clone();
    tokio::task::spawn_blocking(move || call(&store))
        .await
        .map_err(|e| BridgeError::Store(format!("store task failed: {e}")))?
        .map_err(BridgeError::from)
}

pub(super) async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatRequest {
    #[serde(default)]
    message: Option<String>,
    /// Clients send either a string or a number.
    #[serde(default)]
    chat_id: Option<serde_json::Value>,
    #[serde(default = "default_true")]
    return_text: bool,
    #[serde(default)]
    return_audio: bool,
}

impl ChatRequest {
    fn chat_id(&self) -> Option<String> {
        match self.chat_id.as_ref()? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

pub(super) async fn chat(State(state): State<AppState>, Json(request): Json<ChatRequest>) -> Response {
    let message = request.message.as_deref().map(str::trim).unwrap_or_default();
    let chat_id = match request.chat_id() {
        Some(id) if !message.is_empty() => id,
        _ => return json_error(StatusCode::BAD_REQUEST, "message and chat_id are required"),
    };

    let reply = match state.chat.reply(message).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(chat_id = %chat_id, error = %e, "model request failed");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    let saved = {
        let (chat_id, message, reply) = (chat_id.clone(), message.to_owned(), reply.clone());
        with_store(&state, move |store| store.save_message(&chat_id, &message, &reply)).await
    };
    let msg_id = match saved {
        Ok(id) => id,
        Err(e) => {
            warn!(chat_id = %chat_id, error = %e, "failed to save exchange");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };
    info!(chat_id = %chat_id, msg_id, "chat exchange saved");

    if !request.return_audio {
        if !request.return_text {
            warn!(chat_id = %chat_id, "neither text nor audio requested, returning text");
        }
        return Json(serde_json::json!({"bot_reply": reply, "msg_id": msg_id})).into_response();
    }

    let audio = match state.tts.synthesize(&reply).await {
        Ok(audio) => audio,
        Err(e) => {
            warn!(chat_id = %chat_id, error = %e, "speech synthesis failed");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };
    let ticket = match state.tickets.issue(&audio, REPLY_AUDIO_EXT).await {
        Ok(ticket) => ticket,
        Err(e) => return json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    Json(serde_json::json!({
        "bot_reply": reply,
        "msg_id": msg_id,
        "audio_base64": base64::engine::general_purpose::STANDARD.encode(&audio),
        "audio_ticket": ticket,
    }))
    .into_response()
}

pub(super) async fn audio(State(state): State<AppState>, Path(ticket): Path<String>) -> Response {
    match state.tickets.read(&ticket).await {
        Some(audio) => ([(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response(),
        None => json_error(StatusCode::NOT_FOUND, "Audio not found"),
    }
}

pub(super) async fn lipsync(State(state): State<AppState>, Path(ticket): Path<String>) -> Response {
    let Some(audio) = state.tickets.redeem(&ticket).await else {
        return json_error(StatusCode::NOT_FOUND, "Audio not found");
    };

    match decode_off_thread(audio, state.config.audio.sample_rate).await {
        Ok(frame) => Json(estimate_frame(&frame)).into_response(),
        Err(e) => {
            warn!(ticket = %ticket, error = %e, "ticket audio is not decodable");
            json_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
    }
}

pub(super) async fn chats(State(state): State<AppState>) -> Response {
    match with_store(&state, ChatStore::list_chats).await {
        Ok(chats) => Json(serde_json::json!({"Chats": chats})).into_response(),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub(super) async fn messages(State(state): State<AppState>, Path(chat_id): Path<String>) -> Response {
    match with_store(&state, move |store| store.chat_messages(&chat_id)).await {
        Ok(messages) => Json(serde_json::json!({"Chat_messages": messages})).into_response(),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub(super) async fn stt(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut upload: Option<(String, Bytes)> = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return json_error(StatusCode::BAD_REQUEST, e.to_string()),
        };
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("audio.wav").to_owned();
        match field.bytes().await {
            Ok(bytes) => upload = Some((filename, bytes)),
            Err(e) => return json_error(StatusCode::BAD_REQUEST, e.to_string()),
        }
    }

    let Some((filename, bytes)) = upload else {
        return json_error(StatusCode::BAD_REQUEST, "missing multipart field 'file'");
    };

    match state.stt.transcribe(bytes, &filename).await {
        Ok(transcript) => Json(serde_json::json!({"text": transcript.text.trim()})).into_response(),
        Err(e) => {
            warn!(file = %filename, error = %e, "transcription failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
