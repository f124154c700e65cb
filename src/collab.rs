//! External collaborators: language model, speech synthesis, transcription.
//!
//! Each is an async trait so the server can run against real services or
//! test doubles. The HTTP implementations are thin: build a request, check
//! the status, pull out the one field that matters.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::{LlmConfig, SttConfig, TtsConfig};
use crate::error::{BridgeError, Result};
use crate::transcript::Transcript;

/// Generates a reply to a user message.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn reply(&self, prompt: &str) -> Result<String>;
}

/// Turns text into compressed speech audio (e.g. MP3).
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Bytes>;
}

/// Turns recorded audio into text with word timings.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: Bytes, filename: &str) -> Result<Transcript>;
}

/// Extract an error message from a JSON error body, falling back to the raw text.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| match v.get("error") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(e) => e.get("message").and_then(|m| m.as_str()).map(String::from),
            None => None,
        })
        .unwrap_or_else(|| body.to_owned())
}

fn build_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

// ---------------------------------------------------------------------------
// Ollama chat
// ---------------------------------------------------------------------------

/// [`ChatModel`] backed by Ollama's `/api/chat`.
#[derive(Debug, Clone)]
pub struct OllamaChat {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}

impl OllamaChat {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            model: config.model.clone(),
            client: build_client(config.timeout_secs),
        }
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    async fn reply(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "stream": false,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| BridgeError::Llm(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BridgeError::Llm(format!(
                "HTTP {}: {}",
                status.as_u16(),
                extract_error_message(&text)
            )));
        }

        let parsed: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| BridgeError::Llm(format!("invalid response: {e}")))?;
        debug!(model = %self.model, chars = parsed.message.content.len(), "model replied");
        Ok(parsed.message.content)
    }
}

// ---------------------------------------------------------------------------
// HTTP speech synthesis
// ---------------------------------------------------------------------------

/// [`SpeechSynthesizer`] posting `{"text", "voice"}` to a synthesis endpoint
/// that answers with raw audio bytes.
#[derive(Debug, Clone)]
pub struct HttpSpeechSynthesizer {
    endpoint: String,
    voice: String,
    client: reqwest::Client,
}

impl HttpSpeechSynthesizer {
    pub fn new(config: &TtsConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            voice: config.voice.clone(),
            client: build_client(config.timeout_secs),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Bytes> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({"text": text, "voice": self.voice}))
            .send()
            .await
            .map_err(|e| BridgeError::Tts(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BridgeError::Tts(format!(
                "HTTP {}: {}",
                status.as_u16(),
                extract_error_message(&text)
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| BridgeError::Tts(format!("failed to read audio: {e}")))?;
        if audio.is_empty() {
            return Err(BridgeError::Tts("engine returned no audio".into()));
        }
        info!(voice = %self.voice, bytes = audio.len(), "synthesized speech");
        Ok(audio)
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible transcription
// ---------------------------------------------------------------------------

/// [`Transcriber`] for OpenAI-compatible `/audio/transcriptions` servers
/// (faster-whisper-server, whisper.cpp server, OpenAI).
#[derive(Debug, Clone)]
pub struct HttpTranscriber {
    base_url: String,
    model: String,
    language: Option<String>,
    client: reqwest::Client,
}

impl HttpTranscriber {
    pub fn new(config: &SttConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            model: config.model.clone(),
            language: config.language.clone(),
            client: build_client(config.timeout_secs),
        }
    }

    /// Model name reported in cue-track metadata.
    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, audio: Bytes, filename: &str) -> Result<Transcript> {
        let url = format!("{}/audio/transcriptions", self.base_url);
        let bytes_len = audio.len();
        let file = reqwest::multipart::Part::bytes(audio.to_vec()).file_name(filename.to_owned());

        let mut form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "word")
            .text("timestamp_granularities[]", "segment");
        if let Some(lang) = &self.language {
            form = form.text("language", lang.clone());
        }

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| BridgeError::Stt(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BridgeError::Stt(format!("failed to read response: {e}")))?;
        if !status.is_success() {
            return Err(BridgeError::Stt(format!(
                "HTTP {}: {}",
                status.as_u16(),
                extract_error_message(&body)
            )));
        }

        let transcript = Transcript::from_json(&body)?;
        info!(
            bytes = bytes_len,
            words = transcript.word_count(),
            "transcribed audio"
        );
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_from_string_or_object() {
        assert_eq!(extract_error_message(r#"{"error":"model not found"}"#), "model not found");
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"bad file","type":"invalid"}}"#),
            "bad file"
        );
        assert_eq!(extract_error_message("plain failure"), "plain failure");
    }
}
