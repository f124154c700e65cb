//! HTTP collaborator adapters against a mock server.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use bytes::Bytes;
use lipbridge::BridgeError;
use lipbridge::collab::{
    ChatModel, HttpSpeechSynthesizer, HttpTranscriber, OllamaChat, SpeechSynthesizer, Transcriber,
};
use lipbridge::config::{LlmConfig, SttConfig, TtsConfig};
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn llm_config(server: &MockServer) -> LlmConfig {
    LlmConfig {
        base_url: server.uri(),
        ..LlmConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Chat model
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ollama_reply_is_message_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "mistral",
            "stream": false,
            "messages": [{"role": "user", "content": "Привет"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "mistral",
            "message": {"role": "assistant", "content": "Здравствуйте!"},
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let chat = OllamaChat::new(&llm_config(&server));
    assert_eq!(chat.reply("Привет").await.unwrap(), "Здравствуйте!");
}

#[tokio::test]
async fn ollama_error_body_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"error": "model 'mistral' not found"})),
        )
        .mount(&server)
        .await;

    let err = OllamaChat::new(&llm_config(&server))
        .reply("hi")
        .await
        .unwrap_err();
    match err {
        BridgeError::Llm(msg) => {
            assert!(msg.contains("404"), "{msg}");
            assert!(msg.contains("not found"), "{msg}");
        }
        other => panic!("expected Llm error, got {other:?}"),
    }
}

#[tokio::test]
async fn ollama_malformed_response_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = OllamaChat::new(&llm_config(&server))
        .reply("hi")
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Llm(_)));
}

// ---------------------------------------------------------------------------
// Speech synthesis
// ---------------------------------------------------------------------------

#[tokio::test]
async fn synthesizer_returns_raw_audio() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/synthesize"))
        .and(body_partial_json(
            json!({"text": "Добрый день", "voice": "ru-RU-DariyaNeural"}),
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "audio/mpeg")
                .set_body_bytes(b"ID3\x04fake-mp3".to_vec()),
        )
        .mount(&server)
        .await;

    let tts = HttpSpeechSynthesizer::new(&TtsConfig {
        endpoint: format!("{}/synthesize", server.uri()),
        ..TtsConfig::default()
    });
    let audio = tts.synthesize("Добрый день").await.unwrap();
    assert_eq!(&audio[..], b"ID3\x04fake-mp3");
}

#[tokio::test]
async fn synthesizer_rejects_empty_audio() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/synthesize"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let tts = HttpSpeechSynthesizer::new(&TtsConfig {
        endpoint: format!("{}/synthesize", server.uri()),
        ..TtsConfig::default()
    });
    assert!(matches!(
        tts.synthesize("x").await.unwrap_err(),
        BridgeError::Tts(_)
    ));
}

// ---------------------------------------------------------------------------
// Transcription
// ---------------------------------------------------------------------------

fn stt_config(server: &MockServer) -> SttConfig {
    SttConfig {
        base_url: format!("{}/v1", server.uri()),
        ..SttConfig::default()
    }
}

#[tokio::test]
async fn transcriber_posts_multipart_and_parses_words() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/transcriptions"))
        .and(header_exists("content-type"))
        .and(body_string_contains("verbose_json"))
        .and(body_string_contains("whisper-medium"))
        .and(body_string_contains("reply.wav"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "text": " мама мыла",
            "language": "ru",
            "duration": 1.9,
            "segments": [{
                "start": 0.0, "end": 1.8, "text": " мама мыла",
                "words": [
                    {"word": " мама", "start": 0.0, "end": 1.0},
                    {"word": " мыла", "start": 1.0, "end": 1.8}
                ]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let stt = HttpTranscriber::new(&stt_config(&server));
    let transcript = stt
        .transcribe(Bytes::from_static(b"RIFF...."), "reply.wav")
        .await
        .unwrap();

    assert_eq!(transcript.text.trim(), "мама мыла");
    assert_eq!(transcript.language.as_deref(), Some("ru"));
    assert_eq!(transcript.word_count(), 2);
    assert_eq!(transcript.words()[1].text.trim(), "мыла");
}

#[tokio::test]
async fn transcriber_accepts_top_level_words() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "text": "да",
            "words": [{"word": "да", "start": 0.1, "end": 0.4}]
        })))
        .mount(&server)
        .await;

    let transcript = HttpTranscriber::new(&stt_config(&server))
        .transcribe(Bytes::from_static(b"x"), "a.wav")
        .await
        .unwrap();
    assert_eq!(transcript.word_count(), 1);
}

#[tokio::test]
async fn transcriber_error_carries_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"message": "decoder crashed", "type": "server_error"}
        })))
        .mount(&server)
        .await;

    let err = HttpTranscriber::new(&stt_config(&server))
        .transcribe(Bytes::from_static(b"x"), "a.wav")
        .await
        .unwrap_err();
    match err {
        BridgeError::Stt(msg) => assert!(msg.contains("500") && msg.contains("decoder crashed")),
        other => panic!("expected Stt error, got {other:?}"),
    }
}
