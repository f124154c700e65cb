//! Offline cue-track pipeline: transcription → mouth cues → file.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use bytes::Bytes;
use lipbridge::collab::{HttpTranscriber, Transcriber};
use lipbridge::config::SttConfig;
use lipbridge::transcript::Transcript;
use lipbridge::viseme::track::default_output_path;
use lipbridge::viseme::{CueTrack, Viseme};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn verbose_json() -> serde_json::Value {
    json!({
        "text": " Хорошо, спасибо.",
        "language": "ru",
        "duration": 1.25,
        "segments": [{
            "start": 0.0, "end": 1.2, "text": " Хорошо, спасибо.",
            "words": [
                {"word": " Хорошо,", "start": 0.0, "end": 0.6},
                {"word": " спасибо.", "start": 0.6, "end": 1.2}
            ]
        }]
    })
}

fn assert_well_formed(track: &CueTrack) {
    assert!(!track.mouth_cues.is_empty());
    for cue in &track.mouth_cues {
        assert!(cue.end >= cue.start, "{cue:?}");
    }
    for pair in track.mouth_cues.windows(2) {
        assert!(pair[1].start >= pair[0].start);
    }
    assert_eq!(track.metadata.phoneme_count, track.mouth_cues.len());
}

#[tokio::test]
async fn transcribed_recording_becomes_a_track_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(verbose_json()))
        .mount(&server)
        .await;

    let stt = HttpTranscriber::new(&SttConfig {
        base_url: format!("{}/v1", server.uri()),
        ..SttConfig::default()
    });
    let transcript = stt
        .transcribe(Bytes::from_static(b"RIFF"), "answer.wav")
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let audio_path = dir.path().join("answer.wav");
    let track = CueTrack::from_transcript("answer.wav", &transcript, stt.model(), None);
    let out = default_output_path(&audio_path);
    track.write_atomic(&out).unwrap();

    assert_eq!(out.file_name().unwrap(), "answer_sync.json");
    let written = CueTrack::read(&out).unwrap();
    assert_eq!(written, track);
    assert_eq!(written.metadata.model, "whisper-medium");
    assert_eq!(written.metadata.language, "ru");
    assert_eq!(written.metadata.word_count, 2);
    assert_eq!(written.metadata.duration, 1.2);
    assert_well_formed(&written);

    // Х has no mouth shape of its own; the first word opens on X then O.
    assert_eq!(written.mouth_cues[0].value, Viseme::X);
    assert_eq!(written.mouth_cues[0].start, 0.0);
    assert_eq!(written.mouth_cues[1].value, Viseme::O);
}

#[test]
fn saved_transcription_needs_no_server() {
    let transcript = Transcript::from_json(&verbose_json().to_string()).unwrap();
    let track = CueTrack::from_transcript("answer.wav", &transcript, "saved", Some("ru-RU"));
    assert_eq!(track.metadata.language, "ru-RU");
    assert_eq!(track.metadata.model, "saved");
    assert_well_formed(&track);

    // Last cue of "спасибо." ends on the word boundary.
    let last = track.mouth_cues.last().unwrap();
    assert_eq!(last.end, 1.2);
    assert_eq!(last.value, Viseme::O);
}

#[test]
fn transcription_without_words_yields_empty_track() {
    let transcript = Transcript::from_json(r#"{"text": "", "segments": []}"#).unwrap();
    let track = CueTrack::from_transcript("silence.wav", &transcript, "m", None);
    assert!(track.mouth_cues.is_empty());
    assert_eq!(track.metadata.word_count, 0);
    assert_eq!(track.metadata.language, "unknown");
}
