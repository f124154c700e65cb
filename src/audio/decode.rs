//! Compressed audio → normalized mono PCM.
//!
//! Decoding goes through `symphonia` (MP3, AAC/MP4, WAV); WAV containers for
//! per-chunk transport are read and written with `hound`.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use super::AudioFrame;
use crate::error::{BridgeError, Result};

/// Decode arbitrary compressed audio into a mono frame at `target_rate`.
///
/// Channels are averaged, the signal is resampled linearly and then
/// quantized to 16-bit so that estimation sees exactly what a 16-bit WAV
/// transport carries.
///
/// # Errors
///
/// Returns [`BridgeError::Decode`] for empty or malformed input. This is
/// deliberately not defaulted: without PCM there is nothing to estimate.
pub fn decode_and_normalize(bytes: &[u8], target_rate: u32) -> Result<AudioFrame> {
    decode_with_hint(bytes, target_rate, None)
}

/// Like [`decode_and_normalize`], with a file extension hint for the prober.
///
/// # Errors
///
/// Returns [`BridgeError::Decode`] for empty or malformed input.
pub fn decode_with_hint(
    bytes: &[u8],
    target_rate: u32,
    extension: Option<&str>,
) -> Result<AudioFrame> {
    if bytes.is_empty() {
        return Err(BridgeError::Decode("no audio bytes".into()));
    }
    if target_rate == 0 {
        return Err(BridgeError::Decode("target sample rate must be non-zero".into()));
    }

    let (mono, native_rate) = decode_to_mono_f32(bytes, extension)?;
    let resampled = if native_rate == target_rate {
        mono
    } else {
        resample_linear(&mono, native_rate, target_rate)
    };
    let samples: Vec<f32> = resampled.into_iter().map(quantize_i16).collect();

    debug!(
        input_bytes = bytes.len(),
        native_rate,
        target_rate,
        samples = samples.len(),
        "decoded audio to PCM"
    );
    Ok(AudioFrame::new(samples, target_rate))
}

fn decode_to_mono_f32(bytes: &[u8], extension: Option<&str>) -> Result<(Vec<f32>, u32)> {
    let source = Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(source), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| BridgeError::Decode(format!("failed to probe audio: {e}")))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| BridgeError::Decode("no default audio track".into()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sr = codec_params
        .sample_rate
        .ok_or_else(|| BridgeError::Decode("unknown sample rate".into()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| BridgeError::Decode(format!("failed to create decoder: {e}")))?;

    let mut out: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphError::ResetRequired) => break,
            Err(e) => return Err(BridgeError::Decode(format!("audio read error: {e}"))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphError::DecodeError(_)) => continue,
            Err(e) => return Err(BridgeError::Decode(format!("audio decode error: {e}"))),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        let frames = decoded.frames() as u64;
        let required = usize::try_from(frames)
            .unwrap_or(usize::MAX)
            .saturating_mul(channels);

        if sample_buf.as_ref().is_none_or(|b| b.capacity() < required) {
            sample_buf = Some(SampleBuffer::<f32>::new(frames, spec));
        }
        let Some(buf) = sample_buf.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);
        downmix_into(buf.samples(), channels, &mut out);
    }

    Ok((out, sr))
}

/// Read a WAV container into a mono frame at its native rate.
///
/// Accepts integer PCM of any bit depth and 32-bit float; integer samples
/// are divided by `2^(bits-1)`.
///
/// # Errors
///
/// Returns [`BridgeError::Decode`] if the container or any sample is unreadable.
pub fn decode_wav(bytes: &[u8]) -> Result<AudioFrame> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| BridgeError::Decode(format!("cannot open WAV: {e}")))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| {
                    s.map_err(|e| BridgeError::Decode(format!("WAV read error: {e}")))
                        .map(|v| v as f32 / max)
                })
                .collect::<Result<Vec<f32>>>()?
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map_err(|e| BridgeError::Decode(format!("WAV read error: {e}"))))
            .collect::<Result<Vec<f32>>>()?,
    };

    let mut mono = Vec::with_capacity(interleaved.len() / usize::from(spec.channels.max(1)));
    downmix_into(&interleaved, usize::from(spec.channels), &mut mono);
    Ok(AudioFrame::new(mono, spec.sample_rate))
}

/// Write a frame as a mono 16-bit PCM WAV container.
///
/// # Errors
///
/// Returns [`BridgeError::Audio`] if the writer fails.
pub fn encode_wav(frame: &AudioFrame) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: frame.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(44 + frame.samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| BridgeError::Audio(format!("failed to create wav writer: {e}")))?;
        for &s in &frame.samples {
            writer
                .write_sample(to_i16(s))
                .map_err(|e| BridgeError::Audio(format!("failed to write wav sample: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| BridgeError::Audio(format!("failed to finalize wav: {e}")))?;
    }
    Ok(cursor.into_inner())
}

/// Linear-interpolation resampler for mono signals.
pub fn resample_linear(input: &[f32], from_sr: u32, to_sr: u32) -> Vec<f32> {
    if input.is_empty() || from_sr == to_sr || from_sr == 0 || to_sr == 0 {
        return input.to_vec();
    }

    let ratio = f64::from(to_sr) / f64::from(from_sr);
    let out_len = ((input.len() as f64) * ratio).round() as usize;
    let last = input.len() - 1;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = (i as f64) / ratio;
        let i0 = (src_pos.floor() as usize).min(last);
        let i1 = (i0 + 1).min(last);
        let t = (src_pos - i0 as f64) as f32;
        out.push(input[i0] * (1.0 - t) + input[i1] * t);
    }

    out
}

fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    for frame in interleaved.chunks_exact(channels) {
        out.push(frame.iter().sum::<f32>() / channels as f32);
    }
}

const I16_SCALE: f32 = 32768.0;

/// Same scale as the integer branch of `decode_wav`, so `k / 32768` maps back to `k`.
fn to_i16(s: f32) -> i16 {
    (s * I16_SCALE).round().clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}

fn quantize_i16(s: f32) -> f32 {
    f32::from(to_i16(s)) / I16_SCALE
}
