//! Energy-based mouth estimation for streaming playback.
//!
//! One scalar per frame: RMS loudness mapped through a fractional power so
//! quiet speech still opens the mouth and loud speech saturates gently.
//! Stateless: consecutive frames are not smoothed against each other.

use tracing::{debug, warn};

use super::VisemeSample;
use crate::audio::{AudioFrame, decode_wav};

/// Exponent applied to RMS before scaling.
pub const OPEN_EXPONENT: f64 = 0.4;

/// Gain applied after the exponent.
pub const OPEN_GAIN: f64 = 2.5;

/// `form` as a fraction of `open` (applied in thousandths below).
pub const FORM_RATIO: f64 = 0.7;

/// Openness below this is treated as a closed mouth.
pub const NOISE_GATE: f64 = 0.05;

/// Estimate mouth parameters for one PCM frame.
///
/// Total: an empty frame, or any frame whose energy is not a finite
/// number, yields [`VisemeSample::CLOSED`].
pub fn estimate_frame(frame: &AudioFrame) -> VisemeSample {
    if frame.is_empty() {
        return VisemeSample::CLOSED;
    }

    let rms = rms(&frame.samples);
    if !rms.is_finite() {
        warn!(samples = frame.len(), "non-finite frame energy, closing mouth");
        return VisemeSample::CLOSED;
    }

    let open = (rms.powf(OPEN_EXPONENT) * OPEN_GAIN).clamp(0.0, 1.0);
    if open < NOISE_GATE {
        return VisemeSample::CLOSED;
    }

    // `form` is taken from the rounded `open`, in whole thousandths, so the
    // emitted pair keeps the ratio exactly after rounding.
    let open_milli = (open * 1000.0).round() as i64;
    let form_milli = (open_milli * 7 + 5) / 10;
    let (open, form) = (open_milli as f64 / 1000.0, form_milli as f64 / 1000.0);
    debug!(rms, open, form, "frame estimate");

    VisemeSample {
        open: open as f32,
        form: form as f32,
    }
}

/// Estimate mouth parameters for one WAV-encoded chunk.
///
/// An unreadable container yields [`VisemeSample::CLOSED`] rather than an
/// error; the animation stream must never stall the audio.
pub fn estimate_wav(bytes: &[u8]) -> VisemeSample {
    match decode_wav(bytes) {
        Ok(frame) => estimate_frame(&frame),
        Err(e) => {
            warn!(error = %e, bytes = bytes.len(), "unreadable lip-sync chunk, closing mouth");
            VisemeSample::CLOSED
        }
    }
}

/// Root-mean-square amplitude. Zero for an empty slice.
pub fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum / samples.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::audio::encode_wav;

    fn constant(level: f32, n: usize) -> AudioFrame {
        AudioFrame::new(vec![level; n], 44_100)
    }

    fn sine(amp: f32, n: usize) -> AudioFrame {
        AudioFrame::new(
            (0..n)
                .map(|i| amp * (2.0 * std::f32::consts::PI * 200.0 * i as f32 / 44_100.0).sin())
                .collect(),
            44_100,
        )
    }

    #[test]
    fn empty_frame_is_closed() {
        assert_eq!(estimate_frame(&AudioFrame::empty(44_100)), VisemeSample::CLOSED);
    }

    #[test]
    fn near_silence_is_gated_to_exact_zero() {
        // rms 3e-5 → 3e-5^0.4 * 2.5 ≈ 0.039, under the gate.
        let sample = estimate_frame(&constant(3e-5, 4410));
        assert_eq!(sample.open, 0.0);
        assert_eq!(sample.form, 0.0);
    }

    #[test]
    fn just_above_gate_opens() {
        // rms 1e-4 → 0.0628 before rounding.
        let sample = estimate_frame(&constant(1e-4, 4410));
        assert_eq!(sample.open, 0.063);
        assert_eq!(sample.form, 0.044);
    }

    #[test]
    fn form_is_seven_tenths_of_open() {
        for amp in [0.001f32, 0.01, 0.05, 0.1, 0.2] {
            let s = estimate_frame(&sine(amp, 4410));
            assert!(!s.is_closed(), "amp {amp} gated");
            let expected = f64::from(s.open) * FORM_RATIO;
            assert!((f64::from(s.form) - expected).abs() <= 0.0005 + 1e-6, "amp {amp}");
        }
    }

    #[test]
    fn open_is_clipped_to_unit_range() {
        for amp in [0.0f32, 1e-6, 0.3, 1.0, 50.0, 1e6] {
            let s = estimate_frame(&constant(amp, 512));
            assert!((0.0..=1.0).contains(&s.open), "amp {amp} open {}", s.open);
            assert!((0.0..=1.0).contains(&s.form), "amp {amp} form {}", s.form);
        }
    }

    #[test]
    fn full_scale_sine_saturates() {
        let s = estimate_frame(&sine(1.0, 4410));
        assert!(s.open <= 1.0);
        assert!(s.open > 0.95);
        assert!((s.form - 0.7 * s.open).abs() < 1e-3);
    }

    #[test]
    fn repeated_calls_agree() {
        let frame = sine(0.12, 2205);
        assert_eq!(estimate_frame(&frame), estimate_frame(&frame));
        let wav = encode_wav(&frame).unwrap();
        assert_eq!(estimate_wav(&wav), estimate_wav(&wav));
    }

    #[test]
    fn non_finite_samples_close_the_mouth() {
        let mut frame = sine(0.5, 128);
        frame.samples[7] = f32::NAN;
        assert_eq!(estimate_frame(&frame), VisemeSample::CLOSED);

        frame.samples[7] = f32::INFINITY;
        assert_eq!(estimate_frame(&frame), VisemeSample::CLOSED);
    }

    #[test]
    fn unreadable_wav_is_closed_not_an_error() {
        assert_eq!(estimate_wav(&[]), VisemeSample::CLOSED);
        assert_eq!(estimate_wav(b"RIFF....WAVEjunk"), VisemeSample::CLOSED);
    }

    #[test]
    fn empty_wav_is_closed() {
        let wav = encode_wav(&AudioFrame::empty(44_100)).unwrap();
        assert_eq!(estimate_wav(&wav), VisemeSample::CLOSED);
    }

    #[test]
    fn wav_and_frame_paths_agree_on_quantized_audio() {
        let frame = sine(0.25, 4410);
        let wav = encode_wav(&frame).unwrap();
        let via_wav = estimate_wav(&wav);
        let direct = estimate_frame(&frame);
        assert!((via_wav.open - direct.open).abs() <= 0.001);
    }

    #[test]
    fn rms_of_constant_is_its_magnitude() {
        assert!((rms(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-12);
        assert_eq!(rms(&[]), 0.0);
    }
}
