//! WAV decoding and encoding on top of [`hound`].
//!
//! Reference voices come in as WAV files of whatever format the user
//! recorded (PCM 16/24/32 or IEEE float, any channel count, any rate) and
//! leave this module as mono f32 at the model sample rate. Output audio is
//! encoded in memory so the caller can write it to a file or to stdout.
//!
//! The primary output encoding is 32-bit IEEE-float WAV. If that fails the
//! encoder falls back to 16-bit PCM; only when both fail does the caller
//! see an error.

use std::io::Cursor;
use std::path::Path;

use anyhow::Context;
use tracing::{debug, warn};

use crate::error::{Result, TtsError};

/// A mono waveform with samples in `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Resample to `target_rate` by linear interpolation. Reference clips
    /// are a few seconds long, so a windowed-sinc resampler buys nothing
    /// here.
    pub fn resampled(&self, target_rate: u32) -> AudioClip {
        if self.sample_rate == target_rate || self.samples.is_empty() {
            return AudioClip { samples: self.samples.clone(), sample_rate: target_rate };
        }

        let ratio = self.sample_rate as f64 / target_rate as f64;
        let out_len =
            ((self.samples.len() as f64 / ratio).round() as usize).max(1);

        let mut out = Vec::with_capacity(out_len);
        for i in 0..out_len {
            let pos = i as f64 * ratio;
            let left = pos.floor() as usize;
            let frac = (pos - left as f64) as f32;
            let a = self.samples[left.min(self.samples.len() - 1)];
            let b = self.samples[(left + 1).min(self.samples.len() - 1)];
            out.push(a + (b - a) * frac);
        }

        AudioClip { samples: out, sample_rate: target_rate }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decoding
// ─────────────────────────────────────────────────────────────────────────────

/// Read a WAV file as a mono [`AudioClip`], averaging channels.
pub fn read_wav_mono(path: &Path) -> Result<AudioClip> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("cannot open voice sample: {}", path.display()))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .with_context(|| format!("bad float sample in {}", path.display()))?,
        hound::SampleFormat::Int => {
            // i32 covers 16/24/32-bit PCM; scale by the format's full range.
            let scale = ((1i64 << (spec.bits_per_sample - 1)) - 1) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .with_context(|| format!("bad PCM sample in {}", path.display()))?
        }
    };

    let channels = spec.channels.max(1) as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    debug!(
        "decoded {}: {} samples, {} Hz, {} channel(s)",
        path.display(),
        samples.len(),
        spec.sample_rate,
        channels
    );

    Ok(AudioClip { samples, sample_rate: spec.sample_rate })
}

// ─────────────────────────────────────────────────────────────────────────────
// Encoding
// ─────────────────────────────────────────────────────────────────────────────

/// Output WAV sample encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum WavEncoding {
    /// 32-bit IEEE float (primary).
    Float32,
    /// 16-bit PCM (fallback; clamp-and-scale).
    Pcm16,
}

/// Encode `samples` into an in-memory WAV container.
pub fn encode_wav(samples: &[f32], sample_rate: u32, encoding: WavEncoding) -> Result<Vec<u8>> {
    let spec = match encoding {
        WavEncoding::Float32 => hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        },
        WavEncoding::Pcm16 => hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        },
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| TtsError::Encoding(format!("cannot start WAV stream: {e}")))?;
        match encoding {
            WavEncoding::Float32 => {
                for &s in samples {
                    writer
                        .write_sample(s)
                        .map_err(|e| TtsError::Encoding(format!("WAV write error: {e}")))?;
                }
            }
            WavEncoding::Pcm16 => {
                for &s in samples {
                    let s16 = (s * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
                    writer
                        .write_sample(s16)
                        .map_err(|e| TtsError::Encoding(format!("WAV write error: {e}")))?;
                }
            }
        }
        writer
            .finalize()
            .map_err(|e| TtsError::Encoding(format!("WAV finalize error: {e}")))?;
    }
    Ok(cursor.into_inner())
}

/// Encode with the requested encoding, falling back to PCM16 on failure.
///
/// Surfaces [`TtsError::Encoding`] only when the fallback also fails.
pub fn encode_wav_with_fallback(
    samples: &[f32],
    sample_rate: u32,
    encoding: WavEncoding,
) -> Result<Vec<u8>> {
    match encode_wav(samples, sample_rate, encoding) {
        Ok(bytes) => Ok(bytes),
        Err(primary) if encoding != WavEncoding::Pcm16 => {
            warn!("primary WAV encoder failed ({primary}), retrying as 16-bit PCM");
            encode_wav(samples, sample_rate, WavEncoding::Pcm16).map_err(|fallback| {
                TtsError::Encoding(format!(
                    "primary encoder failed ({primary}); fallback failed ({fallback})"
                ))
            })
        }
        Err(primary) => Err(primary),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> (hound::WavSpec, Vec<f32>) {
        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        let samples = match spec.sample_format {
            hound::SampleFormat::Float => {
                reader.samples::<f32>().map(|s| s.unwrap()).collect()
            }
            hound::SampleFormat::Int => {
                let scale = ((1i64 << (spec.bits_per_sample - 1)) - 1) as f32;
                reader.samples::<i32>().map(|s| s.unwrap() as f32 / scale).collect()
            }
        };
        (spec, samples)
    }

    #[test]
    fn test_float32_round_trip_is_exact() {
        let samples = vec![0.0f32, 0.25, -0.5, 0.999, -1.0];
        let bytes = encode_wav(&samples, 24_000, WavEncoding::Float32).unwrap();

        let (spec, decoded) = decode(&bytes);
        assert_eq!(spec.sample_rate, 24_000);
        assert_eq!(spec.sample_format, hound::SampleFormat::Float);
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_pcm16_round_trip_within_quantization() {
        let samples = vec![0.0f32, 0.25, -0.5, 0.9];
        let bytes = encode_wav(&samples, 24_000, WavEncoding::Pcm16).unwrap();

        let (spec, decoded) = decode(&bytes);
        assert_eq!(spec.sample_rate, 24_000);
        assert_eq!(spec.bits_per_sample, 16);
        for (a, b) in samples.iter().zip(&decoded) {
            assert!((a - b).abs() < 1.0 / 16_384.0, "{a} vs {b}");
        }
    }

    #[test]
    fn test_both_encodings_produce_riff_header() {
        for encoding in [WavEncoding::Float32, WavEncoding::Pcm16] {
            let bytes = encode_wav(&[0.1, -0.1], 24_000, encoding).unwrap();
            assert_eq!(&bytes[..4], b"RIFF");
            assert_eq!(&bytes[8..12], b"WAVE");
        }
    }

    #[test]
    fn test_fallback_path_yields_decodable_wav() {
        let bytes = encode_wav_with_fallback(&[0.5, -0.5], 24_000, WavEncoding::Pcm16).unwrap();
        let (spec, _) = decode(&bytes);
        assert_eq!(spec.sample_rate, 24_000);
    }

    #[test]
    fn test_read_wav_mono_downmixes_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");

        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 48_000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for frame in [[1.0f32, 0.0], [0.5, 0.5], [-1.0, 1.0]] {
            writer.write_sample(frame[0]).unwrap();
            writer.write_sample(frame[1]).unwrap();
        }
        writer.finalize().unwrap();

        let clip = read_wav_mono(&path).unwrap();
        assert_eq!(clip.sample_rate, 48_000);
        assert_eq!(clip.samples, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_resample_identity_and_halving() {
        let clip = AudioClip { samples: vec![0.0, 1.0, 0.0, -1.0], sample_rate: 48_000 };

        let same = clip.resampled(48_000);
        assert_eq!(same.samples, clip.samples);

        let half = clip.resampled(24_000);
        assert_eq!(half.sample_rate, 24_000);
        assert_eq!(half.samples.len(), 2);
        assert_eq!(half.samples[0], 0.0);
    }

    #[test]
    fn test_duration() {
        let clip = AudioClip { samples: vec![0.0; 24_000], sample_rate: 24_000 };
        assert!((clip.duration_secs() - 1.0).abs() < 1e-6);
    }
}
