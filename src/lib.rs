//! # vibetts
//!
//! Rust port of the VibeVoice dialogue TTS command line —
//! multi-speaker text-to-speech over an ONNX export of a
//! VibeVoice-style synthesis model.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::path::Path;
//! use vibetts::{download, Cast, GenerateRequest, VoicePresets};
//!
//! // Parse a dialogue transcript into ordered utterances
//! let script = "Speaker 1: Hello there.\nSpeaker 2: Hi!\n";
//! let utterances = vibetts::parse_script(script).unwrap();
//!
//! // Bind each speaker to a reference voice sample
//! let presets = VoicePresets::scan(Path::new("voices"));
//! let cast = Cast::assemble(&utterances, "Alice", &presets).unwrap();
//!
//! // Download the model from HuggingFace (cached after first run) and
//! // synthesise the whole dialogue in one batched call
//! let model = download::load_from_hub("microsoft/VibeVoice-1.5B").unwrap();
//! let clips = cast
//!     .members
//!     .iter()
//!     .map(|m| vibetts::audio::read_wav_mono(&m.voice_path).map(|c| c.resampled(model.sample_rate())))
//!     .collect::<Result<Vec<_>, _>>()
//!     .unwrap();
//! let request = GenerateRequest {
//!     texts: utterances.iter().map(|u| u.text.clone()).collect(),
//!     speaker_names: cast.turn_members.iter().map(|&i| vec![cast.members[i].display_name.clone()]).collect(),
//!     voice_clips: clips,
//!     speaker_index: cast.turn_members.clone(),
//! };
//! let synthesis = model.generate(&request).unwrap();
//!
//! // Encode as WAV (float32 primary, PCM16 fallback)
//! let bytes = vibetts::audio::encode_wav_with_fallback(
//!     &synthesis.samples,
//!     synthesis.sample_rate,
//!     vibetts::audio::WavEncoding::Float32,
//! ).unwrap();
//! std::fs::write("dialogue.wav", bytes).unwrap();
//! ```
//!
//! ## Pipeline
//! 1. **Script parsing** — `Speaker N: text` transcript → ordered utterances.
//! 2. **Voice resolution** — speaker names → reference WAVs from a voices
//!    directory (exact, then fuzzy, then deterministic fallback).
//! 3. **Batch assembly** — per-turn token ids + attention masks, padded
//!    reference waveforms + validity masks.
//! 4. **ONNX inference** — one batched generate call for the whole dialogue.
//! 5. **Encoding** — float32 WAV, PCM16 fallback, file or stdout.

pub mod audio;
pub mod download;
pub mod error;
pub mod model;
pub mod script;
pub mod voices;

// ─── Re-exports for convenience ─────────────────────────────────────────────

pub use error::{Result, TtsError};
pub use model::{DialogueModel, GenerateRequest, Synthesis};
pub use script::{parse_script, Utterance};
pub use voices::{Cast, CastMember, VoicePresets};
