//! ONNX dialogue synthesis session.
//!
//! Uses [`ort`] (ONNX Runtime Rust bindings) for inference. The whole
//! dialogue goes through ONE batched generate call; the model inputs are:
//!
//! | Name            | Shape                     | dtype   |
//! |-----------------|---------------------------|---------|
//! | `text_ids`      | `[turns, max_text_len]`   | int64   |
//! | `text_mask`     | `[turns, max_text_len]`   | int64   |
//! | `speaker_index` | `[turns]`                 | int64   |
//! | `voice_samples` | `[speakers, max_samples]` | float32 |
//! | `voice_mask`    | `[speakers, max_samples]` | float32 |
//!
//! Output 0 is the concatenated waveform, `[1, samples]` or `[samples]`,
//! float32 in `[-1, 1]`.
//!
//! The call is opaque and blocking: no internal timeout or cancellation.
//! Callers wanting cancellation must wrap the process externally.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Context};
use ort::{inputs, session::Session, value::Tensor};
use tokenizers::Tokenizer;
use tracing::debug;

use crate::audio::AudioClip;
use crate::error::{Result, TtsError};

/// Token id used to pad text sequences to the batch width.
const TEXT_PAD_ID: i64 = 0;

/// A fully aligned batch for one generate call.
///
/// The parallel lists are index-aligned per turn: `texts[i]` is spoken by
/// the speakers named in `speaker_names[i]`, conditioned through
/// `speaker_index[i]` on one of the `voice_clips`. Misalignment here would
/// silently put the wrong voice on an utterance, so construction rejects it
/// up front.
#[derive(Debug)]
pub struct GenerateRequest {
    /// Ordered utterance texts, one per dialogue turn.
    pub texts: Vec<String>,
    /// Per-turn speaker name lists (one name per turn in this design).
    pub speaker_names: Vec<Vec<String>>,
    /// Reference voice waveforms, one per distinct speaker.
    pub voice_clips: Vec<AudioClip>,
    /// Per-turn index into `voice_clips`.
    pub speaker_index: Vec<usize>,
}

impl GenerateRequest {
    /// Validate the ordered-list alignment invariant.
    pub fn validate(&self) -> Result<()> {
        if self.texts.is_empty() {
            return Err(TtsError::ModelIo("empty generate request".into()));
        }
        if self.texts.len() != self.speaker_names.len()
            || self.texts.len() != self.speaker_index.len()
        {
            return Err(TtsError::ModelIo(format!(
                "misaligned request: {} texts, {} speaker lists, {} indices",
                self.texts.len(),
                self.speaker_names.len(),
                self.speaker_index.len()
            )));
        }
        if self.voice_clips.is_empty() {
            return Err(TtsError::ModelIo("no voice clips in request".into()));
        }
        if let Some(&bad) = self
            .speaker_index
            .iter()
            .find(|&&i| i >= self.voice_clips.len())
        {
            return Err(TtsError::ModelIo(format!(
                "speaker index {bad} out of range ({} voices)",
                self.voice_clips.len()
            )));
        }
        Ok(())
    }
}

/// Result of one batched generate call.
#[derive(Debug)]
pub struct Synthesis {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Batch padding helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Pad id sequences to the longest row. Returns `(ids, mask, width)` with
/// both matrices flat row-major; mask is 1 for real tokens, 0 for padding.
fn pad_token_batch(rows: &[Vec<i64>]) -> (Vec<i64>, Vec<i64>, usize) {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0).max(1);
    let mut ids = Vec::with_capacity(rows.len() * width);
    let mut mask = Vec::with_capacity(rows.len() * width);
    for row in rows {
        ids.extend_from_slice(row);
        ids.extend(std::iter::repeat(TEXT_PAD_ID).take(width - row.len()));
        mask.extend(std::iter::repeat(1i64).take(row.len()));
        mask.extend(std::iter::repeat(0i64).take(width - row.len()));
    }
    (ids, mask, width)
}

/// Pad voice waveforms with zeros to the longest clip. Returns
/// `(samples, mask, width)`; mask is 1.0 over real samples, 0.0 over pad.
fn pad_voice_batch(clips: &[AudioClip]) -> (Vec<f32>, Vec<f32>, usize) {
    let width = clips.iter().map(|c| c.samples.len()).max().unwrap_or(0).max(1);
    let mut samples = Vec::with_capacity(clips.len() * width);
    let mut mask = Vec::with_capacity(clips.len() * width);
    for clip in clips {
        samples.extend_from_slice(&clip.samples);
        samples.extend(std::iter::repeat(0.0f32).take(width - clip.samples.len()));
        mask.extend(std::iter::repeat(1.0f32).take(clip.samples.len()));
        mask.extend(std::iter::repeat(0.0f32).take(width - clip.samples.len()));
    }
    (samples, mask, width)
}

/// Prompt line fed to the tokenizer for one turn. The speaker tag uses the
/// cast member index so the model sees the same 0-based numbering the voice
/// batch is ordered by.
fn prompt_line(member_index: usize, text: &str) -> String {
    format!("Speaker {member_index}: {text}\n")
}

// ─────────────────────────────────────────────────────────────────────────────
// DialogueModel
// ─────────────────────────────────────────────────────────────────────────────

/// Handle to a loaded synthesis model.
pub struct DialogueModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    sample_rate: u32,
}

impl DialogueModel {
    /// Load the model from an ONNX file and a `tokenizer.json`.
    pub fn load(model_path: &Path, tokenizer_path: &Path, sample_rate: u32) -> Result<Self> {
        let session = Session::builder()
            .context("Failed to create ORT session builder")?
            .commit_from_file(model_path)
            .with_context(|| format!("Cannot load ONNX model: {}", model_path.display()))?;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow!("Cannot load tokenizer {}: {e}", tokenizer_path.display()))?;

        Ok(Self { session: Mutex::new(session), tokenizer, sample_rate })
    }

    /// Waveform sample rate this model produces.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn encode_turn(&self, member_index: usize, text: &str) -> Result<Vec<i64>> {
        let line = prompt_line(member_index, text);
        let encoding = self
            .tokenizer
            .encode(line.as_str(), false)
            .map_err(|e| anyhow!("Failed to tokenize turn for speaker {member_index}: {e}"))?;
        Ok(encoding.get_ids().iter().map(|&id| id as i64).collect())
    }

    /// Run one batched generate call over the whole dialogue.
    ///
    /// Reference clips must already be at [`sample_rate`](Self::sample_rate);
    /// the CLI resamples them on load.
    pub fn generate(&self, request: &GenerateRequest) -> Result<Synthesis> {
        request.validate()?;

        // ── Tokenize and pad the per-turn prompts ────────────────────────────
        let mut rows = Vec::with_capacity(request.texts.len());
        for (turn, text) in request.texts.iter().enumerate() {
            rows.push(self.encode_turn(request.speaker_index[turn], text)?);
        }
        let turns = rows.len();
        let (text_ids, text_mask, text_width) = pad_token_batch(&rows);

        // ── Pad the voice batch ──────────────────────────────────────────────
        let speakers = request.voice_clips.len();
        let (voice_samples, voice_mask, voice_width) = pad_voice_batch(&request.voice_clips);

        let speaker_index: Vec<i64> =
            request.speaker_index.iter().map(|&i| i as i64).collect();

        debug!(
            "generate: {turns} turn(s), {speakers} speaker(s), \
             text width {text_width}, voice width {voice_width}"
        );

        // ── Build ORT tensors ────────────────────────────────────────────────
        let t_text_ids = Tensor::<i64>::from_array(([turns, text_width], text_ids))
            .context("Failed to build text_ids tensor")?;
        let t_text_mask = Tensor::<i64>::from_array(([turns, text_width], text_mask))
            .context("Failed to build text_mask tensor")?;
        let t_speaker_index = Tensor::<i64>::from_array(([turns], speaker_index))
            .context("Failed to build speaker_index tensor")?;
        let t_voice_samples = Tensor::<f32>::from_array(([speakers, voice_width], voice_samples))
            .context("Failed to build voice_samples tensor")?;
        let t_voice_mask = Tensor::<f32>::from_array(([speakers, voice_width], voice_mask))
            .context("Failed to build voice_mask tensor")?;

        // ── Inference ────────────────────────────────────────────────────────
        let mut session = self.session.lock().expect("ORT session mutex poisoned");
        let outputs = session
            .run(inputs![
                "text_ids" => t_text_ids,
                "text_mask" => t_text_mask,
                "speaker_index" => t_speaker_index,
                "voice_samples" => t_voice_samples,
                "voice_mask" => t_voice_mask
            ])
            .context("ONNX inference failed")?;

        // ── Defensive output extraction ──────────────────────────────────────
        if outputs.len() == 0 {
            return Err(TtsError::ModelIo("model returned no output tensors".into()));
        }
        let (_shape, waveform) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| TtsError::ModelIo(format!("waveform output not f32: {e}")))?;
        if waveform.is_empty() {
            return Err(TtsError::ModelIo("model returned an empty waveform".into()));
        }

        Ok(Synthesis { samples: waveform.to_vec(), sample_rate: self.sample_rate })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(samples: Vec<f32>) -> AudioClip {
        AudioClip { samples, sample_rate: 24_000 }
    }

    fn request() -> GenerateRequest {
        GenerateRequest {
            texts: vec!["Hello there.".into(), "Hi!".into()],
            speaker_names: vec![vec!["Alice".into()], vec!["Speaker 2".into()]],
            voice_clips: vec![clip(vec![0.1; 5]), clip(vec![0.2; 3])],
            speaker_index: vec![0, 1],
        }
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_misaligned_request_is_rejected() {
        let mut req = request();
        req.speaker_names.pop();
        assert!(matches!(req.validate(), Err(TtsError::ModelIo(_))));
    }

    #[test]
    fn test_out_of_range_speaker_index_is_rejected() {
        let mut req = request();
        req.speaker_index[1] = 7;
        assert!(matches!(req.validate(), Err(TtsError::ModelIo(_))));
    }

    #[test]
    fn test_empty_request_is_rejected() {
        let req = GenerateRequest {
            texts: vec![],
            speaker_names: vec![],
            voice_clips: vec![],
            speaker_index: vec![],
        };
        assert!(matches!(req.validate(), Err(TtsError::ModelIo(_))));
    }

    #[test]
    fn test_pad_token_batch_masks_align() {
        let rows = vec![vec![5i64, 6, 7], vec![8i64]];
        let (ids, mask, width) = pad_token_batch(&rows);
        assert_eq!(width, 3);
        assert_eq!(ids, vec![5, 6, 7, 8, TEXT_PAD_ID, TEXT_PAD_ID]);
        assert_eq!(mask, vec![1, 1, 1, 1, 0, 0]);
        // mask total per row equals the unpadded length
        assert_eq!(mask[..3].iter().sum::<i64>(), 3);
        assert_eq!(mask[3..].iter().sum::<i64>(), 1);
    }

    #[test]
    fn test_pad_voice_batch_zero_fills() {
        let clips = vec![clip(vec![0.5, -0.5]), clip(vec![0.1, 0.2, 0.3, 0.4])];
        let (samples, mask, width) = pad_voice_batch(&clips);
        assert_eq!(width, 4);
        assert_eq!(samples.len(), 8);
        assert_eq!(&samples[..4], &[0.5, -0.5, 0.0, 0.0]);
        assert_eq!(&mask[..4], &[1.0, 1.0, 0.0, 0.0]);
        assert_eq!(&mask[4..], &[1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_prompt_line_uses_member_index() {
        assert_eq!(prompt_line(0, "Hello."), "Speaker 0: Hello.\n");
        assert_eq!(prompt_line(1, "Hi!"), "Speaker 1: Hi!\n");
    }
}
