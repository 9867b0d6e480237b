//! HuggingFace Hub model downloader.
//!
//! Downloads `config.json`, the ONNX model, and `tokenizer.json` from a
//! HuggingFace repository, then constructs and returns a [`DialogueModel`].

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use hf_hub::api::sync::Api;
use serde::Deserialize;
use tracing::info;

use crate::model::DialogueModel;

/// Sample rate assumed when the repo config does not carry one.
const DEFAULT_SAMPLE_RATE: u32 = 24_000;

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

// ─────────────────────────────────────────────────────────────────────────────
// config.json schema
// ─────────────────────────────────────────────────────────────────────────────

/// Deserialised `config.json` from a vibetts model repository.
#[derive(Debug, Deserialize)]
pub struct ModelConfig {
    /// Must be `"ONNX1"` or `"ONNX2"`.
    #[serde(rename = "type")]
    pub model_type: String,

    /// Filename of the ONNX model inside the repo (e.g. `"model.onnx"`).
    pub model_file: String,

    /// Filename of the tokenizer inside the repo (e.g. `"tokenizer.json"`).
    pub tokenizer_file: String,

    /// Waveform sample rate the model produces.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Download helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Download a single file from a HuggingFace repository.
fn hf_download(api: &Api, repo_id: &str, filename: &str) -> Result<PathBuf> {
    let repo = api.model(repo_id.to_string());
    repo.get(filename)
        .with_context(|| format!("Failed to download '{}' from '{}'", filename, repo_id))
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Download and initialise a [`DialogueModel`] from HuggingFace.
///
/// Files are cached in the HuggingFace Hub cache directory
/// (`~/.cache/huggingface/hub` by default).
///
/// # Arguments
/// * `repo_id` — HuggingFace repository ID, e.g. `"microsoft/VibeVoice-1.5B"`.
pub fn load_from_hub(repo_id: &str) -> Result<DialogueModel> {
    // Expand bare model names (e.g. "VibeVoice-1.5B" → "microsoft/VibeVoice-1.5B")
    let repo_id = if repo_id.contains('/') {
        repo_id.to_string()
    } else {
        format!("microsoft/{}", repo_id)
    };

    info!("downloading config from {repo_id}");
    let api = Api::new().context("Failed to initialise HuggingFace Hub client")?;

    // ── config.json ──────────────────────────────────────────────────────────
    let config_path = hf_download(&api, &repo_id, "config.json")?;
    let config_bytes = std::fs::read(&config_path)
        .with_context(|| format!("Cannot read config: {}", config_path.display()))?;
    let config: ModelConfig = serde_json::from_slice(&config_bytes)
        .context("Failed to parse config.json")?;

    if !matches!(config.model_type.as_str(), "ONNX1" | "ONNX2") {
        bail!(
            "Unsupported model type '{}' — expected ONNX1 or ONNX2",
            config.model_type
        );
    }

    // ── ONNX model ───────────────────────────────────────────────────────────
    info!("downloading model file ({})", config.model_file);
    let model_path = hf_download(&api, &repo_id, &config.model_file)?;

    // ── Tokenizer ────────────────────────────────────────────────────────────
    info!("downloading tokenizer ({})", config.tokenizer_file);
    let tokenizer_path = hf_download(&api, &repo_id, &config.tokenizer_file)?;

    // ── Build model ──────────────────────────────────────────────────────────
    info!("loading model");
    DialogueModel::load(&model_path, &tokenizer_path, config.sample_rate)
        .map_err(anyhow::Error::from)
}
