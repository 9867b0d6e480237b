//! Error taxonomy for the synthesis pipeline.
//!
//! Every error is terminal for the invocation — the tool produces either a
//! complete WAV or a diagnostic, never a partial result, so there is no
//! retry machinery here. The CLI maps [`TtsError::exit_code`] onto the
//! process exit status.

use thiserror::Error;

/// Failure categories surfaced by the library.
#[derive(Debug, Error)]
pub enum TtsError {
    /// No usable input text: empty after trimming, or stdin empty with no
    /// file/text flag given.
    #[error("no usable input text: {0}")]
    Input(String),

    /// The parser yielded zero utterances from non-empty input.
    #[error("no valid script found: {0}")]
    ScriptParse(String),

    /// No reference voice can be produced for a speaker. Distinct from the
    /// warn-and-fallback case: this fires only when no presets exist at all.
    #[error("voice resolution failed: {0}")]
    VoiceResolution(String),

    /// The model returned an unexpected or missing result for an output key.
    #[error("model output invalid: {0}")]
    ModelIo(String),

    /// Both the primary and the fallback audio encoders failed.
    #[error("audio encoding failed: {0}")]
    Encoding(String),

    /// Collaborator glue (download, session setup, file I/O).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TtsError {
    /// Process exit status for this error: 2 for missing/empty input and
    /// unparsable scripts, 1 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            TtsError::Input(_) | TtsError::ScriptParse(_) => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, TtsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_exit_with_2() {
        assert_eq!(TtsError::Input("empty".into()).exit_code(), 2);
        assert_eq!(TtsError::ScriptParse("blank".into()).exit_code(), 2);
    }

    #[test]
    fn other_errors_exit_with_1() {
        assert_eq!(TtsError::VoiceResolution("none".into()).exit_code(), 1);
        assert_eq!(TtsError::ModelIo("missing output".into()).exit_code(), 1);
        assert_eq!(TtsError::Encoding("both failed".into()).exit_code(), 1);
    }
}
