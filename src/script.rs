//! Dialogue transcript parser.
//!
//! Turns a semi-structured script into an ordered sequence of [`Utterance`]s:
//!
//! ```text
//! Speaker 1: Hello, welcome to the show.
//! Speaker 2: Thanks for having me!
//!    It's great to be here.
//! ```
//!
//! Rules:
//! - A line matching `Speaker <N>: <text>` (keyword case-insensitive, `<N>`
//!   any digit sequence) starts a new utterance for speaker `N`.
//! - Any other non-blank line continues the current utterance; its trimmed
//!   content is appended with a single space.
//! - A continuation seen before any header starts an implicit utterance for
//!   speaker `"1"` (no speaker header found, default to speaker 1).
//! - Blank lines neither start nor extend an utterance.
//!
//! Utterance order equals source order; that order is the playback order.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::{Result, TtsError};

/// One dialogue turn. Immutable once produced by [`parse_script`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Digit sequence from the `Speaker <N>:` header ("1" when implicit).
    pub speaker_id: String,
    /// Trimmed turn text; continuation lines joined with single spaces.
    pub text: String,
}

/// Speaker used when a transcript carries no `Speaker N:` header at all.
pub const DEFAULT_SPEAKER_ID: &str = "1";

static HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^speaker\s+(\d+)\s*:\s*(.*)$").expect("valid header regex"));

/// Map typographic characters to ASCII equivalents before parsing, so the
/// transcript tokenizes the same way regardless of which word processor
/// produced it.
fn normalize_text(text: &str) -> String {
    text.replace(['\u{2019}', '\u{2018}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace('\u{2014}', "--")
        .replace('\u{2013}', "-")
        .replace('\u{2026}', "...")
}

/// Parse a raw transcript into ordered utterances.
///
/// Fails with [`TtsError::ScriptParse`] when the result would be empty —
/// input consisting entirely of blank lines (or nothing at all).
pub fn parse_script(raw: &str) -> Result<Vec<Utterance>> {
    let script = normalize_text(raw);

    let mut utterances: Vec<Utterance> = Vec::new();
    let mut current: Option<Utterance> = None;

    for line in script.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(caps) = HEADER_RE.captures(line) {
            if let Some(done) = current.take() {
                utterances.push(done);
            }
            current = Some(Utterance {
                speaker_id: caps[1].to_string(),
                text: caps[2].trim().to_string(),
            });
        } else {
            match current.as_mut() {
                Some(utt) => {
                    if !utt.text.is_empty() {
                        utt.text.push(' ');
                    }
                    utt.text.push_str(line);
                }
                None => {
                    debug!(line, "no speaker header yet, defaulting to speaker 1");
                    current = Some(Utterance {
                        speaker_id: DEFAULT_SPEAKER_ID.to_string(),
                        text: line.to_string(),
                    });
                }
            }
        }
    }

    if let Some(done) = current.take() {
        if !done.text.is_empty() {
            utterances.push(done);
        }
    }

    if utterances.is_empty() {
        return Err(TtsError::ScriptParse(
            "input contains no non-blank lines".to_string(),
        ));
    }

    Ok(utterances)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
