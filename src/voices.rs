//! Voice preset registry and speaker-to-voice assignment.
//!
//! A voices directory is scanned once (non-recursive) for `*.wav` files;
//! each file stem becomes an addressable preset name. Lookup resolves a
//! requested display name in three steps, first match wins:
//!
//! 1. exact (case-sensitive) match against a preset name;
//! 2. case-insensitive substring match in either direction — preset name
//!    inside the request, or request inside a preset name;
//! 3. fallback to the lexicographically-first preset, with a warning.
//!
//! The registry is a `BTreeMap` so step 2 tie-breaking and the step 3
//! fallback depend on sorted name order, never on the directory listing
//! order of the underlying filesystem.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Result, TtsError};
use crate::script::Utterance;

/// Filename suffix that marks a reference voice sample.
pub const VOICE_SUFFIX: &str = "wav";

/// Registry of reference voice samples, keyed by preset name.
#[derive(Debug, Default)]
pub struct VoicePresets {
    presets: BTreeMap<String, PathBuf>,
}

impl VoicePresets {
    /// Scan `dir` for voice samples. A missing or unreadable directory
    /// produces an empty registry and a diagnostic; resolution on an empty
    /// registry fails predictably instead of indexing into nothing.
    pub fn scan(dir: &Path) -> Self {
        let mut presets = BTreeMap::new();

        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("voices directory {} not readable: {err}", dir.display());
                return Self { presets };
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let is_voice = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(VOICE_SUFFIX));
            if !is_voice {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                presets.insert(stem.to_string(), path.clone());
            }
        }

        debug!("loaded {} voice presets from {}", presets.len(), dir.display());
        Self { presets }
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    /// Available preset names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.presets.keys().map(String::as_str).collect()
    }

    /// Resolve a speaker display name to a preset.
    ///
    /// Pure function of the registry and `name`; the only side effect is the
    /// warning emitted on the no-match fallback. Fails with
    /// [`TtsError::VoiceResolution`] when no presets exist at all.
    pub fn resolve(&self, name: &str) -> Result<(&str, &Path)> {
        if self.presets.is_empty() {
            return Err(TtsError::VoiceResolution(format!(
                "no voices configured, cannot resolve '{name}'"
            )));
        }

        if let Some((preset, path)) = self.presets.get_key_value(name) {
            return Ok((preset.as_str(), path.as_path()));
        }

        let wanted = name.to_lowercase();
        for (preset, path) in &self.presets {
            let candidate = preset.to_lowercase();
            if wanted.contains(&candidate) || candidate.contains(&wanted) {
                debug!("voice '{name}' matched preset '{preset}' by substring");
                return Ok((preset.as_str(), path.as_path()));
            }
        }

        // BTreeMap iteration is sorted, so this is the lexicographically
        // first preset.
        let (preset, path) = self
            .presets
            .iter()
            .next()
            .expect("registry checked non-empty above");
        warn!("no voice preset matches '{name}', falling back to '{preset}'");
        Ok((preset.as_str(), path.as_path()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cast assembly
// ─────────────────────────────────────────────────────────────────────────────

/// One distinct speaker in a dialogue, bound to a reference voice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastMember {
    /// Speaker id as written in the script ("1", "2", …).
    pub speaker_id: String,
    /// Display name the voice was resolved under.
    pub display_name: String,
    /// Preset the resolver chose.
    pub preset: String,
    /// Path of the reference voice sample.
    pub voice_path: PathBuf,
}

/// Distinct speakers of a parsed script in first-appearance order, plus a
/// per-utterance index into that list.
///
/// Assembly guarantees the invariant the synthesis call relies on: every
/// utterance maps to exactly one cast member, and every cast member has
/// exactly one resolved voice path.
#[derive(Debug)]
pub struct Cast {
    pub members: Vec<CastMember>,
    /// `turn_members[i]` is the member index for utterance `i`.
    pub turn_members: Vec<usize>,
}

/// Display name a script speaker id resolves voices under.
///
/// Only id "1" is mapped to the configured default speaker; every other id
/// keeps its `Speaker <N>` identity and is matched against the presets on
/// its own (usually landing on the deterministic fallback).
fn display_name(speaker_id: &str, default_speaker: &str) -> String {
    if speaker_id == "1" {
        default_speaker.to_string()
    } else {
        format!("Speaker {speaker_id}")
    }
}

impl Cast {
    /// Bind every utterance to a voice before any model work happens, so an
    /// unresolvable script fails without paying for an inference call.
    pub fn assemble(
        utterances: &[Utterance],
        default_speaker: &str,
        presets: &VoicePresets,
    ) -> Result<Self> {
        let mut members: Vec<CastMember> = Vec::new();
        let mut turn_members = Vec::with_capacity(utterances.len());

        for utterance in utterances {
            let index = members
                .iter()
                .position(|m| m.speaker_id == utterance.speaker_id);
            let index = match index {
                Some(i) => i,
                None => {
                    let name = display_name(&utterance.speaker_id, default_speaker);
                    let (preset, path) = presets.resolve(&name)?;
                    members.push(CastMember {
                        speaker_id: utterance.speaker_id.clone(),
                        display_name: name,
                        preset: preset.to_string(),
                        voice_path: path.to_path_buf(),
                    });
                    members.len() - 1
                }
            };
            turn_members.push(index);
        }

        Ok(Self { members, turn_members })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parse_script;

    fn voices_dir(names: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            std::fs::write(dir.path().join(name), b"RIFF").unwrap();
        }
        dir
    }

    #[test]
    fn test_scan_ignores_non_wav_and_subdirs() {
        let dir = voices_dir(&["alice.wav", "notes.txt"]);
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("bob.wav"), b"RIFF").unwrap();

        let presets = VoicePresets::scan(dir.path());
        assert_eq!(presets.names(), vec!["alice"]);
    }

    #[test]
    fn test_missing_directory_yields_empty_registry() {
        let presets = VoicePresets::scan(Path::new("/nonexistent/voices"));
        assert!(presets.is_empty());
        assert!(matches!(
            presets.resolve("anyone"),
            Err(TtsError::VoiceResolution(_))
        ));
    }

    #[test]
    fn test_exact_match_wins() {
        let dir = voices_dir(&["alice.wav", "bob.wav", "carol.wav"]);
        let presets = VoicePresets::scan(dir.path());
        let (name, path) = presets.resolve("alice").unwrap();
        assert_eq!(name, "alice");
        assert!(path.ends_with("alice.wav"));
    }

    #[test]
    fn test_substring_match_is_case_insensitive_both_directions() {
        let dir = voices_dir(&["alice.wav", "bob.wav", "carol.wav"]);
        let presets = VoicePresets::scan(dir.path());

        // preset name inside the request
        let (name, _) = presets.resolve("Alice2").unwrap();
        assert_eq!(name, "alice");

        // request inside a preset name
        let (name, _) = presets.resolve("CAR").unwrap();
        assert_eq!(name, "carol");
    }

    #[test]
    fn test_substring_ties_break_in_sorted_order() {
        let dir = voices_dir(&["anna-2.wav", "anna-1.wav"]);
        let presets = VoicePresets::scan(dir.path());
        let (name, _) = presets.resolve("anna").unwrap();
        assert_eq!(name, "anna-1");
    }

    #[test]
    fn test_unmatched_name_falls_back_to_first_sorted_preset() {
        let dir = voices_dir(&["carol.wav", "alice.wav", "bob.wav"]);
        let presets = VoicePresets::scan(dir.path());
        let (name, path) = presets.resolve("zed").unwrap();
        assert_eq!(name, "alice");
        assert!(path.ends_with("alice.wav"));
    }

    #[test]
    fn test_names_are_sorted() {
        let dir = voices_dir(&["carol.wav", "alice.wav", "bob.wav"]);
        let presets = VoicePresets::scan(dir.path());
        assert_eq!(presets.names(), vec!["alice", "bob", "carol"]);
    }

    #[test]
    fn test_cast_end_to_end_scenario() {
        // Speaker 1 resolves to the configured default; unmapped speaker 2
        // falls back to the first preset alphabetically.
        let dir = voices_dir(&["Alice.wav", "Bob.wav"]);
        let presets = VoicePresets::scan(dir.path());
        let utterances = parse_script("Speaker 1: Hello there.\nSpeaker 2: Hi!\n").unwrap();
        assert_eq!(utterances.len(), 2);

        let cast = Cast::assemble(&utterances, "Alice", &presets).unwrap();
        assert_eq!(cast.members.len(), 2);
        assert_eq!(cast.turn_members, vec![0, 1]);

        assert_eq!(cast.members[0].display_name, "Alice");
        assert!(cast.members[0].voice_path.ends_with("Alice.wav"));

        assert_eq!(cast.members[1].display_name, "Speaker 2");
        assert!(cast.members[1].voice_path.ends_with("Alice.wav"));
    }

    #[test]
    fn test_cast_reuses_member_for_repeated_speaker() {
        let dir = voices_dir(&["Alice.wav"]);
        let presets = VoicePresets::scan(dir.path());
        let utterances =
            parse_script("Speaker 1: a\nSpeaker 2: b\nSpeaker 1: c\n").unwrap();

        let cast = Cast::assemble(&utterances, "Alice", &presets).unwrap();
        assert_eq!(cast.members.len(), 2);
        assert_eq!(cast.turn_members, vec![0, 1, 0]);
    }

    #[test]
    fn test_cast_fails_with_no_presets() {
        let dir = tempfile::tempdir().unwrap();
        let presets = VoicePresets::scan(dir.path());
        let utterances = parse_script("Speaker 1: hi").unwrap();
        assert!(matches!(
            Cast::assemble(&utterances, "Alice", &presets),
            Err(TtsError::VoiceResolution(_))
        ));
    }
}
