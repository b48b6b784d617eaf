//! Script segments and the segmenter
//!
//! A script is split into one [`Segment`] per spoken line. Each segment carries
//! its own generation state: untouched, generating, ready (with audio), or
//! failed (with a message). Only one of those holds at a time.

use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::playback::PlayableHandle;
use crate::voices::{HostStyle, VoiceConfiguration};

// ============================================================================
// DATA MODELS
// ============================================================================

/// Audio produced for a segment
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAudio {
    /// Encoded clip bytes as returned by the speech endpoint
    pub clip: Bytes,
    /// Duration read back by the decoder probe
    pub duration_seconds: f64,
    /// Handle a player can resolve to `clip`
    pub handle: PlayableHandle,
}

/// Generation lifecycle of one segment
#[derive(Debug, Clone, Default, PartialEq)]
pub enum GenerationState {
    /// Never attempted
    #[default]
    Pending,
    /// Synthesis call in flight
    Generating,
    Ready(GeneratedAudio),
    Failed(String),
}

/// One speakable line of a script
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Stable id, unique within one segment list
    pub id: String,
    /// Raw script line; speaker labels are stripped at synthesis time
    pub text: String,
    /// Voice id from the catalog
    pub voice: String,
    /// Speaker label found at the start of the line, if any
    pub host_name: Option<String>,
    state: GenerationState,
}

impl Segment {
    pub fn new(id: impl Into<String>, text: impl Into<String>, voice: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            voice: voice.into(),
            host_name: None,
            state: GenerationState::Pending,
        }
    }

    pub fn state(&self) -> &GenerationState {
        &self.state
    }

    pub fn is_generating(&self) -> bool {
        matches!(self.state, GenerationState::Generating)
    }

    pub fn has_audio(&self) -> bool {
        matches!(self.state, GenerationState::Ready(_))
    }

    pub fn audio(&self) -> Option<&GeneratedAudio> {
        match &self.state {
            GenerationState::Ready(audio) => Some(audio),
            _ => None,
        }
    }

    pub fn audio_clip(&self) -> Option<&Bytes> {
        self.audio().map(|a| &a.clip)
    }

    pub fn playable_url(&self) -> Option<String> {
        self.audio().map(|a| a.handle.url())
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.audio().map(|a| a.duration_seconds)
    }

    pub fn last_error(&self) -> Option<&str> {
        match &self.state {
            GenerationState::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// Enter the generating state; drops any previous audio or error
    pub fn begin_generation(&mut self) {
        self.state = GenerationState::Generating;
    }

    /// Store a successful result; any previous handle is released
    pub fn complete(&mut self, audio: GeneratedAudio) {
        self.state = GenerationState::Ready(audio);
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.state = GenerationState::Failed(message.into());
    }
}

// ============================================================================
// SPEAKER LABELS
// ============================================================================

/// `Host:`, `Guest:`, `Interviewer:` and `Host 2 (Sam):` style labels, anywhere in a line
static SPEAKER_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:host|guest|interviewer)(?:\s*\d+)?(?:\s*\([^)]*\))?\s*:")
        .expect("speaker label pattern is valid")
});

/// Whole label naming a role, optionally numbered (`Host 2`)
static ROLE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:host|guest|interviewer)(?:\s*\d+)?$").expect("role label pattern is valid")
});

/// Leading `Name:` label; captures the whole label and an optional parenthesised name
static LEADING_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z][A-Za-z0-9 _\-]{0,40}?)\s*(?:\(([^)]+)\))?\s*:")
        .expect("leading label pattern is valid")
});

/// Remove speaker labels before sending text to the speech endpoint
pub fn strip_speaker_labels(text: &str) -> String {
    let stripped = SPEAKER_LABEL.replace_all(text, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Speaker named by a label at the start of `line`
///
/// `Host 2 (Sam): ...` yields `Sam`; `Guest: ...` yields `Guest`. Other
/// `Name:` prefixes only count when they match a roster host, and a
/// parenthesised part is only read after a role label.
pub fn detect_speaker(line: &str, config: &VoiceConfiguration) -> Option<String> {
    let caps = LEADING_LABEL.captures(line)?;
    let label = caps.get(1)?.as_str().trim();
    if ROLE_LABEL.is_match(label) {
        let named = caps
            .get(2)
            .map(|name| name.as_str().trim())
            .filter(|name| !name.is_empty());
        return Some(named.unwrap_or(label).to_string());
    }
    config
        .hosts
        .find_by_name(label)
        .map(|h| h.display_name.clone())
}

// ============================================================================
// SCRIPT SEGMENTATION
// ============================================================================

/// Markers that attribute a line to the secondary voice
const GUEST_MARKERS: [&str; 2] = ["guest:", "interviewer:"];

/// Splits a script into ordered segments with voices assigned
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptSegmenter;

impl ScriptSegmenter {
    pub fn new() -> Self {
        Self
    }

    /// Parse a script into segments
    ///
    /// Blank lines are dropped. Lines starting with `[` or `(` are stage
    /// directions and never produce a segment, but they still count as a
    /// position for ids and the alternation fallback.
    pub fn segment(
        &self,
        script: &str,
        config: &VoiceConfiguration,
        style: HostStyle,
    ) -> Vec<Segment> {
        script
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .enumerate()
            .filter(|(_, line)| !is_stage_direction(line))
            .map(|(position, line)| {
                let voice = match style {
                    HostStyle::Multiple if is_guest_line(line, position) => {
                        config.secondary_voice()
                    }
                    _ => config.host_voice.as_str(),
                };
                let mut segment = Segment::new(format!("segment-{}", position), line, voice);
                segment.host_name = detect_speaker(line, config);
                segment
            })
            .collect()
    }

    /// Rough speaking time at ~150 words per minute
    pub fn estimate_duration(text: &str) -> f64 {
        let word_count = text.split_whitespace().count() as f64;
        let words_per_second = 150.0 / 60.0;
        word_count / words_per_second
    }
}

fn is_stage_direction(line: &str) -> bool {
    line.starts_with('[') || line.starts_with('(')
}

/// Explicit guest marker, or every 4th line starting at the 3rd
fn is_guest_line(line: &str, position: usize) -> bool {
    let lower = line.to_lowercase();
    GUEST_MARKERS.iter().any(|m| lower.contains(m)) || position % 4 == 2
}

// ============================================================================
// TESTS
// ============================================================================
