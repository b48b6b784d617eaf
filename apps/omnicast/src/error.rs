//! Error types for omnicast
//!
//! Per-segment synthesis failures are stored on the segment and never abort a
//! batch. Merge failures abort the merge as a whole. Script generation failures
//! are reported separately from audio errors.

use thiserror::Error;

/// Errors from a single speech synthesis call
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SynthesisError {
    /// Network failure, timeout, or non-success HTTP status
    #[error("transport error: {0}")]
    Transport(String),
    /// Nothing speakable left once speaker labels are removed
    #[error("no speakable text in segment")]
    EmptyText,
    /// Endpoint answered with a zero-byte body
    #[error("empty audio file received")]
    EmptyAudio,
    /// Returned bytes could not be decoded as audio
    #[error("failed to load generated audio: {0}")]
    Decode(String),
}

impl SynthesisError {
    /// All synthesis failures can be retried by regenerating the segment
    pub fn is_retryable(&self) -> bool {
        true
    }
}

impl From<reqwest::Error> for SynthesisError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SynthesisError::Transport(format!("request timed out: {}", e))
        } else {
            SynthesisError::Transport(e.to_string())
        }
    }
}

/// Errors raised by an [`AudioCodec`](crate::audio_codec::AudioCodec)
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CodecError {
    #[error("unsupported or corrupt audio: {0}")]
    Unsupported(String),
    #[error("no audio track found")]
    NoTrack,
    #[error("decoder error: {0}")]
    Decoder(String),
    #[error("invalid WAV header: {0}")]
    InvalidWavHeader(String),
}

/// Errors from merging segment clips into one track
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MixerError {
    /// Nothing to merge
    #[error("no audio segments available to merge")]
    NoAudio,
    /// An accepted clip failed to decode; that segment must be regenerated
    #[error("failed to decode segment {segment}: {reason}")]
    MergeDecode { segment: String, reason: String },
    #[error("failed to encode merged audio: {0}")]
    Encode(String),
}

impl MixerError {
    /// Re-merging the same inputs never helps
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// Errors from the script-generation endpoint
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScriptError {
    #[error("topic must not be empty")]
    EmptyTopic,
    #[error("failed to generate script: {0}")]
    Transport(String),
    #[error("script endpoint returned status {0}")]
    Status(u16),
}

impl From<reqwest::Error> for ScriptError {
    fn from(e: reqwest::Error) -> Self {
        ScriptError::Transport(e.to_string())
    }
}

/// Host roster bounds violations
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RosterError {
    #[error("a roster holds between {min} and {max} hosts, got {requested}")]
    InvalidSize {
        requested: usize,
        min: usize,
        max: usize,
    },
    #[error("no host at position {0}")]
    UnknownHost(usize),
    #[error("unknown voice: {0}")]
    UnknownVoice(String),
}

/// Rejected background music uploads
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BackgroundFileError {
    #[error("please upload an MP3 or WAV file (got {0})")]
    UnsupportedType(String),
    #[error("file size must be less than 50MB ({size} bytes)")]
    TooLarge { size: u64 },
}

/// Errors from writing downloads
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no audio segments available for download")]
    NoAudio,
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from loading or saving configuration and credentials
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot determine config directory")]
    NoConfigDir,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors returned by a [`CastSession`](crate::tts_batch::CastSession) handle
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    #[error("session worker has stopped")]
    Closed,
    #[error("unknown segment: {0}")]
    UnknownSegment(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability() {
        assert!(SynthesisError::EmptyAudio.is_retryable());
        assert!(SynthesisError::Decode("bad".into()).is_retryable());
        assert!(!MixerError::NoAudio.is_retryable());
    }

    #[test]
    fn test_messages_name_the_segment() {
        let err = MixerError::MergeDecode {
            segment: "segment-4".into(),
            reason: "no audio track found".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to decode segment segment-4: no audio track found"
        );
    }
}
