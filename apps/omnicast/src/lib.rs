//! Omnicast - Turn podcast scripts into multi-voice audio
//!
//! This crate provides:
//! - Script segmentation with per-line voice assignment
//! - Paced, sequential remote speech synthesis with per-segment retry
//! - Merging segment clips into one WAV track
//! - A looping background-music overlay synchronised to playback
//! - Export of segments, merged tracks and scripts
//! - Remote script generation from a topic

pub mod audio_codec;
pub mod audio_mixer;
pub mod background_mixer;
pub mod config;
pub mod error;
pub mod export;
pub mod playback;
pub mod script_generation;
pub mod segment;
pub mod speech_client;
pub mod tts_batch;
pub mod voices;

// Re-export segment types
pub use segment::{
    detect_speaker, strip_speaker_labels, GeneratedAudio, GenerationState, ScriptSegmenter,
    Segment,
};

// Re-export voice types
pub use voices::{
    find_voice, Host, HostRoster, HostStyle, Voice, VoiceConfiguration, AVAILABLE_VOICES,
};

// Re-export synthesis types
pub use speech_client::{
    HttpSpeechTransport, SpeechClient, SpeechRequest, SpeechTransport, SynthesizedClip,
    Synthesizer, ToneSynthesizer,
};

// Re-export batch types
pub use tts_batch::{
    BatchReport, BatchSynthesizer, CastSession, Progress, SessionCommand, SessionEvent,
    SessionState,
};

// Re-export audio types
pub use audio_codec::{AudioCodec, ClipFormat, DecodedAudio, SymphoniaCodec};
pub use audio_mixer::{AudioMixer, MergedTrack};
pub use background_mixer::{BackgroundMixer, BackgroundTrack, PrimaryEvent};
pub use playback::{format_time, HandleRegistry, PlayableHandle};

pub use config::{CastConfig, CredentialStore};
pub use export::Exporter;
pub use script_generation::{
    GeneratedScript, GenerationOptions, PollinationsScriptClient, ScriptGenerator,
};

pub use error::{
    BackgroundFileError, CodecError, ConfigError, ExportError, MixerError, RosterError,
    ScriptError, SessionError, SynthesisError,
};
