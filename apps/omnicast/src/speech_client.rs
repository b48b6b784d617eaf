//! Speech synthesis client
//!
//! Converts one segment's text into an audio clip:
//! - strips speaker labels, refusing lines with nothing left to say
//! - calls the remote speech endpoint (GET, text in the path, voice and speed as query)
//! - rejects empty bodies
//! - probes the bytes with the codec to read back a duration

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client as HttpClient, Url};
use std::f64::consts::PI;
use std::sync::Arc;
use std::time::Duration;

use crate::audio_codec::{encode_pcm16_wav, AudioCodec, DecodedAudio};
use crate::config::CastConfig;
use crate::error::SynthesisError;
use crate::segment::{strip_speaker_labels, ScriptSegmenter};

// ============================================================================
// DATA MODELS
// ============================================================================

/// One request to the speech endpoint, after label stripping
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: String,
    pub speed: f32,
}

/// A synthesized and probed clip
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedClip {
    pub bytes: Bytes,
    pub duration_seconds: f64,
}

// ============================================================================
// TRAIT DEFINITIONS
// ============================================================================

/// Text to audio, as the batch orchestrator sees it
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        speed: f32,
    ) -> Result<SynthesizedClip, SynthesisError>;

    fn engine_name(&self) -> &str;
}

/// Raw transport to the speech endpoint
#[async_trait]
pub trait SpeechTransport: Send + Sync {
    /// Fetch the response body for a request; non-success statuses are errors
    async fn fetch(&self, request: &SpeechRequest) -> Result<Bytes, SynthesisError>;
}

// ============================================================================
// HTTP TRANSPORT
// ============================================================================

/// GET-style transport against a Pollinations-compatible endpoint
#[derive(Debug, Clone)]
pub struct HttpSpeechTransport {
    base_url: Url,
    model: String,
    client: HttpClient,
}

impl HttpSpeechTransport {
    pub fn new(config: &CastConfig) -> Result<Self, SynthesisError> {
        let base_url = Url::parse(&config.speech_url)
            .map_err(|e| SynthesisError::Transport(format!("invalid speech URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SynthesisError::Transport(format!(
                "invalid speech URL: {}",
                config.speech_url
            )));
        }

        let client = HttpClient::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(SynthesisError::from)?;

        Ok(Self {
            base_url,
            model: config.speech_model.clone(),
            client,
        })
    }

    /// `{base}/{url-encoded text}?model=..&voice=..&speed=..`
    pub fn request_url(&self, request: &SpeechRequest) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&request.text);
        }
        url.query_pairs_mut()
            .append_pair("model", &self.model)
            .append_pair("voice", &request.voice)
            .append_pair("speed", &request.speed.to_string());
        url
    }
}

#[async_trait]
impl SpeechTransport for HttpSpeechTransport {
    async fn fetch(&self, request: &SpeechRequest) -> Result<Bytes, SynthesisError> {
        let url = self.request_url(request);
        ::log::debug!("Speech request: {}", url);

        let response = self
            .client
            .get(url)
            .header("Accept", "audio/*")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            ::log::error!("Speech endpoint returned {}", status);
            return Err(SynthesisError::Transport(format!(
                "HTTP error! status: {}",
                status.as_u16()
            )));
        }

        let body = response.bytes().await?;
        ::log::debug!("Speech response: {} bytes", body.len());
        Ok(body)
    }
}

// ============================================================================
// SPEECH CLIENT
// ============================================================================

/// Transport plus label stripping, empty check and decode probe
#[derive(Clone)]
pub struct SpeechClient<T: SpeechTransport> {
    transport: T,
    codec: Arc<dyn AudioCodec>,
}

impl<T: SpeechTransport> SpeechClient<T> {
    pub fn new(transport: T, codec: Arc<dyn AudioCodec>) -> Self {
        Self { transport, codec }
    }
}

impl SpeechClient<HttpSpeechTransport> {
    /// Client for the configured remote endpoint
    pub fn from_config(
        config: &CastConfig,
        codec: Arc<dyn AudioCodec>,
    ) -> Result<Self, SynthesisError> {
        Ok(Self::new(HttpSpeechTransport::new(config)?, codec))
    }
}

#[async_trait]
impl<T: SpeechTransport> Synthesizer for SpeechClient<T> {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        speed: f32,
    ) -> Result<SynthesizedClip, SynthesisError> {
        let request = SpeechRequest {
            text: strip_speaker_labels(text),
            voice: voice.to_string(),
            speed,
        };
        // Label-only or punctuation-only lines would request the endpoint root
        if !request.text.chars().any(char::is_alphanumeric) {
            return Err(SynthesisError::EmptyText);
        }

        ::log::info!(
            "Synthesizing {} chars with voice '{}' (speed {:.1})",
            request.text.len(),
            request.voice,
            request.speed
        );

        let bytes = self.transport.fetch(&request).await?;
        if bytes.is_empty() {
            return Err(SynthesisError::EmptyAudio);
        }

        let codec = Arc::clone(&self.codec);
        let probe_bytes = bytes.clone();
        let duration_seconds = tokio::task::spawn_blocking(move || codec.probe_duration(&probe_bytes))
            .await
            .map_err(|e| SynthesisError::Decode(format!("probe task failed: {}", e)))?
            .map_err(|e| SynthesisError::Decode(e.to_string()))?;

        ::log::info!(
            "Audio loaded successfully: {} bytes, {:.2}s",
            bytes.len(),
            duration_seconds
        );

        Ok(SynthesizedClip {
            bytes,
            duration_seconds,
        })
    }

    fn engine_name(&self) -> &str {
        "remote-speech"
    }
}

// ============================================================================
// OFFLINE TONE SYNTHESIZER
// ============================================================================

/// Synthesizer that renders a decaying tone instead of speech
///
/// Duration follows the segmenter's words-per-minute estimate, so merged
/// output has realistic proportions without network access.
#[derive(Debug, Clone)]
pub struct ToneSynthesizer {
    sample_rate: u32,
    frequency: f64,
}

impl ToneSynthesizer {
    pub fn new() -> Self {
        Self {
            sample_rate: 24000,
            frequency: 440.0,
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate.max(1);
        self
    }

    fn render(&self, duration_secs: f64) -> DecodedAudio {
        let num_samples = (duration_secs * self.sample_rate as f64) as usize;
        let amplitude = 0.3;
        let samples = (0..num_samples)
            .map(|i| {
                let t = i as f64 / self.sample_rate as f64;
                let decay = 1.0 - (i as f64 / num_samples as f64) * 0.5;
                (amplitude * decay * (2.0 * PI * self.frequency * t).sin()) as f32
            })
            .collect();
        DecodedAudio {
            sample_rate: self.sample_rate,
            channels: vec![samples],
        }
    }
}

impl Default for ToneSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Synthesizer for ToneSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        speed: f32,
    ) -> Result<SynthesizedClip, SynthesisError> {
        let text = strip_speaker_labels(text);
        let speed = if speed > 0.0 { speed as f64 } else { 1.0 };
        let duration_secs = (ScriptSegmenter::estimate_duration(&text) / speed).max(0.5);

        let audio = self.render(duration_secs);
        let wav = encode_pcm16_wav(&audio).map_err(|e| SynthesisError::Decode(e.to_string()))?;

        ::log::debug!(
            "ToneSynthesizer: {} chars, voice '{}' -> {:.2}s",
            text.len(),
            voice,
            audio.duration_seconds()
        );

        Ok(SynthesizedClip {
            bytes: Bytes::from(wav),
            duration_seconds: audio.duration_seconds(),
        })
    }

    fn engine_name(&self) -> &str {
        "offline-tone"
    }
}

// ============================================================================
// TESTS
// ============================================================================
