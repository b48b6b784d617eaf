//! Audio merging - combine segment clips into one podcast track
//!
//! This module provides:
//! - Decoding every clip into per-channel sample buffers
//! - Back-to-back concatenation in script order (no gaps, no crossfade)
//! - Re-encoding as 16-bit PCM WAV
//!
//! A single clip is passed through untouched. Clips are never resampled: the
//! first clip's sample rate and channel count are used for the whole track.

use bytes::Bytes;
use std::sync::Arc;

use crate::audio_codec::{AudioCodec, ClipFormat, DecodedAudio, WavHeader};
use crate::error::MixerError;
use crate::segment::Segment;

// ============================================================================
// DATA MODELS
// ============================================================================

/// One merged track
#[derive(Debug, Clone, PartialEq)]
pub struct MergedTrack {
    /// Encoded bytes (WAV unless a single clip was passed through)
    pub bytes: Bytes,
    pub format: ClipFormat,
    /// Total duration in seconds, when known
    pub duration_seconds: Option<f64>,
    /// Number of segments merged
    pub segment_count: usize,
    /// Time spent merging, in milliseconds
    pub elapsed_ms: u64,
}

// ============================================================================
// AUDIO MIXER
// ============================================================================

/// Merges encoded clips through an [`AudioCodec`]
#[derive(Clone)]
pub struct AudioMixer {
    codec: Arc<dyn AudioCodec>,
}

impl AudioMixer {
    pub fn new(codec: Arc<dyn AudioCodec>) -> Self {
        Self { codec }
    }

    /// Merge every segment that holds audio, in list order
    ///
    /// Segments without audio are skipped.
    pub async fn merge_segments(&self, segments: &[Segment]) -> Result<MergedTrack, MixerError> {
        let ready: Vec<&Segment> = segments.iter().filter(|s| s.has_audio()).collect();
        if ready.len() < segments.len() {
            ::log::info!(
                "Merging {} of {} segments (others have no audio)",
                ready.len(),
                segments.len()
            );
        }

        let clips: Vec<(String, Bytes)> = ready
            .iter()
            .filter_map(|s| s.audio_clip().map(|clip| (s.id.clone(), clip.clone())))
            .collect();
        let mut track = self.merge_clips(clips).await?;

        if track.segment_count == 1 && track.duration_seconds.is_none() {
            track.duration_seconds = ready.first().and_then(|s| s.duration_seconds());
        }
        Ok(track)
    }

    /// Merge `(segment id, clip)` pairs in order
    pub async fn merge_clips(&self, clips: Vec<(String, Bytes)>) -> Result<MergedTrack, MixerError> {
        let start_time = std::time::Instant::now();

        if clips.is_empty() {
            return Err(MixerError::NoAudio);
        }

        if clips.len() == 1 {
            let (id, bytes) = clips.into_iter().next().ok_or(MixerError::NoAudio)?;
            ::log::info!("Single segment {}: returning clip unchanged", id);
            let format = ClipFormat::sniff(&bytes);
            let duration_seconds = match format {
                ClipFormat::Wav => WavHeader::from_bytes(&bytes)
                    .ok()
                    .and_then(|header| header.duration_seconds()),
                ClipFormat::Mp3 => None,
            };
            return Ok(MergedTrack {
                format,
                bytes,
                duration_seconds,
                segment_count: 1,
                elapsed_ms: start_time.elapsed().as_millis() as u64,
            });
        }

        let segment_count = clips.len();
        ::log::info!("Merging {} audio segments", segment_count);

        // Decode one clip at a time, in order
        let mut decoded = Vec::with_capacity(segment_count);
        for (id, bytes) in clips {
            let codec = Arc::clone(&self.codec);
            let audio = tokio::task::spawn_blocking(move || codec.decode(&bytes))
                .await
                .map_err(|e| MixerError::MergeDecode {
                    segment: id.clone(),
                    reason: e.to_string(),
                })?
                .map_err(|e| {
                    ::log::error!("Failed to decode segment {}: {}", id, e);
                    MixerError::MergeDecode {
                        segment: id.clone(),
                        reason: e.to_string(),
                    }
                })?;

            if let Some(first) = decoded.first() {
                Self::check_layout(first, &audio, &id);
            }
            ::log::debug!(
                "Decoded {}: {} Hz, {} ch, {} frames",
                id,
                audio.sample_rate,
                audio.channel_count(),
                audio.frames()
            );
            decoded.push(audio);
        }

        let merged = concatenate(&decoded);
        let duration_seconds = merged.duration_seconds();

        let codec = Arc::clone(&self.codec);
        let wav = tokio::task::spawn_blocking(move || codec.encode_pcm16_wav(&merged))
            .await
            .map_err(|e| MixerError::Encode(e.to_string()))?
            .map_err(|e| MixerError::Encode(e.to_string()))?;

        ::log::info!(
            "Merged audio created: {} bytes, {:.2}s",
            wav.len(),
            duration_seconds
        );

        Ok(MergedTrack {
            bytes: Bytes::from(wav),
            format: ClipFormat::Wav,
            duration_seconds: Some(duration_seconds),
            segment_count,
            elapsed_ms: start_time.elapsed().as_millis() as u64,
        })
    }

    fn check_layout(first: &DecodedAudio, clip: &DecodedAudio, id: &str) {
        if clip.sample_rate != first.sample_rate || clip.channel_count() != first.channel_count() {
            ::log::warn!(
                "Segment {} is {} Hz / {} ch but the track is {} Hz / {} ch; copying samples as-is",
                id,
                clip.sample_rate,
                clip.channel_count(),
                first.sample_rate,
                first.channel_count()
            );
        }
    }
}

/// Concatenate decoded clips back-to-back
///
/// The output takes the first clip's sample rate and channel count. Each
/// clip's channel `n` is copied into output channel `n`; channels a clip
/// lacks stay silent for its span and extra channels are dropped.
pub fn concatenate(clips: &[DecodedAudio]) -> DecodedAudio {
    let Some(first) = clips.first() else {
        return DecodedAudio::silent(0, 0, 0);
    };

    let total_frames: usize = clips.iter().map(DecodedAudio::frames).sum();
    let mut output = DecodedAudio::silent(first.sample_rate, first.channel_count(), total_frames);

    let mut offset = 0;
    for clip in clips {
        let frames = clip.frames();
        for (out, source) in output.channels.iter_mut().zip(&clip.channels) {
            let len = source.len().min(frames);
            out[offset..offset + len].copy_from_slice(&source[..len]);
        }
        offset += frames;
    }

    output
}

// ============================================================================
// TESTS
// ============================================================================
