//! Audio codec capability
//!
//! Decoding compressed clips into per-channel float samples and writing
//! 16-bit PCM WAV containers. The merge engine and the speech client only see
//! the [`AudioCodec`] trait; [`SymphoniaCodec`] is the native implementation.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::CodecError;

// ============================================================================
// DATA MODELS
// ============================================================================

/// Decoded audio: one sample vector per channel, all of equal length
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl DecodedAudio {
    /// Silent buffer with `frames` samples per channel
    pub fn silent(sample_rate: u32, channel_count: usize, frames: usize) -> Self {
        Self {
            sample_rate,
            channels: vec![vec![0.0; frames]; channel_count],
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel
    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Container format of an encoded clip, sniffed from its first bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipFormat {
    Wav,
    Mp3,
}

impl ClipFormat {
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            ClipFormat::Wav
        } else {
            ClipFormat::Mp3
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ClipFormat::Wav => "wav",
            ClipFormat::Mp3 => "mp3",
        }
    }
}

// ============================================================================
// CODEC TRAIT
// ============================================================================

/// Decode and encode primitives used by the pipeline
pub trait AudioCodec: Send + Sync {
    /// Decode a complete encoded clip
    fn decode(&self, bytes: &[u8]) -> Result<DecodedAudio, CodecError>;

    /// Encode as a canonical 44-byte-header PCM16 WAV file
    fn encode_pcm16_wav(&self, audio: &DecodedAudio) -> Result<Vec<u8>, CodecError> {
        encode_pcm16_wav(audio)
    }

    /// Decode and report the playable duration
    fn probe_duration(&self, bytes: &[u8]) -> Result<f64, CodecError> {
        let audio = self.decode(bytes)?;
        if audio.sample_rate == 0 || audio.channel_count() == 0 {
            return Err(CodecError::Unsupported("missing sample rate or channels".into()));
        }
        Ok(audio.duration_seconds())
    }
}

// ============================================================================
// SYMPHONIA DECODER
// ============================================================================

/// Codec backed by symphonia (MP3, AAC, WAV/PCM)
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaCodec;

impl SymphoniaCodec {
    pub fn new() -> Self {
        Self
    }
}

impl AudioCodec for SymphoniaCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedAudio, CodecError> {
        if bytes.is_empty() {
            return Err(CodecError::Unsupported("empty input".into()));
        }

        let cursor = Cursor::new(bytes.to_vec());
        let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

        let mut hint = Hint::new();
        hint.with_extension(ClipFormat::sniff(bytes).extension());

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| CodecError::Unsupported(e.to_string()))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(CodecError::NoTrack)?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| CodecError::Unsupported(e.to_string()))?;

        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
        let mut channels: Vec<Vec<f32>> = track
            .codec_params
            .channels
            .map(|c| vec![Vec::new(); c.count()])
            .unwrap_or_default();

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(CodecError::Decoder(e.to_string())),
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    ::log::warn!("Skipping undecodable packet: {}", e);
                    continue;
                }
                Err(e) => return Err(CodecError::Decoder(e.to_string())),
            };

            let spec = *decoded.spec();
            let channel_count = spec.channels.count();
            if sample_rate == 0 {
                sample_rate = spec.rate;
            }
            if channels.len() != channel_count {
                if channels.iter().any(|c| !c.is_empty()) {
                    return Err(CodecError::Decoder(format!(
                        "channel count changed mid-stream ({} -> {})",
                        channels.len(),
                        channel_count
                    )));
                }
                channels = vec![Vec::new(); channel_count];
            }

            let frames = decoded.frames();
            if frames == 0 {
                continue;
            }
            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_planar_ref(decoded);
            let samples = sample_buf.samples();
            for (ch, out) in channels.iter_mut().enumerate() {
                out.extend_from_slice(&samples[ch * frames..(ch + 1) * frames]);
            }
        }

        if channels.is_empty() || channels[0].is_empty() {
            return Err(CodecError::Decoder("no samples decoded".into()));
        }

        ::log::debug!(
            "Decoded {} bytes -> {} frames x {} ch @ {} Hz",
            bytes.len(),
            channels[0].len(),
            channels.len(),
            sample_rate
        );

        Ok(DecodedAudio {
            sample_rate,
            channels,
        })
    }
}

// ============================================================================
// WAV WRITER
// ============================================================================

/// Canonical 44-byte WAV header for PCM data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavHeader {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Data chunk size in bytes
    pub data_size: u32,
}

impl WavHeader {
    pub const SIZE: usize = 44;

    pub fn pcm16(channels: u16, sample_rate: u32, data_size: u32) -> Self {
        Self {
            channels,
            sample_rate,
            bits_per_sample: 16,
            data_size,
        }
    }

    pub fn block_align(&self) -> u16 {
        self.channels * (self.bits_per_sample / 8)
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(b"RIFF");
        out[4..8].copy_from_slice(&(36 + self.data_size).to_le_bytes());
        out[8..12].copy_from_slice(b"WAVE");
        out[12..16].copy_from_slice(b"fmt ");
        out[16..20].copy_from_slice(&16u32.to_le_bytes());
        out[20..22].copy_from_slice(&1u16.to_le_bytes()); // PCM
        out[22..24].copy_from_slice(&self.channels.to_le_bytes());
        out[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        out[28..32].copy_from_slice(&self.byte_rate().to_le_bytes());
        out[32..34].copy_from_slice(&self.block_align().to_le_bytes());
        out[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());
        out[36..40].copy_from_slice(b"data");
        out[40..44].copy_from_slice(&self.data_size.to_le_bytes());
        out
    }

    /// Parse a canonical header (fmt chunk directly followed by data)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < Self::SIZE {
            return Err(CodecError::InvalidWavHeader("file too short".into()));
        }
        if &bytes[0..4] != b"RIFF" {
            return Err(CodecError::InvalidWavHeader("missing RIFF identifier".into()));
        }
        if &bytes[8..12] != b"WAVE" {
            return Err(CodecError::InvalidWavHeader("missing WAVE identifier".into()));
        }
        if &bytes[12..16] != b"fmt " {
            return Err(CodecError::InvalidWavHeader("missing fmt chunk".into()));
        }
        if &bytes[36..40] != b"data" {
            return Err(CodecError::InvalidWavHeader("missing data chunk".into()));
        }

        let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        let u32_at = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);

        if u16_at(20) != 1 {
            return Err(CodecError::InvalidWavHeader("not PCM".into()));
        }

        Ok(Self {
            channels: u16_at(22),
            sample_rate: u32_at(24),
            bits_per_sample: u16_at(34),
            data_size: u32_at(40),
        })
    }

    /// Playable length implied by the data chunk size
    pub fn duration_seconds(&self) -> Option<f64> {
        let bytes_per_second = u64::from(self.sample_rate)
            * u64::from(self.channels)
            * u64::from(self.bits_per_sample / 8);
        if bytes_per_second == 0 {
            return None;
        }
        Some(f64::from(self.data_size) / bytes_per_second as f64)
    }
}

/// Quantize one float sample to 16-bit PCM, clipping to [-1, 1]
pub fn quantize_sample(sample: f32) -> i16 {
    let s = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Interleave channels and write a PCM16 WAV file
pub fn encode_pcm16_wav(audio: &DecodedAudio) -> Result<Vec<u8>, CodecError> {
    let channel_count = audio.channel_count();
    if channel_count == 0 || channel_count > u16::MAX as usize {
        return Err(CodecError::Unsupported(format!(
            "cannot encode {} channels",
            channel_count
        )));
    }
    let frames = audio.frames();
    let data_len = frames * channel_count * 2;
    let data_size = u32::try_from(data_len)
        .ok()
        .filter(|size| size.checked_add(36).is_some())
        .ok_or_else(|| CodecError::Unsupported("audio too long for a WAV container".into()))?;

    let header = WavHeader::pcm16(channel_count as u16, audio.sample_rate, data_size);
    let mut out = Vec::with_capacity(WavHeader::SIZE + data_len);
    out.extend_from_slice(&header.to_bytes());

    for frame in 0..frames {
        for channel in &audio.channels {
            let sample = channel.get(frame).copied().unwrap_or(0.0);
            out.extend_from_slice(&quantize_sample(sample).to_le_bytes());
        }
    }

    Ok(out)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize) -> Vec<f32> {
        (0..frames).map(|i| (i as f32 / frames as f32) - 0.5).collect()
    }

    #[test]
    fn test_header_layout() {
        let header = WavHeader::pcm16(2, 24000, 1000);
        let bytes = header.to_bytes();

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 1036);
        assert_eq!(&bytes[8..16], b"WAVEfmt ");
        assert_eq!(u32::from_le_bytes(bytes[16..20].try_into().unwrap()), 16);
        assert_eq!(u16::from_le_bytes(bytes[20..22].try_into().unwrap()), 1);
        assert_eq!(u16::from_le_bytes(bytes[22..24].try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(bytes[24..28].try_into().unwrap()), 24000);
        assert_eq!(u32::from_le_bytes(bytes[28..32].try_into().unwrap()), 96000);
        assert_eq!(u16::from_le_bytes(bytes[32..34].try_into().unwrap()), 4);
        assert_eq!(u16::from_le_bytes(bytes[34..36].try_into().unwrap()), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(u32::from_le_bytes(bytes[40..44].try_into().unwrap()), 1000);

        assert_eq!(WavHeader::from_bytes(&bytes).unwrap(), header);
    }

    #[test]
    fn test_header_duration() {
        let wav = encode_pcm16_wav(&DecodedAudio::silent(8000, 2, 4000)).unwrap();
        let header = WavHeader::from_bytes(&wav).unwrap();
        assert_eq!(header.duration_seconds(), Some(0.5));
        assert_eq!(WavHeader::pcm16(0, 8000, 100).duration_seconds(), None);
    }

    #[test]
    fn test_header_parsing_rejects_garbage() {
        assert!(WavHeader::from_bytes(b"RIFF").is_err());
        let mut bytes = WavHeader::pcm16(1, 8000, 0).to_bytes();
        bytes[8..12].copy_from_slice(b"AVI ");
        assert!(WavHeader::from_bytes(&bytes).is_err());
    }

    #[test]
    fn test_quantization_clips_and_scales() {
        assert_eq!(quantize_sample(0.0), 0);
        assert_eq!(quantize_sample(1.0), 32767);
        assert_eq!(quantize_sample(-1.0), -32768);
        assert_eq!(quantize_sample(4.0), 32767);
        assert_eq!(quantize_sample(-4.0), -32768);
        assert_eq!(quantize_sample(-0.5), -16384);
        assert_eq!(quantize_sample(f32::NAN), 0);
    }

    #[test]
    fn test_encode_interleaves_channels() {
        let audio = DecodedAudio {
            sample_rate: 8000,
            channels: vec![vec![0.5, -0.5], vec![-1.0, 1.0]],
        };
        let wav = encode_pcm16_wav(&audio).unwrap();
        assert_eq!(wav.len(), 44 + 8);

        let samples: Vec<i16> = wav[44..]
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(samples, [16383, -32768, -16384, 32767]);
    }

    #[test]
    fn test_symphonia_decodes_written_wav() {
        let audio = DecodedAudio {
            sample_rate: 16000,
            channels: vec![ramp(1600), ramp(1600)],
        };
        let wav = encode_pcm16_wav(&audio).unwrap();

        let decoded = SymphoniaCodec::new().decode(&wav).unwrap();
        assert_eq!(decoded.sample_rate, 16000);
        assert_eq!(decoded.channel_count(), 2);
        assert_eq!(decoded.frames(), 1600);
        assert!((decoded.channels[0][100] - audio.channels[0][100]).abs() < 1e-3);

        let duration = SymphoniaCodec::new().probe_duration(&wav).unwrap();
        assert!((duration - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_symphonia_rejects_garbage() {
        let codec = SymphoniaCodec::new();
        assert!(codec.decode(&[]).is_err());
        assert!(codec.decode(b"definitely not audio at all").is_err());
    }

    #[test]
    fn test_sniff_format() {
        let wav = encode_pcm16_wav(&DecodedAudio::silent(8000, 1, 10)).unwrap();
        assert_eq!(ClipFormat::sniff(&wav), ClipFormat::Wav);
        assert_eq!(ClipFormat::sniff(b"ID3\x04"), ClipFormat::Mp3);
        assert_eq!(ClipFormat::Wav.extension(), "wav");
    }
}
