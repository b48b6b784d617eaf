//! Export - write clips, merged tracks and scripts into the download directory
//!
//! File names embed a millisecond timestamp so repeated exports never collide.

use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio_codec::ClipFormat;
use crate::audio_mixer::MergedTrack;
use crate::error::ExportError;
use crate::segment::Segment;

/// Milliseconds since the Unix epoch
pub fn timestamp_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// `podcast-segment-{n}-{millis}.{ext}`, `n` counted from 1
pub fn segment_file_name(index: usize, clip: &[u8], millis: i64) -> String {
    format!(
        "podcast-segment-{}-{}.{}",
        index + 1,
        millis,
        ClipFormat::sniff(clip).extension()
    )
}

/// `podcast-merged-{millis}.{ext}`
pub fn merged_file_name(track: &MergedTrack, millis: i64) -> String {
    format!("podcast-merged-{}.{}", millis, track.format.extension())
}

/// `podcast-script-{topic}.txt`, topic cut to 30 chars, non-alphanumerics as `-`
pub fn script_file_name(topic: &str) -> String {
    let slug: String = topic
        .chars()
        .take(30)
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    format!("podcast-script-{}.txt", slug)
}

/// Writes downloads into one directory
#[derive(Debug, Clone)]
pub struct Exporter {
    dir: PathBuf,
    stagger: Duration,
}

impl Exporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            stagger: Duration::from_millis(500),
        }
    }

    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` as `file_name` and return the full path
    pub async fn download(&self, bytes: &[u8], file_name: &str) -> Result<PathBuf, ExportError> {
        let path = self.dir.join(file_name);
        let io_error = |source| ExportError::Io {
            path: path.display().to_string(),
            source,
        };

        tokio::fs::create_dir_all(&self.dir).await.map_err(io_error)?;
        tokio::fs::write(&path, bytes).await.map_err(io_error)?;

        ::log::info!("Saved {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    /// Save one segment's clip; `index` is its position in the script
    pub async fn download_segment(
        &self,
        segment: &Segment,
        index: usize,
    ) -> Result<PathBuf, ExportError> {
        let clip: &Bytes = segment.audio_clip().ok_or(ExportError::NoAudio)?;
        let name = segment_file_name(index, clip, timestamp_millis());
        self.download(clip, &name).await
    }

    /// Save every segment that has audio, one at a time with a stagger between writes
    pub async fn download_all(&self, segments: &[Segment]) -> Result<Vec<PathBuf>, ExportError> {
        let clips: Vec<&Bytes> = segments.iter().filter_map(Segment::audio_clip).collect();
        if clips.is_empty() {
            return Err(ExportError::NoAudio);
        }

        ::log::info!("Downloading {} segments", clips.len());
        let mut paths = Vec::with_capacity(clips.len());
        for (index, clip) in clips.into_iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.stagger).await;
            }
            let name = segment_file_name(index, clip, timestamp_millis());
            paths.push(self.download(clip, &name).await?);
        }
        Ok(paths)
    }

    pub async fn download_merged(&self, track: &MergedTrack) -> Result<PathBuf, ExportError> {
        let name = merged_file_name(track, timestamp_millis());
        self.download(&track.bytes, &name).await
    }

    pub async fn download_script(&self, topic: &str, content: &str) -> Result<PathBuf, ExportError> {
        self.download(content.as_bytes(), &script_file_name(topic)).await
    }
}
