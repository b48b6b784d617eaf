//! Background music overlay
//!
//! Keeps a looping background track aligned with the merged speech track while
//! it plays. Nothing here touches exported files; the overlay only exists at
//! playback time.

use std::path::Path;

use crate::config::CastConfig;
use crate::error::BackgroundFileError;
use crate::voices::VoiceConfiguration;

/// Largest accepted background upload
pub const MAX_BACKGROUND_BYTES: u64 = 50 * 1024 * 1024;

/// Accepted background MIME types
pub const BACKGROUND_MIME_TYPES: [&str; 4] = ["audio/mp3", "audio/mpeg", "audio/wav", "audio/x-wav"];

/// Default resync threshold in seconds
pub const DEFAULT_DRIFT_THRESHOLD: f64 = 0.5;

/// Check an uploaded background file before it is attached
pub fn validate_background_file(mime_type: &str, size: u64) -> Result<(), BackgroundFileError> {
    if !BACKGROUND_MIME_TYPES.contains(&mime_type) {
        return Err(BackgroundFileError::UnsupportedType(mime_type.to_string()));
    }
    if size > MAX_BACKGROUND_BYTES {
        return Err(BackgroundFileError::TooLarge { size });
    }
    Ok(())
}

/// MIME type implied by a file extension, for files picked from disk
pub fn mime_type_for_path(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "mp3" => Some("audio/mpeg"),
        "wav" => Some("audio/wav"),
        _ => None,
    }
}

/// Player element for the background source, implemented by the host player
pub trait BackgroundTrack: Send {
    fn set_looping(&mut self, looping: bool);
    fn play(&mut self);
    fn pause(&mut self);
    /// Current position in seconds
    fn position(&self) -> f64;
    fn set_position(&mut self, seconds: f64);
    /// Linear gain, 0.0 - 1.0
    fn set_volume(&mut self, volume: f32);
    /// Source length in seconds, once known
    fn duration(&self) -> Option<f64>;
}

/// Playback notifications from the primary (merged) track
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrimaryEvent {
    Play { position: f64 },
    Seek { position: f64 },
    TimeUpdate { position: f64 },
    Pause,
    Ended,
}

/// Follows the primary track and steers the background track
pub struct BackgroundMixer<T: BackgroundTrack> {
    track: T,
    volume: u8,
    drift_threshold: f64,
    playing: bool,
}

impl<T: BackgroundTrack> BackgroundMixer<T> {
    /// Attach a track; it is set to loop and to `volume` (0 - 100)
    pub fn new(mut track: T, volume: u8) -> Self {
        let volume = volume.min(100);
        track.set_looping(true);
        track.set_volume(Self::gain(volume));
        Self {
            track,
            volume,
            drift_threshold: DEFAULT_DRIFT_THRESHOLD,
            playing: false,
        }
    }

    /// Attach a track with the script's background volume and the configured drift threshold
    pub fn from_config(track: T, voices: &VoiceConfiguration, config: &CastConfig) -> Self {
        Self::new(track, voices.background_volume())
            .with_drift_threshold(config.drift_threshold_secs)
    }

    pub fn with_drift_threshold(mut self, seconds: f64) -> Self {
        if seconds.is_finite() && seconds >= 0.0 {
            self.drift_threshold = seconds;
        }
        self
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Change background volume only; the primary track is not affected
    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(100);
        self.track.set_volume(Self::gain(self.volume));
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn track(&self) -> &T {
        &self.track
    }

    /// Detach and return the background track
    pub fn into_track(self) -> T {
        self.track
    }

    pub fn handle(&mut self, event: PrimaryEvent) {
        match event {
            PrimaryEvent::Play { position } => {
                self.track.set_position(self.target_position(position));
                self.track.play();
                self.playing = true;
            }
            PrimaryEvent::Seek { position } => {
                self.track.set_position(self.target_position(position));
            }
            PrimaryEvent::TimeUpdate { position } => {
                if self.playing {
                    self.resync(position);
                }
            }
            PrimaryEvent::Pause | PrimaryEvent::Ended => {
                self.track.pause();
                self.playing = false;
            }
        }
    }

    /// Reposition the background if it drifted past the threshold
    fn resync(&mut self, primary_position: f64) -> bool {
        let target = self.target_position(primary_position);
        let drift = (self.track.position() - target).abs();
        if drift > self.drift_threshold {
            ::log::debug!("Background drift {:.2}s, resyncing to {:.2}s", drift, target);
            self.track.set_position(target);
            return true;
        }
        false
    }

    /// Primary position mapped into the looping background
    fn target_position(&self, primary_position: f64) -> f64 {
        let position = if primary_position.is_finite() {
            primary_position.max(0.0)
        } else {
            0.0
        };
        match self.track.duration() {
            Some(length) if length.is_finite() && length > 0.0 => position % length,
            _ => position,
        }
    }

    fn gain(volume: u8) -> f32 {
        f32::from(volume) / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct FakeTrack {
        looping: bool,
        playing: bool,
        position: f64,
        volume: f32,
        duration: Option<f64>,
        seeks: usize,
    }

    impl BackgroundTrack for FakeTrack {
        fn set_looping(&mut self, looping: bool) {
            self.looping = looping;
        }
        fn play(&mut self) {
            self.playing = true;
        }
        fn pause(&mut self) {
            self.playing = false;
        }
        fn position(&self) -> f64 {
            self.position
        }
        fn set_position(&mut self, seconds: f64) {
            self.position = seconds;
            self.seeks += 1;
        }
        fn set_volume(&mut self, volume: f32) {
            self.volume = volume;
        }
        fn duration(&self) -> Option<f64> {
            self.duration
        }
    }

    #[test]
    fn test_attach_loops_and_sets_volume() {
        let mixer = BackgroundMixer::new(FakeTrack::default(), 30);
        assert!(mixer.track().looping);
        assert!((mixer.track().volume - 0.3).abs() < 1e-6);
        assert!(!mixer.is_playing());
    }

    #[test]
    fn test_play_starts_at_primary_position() {
        let mut mixer = BackgroundMixer::new(FakeTrack::default(), 50);
        mixer.handle(PrimaryEvent::Play { position: 12.0 });
        assert!(mixer.track().playing);
        assert_eq!(mixer.track().position, 12.0);
    }

    #[test]
    fn test_seek_repositions() {
        let mut mixer = BackgroundMixer::new(FakeTrack::default(), 50);
        mixer.handle(PrimaryEvent::Seek { position: 42.5 });
        assert_eq!(mixer.track().position, 42.5);
    }

    #[test]
    fn test_time_update_resyncs_only_past_threshold() {
        let mut mixer = BackgroundMixer::new(FakeTrack::default(), 50);
        mixer.handle(PrimaryEvent::Play { position: 10.0 });
        let seeks = mixer.track().seeks;

        mixer.handle(PrimaryEvent::TimeUpdate { position: 10.4 });
        assert_eq!(mixer.track().seeks, seeks);
        assert_eq!(mixer.track().position, 10.0);

        mixer.handle(PrimaryEvent::TimeUpdate { position: 10.8 });
        assert_eq!(mixer.track().seeks, seeks + 1);
        assert_eq!(mixer.track().position, 10.8);
    }

    #[test]
    fn test_time_update_ignored_while_paused() {
        let mut mixer = BackgroundMixer::new(FakeTrack::default(), 50);
        mixer.handle(PrimaryEvent::TimeUpdate { position: 30.0 });
        assert_eq!(mixer.track().seeks, 0);
    }

    #[test]
    fn test_pause_and_end_stop_background() {
        let mut mixer = BackgroundMixer::new(FakeTrack::default(), 50);
        mixer.handle(PrimaryEvent::Play { position: 0.0 });
        mixer.handle(PrimaryEvent::Pause);
        assert!(!mixer.track().playing);

        mixer.handle(PrimaryEvent::Play { position: 5.0 });
        mixer.handle(PrimaryEvent::Ended);
        assert!(!mixer.track().playing);
        assert!(!mixer.is_playing());
    }

    #[test]
    fn test_position_wraps_around_loop() {
        let track = FakeTrack {
            duration: Some(60.0),
            ..Default::default()
        };
        let mut mixer = BackgroundMixer::new(track, 50);
        mixer.handle(PrimaryEvent::Play { position: 135.0 });
        assert_eq!(mixer.track().position, 15.0);
    }

    #[test]
    fn test_volume_is_independent_and_clamped() {
        let mut mixer = BackgroundMixer::new(FakeTrack::default(), 30);
        mixer.set_volume(250);
        assert_eq!(mixer.volume(), 100);
        assert_eq!(mixer.into_track().volume, 1.0);
    }

    #[test]
    fn test_from_config_applies_volume_and_threshold() {
        let mut voices = VoiceConfiguration::new("alloy");
        voices.set_background_volume(60);
        let config = CastConfig {
            drift_threshold_secs: 2.0,
            ..Default::default()
        };

        let mut mixer = BackgroundMixer::from_config(FakeTrack::default(), &voices, &config);
        assert_eq!(mixer.volume(), 60);
        assert!((mixer.track().volume - 0.6).abs() < 1e-6);

        mixer.handle(PrimaryEvent::Play { position: 10.0 });
        let seeks = mixer.track().seeks;
        mixer.handle(PrimaryEvent::TimeUpdate { position: 11.5 });
        assert_eq!(mixer.track().seeks, seeks);
        mixer.handle(PrimaryEvent::TimeUpdate { position: 12.5 });
        assert_eq!(mixer.track().seeks, seeks + 1);
    }

    #[test]
    fn test_mime_type_for_path() {
        assert_eq!(mime_type_for_path(Path::new("bed.MP3")), Some("audio/mpeg"));
        assert_eq!(mime_type_for_path(Path::new("dir/bed.wav")), Some("audio/wav"));
        assert_eq!(mime_type_for_path(Path::new("bed.ogg")), None);
        assert_eq!(mime_type_for_path(Path::new("bed")), None);
    }

    #[test]
    fn test_validate_background_file() {
        assert!(validate_background_file("audio/mpeg", 1024).is_ok());
        assert!(validate_background_file("audio/x-wav", MAX_BACKGROUND_BYTES).is_ok());
        assert_eq!(
            validate_background_file("audio/ogg", 10),
            Err(BackgroundFileError::UnsupportedType("audio/ogg".into()))
        );
        assert_eq!(
            validate_background_file("audio/wav", MAX_BACKGROUND_BYTES + 1),
            Err(BackgroundFileError::TooLarge {
                size: MAX_BACKGROUND_BYTES + 1
            })
        );
    }
}
