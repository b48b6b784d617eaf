//! Voice catalog, host roster and per-script voice configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::background_mixer::validate_background_file;
use crate::error::{BackgroundFileError, RosterError};

// ============================================================================
// VOICE CATALOG
// ============================================================================

/// A synthesis voice offered by the speech endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Voice {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

/// Every voice the speech endpoint accepts
pub static AVAILABLE_VOICES: [Voice; 13] = [
    Voice { id: "alloy", name: "Alloy", description: "Professional Male" },
    Voice { id: "echo", name: "Echo", description: "Energetic Female" },
    Voice { id: "fable", name: "Fable", description: "Calm Male" },
    Voice { id: "nova", name: "Nova", description: "Friendly Female" },
    Voice { id: "onyx", name: "Onyx", description: "Deep Male" },
    Voice { id: "shimmer", name: "Shimmer", description: "Warm Female" },
    Voice { id: "coral", name: "Coral", description: "Vibrant Female" },
    Voice { id: "verse", name: "Verse", description: "Narrative Male" },
    Voice { id: "ballad", name: "Ballad", description: "Musical Female" },
    Voice { id: "ash", name: "Ash", description: "Smooth Male" },
    Voice { id: "sage", name: "Sage", description: "Wise Female" },
    Voice { id: "amuch", name: "Amuch", description: "Dynamic Male" },
    Voice { id: "dan", name: "Dan", description: "Clear Male" },
];

/// Sample line used to audition a voice
pub const PREVIEW_TEXT: &str =
    "Hi there! This is how I sound. I'm ready to narrate your podcast.";

/// Look up a catalog voice by id
pub fn find_voice(id: &str) -> Option<&'static Voice> {
    AVAILABLE_VOICES.iter().find(|v| v.id == id)
}

/// Check that a voice id belongs to the catalog
pub fn is_known_voice(id: &str) -> bool {
    find_voice(id).is_some()
}

// ============================================================================
// HOST STYLE
// ============================================================================

/// Whether a script is voiced by one host or several
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostStyle {
    #[default]
    Single,
    Multiple,
}

impl std::str::FromStr for HostStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(HostStyle::Single),
            "multiple" | "multi" => Ok(HostStyle::Multiple),
            other => Err(format!("unknown host style: {}", other)),
        }
    }
}

// ============================================================================
// HOST ROSTER
// ============================================================================

/// Minimum number of hosts in a roster
pub const MIN_HOSTS: usize = 1;
/// Maximum number of hosts in a roster
pub const MAX_HOSTS: usize = 10;

/// A named speaker role with its synthesis voice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: String,
    pub display_name: String,
    pub voice_id: String,
}

impl Host {
    /// Default host for 1-based position `n`
    fn default_at(n: usize) -> Self {
        Self {
            id: format!("host-{}", n),
            display_name: default_host_name(n),
            voice_id: AVAILABLE_VOICES[(n - 1) % AVAILABLE_VOICES.len()].id.to_string(),
        }
    }
}

fn default_host_name(n: usize) -> String {
    format!("Host {}", n)
}

/// Returns true when `name` is an auto-generated "Host N" label
fn is_default_host_name(name: &str) -> bool {
    name.strip_prefix("Host ")
        .map(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

/// Ordered list of hosts (1 to 10)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRoster {
    hosts: Vec<Host>,
}

impl HostRoster {
    /// Build a roster of `count` default hosts
    pub fn with_count(count: usize) -> Result<Self, RosterError> {
        check_size(count)?;
        Ok(Self {
            hosts: (1..=count).map(Host::default_at).collect(),
        })
    }

    /// Grow or shrink to `count` hosts, keeping existing hosts untouched
    pub fn resize(&mut self, count: usize) -> Result<(), RosterError> {
        check_size(count)?;
        if count < self.hosts.len() {
            self.hosts.truncate(count);
        } else {
            while self.hosts.len() < count {
                let next = self.next_host();
                self.hosts.push(next);
            }
        }
        Ok(())
    }

    /// Append one default host
    pub fn add_host(&mut self) -> Result<&Host, RosterError> {
        check_size(self.hosts.len() + 1)?;
        let host = self.next_host();
        self.hosts.push(host);
        Ok(&self.hosts[self.hosts.len() - 1])
    }

    /// Remove the host at `index`; default-named hosts after it are renumbered
    pub fn remove_host(&mut self, index: usize) -> Result<Host, RosterError> {
        if index >= self.hosts.len() {
            return Err(RosterError::UnknownHost(index));
        }
        check_size(self.hosts.len() - 1)?;

        let removed = self.hosts.remove(index);
        for (i, host) in self.hosts.iter_mut().enumerate().skip(index) {
            if is_default_host_name(&host.display_name) {
                host.display_name = default_host_name(i + 1);
            }
        }
        Ok(removed)
    }

    /// Set an explicit display name
    pub fn rename(&mut self, index: usize, name: impl Into<String>) -> Result<(), RosterError> {
        let host = self
            .hosts
            .get_mut(index)
            .ok_or(RosterError::UnknownHost(index))?;
        host.display_name = name.into();
        Ok(())
    }

    /// Assign a catalog voice
    pub fn set_voice(&mut self, index: usize, voice_id: &str) -> Result<(), RosterError> {
        if !is_known_voice(voice_id) {
            return Err(RosterError::UnknownVoice(voice_id.to_string()));
        }
        let host = self
            .hosts
            .get_mut(index)
            .ok_or(RosterError::UnknownHost(index))?;
        host.voice_id = voice_id.to_string();
        Ok(())
    }

    /// Case-insensitive lookup by display name
    pub fn find_by_name(&self, name: &str) -> Option<&Host> {
        self.hosts
            .iter()
            .find(|h| h.display_name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Next default host, with an id that does not collide with existing ones
    fn next_host(&self) -> Host {
        let position = self.hosts.len() + 1;
        let mut host = Host::default_at(position);
        let mut suffix = position;
        while self.hosts.iter().any(|h| h.id == host.id) {
            suffix += 1;
            host.id = format!("host-{}", suffix);
        }
        host
    }
}

impl Default for HostRoster {
    fn default() -> Self {
        Self {
            hosts: vec![Host::default_at(1)],
        }
    }
}

fn check_size(count: usize) -> Result<(), RosterError> {
    if (MIN_HOSTS..=MAX_HOSTS).contains(&count) {
        Ok(())
    } else {
        Err(RosterError::InvalidSize {
            requested: count,
            min: MIN_HOSTS,
            max: MAX_HOSTS,
        })
    }
}

// ============================================================================
// VOICE CONFIGURATION
// ============================================================================

/// Per-script synthesis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceConfiguration {
    /// Default voice
    pub host_voice: String,
    /// Secondary voice for guest lines
    pub guest_voice: Option<String>,
    /// Speech rate multiplier (0.5 - 2.0)
    speed: f32,
    pub hosts: HostRoster,
    pub background_music: bool,
    /// Background track volume (0 - 100)
    background_volume: u8,
    /// Background audio file, set through [`VoiceConfiguration::attach_background`]
    background_source: Option<PathBuf>,
}

impl VoiceConfiguration {
    pub fn new(host_voice: impl Into<String>) -> Self {
        Self {
            host_voice: host_voice.into(),
            guest_voice: None,
            speed: 1.0,
            hosts: HostRoster::default(),
            background_music: false,
            background_volume: 30,
            background_source: None,
        }
    }

    pub fn with_guest(mut self, guest_voice: impl Into<String>) -> Self {
        self.guest_voice = Some(guest_voice.into());
        self
    }

    /// Set speed (clamped to 0.5 - 2.0)
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.set_speed(speed);
        self
    }

    pub fn with_hosts(mut self, hosts: HostRoster) -> Self {
        self.hosts = hosts;
        self
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.speed = if speed.is_finite() {
            speed.clamp(0.5, 2.0)
        } else {
            1.0
        };
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn set_background_volume(&mut self, volume: u8) {
        self.background_volume = volume.min(100);
    }

    pub fn background_volume(&self) -> u8 {
        self.background_volume
    }

    /// Validate and attach a background file; turns background music on
    pub fn attach_background(
        &mut self,
        path: impl Into<PathBuf>,
        mime_type: &str,
        size: u64,
    ) -> Result<(), BackgroundFileError> {
        validate_background_file(mime_type, size)?;
        self.background_source = Some(path.into());
        self.background_music = true;
        Ok(())
    }

    pub fn detach_background(&mut self) {
        self.background_source = None;
        self.background_music = false;
    }

    pub fn background_source(&self) -> Option<&Path> {
        self.background_source.as_deref()
    }

    /// Voice used for guest lines; falls back to the default voice
    pub fn secondary_voice(&self) -> &str {
        self.guest_voice.as_deref().unwrap_or(&self.host_voice)
    }
}

impl Default for VoiceConfiguration {
    fn default() -> Self {
        Self::new(AVAILABLE_VOICES[0].id)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lookup() {
        assert_eq!(find_voice("nova").map(|v| v.name), Some("Nova"));
        assert!(is_known_voice("dan"));
        assert!(!is_known_voice("robot"));
    }

    #[test]
    fn test_default_roster_assigns_catalog_voices() {
        let roster = HostRoster::with_count(3).unwrap();
        let names: Vec<_> = roster.hosts().iter().map(|h| h.display_name.as_str()).collect();
        assert_eq!(names, ["Host 1", "Host 2", "Host 3"]);
        assert_eq!(roster.hosts()[1].voice_id, "echo");
        assert_eq!(roster.hosts()[2].id, "host-3");
    }

    #[test]
    fn test_roster_bounds() {
        assert!(HostRoster::with_count(0).is_err());
        assert!(HostRoster::with_count(11).is_err());

        let mut roster = HostRoster::with_count(10).unwrap();
        assert!(roster.add_host().is_err());

        let mut single = HostRoster::default();
        assert_eq!(
            single.remove_host(0),
            Err(RosterError::InvalidSize { requested: 0, min: 1, max: 10 })
        );
        assert!(roster.resize(4).is_ok());
        assert_eq!(roster.len(), 4);
    }

    #[test]
    fn test_resize_keeps_existing_hosts() {
        let mut roster = HostRoster::with_count(2).unwrap();
        roster.rename(0, "Alice").unwrap();
        roster.set_voice(0, "sage").unwrap();

        roster.resize(4).unwrap();
        assert_eq!(roster.hosts()[0].display_name, "Alice");
        assert_eq!(roster.hosts()[0].voice_id, "sage");
        assert_eq!(roster.hosts()[3].display_name, "Host 4");
    }

    #[test]
    fn test_remove_renumbers_default_names_only() {
        let mut roster = HostRoster::with_count(4).unwrap();
        roster.rename(2, "Carol").unwrap();

        let removed = roster.remove_host(0).unwrap();
        assert_eq!(removed.id, "host-1");

        let hosts = roster.hosts();
        assert_eq!(hosts[0].display_name, "Host 1");
        assert_eq!(hosts[0].id, "host-2");
        assert_eq!(hosts[1].display_name, "Carol");
        assert_eq!(hosts[1].id, "host-3");
        assert_eq!(hosts[2].display_name, "Host 3");
        assert_eq!(hosts[2].id, "host-4");
    }

    #[test]
    fn test_added_host_ids_stay_unique() {
        let mut roster = HostRoster::with_count(3).unwrap();
        roster.remove_host(0).unwrap();
        let added = roster.add_host().unwrap().clone();
        assert_eq!(added.display_name, "Host 3");
        assert!(roster.hosts().iter().filter(|h| h.id == added.id).count() == 1);
    }

    #[test]
    fn test_unknown_voice_rejected() {
        let mut roster = HostRoster::default();
        assert_eq!(
            roster.set_voice(0, "robot"),
            Err(RosterError::UnknownVoice("robot".into()))
        );
    }

    #[test]
    fn test_voice_configuration_clamps() {
        let mut config = VoiceConfiguration::new("alloy").with_speed(3.5);
        assert_eq!(config.speed(), 2.0);
        config.set_speed(f32::NAN);
        assert_eq!(config.speed(), 1.0);
        config.set_background_volume(250);
        assert_eq!(config.background_volume(), 100);
    }

    #[test]
    fn test_attach_background_validates() {
        let mut config = VoiceConfiguration::new("alloy");
        assert_eq!(
            config.attach_background("theme.ogg", "audio/ogg", 1024),
            Err(BackgroundFileError::UnsupportedType("audio/ogg".into()))
        );
        assert!(config.background_source().is_none());
        assert!(!config.background_music);

        config.attach_background("theme.mp3", "audio/mpeg", 1024).unwrap();
        assert_eq!(config.background_source(), Some(Path::new("theme.mp3")));
        assert!(config.background_music);

        config.detach_background();
        assert!(config.background_source().is_none());
        assert!(!config.background_music);
    }

    #[test]
    fn test_secondary_voice_falls_back_to_host() {
        let config = VoiceConfiguration::new("onyx");
        assert_eq!(config.secondary_voice(), "onyx");
        let config = config.with_guest("nova");
        assert_eq!(config.secondary_voice(), "nova");
    }

    #[test]
    fn test_host_style_parsing() {
        assert_eq!("Multiple".parse::<HostStyle>(), Ok(HostStyle::Multiple));
        assert_eq!("single".parse::<HostStyle>(), Ok(HostStyle::Single));
        assert!("duo".parse::<HostStyle>().is_err());
    }
}
