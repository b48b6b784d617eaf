//! Playable handles for in-memory audio
//!
//! A [`PlayableHandle`] is a URL-like token a player surface can resolve back to
//! clip bytes through the [`HandleRegistry`] that issued it. The entry is
//! released when the last clone of the handle is dropped, so replacing a
//! segment's audio releases the previous handle without an explicit call.

use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

const URL_PREFIX: &str = "blob:omnicast/";

type Entries = Arc<Mutex<HashMap<Uuid, Bytes>>>;

/// Issues and resolves playable handles
#[derive(Clone, Default)]
pub struct HandleRegistry {
    entries: Entries,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `clip` and return a handle that keeps it resolvable
    pub fn acquire(&self, clip: Bytes) -> PlayableHandle {
        let id = Uuid::new_v4();
        self.entries.lock().insert(id, clip);
        ::log::debug!("Acquired playable handle {}{}", URL_PREFIX, id);
        PlayableHandle {
            inner: Arc::new(HandleInner {
                id,
                entries: Arc::clone(&self.entries),
            }),
        }
    }

    /// Resolve a handle URL to its clip, if still live
    pub fn resolve(&self, url: &str) -> Option<Bytes> {
        let id = url.strip_prefix(URL_PREFIX)?.parse::<Uuid>().ok()?;
        self.entries.lock().get(&id).cloned()
    }

    /// Number of handles not yet released
    pub fn live_count(&self) -> usize {
        self.entries.lock().len()
    }
}

impl fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("live", &self.live_count())
            .finish()
    }
}

struct HandleInner {
    id: Uuid,
    entries: Entries,
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        self.entries.lock().remove(&self.id);
        ::log::debug!("Released playable handle {}{}", URL_PREFIX, self.id);
    }
}

/// Transient reference to registered clip bytes
#[derive(Clone)]
pub struct PlayableHandle {
    inner: Arc<HandleInner>,
}

impl PlayableHandle {
    pub fn url(&self) -> String {
        format!("{}{}", URL_PREFIX, self.inner.id)
    }
}

impl PartialEq for PlayableHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl fmt::Debug for PlayableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PlayableHandle").field(&self.url()).finish()
    }
}

/// Format a play position as `m:ss`
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}
