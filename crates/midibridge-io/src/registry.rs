//! Listener registry: remote listener id -> attached handles.
//!
//! Lets a remote caller remove a listener by the id it chose, without ever
//! holding the handle itself.

use dashmap::DashMap;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::debug;

use crate::bus::{EventBus, ListenerHandle};

/// Most entries hold a single handle; fan-out registrations hold several.
pub type Handles = SmallVec<[ListenerHandle; 1]>;

pub struct ListenerRegistry {
    bus: Arc<EventBus>,
    entries: DashMap<String, Handles>,
}

impl ListenerRegistry {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            entries: DashMap::new(),
        }
    }

    /// Stores `handles` under `id`.
    ///
    /// An existing entry for `id` is detached first, so re-registering never
    /// leaks the previous callbacks. Returns how many handles were replaced.
    pub fn register(&self, id: &str, handles: impl IntoIterator<Item = ListenerHandle>) -> usize {
        let handles: Handles = handles.into_iter().collect();
        let replaced = self
            .entries
            .insert(id.to_string(), handles)
            .map_or(0, |previous| self.detach_all(&previous));
        if replaced > 0 {
            debug!("Listener {:?} re-registered, detached {} stale handles", id, replaced);
        }
        replaced
    }

    /// Detaches and forgets `id`. Unknown ids are a no-op returning false.
    pub fn unregister(&self, id: &str) -> bool {
        match self.entries.remove(id) {
            Some((_, handles)) => {
                self.detach_all(&handles);
                debug!("Listener {:?} removed", id);
                true
            }
            None => false,
        }
    }

    /// Detaches and forgets every entry. Returns how many entries existed.
    pub fn clear(&self) -> usize {
        let ids: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        ids.iter().filter(|id| self.unregister(id)).count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn handles(&self, id: &str) -> Option<Handles> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn detach_all(&self, handles: &[ListenerHandle]) -> usize {
        handles.iter().filter(|h| self.bus.detach(h)).count()
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("entries", &self.entries.len())
            .finish()
    }
}
