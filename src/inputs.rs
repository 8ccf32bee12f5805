//! Input-port views over the published port list.
//!
//! [`Inputs`] reads the interface's current list on every call and never
//! copies it. An [`Input`] is a proxy to one index: it follows the port while
//! the same id sits at that index, and freezes at its last values once the
//! device is unplugged or the list reorders.

use midibridge_io::{PortConnection, PortSnapshot, PortState, Subscription};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

use crate::bridge::{Listener, Shared};
use crate::{Error, Result};

/// Selects an input by position or by id / name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKey {
    Index(usize),
    /// Matches the first input whose id or name equals the string.
    IdOrName(String),
}

impl From<usize> for InputKey {
    fn from(index: usize) -> Self {
        InputKey::Index(index)
    }
}

impl From<&str> for InputKey {
    fn from(key: &str) -> Self {
        InputKey::IdOrName(key.to_string())
    }
}

impl From<String> for InputKey {
    fn from(key: String) -> Self {
        InputKey::IdOrName(key)
    }
}

pub struct Inputs {
    shared: Arc<Shared>,
}

impl Inputs {
    pub(crate) fn new(shared: Arc<Shared>) -> Result<Self> {
        if !shared.manager.is_enabled() {
            return Err(midibridge_io::Error::NotEnabled.into());
        }
        Ok(Self { shared })
    }

    fn snapshots(&self) -> Arc<Vec<PortSnapshot>> {
        self.shared.manager.inputs()
    }

    pub fn len(&self) -> usize {
        self.snapshots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots().is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.snapshots().iter().map(|p| p.name.clone()).collect()
    }

    pub fn ids(&self) -> Vec<String> {
        self.snapshots().iter().map(|p| p.id.clone()).collect()
    }

    pub fn get(&self, key: impl Into<InputKey>) -> Result<Input> {
        let snapshots = self.snapshots();
        let index = match key.into() {
            InputKey::Index(index) if index < snapshots.len() => index,
            InputKey::Index(index) => return Err(Error::InputIndexOutOfRange(index)),
            InputKey::IdOrName(key) => snapshots
                .iter()
                .position(|p| p.id == key || p.name == key)
                .ok_or(Error::InputNotFound(key))?,
        };
        Ok(Input {
            shared: Arc::clone(&self.shared),
            index,
            cached: Mutex::new(snapshots[index].clone()),
        })
    }

    /// One proxy per input currently published.
    pub fn to_vec(&self) -> Vec<Input> {
        self.snapshots()
            .iter()
            .enumerate()
            .map(|(index, snapshot)| Input {
                shared: Arc::clone(&self.shared),
                index,
                cached: Mutex::new(snapshot.clone()),
            })
            .collect()
    }
}

impl fmt::Display for Inputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshots = self.snapshots();
        write!(f, "MIDI Inputs ({})", snapshots.len())?;
        for (index, snapshot) in snapshots.iter().enumerate() {
            write!(f, "\n{}:\n{}", index, snapshot.describe(4))?;
        }
        Ok(())
    }
}

impl fmt::Debug for Inputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

pub struct Input {
    shared: Arc<Shared>,
    index: usize,
    cached: Mutex<PortSnapshot>,
}

impl Input {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Current attributes while synced, the last synced ones otherwise.
    pub fn snapshot(&self) -> PortSnapshot {
        let live = self.shared.manager.inputs();
        let mut cached = self.cached.lock();
        if let Some(current) = live.get(self.index).filter(|p| p.id == cached.id) {
            *cached = current.clone();
        }
        cached.clone()
    }

    /// Whether the port at this index is still the one this proxy was made for.
    pub fn synced(&self) -> bool {
        let live = self.shared.manager.inputs();
        let cached = self.cached.lock();
        live.get(self.index).is_some_and(|p| p.id == cached.id)
    }

    pub fn id(&self) -> String {
        self.snapshot().id
    }

    pub fn name(&self) -> String {
        self.snapshot().name
    }

    pub fn manufacturer(&self) -> String {
        self.snapshot().manufacturer
    }

    pub fn connection(&self) -> PortConnection {
        self.snapshot().connection
    }

    pub fn state(&self) -> PortState {
        self.snapshot().state
    }

    /// Tracks an event on this input. An empty `properties` tracks everything
    /// the event declares.
    pub fn track(&self, event: &str, properties: &[&str]) -> Result<Listener> {
        if !self.synced() {
            return Err(Error::InputOutOfSync(self.name()));
        }
        let mut builder = Subscription::port(self.id(), event);
        if !properties.is_empty() {
            builder = builder.properties(properties.iter().copied());
        }
        self.shared.track(builder.build()?)
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MIDI Input [{}]\n{}", self.index, self.snapshot().describe(4))
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Input")
            .field("index", &self.index)
            .field("snapshot", &*self.cached.lock())
            .finish()
    }
}
