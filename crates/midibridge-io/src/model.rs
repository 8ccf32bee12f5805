//! State model seam: the remote object whose attributes mirror MIDI state.
//!
//! `set` stages an attribute, `save` commits every staged attribute as one
//! outward change notification.

use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;

pub type ChangeHandler = Arc<dyn Fn(&Value) + Send + Sync>;
pub type MessageHandler = Arc<dyn Fn(&Value) -> Result<()> + Send + Sync>;
pub type DestroyHandler = Arc<dyn Fn() + Send + Sync>;

pub trait StateModel: Send + Sync {
    fn id(&self) -> &str;

    fn get(&self, attribute: &str) -> Option<Value>;

    fn set(&self, attribute: &str, value: Value);

    /// Commits all attributes set since the previous save.
    fn save(&self);

    /// Sends a custom message to the remote side.
    fn send(&self, message: Value);

    /// Called when the remote side changes `attribute`.
    fn on_change(&self, attribute: &str, handler: ChangeHandler);

    /// Installs the handler for inbound custom messages, replacing any
    /// previous one. Errors are returned to whoever delivered the message.
    fn on_custom_message(&self, handler: MessageHandler);

    fn on_destroy(&self, handler: DestroyHandler);
}

/// Resolves the state model named by a remote `event_model_id`.
pub trait ModelResolver: Send + Sync {
    fn resolve(&self, model_id: &str) -> Option<Arc<dyn StateModel>>;
}

#[derive(Default)]
struct LocalState {
    attributes: Map<String, Value>,
    staged: Vec<String>,
    last_commit: Option<Map<String, Value>>,
    last_sent: Option<Value>,
}

#[derive(Default)]
struct Handlers {
    change: Vec<(String, ChangeHandler)>,
    message: Option<MessageHandler>,
    destroy: Vec<DestroyHandler>,
}

/// In-memory [`StateModel`].
///
/// Holds the latest attribute values, the latest committed change set and a
/// save counter; older change sets are dropped. The `receive_*` methods and
/// [`LocalModel::destroy`] play the remote side.
pub struct LocalModel {
    id: String,
    state: RwLock<LocalState>,
    handlers: RwLock<Handlers>,
    saves: AtomicUsize,
    destroyed: AtomicBool,
}

impl LocalModel {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: RwLock::new(LocalState::default()),
            handlers: RwLock::new(Handlers::default()),
            saves: AtomicUsize::new(0),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn shared(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(id))
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Acquire)
    }

    pub fn last_commit(&self) -> Option<Map<String, Value>> {
        self.state.read().last_commit.clone()
    }

    /// The most recent message passed to [`StateModel::send`].
    pub fn last_sent(&self) -> Option<Value> {
        self.state.read().last_sent.clone()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Applies a change made by the remote side and notifies `on_change` handlers.
    pub fn receive_change(&self, attribute: &str, value: Value) {
        self.state
            .write()
            .attributes
            .insert(attribute.to_string(), value.clone());

        let handlers: Vec<ChangeHandler> = self
            .handlers
            .read()
            .change
            .iter()
            .filter(|(attr, _)| attr == attribute)
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler(&value);
        }
    }

    /// Delivers a custom message from the remote side.
    ///
    /// Messages arriving before a handler is installed are ignored.
    pub fn receive_message(&self, message: &Value) -> Result<()> {
        let handler = self.handlers.read().message.clone();
        match handler {
            Some(handler) => handler(message),
            None => {
                debug!("Model {} has no message handler, dropping message", self.id);
                Ok(())
            }
        }
    }

    /// Tears the model down: runs `on_destroy` handlers once and drops all hooks.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        let handlers = std::mem::take(&mut *self.handlers.write());
        for handler in handlers.destroy {
            handler();
        }
    }
}

impl StateModel for LocalModel {
    fn id(&self) -> &str {
        &self.id
    }

    fn get(&self, attribute: &str) -> Option<Value> {
        self.state.read().attributes.get(attribute).cloned()
    }

    fn set(&self, attribute: &str, value: Value) {
        let mut state = self.state.write();
        state.attributes.insert(attribute.to_string(), value);
        if !state.staged.iter().any(|a| a == attribute) {
            state.staged.push(attribute.to_string());
        }
    }

    fn save(&self) {
        let mut state = self.state.write();
        let staged = std::mem::take(&mut state.staged);
        let mut commit = Map::new();
        for attribute in staged {
            if let Some(value) = state.attributes.get(&attribute) {
                commit.insert(attribute, value.clone());
            }
        }
        state.last_commit = Some(commit);
        self.saves.fetch_add(1, Ordering::AcqRel);
    }

    fn send(&self, message: Value) {
        self.state.write().last_sent = Some(message);
    }

    fn on_change(&self, attribute: &str, handler: ChangeHandler) {
        self.handlers
            .write()
            .change
            .push((attribute.to_string(), handler));
    }

    fn on_custom_message(&self, handler: MessageHandler) {
        self.handlers.write().message = Some(handler);
    }

    fn on_destroy(&self, handler: DestroyHandler) {
        self.handlers.write().destroy.push(handler);
    }
}

impl std::fmt::Debug for LocalModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalModel")
            .field("id", &self.id)
            .field("saves", &self.save_count())
            .finish()
    }
}

/// Concurrent id -> model map.
#[derive(Default)]
pub struct ModelDirectory {
    models: DashMap<String, Arc<dyn StateModel>>,
}

impl ModelDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `model` under its own id, replacing any model with that id.
    pub fn insert(&self, model: Arc<dyn StateModel>) {
        self.models.insert(model.id().to_string(), model);
    }

    pub fn remove(&self, model_id: &str) -> bool {
        self.models.remove(model_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl ModelResolver for ModelDirectory {
    fn resolve(&self, model_id: &str) -> Option<Arc<dyn StateModel>> {
        self.models.get(model_id).map(|entry| Arc::clone(entry.value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use serde_json::json;

    #[test]
    fn test_save_commits_staged_attributes_once() {
        let model = LocalModel::new("m");
        model.set("a", json!(1));
        model.set("b", json!(2));
        model.set("a", json!(3));
        assert_eq!(model.save_count(), 0);

        model.save();
        assert_eq!(model.save_count(), 1);
        let commit = model.last_commit().unwrap();
        assert_eq!(commit.len(), 2);
        assert_eq!(commit["a"], json!(3));
        assert_eq!(commit.keys().collect::<Vec<_>>(), vec!["a", "b"]);

        model.save();
        assert!(model.last_commit().unwrap().is_empty());
    }

    #[test]
    fn test_only_latest_commit_is_kept() {
        let model = LocalModel::new("m");
        for count in 1..=10_000 {
            model.set("count", json!(count));
            model.save();
        }
        assert_eq!(model.save_count(), 10_000);
        assert_eq!(model.last_commit().unwrap()["count"], json!(10_000));
        assert!(model.state.read().staged.is_empty());
    }

    #[test]
    fn test_send_keeps_latest_message() {
        let model = LocalModel::new("m");
        assert!(model.last_sent().is_none());
        model.send(json!({ "n": 1 }));
        model.send(json!({ "n": 2 }));
        assert_eq!(model.last_sent(), Some(json!({ "n": 2 })));
    }

    #[test]
    fn test_remote_change_fires_matching_handlers() {
        let model = LocalModel::new("m");
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        model.on_change(
            "enabled",
            Arc::new(move |value| seen_clone.lock().push(value.clone())),
        );

        model.receive_change("other", json!(1));
        model.receive_change("enabled", json!(false));
        assert_eq!(*seen.lock(), vec![json!(false)]);
        assert_eq!(model.get("enabled"), Some(json!(false)));
        // remote changes are not echoed back
        assert_eq!(model.save_count(), 0);
    }

    #[test]
    fn test_message_handler_replaced_and_errors_returned() {
        let model = LocalModel::new("m");
        assert!(model.receive_message(&json!({})).is_ok());

        model.on_custom_message(Arc::new(|_| Ok(())));
        model.on_custom_message(Arc::new(|_| Err(Error::UnknownCommand("x".into()))));
        assert!(matches!(
            model.receive_message(&json!({})),
            Err(Error::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_destroy_runs_once() {
        let model = LocalModel::new("m");
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        model.on_destroy(Arc::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        }));

        model.destroy();
        model.destroy();
        assert!(model.is_destroyed());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_directory_resolves_by_id() {
        let directory = ModelDirectory::new();
        directory.insert(LocalModel::shared("listener-1"));
        assert!(directory.resolve("listener-1").is_some());
        assert!(directory.resolve("nope").is_none());
        assert!(directory.remove("listener-1"));
        assert!(directory.is_empty());
    }
}
