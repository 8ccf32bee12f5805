//! Builder for configuring and constructing a `MidiBridge`.

use midibridge_io::{
    InterfaceManager, LocalModel, MidiBackend, ModelDirectory, ModelResolver, StateModel,
    VirtualBackend,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::bridge::{MidiBridge, Shared};
use crate::Result;

/// Hardware MIDI requires explicit opt-in via `.hardware()`. Without it (or an
/// explicit `.backend(...)`) the bridge runs on an empty virtual backend.
///
/// Events are delivered when [`MidiBridge::pump`] is called, unless
/// `.dispatch_thread()` starts a background dispatcher.
///
/// # Example
///
/// ```ignore
/// use midibridge::prelude::*;
///
/// let bridge = MidiBridge::builder()
///     .client_name("my-notebook")
///     .poll_interval(Duration::from_millis(250))
///     .hardware()
///     .dispatch_thread()
///     .build()?;
/// ```
pub struct MidiBridgeBuilder {
    client_name: String,
    poll_interval: Duration,
    backend: Option<Arc<dyn MidiBackend>>,
    interface_model: Option<Arc<dyn StateModel>>,
    models: Option<Arc<dyn ModelResolver>>,
    dispatch_thread: bool,

    #[cfg(feature = "hardware")]
    hardware: bool,
}

impl Default for MidiBridgeBuilder {
    fn default() -> Self {
        Self {
            client_name: "midibridge".to_string(),
            poll_interval: Duration::from_millis(500),
            backend: None,
            interface_model: None,
            models: None,
            dispatch_thread: false,

            #[cfg(feature = "hardware")]
            hardware: false,
        }
    }
}

impl MidiBridgeBuilder {
    /// Default: "midibridge"
    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    /// How often the hardware backend looks for plugged / unplugged devices.
    /// Default: 500 ms
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[cfg(feature = "hardware")]
    pub fn hardware(mut self) -> Self {
        self.hardware = true;
        self
    }

    /// Takes precedence over `.hardware()`.
    pub fn backend(mut self, backend: Arc<dyn MidiBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// State model of the interface itself (`enabled`, `_inputs`, commands).
    pub fn interface_model(mut self, model: Arc<dyn StateModel>) -> Self {
        self.interface_model = Some(model);
        self
    }

    /// Resolves `event_model_id` in remote `add_listener` commands.
    ///
    /// Default: the bridge's own model directory, which also holds the model
    /// of every listener the bridge creates.
    pub fn models(mut self, resolver: Arc<dyn ModelResolver>) -> Self {
        self.models = Some(resolver);
        self
    }

    pub fn dispatch_thread(mut self) -> Self {
        self.dispatch_thread = true;
        self
    }

    pub fn build(self) -> Result<MidiBridge> {
        let backend = self
            .backend
            .clone()
            .unwrap_or_else(|| self.default_backend());

        let directory = Arc::new(ModelDirectory::new());
        let models = self
            .models
            .unwrap_or_else(|| Arc::clone(&directory) as Arc<dyn ModelResolver>);
        let interface_model = self
            .interface_model
            .unwrap_or_else(|| LocalModel::shared("interface"));

        let manager = Arc::new(InterfaceManager::new(backend, interface_model, models));
        manager.initialize();

        let dispatcher = if self.dispatch_thread {
            Some(manager.bus().spawn_dispatcher()?)
        } else {
            None
        };

        debug!(
            "MidiBridge built (client {:?}, poll {:?}, dispatcher: {})",
            self.client_name,
            self.poll_interval,
            dispatcher.is_some()
        );
        Ok(MidiBridge::from_parts(
            Arc::new(Shared::new(manager, directory)),
            dispatcher,
        ))
    }

    #[cfg(feature = "hardware")]
    fn default_backend(&self) -> Arc<dyn MidiBackend> {
        if self.hardware {
            Arc::new(midibridge_io::MidirBackend::new(
                self.client_name.clone(),
                self.poll_interval,
            ))
        } else {
            Arc::new(VirtualBackend::new())
        }
    }

    #[cfg(not(feature = "hardware"))]
    fn default_backend(&self) -> Arc<dyn MidiBackend> {
        Arc::new(VirtualBackend::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let builder = MidiBridgeBuilder::default();
        assert_eq!(builder.client_name, "midibridge");
        assert_eq!(builder.poll_interval, Duration::from_millis(500));
        assert!(!builder.dispatch_thread);
    }

    #[test]
    fn test_build_initializes_interface() {
        let model = LocalModel::shared("widget");
        let bridge = MidiBridge::builder()
            .interface_model(Arc::clone(&model) as Arc<dyn StateModel>)
            .build()
            .unwrap();

        assert!(!bridge.is_enabled());
        assert_eq!(model.get("enabled"), Some(serde_json::json!(false)));
        assert_eq!(model.save_count(), 1);
    }

    #[test]
    fn test_custom_resolver() {
        let directory = Arc::new(ModelDirectory::new());
        directory.insert(LocalModel::shared("elsewhere"));
        let bridge = MidiBridge::builder()
            .models(Arc::clone(&directory) as Arc<dyn ModelResolver>)
            .build()
            .unwrap();
        assert!(bridge.interface().models().resolve("elsewhere").is_some());
        assert!(bridge.models().is_empty());
    }

    #[test]
    fn test_dispatch_thread() {
        let bridge = MidiBridge::builder().dispatch_thread().build().unwrap();
        assert!(bridge.has_dispatcher());
    }
}
