//! Commands accepted on the interface's custom-message channel.
//!
//! Wire shape: `{"action": "...", "args": {...}}`. The older `command` key is
//! accepted in place of `action`; when both are present `action` wins.

use midibridge_midi::TargetType;
use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddListenerArgs {
    pub target_type: TargetType,
    #[serde(default)]
    pub target_id: Option<String>,
    /// Id of the state model that receives the extracted values.
    pub event_model_id: String,
    pub event_name: String,
    #[serde(default)]
    pub event_props: Vec<String>,
    /// Caller-chosen id used to remove the listener later.
    pub event_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveListenerArgs {
    pub event_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Enable,
    AddListener(AddListenerArgs),
    RemoveListener(RemoveListenerArgs),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    args: Value,
}

impl Command {
    pub fn from_message(message: &Value) -> Result<Self> {
        let envelope = Envelope::deserialize(message)?;
        let action = envelope
            .action
            .or(envelope.command)
            .ok_or_else(|| serde_json::Error::missing_field("action"))?;
        match action.as_str() {
            "enable" => Ok(Command::Enable),
            "add_listener" => Ok(Command::AddListener(AddListenerArgs::deserialize(
                &envelope.args,
            )?)),
            "remove_listener" => Ok(Command::RemoveListener(RemoveListenerArgs::deserialize(
                &envelope.args,
            )?)),
            other => Err(Error::UnknownCommand(other.to_string())),
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Command::Enable => "enable",
            Command::AddListener(_) => "add_listener",
            Command::RemoveListener(_) => "remove_listener",
        }
    }

    pub fn to_message(&self) -> Value {
        let args = match self {
            Command::Enable => Value::Null,
            Command::AddListener(args) => serde_json::to_value(args).unwrap_or(Value::Null),
            Command::RemoveListener(args) => serde_json::to_value(args).unwrap_or(Value::Null),
        };
        json!({ "action": self.action(), "args": args })
    }
}
