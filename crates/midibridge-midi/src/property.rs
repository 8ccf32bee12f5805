//! Property paths: snake_case names mapped onto camelCase payload fields.
//!
//! `raw_value` reads `payload.rawValue`. A scope prefix addresses a nested
//! object: `note_raw_attack` reads `payload.note.rawAttack`.

use convert_case::{Case, Casing};
use std::fmt;

use crate::error::{Error, Result};
use crate::EventName;

/// Nested object a path reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathScope {
    Root,
    Note,
    Controller,
    Port,
}

impl PathScope {
    const PREFIXED: [PathScope; 3] = [PathScope::Note, PathScope::Controller, PathScope::Port];

    fn prefix(&self) -> &'static str {
        match self {
            PathScope::Root => "",
            PathScope::Note => "note_",
            PathScope::Controller => "controller_",
            PathScope::Port => "port_",
        }
    }

    /// Payload key of the nested object.
    pub fn key(&self) -> Option<&'static str> {
        match self {
            PathScope::Root => None,
            PathScope::Note => Some("note"),
            PathScope::Controller => Some("controller"),
            PathScope::Port => Some("port"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    name: String,
    scope: PathScope,
    field: String,
}

impl PropertyPath {
    /// Parses a path without checking it against any event kind.
    pub fn parse(path: &str) -> Self {
        let (scope, rest) = PathScope::PREFIXED
            .into_iter()
            .find_map(|scope| {
                path.strip_prefix(scope.prefix())
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| (scope, rest))
            })
            .unwrap_or((PathScope::Root, path));

        Self {
            name: path.to_string(),
            scope,
            field: rest.to_case(Case::Camel),
        }
    }

    /// Parses a path and checks that `event` declares it.
    pub fn for_event(event: EventName, path: &str) -> Result<Self> {
        if !event.properties().contains(&path) {
            return Err(Error::UnsupportedProperty {
                event: event.as_str().to_string(),
                property: path.to_string(),
            });
        }
        Ok(Self::parse(path))
    }

    /// Every path `event` declares, in declaration order.
    pub fn all_for(event: EventName) -> Vec<Self> {
        event.properties().iter().map(|p| Self::parse(p)).collect()
    }

    /// The snake_case path, also used as the state attribute name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> PathScope {
        self.scope
    }

    /// camelCase field name inside the scope.
    pub fn field(&self) -> &str {
        &self.field
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
