use std::collections::HashMap;

use bytes::Bytes;

use crate::codes::{code_name, REPLY, REPLY_FAIL, REPLY_RETRY, UNDEFINED};
use crate::event::{Dispatcher, Event, RawEvent};

/// One entry in the message legend.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CodeDef {
    pub code: u16,
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub demands_ack: bool,
}

impl CodeDef {
    pub fn new(code: u16, name: impl Into<String>, demands_ack: bool) -> Self {
        Self {
            code,
            name: name.into(),
            demands_ack,
        }
    }
}

/// Code-keyed message legend that resolves codes into [`RawEvent`] templates.
///
/// The three reply codes are always present.
#[derive(Debug, Clone)]
pub struct MessageRegistry {
    defs: HashMap<u16, CodeDef>,
}

impl MessageRegistry {
    /// Registry holding only the built-in reply codes.
    pub fn new() -> Self {
        let mut registry = Self {
            defs: HashMap::new(),
        };
        for code in [REPLY, REPLY_RETRY, REPLY_FAIL] {
            registry
                .defs
                .insert(code, CodeDef::new(code, code_name(code), false));
        }
        registry
    }

    /// Add or replace a definition.
    ///
    /// Code 0x0000 is reserved for "undefined" and is silently ignored.
    pub fn register(&mut self, def: CodeDef) -> &mut Self {
        if def.code != UNDEFINED {
            self.defs.insert(def.code, def);
        }
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, code: u16, name: &str, demands_ack: bool) -> Self {
        self.register(CodeDef::new(code, name, demands_ack));
        self
    }

    pub fn get(&self, code: u16) -> Option<&CodeDef> {
        self.defs.get(&code)
    }

    /// Definition name, or the built-in range label for unknown codes.
    pub fn name_of(&self, code: u16) -> &str {
        self.defs
            .get(&code)
            .map(|def| def.name.as_str())
            .unwrap_or_else(|| code_name(code))
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Definitions ordered by code.
    pub fn definitions(&self) -> Vec<&CodeDef> {
        let mut defs: Vec<&CodeDef> = self.defs.values().collect();
        defs.sort_by_key(|def| def.code);
        defs
    }
}

impl Default for MessageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<CodeDef> for MessageRegistry {
    fn from_iter<I: IntoIterator<Item = CodeDef>>(iter: I) -> Self {
        let mut registry = Self::new();
        for def in iter {
            registry.register(def);
        }
        registry
    }
}

impl Dispatcher for MessageRegistry {
    fn resolve(&self, message_code: u16) -> Option<Box<dyn Event>> {
        self.defs.get(&message_code).map(|def| {
            Box::new(RawEvent::new(def.code, Bytes::new()).with_ack(def.demands_ack))
                as Box<dyn Event>
        })
    }
}
