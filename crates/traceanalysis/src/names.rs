//! Human-readable names for monitor contexts, states and entities.
//!
//! Names are registered once at start-up and only consulted for display.
//! State and entity lookups check the common table first, then the table of
//! the context. Every lookup reports "not found" while resolution is
//! disabled.

use std::borrow::Cow;
use std::collections::HashMap;

#[derive(Debug, thiserror::Error)]
pub enum NameError {
    /// States and entities can only be named inside a registered context.
    #[error("Unregistered context {0:04X}")]
    UnregisteredContext(u16),
}

#[derive(Debug, Default)]
struct ContextEntry {
    name: String,
    states: HashMap<u16, String>,
    entities: HashMap<u16, String>,
}

#[derive(Debug)]
pub struct NameRegistry {
    enabled: bool,
    contexts: HashMap<u16, ContextEntry>,
    common_states: HashMap<u16, String>,
    common_entities: HashMap<u16, String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        NameRegistry {
            enabled: true,
            contexts: HashMap::new(),
            common_states: HashMap::new(),
            common_entities: HashMap::new(),
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Register a context. Registering it again renames it and keeps the
    /// states and entities already attached to it.
    pub fn register_context(&mut self, context: u16, name: impl Into<String>) {
        self.contexts.entry(context).or_default().name = name.into();
    }

    pub fn register_state(
        &mut self,
        context: u16,
        state: u16,
        name: impl Into<String>,
    ) -> Result<(), NameError> {
        self.context_entry(context)?
            .states
            .insert(state, name.into());
        Ok(())
    }

    pub fn register_entity(
        &mut self,
        context: u16,
        entity: u16,
        name: impl Into<String>,
    ) -> Result<(), NameError> {
        self.context_entry(context)?
            .entities
            .insert(entity, name.into());
        Ok(())
    }

    pub fn register_common_state(&mut self, state: u16, name: impl Into<String>) {
        self.common_states.insert(state, name.into());
    }

    pub fn register_common_entity(&mut self, entity: u16, name: impl Into<String>) {
        self.common_entities.insert(entity, name.into());
    }

    fn context_entry(&mut self, context: u16) -> Result<&mut ContextEntry, NameError> {
        self.contexts
            .get_mut(&context)
            .ok_or(NameError::UnregisteredContext(context))
    }

    pub fn resolve_context(&self, context: u16) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        self.contexts.get(&context).map(|c| c.name.as_str())
    }

    pub fn resolve_state(&self, context: u16, state: u16) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        if let Some(name) = self.common_states.get(&state) {
            return Some(name);
        }
        self.contexts
            .get(&context)
            .and_then(|c| c.states.get(&state))
            .map(String::as_str)
    }

    pub fn resolve_entity(&self, context: u16, entity: u16) -> Option<&str> {
        if !self.enabled {
            return None;
        }
        if let Some(name) = self.common_entities.get(&entity) {
            return Some(name);
        }
        self.contexts
            .get(&context)
            .and_then(|c| c.entities.get(&entity))
            .map(String::as_str)
    }

    /// The context name, or its ID as 4 hex digits.
    pub fn context_label(&self, context: u16) -> Cow<'_, str> {
        or_hex(self.resolve_context(context), context)
    }

    pub fn state_label(&self, context: u16, state: u16) -> Cow<'_, str> {
        or_hex(self.resolve_state(context, state), state)
    }

    pub fn entity_label(&self, context: u16, entity: u16) -> Cow<'_, str> {
        or_hex(self.resolve_entity(context, entity), entity)
    }
}

impl Default for NameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn or_hex(name: Option<&str>, id: u16) -> Cow<'_, str> {
    match name {
        Some(name) => Cow::Borrowed(name),
        None => Cow::Owned(format!("{:04x}", id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn registry() -> NameRegistry {
        let mut names = NameRegistry::new();
        names.register_context(5, "RADIO");
        names.register_state(5, 0, "ON").unwrap();
        names.register_state(5, 1, "OFF").unwrap();
        names.register_entity(5, 0, "CC2420").unwrap();
        names.register_common_state(0xfffd, "CREATE");
        names.register_common_entity(0x0100, "ANY");
        names
    }

    #[test]
    fn test_resolve_context_scoped() {
        let names = registry();
        assert_eq!(names.resolve_context(5), Some("RADIO"));
        assert_eq!(names.resolve_state(5, 1), Some("OFF"));
        assert_eq!(names.resolve_entity(5, 0), Some("CC2420"));
        // Same IDs in another context are not named.
        assert_eq!(names.resolve_state(6, 1), None);
        assert_eq!(names.resolve_entity(6, 0), None);
    }

    #[test]
    fn test_common_names_apply_everywhere() {
        let names = registry();
        assert_eq!(names.resolve_state(5, 0xfffd), Some("CREATE"));
        assert_eq!(names.resolve_state(0x1234, 0xfffd), Some("CREATE"));
        assert_eq!(names.resolve_entity(42, 0x0100), Some("ANY"));
    }

    #[test]
    fn test_common_names_take_precedence() {
        let mut names = registry();
        names.register_state(5, 7, "LOCAL").unwrap();
        names.register_common_state(7, "COMMON");
        assert_eq!(names.resolve_state(5, 7), Some("COMMON"));
    }

    #[test]
    fn test_register_under_unknown_context() {
        let mut names = NameRegistry::new();
        assert_matches!(
            names.register_state(3, 1, "X"),
            Err(NameError::UnregisteredContext(3))
        );
        assert_matches!(
            names.register_entity(3, 1, "X"),
            Err(NameError::UnregisteredContext(3))
        );
    }

    #[test]
    fn test_reregister_context_keeps_tables() {
        let mut names = registry();
        names.register_context(5, "RF");
        assert_eq!(names.resolve_context(5), Some("RF"));
        assert_eq!(names.resolve_state(5, 0), Some("ON"));
    }

    #[test]
    fn test_disabled_resolution() {
        let mut names = registry();
        names.set_enabled(false);
        assert_eq!(names.resolve_context(5), None);
        assert_eq!(names.resolve_state(5, 0xfffd), None);
        assert_eq!(names.resolve_entity(5, 0), None);
        assert_eq!(names.context_label(5), "0005");

        names.set_enabled(true);
        assert_eq!(names.context_label(5), "RADIO");
    }

    #[test]
    fn test_labels_fall_back_to_hex() {
        let names = registry();
        assert_eq!(names.context_label(0x00ab), "00ab");
        assert_eq!(names.state_label(5, 0x1f), "001f");
        assert_eq!(names.entity_label(5, 0xbeef), "beef");
        assert_eq!(names.state_label(5, 0), "ON");
    }
}
