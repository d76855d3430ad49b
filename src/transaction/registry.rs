//! Factory registry for snapshot-based entity reconstruction.
//!
//! Rebuilding a live entity purely from `(identity, snapshot)` - without replaying edit
//! history - is the contract that lets a second process or session reach an equivalent
//! state from transferred snapshots. The registry is an explicit map from entity-kind
//! tags to factory functions, populated at startup; factories are closures and capture
//! whatever context handles (label tables, macro tables) their entity type needs.

use std::collections::HashMap;

use crate::transaction::{EntityId, Snapshot, Trackable};

type FactoryFn = Box<dyn Fn(&EntityId, &Snapshot) -> Box<dyn Trackable>>;

/// Maps entity-kind tags to reconstruction factories.
#[derive(Default)]
pub struct FactoryRegistry {
    factories: HashMap<String, FactoryFn>,
}

impl FactoryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the factory for one entity kind, replacing any previous one.
    pub fn register(
        &mut self,
        kind: &str,
        factory: impl Fn(&EntityId, &Snapshot) -> Box<dyn Trackable> + 'static,
    ) {
        self.factories.insert(kind.to_string(), Box::new(factory));
    }

    /// True if a factory is registered for the kind.
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Rebuilds a live entity from its identity and latest snapshot, running
    /// the post-rebuild hook before returning.
    ///
    /// # Panics
    ///
    /// Panics when no factory is registered for the identity's kind, or when
    /// the snapshot's kind tag disagrees with the identity - both are
    /// unrecoverable consistency failures of the transfer path.
    pub fn reconstruct(&self, id: &EntityId, snapshot: &Snapshot) -> Box<dyn Trackable> {
        assert_eq!(
            id.kind(),
            snapshot.kind(),
            "identity kind '{}' does not match snapshot kind '{}'",
            id.kind(),
            snapshot.kind()
        );
        let factory = self
            .factories
            .get(id.kind())
            .unwrap_or_else(|| panic!("no factory registered for entity kind '{}'", id.kind()));
        let mut entity = factory(id, snapshot);
        entity.rederive();
        entity
    }
}

impl std::fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryRegistry")
            .field("kinds", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
