//! Undo/redo groups and the transaction state machine.
//!
//! This module provides [`TransactionManager`], which brackets edits into undo groups and
//! maintains the undo/redo stacks of captured [`crate::transaction::Snapshot`]s.
//!
//! # Architecture
//!
//! Per entity and per group, capture follows the state machine
//! `Clean -> Dirty (snapshot captured) -> Clean (snapshot pushed)`: the first mutating
//! call inside a group captures the entity's pre-mutation state, later mutations of the
//! same entity in the same group are no-ops, and closing the group pushes the collected
//! snapshots as one undo step. Groups nest; only the outermost `end_group` closes the
//! step.
//!
//! Undo pops the most recent group, captures a *forward* snapshot of each affected entity
//! (which becomes the redo step), restores the saved state verbatim, and invokes the
//! entity's post-restoration hook. Redo is exactly symmetric.
//!
//! Mutating tracked state outside any open group is an internal-consistency failure and
//! fails fast; so does undoing while a group is still open.

use log::debug;

use crate::transaction::{EntityId, Snapshot, Trackable};

/// Resolves entity identities to live entities during undo/redo.
///
/// [`crate::project::Project`] implements this for its source files and stream
/// storages; embedders with their own trackable entities implement it over
/// whatever owns them.
pub trait EntityStore {
    /// Mutable access to the entity with the given identity, if it exists.
    fn entity_mut(&mut self, id: &EntityId) -> Option<&mut dyn Trackable>;
}

/// One undo step: the pre-mutation snapshots of every entity touched inside
/// one transaction group.
#[derive(Debug)]
pub struct UndoGroup {
    label: String,
    snapshots: Vec<(EntityId, Snapshot)>,
}

impl UndoGroup {
    /// The human-readable label the group was opened with.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of entities captured in this group.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// True if no entity was captured.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// Brackets edits into undo groups and owns the undo/redo stacks.
#[derive(Debug, Default)]
pub struct TransactionManager {
    open: Option<UndoGroup>,
    depth: u32,
    undo_stack: Vec<UndoGroup>,
    redo_stack: Vec<UndoGroup>,
}

impl TransactionManager {
    /// Creates a manager with empty stacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a transaction group (reentrant).
    ///
    /// Nested calls keep the outermost label; only the matching outermost
    /// [`TransactionManager::end_group`] closes the step.
    pub fn begin_group(&mut self, label: &str) {
        if self.depth == 0 {
            self.open = Some(UndoGroup {
                label: label.to_string(),
                snapshots: Vec::new(),
            });
        }
        self.depth += 1;
    }

    /// Closes a transaction group.
    ///
    /// At the outermost level, pushes the collected snapshots as one undo step
    /// (if any entity was captured) and clears the redo stack.
    ///
    /// # Panics
    ///
    /// Panics without a matching [`TransactionManager::begin_group`].
    pub fn end_group(&mut self) {
        assert!(self.depth > 0, "end_group without matching begin_group");
        self.depth -= 1;
        if self.depth == 0 {
            let group = self.open.take().expect("open group at depth > 0");
            if !group.snapshots.is_empty() {
                debug!(
                    "transaction '{}' captured {} entities",
                    group.label,
                    group.len()
                );
                self.undo_stack.push(group);
                self.redo_stack.clear();
            }
        }
    }

    /// True while a transaction group is open.
    pub fn in_group(&self) -> bool {
        self.depth > 0
    }

    /// Captures an entity's pre-mutation state into the open group.
    ///
    /// Idempotent per entity per group: only the first mutating call captures.
    ///
    /// # Panics
    ///
    /// Panics when no group is open - mutating tracked state outside a
    /// transaction boundary is an unrecoverable internal-consistency failure.
    pub fn capture(&mut self, entity: &dyn Trackable) {
        let id = entity.identity();
        let group = self.open.as_mut().unwrap_or_else(|| {
            panic!("mutation of tracked entity {id} outside of a transaction boundary")
        });
        if group.snapshots.iter().any(|(captured, _)| *captured == id) {
            return;
        }
        debug!("capturing {id} for '{}'", group.label);
        group.snapshots.push((id, entity.capture()));
    }

    /// True if the open group already holds a snapshot for the entity.
    pub fn is_captured(&self, id: &EntityId) -> bool {
        self.open
            .as_ref()
            .is_some_and(|group| group.snapshots.iter().any(|(captured, _)| captured == id))
    }

    /// Number of undoable steps.
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Number of redoable steps.
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Undoes the most recent group, restoring every captured entity verbatim
    /// and invoking its post-restoration hook. Returns `false` when there is
    /// nothing to undo.
    ///
    /// # Panics
    ///
    /// Panics while a group is open, or when a captured entity can no longer
    /// be resolved by the store.
    pub fn undo(&mut self, store: &mut dyn EntityStore) -> bool {
        assert!(self.depth == 0, "undo during an open transaction group");
        let Some(group) = self.undo_stack.pop() else {
            return false;
        };
        let forward = Self::apply(&group, store);
        debug!("undid '{}'", group.label);
        self.redo_stack.push(forward);
        true
    }

    /// Redoes the most recently undone group. Returns `false` when there is
    /// nothing to redo.
    ///
    /// # Panics
    ///
    /// Same conditions as [`TransactionManager::undo`].
    pub fn redo(&mut self, store: &mut dyn EntityStore) -> bool {
        assert!(self.depth == 0, "redo during an open transaction group");
        let Some(group) = self.redo_stack.pop() else {
            return false;
        };
        let backward = Self::apply(&group, store);
        debug!("redid '{}'", group.label);
        self.undo_stack.push(backward);
        true
    }

    /// Restores every snapshot in `group`, collecting the inverse group from
    /// forward snapshots captured at restoration time.
    fn apply(group: &UndoGroup, store: &mut dyn EntityStore) -> UndoGroup {
        let mut inverse = UndoGroup {
            label: group.label.clone(),
            snapshots: Vec::new(),
        };
        for (id, snapshot) in group.snapshots.iter().rev() {
            let entity = store
                .entity_mut(id)
                .unwrap_or_else(|| panic!("cannot restore unknown entity {id}"));
            inverse.snapshots.push((id.clone(), entity.capture()));
            entity.restore(snapshot);
            entity.rederive();
        }
        inverse
    }
}
