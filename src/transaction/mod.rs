//! The transactional mutation, undo and state-transfer layer.
//!
//! Every undoable entity implements [`Trackable`]: it can extract its complete undoable
//! state into an opaque [`Snapshot`], replace its live state verbatim from one, and
//! re-derive any caches the snapshot deliberately omits. On top of that contract:
//!
//! - [`TransactionManager`] brackets edits into groups, lazily captures each touched
//!   entity's pre-mutation state (at most once per entity per group), and maintains the
//!   undo/redo stacks. Redo snapshots are captured at undo time, making the two
//!   directions exactly symmetric.
//! - [`FactoryRegistry`] maps entity-kind tags to factory functions so an entity can be
//!   rebuilt purely from `(identity, snapshot)` - the replica-resynchronization path.
//! - [`EntityStore`] is how the manager resolves identities back to live entities;
//!   [`crate::project::Project`] implements it for its files and streams.
//!
//! # Consistency rules
//!
//! Mutating tracked state outside an open group, restoring a shape-mismatched snapshot,
//! and reconstructing an unregistered kind all fail fast with a panic. Recoverable
//! errors never originate here; transaction failures are never silently swallowed.

mod registry;
mod snapshot;
mod undo;

pub use registry::FactoryRegistry;
pub use snapshot::{EntityId, Snapshot, Trackable};
pub use undo::{EntityStore, TransactionManager, UndoGroup};
