//! Entity identity and opaque state snapshots.
//!
//! A [`Snapshot`] is the unit of the undo/redo and replica-transfer machinery: an opaque,
//! serialized capture of one entity's undoable state, tagged with the entity kind so a
//! restore into the wrong shape fails fast instead of silently misinterpreting bytes.
//! Snapshots are encoded with `bincode` over the entity's `serde` state struct, which
//! keeps them compact and transferable across process boundaries.
//!
//! The [`Trackable`] trait is the contract every undoable entity implements: pure-state
//! extraction, verbatim restoration, and a post-restoration hook for re-deriving caches
//! (identity-keyed indices, label table entries) that are deliberately absent from the
//! snapshot.

use std::any::Any;
use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Identifies one trackable entity: a kind tag plus a per-kind key.
///
/// The kind tag selects the factory used for snapshot reconstruction; the key
/// is whatever the entity type uses as stable identity (a file index, a stream
/// name, a domain record id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId {
    kind: String,
    key: String,
}

impl EntityId {
    /// Creates an entity id.
    pub fn new(kind: &str, key: &str) -> Self {
        EntityId {
            kind: kind.to_string(),
            key: key.to_string(),
        }
    }

    /// The entity-kind tag.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The per-kind identity key.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.kind, self.key)
    }
}

/// An opaque capture of an entity's undoable state.
///
/// The payload is a `bincode` encoding of the entity's state struct; consumers
/// never interpret it, they hand it back to the owning entity type (or its
/// registered factory) for restoration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    kind: String,
    state: Vec<u8>,
}

impl Snapshot {
    /// Encodes an entity state struct into a snapshot.
    ///
    /// # Panics
    ///
    /// Panics if encoding fails; entity state structs are plain data and a
    /// failure here is an internal-consistency error.
    pub fn encode<T: Serialize>(kind: &str, state: &T) -> Self {
        let state = bincode::serde::encode_to_vec(state, bincode::config::standard())
            .unwrap_or_else(|e| panic!("failed to encode '{kind}' snapshot: {e}"));
        Snapshot {
            kind: kind.to_string(),
            state,
        }
    }

    /// Decodes the snapshot back into the entity's state struct.
    ///
    /// # Panics
    ///
    /// Panics when the snapshot's kind tag differs from `kind` or the payload
    /// does not decode into `T`: restoring a snapshot whose shape mismatches
    /// the live entity is an unrecoverable internal-consistency failure.
    pub fn decode<T: DeserializeOwned>(&self, kind: &str) -> T {
        assert_eq!(
            self.kind, kind,
            "snapshot shape mismatch: have '{}', expected '{}'",
            self.kind, kind
        );
        let (value, _) = bincode::serde::decode_from_slice(&self.state, bincode::config::standard())
            .unwrap_or_else(|e| panic!("incompatible '{kind}' snapshot: {e}"));
        value
    }

    /// The entity-kind tag this snapshot was captured from.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Size of the encoded state in bytes.
    pub fn size(&self) -> usize {
        self.state.len()
    }
}

/// The contract of every undoable entity.
///
/// Implementations must be able to:
///
/// 1. extract their complete undoable state into an opaque [`Snapshot`]
///    (caches derivable from that state are excluded),
/// 2. replace their live state verbatim from a snapshot, and
/// 3. re-derive the excluded caches afterwards.
///
/// Together with a registered factory (see
/// [`crate::transaction::FactoryRegistry`]) this also enables rebuilding an
/// equivalent live entity in another process purely from `(identity, snapshot)`
/// without replaying edit history.
pub trait Trackable {
    /// The entity's stable identity.
    fn identity(&self) -> EntityId;

    /// Extracts the entity's undoable state.
    fn capture(&self) -> Snapshot;

    /// Replaces the entity's live state verbatim.
    ///
    /// # Panics
    ///
    /// Panics when the snapshot's shape does not match this entity type.
    fn restore(&mut self, snapshot: &Snapshot);

    /// Re-derives caches that are absent from the snapshot. Called after every
    /// [`Trackable::restore`] and after factory reconstruction.
    fn rederive(&mut self) {}

    /// Upcast for callers that need the concrete type back (primarily the
    /// reconstruction path).
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast, see [`Trackable::as_any`].
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
