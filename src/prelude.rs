//! # asmedit Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the asmedit library. Import this module to get quick access to the essential
//! types for loading, binding and editing resource sources.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all asmedit operations
pub use crate::Error;

/// The result type used throughout asmedit
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// The project context owning files, streams and lookup tables
pub use crate::project::Project;

/// Project-wide lookup tables
pub use crate::project::{ConstantsMapping, LabelTable, MacroTable};

// ================================================================================================
// Source Component Model
// ================================================================================================

/// Parsed-file units and identifiers
pub use crate::source::{
    Component, ComponentFlags, ComponentId, ComponentKind, Data, DocBlock, FileId, NumBase,
    SourceFile,
};

// ================================================================================================
// Typed Value Access
// ================================================================================================

/// Value field codecs and reference groups
pub use crate::value::{Backing, ValueCodec, ValueGroup, ValueKind, ValueWidth};

/// Flat binary stream storage
pub use crate::value::{ReloadHandle, StreamId, StreamStorage};

// ================================================================================================
// Transactions, Undo and State Transfer
// ================================================================================================

/// Snapshots, undo groups and reconstruction
pub use crate::transaction::{
    EntityId, EntityStore, FactoryRegistry, Snapshot, Trackable, TransactionManager,
};

// ================================================================================================
// Change Notification
// ================================================================================================

/// The payload-free change event and its subscription handle
pub use crate::notify::{ChangeEvent, SubscriberHandle};
