//! Typed value access over heterogeneous storage.
//!
//! This module is the data-binding layer between domain entities and raw storage. A
//! [`ValueCodec`] is a minimal polymorphic accessor over one storage variant (a data-node
//! argument, a stream offset, or a getter/setter pair); a [`ValueGroup`] composes named
//! codecs into one logical record with aggregated notification and atomic batching;
//! [`StreamStorage`] is the flat-buffer backing used for binary resource blobs.
//!
//! # Key Components
//!
//! - [`ValueCodec`] / [`Backing`] / [`ValueKind`] / [`ValueWidth`] - the typed accessor
//! - [`ValueGroup`] - named, ordered records with atomic operations
//! - [`StreamStorage`] / [`StreamId`] / [`ReloadHandle`] - flat binary stream storage

mod codec;
mod group;
mod stream;

pub use codec::{Backing, ValueCodec, ValueKind, ValueWidth};
pub use group::ValueGroup;
pub use stream::{ReloadHandle, StreamId, StreamStorage};
