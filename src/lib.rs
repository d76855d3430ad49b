// Copyright 2026 The asmedit Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
//#![deny(unsafe_code)]
// - 'value/stream.rs' uses mmap to map a stream file into memory

//! # asmedit
//!
//! A framework for parsing, editing and losslessly round-tripping assembly-style game
//! resource data files - the substrate underneath an editor for a retro game disassembly
//! project. Built in pure Rust, `asmedit` parses semi-structured sources (rooms,
//! tilesets, palettes, animations, warps, objects) into a mutable object graph that
//! preserves exact formatting, exposes strongly-typed bit/byte/word accessors over the
//! raw values, and tracks every mutation so edits group atomically and undo/redo cleanly.
//!
//! ## Features
//!
//! - **Lossless round-trips** - parse-then-serialize reproduces the original bytes
//!   exactly for unedited files; edits rewrite only the mutated tokens
//! - **Typed value access** - byte, little-endian word and bit-range accessors over
//!   data-node arguments, flat binary streams, or caller-supplied getter/setter pairs
//! - **Atomic edits** - any number of field writes coalesce into a single change
//!   notification
//! - **Transactional undo** - snapshot-based undo/redo with symmetric redo, plus
//!   snapshot-only entity reconstruction for replica resynchronization
//! - **Project-wide resolution** - labels, symbolic constants and macro arities live in
//!   explicit project tables, never ambient state
//!
//! ## Quick Start
//!
//! ```rust
//! use asmedit::prelude::*;
//!
//! let mut project = Project::new();
//! project.define_macro("m_Chest", 4);
//! let file = project.add_file("chests.s", "m_Chest $00, $05, $12, $34\n")?;
//!
//! let node = project.file(file).first_data().unwrap();
//! let id = ValueCodec::new_data(&project, node, 2, ValueKind::Int, ValueWidth::Byte)?;
//! assert_eq!(id.get_int(&project)?, 0x12);
//! # Ok::<(), asmedit::Error>(())
//! ```
//!
//! ## Architecture
//!
//! `asmedit` is organized into four layers, leaf to root:
//!
//! - [`source`] - the component model: parsed files, labels, data nodes, documentation
//!   blocks, all retaining their exact spacing for byte-identical regeneration
//! - [`value`] - value field codecs and value reference groups: typed accessors over
//!   heterogeneous storage with change notification and atomic batching
//! - [`transaction`] - captured-state snapshots, undo groups and snapshot-based entity
//!   reconstruction
//! - [`project`] - the explicit context owning files, streams and lookup tables
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, Error>`](Result). Lookup failures
//! ([`Error::LabelNotFound`], [`Error::ReferenceNotFound`]) are recoverable and distinct
//! from malformed-data failures ([`Error::Malformed`], [`Error::Eval`]); bounds
//! violations on value writes are not errors at all - they clamp with a logged
//! diagnostic. Internal-consistency violations (detached-component access, mutation
//! outside a transaction, shape-mismatched snapshot restores) fail fast with a panic.
#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit- and integration-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use asmedit::prelude::*;
///
/// let project = Project::new();
/// assert_eq!(project.file_count(), 0);
/// ```
pub mod prelude;

/// Payload-free change notification with lock/flush semantics.
pub mod notify;

/// The explicit project context: files, streams and project-wide lookup tables.
pub mod project;

/// The source component model: parsed files, components, data nodes and
/// documentation blocks.
pub mod source;

/// The transactional mutation, undo and state-transfer layer.
pub mod transaction;

/// Typed value access: codecs, reference groups and stream storage.
pub mod value;

/// `asmedit` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always
/// [`Error`]. Used consistently throughout the crate for all fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `asmedit` Error type
///
/// The main error type for all operations in this crate. See the variant docs for the
/// lookup / malformed-data / storage error categories.
pub use error::Error;

/// Main entry point for working with a project of resource sources.
///
/// See [`project::Project`] for loading files, resolving labels and bracketing edits
/// into transactions.
pub use project::Project;
