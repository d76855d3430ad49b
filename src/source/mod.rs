//! The source component model: parsed files, components and data nodes.
//!
//! This module implements the ordered, mutable object graph a source file is parsed into.
//! Every parsed unit - label, macro invocation, documentation block, verbatim text span -
//! is a [`Component`] living in its file's arena, retaining the exact whitespace and
//! comment fragments that surrounded it, so that serializing an unedited file reproduces
//! the original bytes exactly.
//!
//! # Key Components
//!
//! - [`Component`] / [`ComponentKind`] - one parsed-file unit and its structural variants
//! - [`Data`] - a macro invocation with positional arguments and "next data" links
//! - [`DocBlock`] - a `;;` documentation block with `@field{value}` tags
//! - [`SourceFile`] - the per-file arena, sequence order and dirtiness tracking
//! - [`parser::FileParser`] - the line-oriented text parser
//!
//! # Integration
//!
//! - [`crate::project`] - owns the files and the label/macro tables parsing consults
//! - [`crate::value`] - binds typed accessors onto data-node arguments
//! - [`crate::transaction`] - snapshots a file's arena for undo and replica transfer

mod component;
mod data;
mod doc;
mod file;

/// Line-oriented source text parsing.
pub mod parser;

pub use component::{Component, ComponentFlags, ComponentId, ComponentKind, FileId, Label};
pub use data::{Data, NumBase};
pub use doc::DocBlock;
pub use file::{Components, SourceFile};
