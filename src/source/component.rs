//! Parsed-file units and their identifiers.
//!
//! This module provides the [`crate::source::Component`] type, the single unit of a parsed
//! source file, together with the arena identifiers ([`crate::source::FileId`],
//! [`crate::source::ComponentId`]) used to reference components across the project without
//! tying lifetimes together.
//!
//! # Architecture
//!
//! Components live in a per-file arena of stable slots (see [`crate::source::SourceFile`]).
//! Neighbour links are stored as slot indices, never as references, so a component can be
//! referenced from anywhere in the project - a codec, the label table, a "next data" link
//! in another file - using a plain copyable [`ComponentId`].
//!
//! Every component retains the exact spacing fragments that surrounded it in the source
//! text. Concatenating the rendered text of all components in sequence order reproduces
//! the original file byte for byte, which is the hard round-trip requirement the whole
//! source model is built around.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::source::{Data, DocBlock};

/// Identifies one source file within a [`crate::project::Project`].
///
/// File ids are assigned densely in load order and are stable for the lifetime
/// of the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(pub(crate) u32);

impl FileId {
    /// Creates a file id from a raw index.
    pub fn new(index: u32) -> Self {
        FileId(index)
    }

    /// The raw arena index of this file.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "file#{}", self.0)
    }
}

/// Identifies one component slot within one source file.
///
/// A `ComponentId` stays valid for the lifetime of the project; detaching the
/// component leaves the slot permanently vacant, and any later access through
/// the stale id fails fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentId {
    pub(crate) file: FileId,
    pub(crate) slot: u32,
}

impl ComponentId {
    /// The file this component belongs to.
    pub fn file(self) -> FileId {
        self.file
    }

    /// The raw slot index within the owning file's arena.
    pub fn slot(self) -> usize {
        self.slot as usize
    }
}

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.slot)
    }
}

bitflags! {
    /// Per-component state flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ComponentFlags: u8 {
        /// The component is the last one on its source line.
        const ENDS_LINE = 0x01;
        /// The component was created programmatically and is not persisted on render.
        const SYNTHETIC = 0x02;
        /// The component has been textually modified since load (or last clean mark).
        const MODIFIED = 0x04;
        /// The component has been detached from its owning file.
        const DETACHED = 0x08;
    }
}

/// The structural variants a parsed component can take.
///
/// One variant per unit kind the line-oriented format knows about; generic
/// operations (rendering, spacing, dirtiness) live on [`Component`] itself so
/// the variants only carry their own fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ComponentKind {
    /// A label declaration (`name:`), a named jump target.
    Label(Label),
    /// A macro invocation with positional arguments.
    Data(Data),
    /// A verbatim text span: a blank line, a comment line, or anything the
    /// parser does not interpret structurally.
    Text(String),
    /// A documentation block of consecutive `;;` comment lines.
    Doc(DocBlock),
}

/// A label declaration naming a position in the source sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    /// The declared name, without the trailing colon.
    pub name: String,
}

/// One persisted or synthetic unit of a parsed source file.
///
/// A component is always owned by exactly one [`crate::source::SourceFile`] at a
/// time; relocation between files happens by detaching (which returns the
/// component by value) and re-attaching.
///
/// # Rendering
///
/// `leading ++ body ++ trailing` reproduces the component's exact source text.
/// `leading` holds the whitespace before the first token, `trailing` holds
/// everything after the last token up to and including the newline (trailing
/// whitespace and inline comments included). Synthetic components render as
/// nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub(crate) kind: ComponentKind,
    pub(crate) leading: String,
    pub(crate) trailing: String,
    pub(crate) flags: ComponentFlags,
    pub(crate) prev: Option<u32>,
    pub(crate) next: Option<u32>,
}

impl Component {
    fn with_kind(kind: ComponentKind) -> Self {
        Component {
            kind,
            leading: String::new(),
            trailing: String::new(),
            flags: ComponentFlags::empty(),
            prev: None,
            next: None,
        }
    }

    /// Creates a label component.
    pub fn label(name: &str) -> Self {
        Component::with_kind(ComponentKind::Label(Label {
            name: name.to_string(),
        }))
    }

    /// Creates a data component from a parsed macro invocation.
    pub fn data(data: Data) -> Self {
        Component::with_kind(ComponentKind::Data(data))
    }

    /// Creates a verbatim text component.
    pub fn text(body: &str) -> Self {
        Component::with_kind(ComponentKind::Text(body.to_string()))
    }

    /// Creates a documentation block component.
    pub fn doc(block: DocBlock) -> Self {
        Component::with_kind(ComponentKind::Doc(block))
    }

    /// Sets the leading spacing fragment.
    #[must_use]
    pub fn with_leading(mut self, leading: &str) -> Self {
        self.leading = leading.to_string();
        self
    }

    /// Sets the trailing fragment (whitespace, inline comment, newline).
    #[must_use]
    pub fn with_trailing(mut self, trailing: &str) -> Self {
        self.trailing = trailing.to_string();
        self
    }

    /// Marks the component as ending its source line.
    #[must_use]
    pub fn ends_line(mut self) -> Self {
        self.flags |= ComponentFlags::ENDS_LINE;
        self
    }

    /// Marks the component as synthetic: it exists in memory but is skipped on render.
    #[must_use]
    pub fn synthetic(mut self) -> Self {
        self.flags |= ComponentFlags::SYNTHETIC;
        self
    }

    /// The structural variant of this component.
    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    /// Current state flags.
    pub fn flags(&self) -> ComponentFlags {
        self.flags
    }

    /// True if the component has been textually modified since load.
    pub fn is_modified(&self) -> bool {
        self.flags.contains(ComponentFlags::MODIFIED)
    }

    /// True if the component is skipped when the file is rendered.
    pub fn is_synthetic(&self) -> bool {
        self.flags.contains(ComponentFlags::SYNTHETIC)
    }

    /// True if the component is the last one on its source line.
    pub fn is_line_end(&self) -> bool {
        self.flags.contains(ComponentFlags::ENDS_LINE)
    }

    /// The whitespace fragment preceding the first token.
    pub fn leading(&self) -> &str {
        &self.leading
    }

    /// The fragment following the last token, inline comment and newline included.
    pub fn trailing(&self) -> &str {
        &self.trailing
    }

    /// The data node payload, if this is a data component.
    pub fn as_data(&self) -> Option<&Data> {
        match &self.kind {
            ComponentKind::Data(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn as_data_mut(&mut self) -> Option<&mut Data> {
        match &mut self.kind {
            ComponentKind::Data(data) => Some(data),
            _ => None,
        }
    }

    /// The declared label name, if this is a label component.
    pub fn label_name(&self) -> Option<&str> {
        match &self.kind {
            ComponentKind::Label(label) => Some(&label.name),
            _ => None,
        }
    }

    /// The documentation block, if this is a doc component.
    pub fn as_doc(&self) -> Option<&DocBlock> {
        match &self.kind {
            ComponentKind::Doc(block) => Some(block),
            _ => None,
        }
    }

    /// Renders the component's exact source text into `out`.
    ///
    /// Synthetic components contribute nothing.
    pub fn render_into(&self, out: &mut String) {
        if self.is_synthetic() {
            return;
        }
        out.push_str(&self.leading);
        match &self.kind {
            ComponentKind::Label(label) => {
                out.push_str(&label.name);
                out.push(':');
            }
            ComponentKind::Data(data) => data.render_into(out),
            ComponentKind::Text(body) => out.push_str(body),
            ComponentKind::Doc(block) => out.push_str(block.raw()),
        }
        out.push_str(&self.trailing);
    }

    /// The component's exact source text.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }
}
