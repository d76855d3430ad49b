//! The project context: files, streams and the project-wide lookup tables.
//!
//! A [`Project`] is the single owner of the in-memory graph: every parsed
//! [`crate::source::SourceFile`], every [`crate::value::StreamStorage`], the label table,
//! the symbolic-constants mapping and the macro arity table. Nothing in the crate reaches
//! these through ambient state - entities and codecs receive the context (or `Arc` handles
//! to individual tables) explicitly at construction, and the tables follow the project's
//! init-on-load/teardown-on-close lifecycle.
//!
//! # Mutation and transactions
//!
//! All mutation of tracked state funnels through the project
//! ([`Project::set_arg`], [`Project::write_stream_u8`], [`Project::file_mut`], ...) and
//! requires an open transaction: the pre-mutation snapshot of the touched entity is
//! captured lazily, at most once per entity per transaction. Mutating outside a
//! transaction boundary fails fast. [`Project::undo`] / [`Project::redo`] replay whole
//! transactions; the project itself is the [`EntityStore`] resolving captured identities
//! back to live entities.
//!
//! # Concurrency
//!
//! One logical owner, one mutating thread. The only concession to other threads is that
//! the lookup tables are internally concurrent (so parsing may fan out during
//! [`Project::load_dir`]) and that stream reloads queue through a channel until the
//! owning thread applies them via [`Project::process_reloads`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use log::{info, warn};
use rayon::prelude::*;

use crate::{
    source::{parser::FileParser, ComponentId, Data, FileId, SourceFile},
    transaction::{EntityId, EntityStore, FactoryRegistry, Trackable, TransactionManager},
    value::{StreamId, StreamStorage},
    Error, Result,
};

mod constants;
mod eval;

pub use constants::ConstantsMapping;

/// The project-wide macro arity table: command name to fixed argument count.
///
/// Macros absent from the table are accepted with any arity; registering a
/// macro turns on construction-time validation for it.
#[derive(Debug, Default)]
pub struct MacroTable {
    map: DashMap<String, usize>,
}

impl MacroTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or updates) a macro's fixed argument count.
    pub fn define(&self, name: &str, arity: usize) {
        self.map.insert(name.to_string(), arity);
    }

    /// The fixed argument count of a known macro.
    pub fn arity_of(&self, name: &str) -> Option<usize> {
        self.map.get(name).map(|entry| *entry)
    }

    /// Number of registered macros.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True if no macro has been registered.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// The project-wide label table: declared name to component position.
#[derive(Debug, Default)]
pub struct LabelTable {
    map: DashMap<String, ComponentId>,
}

impl LabelTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a label declaration. Redefinitions win and are logged.
    pub fn register(&self, name: &str, id: ComponentId) {
        if let Some(previous) = self.map.insert(name.to_string(), id) {
            if previous != id {
                warn!("label '{name}' redefined at {id} (was {previous})");
            }
        }
    }

    /// Resolves a named jump target.
    ///
    /// # Errors
    ///
    /// [`crate::Error::LabelNotFound`] - deliberately distinct from the
    /// malformed-value error category.
    pub fn lookup(&self, name: &str) -> Result<ComponentId> {
        self.map
            .get(name)
            .map(|entry| *entry)
            .ok_or_else(|| Error::LabelNotFound(name.to_string()))
    }

    /// True if the label is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// Drops every label declared by one file, ahead of re-registration.
    pub fn remove_file(&self, file: FileId) {
        self.map.retain(|_, id| id.file() != file);
    }

    /// Number of declared labels.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True if no label is declared.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// The single owner of an in-memory project graph.
pub struct Project {
    files: Vec<SourceFile>,
    streams: Vec<StreamStorage>,
    labels: Arc<LabelTable>,
    constants: Arc<ConstantsMapping>,
    macros: Arc<MacroTable>,
    txn: TransactionManager,
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

impl Project {
    /// Creates an empty project with fresh lookup tables.
    pub fn new() -> Self {
        Project {
            files: Vec::new(),
            streams: Vec::new(),
            labels: Arc::new(LabelTable::new()),
            constants: Arc::new(ConstantsMapping::new()),
            macros: Arc::new(MacroTable::new()),
            txn: TransactionManager::new(),
        }
    }

    /// The project label table.
    pub fn labels(&self) -> &Arc<LabelTable> {
        &self.labels
    }

    /// The project symbolic-constants mapping.
    pub fn constants(&self) -> &Arc<ConstantsMapping> {
        &self.constants
    }

    /// The project macro arity table.
    pub fn macros(&self) -> &Arc<MacroTable> {
        &self.macros
    }

    /// Registers a macro's fixed argument count.
    pub fn define_macro(&self, name: &str, arity: usize) {
        self.macros.define(name, arity);
    }

    /// Registers a symbolic constant.
    pub fn define_constant(&self, name: &str, value: i64) {
        self.constants.define(name, value);
    }

    /// Resolves a named jump target project-wide.
    pub fn lookup_label(&self, name: &str) -> Result<ComponentId> {
        self.labels.lookup(name)
    }

    /// Evaluates argument text (literals, symbolic constants, arithmetic).
    pub fn evaluate(&self, text: &str) -> Result<i64> {
        eval::evaluate(text, &self.constants)
    }

    /// Parses source text into the project, registering its labels.
    ///
    /// # Errors
    ///
    /// Structural parse errors ([`crate::Error::Malformed`]) abort loading of
    /// the offending file and leave the project without it.
    pub fn add_file(&mut self, name: &str, text: &str) -> Result<FileId> {
        let id = FileId::new(u32::try_from(self.files.len()).expect("file arena overflow"));
        let parser = FileParser::new(self.macros.clone(), self.labels.clone());
        let file = parser.parse(id, name, text)?;
        self.files.push(file);
        Ok(id)
    }

    /// Loads every `*.s` file of a directory, in name order.
    ///
    /// File contents are read in parallel; parsing and registration stay on
    /// the calling thread, which is the project's single logical owner.
    pub fn load_dir(&mut self, dir: &Path) -> Result<Vec<FileId>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "s"))
            .collect();
        paths.sort();

        let texts: Vec<Result<String>> = paths
            .par_iter()
            .map(|path| fs::read_to_string(path).map_err(Error::from))
            .collect();

        let mut ids = Vec::with_capacity(paths.len());
        for (path, text) in paths.iter().zip(texts) {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            ids.push(self.add_file(&name, &text?)?);
        }
        info!("loaded {} source files from {}", ids.len(), dir.display());
        Ok(ids)
    }

    /// Number of loaded source files.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Immutable access to a source file.
    ///
    /// # Panics
    ///
    /// Panics on an unknown id.
    pub fn file(&self, id: FileId) -> &SourceFile {
        &self.files[id.index()]
    }

    /// Mutable access to a source file.
    ///
    /// This is a mutation point: it requires an open transaction and captures
    /// the file's pre-mutation snapshot.
    ///
    /// # Panics
    ///
    /// Panics when no transaction is open.
    pub fn file_mut(&mut self, id: FileId) -> &mut SourceFile {
        self.txn.capture(&self.files[id.index()]);
        &mut self.files[id.index()]
    }

    /// The data node behind a component id.
    ///
    /// # Panics
    ///
    /// Panics on detached access or a non-data component.
    pub fn data(&self, id: ComponentId) -> &Data {
        self.file(id.file()).data(id)
    }

    /// Resolves the named jump target held in one data-node argument.
    ///
    /// # Errors
    ///
    /// [`crate::Error::Malformed`] when the node lacks the argument,
    /// [`crate::Error::LabelNotFound`] when no file declares the label - a
    /// recoverable condition, distinct from a malformed value.
    pub fn resolve_target(&self, id: ComponentId, index: usize) -> Result<ComponentId> {
        let name = self.data(id).arg(index)?;
        self.labels.lookup(name)
    }

    /// Replaces one data-node argument's text, capturing undo state.
    ///
    /// # Panics
    ///
    /// Panics when no transaction is open - mutating tracked state outside a
    /// transaction boundary fails fast.
    pub fn set_arg(&mut self, id: ComponentId, index: usize, text: &str) -> Result<bool> {
        self.txn.capture(&self.files[id.file().index()]);
        self.files[id.file().index()].set_arg(id, index, text)
    }

    /// Adds a stream over an owned buffer.
    pub fn add_stream(&mut self, name: &str, bytes: Vec<u8>) -> StreamId {
        let id = StreamId::new(u32::try_from(self.streams.len()).expect("stream arena overflow"));
        self.streams.push(StreamStorage::from_bytes(name, bytes));
        id
    }

    /// Memory-maps a file as a stream.
    pub fn add_stream_file(&mut self, path: &Path) -> Result<StreamId> {
        let id = StreamId::new(u32::try_from(self.streams.len()).expect("stream arena overflow"));
        self.streams.push(StreamStorage::from_file(path)?);
        Ok(id)
    }

    /// Number of streams.
    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Immutable access to a stream.
    ///
    /// # Panics
    ///
    /// Panics on an unknown id.
    pub fn stream(&self, id: StreamId) -> &StreamStorage {
        &self.streams[id.index()]
    }

    /// Mutable access to a stream; a mutation point with the same transaction
    /// rules as [`Project::file_mut`].
    pub fn stream_mut(&mut self, id: StreamId) -> &mut StreamStorage {
        self.txn.capture(&self.streams[id.index()]);
        &mut self.streams[id.index()]
    }

    /// Writes one stream byte, capturing undo state.
    pub fn write_stream_u8(&mut self, id: StreamId, offset: usize, value: u8) -> Result<()> {
        self.txn.capture(&self.streams[id.index()]);
        self.streams[id.index()].write_u8(offset, value)
    }

    /// Writes one little-endian stream word, capturing undo state.
    pub fn write_stream_u16(&mut self, id: StreamId, offset: usize, value: u16) -> Result<()> {
        self.txn.capture(&self.streams[id.index()]);
        self.streams[id.index()].write_u16(offset, value)
    }

    /// Applies queued stream reloads on the owning thread. Returns how many
    /// streams were reloaded.
    pub fn process_reloads(&mut self) -> usize {
        self.streams
            .iter_mut()
            .map(|stream| stream.process_reloads())
            .filter(|&reloaded| reloaded)
            .count()
    }

    /// Stitches the "next data" chains of the given files end to end: the last
    /// data node of each file links to the first data node of the next.
    ///
    /// With the first file repeated at the end this expresses a cross-file
    /// cycle. Re-apply after structural edits, which rebuild intra-file links.
    pub fn chain_files(&mut self, order: &[FileId]) {
        for pair in order.windows(2) {
            let from = self.files[pair[0].index()].last_data();
            let to = self.files[pair[1].index()].first_data();
            if let (Some(from), Some(to)) = (from, to) {
                self.files[pair[0].index()].set_next_data(from, Some(to));
            }
        }
    }

    /// Opens a transaction (reentrant). Every mutation of tracked state must
    /// happen inside one.
    pub fn begin_transaction(&mut self, label: &str) {
        self.txn.begin_group(label);
    }

    /// Closes a transaction, pushing one undo step if anything was captured.
    pub fn end_transaction(&mut self) {
        self.txn.end_group();
    }

    /// Runs `f` inside a transaction.
    pub fn transaction<R>(&mut self, label: &str, f: impl FnOnce(&mut Self) -> R) -> R {
        self.begin_transaction(label);
        let result = f(self);
        self.end_transaction();
        result
    }

    /// The transaction manager, for depth queries and standalone use.
    pub fn transactions(&self) -> &TransactionManager {
        &self.txn
    }

    /// Undoes the most recent transaction. Returns `false` when there is
    /// nothing to undo.
    pub fn undo(&mut self) -> bool {
        let mut txn = std::mem::take(&mut self.txn);
        let result = txn.undo(self);
        self.txn = txn;
        result
    }

    /// Redoes the most recently undone transaction. Returns `false` when there
    /// is nothing to redo.
    pub fn redo(&mut self) -> bool {
        let mut txn = std::mem::take(&mut self.txn);
        let result = txn.redo(self);
        self.txn = txn;
        result
    }

    /// Builds the factory registry for snapshot-based reconstruction of this
    /// project's entity kinds, capturing the table handles the factories need.
    pub fn factory_registry(&self) -> FactoryRegistry {
        let mut registry = FactoryRegistry::new();
        let labels = self.labels.clone();
        registry.register(SourceFile::ENTITY_KIND, move |id, snapshot| {
            let index: u32 = id
                .key()
                .parse()
                .unwrap_or_else(|_| panic!("invalid source-file identity key '{}'", id.key()));
            Box::new(SourceFile::from_snapshot(
                FileId::new(index),
                snapshot,
                labels.clone(),
            ))
        });
        registry.register(StreamStorage::ENTITY_KIND, |_, snapshot| {
            Box::new(StreamStorage::from_snapshot(snapshot))
        });
        registry
    }
}

impl EntityStore for Project {
    fn entity_mut(&mut self, id: &EntityId) -> Option<&mut dyn Trackable> {
        if id.kind() == SourceFile::ENTITY_KIND {
            let index: usize = id.key().parse().ok()?;
            self.files.get_mut(index).map(|file| file as &mut dyn Trackable)
        } else if id.kind() == StreamStorage::ENTITY_KIND {
            self.streams
                .iter_mut()
                .find(|stream| stream.name() == id.key())
                .map(|stream| stream as &mut dyn Trackable)
        } else {
            None
        }
    }
}
