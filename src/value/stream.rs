//! Flat binary stream storage for stream-backed value references.
//!
//! This module provides [`StreamStorage`], the memory-backed buffer variant a
//! [`crate::value::ValueCodec`] can bind onto: raw resource blobs (tile maps, collision
//! tables, palettes) that live next to the textual sources. Files are memory-mapped
//! read-only on load and promoted to an owned copy on first write, so read-heavy projects
//! pay no upfront copy.
//!
//! # Reload marshaling
//!
//! Stream files may be rewritten by external tools while the editor runs. The watcher
//! that notices this runs on its own thread, and the project graph has a single logical
//! owner, so replacement contents are never applied directly: the watcher queues them
//! through a cloneable, [`Send`] [`ReloadHandle`], and the owning thread applies the
//! queue via [`crate::project::Project::process_reloads`]. That hand-off is the only
//! cross-thread interaction in the whole crate.

use std::fs::File;
use std::path::Path;
use std::sync::mpsc::{channel, Receiver, Sender};

use log::{debug, warn};
use memmap2::Mmap;
use serde::{Deserialize, Serialize};

use crate::{
    notify::ChangeEvent,
    transaction::{EntityId, Snapshot, Trackable},
    Error, Result,
};

/// Identifies one stream storage within a [`crate::project::Project`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(pub(crate) u32);

impl StreamId {
    /// Creates a stream id from a raw index.
    pub fn new(index: u32) -> Self {
        StreamId(index)
    }

    /// The raw arena index of this stream.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// The backing bytes: a read-only file mapping, or an owned buffer once the
/// stream has been written to (or reloaded).
enum StreamSource {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl StreamSource {
    fn bytes(&self) -> &[u8] {
        match self {
            StreamSource::Mapped(mmap) => mmap,
            StreamSource::Owned(bytes) => bytes,
        }
    }
}

/// The serialized shape of a stream's tracked state.
#[derive(Serialize, Deserialize)]
struct StreamState {
    name: String,
    bytes: Vec<u8>,
    modified: bool,
}

/// Queues replacement contents for a stream from any thread.
///
/// Cloneable and [`Send`]; the queued bytes are applied on the owning thread
/// by [`crate::project::Project::process_reloads`].
#[derive(Clone)]
pub struct ReloadHandle {
    sender: Sender<Vec<u8>>,
}

impl ReloadHandle {
    /// Queues replacement contents. Returns `false` if the stream no longer
    /// exists.
    pub fn submit(&self, bytes: Vec<u8>) -> bool {
        self.sender.send(bytes).is_ok()
    }
}

/// A flat byte buffer with byte/word little-endian access and change tracking.
pub struct StreamStorage {
    name: String,
    source: StreamSource,
    modified: bool,
    event: ChangeEvent,
    reload_sender: Sender<Vec<u8>>,
    reload_receiver: Receiver<Vec<u8>>,
}

impl StreamStorage {
    /// Entity-kind tag used for snapshots and the factory registry.
    pub const ENTITY_KIND: &'static str = "stream";

    fn with_source(name: &str, source: StreamSource) -> Self {
        let (reload_sender, reload_receiver) = channel();
        StreamStorage {
            name: name.to_string(),
            source,
            modified: false,
            event: ChangeEvent::new(),
            reload_sender,
            reload_receiver,
        }
    }

    /// Creates a stream over an owned buffer.
    pub fn from_bytes(name: &str, bytes: Vec<u8>) -> Self {
        StreamStorage::with_source(name, StreamSource::Owned(bytes))
    }

    /// Memory-maps a file read-only; the mapping is promoted to an owned copy
    /// on first write.
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // The mapping keeps `file` alive internally; the file must not be
        // truncated by another process while mapped.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|error| Error::Error(error.to_string()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(StreamStorage::with_source(&name, StreamSource::Mapped(mmap)))
    }

    /// Rebuilds a stream purely from its snapshot.
    ///
    /// # Panics
    ///
    /// Panics if the snapshot's shape does not match
    /// [`StreamStorage::ENTITY_KIND`].
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let state: StreamState = snapshot.decode(Self::ENTITY_KIND);
        let mut storage = StreamStorage::from_bytes(&state.name, state.bytes);
        storage.modified = state.modified;
        storage
    }

    /// The stream's name, used as its entity identity key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Length of the backing buffer in bytes.
    pub fn len(&self) -> usize {
        self.source.bytes().len()
    }

    /// True if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.source.bytes().is_empty()
    }

    /// The full backing bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.source.bytes()
    }

    /// True if any byte has been written since load or the last clean mark.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Clears the modified flag, typically after the stream has been rewritten
    /// to disk.
    pub fn mark_clean(&mut self) {
        self.modified = false;
    }

    /// The stream's change event; raised once per mutating operation.
    pub fn changed(&mut self) -> &mut ChangeEvent {
        &mut self.event
    }

    /// Reads one byte.
    ///
    /// # Errors
    ///
    /// [`crate::Error::OutOfBounds`] when `offset` is past the end.
    pub fn read_u8(&self, offset: usize) -> Result<u8> {
        self.source
            .bytes()
            .get(offset)
            .copied()
            .ok_or(Error::OutOfBounds)
    }

    /// Reads a little-endian word from two consecutive bytes.
    pub fn read_u16(&self, offset: usize) -> Result<u16> {
        let bytes = self.source.bytes();
        let low = *bytes.get(offset).ok_or(Error::OutOfBounds)?;
        let high = *bytes.get(offset + 1).ok_or(Error::OutOfBounds)?;
        Ok(u16::from_le_bytes([low, high]))
    }

    /// Writes one byte, promoting a mapping to an owned copy first.
    pub fn write_u8(&mut self, offset: usize, value: u8) -> Result<()> {
        if offset >= self.len() {
            return Err(Error::OutOfBounds);
        }
        self.promote();
        if let StreamSource::Owned(bytes) = &mut self.source {
            bytes[offset] = value;
        }
        self.modified = true;
        self.event.raise();
        Ok(())
    }

    /// Writes a little-endian word over two consecutive bytes.
    pub fn write_u16(&mut self, offset: usize, value: u16) -> Result<()> {
        if offset + 1 >= self.len() {
            return Err(Error::OutOfBounds);
        }
        self.promote();
        if let StreamSource::Owned(bytes) = &mut self.source {
            let [low, high] = value.to_le_bytes();
            bytes[offset] = low;
            bytes[offset + 1] = high;
        }
        self.modified = true;
        self.event.raise();
        Ok(())
    }

    /// A handle for queueing replacement contents from a watcher thread.
    pub fn reload_handle(&self) -> ReloadHandle {
        ReloadHandle {
            sender: self.reload_sender.clone(),
        }
    }

    /// Applies queued replacement contents, keeping only the newest when
    /// several are pending. Returns whether a reload was applied.
    ///
    /// Must be called from the owning thread; this is the marshaling point for
    /// the external file watcher.
    pub fn process_reloads(&mut self) -> bool {
        let mut newest = None;
        while let Ok(bytes) = self.reload_receiver.try_recv() {
            newest = Some(bytes);
        }
        let Some(bytes) = newest else {
            return false;
        };
        if self.modified {
            warn!(
                "stream '{}' reloaded from disk, discarding unsaved edits",
                self.name
            );
        }
        debug!("stream '{}' reloaded ({} bytes)", self.name, bytes.len());
        self.source = StreamSource::Owned(bytes);
        self.modified = false;
        self.event.raise();
        true
    }

    fn promote(&mut self) {
        if let StreamSource::Mapped(mmap) = &self.source {
            self.source = StreamSource::Owned(mmap.to_vec());
        }
    }
}

impl Trackable for StreamStorage {
    fn identity(&self) -> EntityId {
        EntityId::new(Self::ENTITY_KIND, &self.name)
    }

    fn capture(&self) -> Snapshot {
        Snapshot::encode(
            Self::ENTITY_KIND,
            &StreamState {
                name: self.name.clone(),
                bytes: self.source.bytes().to_vec(),
                modified: self.modified,
            },
        )
    }

    fn restore(&mut self, snapshot: &Snapshot) {
        let state: StreamState = snapshot.decode(Self::ENTITY_KIND);
        self.name = state.name;
        self.source = StreamSource::Owned(state.bytes);
        self.modified = state.modified;
        self.event.raise();
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
