//! Source files: ordered component arenas with lossless rendering.
//!
//! This module provides [`crate::source::SourceFile`], the owner of every component parsed
//! out of (or inserted into) one source file. Components live in an arena of stable slots;
//! sequence order is kept as doubly-linked slot indices, which gives constant-time
//! next/previous traversal and constant-time insertion next to a reference component.
//!
//! # Architecture
//!
//! - **Stable identity** - a [`crate::source::ComponentId`] stays valid for the lifetime of
//!   the project. Detaching a component vacates its slot permanently; stale access through
//!   the old id fails fast instead of silently reading a neighbour.
//! - **Exclusive ownership** - a component is owned by exactly one file at a time.
//!   [`SourceFile::detach`] returns the component by value so it can be re-attached to a
//!   different file (or dropped).
//! - **Lossless rendering** - [`SourceFile::render`] concatenates every component's exact
//!   source text in sequence order. With zero edits this reproduces the loaded bytes
//!   exactly; after edits, only the mutated tokens differ.
//! - **Dirtiness** - any textual or structural mutation marks the component and the file
//!   modified and raises the file's change event. The modified flag is the only signal
//!   persistence uses to decide what to rewrite.
//!
//! # Undo integration
//!
//! `SourceFile` implements [`crate::transaction::Trackable`]: its component arena, order
//! links and modified flag are the captured state. The label table entries it contributes
//! are *not* part of the snapshot; they are re-derived by the post-restoration hook.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    notify::ChangeEvent,
    project::LabelTable,
    source::{Component, ComponentFlags, ComponentId, ComponentKind, Data, FileId},
    transaction::{EntityId, Snapshot, Trackable},
    Result,
};

/// The serialized shape of a source file's tracked state.
#[derive(Serialize, Deserialize)]
struct FileState {
    name: String,
    slots: Vec<Option<Component>>,
    head: Option<u32>,
    tail: Option<u32>,
    modified: bool,
}

/// One parsed source file: an arena of components plus their sequence order.
///
/// Obtained from [`crate::project::Project::add_file`] (or rebuilt from a
/// snapshot via the factory registry); never constructed free-standing, since
/// label registration requires the project's label table.
#[derive(Debug)]
pub struct SourceFile {
    id: FileId,
    name: String,
    slots: Vec<Option<Component>>,
    head: Option<u32>,
    tail: Option<u32>,
    modified: bool,
    labels: Arc<LabelTable>,
    event: ChangeEvent,
}

impl SourceFile {
    /// Entity-kind tag used for snapshots and the factory registry.
    pub const ENTITY_KIND: &'static str = "source-file";

    pub(crate) fn new(id: FileId, name: &str, labels: Arc<LabelTable>) -> Self {
        SourceFile {
            id,
            name: name.to_string(),
            slots: Vec::new(),
            head: None,
            tail: None,
            modified: false,
            labels,
            event: ChangeEvent::new(),
        }
    }

    /// Rebuilds a live source file purely from its snapshot plus identity.
    ///
    /// The caller (normally the factory registry) is responsible for invoking
    /// [`Trackable::rederive`] afterwards to repopulate the label table.
    ///
    /// # Panics
    ///
    /// Panics if the snapshot's shape does not match [`SourceFile::ENTITY_KIND`];
    /// an incompatible snapshot restore is an unrecoverable consistency failure.
    pub fn from_snapshot(id: FileId, snapshot: &Snapshot, labels: Arc<LabelTable>) -> Self {
        let state: FileState = snapshot.decode(Self::ENTITY_KIND);
        SourceFile {
            id,
            name: state.name,
            slots: state.slots,
            head: state.head,
            tail: state.tail,
            modified: state.modified,
            labels,
            event: ChangeEvent::new(),
        }
    }

    /// This file's project-wide id.
    pub fn id(&self) -> FileId {
        self.id
    }

    /// The file's name (normally its project-relative path).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True if any component has been mutated since load or the last clean mark.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// The file's change event; raised once per mutating operation.
    pub fn changed(&mut self) -> &mut ChangeEvent {
        &mut self.event
    }

    /// Number of live (attached) components.
    pub fn component_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Iterates components in sequence order.
    pub fn iter(&self) -> Components<'_> {
        Components {
            file: self,
            cursor: self.head,
        }
    }

    /// First component in sequence order.
    pub fn first(&self) -> Option<ComponentId> {
        self.head.map(|slot| self.make_id(slot))
    }

    /// Last component in sequence order.
    pub fn last(&self) -> Option<ComponentId> {
        self.tail.map(|slot| self.make_id(slot))
    }

    /// The component following `id`, in constant time.
    pub fn next_of(&self, id: ComponentId) -> Option<ComponentId> {
        self.occupied(id).next.map(|slot| self.make_id(slot))
    }

    /// The component preceding `id`, in constant time.
    pub fn prev_of(&self, id: ComponentId) -> Option<ComponentId> {
        self.occupied(id).prev.map(|slot| self.make_id(slot))
    }

    /// Immutable access to a component.
    ///
    /// # Panics
    ///
    /// Panics if `id` belongs to a different file or if the slot has been
    /// vacated by [`SourceFile::detach`] - accessing a detached component is an
    /// internal-consistency failure.
    pub fn component(&self, id: ComponentId) -> &Component {
        self.occupied(id)
    }

    /// The data payload of a data component.
    ///
    /// # Panics
    ///
    /// Panics on detached access or if the component is not a data node;
    /// codecs validate the kind at construction, so a mismatch here means the
    /// arena was corrupted.
    pub fn data(&self, id: ComponentId) -> &Data {
        self.occupied(id)
            .as_data()
            .unwrap_or_else(|| panic!("component {id} is not a data node"))
    }

    /// First data component in sequence order.
    pub fn first_data(&self) -> Option<ComponentId> {
        self.iter()
            .find(|(_, c)| c.as_data().is_some())
            .map(|(id, _)| id)
    }

    /// Last data component in sequence order.
    pub fn last_data(&self) -> Option<ComponentId> {
        let mut last = None;
        for (id, component) in self.iter() {
            if component.as_data().is_some() {
                last = Some(id);
            }
        }
        last
    }

    /// Appends a component at the end of the sequence without marking the file
    /// modified; this is the construction path used by the parser.
    pub(crate) fn push_back(&mut self, component: Component) -> ComponentId {
        let slot = self.alloc(component);
        self.link(slot, self.tail, None);
        self.make_id(slot)
    }

    /// Inserts a component after `anchor`, marking the file modified.
    pub fn insert_after(&mut self, anchor: ComponentId, component: Component) -> ComponentId {
        let anchor_slot = self.check(anchor);
        let next = self.occupied(anchor).next;
        let slot = self.alloc(component);
        self.link(slot, Some(anchor_slot), next);
        self.finish_structural_edit();
        self.make_id(slot)
    }

    /// Inserts a component before `anchor`, marking the file modified.
    pub fn insert_before(&mut self, anchor: ComponentId, component: Component) -> ComponentId {
        let anchor_slot = self.check(anchor);
        let prev = self.occupied(anchor).prev;
        let slot = self.alloc(component);
        self.link(slot, prev, Some(anchor_slot));
        self.finish_structural_edit();
        self.make_id(slot)
    }

    /// Appends a component at the end of the sequence, marking the file modified.
    pub fn append(&mut self, component: Component) -> ComponentId {
        let slot = self.alloc(component);
        self.link(slot, self.tail, None);
        self.finish_structural_edit();
        self.make_id(slot)
    }

    /// Detaches a component, returning it by value for re-attachment elsewhere.
    ///
    /// The slot stays permanently vacant; any later access through the old id
    /// fails fast. The returned component carries the `DETACHED` flag until it
    /// is attached again.
    ///
    /// # Panics
    ///
    /// Panics on a stale id (double detach) or an id from another file.
    pub fn detach(&mut self, id: ComponentId) -> Component {
        let slot = self.check(id);
        let (prev, next) = {
            let comp = self.occupied(id);
            (comp.prev, comp.next)
        };
        match prev {
            Some(p) => self.slot_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slot_mut(n).prev = prev,
            None => self.tail = prev,
        }
        let mut component = self.slots[slot as usize]
            .take()
            .expect("occupied() already checked the slot");
        component.prev = None;
        component.next = None;
        component.flags |= ComponentFlags::DETACHED;
        self.finish_structural_edit();
        component
    }

    /// Renders the file's full text by concatenating every component in
    /// sequence order. With zero edits this reproduces the loaded bytes
    /// exactly.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (_, component) in self.iter() {
            component.render_into(&mut out);
        }
        out
    }

    /// Replaces the token text of one data-node argument.
    ///
    /// No-ops (returning `false`) when the text is unchanged; otherwise marks
    /// the component and file dirty and raises the file's change event.
    pub(crate) fn set_arg(&mut self, id: ComponentId, index: usize, text: &str) -> Result<bool> {
        let slot = self.check(id);
        let component = self.slots[slot as usize]
            .as_mut()
            .unwrap_or_else(|| panic!("access to detached component {id}"));
        let data = component
            .as_data_mut()
            .unwrap_or_else(|| panic!("component {id} is not a data node"));
        let changed = data.set_arg_text(index, text)?;
        if changed {
            component.flags |= ComponentFlags::MODIFIED;
            self.modified = true;
            self.event.raise();
        }
        Ok(changed)
    }

    /// Marks a component (and therefore the file) as modified.
    pub fn mark_modified(&mut self, id: ComponentId) {
        let slot = self.check(id);
        let component = self.slots[slot as usize]
            .as_mut()
            .unwrap_or_else(|| panic!("access to detached component {id}"));
        component.flags |= ComponentFlags::MODIFIED;
        self.modified = true;
        self.event.raise();
    }

    /// Clears the file-level and per-component modified flags, typically after
    /// the file has been rewritten to disk.
    pub fn mark_clean(&mut self) {
        for slot in self.slots.iter_mut().flatten() {
            slot.flags -= ComponentFlags::MODIFIED;
        }
        self.modified = false;
    }

    /// Rebuilds the intra-file "next data" chain: every data node points at the
    /// next data node in sequence order, skipping other component kinds. The
    /// final node's link is cleared; cross-file stitching is re-applied by
    /// [`crate::project::Project::chain_files`].
    pub fn rebuild_data_links(&mut self) {
        let data_slots: Vec<u32> = {
            let mut slots = Vec::new();
            let mut cursor = self.head;
            while let Some(slot) = cursor {
                let comp = self.slots[slot as usize]
                    .as_ref()
                    .expect("order links only reference occupied slots");
                if comp.as_data().is_some() {
                    slots.push(slot);
                }
                cursor = comp.next;
            }
            slots
        };
        for window in 0..data_slots.len() {
            let next = data_slots
                .get(window + 1)
                .map(|slot| self.make_id(*slot));
            let slot = data_slots[window] as usize;
            if let Some(data) = self.slots[slot].as_mut().and_then(Component::as_data_mut) {
                data.set_next_data(next);
            }
        }
    }

    pub(crate) fn set_next_data(&mut self, id: ComponentId, next: Option<ComponentId>) {
        let slot = self.check(id);
        if let Some(data) = self.slots[slot as usize]
            .as_mut()
            .and_then(Component::as_data_mut)
        {
            data.set_next_data(next);
        }
    }

    /// Registers every label component into the project label table.
    pub(crate) fn register_labels(&self) {
        for (id, component) in self.iter() {
            if let ComponentKind::Label(label) = component.kind() {
                self.labels.register(&label.name, id);
            }
        }
    }

    fn make_id(&self, slot: u32) -> ComponentId {
        ComponentId { file: self.id, slot }
    }

    fn check(&self, id: ComponentId) -> u32 {
        assert!(
            id.file == self.id,
            "component {id} does not belong to {}",
            self.id
        );
        assert!(
            (id.slot as usize) < self.slots.len(),
            "component {id} is out of range"
        );
        id.slot
    }

    fn occupied(&self, id: ComponentId) -> &Component {
        let slot = self.check(id);
        self.slots[slot as usize]
            .as_ref()
            .unwrap_or_else(|| panic!("access to detached component {id}"))
    }

    fn slot_mut(&mut self, slot: u32) -> &mut Component {
        self.slots[slot as usize]
            .as_mut()
            .expect("order links only reference occupied slots")
    }

    fn alloc(&mut self, mut component: Component) -> u32 {
        component.flags -= ComponentFlags::DETACHED;
        let slot = u32::try_from(self.slots.len()).expect("component arena overflow");
        self.slots.push(Some(component));
        slot
    }

    fn link(&mut self, slot: u32, prev: Option<u32>, next: Option<u32>) {
        {
            let comp = self.slot_mut(slot);
            comp.prev = prev;
            comp.next = next;
        }
        match prev {
            Some(p) => self.slot_mut(p).next = Some(slot),
            None => self.head = Some(slot),
        }
        match next {
            Some(n) => self.slot_mut(n).prev = Some(slot),
            None => self.tail = Some(slot),
        }
    }

    fn finish_structural_edit(&mut self) {
        self.rebuild_data_links();
        self.modified = true;
        self.event.raise();
    }
}

impl Trackable for SourceFile {
    fn identity(&self) -> EntityId {
        EntityId::new(Self::ENTITY_KIND, &self.id.0.to_string())
    }

    fn capture(&self) -> Snapshot {
        Snapshot::encode(
            Self::ENTITY_KIND,
            &FileState {
                name: self.name.clone(),
                slots: self.slots.clone(),
                head: self.head,
                tail: self.tail,
                modified: self.modified,
            },
        )
    }

    fn restore(&mut self, snapshot: &Snapshot) {
        let state: FileState = snapshot.decode(Self::ENTITY_KIND);
        self.name = state.name;
        self.slots = state.slots;
        self.head = state.head;
        self.tail = state.tail;
        self.modified = state.modified;
        self.event.raise();
    }

    fn rederive(&mut self) {
        self.labels.remove_file(self.id);
        self.register_labels();
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Iterator over a file's components in sequence order.
pub struct Components<'a> {
    file: &'a SourceFile,
    cursor: Option<u32>,
}

impl<'a> Iterator for Components<'a> {
    type Item = (ComponentId, &'a Component);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.cursor?;
        let component = self.file.slots[slot as usize]
            .as_ref()
            .expect("order links only reference occupied slots");
        self.cursor = component.next;
        Some((self.file.make_id(slot), component))
    }
}
