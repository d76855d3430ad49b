//! Integration tests for atomic operations, undo/redo symmetry and
//! snapshot-based reconstruction.

use std::cell::Cell;
use std::rc::Rc;

use asmedit::prelude::*;
use serde::{Deserialize, Serialize};

const CHEST_LINE: &str = "m_Chest $00, $05, $12, $34\n";

fn chest_project() -> (Project, FileId, ComponentId) {
    let mut project = Project::new();
    project.define_macro("m_Chest", 4);
    let file = project.add_file("chests.s", CHEST_LINE).expect("parses");
    let node = project.file(file).first_data().unwrap();
    (project, file, node)
}

fn chest_record(project: &Project, node: ComponentId) -> ValueGroup {
    ValueGroup::new(vec![
        (
            "Y".to_string(),
            ValueCodec::new_data(project, node, 0, ValueKind::Int, ValueWidth::bits(4, 7)).unwrap(),
        ),
        (
            "X".to_string(),
            ValueCodec::new_data(project, node, 0, ValueKind::Int, ValueWidth::bits(0, 3)).unwrap(),
        ),
        (
            "Room".to_string(),
            ValueCodec::new_data(project, node, 1, ValueKind::Int, ValueWidth::Byte).unwrap(),
        ),
        (
            "ID".to_string(),
            ValueCodec::new_data(project, node, 2, ValueKind::Int, ValueWidth::Byte).unwrap(),
        ),
        (
            "SubID".to_string(),
            ValueCodec::new_data(project, node, 3, ValueKind::Int, ValueWidth::Byte).unwrap(),
        ),
    ])
    .unwrap()
}

/// The full chest scenario: nibble reads, one atomic notification, undo of the
/// treasure byte's prior encoding.
#[test]
fn chest_record_edit_notifies_once_and_undoes_cleanly() {
    let (mut project, file, node) = chest_project();
    let mut record = chest_record(&project, node);

    // Y and X are packed as high/low nibble of byte 0.
    assert_eq!(record.get_int(&project, "Y").unwrap(), 0);
    assert_eq!(record.get_int(&project, "X").unwrap(), 0);

    let fired = Rc::new(Cell::new(0u32));
    let counter = fired.clone();
    record.changed().subscribe(move || counter.set(counter.get() + 1));

    project.begin_transaction("edit treasure");
    record.atomic(|r| {
        r.set_int(&mut project, "ID", 0x0e).unwrap();
        r.set_int(&mut project, "SubID", 0x02).unwrap();
    });
    project.end_transaction();

    assert_eq!(fired.get(), 1, "two field sets, one atomic block, one notification");
    assert_eq!(
        project.file(file).render(),
        "m_Chest $00, $05, $0e, $02\n"
    );

    assert!(project.undo());
    assert_eq!(
        project.file(file).render(),
        CHEST_LINE,
        "undo restores the prior encoding of every argument"
    );
    assert_eq!(record.get_int(&project, "ID").unwrap(), 0x12);
}

#[test]
fn m_mutations_then_m_undos_restore_everything() {
    let (mut project, file, node) = chest_project();
    let mut record = chest_record(&project, node);

    let edits: [(&str, i64); 3] = [("Room", 0x3f), ("ID", 0x20), ("Y", 0x7)];
    for (name, value) in edits {
        project.begin_transaction(name);
        record.set_int(&mut project, name, value).unwrap();
        project.end_transaction();
    }
    let edited = project.file(file).render();
    assert_eq!(edited, "m_Chest $70, $3f, $20, $34\n");

    for _ in 0..edits.len() {
        assert!(project.undo());
    }
    assert_eq!(project.file(file).render(), CHEST_LINE);
    assert!(!project.undo(), "undo stack is exhausted");

    for _ in 0..edits.len() {
        assert!(project.redo());
    }
    assert_eq!(project.file(file).render(), edited);
    assert!(!project.redo(), "redo stack is exhausted");
}

#[test]
fn new_edits_clear_the_redo_stack() {
    let (mut project, _, node) = chest_project();
    let mut record = chest_record(&project, node);

    project.transaction("first", |p| record.set_int(p, "ID", 0x01).unwrap());
    assert!(project.undo());

    project.transaction("second", |p| record.set_int(p, "ID", 0x02).unwrap());
    assert!(!project.redo(), "diverging edit invalidates redo history");
}

#[test]
fn nested_transactions_coalesce_into_one_undo_step() {
    let (mut project, file, node) = chest_project();
    let mut record = chest_record(&project, node);

    project.begin_transaction("outer");
    record.set_int(&mut project, "ID", 0x01).unwrap();
    project.begin_transaction("inner");
    record.set_int(&mut project, "SubID", 0x02).unwrap();
    project.end_transaction();
    record.set_int(&mut project, "Room", 0x03).unwrap();
    project.end_transaction();

    assert_eq!(project.transactions().undo_depth(), 1);
    assert!(project.undo());
    assert_eq!(project.file(file).render(), CHEST_LINE);
}

#[test]
#[should_panic(expected = "outside of a transaction boundary")]
fn mutating_outside_a_transaction_fails_fast() {
    let (mut project, _, node) = chest_project();
    let _ = project.set_arg(node, 2, "$ff");
}

#[test]
fn a_file_rebuilt_from_its_snapshot_is_observationally_equivalent() {
    let (mut project, file, node) = chest_project();
    let mut record = chest_record(&project, node);
    project.transaction("edit", |p| record.set_int(p, "ID", 0x2a).unwrap());

    let live = project.file(file);
    let snapshot = live.capture();
    let identity = live.identity();

    let registry = project.factory_registry();
    let rebuilt = registry.reconstruct(&identity, &snapshot);
    let rebuilt = rebuilt
        .as_any()
        .downcast_ref::<SourceFile>()
        .expect("factory yields a source file");

    assert_eq!(rebuilt.render(), project.file(file).render());
    assert_eq!(rebuilt.is_modified(), project.file(file).is_modified());
    assert_eq!(rebuilt.component_count(), project.file(file).component_count());
}

#[test]
fn reconstruction_rederives_label_entries() {
    let mut project = Project::new();
    let file = project.add_file("rooms.s", "roomEntry:\n.db $01\n").unwrap();

    let snapshot = project.file(file).capture();
    let identity = project.file(file).identity();

    // A second project plays the role of the replica.
    let replica = Project::new();
    let registry = replica.factory_registry();
    let rebuilt = registry.reconstruct(&identity, &snapshot);
    let rebuilt = rebuilt.as_any().downcast_ref::<SourceFile>().unwrap();

    assert_eq!(rebuilt.render(), "roomEntry:\n.db $01\n");
    assert!(
        replica.labels().contains("roomEntry"),
        "the post-rebuild hook repopulates the replica's label table"
    );
}

#[test]
#[should_panic(expected = "snapshot shape mismatch")]
fn shape_mismatched_restores_fail_fast() {
    let (mut project, file, _) = chest_project();
    let stream = project.add_stream("layout.bin", vec![0x00]);

    let wrong = project.stream(stream).capture();
    project.begin_transaction("sabotage");
    let target = project.file_mut(file);
    project_restore(target, &wrong);
}

// Split out so the panic unwinds through as little test scaffolding as possible.
fn project_restore(file: &mut SourceFile, snapshot: &Snapshot) {
    file.restore(snapshot);
}

// ------------------------------------------------------------------------------------------------
// Domain-entity tracking: a minimal record type outside the project's own kinds
// ------------------------------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct MarkerState {
    value: i64,
}

/// A tiny trackable entity with one undoable field and one derived cache.
struct Marker {
    key: String,
    value: i64,
    doubled: i64,
}

impl Marker {
    const KIND: &'static str = "marker";

    fn new(key: &str, value: i64) -> Self {
        let mut marker = Marker {
            key: key.to_string(),
            value,
            doubled: 0,
        };
        marker.rederive();
        marker
    }

    fn from_snapshot(id: &EntityId, snapshot: &Snapshot) -> Self {
        let state: MarkerState = snapshot.decode(Self::KIND);
        Marker {
            key: id.key().to_string(),
            value: state.value,
            doubled: 0,
        }
    }
}

impl Trackable for Marker {
    fn identity(&self) -> EntityId {
        EntityId::new(Self::KIND, &self.key)
    }

    fn capture(&self) -> Snapshot {
        Snapshot::encode(Self::KIND, &MarkerState { value: self.value })
    }

    fn restore(&mut self, snapshot: &Snapshot) {
        let state: MarkerState = snapshot.decode(Self::KIND);
        self.value = state.value;
    }

    fn rederive(&mut self) {
        self.doubled = self.value * 2;
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

struct World {
    markers: Vec<Marker>,
}

impl EntityStore for World {
    fn entity_mut(&mut self, id: &EntityId) -> Option<&mut dyn Trackable> {
        if id.kind() != Marker::KIND {
            return None;
        }
        self.markers
            .iter_mut()
            .find(|marker| marker.key == id.key())
            .map(|marker| marker as &mut dyn Trackable)
    }
}

#[test]
fn external_entities_participate_in_undo_and_reconstruction() {
    let mut world = World {
        markers: vec![Marker::new("spawn", 4)],
    };
    let mut transactions = TransactionManager::new();

    transactions.begin_group("move spawn");
    transactions.capture(&world.markers[0]);
    transactions.capture(&world.markers[0]); // lazy capture: second call is a no-op
    world.markers[0].value = 11;
    world.markers[0].rederive();
    transactions.end_group();

    assert!(transactions.undo(&mut world));
    assert_eq!(world.markers[0].value, 4);
    assert_eq!(world.markers[0].doubled, 8, "caches rederive after restore");

    assert!(transactions.redo(&mut world));
    assert_eq!(world.markers[0].value, 11);
    assert_eq!(world.markers[0].doubled, 22);

    // Replica path: rebuild purely from (identity, snapshot).
    let mut registry = FactoryRegistry::new();
    registry.register(Marker::KIND, |id, snapshot| {
        Box::new(Marker::from_snapshot(id, snapshot))
    });
    let rebuilt = registry.reconstruct(&world.markers[0].identity(), &world.markers[0].capture());
    let rebuilt = rebuilt.as_any().downcast_ref::<Marker>().unwrap();
    assert_eq!(rebuilt.value, 11);
    assert_eq!(rebuilt.doubled, 22, "reconstruct runs the post-rebuild hook");
}
