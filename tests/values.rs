//! Integration tests for stream-backed value access and reload marshaling.

use asmedit::prelude::*;

fn stream_project(bytes: Vec<u8>) -> (Project, StreamId) {
    let mut project = Project::new();
    let stream = project.add_stream("layout.bin", bytes);
    (project, stream)
}

#[test]
fn stream_words_combine_two_bytes_little_endian() {
    let (project, stream) = stream_project(vec![0x34, 0x12, 0xff]);
    let word = ValueCodec::new_stream(&project, stream, 0, ValueKind::Int, ValueWidth::Word)
        .expect("fits");
    assert_eq!(word.get_int(&project).unwrap(), 0x1234);
}

#[test]
fn stream_bit_writes_preserve_neighbouring_bits() {
    let (mut project, stream) = stream_project(vec![0b1010_0101]);
    let mut mid =
        ValueCodec::new_stream(&project, stream, 0, ValueKind::Int, ValueWidth::bits(2, 5))
            .expect("fits");

    assert_eq!(mid.get_int(&project).unwrap(), 0b1001);

    project.begin_transaction("flip");
    mid.set_int(&mut project, 0b0110).unwrap();
    project.end_transaction();

    assert_eq!(
        project.stream(stream).read_u8(0).unwrap(),
        0b1001_1001,
        "bits outside [2,5] are untouched"
    );
}

#[test]
fn stream_codecs_validate_bounds_at_construction() {
    let (project, stream) = stream_project(vec![0x00, 0x11]);
    assert!(ValueCodec::new_stream(&project, stream, 1, ValueKind::Int, ValueWidth::Byte).is_ok());
    assert!(matches!(
        ValueCodec::new_stream(&project, stream, 1, ValueKind::Int, ValueWidth::Word),
        Err(Error::OutOfBounds)
    ));
}

#[test]
fn stream_edits_are_undoable() {
    let (mut project, stream) = stream_project(vec![0x10, 0x20]);
    let mut byte =
        ValueCodec::new_stream(&project, stream, 1, ValueKind::Int, ValueWidth::Byte).unwrap();

    project.begin_transaction("tweak");
    byte.set_int(&mut project, 0x99).unwrap();
    project.end_transaction();
    assert_eq!(project.stream(stream).as_bytes(), &[0x10, 0x99]);
    assert!(project.stream(stream).is_modified());

    assert!(project.undo());
    assert_eq!(project.stream(stream).as_bytes(), &[0x10, 0x20]);
    assert!(!project.stream(stream).is_modified());

    assert!(project.redo());
    assert_eq!(project.stream(stream).as_bytes(), &[0x10, 0x99]);
}

#[test]
fn watcher_reloads_marshal_onto_the_owning_thread() {
    let (mut project, stream) = stream_project(vec![0x01]);
    let handle = project.stream(stream).reload_handle();

    let watcher = std::thread::spawn(move || {
        handle.submit(vec![0x02, 0x03]);
    });
    watcher.join().unwrap();

    // Nothing applied until the owning thread asks.
    assert_eq!(project.stream(stream).as_bytes(), &[0x01]);
    assert_eq!(project.process_reloads(), 1);
    assert_eq!(project.stream(stream).as_bytes(), &[0x02, 0x03]);
}

#[test]
fn clamping_applies_before_the_write() {
    let (mut project, stream) = stream_project(vec![0x00]);
    let mut nibble =
        ValueCodec::new_stream(&project, stream, 0, ValueKind::Int, ValueWidth::bits(0, 3))
            .unwrap();

    project.begin_transaction("clamp");
    nibble.set_int(&mut project, 0x1f).unwrap();
    project.end_transaction();

    assert_eq!(
        nibble.get_int(&project).unwrap(),
        0x0f,
        "a get after an out-of-range set returns exactly the maximum"
    );
}
