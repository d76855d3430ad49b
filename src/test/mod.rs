//! Shared fixtures for unit tests.

use crate::{
    project::Project,
    source::ComponentId,
    value::{ValueCodec, ValueGroup, ValueKind, ValueWidth},
};

/// A chest record list in the shape domain code binds groups onto.
pub(crate) const CHEST_FILE: &str = "\
chestGroup5:
\tm_Chest $00, $05, $12, $34
\tm_Chest $45, $1a, $00, $01
";

/// Builds a project containing [`CHEST_FILE`] and returns the first chest node.
pub(crate) fn chest_project() -> (Project, ComponentId) {
    let mut project = Project::new();
    project.define_macro("m_Chest", 4);
    let file = project
        .add_file("chests.s", CHEST_FILE)
        .expect("fixture parses");
    let node = project.file(file).first_data().expect("fixture has data");
    (project, node)
}

/// Binds the canonical chest record group over a chest node: Y/X packed as
/// high/low nibble of byte 0, then room, treasure id and subid bytes.
pub(crate) fn chest_group(project: &Project, node: ComponentId) -> ValueGroup {
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
