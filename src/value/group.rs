//! Value reference groups: named, ordered codec collections.
//!
//! A [`ValueGroup`] represents one logical record - the fields of a chest, a warp, an
//! animation frame - as an ordered list of named [`crate::value::ValueCodec`]s. It adds
//! name-indexed access, an aggregated change event, and atomic operations that coalesce
//! any number of member edits into at most one group notification.
//!
//! Members are defensively cloned at construction, so a group never aliases a codec (or
//! its observer list) owned by anyone else.

use crate::{notify::ChangeEvent, project::Project, value::{ValueCodec, ValueKind}, Result};

/// What one member contributes during [`ValueGroup::copy_from`].
enum Transfer {
    Text(String),
    Value(i64),
}

/// An ordered, uniquely named collection of codecs forming one logical record.
#[derive(Debug)]
pub struct ValueGroup {
    members: Vec<(String, ValueCodec)>,
    event: ChangeEvent,
}

impl ValueGroup {
    /// Creates a group from named codecs, cloning each one defensively.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] on a duplicate member name.
    pub fn new(members: Vec<(String, ValueCodec)>) -> Result<Self> {
        for (i, (name, _)) in members.iter().enumerate() {
            if members[..i].iter().any(|(other, _)| other == name) {
                return Err(malformed_error!("duplicate value reference name '{}'", name));
            }
        }
        let members = members
            .into_iter()
            .map(|(name, codec)| (name, codec.clone()))
            .collect();
        Ok(ValueGroup {
            members,
            event: ChangeEvent::new(),
        })
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True if the group has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|(name, _)| name.as_str())
    }

    /// Members in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ValueCodec)> {
        self.members.iter().map(|(name, codec)| (name.as_str(), codec))
    }

    /// Name-indexed member lookup (linear; groups are small).
    ///
    /// # Errors
    ///
    /// [`crate::Error::ReferenceNotFound`] for unknown names.
    pub fn codec(&self, name: &str) -> Result<&ValueCodec> {
        self.members
            .iter()
            .find(|(member, _)| member == name)
            .map(|(_, codec)| codec)
            .ok_or_else(|| crate::Error::ReferenceNotFound(name.to_string()))
    }

    fn codec_mut(&mut self, name: &str) -> Result<&mut ValueCodec> {
        self.members
            .iter_mut()
            .find(|(member, _)| member == name)
            .map(|(_, codec)| codec)
            .ok_or_else(|| crate::Error::ReferenceNotFound(name.to_string()))
    }

    /// The group's aggregated change event: raised once per mutating group
    /// operation, or once per atomic block regardless of how many members
    /// changed inside it.
    pub fn changed(&mut self) -> &mut ChangeEvent {
        &mut self.event
    }

    /// Reads a member as an integer.
    pub fn get_int(&self, project: &Project, name: &str) -> Result<i64> {
        self.codec(name)?.get_int(project)
    }

    /// Reads a member as display text.
    pub fn get_string(&self, project: &Project, name: &str) -> Result<String> {
        self.codec(name)?.get_string(project)
    }

    /// Writes a member as an integer, raising the group event when the member
    /// actually changed.
    pub fn set_int(&mut self, project: &mut Project, name: &str, value: i64) -> Result<bool> {
        let changed = self.codec_mut(name)?.set_int(project, value)?;
        if changed {
            self.event.raise();
        }
        Ok(changed)
    }

    /// Writes a member from text, raising the group event when the member
    /// actually changed.
    pub fn set_string(&mut self, project: &mut Project, name: &str, text: &str) -> Result<bool> {
        let changed = self.codec_mut(name)?.set_string(project, text)?;
        if changed {
            self.event.raise();
        }
        Ok(changed)
    }

    /// Opens an atomic operation: group notifications queue until the matching
    /// [`ValueGroup::end_atomic`] and flush as at most one delivery. Reentrant.
    pub fn begin_atomic(&mut self) {
        self.event.suppress();
    }

    /// Closes an atomic operation, flushing at most one queued notification
    /// when the outermost bracket closes.
    pub fn end_atomic(&mut self) {
        self.event.release();
    }

    /// Runs `f` inside an atomic operation.
    pub fn atomic<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.begin_atomic();
        let result = f(self);
        self.end_atomic();
        result
    }

    /// Atomically overwrites every member's value, by name, from a compatible
    /// group - the wholesale record-duplication operation.
    ///
    /// # Errors
    ///
    /// [`crate::Error::ReferenceNotFound`] when `other` carries a name this
    /// group lacks; per-member read/write errors propagate without touching
    /// sibling members.
    pub fn copy_from(&mut self, project: &mut Project, other: &ValueGroup) -> Result<()> {
        let mut transfers = Vec::with_capacity(other.members.len());
        for (name, codec) in &other.members {
            let transfer = if codec.kind() == ValueKind::String {
                Transfer::Text(codec.get_string(project)?)
            } else {
                Transfer::Value(codec.get_int(project)?)
            };
            transfers.push((name.clone(), transfer));
        }

        self.begin_atomic();
        let mut result = Ok(());
        for (name, transfer) in transfers {
            let outcome = match transfer {
                Transfer::Text(text) => self.set_string(project, &name, &text).map(|_| ()),
                Transfer::Value(value) => self.set_int(project, &name, value).map(|_| ()),
            };
            if let Err(error) = outcome {
                result = Err(error);
                break;
            }
        }
        self.end_atomic();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{chest_group, chest_project};
    use std::cell::Cell;
    use std::rc::Rc;

    fn notification_counter(group: &mut ValueGroup) -> Rc<Cell<u32>> {
        let count = Rc::new(Cell::new(0));
        let inner = count.clone();
        group.changed().subscribe(move || inner.set(inner.get() + 1));
        count
    }

    #[test]
    fn duplicate_member_names_are_rejected() {
        let (project, node) = chest_project();
        let codec =
            ValueCodec::new_data(&project, node, 0, ValueKind::Int, crate::value::ValueWidth::Byte)
                .unwrap();
        let err = ValueGroup::new(vec![
            ("Y".to_string(), codec.clone()),
            ("Y".to_string(), codec),
        ])
        .unwrap_err();
        assert!(matches!(err, crate::Error::Malformed { .. }));
    }

    #[test]
    fn unknown_names_fail_with_reference_not_found() {
        let (project, node) = chest_project();
        let group = chest_group(&project, node);
        assert!(matches!(
            group.codec("NoSuchField"),
            Err(crate::Error::ReferenceNotFound(_))
        ));
    }

    #[test]
    fn members_never_alias_the_originals() {
        let (mut project, node) = chest_project();
        let mut original =
            ValueCodec::new_data(&project, node, 2, ValueKind::Int, crate::value::ValueWidth::Byte)
                .unwrap();
        let outside = Rc::new(Cell::new(0u32));
        let inner = outside.clone();
        original.changed().subscribe(move || inner.set(inner.get() + 1));

        let mut group = ValueGroup::new(vec![("ID".to_string(), original)]).unwrap();
        project.begin_transaction("edit");
        group.set_int(&mut project, "ID", 0x77).unwrap();
        project.end_transaction();

        assert_eq!(
            outside.get(),
            0,
            "group members are defensive clones; outside subscriptions never fire"
        );
    }

    #[test]
    fn each_changing_set_outside_atomic_notifies_once() {
        let (mut project, node) = chest_project();
        let mut group = chest_group(&project, node);
        let count = notification_counter(&mut group);

        project.begin_transaction("edit");
        group.set_int(&mut project, "ID", 0x20).unwrap();
        group.set_int(&mut project, "SubID", 0x21).unwrap();
        project.end_transaction();

        assert_eq!(count.get(), 2);
    }

    #[test]
    fn atomic_blocks_deliver_exactly_one_notification() {
        let (mut project, node) = chest_project();
        let mut group = chest_group(&project, node);
        let count = notification_counter(&mut group);

        project.begin_transaction("edit");
        group.atomic(|g| {
            g.set_int(&mut project, "Y", 0x3).unwrap();
            g.set_int(&mut project, "X", 0x7).unwrap();
            g.set_int(&mut project, "ID", 0x20).unwrap();
        });
        project.end_transaction();

        assert_eq!(count.get(), 1);
        assert_eq!(project.data(node).arg(0).unwrap(), "$37");
    }

    #[test]
    fn nested_atomic_blocks_flush_at_the_outermost_end() {
        let (mut project, node) = chest_project();
        let mut group = chest_group(&project, node);
        let count = notification_counter(&mut group);

        project.begin_transaction("edit");
        group.begin_atomic();
        group.set_int(&mut project, "ID", 0x20).unwrap();
        group.begin_atomic();
        group.set_int(&mut project, "SubID", 0x21).unwrap();
        group.end_atomic();
        assert_eq!(count.get(), 0, "inner end must not flush");
        group.end_atomic();
        project.end_transaction();

        assert_eq!(count.get(), 1);
    }

    #[test]
    fn all_noop_atomic_blocks_stay_silent() {
        let (mut project, node) = chest_project();
        let mut group = chest_group(&project, node);
        let count = notification_counter(&mut group);

        project.begin_transaction("edit");
        group.atomic(|g| {
            g.set_int(&mut project, "ID", 0x12).unwrap();
            g.set_int(&mut project, "SubID", 0x34).unwrap();
        });
        project.end_transaction();

        assert_eq!(count.get(), 0);
    }

    #[test]
    fn copy_from_duplicates_a_record_wholesale() {
        let (mut project, first) = chest_project();
        let second = project.data(first).next_data().unwrap();
        let mut target = chest_group(&project, first);
        let source = chest_group(&project, second);
        let count = notification_counter(&mut target);

        project.begin_transaction("duplicate chest");
        target.copy_from(&mut project, &source).unwrap();
        project.end_transaction();

        assert_eq!(count.get(), 1, "wholesale copy is one atomic notification");
        for name in ["Y", "X", "Room", "ID", "SubID"] {
            assert_eq!(
                target.get_int(&project, name).unwrap(),
                source.get_int(&project, name).unwrap(),
                "member '{name}' copied"
            );
        }
    }
}
