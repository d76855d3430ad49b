//! Value field codecs: typed accessors over heterogeneous storage.
//!
//! A [`ValueCodec`] bridges one semantic value (a room index, a treasure id, a packed
//! coordinate nibble) and one backing-storage variant, behind a single minimal contract:
//! read/write as string or int, enforce bounds, extract bit ranges, notify on change.
//! Consumers never learn which storage variant they are talking to.
//!
//! # Backing variants
//!
//! The storage is an explicit tagged union, exhaustively matchable:
//!
//! - [`Backing::Data`] - a byte/word/bit-range at one argument of a data node
//! - [`Backing::Stream`] - a byte offset into a flat [`crate::value::StreamStorage`]
//!   buffer, with the same bit semantics
//! - [`Backing::Function`] - a caller-supplied getter/setter pair for derived or
//!   composite values; excluded from the snapshot-transfer path by construction, since
//!   closures are not serializable
//!
//! # Write semantics
//!
//! Sets clamp to `[min, max]` with a logged diagnostic (never a failure), no-op when the
//! value is unchanged, preserve the argument's original numeric base, preserve untouched
//! bits on bit-range writes, and raise exactly one synchronous notification per actual
//! change. Out-of-range source bits in a bit-range write are truncated by the mask.

use std::rc::Rc;
use std::sync::Arc;

use log::warn;
use strum::{Display, EnumIter};

use crate::{
    project::{ConstantsMapping, Project},
    source::{ComponentId, Data, DocBlock},
    value::StreamId,
    notify::ChangeEvent,
    Result,
};

/// The semantic kind of a value reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum ValueKind {
    /// Raw argument text: label names, string operands.
    String,
    /// A numeric value.
    Int,
    /// A numeric value displayed as a flag.
    Bool,
}

/// The storage width of a value reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueWidth {
    /// One byte.
    Byte,
    /// One little-endian word (a single 16-bit argument on data nodes, two
    /// consecutive bytes on streams).
    Word,
    /// An inclusive bit range `[start, end]` within one byte.
    Bits(u8, u8),
}

impl ValueWidth {
    /// Creates a bit-range width.
    ///
    /// # Panics
    ///
    /// Panics when the range is empty, exceeds bit 7 or is reversed; bit-range
    /// parameters are construction-time programming errors, not data errors.
    pub fn bits(start: u8, end: u8) -> Self {
        assert!(
            start <= end && end <= 7,
            "bit range {start}..={end} must lie within one byte"
        );
        ValueWidth::Bits(start, end)
    }

    /// The largest value representable in this width.
    pub fn max_value(self) -> i64 {
        match self {
            ValueWidth::Byte => 0xff,
            ValueWidth::Word => 0xffff,
            ValueWidth::Bits(start, end) => (1 << (end - start + 1)) - 1,
        }
    }

    /// The unshifted value mask for bit ranges (same as [`ValueWidth::max_value`]).
    pub(crate) fn value_mask(self) -> i64 {
        self.max_value()
    }

    /// Hexadecimal display digits: 2 for bytes and bit ranges, 4 for words.
    pub(crate) fn hex_digits(self) -> usize {
        match self {
            ValueWidth::Word => 4,
            _ => 2,
        }
    }

    /// Extracts this width's portion of a raw argument value.
    fn extract(self, raw: i64) -> i64 {
        match self {
            ValueWidth::Byte => raw & 0xff,
            ValueWidth::Word => raw & 0xffff,
            ValueWidth::Bits(start, _) => (raw >> start) & self.value_mask(),
        }
    }
}

/// The backing-storage variant of a [`ValueCodec`].
#[derive(Clone)]
pub enum Backing {
    /// A byte/word/bit-range at one argument of a data node.
    Data {
        /// The backing data component.
        node: ComponentId,
        /// The argument index within the node.
        index: usize,
    },
    /// A byte offset into a flat stream buffer.
    Stream {
        /// The backing stream.
        stream: StreamId,
        /// The byte offset of the value.
        offset: usize,
    },
    /// A caller-supplied getter/setter pair.
    Function {
        /// Reads the derived value.
        get: Rc<dyn Fn(&Project) -> i64>,
        /// Writes the derived value.
        set: Rc<dyn Fn(&mut Project, i64)>,
    },
}

impl std::fmt::Debug for Backing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backing::Data { node, index } => {
                f.debug_struct("Data").field("node", node).field("index", index).finish()
            }
            Backing::Stream { stream, offset } => f
                .debug_struct("Stream")
                .field("stream", stream)
                .field("offset", offset)
                .finish(),
            Backing::Function { .. } => f.debug_struct("Function").finish_non_exhaustive(),
        }
    }
}

/// A typed accessor bridging one semantic value and one backing-storage variant.
#[derive(Debug, Clone)]
pub struct ValueCodec {
    kind: ValueKind,
    width: ValueWidth,
    min: i64,
    max: i64,
    editable: bool,
    constants: Option<Arc<ConstantsMapping>>,
    doc: Option<DocBlock>,
    backing: Backing,
    event: ChangeEvent,
}

impl ValueCodec {
    fn with_backing(kind: ValueKind, width: ValueWidth, backing: Backing) -> Self {
        ValueCodec {
            kind,
            width,
            min: 0,
            max: width.max_value(),
            editable: true,
            constants: None,
            doc: None,
            backing,
            event: ChangeEvent::new(),
        }
    }

    /// Creates a codec over one argument of a data node.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] when the node lacks the argument.
    pub fn new_data(
        project: &Project,
        node: ComponentId,
        index: usize,
        kind: ValueKind,
        width: ValueWidth,
    ) -> Result<Self> {
        let data = project.data(node);
        if index >= data.arg_count() {
            return Err(malformed_error!(
                "'{}' node lacks argument {} (has {})",
                data.command(),
                index,
                data.arg_count()
            ));
        }
        Ok(ValueCodec::with_backing(
            kind,
            width,
            Backing::Data { node, index },
        ))
    }

    /// Creates a codec over a byte offset of a stream.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] when the value would not fit
    /// inside the stream.
    pub fn new_stream(
        project: &Project,
        stream: StreamId,
        offset: usize,
        kind: ValueKind,
        width: ValueWidth,
    ) -> Result<Self> {
        let needed = match width {
            ValueWidth::Word => 2,
            _ => 1,
        };
        if offset + needed > project.stream(stream).len() {
            return Err(crate::Error::OutOfBounds);
        }
        Ok(ValueCodec::with_backing(
            kind,
            width,
            Backing::Stream { stream, offset },
        ))
    }

    /// Creates a codec over a caller-supplied getter/setter pair.
    ///
    /// Function-backed codecs are excluded from the snapshot-transfer path by
    /// construction ([`ValueCodec::is_transferable`] reports `false`).
    pub fn new_function(
        kind: ValueKind,
        width: ValueWidth,
        get: impl Fn(&Project) -> i64 + 'static,
        set: impl Fn(&mut Project, i64) + 'static,
    ) -> Self {
        ValueCodec::with_backing(
            kind,
            width,
            Backing::Function {
                get: Rc::new(get),
                set: Rc::new(set),
            },
        )
    }

    /// Overrides the permitted value range.
    #[must_use]
    pub fn with_range(mut self, min: i64, max: i64) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Attaches a symbolic-name mapping consulted by [`ValueCodec::get_string`].
    #[must_use]
    pub fn with_constants(mut self, constants: Arc<ConstantsMapping>) -> Self {
        self.constants = Some(constants);
        self
    }

    /// Attaches a documentation binding for editor display.
    #[must_use]
    pub fn with_doc(mut self, doc: DocBlock) -> Self {
        self.doc = Some(doc);
        self
    }

    /// Marks the codec as not editable.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.editable = false;
        self
    }

    /// The semantic kind.
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// The storage width.
    pub fn width(&self) -> ValueWidth {
        self.width
    }

    /// The smallest permitted value.
    pub fn min_value(&self) -> i64 {
        self.min
    }

    /// The largest permitted value.
    pub fn max_value(&self) -> i64 {
        self.max
    }

    /// True unless the codec was marked read-only.
    pub fn is_editable(&self) -> bool {
        self.editable
    }

    /// The attached documentation binding, if any.
    pub fn doc(&self) -> Option<&DocBlock> {
        self.doc.as_ref()
    }

    /// The backing-storage variant.
    pub fn backing(&self) -> &Backing {
        &self.backing
    }

    /// False for function-backed codecs, which cannot take part in snapshot
    /// transfer.
    pub fn is_transferable(&self) -> bool {
        !matches!(self.backing, Backing::Function { .. })
    }

    /// The codec's change event; raised exactly once per successful set.
    pub fn changed(&mut self) -> &mut ChangeEvent {
        &mut self.event
    }

    /// Reads the value as an integer.
    ///
    /// Data-backed codecs evaluate the argument text through the project
    /// expression evaluator, then shift-and-mask for bit ranges; stream-backed
    /// words combine two bytes little-endian.
    ///
    /// # Errors
    ///
    /// [`crate::Error::Malformed`] when the backing node lacks the expected
    /// argument, [`crate::Error::Eval`] when the argument text does not
    /// evaluate, [`crate::Error::OutOfBounds`] on stream overrun.
    pub fn get_int(&self, project: &Project) -> Result<i64> {
        match &self.backing {
            Backing::Data { node, index } => {
                let data = project.data(*node);
                let raw = project.evaluate(data.arg(*index)?)?;
                Ok(self.width.extract(raw))
            }
            Backing::Stream { stream, offset } => {
                let storage = project.stream(*stream);
                match self.width {
                    ValueWidth::Byte => Ok(i64::from(storage.read_u8(*offset)?)),
                    ValueWidth::Word => Ok(i64::from(storage.read_u16(*offset)?)),
                    ValueWidth::Bits(_, _) => {
                        Ok(self.width.extract(i64::from(storage.read_u8(*offset)?)))
                    }
                }
            }
            Backing::Function { get, .. } => Ok(get(project)),
        }
    }

    /// Reads the value as display text.
    ///
    /// String-kind data codecs return the raw argument text. Otherwise, a
    /// symbolic-name mapping supplies the preferred name for the current value
    /// when it has one; the fallback is zero-padded hexadecimal (2 or 4 digits
    /// by width).
    pub fn get_string(&self, project: &Project) -> Result<String> {
        if self.kind == ValueKind::String {
            if let Backing::Data { node, index } = &self.backing {
                return Ok(project.data(*node).arg(*index)?.to_string());
            }
        }
        let value = self.get_int(project)?;
        if let Some(constants) = &self.constants {
            if let Some(name) = constants.name_of(value) {
                return Ok(name);
            }
        }
        Ok(Data::format_value(
            crate::source::NumBase::Hex,
            self.width.hex_digits(),
            value,
        ))
    }

    /// Writes an integer value.
    ///
    /// Clamps to `[min, max]` with a logged diagnostic, no-ops when the value
    /// equals the current one (no notification, nothing marked dirty), then
    /// performs the variant-specific write and raises exactly one
    /// notification. Returns whether a mutation occurred.
    ///
    /// # Panics
    ///
    /// Panics on a read-only codec; setting one is a programming error.
    pub fn set_int(&mut self, project: &mut Project, value: i64) -> Result<bool> {
        assert!(self.editable, "attempted to set a read-only value reference");
        let mut value = value;
        if value > self.max {
            warn!("value {value:#x} above maximum {:#x}, clamping", self.max);
            value = self.max;
        } else if value < self.min {
            warn!("value {value:#x} below minimum {:#x}, clamping", self.min);
            value = self.min;
        }
        if self.get_int(project)? == value {
            return Ok(false);
        }
        match &self.backing {
            Backing::Data { node, index } => {
                let (node, index) = (*node, *index);
                let text = {
                    let data = project.data(node);
                    let base = data.base(index);
                    match self.width {
                        ValueWidth::Byte => Data::format_value(base, 2, value),
                        ValueWidth::Word => Data::format_value(base, 4, value),
                        ValueWidth::Bits(start, _) => {
                            let raw = project.evaluate(data.arg(index)?)? & 0xff;
                            let mask = self.width.value_mask() << start;
                            // Out-of-range source bits truncate via the mask.
                            let merged = (raw & !mask) | ((value << start) & mask);
                            Data::format_value(base, 2, merged)
                        }
                    }
                };
                project.set_arg(node, index, &text)?;
            }
            Backing::Stream { stream, offset } => {
                let (stream, offset) = (*stream, *offset);
                match self.width {
                    ValueWidth::Byte => project.write_stream_u8(stream, offset, value as u8)?,
                    ValueWidth::Word => project.write_stream_u16(stream, offset, value as u16)?,
                    ValueWidth::Bits(start, _) => {
                        let raw = project.stream(stream).read_u8(offset)?;
                        let mask = (self.width.value_mask() as u8) << start;
                        let merged = (raw & !mask) | (((value as u8) << start) & mask);
                        project.write_stream_u8(stream, offset, merged)?;
                    }
                }
            }
            Backing::Function { set, .. } => {
                set(project, value);
            }
        }
        self.event.raise();
        Ok(true)
    }

    /// Writes a value from text.
    ///
    /// String-kind data codecs store the text verbatim (label arguments);
    /// everything else parses through the project expression evaluator
    /// (symbolic constants, arithmetic) and delegates to
    /// [`ValueCodec::set_int`].
    pub fn set_string(&mut self, project: &mut Project, text: &str) -> Result<bool> {
        if self.kind == ValueKind::String {
            let data_backing = match &self.backing {
                Backing::Data { node, index } => Some((*node, *index)),
                _ => None,
            };
            if let Some((node, index)) = data_backing {
                assert!(self.editable, "attempted to set a read-only value reference");
                let changed = project.set_arg(node, index, text)?;
                if changed {
                    self.event.raise();
                }
                return Ok(changed);
            }
        }
        let value = project.evaluate(text)?;
        self.set_int(project, value)
    }

    /// Resets the value to the variant-defined default (the minimum bound).
    ///
    /// Function-backed codecs have no storage of their own and decline with a
    /// debug log entry.
    pub fn initialize(&mut self, project: &mut Project) -> Result<bool> {
        if matches!(self.backing, Backing::Function { .. }) {
            log::debug!("initialize is not supported for function-backed references");
            return Ok(false);
        }
        let min = self.min;
        self.set_int(project, min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::chest_project;
    use std::cell::Cell;

    #[test]
    fn nibbles_and_bytes_read_correctly() {
        let (project, node) = chest_project();
        let second = project.data(node).next_data().unwrap();

        let y = ValueCodec::new_data(&project, second, 0, ValueKind::Int, ValueWidth::bits(4, 7))
            .unwrap();
        let x = ValueCodec::new_data(&project, second, 0, ValueKind::Int, ValueWidth::bits(0, 3))
            .unwrap();
        let room =
            ValueCodec::new_data(&project, second, 1, ValueKind::Int, ValueWidth::Byte).unwrap();

        // Second chest is `m_Chest $45, $1a, $00, $01`.
        assert_eq!(y.get_int(&project).unwrap(), 0x4);
        assert_eq!(x.get_int(&project).unwrap(), 0x5);
        assert_eq!(room.get_int(&project).unwrap(), 0x1a);
    }

    #[test]
    fn bit_writes_preserve_untouched_bits() {
        let (mut project, node) = chest_project();
        let second = project.data(node).next_data().unwrap();
        let mut y = ValueCodec::new_data(&project, second, 0, ValueKind::Int, ValueWidth::bits(4, 7))
            .unwrap();

        project.begin_transaction("move chest");
        assert!(y.set_int(&mut project, 0x3).unwrap());
        project.end_transaction();

        assert_eq!(project.data(second).arg(0).unwrap(), "$35");
    }

    #[test]
    fn sets_clamp_to_bounds_without_failing() {
        let (mut project, node) = chest_project();
        let mut id = ValueCodec::new_data(&project, node, 2, ValueKind::Int, ValueWidth::Byte)
            .unwrap()
            .with_range(0, 0x20);

        project.begin_transaction("set id");
        assert!(id.set_int(&mut project, 0x99).unwrap());
        project.end_transaction();

        assert_eq!(id.get_int(&project).unwrap(), 0x20);
    }

    #[test]
    fn idempotent_sets_notify_nothing_and_dirty_nothing() {
        let (mut project, node) = chest_project();
        let mut id =
            ValueCodec::new_data(&project, node, 2, ValueKind::Int, ValueWidth::Byte).unwrap();
        let fired = std::rc::Rc::new(Cell::new(0u32));
        let counter = fired.clone();
        id.changed().subscribe(move || counter.set(counter.get() + 1));

        project.begin_transaction("no-op");
        assert!(!id.set_int(&mut project, 0x12).unwrap());
        project.end_transaction();

        assert_eq!(fired.get(), 0);
        assert!(!project.file(node.file()).is_modified());
        assert_eq!(project.transactions().undo_depth(), 0, "empty groups are dropped");
    }

    #[test]
    fn writes_preserve_the_argument_base() {
        let mut project = Project::new();
        let file = project.add_file("mixed.s", ".db 26, $1a, %00011010\n").unwrap();
        let node = project.file(file).first_data().unwrap();

        for index in 0..3 {
            let mut codec =
                ValueCodec::new_data(&project, node, index, ValueKind::Int, ValueWidth::Byte)
                    .unwrap();
            project.begin_transaction("bump");
            codec.set_int(&mut project, 27).unwrap();
            project.end_transaction();
        }
        assert_eq!(
            project.file(file).render(),
            ".db 27, $1b, %00011011\n",
            "each argument keeps the base it was written in"
        );
    }

    #[test]
    fn word_codecs_format_four_digits() {
        let mut project = Project::new();
        let file = project.add_file("w.s", ".dw $01a2\n").unwrap();
        let node = project.file(file).first_data().unwrap();
        let mut word =
            ValueCodec::new_data(&project, node, 0, ValueKind::Int, ValueWidth::Word).unwrap();

        assert_eq!(word.get_int(&project).unwrap(), 0x01a2);
        project.begin_transaction("retarget");
        word.set_int(&mut project, 0x1234).unwrap();
        project.end_transaction();
        assert_eq!(project.data(node).arg(0).unwrap(), "$1234");
    }

    #[test]
    fn string_kind_reads_and_writes_raw_argument_text() {
        let mut project = Project::new();
        let file = project.add_file("warp.s", "m_Warp roomEntry\nroomEntry:\n").unwrap();
        let node = project.file(file).first_data().unwrap();
        let mut target =
            ValueCodec::new_data(&project, node, 0, ValueKind::String, ValueWidth::Word).unwrap();

        assert_eq!(target.get_string(&project).unwrap(), "roomEntry");
        project.begin_transaction("retarget");
        assert!(target.set_string(&mut project, "otherEntry").unwrap());
        project.end_transaction();
        assert_eq!(project.data(node).arg(0).unwrap(), "otherEntry");
    }

    #[test]
    fn symbolic_names_win_over_hex_display() {
        let (project, node) = chest_project();
        project.define_constant("TREASURE_SHIELD", 0x12);
        let constants = project.constants().clone();
        let id = ValueCodec::new_data(&project, node, 2, ValueKind::Int, ValueWidth::Byte)
            .unwrap()
            .with_constants(constants);

        assert_eq!(id.get_string(&project).unwrap(), "TREASURE_SHIELD");

        let subid =
            ValueCodec::new_data(&project, node, 3, ValueKind::Int, ValueWidth::Byte).unwrap();
        assert_eq!(subid.get_string(&project).unwrap(), "$34");
    }

    #[test]
    fn function_backing_round_trips_through_closures() {
        let (mut project, _) = chest_project();
        let cell = std::rc::Rc::new(Cell::new(7i64));
        let read = cell.clone();
        let write = cell.clone();
        let mut derived = ValueCodec::new_function(
            ValueKind::Int,
            ValueWidth::Byte,
            move |_| read.get(),
            move |_, value| write.set(value),
        );

        assert_eq!(derived.get_int(&project).unwrap(), 7);
        assert!(!derived.is_transferable());

        project.begin_transaction("derived");
        assert!(derived.set_int(&mut project, 9).unwrap());
        project.end_transaction();
        assert_eq!(cell.get(), 9);
    }

    #[test]
    fn evaluated_arguments_fail_with_eval_errors() {
        let mut project = Project::new();
        let file = project.add_file("bad.s", ".db UNKNOWN_NAME\n").unwrap();
        let node = project.file(file).first_data().unwrap();
        let codec =
            ValueCodec::new_data(&project, node, 0, ValueKind::Int, ValueWidth::Byte).unwrap();

        assert!(matches!(codec.get_int(&project), Err(crate::Error::Eval(_))));
    }

    #[test]
    fn missing_arguments_are_malformed_at_construction() {
        let (project, node) = chest_project();
        let err = ValueCodec::new_data(&project, node, 9, ValueKind::Int, ValueWidth::Byte)
            .unwrap_err();
        assert!(matches!(err, crate::Error::Malformed { .. }));
    }

    #[test]
    #[should_panic(expected = "within one byte")]
    fn reversed_bit_ranges_are_programming_errors() {
        let _ = ValueWidth::bits(5, 2);
    }
}
