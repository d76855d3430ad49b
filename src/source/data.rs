//! Data nodes: parsed macro invocations with positional arguments.
//!
//! A [`crate::source::Data`] node represents one macro invocation (`.command arg1, arg2`
//! or `m_Command arg1, arg2`) inside a source file. It keeps the command name, the ordered
//! argument tokens, the exact separator fragments between them, and the numeric base each
//! argument was written in, so that a byte-identical line can be regenerated and so that
//! value writes preserve the author's formatting.
//!
//! # Architecture
//!
//! Data nodes additionally form a secondary sequence through the file: each node carries a
//! "next data" link pointing at the next data node in render order, skipping labels, text
//! spans and documentation blocks. The links are rebuilt by the owning
//! [`crate::source::SourceFile`] after structural edits and may be stitched across file
//! boundaries by [`crate::project::Project::chain_files`], which is what makes cross-file
//! data chains (including cycles) expressible.
//!
//! # Integration
//!
//! - [`crate::source::parser::FileParser`] - constructs nodes during parsing
//! - [`crate::value::ValueCodec`] - reads and writes single arguments
//! - [`crate::project::MacroTable`] - supplies the fixed per-macro argument count

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::{project::MacroTable, source::ComponentId, Result};

/// The numeric base an argument literal was written in.
///
/// Captured at parse time and preserved across value writes: a `$1a` stays
/// hexadecimal, a `%00011010` stays binary, a `26` stays decimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum NumBase {
    /// `$`-prefixed hexadecimal.
    Hex,
    /// `%`-prefixed binary.
    Binary,
    /// Plain decimal.
    Decimal,
}

impl NumBase {
    /// Infers the base from an argument token.
    ///
    /// Tokens that are not numeric literals (labels, expressions) default to
    /// hexadecimal, which is what numeric rewrites of such arguments use.
    pub fn detect(text: &str) -> Self {
        let text = text.trim_start_matches('-');
        if text.starts_with('$') {
            NumBase::Hex
        } else if text.starts_with('%') {
            NumBase::Binary
        } else if text.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            NumBase::Decimal
        } else {
            NumBase::Hex
        }
    }
}

/// One macro invocation: command name, ordered arguments, per-argument base,
/// and the "next data" link.
///
/// The argument tokens are authoritative: they hold the exact source text
/// (literal, label or arithmetic expression) and are only interpreted lazily,
/// through the project expression evaluator, when a typed accessor asks for a
/// numeric value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Data {
    command: String,
    args: Vec<String>,
    /// `separators[i]` is the exact fragment preceding `args[i]`; for every
    /// argument after the first it contains the comma.
    separators: Vec<String>,
    bases: Vec<NumBase>,
    next_data: Option<ComponentId>,
}

impl Data {
    /// Creates a data node with canonical separators (one space after the
    /// command, `", "` between arguments), validating arity against the macro
    /// table.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the macro is known and the
    /// argument count does not match its fixed arity.
    pub fn new(command: &str, args: Vec<String>, macros: &MacroTable) -> Result<Self> {
        let mut separators = Vec::with_capacity(args.len());
        for i in 0..args.len() {
            separators.push(if i == 0 { " ".to_string() } else { ", ".to_string() });
        }
        Data::from_parts(command.to_string(), args, separators, macros)
    }

    /// Creates a data node from parsed fragments, validating arity.
    pub(crate) fn from_parts(
        command: String,
        args: Vec<String>,
        separators: Vec<String>,
        macros: &MacroTable,
    ) -> Result<Self> {
        debug_assert_eq!(args.len(), separators.len());
        if let Some(arity) = macros.arity_of(&command) {
            if arity != args.len() {
                return Err(malformed_error!(
                    "macro '{}' expects {} arguments, found {}",
                    command,
                    arity,
                    args.len()
                ));
            }
        }
        let bases = args.iter().map(|a| NumBase::detect(a)).collect();
        Ok(Data {
            command,
            args,
            separators,
            bases,
            next_data: None,
        })
    }

    /// The macro command name, exactly as written (leading `.` included if present).
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Number of arguments.
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// The raw token text of argument `index`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the node lacks the expected
    /// argument.
    pub fn arg(&self, index: usize) -> Result<&str> {
        self.args.get(index).map(String::as_str).ok_or_else(|| {
            malformed_error!(
                "'{}' node lacks argument {} (has {})",
                self.command,
                index,
                self.args.len()
            )
        })
    }

    /// The numeric base argument `index` was written in.
    ///
    /// Out-of-range indices report [`NumBase::Hex`], matching the rewrite
    /// default.
    pub fn base(&self, index: usize) -> NumBase {
        self.bases.get(index).copied().unwrap_or(NumBase::Hex)
    }

    /// Replaces the token text of argument `index`, re-inferring its base.
    ///
    /// Returns whether the text actually changed; dirtiness propagation is the
    /// owning file's responsibility.
    pub(crate) fn set_arg_text(&mut self, index: usize, text: &str) -> Result<bool> {
        if index >= self.args.len() {
            return Err(malformed_error!(
                "'{}' node lacks argument {} (has {})",
                self.command,
                index,
                self.args.len()
            ));
        }
        if self.args[index] == text {
            return Ok(false);
        }
        self.args[index] = text.to_string();
        self.bases[index] = NumBase::detect(text);
        Ok(true)
    }

    /// The next data node in sequence order, skipping non-data components.
    pub fn next_data(&self) -> Option<ComponentId> {
        self.next_data
    }

    pub(crate) fn set_next_data(&mut self, next: Option<ComponentId>) {
        self.next_data = next;
    }

    /// Formats a numeric value in the given base, zero-padded to `hex_digits`
    /// hexadecimal digits (or the equivalent binary width).
    pub fn format_value(base: NumBase, hex_digits: usize, value: i64) -> String {
        let mask: i64 = if hex_digits >= 16 {
            -1
        } else {
            (1 << (hex_digits as u32 * 4)) - 1
        };
        let value = value & mask;
        match base {
            NumBase::Hex => format!("${:0width$x}", value, width = hex_digits),
            NumBase::Binary => format!("%{:0width$b}", value, width = hex_digits * 4),
            NumBase::Decimal => value.to_string(),
        }
    }

    pub(crate) fn render_into(&self, out: &mut String) {
        out.push_str(&self.command);
        for (separator, arg) in self.separators.iter().zip(&self.args) {
            out.push_str(separator);
            out.push_str(arg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_macros() -> MacroTable {
        MacroTable::new()
    }

    #[test]
    fn base_detection() {
        assert_eq!(NumBase::detect("$1a"), NumBase::Hex);
        assert_eq!(NumBase::detect("%1010"), NumBase::Binary);
        assert_eq!(NumBase::detect("42"), NumBase::Decimal);
        assert_eq!(NumBase::detect("CONST_NAME"), NumBase::Hex);
        assert_eq!(NumBase::detect("-3"), NumBase::Decimal);
    }

    #[test]
    fn arity_is_validated_against_the_macro_table() {
        let macros = MacroTable::new();
        macros.define("m_Chest", 4);

        let err = Data::new("m_Chest", vec!["$00".into()], &macros).unwrap_err();
        assert!(matches!(err, crate::Error::Malformed { .. }));

        let ok = Data::new(
            "m_Chest",
            vec!["$00".into(), "$05".into(), "$12".into(), "$34".into()],
            &macros,
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn unknown_macros_accept_any_arity() {
        let data = Data::new("m_Anything", vec!["1".into(), "2".into(), "3".into()], &open_macros());
        assert_eq!(data.unwrap().arg_count(), 3);
    }

    #[test]
    fn render_uses_exact_separators() {
        let data = Data::from_parts(
            ".db".to_string(),
            vec!["$00".into(), "$ff".into()],
            vec!["  ".into(), " ,  ".into()],
            &open_macros(),
        )
        .unwrap();
        let mut out = String::new();
        data.render_into(&mut out);
        assert_eq!(out, ".db  $00 ,  $ff");
    }

    #[test]
    fn set_arg_text_reports_change_and_updates_base() {
        let mut data = Data::new("m_X", vec!["$10".into()], &open_macros()).unwrap();
        assert!(!data.set_arg_text(0, "$10").unwrap());
        assert!(data.set_arg_text(0, "16").unwrap());
        assert_eq!(data.base(0), NumBase::Decimal);
    }

    #[test]
    fn format_value_pads_by_width() {
        assert_eq!(Data::format_value(NumBase::Hex, 2, 0x5), "$05");
        assert_eq!(Data::format_value(NumBase::Hex, 4, 0x1a2), "$01a2");
        assert_eq!(Data::format_value(NumBase::Binary, 2, 0b1010), "%00001010");
        assert_eq!(Data::format_value(NumBase::Decimal, 2, 26), "26");
    }
}
