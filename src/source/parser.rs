//! Line-oriented source text parser.
//!
//! This module provides [`crate::source::parser::FileParser`], which turns the text of one
//! source file into an ordered [`crate::source::SourceFile`] of components. The parser is
//! deliberately shallow: it segments lines into labels, macro invocations, documentation
//! blocks and verbatim text spans, and it captures every surrounding whitespace and
//! comment fragment exactly, so that rendering the parsed file reproduces the input byte
//! for byte. It does not evaluate arguments; that happens lazily through the project
//! expression evaluator when a typed accessor asks.
//!
//! # Line grammar
//!
//! Each line is one of:
//!
//! - blank, or a `;` comment - kept as a verbatim text span;
//! - part of a `;;` documentation block (consecutive such lines form one component);
//! - a label declaration `name:`, optionally followed by more content on the same line;
//! - a macro invocation `command arg1, arg2, ...` (with or without a leading `.`),
//!   terminated by an optional inline comment.
//!
//! Macro arity is validated at construction against the project macro table; a mismatch
//! aborts loading of the offending file.

use std::sync::Arc;

use crate::{
    project::{LabelTable, MacroTable},
    source::{Component, Data, DocBlock, FileId, SourceFile},
    Result,
};

fn is_ws(b: u8) -> bool {
    b == b' ' || b == b'\t' || b == b'\r'
}

fn is_token_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'@'
}

/// Splits off the first line of `text`, reporting whether it was terminated by
/// a newline and returning the remainder.
fn split_line(text: &str) -> (&str, bool, &str) {
    match text.find('\n') {
        Some(pos) => (&text[..pos], true, &text[pos + 1..]),
        None => (text, false, ""),
    }
}

/// Accumulates consecutive `;;` lines into one documentation component.
struct DocAccum {
    leading: String,
    raw: String,
    had_newline: bool,
}

/// Parses source text into component sequences.
///
/// A parser borrows the project's macro table (for arity validation) and label
/// table (for registration); both are shared handles, so parsing different
/// files may proceed in parallel during project load.
pub struct FileParser {
    macros: Arc<MacroTable>,
    labels: Arc<LabelTable>,
}

impl FileParser {
    /// Creates a parser bound to the project's lookup tables.
    pub fn new(macros: Arc<MacroTable>, labels: Arc<LabelTable>) -> Self {
        FileParser { macros, labels }
    }

    /// Parses one file's text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] when a macro invocation fails arity
    /// validation; structural errors abort loading of the whole file.
    pub fn parse(&self, id: FileId, name: &str, text: &str) -> Result<SourceFile> {
        let mut file = SourceFile::new(id, name, self.labels.clone());
        let mut doc: Option<DocAccum> = None;

        let mut rest = text;
        while !rest.is_empty() {
            let (line, had_newline, remainder) = split_line(rest);
            rest = remainder;

            let ws_len = line.bytes().take_while(|b| is_ws(*b)).count();
            let (lead, body) = line.split_at(ws_len);

            if body.starts_with(";;") {
                match &mut doc {
                    Some(acc) => {
                        acc.raw.push('\n');
                        acc.raw.push_str(line);
                        acc.had_newline = had_newline;
                    }
                    None => {
                        doc = Some(DocAccum {
                            leading: lead.to_string(),
                            raw: body.to_string(),
                            had_newline,
                        });
                    }
                }
                continue;
            }
            flush_doc(&mut file, &mut doc);
            self.parse_line(&mut file, lead, body, had_newline)?;
        }
        flush_doc(&mut file, &mut doc);

        file.rebuild_data_links();
        file.register_labels();
        Ok(file)
    }

    fn parse_line(
        &self,
        file: &mut SourceFile,
        lead: &str,
        body: &str,
        had_newline: bool,
    ) -> Result<()> {
        let newline = if had_newline { "\n" } else { "" };

        // Blank and comment-only lines are verbatim spans.
        if body.is_empty() || body.starts_with(';') {
            file.push_back(
                Component::text(body)
                    .with_leading(lead)
                    .with_trailing(newline)
                    .ends_line(),
            );
            return Ok(());
        }

        let bytes = body.as_bytes();
        let mut leading = lead.to_string();
        let mut cursor = 0usize;
        loop {
            let token_start = cursor;
            while cursor < body.len() && is_token_char(bytes[cursor]) {
                cursor += 1;
            }
            let token = &body[token_start..cursor];

            if !token.is_empty() && cursor < body.len() && bytes[cursor] == b':' {
                // Label declaration; more components may follow on the same line.
                cursor += 1;
                let ws_start = cursor;
                while cursor < body.len() && is_ws(bytes[cursor]) {
                    cursor += 1;
                }
                let ws = &body[ws_start..cursor];
                let after = &body[cursor..];
                if after.is_empty() || after.starts_with(';') {
                    file.push_back(
                        Component::label(token)
                            .with_leading(&leading)
                            .with_trailing(&format!("{ws}{after}{newline}"))
                            .ends_line(),
                    );
                    return Ok(());
                }
                file.push_back(Component::label(token).with_leading(&leading));
                leading = ws.to_string();
                continue;
            }

            if token.is_empty() {
                // Nothing we interpret structurally; keep the rest verbatim.
                file.push_back(
                    Component::text(&body[token_start..])
                        .with_leading(&leading)
                        .with_trailing(newline)
                        .ends_line(),
                );
                return Ok(());
            }

            return self.parse_data(file, &leading, token, &body[cursor..], newline);
        }
    }

    /// Parses a macro invocation's argument list, capturing every separator
    /// fragment exactly. Commas and semicolons inside double quotes are
    /// treated as argument content, not separators.
    fn parse_data(
        &self,
        file: &mut SourceFile,
        leading: &str,
        command: &str,
        rest: &str,
        newline: &str,
    ) -> Result<()> {
        let mut in_quotes = false;
        let mut comment_start = rest.len();
        for (i, c) in rest.char_indices() {
            match c {
                '"' => in_quotes = !in_quotes,
                ';' if !in_quotes => {
                    comment_start = i;
                    break;
                }
                _ => {}
            }
        }
        let (region, comment) = rest.split_at(comment_start);
        let bytes = region.as_bytes();

        let mut args: Vec<String> = Vec::new();
        let mut separators: Vec<String> = Vec::new();
        let mut pending_sep = String::new();
        let mut i = 0usize;

        let ws_start = i;
        while i < bytes.len() && is_ws(bytes[i]) {
            i += 1;
        }
        pending_sep.push_str(&region[ws_start..i]);

        if i < bytes.len() {
            loop {
                let arg_start = i;
                let mut quoted = false;
                while i < bytes.len() {
                    match bytes[i] {
                        b'"' => quoted = !quoted,
                        b',' if !quoted => break,
                        _ => {}
                    }
                    i += 1;
                }
                let raw = &region[arg_start..i];
                let trimmed = raw.trim_end_matches(|c| c == ' ' || c == '\t' || c == '\r');
                separators.push(std::mem::take(&mut pending_sep));
                args.push(trimmed.to_string());
                pending_sep.push_str(&raw[trimmed.len()..]);

                if i >= bytes.len() {
                    break;
                }
                pending_sep.push(',');
                i += 1;
                let ws_start = i;
                while i < bytes.len() && is_ws(bytes[i]) {
                    i += 1;
                }
                pending_sep.push_str(&region[ws_start..i]);
            }
        }

        let data = Data::from_parts(command.to_string(), args, separators, &self.macros)?;
        file.push_back(
            Component::data(data)
                .with_leading(leading)
                .with_trailing(&format!("{pending_sep}{comment}{newline}"))
                .ends_line(),
        );
        Ok(())
    }
}

fn flush_doc(file: &mut SourceFile, doc: &mut Option<DocAccum>) {
    if let Some(acc) = doc.take() {
        let newline = if acc.had_newline { "\n" } else { "" };
        file.push_back(
            Component::doc(DocBlock::parse(&acc.raw))
                .with_leading(&acc.leading)
                .with_trailing(newline)
                .ends_line(),
        );
    }
}

/// Convenience hook for tests and tools: parses text against throwaway tables.
#[doc(hidden)]
pub fn parse_standalone(text: &str) -> Result<(SourceFile, Arc<LabelTable>)> {
    let labels = Arc::new(LabelTable::new());
    let parser = FileParser::new(Arc::new(MacroTable::new()), labels.clone());
    let file = parser.parse(FileId::new(0), "standalone.s", text)?;
    Ok((file, labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ComponentKind;

    fn roundtrip(text: &str) {
        let (file, _) = parse_standalone(text).unwrap();
        assert_eq!(file.render(), text, "render must reproduce input bytes");
    }

    #[test]
    fn empty_and_blank_lines_roundtrip() {
        roundtrip("");
        roundtrip("\n");
        roundtrip("   \n\t\n\n");
    }

    #[test]
    fn comments_roundtrip() {
        roundtrip("; top comment\n  ; indented\n");
    }

    #[test]
    fn data_with_odd_spacing_roundtrips() {
        roundtrip(".db  $12 ,  $34,$56\n");
        roundtrip("m_Chest $00, $05, $12, $34 ; treasure\n");
        roundtrip("\tm_Warp   $3f,$00 , $12\n");
    }

    #[test]
    fn final_line_without_newline_roundtrips() {
        roundtrip("label:\n.db $01");
    }

    #[test]
    fn label_and_data_on_one_line_roundtrip() {
        let text = "roomEntry:  .dw roomData ; link\n";
        roundtrip(text);

        let (file, _) = parse_standalone(text).unwrap();
        let kinds: Vec<_> = file.iter().map(|(_, c)| c.kind().clone()).collect();
        assert!(matches!(kinds[0], ComponentKind::Label(_)));
        assert!(matches!(kinds[1], ComponentKind::Data(_)));
    }

    #[test]
    fn doc_blocks_group_consecutive_lines() {
        let text = ";; @name{Sword}\n;; Deals damage.\nm_Treasure $05\n";
        roundtrip(text);

        let (file, _) = parse_standalone(text).unwrap();
        let (_, first) = file.iter().next().unwrap();
        let doc = first.as_doc().expect("first component is a doc block");
        assert_eq!(doc.get("name"), Some("Sword"));
        assert_eq!(doc.get("desc"), Some("Deals damage."));
    }

    #[test]
    fn quoted_commas_stay_inside_one_argument() {
        let text = ".asc \"one, two\", $00\n";
        roundtrip(text);

        let (file, _) = parse_standalone(text).unwrap();
        let id = file.first_data().unwrap();
        let data = file.data(id);
        assert_eq!(data.arg_count(), 2);
        assert_eq!(data.arg(0).unwrap(), "\"one, two\"");
    }

    #[test]
    fn labels_register_into_the_table() {
        let (_, labels) = parse_standalone("start:\n.db $00\nend:\n").unwrap();
        assert!(labels.lookup("start").is_ok());
        assert!(labels.lookup("end").is_ok());
        assert!(labels.lookup("missing").is_err());
    }

    #[test]
    fn data_links_skip_non_data_components() {
        let text = ".db $01\nmiddle:\n; comment\n.db $02\n";
        let (file, _) = parse_standalone(text).unwrap();
        let first = file.first_data().unwrap();
        let next = file.data(first).next_data().expect("linked to second node");
        assert_eq!(file.data(next).arg(0).unwrap(), "$02");
        assert!(file.data(next).next_data().is_none());
    }

    #[test]
    fn arity_mismatch_aborts_the_file() {
        let macros = Arc::new(MacroTable::new());
        macros.define("m_Chest", 4);
        let parser = FileParser::new(macros, Arc::new(LabelTable::new()));
        let err = parser
            .parse(FileId::new(0), "bad.s", "m_Chest $00, $05\n")
            .unwrap_err();
        assert!(matches!(err, crate::Error::Malformed { .. }));
    }
}
