//! Documentation blocks: `;;` comment runs with `@field{value}` tags.
//!
//! A documentation block is a run of consecutive source lines whose content starts with
//! `;;`. Inside the block, `@field{value}` tags assign named fields; untagged text
//! accumulates into the implicit `desc` field. The raw line text is retained verbatim so
//! blocks round-trip byte for byte regardless of how the tags parse.
//!
//! # Format rules
//!
//! - `@field{value}` tags balance brace depth, so nested braces do not close the tag
//!   early, and a tag may span multiple lines.
//! - Untagged leading text becomes (or extends) the `desc` field.
//! - A run of blank `;;` lines becomes one explicit paragraph break (`\n\n`) in the
//!   field under construction.
//! - Single newlines collapse to spaces; the two-character escape `\n` requests a
//!   literal newline.
//! - Field keys keep their original case and their insertion order.

use serde::{Deserialize, Serialize};

/// A parsed documentation block.
///
/// Holds both the verbatim raw text (for lossless rendering) and the parsed
/// field list (for display). Field lookup is linear; blocks rarely carry more
/// than a handful of tags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocBlock {
    raw: String,
    fields: Vec<(String, String)>,
}

impl DocBlock {
    /// Parses a documentation block from its raw text.
    ///
    /// `raw` is the exact source text of the block: one or more lines each
    /// containing the `;;` marker, joined with `\n`, without a trailing
    /// newline.
    pub fn parse(raw: &str) -> Self {
        let fields = parse_fields(raw);
        DocBlock {
            raw: raw.to_string(),
            fields,
        }
    }

    /// The verbatim source text of the block.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Looks up a field value by key (exact, case-sensitive match).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Field keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// All fields in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of parsed fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True if no field was parsed out of the block.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn parse_fields(raw: &str) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = Vec::new();
    let mut blank_pending = false;

    // In-flight `@field{...}` tag, possibly spanning lines.
    let mut tag_name: Option<String> = None;
    let mut tag_value = String::new();
    let mut tag_depth = 0u32;

    for line in raw.split('\n') {
        let mut content = match line.trim_start().strip_prefix(";;") {
            Some(rest) => rest,
            // A block line without the marker contributes nothing to fields;
            // it still round-trips through `raw`.
            None => continue,
        };

        if tag_name.is_some() {
            // A tag spanning lines: the line break collapses to a space.
            content = content.trim_start();
            if !tag_value.is_empty() {
                tag_value.push(' ');
            }
        } else if content.trim().is_empty() {
            blank_pending = true;
            continue;
        }

        let mut segment = String::new();
        let mut chars = content.char_indices();
        while let Some((pos, c)) = chars.next() {
            if tag_name.is_none() {
                if c == '@' {
                    if let Some((name, consumed)) = scan_tag_start(&content[pos + 1..]) {
                        append_field(&mut fields, "desc", &segment, &mut blank_pending);
                        segment.clear();
                        tag_name = Some(name);
                        tag_value.clear();
                        tag_depth = 1;
                        // Skip the tag name and its opening brace.
                        for _ in 0..consumed {
                            chars.next();
                        }
                        continue;
                    }
                }
                segment.push(c);
            } else {
                match c {
                    '{' => {
                        tag_depth += 1;
                        tag_value.push(c);
                    }
                    '}' => {
                        tag_depth -= 1;
                        if tag_depth == 0 {
                            let name = tag_name.take().expect("tag in flight");
                            append_field(&mut fields, &name, tag_value.trim(), &mut blank_pending);
                            tag_value.clear();
                        } else {
                            tag_value.push(c);
                        }
                    }
                    _ => tag_value.push(c),
                }
            }
        }
        if tag_name.is_none() {
            append_field(&mut fields, "desc", &segment, &mut blank_pending);
        }
    }

    for (_, value) in &mut fields {
        let trimmed = value.trim_end().len();
        value.truncate(trimmed);
    }
    fields
}

/// Scans `@`-suffix text for `name{`; returns the tag name and the number of
/// characters consumed (name plus opening brace). A `@` not introducing a tag
/// is treated as literal text.
fn scan_tag_start(rest: &str) -> Option<(String, usize)> {
    let mut name = String::new();
    for (pos, c) in rest.char_indices() {
        if c == '{' {
            if name.is_empty() {
                return None;
            }
            return Some((name, pos + 1));
        }
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            name.push(c);
        } else {
            return None;
        }
    }
    None
}

/// Appends a text segment to the named field, creating it at the current end
/// of the insertion order if needed.
///
/// Segments are joined with a single space (the collapsed newline), pending
/// blank-line runs become one `\n\n` paragraph break, and the `\n` escape
/// produces a literal newline.
fn append_field(fields: &mut Vec<(String, String)>, key: &str, segment: &str, blank_pending: &mut bool) {
    let segment = segment.trim_start().replace("\\n", "\n");
    if segment.is_empty() {
        return;
    }
    let index = match fields.iter().position(|(k, _)| k == key) {
        Some(index) => index,
        None => {
            fields.push((key.to_string(), String::new()));
            fields.len() - 1
        }
    };
    let entry = &mut fields[index].1;
    if *blank_pending && !entry.is_empty() {
        entry.push_str("\n\n");
    } else if !entry.is_empty() && !entry.ends_with('\n') {
        entry.push(' ');
    }
    *blank_pending = false;
    entry.push_str(&segment);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_and_untagged_text() {
        let block = DocBlock::parse(";; @name{Foo} text @desc{a thing}");
        assert_eq!(block.get("name"), Some("Foo"));
        assert_eq!(block.get("desc"), Some("text  a thing"));
        let keys: Vec<_> = block.keys().collect();
        assert_eq!(keys, vec!["name", "desc"]);
    }

    #[test]
    fn nested_braces_do_not_close_early() {
        let block = DocBlock::parse(";; @fmt{a {nested} value}");
        assert_eq!(block.get("fmt"), Some("a {nested} value"));
    }

    #[test]
    fn untagged_leading_text_becomes_desc() {
        let block = DocBlock::parse(";; Plays when the hero opens a chest.");
        assert_eq!(block.get("desc"), Some("Plays when the hero opens a chest."));
    }

    #[test]
    fn single_newlines_collapse_to_spaces() {
        let block = DocBlock::parse(";; first half\n;; second half");
        assert_eq!(block.get("desc"), Some("first half second half"));
    }

    #[test]
    fn blank_lines_become_paragraph_break() {
        let block = DocBlock::parse(";; first paragraph\n;;\n;;\n;; second paragraph");
        assert_eq!(block.get("desc"), Some("first paragraph\n\nsecond paragraph"));
    }

    #[test]
    fn explicit_escape_keeps_literal_newline() {
        let block = DocBlock::parse(";; line one\\nline two");
        assert_eq!(block.get("desc"), Some("line one\nline two"));
    }

    #[test]
    fn tags_may_span_lines() {
        let block = DocBlock::parse(";; @desc{starts here\n;; ends here}");
        assert_eq!(block.get("desc"), Some("starts here ends here"));
    }

    #[test]
    fn keys_preserve_case() {
        let block = DocBlock::parse(";; @Name{Foo}");
        assert_eq!(block.get("Name"), Some("Foo"));
        assert_eq!(block.get("name"), None);
    }

    #[test]
    fn literal_at_sign_without_brace_is_text() {
        let block = DocBlock::parse(";; mail me @ the castle");
        assert_eq!(block.get("desc"), Some("mail me @ the castle"));
    }

    #[test]
    fn raw_text_is_preserved_verbatim() {
        let raw = ";;   @name{Foo}   odd   spacing";
        let block = DocBlock::parse(raw);
        assert_eq!(block.raw(), raw);
    }
}
