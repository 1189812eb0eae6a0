//! Slot scanning for free-form SQL.
//!
//! A slot is a `?` optionally followed by a number (`?2`), a bare name
//! (`?Customer.id`) or a double-quoted name (`?"System.user name"`).
//! Slots inside `/* ... */` comments and single-quoted literals are noise
//! and never count.

use once_cell::sync::Lazy;
use regex::Regex;

static SLOT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\?(?:"([^"]*)"|([A-Za-z0-9_][A-Za-z0-9_.]*))?"#)
        .expect("slot pattern is a valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentKind {
    Code,
    Comment,
    Literal,
}

/// Splits SQL into code, block comment and quoted literal segments.
///
/// Comment and literal segments keep their delimiters. An unterminated
/// comment or literal runs to the end of the input.
fn segments(sql: &str) -> Vec<(SegmentKind, &str)> {
    let mut out = Vec::new();
    let mut rest = sql;

    while !rest.is_empty() {
        let (start, kind) = match (rest.find("/*"), rest.find('\'')) {
            (Some(c), Some(q)) if c < q => (c, SegmentKind::Comment),
            (Some(c), None) => (c, SegmentKind::Comment),
            (_, Some(q)) => (q, SegmentKind::Literal),
            (None, None) => {
                out.push((SegmentKind::Code, rest));
                break;
            }
        };

        if start > 0 {
            out.push((SegmentKind::Code, &rest[..start]));
        }

        let body = &rest[start..];
        let end = match kind {
            SegmentKind::Comment => body[2..].find("*/").map(|e| e + 4),
            _ => body[1..].find('\'').map(|e| e + 2),
        }
        .unwrap_or(body.len());

        out.push((kind, &body[..end]));
        rest = &body[end..];
    }

    out
}

/// Removes comments and quoted literals, leaving only SQL code.
///
/// The result is only meaningful for detecting slots. Code segments are
/// joined with a space so that text either side of a removed comment can
/// never fuse into a different slot.
pub fn strip_noise(sql: &str) -> String {
    segments(sql)
        .into_iter()
        .filter(|(kind, _)| *kind == SegmentKind::Code)
        .map(|(_, text)| text)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Rewrites every slot outside comments and literals to a bare `?`.
///
/// This is the SQL a driver receives. Comments and literals are kept
/// verbatim. Applying it twice gives the same result as applying it once.
pub fn unspecify_slots(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    for (kind, text) in segments(sql) {
        match kind {
            SegmentKind::Code => out.push_str(&SLOT_PATTERN.replace_all(text, "?")),
            _ => out.push_str(text),
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotKind {
    /// Plain `?`.
    Anonymous,
    /// `?n`, 1-based. Numbers too large to parse become `usize::MAX`.
    Numbered(usize),
    /// `?name` or `?"name"`.
    Named { name: String, quoted: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub kind: SlotKind,
    /// The matched text, including the leading `?`.
    pub raw: String,
}

impl Slot {
    pub fn is_named(&self) -> bool {
        matches!(self.kind, SlotKind::Named { .. })
    }
}

/// Tokenises the noise-free view of `sql` into its slots, in order.
pub fn scan_slots(sql: &str) -> Vec<Slot> {
    let clean = strip_noise(sql);
    SLOT_PATTERN
        .captures_iter(&clean)
        .map(|caps| {
            let raw = caps[0].to_string();
            let kind = if let Some(quoted) = caps.get(1) {
                SlotKind::Named {
                    name: quoted.as_str().to_string(),
                    quoted: true,
                }
            } else if let Some(word) = caps.get(2) {
                let word = word.as_str();
                if word.bytes().all(|b| b.is_ascii_digit()) {
                    SlotKind::Numbered(word.parse().unwrap_or(usize::MAX))
                } else {
                    SlotKind::Named {
                        name: word.to_string(),
                        quoted: false,
                    }
                }
            } else {
                SlotKind::Anonymous
            };
            Slot { kind, raw }
        })
        .collect()
}

/// Normalised SQL prefix used to classify statements: trimmed, lowercased,
/// whitespace removed, at most `len` characters.
pub fn statement_prefix(sql: &str, len: usize) -> String {
    sql.trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .take(len)
        .collect()
}
