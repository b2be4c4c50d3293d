//! Backslash escaping for plain text.
//!
//! Export escapes every char that a transformer could read as syntax. Import
//! masks `\x` escapes into private-use chars before any pattern runs, so an
//! escaped `$` or `*` can never be taken for a delimiter; masked chars are
//! restored as the bare char in text, or as the original `\x` pair inside
//! code and math where escapes are not interpreted.

use once_cell::sync::Lazy;
use regex::Regex;

/// Chars escaped in exported text.
const SYNTAX_CHARS: &[char] = &['\\', '`', '*', '_', '~', '[', ']', '$'];

/// Start of the private-use range that masked ASCII punctuation maps onto.
const MASK_BASE: u32 = 0xE000;

/// Line openings that would be read as a block marker.
static BLOCK_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([ \t]*)(?:([#>+-])|(\d{1,9})([.)]))").expect("valid block marker pattern")
});

/// Escapes syntax chars in a text payload.
pub(crate) fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if SYNTAX_CHARS.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escapes lines of paragraph output that would otherwise open a heading,
/// quote or list.
pub(crate) fn escape_line_starts(paragraph: &str) -> String {
    paragraph
        .split('\n')
        .map(|line| {
            let Some(captures) = BLOCK_MARKER.captures(line) else {
                return line.to_string();
            };
            let indent = captures.get(1).map_or(0, |m| m.end());
            match captures.get(3) {
                // `1.` becomes `1\.`
                Some(digits) => format!("{}\\{}", &line[..digits.end()], &line[digits.end()..]),
                None => format!("{}\\{}", &line[..indent], &line[indent..]),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Replaces each backslash escape of ASCII punctuation by a masked char.
pub(crate) fn mask_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\'
            && let Some(&next) = chars.peek()
            && next.is_ascii_punctuation()
            && let Some(masked) = char::from_u32(MASK_BASE + next as u32)
        {
            out.push(masked);
            chars.next();
            continue;
        }
        out.push(c);
    }
    out
}

fn unmasked(c: char) -> Option<char> {
    let code = c as u32;
    if (MASK_BASE..MASK_BASE + 0x80).contains(&code) {
        char::from_u32(code - MASK_BASE).filter(char::is_ascii_punctuation)
    } else {
        None
    }
}

/// Restores masked chars as the bare punctuation.
pub(crate) fn unmask(text: &str) -> String {
    text.chars().map(|c| unmasked(c).unwrap_or(c)).collect()
}

/// Restores masked chars as their original `\x` escape.
pub(crate) fn unmask_raw(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match unmasked(c) {
            Some(original) => {
                out.push('\\');
                out.push(original);
            }
            None => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_syntax_chars() {
        assert_eq!(escape_text("a*b_c $5 [x]"), "a\\*b\\_c \\$5 \\[x\\]");
    }

    #[test]
    fn escapes_block_markers_at_line_start() {
        assert_eq!(escape_line_starts("# not a heading"), "\\# not a heading");
        assert_eq!(escape_line_starts("1999. A year"), "1999\\. A year");
        assert_eq!(escape_line_starts("a\n  - b"), "a\n  \\- b");
        assert_eq!(escape_line_starts("mid # hash"), "mid # hash");
    }

    #[test]
    fn masking_hides_escaped_delimiters() {
        let masked = mask_escapes("\\$5 and \\frac");
        assert!(!masked.contains('$'));
        assert!(masked.contains("\\frac"));
        assert_eq!(unmask(&masked), "$5 and \\frac");
        assert_eq!(unmask_raw(&masked), "\\$5 and \\frac");
    }
}
