//! Fenced code block tracking for the Markdown codec.
//!
//! Import walks lines through [`advance_fence_state`] to find where a fence
//! opens and closes; export uses [`fence_for`] to pick a fence that the
//! block's own content cannot close early.

/// Whether the walk is inside a fenced block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FencePhase {
    /// Regular Markdown.
    #[default]
    Outside,
    /// Literal code lines.
    InsideFence,
}

/// State carried from one line to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FenceState {
    /// Current phase.
    pub phase: FencePhase,
    /// `` ` `` or `~` of the open fence.
    pub marker: Option<char>,
    /// Indentation (in columns) of the opening line.
    pub indent: usize,
    /// Marker run length of the opening line; closers must be at least as long.
    pub length: usize,
}

/// Result of feeding one line to [`advance_fence_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineParseOutcome {
    /// State for the following line.
    pub next_state: FenceState,
    /// Whether the line belongs to a code block (fence lines included).
    pub in_code: bool,
}

/// Feeds one line through the fence tracker.
pub fn advance_fence_state(line: &str, state: FenceState) -> LineParseOutcome {
    let (indent, byte_offset) = leading_whitespace_info(line);
    let after_indent = &line[byte_offset..];

    match state.phase {
        FencePhase::Outside => match parse_opening_fence(line) {
            Some((marker, length, _)) => LineParseOutcome {
                next_state: FenceState {
                    phase: FencePhase::InsideFence,
                    marker: Some(marker),
                    indent,
                    length,
                },
                in_code: true,
            },
            None => LineParseOutcome {
                next_state: state,
                in_code: false,
            },
        },
        FencePhase::InsideFence => {
            // Closers take up to three columns of indent whatever the opener had.
            let closes = indent <= 3
                && is_closing_fence(after_indent)
                && detect_fence_marker_with_length(after_indent).is_some_and(
                    |(marker, length)| Some(marker) == state.marker && length >= state.length,
                );
            LineParseOutcome {
                next_state: if closes { FenceState::default() } else { state },
                in_code: true,
            }
        }
    }
}

/// Marker, run length and info string of an opening fence line.
pub fn parse_opening_fence(line: &str) -> Option<(char, usize, String)> {
    let (visual_indent, byte_offset) = leading_whitespace_info(line);
    if visual_indent > 3 {
        return None;
    }
    let after_indent = &line[byte_offset..];
    let (marker, length) = detect_fence_marker_with_length(after_indent)?;
    let info = after_indent[length * marker.len_utf8()..].trim();
    // Backtick fences cannot carry backticks in their info string.
    if marker == '`' && info.contains('`') {
        return None;
    }
    Some((marker, length, info.to_string()))
}

/// A backtick fence longer than any backtick run inside `content`.
pub fn fence_for(content: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in content.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat((longest + 1).max(3))
}

/// Leading whitespace as (columns, bytes); tabs stop every four columns.
fn leading_whitespace_info(line: &str) -> (usize, usize) {
    let mut col = 0;
    let mut bytes = 0;
    for b in line.bytes() {
        match b {
            b' ' => {
                col += 1;
                bytes += 1;
            }
            b'\t' => {
                col += 4 - (col % 4);
                bytes += 1;
            }
            _ => break,
        }
    }
    (col, bytes)
}

fn detect_fence_marker_with_length(after_indent: &str) -> Option<(char, usize)> {
    let mut chars = after_indent.chars();
    let first = chars.next()?;
    if first != '`' && first != '~' {
        return None;
    }
    let run_len = 1 + chars.take_while(|c| *c == first).count();
    if run_len >= 3 {
        Some((first, run_len))
    } else {
        None
    }
}

/// A closing fence is a marker run followed by nothing but whitespace.
fn is_closing_fence(after_indent: &str) -> bool {
    let mut chars = after_indent.chars();
    let first = match chars.next() {
        Some(c) if c == '`' || c == '~' => c,
        _ => return false,
    };
    let mut count = 1;
    for c in chars.by_ref() {
        if c == first {
            count += 1;
        } else {
            return count >= 3 && c.is_whitespace() && chars.all(|c| c.is_whitespace());
        }
    }
    count >= 3
}
