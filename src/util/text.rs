use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ELLIPSIS: &str = "...";
const ELLIPSIS_WIDTH: usize = 3;

/// Terminal columns occupied by `s` (CJK and emoji count 2, combining marks 0).
///
/// ```
/// use gdacs_feed::util::display_width;
///
/// assert_eq!(display_width("Flood"), 5);
/// assert_eq!(display_width("洪水"), 4);
/// ```
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Cuts `s` so it fits in `max_width` columns, ending in "..." when cut.
///
/// Widths of 3 or less cannot hold a character plus the ellipsis, so the
/// result is just the characters that fit. Borrowed when nothing was cut.
///
/// ```
/// use gdacs_feed::util::truncate_to_width;
///
/// assert_eq!(truncate_to_width("Green earthquake alert", 14), "Green earth...");
/// assert_eq!(truncate_to_width("Flood", 10), "Flood");
/// assert_eq!(truncate_to_width("Flood", 2), "Fl");
/// ```
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if display_width(s) <= max_width {
        return Cow::Borrowed(s);
    }
    if max_width <= ELLIPSIS_WIDTH {
        return Cow::Owned(s[..prefix_fitting(s, max_width)].to_string());
    }
    let cut = prefix_fitting(s, max_width - ELLIPSIS_WIDTH);
    Cow::Owned(format!("{}{}", &s[..cut], ELLIPSIS))
}

/// Byte length of the longest prefix of `s` no wider than `width` columns.
fn prefix_fitting(s: &str, width: usize) -> usize {
    let mut used = 0;
    for (idx, c) in s.char_indices() {
        used += UnicodeWidthChar::width(c).unwrap_or(0);
        if used > width {
            return idx;
        }
    }
    s.len()
}

/// SEC-001: Removes terminal control characters and ANSI escape sequences.
///
/// Feed titles and descriptions are remote text printed straight to the
/// terminal. CSI (`ESC [ ... final`) and OSC (`ESC ] ... BEL|ESC \`)
/// sequences are dropped whole; other C0 controls, DEL and bare ESC are
/// dropped individually. Tab, newline and carriage return survive.
///
/// ```
/// use gdacs_feed::util::strip_control_chars;
///
/// assert_eq!(strip_control_chars("\x1b[31mRed alert\x1b[0m"), "Red alert");
/// ```
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_stripped) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            match chars.peek() {
                Some('[') => {
                    chars.next();
                    // Parameter and intermediate bytes up to the final byte
                    for c in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&c) {
                            break;
                        }
                    }
                }
                Some(']') => {
                    chars.next();
                    while let Some(c) = chars.next() {
                        if c == '\x07' {
                            break;
                        }
                        if c == '\x1b' && chars.peek() == Some(&'\\') {
                            chars.next();
                            break;
                        }
                    }
                }
                _ => {}
            }
        } else if !is_stripped(c) {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

fn is_stripped(c: char) -> bool {
    c == '\x1b' || c == '\x7f' || (c < '\x20' && !matches!(c, '\t' | '\n' | '\r'))
}

/// Sanitises `s` and folds all whitespace runs into single spaces, for
/// one-line terminal output.
pub fn one_line(s: &str) -> String {
    strip_control_chars(s)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
