//! Free-form order text to structured lines.
//!
//! Text is split into segments at top-level delimiters (never inside
//! parentheses). In each segment, text outside parentheses is the item name
//! and every top-level parenthesized group holds comma-separated option
//! names. Malformed parentheses never fail the parse: an unclosed group runs
//! to the end of its segment and stray parentheses are dropped.

use crate::models::RawOrderLine;

/// Checked in order at each position, so the longer forms win
const DELIMITERS: [&str; 5] = [", and", ",and", " and ", ", ", ","];

/// A leading article the participant typed out of habit
const FILLER_WORDS: [&str; 4] = ["the", "a", "an", "some"];

pub fn parse_order_text(text: &str) -> Vec<RawOrderLine> {
    split_segments(text).into_iter().filter_map(parse_segment).collect()
}

fn split_segments(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => {
                if let Some(delimiter) = DELIMITERS.iter().find(|d| delimiter_at(bytes, i, d)) {
                    segments.push(&text[start..i]);
                    i += delimiter.len();
                    start = i;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
    segments.push(&text[start..]);
    segments
}

// Delimiters are ASCII, so a match always sits on char boundaries.
fn delimiter_at(bytes: &[u8], at: usize, delimiter: &str) -> bool {
    let end = at + delimiter.len();
    if end > bytes.len() || !bytes[at..end].eq_ignore_ascii_case(delimiter.as_bytes()) {
        return false;
    }
    // ", andouille" is not ", and" + "ouille"
    if delimiter.ends_with("and") {
        return bytes.get(end).map_or(true, |b| !b.is_ascii_alphanumeric());
    }
    true
}

fn parse_segment(segment: &str) -> Option<RawOrderLine> {
    let segment = strip_filler(segment.trim());

    let mut name = String::new();
    let mut groups: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;

    for c in segment.chars() {
        match c {
            '(' => {
                if depth > 0 {
                    current.push(c);
                }
                depth += 1;
            }
            ')' if depth == 0 => {}
            ')' => {
                depth -= 1;
                if depth == 0 {
                    groups.push(std::mem::take(&mut current));
                } else {
                    current.push(c);
                }
            }
            _ if depth == 0 => name.push(c),
            _ => current.push(c),
        }
    }
    if depth > 0 {
        groups.push(current);
    }

    let item_name = collapse_whitespace(&name);
    if item_name.is_empty() {
        return None;
    }

    let option_names = groups
        .iter()
        .flat_map(|group| split_top_level_commas(group))
        .map(|option| collapse_whitespace(&strip_unbalanced(option)))
        .filter(|option| !option.is_empty())
        .collect();

    Some(RawOrderLine::new(item_name, option_names))
}

fn strip_filler(segment: &str) -> &str {
    for word in FILLER_WORDS {
        let Some(head) = segment.get(..word.len()) else {
            continue;
        };
        let rest = &segment[word.len()..];
        if head.eq_ignore_ascii_case(word) && rest.starts_with(char::is_whitespace) {
            return rest.trim_start();
        }
    }
    segment
}

fn split_top_level_commas(group: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in group.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&group[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&group[start..]);
    parts
}

/// Drop every parenthesis that has no partner
fn strip_unbalanced(text: &str) -> String {
    let mut open: Vec<usize> = Vec::new();
    let mut unmatched: Vec<usize> = Vec::new();
    for (i, c) in text.char_indices() {
        match c {
            '(' => open.push(i),
            ')' => {
                if open.pop().is_none() {
                    unmatched.push(i);
                }
            }
            _ => {}
        }
    }
    unmatched.extend(open);

    text.char_indices()
        .filter(|(i, _)| !unmatched.contains(i))
        .map(|(_, c)| c)
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
