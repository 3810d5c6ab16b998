//! Listing extraction from unified diffs of a JSON array file.
//!
//! A posting starts on an added line whose trimmed content begins with `{`.
//! From there, added and context lines are collected while tracking brace
//! depth until the object closes. The collected text is cleaned of dangling
//! commas and decoded; fragments that do not decode are dropped.

use crate::models::Posting;
use tracing::debug;

/// Scanner state. Removed lines never contribute to a capture.
#[derive(Debug)]
enum ScanState {
    Outside,
    Capturing { depth: i64, lines: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Added,
    Context,
    Removed,
    HunkHeader,
    Meta,
}

fn classify(line: &str) -> (LineKind, &str) {
    if line.starts_with("@@") {
        return (LineKind::HunkHeader, "");
    }
    match line.as_bytes().first() {
        Some(b'+') => (LineKind::Added, &line[1..]),
        Some(b'-') => (LineKind::Removed, &line[1..]),
        Some(b' ') => (LineKind::Context, &line[1..]),
        // "\ No newline at end of file"
        Some(b'\\') => (LineKind::Meta, ""),
        // Some renderers drop the space marker on empty context lines
        None => (LineKind::Context, ""),
        Some(_) => (LineKind::Context, line),
    }
}

/// Net `{` minus `}` on one line, ignoring braces inside JSON strings
fn brace_delta(content: &str) -> i64 {
    let mut delta = 0;
    let mut in_string = false;
    let mut escaped = false;

    for ch in content.chars() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => delta += 1,
            '}' => delta -= 1,
            _ => {}
        }
    }
    delta
}

/// Join captured lines, dropping a dangling comma from the last two lines
fn clean_fragment(mut lines: Vec<String>) -> String {
    let len = lines.len();
    for line in lines.iter_mut().skip(len.saturating_sub(2)) {
        let trimmed = line.trim_end();
        let trimmed = trimmed.strip_suffix(',').unwrap_or(trimmed);
        *line = trimmed.to_string();
    }
    lines.join("\n")
}

fn decode(lines: Vec<String>) -> Option<Posting> {
    let text = clean_fragment(lines);
    match serde_json::from_str::<Posting>(&text) {
        Ok(posting) => Some(posting),
        Err(e) => {
            debug!(error = %e, "Skipping undecodable listing fragment");
            None
        }
    }
}

/// Extract every posting added by a diff, in diff order.
///
/// Never fails: fragments that are not a complete, well-formed posting
/// object are skipped, as is a capture still open when the diff ends.
pub fn extract_postings<S: AsRef<str>>(diff_lines: &[S]) -> Vec<Posting> {
    let mut postings = Vec::new();
    let mut state = ScanState::Outside;

    for raw in diff_lines {
        let (kind, content) = classify(raw.as_ref());

        state = match (state, kind) {
            (ScanState::Capturing { .. }, LineKind::HunkHeader) => {
                debug!("Hunk boundary inside a listing fragment, dropping it");
                ScanState::Outside
            }
            (ScanState::Outside, LineKind::Added) if content.trim_start().starts_with('{') => {
                let depth = brace_delta(content);
                let lines = vec![content.to_string()];
                if depth <= 0 {
                    postings.extend(decode(lines));
                    ScanState::Outside
                } else {
                    ScanState::Capturing { depth, lines }
                }
            }
            (ScanState::Capturing { depth, mut lines }, LineKind::Added | LineKind::Context) => {
                let depth = depth + brace_delta(content);
                lines.push(content.to_string());
                if depth <= 0 {
                    postings.extend(decode(lines));
                    ScanState::Outside
                } else {
                    ScanState::Capturing { depth, lines }
                }
            }
            (state, _) => state,
        };
    }

    if let ScanState::Capturing { lines, .. } = state {
        debug!(lines = lines.len(), "Diff ended inside a listing fragment, dropping it");
    }

    postings
}
