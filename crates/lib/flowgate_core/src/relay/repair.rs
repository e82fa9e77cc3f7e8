//! Tolerant JSON repair for stream fragments.
//!
//! Upstream chunk boundaries do not respect JSON boundaries, so a
//! fragment may arrive truncated mid-string or mid-object. Repair
//! coerces such fragments to the nearest valid JSON by closing open
//! strings and containers; anything that still fails to parse is
//! dropped by the caller. The stream never aborts over one bad chunk.

use serde_json::Value;

/// Parse a fragment, repairing truncation where possible.
pub fn repair_json(input: &str) -> Option<Value> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }
    let completed = complete_truncated(trimmed)?;
    serde_json::from_str(&completed).ok()
}

/// Close the open strings and containers of a truncated fragment.
///
/// Only container-rooted fragments are candidates; a scalar either
/// parses as-is or is unrecoverable. Returns `None` when the fragment
/// is structurally broken (mismatched closers) rather than truncated.
fn complete_truncated(input: &str) -> Option<String> {
    let first = input.chars().next()?;
    if first != '{' && first != '[' {
        return None;
    }

    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    for c in input.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(c) {
                    return None;
                }
            }
            _ => {}
        }
    }
    if stack.is_empty() && !in_string {
        // Balanced but unparseable: not a truncation problem.
        return None;
    }

    let mut repaired = input.to_string();
    if escaped {
        // Dangling escape at the cut point.
        repaired.pop();
    }
    if in_string {
        repaired.push('"');
    }
    while repaired.ends_with(char::is_whitespace) {
        repaired.pop();
    }
    if repaired.ends_with(',') {
        repaired.pop();
    } else if repaired.ends_with(':') {
        repaired.push_str("null");
    }
    for closer in stack.iter().rev() {
        repaired.push(*closer);
    }
    Some(repaired)
}
