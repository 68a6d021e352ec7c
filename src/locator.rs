//! Hunk locator (spec §4.5): finds where a hunk's old side matches the input,
//! tolerating a configurable fuzz and an accumulated offset.

use crate::hunk::{Hunk, Role};
use crate::input::LineIndex;

/// Two lines match either byte-exactly (including length) or, when
/// `canonicalize_ws` is set, under whitespace-run collapsing (spec §4.5).
pub fn lines_match(a: &[u8], b: &[u8], canonicalize_ws: bool) -> bool {
    if !canonicalize_ws {
        return a == b;
    }
    canonical_ws(a) == canonical_ws(b)
}

fn canonical_ws(line: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(line.len());
    let mut iter = line.iter().peekable();
    // leading whitespace run collapses to nothing
    while let Some(&&b) = iter.peek() {
        if b == b' ' || b == b'\t' {
            iter.next();
        } else {
            break;
        }
    }
    let mut pending_ws = false;
    for &b in iter {
        if b == b' ' || b == b'\t' {
            pending_ws = true;
        } else {
            if pending_ws {
                out.push(b' ');
                pending_ws = false;
            }
            out.push(b);
        }
    }
    out
}

/// Checks whether `hunk`'s old side matches the input starting at
/// `base + offset`, allowing `prefix_fuzz`/`suffix_fuzz` leading/trailing
/// context lines to disagree.
pub fn patch_match(
    input: &dyn LineIndex,
    hunk: &Hunk,
    base: u64,
    offset: i64,
    prefix_fuzz: u64,
    suffix_fuzz: u64,
    canonicalize_ws: bool,
) -> bool {
    let old: Vec<_> = hunk.old_lines().collect();
    let n = old.len() as u64;
    for (i, line) in old.iter().enumerate() {
        let i = i as u64;
        if line.role != Role::Context && line.role != Role::Delete {
            continue;
        }
        // fuzz only excuses context lines in the leading/trailing band; a
        // deleted line must always be physically present
        if line.role == Role::Context && (i < prefix_fuzz || i >= n.saturating_sub(suffix_fuzz)) {
            continue;
        }
        let want_line = base as i64 + offset + i as i64 + 1;
        if want_line < 1 {
            return false;
        }
        let input_line = input.ifetch(want_line as u64);
        if !lines_match(&input_line.bytes, line.storage.bytes(), canonicalize_ws) {
            return false;
        }
    }
    true
}

/// Outcome of a locate attempt: the matched line and the offset used.
#[derive(Clone, Copy, Debug)]
pub struct LocateResult {
    pub line: u64,
    pub offset: i64,
}

/// Finds the 1-based input line at which `hunk`'s old side matches, honoring
/// `in_offset` as the initial guess and the special file-start/file-end cases
/// from spec §4.5. Returns `None` if no position qualifies.
pub fn locate_hunk(
    input: &dyn LineIndex,
    hunk: &Hunk,
    in_offset: i64,
    last_frozen_line: u64,
    prefix_fuzz: i64,
    suffix_fuzz: i64,
    canonicalize_ws: bool,
) -> Option<LocateResult> {
    let pat_lines = hunk.ptrn_lines;
    let first_guess = (hunk.first as i64 + in_offset).max(1) as u64;

    if pat_lines == 0 {
        return Some(LocateResult {
            line: first_guess,
            offset: in_offset,
        });
    }

    let input_lines = input.input_lines();

    if prefix_fuzz < 0 && hunk.first <= 1 {
        if last_frozen_line > hunk.prefix_context {
            return None;
        }
        if suffix_fuzz < 0 && input_lines != pat_lines {
            return None;
        }
        // Anchored exactly to line 1: no leading lines are excused, only the
        // opposite (trailing) edge keeps its fuzz tolerance.
        let sf = suffix_fuzz.max(0) as u64;
        if patch_match(input, hunk, 0, 0, 0, sf, canonicalize_ws) {
            return Some(LocateResult { line: 1, offset: 0 });
        }
        return None;
    }

    if suffix_fuzz < 0 {
        let want_end = input_lines;
        let want_start = want_end.saturating_sub(pat_lines) + 1;
        let pf = prefix_fuzz.max(0) as u64;
        // Anchored exactly to the last line: no trailing lines are excused.
        if patch_match(input, hunk, want_start.saturating_sub(1), 0, pf, 0, canonicalize_ws) {
            return Some(LocateResult {
                line: want_start,
                offset: want_start as i64 - hunk.first as i64,
            });
        }
        return None;
    }

    let pf = prefix_fuzz.max(0) as u64;
    let sf = suffix_fuzz.max(0) as u64;
    let min_where = last_frozen_line + 1;
    let max_where = input_lines.saturating_sub(pat_lines.saturating_sub(sf)) + 1;

    let try_at = |guess: i64| -> bool {
        if guess < 1 {
            return false;
        }
        let guess = guess as u64;
        if guess < min_where || guess > max_where {
            return false;
        }
        patch_match(input, hunk, guess - 1, 0, pf, sf, canonicalize_ws)
    };

    if try_at(first_guess as i64) {
        return Some(LocateResult {
            line: first_guess,
            offset: in_offset,
        });
    }

    let max_pos_offset = input_lines as i64 - first_guess as i64 - pat_lines as i64 + 1;
    let max_neg_offset = first_guess as i64 - last_frozen_line as i64 - 1 + hunk.prefix_context as i64;

    let mut offset = 1i64;
    loop {
        let check_after = offset <= max_pos_offset;
        let check_before = offset <= max_neg_offset;
        if !check_after && !check_before {
            return None;
        }
        if check_after && try_at(first_guess as i64 + offset) {
            return Some(LocateResult {
                line: (first_guess as i64 + offset) as u64,
                offset: in_offset + offset,
            });
        }
        if check_before && try_at(first_guess as i64 - offset) {
            return Some(LocateResult {
                line: (first_guess as i64 - offset) as u64,
                offset: in_offset - offset,
            });
        }
        offset += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::PlanA;
    use crate::parser::parse_patch_file;

    #[test]
    fn canonical_ws_collapses_runs() {
        assert_eq!(canonical_ws(b"  foo   bar  "), b"foo bar");
        assert_eq!(canonical_ws(b"foo bar"), b"foo bar");
    }

    #[test]
    fn locates_hunk_at_offset() {
        let patch = b"--- f\n+++ f\n@@ -1,4 +1,4 @@\n A\n-B\n+B'\n C\n D\n";
        let entries = parse_patch_file(patch).unwrap();
        let hunk = &entries[0].hunks[0];

        let input = PlanA::from_bytes(b"Z\nA\nB\nC\nD\n".to_vec());
        let result = locate_hunk(&input, hunk, 0, 0, 0, 0, false).unwrap();
        assert_eq!(result.line, 2);
        assert_eq!(result.offset, 1);
    }

    #[test]
    fn fails_to_locate_when_content_differs() {
        let patch = b"--- f\n+++ f\n@@ -1,4 +1,4 @@\n A\n-B\n+B'\n C\n D\n";
        let entries = parse_patch_file(patch).unwrap();
        let hunk = &entries[0].hunks[0];

        let input = PlanA::from_bytes(b"A\nZ\nC\nD\n".to_vec());
        assert!(locate_hunk(&input, hunk, 0, 0, 0, 0, false).is_none());
    }
}
