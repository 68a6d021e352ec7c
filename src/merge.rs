//! Merge engine (spec §4.7): when a hunk cannot be applied cleanly, locates
//! the best partial match and emits a conflict block instead of failing
//! outright, in either MERGE or DIFF3 style.

use similar::{capture_diff_slices, Algorithm, DiffOp};

use crate::hunk::{Hunk, Role};
use crate::input::LineIndex;
use crate::locator::lines_match;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MergeStyle {
    Merge,
    Diff3,
}

/// Outcome of a widened-tolerance locate: the window in the input that best
/// overlaps the hunk's old side, and how many of its lines actually matched.
#[derive(Clone, Copy, Debug)]
pub struct MergeLocateResult {
    pub start: u64,
    pub end: u64,
    pub matched: u64,
}

/// Scans the band around `first_guess` for the window of `ptrn_lines` input
/// lines that shares the most content with the hunk's old side, tolerating up
/// to `2 * context` disagreements but requiring at least
/// `ptrn_lines - context` lines to still match (spec §4.7).
pub fn locate_merge(
    input: &dyn LineIndex,
    hunk: &Hunk,
    first_guess: u64,
    canonicalize_ws: bool,
) -> Option<MergeLocateResult> {
    let old: Vec<_> = hunk.old_lines().collect();
    let ptrn_lines = old.len() as u64;
    if ptrn_lines == 0 {
        return Some(MergeLocateResult {
            start: first_guess,
            end: first_guess.saturating_sub(1),
            matched: 0,
        });
    }

    let context = hunk.prefix_context.max(hunk.suffix_context);
    let min_matched = ptrn_lines.saturating_sub(context);
    let band = (2 * context).max(ptrn_lines);
    let input_lines = input.input_lines();

    let mut best: Option<MergeLocateResult> = None;
    let lo = first_guess.saturating_sub(band).max(1);
    let hi = (first_guess + band).min(input_lines.saturating_sub(ptrn_lines) + 1);

    let mut start = lo;
    while start <= hi {
        let mut matched = 0u64;
        for (i, line) in old.iter().enumerate() {
            if line.role != Role::Context && line.role != Role::Delete {
                continue;
            }
            let input_line = input.ifetch(start + i as u64);
            if lines_match(&input_line.bytes, line.storage.bytes(), canonicalize_ws) {
                matched += 1;
            }
        }
        if matched >= min_matched {
            let better = match &best {
                Some(b) => matched > b.matched,
                None => true,
            };
            if better {
                best = Some(MergeLocateResult {
                    start,
                    end: start + ptrn_lines - 1,
                    matched,
                });
            }
        }
        start += 1;
    }
    best
}

fn push_conflict(
    out: &mut Vec<Vec<u8>>,
    ours: &[Vec<u8>],
    ancestor: Option<&[Vec<u8>]>,
    theirs: &[Vec<u8>],
) {
    out.push(b"<<<<<<<".to_vec());
    out.extend(ours.iter().cloned());
    if let Some(ancestor) = ancestor {
        out.push(b"|||||||".to_vec());
        out.extend(ancestor.iter().cloned());
    }
    out.push(b"=======".to_vec());
    out.extend(theirs.iter().cloned());
    out.push(b">>>>>>>".to_vec());
}

/// Renders a conflict between the hunk's intended new text and what is
/// actually present in the input window, via a Myers alignment between the
/// hunk's old side (the "ancestor" the patch expected) and what the file
/// actually contains there (spec §4.7). Where the two agree, the hunk's
/// corresponding replacement text is emitted plainly; where they diverge,
/// the divergent span alone is wrapped in conflict markers, with the file's
/// actual content ("ours") first and the hunk's intended replacement
/// ("theirs") second — MERGE style omits the common-ancestor section that
/// DIFF3 style includes.
pub fn render_merge(
    input: &dyn LineIndex,
    hunk: &Hunk,
    window_start: u64,
    window_end: u64,
    style: MergeStyle,
) -> Vec<Vec<u8>> {
    let old_side: Vec<Vec<u8>> = hunk
        .old_lines()
        .map(|l| l.storage.bytes().to_vec())
        .collect();
    let new_side: Vec<Vec<u8>> = hunk
        .new_lines()
        .map(|l| l.storage.bytes().to_vec())
        .collect();
    let mut present: Vec<Vec<u8>> = Vec::new();
    if window_end >= window_start {
        for line in window_start..=window_end {
            present.push(input.ifetch(line).bytes);
        }
    }

    if old_side.len() != new_side.len() {
        // Hunk changes the line count; there is no 1:1 index alignment to
        // isolate just the divergent span, so the whole window becomes one
        // conflict block.
        let ops = capture_diff_slices(Algorithm::Myers, &old_side, &present);
        let diverges = ops.iter().any(|op| !matches!(op, DiffOp::Equal { .. }));
        if !diverges {
            return new_side;
        }
        let mut out = Vec::new();
        let ancestor = (style == MergeStyle::Diff3).then_some(old_side.as_slice());
        push_conflict(&mut out, &present, ancestor, &new_side);
        return out;
    }

    let ops = capture_diff_slices(Algorithm::Myers, &old_side, &present);
    let mut out = Vec::new();
    for op in ops {
        match op {
            DiffOp::Equal { old_index, len, .. } => {
                out.extend(new_side[old_index..old_index + len].iter().cloned());
            }
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => {
                let ancestor =
                    (style == MergeStyle::Diff3).then_some(&old_side[old_index..old_index + old_len]);
                push_conflict(
                    &mut out,
                    &present[new_index..new_index + new_len],
                    ancestor,
                    &new_side[old_index..old_index + old_len],
                );
            }
            DiffOp::Delete { old_index, old_len, .. } => {
                let ancestor =
                    (style == MergeStyle::Diff3).then_some(&old_side[old_index..old_index + old_len]);
                push_conflict(&mut out, &[], ancestor, &new_side[old_index..old_index + old_len]);
            }
            DiffOp::Insert { new_index, new_len, .. } => {
                push_conflict(&mut out, &present[new_index..new_index + new_len], None, &[]);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::PlanA;
    use crate::parser::parse_patch_file;

    fn sample_hunk() -> Hunk {
        let patch = b"--- f\n+++ f\n@@ -1,3 +1,3 @@\n A\n-B\n+B'\n C\n";
        let entries = parse_patch_file(patch).unwrap();
        entries[0].hunks[0].clone()
    }

    #[test]
    fn locate_merge_finds_partial_match() {
        let hunk = sample_hunk();
        let input = PlanA::from_bytes(b"A\nB2\nC\nD\n".to_vec());
        let result = locate_merge(&input, &hunk, 1, false).unwrap();
        assert_eq!(result.start, 1);
        assert_eq!(result.matched, 2);
    }

    #[test]
    fn render_merge_isolates_divergent_span() {
        let hunk = sample_hunk();
        let input = PlanA::from_bytes(b"A\nB2\nC\nD\n".to_vec());
        let out = render_merge(&input, &hunk, 1, 3, MergeStyle::Merge);
        let joined: Vec<Vec<u8>> = out;
        assert_eq!(
            joined,
            vec![
                b"A".to_vec(),
                b"<<<<<<<".to_vec(),
                b"B2".to_vec(),
                b"=======".to_vec(),
                b"B'".to_vec(),
                b">>>>>>>".to_vec(),
                b"C".to_vec(),
            ]
        );
    }

    #[test]
    fn render_merge_diff3_includes_ancestor() {
        let hunk = sample_hunk();
        let input = PlanA::from_bytes(b"A\nB2\nC\nD\n".to_vec());
        let out = render_merge(&input, &hunk, 1, 3, MergeStyle::Diff3);
        assert!(out.contains(&b"|||||||".to_vec()));
        assert!(out.contains(&b"B".to_vec()));
    }

    #[test]
    fn clean_match_returns_new_side_only() {
        let hunk = sample_hunk();
        let input = PlanA::from_bytes(b"A\nB\nC\n".to_vec());
        let out = render_merge(&input, &hunk, 1, 3, MergeStyle::Merge);
        assert_eq!(out, vec![b"A".to_vec(), b"B'".to_vec(), b"C".to_vec()]);
    }
}
