//! Hunk applier (spec §4.6): walks a hunk's role markers against two cursors,
//! writing verbatim and changed lines to the output, with optional
//! `#ifdef`/`#ifndef` wrapping for `-D SYMBOL`.

use std::io::{self, Write};

use crate::error::PatchError;
use crate::hunk::{Hunk, Role};
use crate::input::LineIndex;

/// Tracks whether the last byte written to the output was a newline, so the
/// applier can tell whether it needs one before the next line.
pub struct OutputCursor<'w> {
    writer: &'w mut dyn Write,
    pub ends_with_newline: bool,
}

impl<'w> OutputCursor<'w> {
    pub fn new(writer: &'w mut dyn Write) -> Self {
        OutputCursor {
            writer,
            ends_with_newline: true,
        }
    }

    fn write_line(&mut self, bytes: &[u8], has_newline: bool) -> io::Result<()> {
        self.writer.write_all(bytes)?;
        if has_newline {
            self.writer.write_all(b"\n")?;
        }
        self.ends_with_newline = has_newline;
        Ok(())
    }

    fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)
    }

    /// Writes an arbitrary byte slice as a full line, always newline-terminated.
    /// Used by the merge engine to splice in conflict markers and reconstructed
    /// lines that have no corresponding `InputLine`/`HunkLine`.
    pub fn write_owned_line(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_line(bytes, true)
    }
}

/// Emits every input line from `last_frozen_line + 1` through `upto`
/// (inclusive) verbatim, advancing `last_frozen_line` in lockstep. This is
/// `copy_till` from spec §4.6.
pub fn copy_till(
    input: &dyn LineIndex,
    out: &mut OutputCursor,
    last_frozen_line: &mut u64,
    upto: u64,
) -> Result<(), PatchError> {
    if upto < *last_frozen_line {
        return Err(PatchError::Internal(format!(
            "misordered hunks: asked to copy backwards from {} to {}",
            last_frozen_line, upto
        )));
    }
    for line in (*last_frozen_line + 1)..=upto {
        let l = input.ifetch(line);
        out.write_line(&l.bytes, l.has_newline)
            .map_err(PatchError::from_io)?;
    }
    *last_frozen_line = upto;
    Ok(())
}

#[derive(Clone, Copy, Eq, PartialEq)]
enum DefineState {
    Outside,
    InIfndef,
    InElse,
}

fn set_define_state(
    out: &mut OutputCursor,
    state: &mut DefineState,
    want: DefineState,
    sym: &str,
) -> io::Result<()> {
    if *state == want {
        return Ok(());
    }
    match (*state, want) {
        (DefineState::Outside, DefineState::InIfndef) => {
            out.write_raw(format!("#ifndef {sym}\n").as_bytes())?;
        }
        (DefineState::InIfndef, DefineState::InElse) => {
            out.write_raw(b"#else\n")?;
        }
        (DefineState::Outside, DefineState::InElse) => {
            // pure insertion with no matching delete: still wrap in #ifdef
            out.write_raw(format!("#ifdef {sym}\n").as_bytes())?;
        }
        (_, DefineState::Outside) => {
            out.write_raw(b"#endif\n")?;
        }
        _ => {}
    }
    *state = want;
    Ok(())
}

/// Applies one hunk's change at input position `where_` (1-based), writing
/// to `out`. The hunk is assumed already oriented the way the caller wants
/// (reversed hunks should be produced via `Hunk::swap()` beforehand).
pub fn apply_hunk(
    input: &dyn LineIndex,
    hunk: &Hunk,
    where_: u64,
    out: &mut OutputCursor,
    last_frozen_line: &mut u64,
    do_defines: Option<&str>,
) -> Result<(), PatchError> {
    copy_till(input, out, last_frozen_line, where_.saturating_sub(1))?;

    let old_lines: Vec<_> = hunk.old_lines().collect();
    let new_lines: Vec<_> = hunk.new_lines().collect();
    let (mut oi, mut ni) = (0usize, 0usize);
    let mut define_state = DefineState::Outside;

    loop {
        let old_is_context = old_lines.get(oi).map(|l| l.role) == Some(Role::Context);
        let new_is_context = new_lines.get(ni).map(|l| l.role) == Some(Role::Context);

        if old_is_context && new_is_context {
            if let Some(sym) = do_defines {
                set_define_state(out, &mut define_state, DefineState::Outside, sym)
                    .map_err(PatchError::from_io)?;
            }
            *last_frozen_line += 1;
            let l = input.ifetch(*last_frozen_line);
            out.write_line(&l.bytes, l.has_newline)
                .map_err(PatchError::from_io)?;
            oi += 1;
            ni += 1;
            continue;
        }

        if oi >= old_lines.len() && ni >= new_lines.len() {
            break;
        }

        let del_start = oi;
        while old_lines.get(oi).map(|l| l.role) == Some(Role::Delete) {
            oi += 1;
        }
        let del_end = oi;
        let ins_start = ni;
        while new_lines.get(ni).map(|l| l.role) == Some(Role::Insert) {
            ni += 1;
        }
        let ins_end = ni;

        if del_start == del_end && ins_start == ins_end {
            return Err(PatchError::Internal(
                "mangled hunk: stalled between context sync points".into(),
            ));
        }

        if let Some(sym) = do_defines {
            if del_end > del_start {
                set_define_state(out, &mut define_state, DefineState::InIfndef, sym)
                    .map_err(PatchError::from_io)?;
                for line in &old_lines[del_start..del_end] {
                    out.write_line(line.storage.bytes(), line.has_newline)
                        .map_err(PatchError::from_io)?;
                }
            }
            if ins_end > ins_start {
                set_define_state(out, &mut define_state, DefineState::InElse, sym)
                    .map_err(PatchError::from_io)?;
                for line in &new_lines[ins_start..ins_end] {
                    out.write_line(line.storage.bytes(), line.has_newline)
                        .map_err(PatchError::from_io)?;
                }
            }
        } else {
            for line in &new_lines[ins_start..ins_end] {
                out.write_line(line.storage.bytes(), line.has_newline)
                    .map_err(PatchError::from_io)?;
            }
        }
        *last_frozen_line += (del_end - del_start) as u64;
    }

    if let Some(sym) = do_defines {
        set_define_state(out, &mut define_state, DefineState::Outside, sym)
            .map_err(PatchError::from_io)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::PlanA;
    use crate::parser::parse_patch_file;

    #[test]
    fn applies_simple_replacement() {
        let patch = b"--- f\n+++ f\n@@ -1,4 +1,4 @@\n A\n-B\n+B'\n C\n D\n";
        let entries = parse_patch_file(patch).unwrap();
        let hunk = &entries[0].hunks[0];
        let input = PlanA::from_bytes(b"A\nB\nC\nD\n".to_vec());

        let mut out_buf = Vec::new();
        let mut last_frozen = 0u64;
        {
            let mut out = OutputCursor::new(&mut out_buf);
            apply_hunk(&input, hunk, 1, &mut out, &mut last_frozen, None).unwrap();
            copy_till(&input, &mut out, &mut last_frozen, input.input_lines()).unwrap();
        }
        assert_eq!(out_buf, b"A\nB'\nC\nD\n");
        assert_eq!(last_frozen, 4);
    }

    #[test]
    fn applies_pure_insertion() {
        let patch = b"--- f\n+++ f\n@@ -1,2 +1,3 @@\n A\n+NEW\n B\n";
        let entries = parse_patch_file(patch).unwrap();
        let hunk = &entries[0].hunks[0];
        let input = PlanA::from_bytes(b"A\nB\n".to_vec());

        let mut out_buf = Vec::new();
        let mut last_frozen = 0u64;
        {
            let mut out = OutputCursor::new(&mut out_buf);
            apply_hunk(&input, hunk, 1, &mut out, &mut last_frozen, None).unwrap();
            copy_till(&input, &mut out, &mut last_frozen, input.input_lines()).unwrap();
        }
        assert_eq!(out_buf, b"A\nNEW\nB\n");
    }

    #[test]
    fn do_defines_wraps_replacement() {
        let patch = b"--- f\n+++ f\n@@ -1,3 +1,3 @@\n A\n-B\n+B'\n C\n";
        let entries = parse_patch_file(patch).unwrap();
        let hunk = &entries[0].hunks[0];
        let input = PlanA::from_bytes(b"A\nB\nC\n".to_vec());

        let mut out_buf = Vec::new();
        let mut last_frozen = 0u64;
        {
            let mut out = OutputCursor::new(&mut out_buf);
            apply_hunk(&input, hunk, 1, &mut out, &mut last_frozen, Some("SYM")).unwrap();
            copy_till(&input, &mut out, &mut last_frozen, input.input_lines()).unwrap();
        }
        assert_eq!(out_buf, b"A\n#ifndef SYM\nB\n#else\nB'\n#endif\nC\n");
    }
}
