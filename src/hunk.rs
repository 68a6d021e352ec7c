//! The normalized hunk representation shared by every dialect (spec §3, §4.4.2).

use std::rc::Rc;

/// One line inside a hunk, tagged with the role it plays in the dialect-neutral
/// shape described in spec §3.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    /// Marks the start of the "old" half.
    Old,
    /// Marks the start of the "new" half.
    New,
    /// Sentinel past the last line of the hunk.
    End,
    /// Context line, unchanged on both sides.
    Context,
    /// Line present only on the old side.
    Delete,
    /// Line present only on the new side.
    Insert,
    /// Paired old/new replacement line (unified `!` before normalization).
    Change,
    /// Line continuation marker ("\ No newline at end of file").
    NoNewline,
}

/// Where a hunk line's bytes live. Context lines reconstructed from the
/// opposite half of a context diff point into shared storage and must not be
/// duplicated or freed independently — the `Borrowed` variant models that,
/// replacing the C source's `[efake_begin, efake_end]` index range trick.
#[derive(Clone, Debug)]
pub enum LineStorage {
    Owned(Rc<Vec<u8>>),
    Borrowed(Rc<Vec<u8>>),
}

impl LineStorage {
    pub fn bytes(&self) -> &[u8] {
        match self {
            LineStorage::Owned(b) | LineStorage::Borrowed(b) => b,
        }
    }

    pub fn is_faked(&self) -> bool {
        matches!(self, LineStorage::Borrowed(_))
    }
}

/// One payload line of a hunk: its role marker, its bytes, and whether the
/// line as recorded carries a trailing newline.
#[derive(Clone, Debug)]
pub struct HunkLine {
    pub role: Role,
    pub storage: LineStorage,
    pub has_newline: bool,
}

impl HunkLine {
    pub fn len(&self) -> usize {
        self.storage.bytes().len() + usize::from(self.has_newline)
    }
}

/// The dialect a hunk (or whole patch-file entry) was parsed from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Dialect {
    Unified,
    Context,
    NewContext,
    Normal,
    Ed,
    GitBinary,
}

/// A single contiguous edit block, normalized to the shape of spec §3.
///
/// `lines` holds exactly: one `Role::Old` sentinel, the old-side payload,
/// one `Role::New` sentinel, the new-side payload, one `Role::End` sentinel.
/// `swap()` flips the two halves in place.
#[derive(Clone, Debug)]
pub struct Hunk {
    pub dialect: Dialect,
    pub first: u64,
    pub newfirst: u64,
    pub ptrn_lines: u64,
    pub repl_lines: u64,
    pub prefix_context: u64,
    pub suffix_context: u64,
    pub lines: Vec<HunkLine>,
    /// Patch-file line number where this hunk's header started (diagnostics).
    pub hunk_beg: u64,
}

impl Hunk {
    /// Lines on the old side only (excludes the `Old`/`New`/`End` sentinels).
    pub fn old_lines(&self) -> impl Iterator<Item = &HunkLine> {
        self.lines
            .iter()
            .skip(1)
            .take(self.ptrn_lines as usize)
    }

    /// Lines on the new side only.
    pub fn new_lines(&self) -> impl Iterator<Item = &HunkLine> {
        self.lines
            .iter()
            .skip(2 + self.ptrn_lines as usize)
            .take(self.repl_lines as usize)
    }

    /// Invariant check used by tests and by the parser after normalization:
    /// exactly one `Old` at index 0, one `New` at `ptrn_lines + 1`, one `End`
    /// sentinel as the last element.
    pub fn well_formed(&self) -> bool {
        let end = 1 + self.ptrn_lines as usize + 1 + self.repl_lines as usize;
        self.lines.len() == end + 1
            && matches!(self.lines.first().map(|l| l.role), Some(Role::Old))
            && matches!(
                self.lines.get(1 + self.ptrn_lines as usize).map(|l| l.role),
                Some(Role::New)
            )
            && matches!(self.lines.last().map(|l| l.role), Some(Role::End))
    }

    /// Reverse old and new sides in place: `*`/`=` trade places, `-`/`+` flip.
    /// `swap(swap(h)) == h` for every well-formed hunk (spec §8).
    pub fn swap(&mut self) {
        let old_count = self.ptrn_lines as usize;
        let new_count = self.repl_lines as usize;

        let mut old_payload: Vec<HunkLine> = self.lines.drain(1..1 + old_count).collect();
        // the `New` sentinel is now at index 0 of the remainder; drop it after
        // reading past it
        let new_start = 1; // `New` sentinel
        let mut new_payload: Vec<HunkLine> =
            self.lines.drain(new_start + 1..new_start + 1 + new_count).collect();

        for line in &mut old_payload {
            line.role = match line.role {
                Role::Delete => Role::Insert,
                Role::Insert => Role::Delete,
                other => other,
            };
        }
        for line in &mut new_payload {
            line.role = match line.role {
                Role::Delete => Role::Insert,
                Role::Insert => Role::Delete,
                other => other,
            };
        }

        let mut rebuilt = Vec::with_capacity(self.lines.len() + old_payload.len() + new_payload.len());
        rebuilt.push(HunkLine {
            role: Role::Old,
            storage: LineStorage::Owned(Rc::new(Vec::new())),
            has_newline: false,
        });
        rebuilt.extend(new_payload);
        rebuilt.push(HunkLine {
            role: Role::New,
            storage: LineStorage::Owned(Rc::new(Vec::new())),
            has_newline: false,
        });
        rebuilt.extend(old_payload);
        rebuilt.push(HunkLine {
            role: Role::End,
            storage: LineStorage::Owned(Rc::new(Vec::new())),
            has_newline: false,
        });

        self.lines = rebuilt;
        std::mem::swap(&mut self.first, &mut self.newfirst);
        std::mem::swap(&mut self.ptrn_lines, &mut self.repl_lines);
    }
}
