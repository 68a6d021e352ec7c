//! Line-indexed input abstraction (spec §4.3): `ifetch(line) -> (bytes, len)`
//! over the file being patched, with two back-ends.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::PatchError;

/// A single line's view into the input: its bytes (without the trailing
/// newline) and whether the stored line carried one.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InputLine {
    pub bytes: Vec<u8>,
    pub has_newline: bool,
}

impl InputLine {
    pub fn len(&self) -> usize {
        self.bytes.len() + usize::from(self.has_newline)
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty() && !self.has_newline
    }
}

/// Either input back-end implements this. `ifetch(0)` is undefined;
/// `ifetch(1)..=ifetch(input_lines)` are valid; `ifetch(input_lines + 1)`
/// always returns a zero-length line (spec §3, §4.3).
pub trait LineIndex {
    fn input_lines(&self) -> u64;
    fn ifetch(&self, line: u64) -> InputLine;

    /// Concatenating `ifetch(1)..=ifetch(input_lines)` must reproduce the
    /// file's bytes exactly (spec §8 testable property).
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for i in 1..=self.input_lines() {
            let line = self.ifetch(i);
            out.extend_from_slice(&line.bytes);
            if line.has_newline {
                out.push(b'\n');
            }
        }
        out
    }
}

/// In-memory back-end: the whole file is read into one buffer and a table of
/// line boundaries is built over it.
pub struct PlanA {
    buf: Vec<u8>,
    /// Byte offsets where each line starts; `starts[i]` is the start of line
    /// `i + 1`. One extra trailing entry marks end-of-buffer.
    starts: Vec<usize>,
    has_final_newline: bool,
}

impl PlanA {
    pub fn from_bytes(buf: Vec<u8>) -> Self {
        let mut starts = Vec::new();
        if !buf.is_empty() {
            starts.push(0);
            for pos in memchr::Memchr::new(b'\n', &buf) {
                if pos + 1 < buf.len() {
                    starts.push(pos + 1);
                }
            }
        }
        let has_final_newline = buf.last() == Some(&b'\n');
        starts.push(buf.len());
        PlanA {
            buf,
            starts,
            has_final_newline,
        }
    }

    /// Attempts to build a Plan A index; fails only when the caller's
    /// allocation budget has already been exhausted upstream (plan A is never
    /// itself fallible once the bytes are in hand — the "out of memory"
    /// fallback to Plan B happens one level up, in the orchestrator).
    pub fn open(path: &Path) -> Result<Self, PatchError> {
        let mut file = File::open(path).map_err(PatchError::from_io)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).map_err(PatchError::from_io)?;
        Ok(Self::from_bytes(buf))
    }
}

impl LineIndex for PlanA {
    fn input_lines(&self) -> u64 {
        (self.starts.len().saturating_sub(1)) as u64
    }

    fn ifetch(&self, line: u64) -> InputLine {
        let n = self.input_lines();
        if line == 0 || line > n + 1 {
            return InputLine::default();
        }
        if line == n + 1 {
            return InputLine::default();
        }
        let idx = (line - 1) as usize;
        let start = self.starts[idx];
        let mut end = self.starts[idx + 1];
        let is_last = idx + 1 == self.starts.len() - 1;
        let has_newline = if is_last {
            self.has_final_newline
        } else {
            true
        };
        if has_newline && end > start {
            end -= 1;
        }
        InputLine {
            bytes: self.buf[start..end].to_vec(),
            has_newline,
        }
    }
}

/// Paged back-end: streams the input into a scratch temp file of fixed-width
/// records (`reclen` = longest line seen), and keeps two in-memory buffers of
/// `lines_per_buf` records each, refilled on cache miss (spec §4.3).
pub struct PlanB {
    scratch: File,
    reclen: usize,
    lines_per_buf: usize,
    line_count: u64,
    line_lens: Vec<(u32, bool)>,
    buffers: std::cell::RefCell<[Option<(u64, Vec<u8>)>; 2]>,
}

impl PlanB {
    const DEFAULT_BUFSIZE: usize = 8192;

    pub fn open(path: &Path) -> Result<Self, PatchError> {
        let file = File::open(path).map_err(PatchError::from_io)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, PatchError> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).map_err(PatchError::from_io)?;

        let mut line_lens = Vec::new();
        let mut max_len = 1usize;
        let mut start = 0usize;
        while start < buf.len() {
            let nl = memchr::memchr(b'\n', &buf[start..]).map(|p| start + p);
            let (end, has_newline) = match nl {
                Some(p) => (p, true),
                None => (buf.len(), false),
            };
            let len = end - start;
            max_len = max_len.max(len);
            line_lens.push((len as u32, has_newline));
            start = end + usize::from(has_newline);
        }

        let reclen = max_len + 1;
        let lines_per_buf = (Self::DEFAULT_BUFSIZE / reclen).max(1);

        let mut scratch = tempfile::tempfile().map_err(PatchError::from_io)?;
        start = 0;
        for &(len, has_newline) in &line_lens {
            let len = len as usize;
            let mut record = vec![0u8; reclen];
            record[..len].copy_from_slice(&buf[start..start + len]);
            scratch.write_all(&record).map_err(PatchError::from_io)?;
            start += len + usize::from(has_newline);
        }

        Ok(PlanB {
            scratch,
            reclen,
            lines_per_buf,
            line_count: line_lens.len() as u64,
            line_lens,
            buffers: std::cell::RefCell::new([None, None]),
        })
    }

    fn load_block(&self, block_base: u64) -> Vec<u8> {
        let mut scratch = self.scratch.try_clone().expect("scratch fd clone");
        let byte_offset = block_base * self.reclen as u64;
        let to_read = self.lines_per_buf * self.reclen;
        scratch
            .seek(SeekFrom::Start(byte_offset))
            .expect("seek scratch");
        let mut buf = vec![0u8; to_read];
        let _ = scratch.read(&mut buf);
        buf
    }
}

impl LineIndex for PlanB {
    fn input_lines(&self) -> u64 {
        self.line_count
    }

    fn ifetch(&self, line: u64) -> InputLine {
        if line == 0 || line > self.line_count + 1 {
            return InputLine::default();
        }
        if line == self.line_count + 1 {
            return InputLine::default();
        }
        let idx0 = line - 1;
        let block = idx0 / self.lines_per_buf as u64;
        let within = (idx0 % self.lines_per_buf as u64) as usize;

        let mut buffers = self.buffers.borrow_mut();
        let slot = (block as usize) % 2;
        let need_reload = match &buffers[slot] {
            Some((cached_block, _)) => *cached_block != block,
            None => true,
        };
        if need_reload {
            let data = self.load_block(block * self.lines_per_buf as u64);
            buffers[slot] = Some((block, data));
        }
        let (_, data) = buffers[slot].as_ref().unwrap();
        let rec_start = within * self.reclen;
        let (len, has_newline) = self.line_lens[idx0 as usize];
        let bytes = data[rec_start..rec_start + len as usize].to_vec();
        InputLine { bytes, has_newline }
    }
}

/// Scans the input for a `Prereq:` revision string, requiring a whole-word
/// match (surrounded by whitespace or a buffer boundary), per spec §4.3.
pub fn contains_prereq_word(haystack: &[u8], needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    let needle = needle.as_bytes();
    let mut start = 0;
    while let Some(pos) = find_subslice(&haystack[start..], needle) {
        let abs = start + pos;
        let before_ok = abs == 0 || haystack[abs - 1].is_ascii_whitespace();
        let after = abs + needle.len();
        let after_ok = after == haystack.len() || haystack[after].is_ascii_whitespace();
        if before_ok && after_ok {
            return true;
        }
        start = abs + 1;
        if start >= haystack.len() {
            break;
        }
    }
    false
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    let first = needle[0];
    let mut offset = 0;
    while let Some(pos) = memchr::memchr(first, &haystack[offset..]) {
        let abs = offset + pos;
        if haystack[abs..].starts_with(needle) {
            return Some(abs);
        }
        offset = abs + 1;
        if offset >= haystack.len() {
            break;
        }
    }
    None
}

/// Picks Plan A when the file is small enough to comfortably fit in memory,
/// falling back to Plan B otherwise or if Plan A's read fails (spec §5: "the
/// line-index plan A buffer is bounded by input size; failure to allocate
/// silently downgrades to plan B and retries").
pub enum AnyInput {
    A(PlanA),
    B(PlanB),
}

impl AnyInput {
    pub const PLAN_A_CEILING: u64 = 64 * 1024 * 1024;

    pub fn open(path: &Path) -> Result<Self, PatchError> {
        let meta = std::fs::metadata(path).map_err(PatchError::from_io)?;
        if meta.len() <= Self::PLAN_A_CEILING {
            if let Ok(a) = PlanA::open(path) {
                return Ok(AnyInput::A(a));
            }
        }
        Ok(AnyInput::B(PlanB::open(path)?))
    }
}

impl LineIndex for AnyInput {
    fn input_lines(&self) -> u64 {
        match self {
            AnyInput::A(a) => a.input_lines(),
            AnyInput::B(b) => b.input_lines(),
        }
    }

    fn ifetch(&self, line: u64) -> InputLine {
        match self {
            AnyInput::A(a) => a.ifetch(line),
            AnyInput::B(b) => b.ifetch(line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_a_roundtrips_bytes() {
        let data = b"A\nB\nC\nD\n".to_vec();
        let plan = PlanA::from_bytes(data.clone());
        assert_eq!(plan.input_lines(), 4);
        assert_eq!(plan.to_bytes(), data);
    }

    #[test]
    fn plan_a_handles_missing_final_newline() {
        let data = b"A\nB".to_vec();
        let plan = PlanA::from_bytes(data.clone());
        assert_eq!(plan.input_lines(), 2);
        let last = plan.ifetch(2);
        assert_eq!(last.bytes, b"B");
        assert!(!last.has_newline);
        assert_eq!(plan.to_bytes(), data);
    }

    #[test]
    fn ifetch_beyond_end_is_empty() {
        let plan = PlanA::from_bytes(b"A\nB\n".to_vec());
        let past = plan.ifetch(plan.input_lines() + 1);
        assert!(past.is_empty());
    }

    #[test]
    fn plan_b_matches_plan_a() {
        let data = b"one\ntwo\nthree\nfour\nfive\n".to_vec();
        let a = PlanA::from_bytes(data.clone());
        let b = PlanB::from_reader(std::io::Cursor::new(data.clone())).unwrap();
        assert_eq!(a.input_lines(), b.input_lines());
        for i in 1..=a.input_lines() {
            assert_eq!(a.ifetch(i), b.ifetch(i));
        }
        assert_eq!(b.to_bytes(), data);
    }

    #[test]
    fn prereq_requires_whole_word() {
        let haystack = b"this is revision 1.23 of the file";
        assert!(contains_prereq_word(haystack, "1.23"));
        assert!(!contains_prereq_word(haystack, "1.2"));
        assert!(!contains_prereq_word(haystack, "revision1"));
    }
}
