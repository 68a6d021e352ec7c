//! Patch parser and hunk store (spec §4.4): dialect auto-detection over the
//! four legacy diff dialects plus extended git-diff metadata, normalized into
//! the dialect-neutral `Hunk` shape from `hunk.rs`.

use std::rc::Rc;

use crate::error::PatchError;
use crate::hunk::{Dialect, Hunk, HunkLine, LineStorage, Role};

/// Ternary "does this side exist" flag from spec §3: 0 = unknown, 1 =
/// heuristic, 2 = declared by an extended header.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Nonexistent {
    Unknown,
    Heuristic,
    Declared,
}

impl Default for Nonexistent {
    fn default() -> Self {
        Nonexistent::Unknown
    }
}

/// File-level metadata for one entry in the patch stream (spec §3 "Patch
/// state").
#[derive(Clone, Debug, Default)]
pub struct PatchFileEntry {
    pub old_name: Option<String>,
    pub new_name: Option<String>,
    pub index_name: Option<String>,
    pub old_mode: Option<u32>,
    pub new_mode: Option<u32>,
    pub git_diff: bool,
    pub rename_from: Option<String>,
    pub rename_to: Option<String>,
    pub copy_from: Option<String>,
    pub copy_to: Option<String>,
    pub deleted_file: bool,
    pub new_file: bool,
    pub binary: bool,
    pub prereq: Option<String>,
    pub old_nonexistent: Nonexistent,
    pub new_nonexistent: Nonexistent,
    pub hunks: Vec<Hunk>,
}

impl PatchFileEntry {
    pub fn effective_old_name(&self) -> Option<&str> {
        self.rename_from
            .as_deref()
            .or(self.copy_from.as_deref())
            .or(self.old_name.as_deref())
            .or(self.index_name.as_deref())
    }

    pub fn effective_new_name(&self) -> Option<&str> {
        self.rename_to
            .as_deref()
            .or(self.copy_to.as_deref())
            .or(self.new_name.as_deref())
            .or(self.index_name.as_deref())
    }
}

struct RawLine {
    bytes: Vec<u8>,
    has_newline: bool,
}

/// Strips a constant leading indentation (spaces, tabs at 8-column stops, or
/// a literal `X`) uniformly from every line of the patch (spec §4.4.1).
fn detect_and_strip_indent(lines: &mut [RawLine]) {
    let is_indent_byte = |b: u8| b == b' ' || b == b'\t' || b == b'X';

    let indent_len = lines
        .iter()
        .find(|l| {
            let trimmed: Vec<u8> = l
                .bytes
                .iter()
                .skip_while(|&&b| is_indent_byte(b))
                .cloned()
                .collect();
            looks_like_header_start(&trimmed)
        })
        .map(|l| l.bytes.iter().take_while(|&&b| is_indent_byte(b)).count())
        .unwrap_or(0);

    if indent_len == 0 {
        return;
    }

    for line in lines.iter_mut() {
        let strip = line
            .bytes
            .iter()
            .take(indent_len)
            .take_while(|&&b| is_indent_byte(b))
            .count();
        if strip == indent_len {
            line.bytes.drain(0..indent_len);
        }
    }
}

fn looks_like_header_start(line: &[u8]) -> bool {
    line.starts_with(b"--- ")
        || line.starts_with(b"+++ ")
        || line.starts_with(b"*** ")
        || line.starts_with(b"@@ ")
        || line.starts_with(b"diff --git ")
        || is_normal_range_header(line)
}

fn split_lines(data: &[u8]) -> Vec<RawLine> {
    let mut out = Vec::new();
    let mut start = 0usize;
    while start < data.len() {
        match memchr::memchr(b'\n', &data[start..]) {
            Some(p) => {
                out.push(RawLine {
                    bytes: data[start..start + p].to_vec(),
                    has_newline: true,
                });
                start += p + 1;
            }
            None => {
                out.push(RawLine {
                    bytes: data[start..].to_vec(),
                    has_newline: false,
                });
                break;
            }
        }
    }
    out
}

fn bstr(bytes: &[u8]) -> std::borrow::Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

/// `NaNcNb` / `NaNaNb` / `NadNb` — a normal-diff range command header.
fn is_normal_range_header(line: &[u8]) -> bool {
    let s = bstr(line);
    let s = s.trim_end();
    let mut chars = s.chars().peekable();
    let mut saw_digit = false;
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            saw_digit = true;
            chars.next();
        } else {
            break;
        }
    }
    if !saw_digit {
        return false;
    }
    match chars.next() {
        Some(',') => {
            let mut saw_second = false;
            while let Some(&c) = chars.peek() {
                if c.is_ascii_digit() {
                    saw_second = true;
                    chars.next();
                } else {
                    break;
                }
            }
            if !saw_second {
                return false;
            }
            matches!(chars.next(), Some('a') | Some('c') | Some('d'))
        }
        Some('a') | Some('c') | Some('d') => true,
        _ => false,
    }
}

fn owned_line(role: Role, bytes: Vec<u8>, has_newline: bool) -> HunkLine {
    HunkLine {
        role,
        storage: LineStorage::Owned(Rc::new(bytes)),
        has_newline,
    }
}

fn borrowed_line(storage: &LineStorage, has_newline: bool) -> HunkLine {
    let bytes = match storage {
        LineStorage::Owned(rc) | LineStorage::Borrowed(rc) => Rc::clone(rc),
    };
    HunkLine {
        role: Role::Context,
        storage: LineStorage::Borrowed(bytes),
        has_newline,
    }
}

fn leading_context_run(payload: &[HunkLine]) -> usize {
    payload.iter().take_while(|l| l.role == Role::Context).count()
}

fn trailing_context_run(payload: &[HunkLine]) -> usize {
    payload.iter().rev().take_while(|l| l.role == Role::Context).count()
}

/// Pads a context-diff half that elided some of its unchanged lines, by
/// borrowing the missing leading/trailing context from the opposite half
/// (spec §4.4.2's `[bfake, efake]` range).
fn reconstruct_faked_context(short: &mut Vec<HunkLine>, target_len: u64, other: &[HunkLine]) {
    if short.len() as u64 >= target_len {
        return;
    }
    let missing = target_len as usize - short.len();
    let other_prefix = leading_context_run(other);
    let other_suffix = trailing_context_run(other);
    let short_prefix = leading_context_run(short);
    let short_suffix = trailing_context_run(short);

    let missing_prefix = other_prefix.saturating_sub(short_prefix).min(missing);
    let missing_suffix = (missing - missing_prefix).min(other_suffix.saturating_sub(short_suffix));

    if missing_prefix > 0 {
        let mut prefix_lines: Vec<HunkLine> = other[other_prefix - missing_prefix..other_prefix]
            .iter()
            .map(|l| borrowed_line(&l.storage, l.has_newline))
            .collect();
        prefix_lines.extend(short.drain(..));
        *short = prefix_lines;
    }
    if missing_suffix > 0 {
        let start = other.len() - other_suffix;
        let suffix_lines: Vec<HunkLine> = other[start..start + missing_suffix]
            .iter()
            .map(|l| borrowed_line(&l.storage, l.has_newline))
            .collect();
        short.extend(suffix_lines);
    }
}

fn sentinel(role: Role) -> HunkLine {
    HunkLine {
        role,
        storage: LineStorage::Owned(Rc::new(Vec::new())),
        has_newline: false,
    }
}

/// Parses a whole patch-file byte stream into its entries.
pub fn parse_patch_file(data: &[u8]) -> Result<Vec<PatchFileEntry>, PatchError> {
    let mut lines = split_lines(data);
    detect_and_strip_indent(&mut lines);

    let mut entries = Vec::new();
    let mut idx = 0usize;
    let mut entry = PatchFileEntry::default();
    let mut entry_has_content = false;

    while idx < lines.len() {
        let text = bstr(&lines[idx].bytes).into_owned();

        if text.starts_with("diff --git ") {
            if entry_has_content {
                entries.push(std::mem::take(&mut entry));
            }
            entry = PatchFileEntry {
                git_diff: true,
                ..Default::default()
            };
            entry_has_content = true;
            if let Some((a, b)) = parse_diff_git_names(&text) {
                entry.old_name = Some(a);
                entry.new_name = Some(b);
            }
            idx += 1;
            continue;
        }

        if text.starts_with("Prereq:") {
            entry.prereq = Some(text["Prereq:".len()..].trim().to_string());
            idx += 1;
            continue;
        }
        if let Some(rest) = text.strip_prefix("index ") {
            entry.index_name = Some(rest.trim().to_string());
            idx += 1;
            continue;
        }
        if let Some(rest) = text.strip_prefix("old mode ") {
            entry.old_mode = u32::from_str_radix(rest.trim(), 8).ok();
            idx += 1;
            continue;
        }
        if let Some(rest) = text.strip_prefix("new mode ") {
            entry.new_mode = u32::from_str_radix(rest.trim(), 8).ok();
            idx += 1;
            continue;
        }
        if let Some(rest) = text.strip_prefix("deleted file mode ") {
            entry.deleted_file = true;
            entry.old_mode = u32::from_str_radix(rest.trim(), 8).ok();
            entry.new_nonexistent = Nonexistent::Declared;
            idx += 1;
            continue;
        }
        if let Some(rest) = text.strip_prefix("new file mode ") {
            entry.new_file = true;
            entry.new_mode = u32::from_str_radix(rest.trim(), 8).ok();
            entry.old_nonexistent = Nonexistent::Declared;
            idx += 1;
            continue;
        }
        if let Some(rest) = text.strip_prefix("rename from ") {
            entry.rename_from = Some(rest.trim().to_string());
            idx += 1;
            continue;
        }
        if let Some(rest) = text.strip_prefix("rename to ") {
            entry.rename_to = Some(rest.trim().to_string());
            idx += 1;
            continue;
        }
        if let Some(rest) = text.strip_prefix("copy from ") {
            entry.copy_from = Some(rest.trim().to_string());
            idx += 1;
            continue;
        }
        if let Some(rest) = text.strip_prefix("copy to ") {
            entry.copy_to = Some(rest.trim().to_string());
            idx += 1;
            continue;
        }
        if text.starts_with("Binary files ") || text.starts_with("GIT binary patch") {
            entry.binary = true;
            idx += 1;
            continue;
        }

        if text.starts_with("--- ") {
            entry.old_name = Some(parse_filename(&text[4..]));
            entry_has_content = true;
            idx += 1;
            if idx < lines.len() {
                let next = bstr(&lines[idx].bytes).into_owned();
                if let Some(rest) = next.strip_prefix("+++ ") {
                    entry.new_name = Some(parse_filename(rest));
                    idx += 1;
                }
            }
            continue;
        }

        if text.starts_with("@@ ") {
            let (hunk, consumed) = parse_unified_hunk(&lines, idx)?;
            entry.hunks.push(hunk);
            entry_has_content = true;
            idx += consumed;
            continue;
        }

        if text.starts_with("*** ") && text.trim_end().ends_with("****") {
            let (hunk, consumed, new_name_guess) = parse_context_hunk(&lines, idx)?;
            entry.hunks.push(hunk);
            entry_has_content = true;
            idx += consumed;
            if entry.old_name.is_none() {
                entry.old_name = new_name_guess.0;
            }
            if entry.new_name.is_none() {
                entry.new_name = new_name_guess.1;
            }
            continue;
        }

        if text.starts_with("*** ") && !text.trim_end().ends_with("****") {
            // old-style `--- oldfile` / `*** newfile` header pair
            entry.old_name = Some(parse_filename(&text[4..]));
            entry_has_content = true;
            idx += 1;
            if idx < lines.len() {
                let next = bstr(&lines[idx].bytes).into_owned();
                if let Some(rest) = next.strip_prefix("--- ") {
                    entry.new_name = Some(parse_filename(rest));
                    idx += 1;
                }
            }
            continue;
        }

        if is_normal_range_header(&lines[idx].bytes) {
            let (hunk, consumed) = parse_normal_hunk(&lines, idx)?;
            entry.hunks.push(hunk);
            entry_has_content = true;
            idx += consumed;
            continue;
        }

        idx += 1;
    }

    if entry_has_content {
        entries.push(entry);
    }

    Ok(entries)
}

fn parse_filename(rest: &str) -> String {
    rest.split('\t')
        .next()
        .unwrap_or(rest)
        .trim()
        .to_string()
}

fn parse_diff_git_names(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix("diff --git ")?;
    let a_prefixed = rest.split(" b/").next()?;
    let a = a_prefixed.strip_prefix("a/").unwrap_or(a_prefixed);
    let b_prefixed = rest.rsplit(" b/").next()?;
    Some((a.to_string(), b_prefixed.to_string()))
}

fn parse_at_numbers(spec: &str) -> Result<(u64, u64), PatchError> {
    // spec like "12,4" or "12"
    let mut parts = spec.splitn(2, ',');
    let first = parts.next().unwrap_or("0");
    let start: u64 = first.parse().map_err(|_| PatchError::MalformedPatch {
        line: 0,
        reason: format!("bad line number in hunk header: {spec}"),
    })?;
    let len: u64 = match parts.next() {
        Some(n) => n.parse().map_err(|_| PatchError::MalformedPatch {
            line: 0,
            reason: format!("bad line count in hunk header: {spec}"),
        })?,
        None => 1,
    };
    Ok((start, len))
}

fn parse_unified_hunk(lines: &[RawLine], at_idx: usize) -> Result<(Hunk, usize), PatchError> {
    let header = bstr(&lines[at_idx].bytes).into_owned();
    let hunk_beg = at_idx as u64 + 1;
    let body = header
        .strip_prefix("@@ -")
        .ok_or_else(|| PatchError::MalformedPatch {
            line: hunk_beg,
            reason: "malformed unified hunk header".into(),
        })?;
    let end_at = body.find(" @@").ok_or_else(|| PatchError::MalformedPatch {
        line: hunk_beg,
        reason: "unterminated unified hunk header".into(),
    })?;
    let nums = &body[..end_at];
    let mut halves = nums.splitn(2, " +");
    let old_spec = halves.next().ok_or_else(|| PatchError::MalformedPatch {
        line: hunk_beg,
        reason: "missing old-side range".into(),
    })?;
    let new_spec = halves.next().ok_or_else(|| PatchError::MalformedPatch {
        line: hunk_beg,
        reason: "missing new-side range".into(),
    })?;
    let (old_start, old_len) = parse_at_numbers(old_spec)?;
    let (new_start, new_len) = parse_at_numbers(new_spec)?;

    let mut body_lines = Vec::new();
    body_lines.push(sentinel(Role::Old));
    let mut old_payload = Vec::new();
    let mut new_payload = Vec::new();
    let mut cursor = at_idx + 1;
    let mut old_seen = 0u64;
    let mut new_seen = 0u64;

    while old_seen < old_len || new_seen < new_len {
        if cursor >= lines.len() {
            return Err(PatchError::MalformedPatch {
                line: hunk_beg,
                reason: "hunk body truncated".into(),
            });
        }
        let raw = &lines[cursor];
        if raw.bytes.is_empty() {
            // a bare empty line inside a hunk body is a context line with no text
            old_payload.push(owned_line(Role::Context, Vec::new(), raw.has_newline));
            new_payload.push(owned_line(Role::Context, Vec::new(), raw.has_newline));
            old_seen += 1;
            new_seen += 1;
            cursor += 1;
            continue;
        }
        let marker = raw.bytes[0];
        let rest = raw.bytes[1..].to_vec();
        match marker {
            b' ' => {
                old_payload.push(owned_line(Role::Context, rest.clone(), raw.has_newline));
                new_payload.push(owned_line(Role::Context, rest, raw.has_newline));
                old_seen += 1;
                new_seen += 1;
            }
            b'-' => {
                old_payload.push(owned_line(Role::Delete, rest, raw.has_newline));
                old_seen += 1;
            }
            b'+' => {
                new_payload.push(owned_line(Role::Insert, rest, raw.has_newline));
                new_seen += 1;
            }
            b'\\' => {
                // "\ No newline at end of file": mark the immediately
                // preceding payload line
                if let Some(last) = old_payload.last_mut() {
                    last.has_newline = false;
                }
                if let Some(last) = new_payload.last_mut() {
                    last.has_newline = false;
                }
            }
            _ => {
                return Err(PatchError::MalformedPatch {
                    line: cursor as u64 + 1,
                    reason: format!("unexpected marker {:?} in unified hunk", marker as char),
                });
            }
        }
        cursor += 1;
    }

    let prefix_context = old_payload
        .iter()
        .take_while(|l| l.role == Role::Context)
        .count() as u64;
    let suffix_context = old_payload
        .iter()
        .rev()
        .take_while(|l| l.role == Role::Context)
        .count() as u64;

    body_lines.extend(old_payload.clone());
    body_lines.push(sentinel(Role::New));
    body_lines.extend(new_payload.clone());
    body_lines.push(sentinel(Role::End));

    let hunk = Hunk {
        dialect: Dialect::Unified,
        first: old_start,
        newfirst: new_start,
        ptrn_lines: old_payload.len() as u64,
        repl_lines: new_payload.len() as u64,
        prefix_context,
        suffix_context,
        hunk_beg,
        lines: body_lines,
    };
    Ok((hunk, cursor - at_idx))
}

fn parse_context_hunk(
    lines: &[RawLine],
    star_idx: usize,
) -> Result<(Hunk, usize, (Option<String>, Option<String>)), PatchError> {
    let hunk_beg = star_idx as u64 + 1;
    let header = bstr(&lines[star_idx].bytes).into_owned();
    let inner = header
        .trim_start_matches("*** ")
        .trim_end()
        .trim_end_matches("****")
        .trim();
    let (old_start, old_len) = parse_star_range(inner, hunk_beg)?;

    let mut cursor = star_idx + 1;
    let mut old_payload: Vec<HunkLine> = Vec::new();
    while cursor < lines.len() {
        let text = bstr(&lines[cursor].bytes).into_owned();
        if text.trim_end().starts_with("---") && text.trim_end().ends_with("----") {
            break;
        }
        if !text.is_empty() {
            let marker = text.as_bytes()[0];
            let rest = lines[cursor].bytes.get(2..).unwrap_or(&[]).to_vec();
            let role = match marker {
                b'!' => Role::Delete,
                b'-' => Role::Delete,
                b' ' => Role::Context,
                b'\\' => {
                    if let Some(last) = old_payload.last_mut() {
                        last.has_newline = false;
                    }
                    cursor += 1;
                    continue;
                }
                _ => {
                    return Err(PatchError::MalformedPatch {
                        line: cursor as u64 + 1,
                        reason: "unexpected marker in context hunk old half".into(),
                    })
                }
            };
            old_payload.push(owned_line(role, rest, lines[cursor].has_newline));
        }
        cursor += 1;
    }

    let sep_header = bstr(&lines[cursor].bytes).into_owned();
    let inner_new = sep_header
        .trim_start_matches("--- ")
        .trim_end()
        .trim_end_matches("----")
        .trim();
    let (new_start, new_len) = parse_star_range(inner_new, hunk_beg)?;
    cursor += 1;

    let mut new_payload: Vec<HunkLine> = Vec::new();
    let body_start = cursor;
    while cursor < lines.len() {
        if lines[cursor].bytes.is_empty() {
            break;
        }
        let marker = lines[cursor].bytes[0];
        if marker != b'!' && marker != b'+' && marker != b' ' && marker != b'\\' {
            break;
        }
        let rest = lines[cursor].bytes.get(2..).unwrap_or(&[]).to_vec();
        let role = match marker {
            b'!' | b'+' => Role::Insert,
            b' ' => Role::Context,
            b'\\' => {
                if let Some(last) = new_payload.last_mut() {
                    last.has_newline = false;
                }
                cursor += 1;
                continue;
            }
            _ => unreachable!(),
        };
        new_payload.push(owned_line(role, rest, lines[cursor].has_newline));
        cursor += 1;
        if new_payload.len() as u64 == new_len {
            break;
        }
    }
    let _ = body_start;

    if (old_payload.len() as u64) < old_len {
        reconstruct_faked_context(&mut old_payload, old_len, &new_payload);
    }
    if (new_payload.len() as u64) < new_len {
        reconstruct_faked_context(&mut new_payload, new_len, &old_payload);
    }

    let prefix_context = old_payload
        .iter()
        .take_while(|l| l.role == Role::Context)
        .count() as u64;
    let suffix_context = old_payload
        .iter()
        .rev()
        .take_while(|l| l.role == Role::Context)
        .count() as u64;

    let mut body_lines = vec![sentinel(Role::Old)];
    body_lines.extend(old_payload.clone());
    body_lines.push(sentinel(Role::New));
    body_lines.extend(new_payload.clone());
    body_lines.push(sentinel(Role::End));

    let hunk = Hunk {
        dialect: Dialect::Context,
        first: old_start,
        newfirst: new_start,
        ptrn_lines: old_payload.len() as u64,
        repl_lines: new_payload.len() as u64,
        prefix_context,
        suffix_context,
        hunk_beg,
        lines: body_lines,
    };
    Ok((hunk, cursor - star_idx, (None, None)))
}

fn parse_star_range(inner: &str, hunk_beg: u64) -> Result<(u64, u64), PatchError> {
    let mut parts = inner.splitn(2, ',');
    let first = parts.next().unwrap_or("0");
    let start: u64 = first.trim().parse().map_err(|_| PatchError::MalformedPatch {
        line: hunk_beg,
        reason: format!("bad context range: {inner}"),
    })?;
    match parts.next() {
        Some(last) => {
            let last: u64 = last.trim().parse().map_err(|_| PatchError::MalformedPatch {
                line: hunk_beg,
                reason: format!("bad context range: {inner}"),
            })?;
            let len = if last >= start { last - start + 1 } else { 0 };
            Ok((start.max(1), len))
        }
        None => Ok((start.max(1), if start == 0 { 0 } else { 1 })),
    }
}

fn parse_normal_hunk(lines: &[RawLine], cmd_idx: usize) -> Result<(Hunk, usize), PatchError> {
    let hunk_beg = cmd_idx as u64 + 1;
    let text = bstr(&lines[cmd_idx].bytes).into_owned();
    let text = text.trim_end();
    let op_pos = text
        .find(|c: char| c == 'a' || c == 'c' || c == 'd')
        .ok_or_else(|| PatchError::MalformedPatch {
            line: hunk_beg,
            reason: "missing normal-diff command letter".into(),
        })?;
    let (old_spec, rest) = text.split_at(op_pos);
    let op = rest.as_bytes()[0];
    let new_spec = &rest[1..];

    let parse_range = |s: &str| -> Result<(u64, u64), PatchError> {
        if let Some((a, b)) = s.split_once(',') {
            let a: u64 = a.parse().map_err(|_| PatchError::MalformedPatch {
                line: hunk_beg,
                reason: format!("bad range {s}"),
            })?;
            let b: u64 = b.parse().map_err(|_| PatchError::MalformedPatch {
                line: hunk_beg,
                reason: format!("bad range {s}"),
            })?;
            Ok((a, b - a + 1))
        } else {
            let a: u64 = s.parse().map_err(|_| PatchError::MalformedPatch {
                line: hunk_beg,
                reason: format!("bad range {s}"),
            })?;
            Ok((a, 1))
        }
    };

    let (old_start, old_len_raw) = parse_range(old_spec)?;
    let (new_start, new_len_raw) = parse_range(new_spec)?;
    let old_len = if op == b'a' { 0 } else { old_len_raw };
    let new_len = if op == b'd' { 0 } else { new_len_raw };

    let mut cursor = cmd_idx + 1;
    let mut old_payload = Vec::new();
    if old_len > 0 {
        for _ in 0..old_len {
            let raw = &lines[cursor];
            if raw.bytes.first() != Some(&b'<') {
                return Err(PatchError::MalformedPatch {
                    line: cursor as u64 + 1,
                    reason: "missing '<' marker in normal diff".into(),
                });
            }
            old_payload.push(owned_line(
                Role::Delete,
                raw.bytes.get(2..).unwrap_or(&[]).to_vec(),
                raw.has_newline,
            ));
            cursor += 1;
        }
    }
    if op == b'c' {
        if cursor < lines.len() && lines[cursor].bytes == b"---" {
            cursor += 1;
        }
    }
    let mut new_payload = Vec::new();
    if new_len > 0 {
        for _ in 0..new_len {
            let raw = &lines[cursor];
            if raw.bytes.first() != Some(&b'>') {
                return Err(PatchError::MalformedPatch {
                    line: cursor as u64 + 1,
                    reason: "missing '>' marker in normal diff".into(),
                });
            }
            new_payload.push(owned_line(
                Role::Insert,
                raw.bytes.get(2..).unwrap_or(&[]).to_vec(),
                raw.has_newline,
            ));
            cursor += 1;
        }
    }

    let mut body_lines = vec![sentinel(Role::Old)];
    body_lines.extend(old_payload.clone());
    body_lines.push(sentinel(Role::New));
    body_lines.extend(new_payload.clone());
    body_lines.push(sentinel(Role::End));

    let hunk = Hunk {
        dialect: Dialect::Normal,
        first: old_start,
        newfirst: new_start,
        ptrn_lines: old_payload.len() as u64,
        repl_lines: new_payload.len() as u64,
        prefix_context: 0,
        suffix_context: 0,
        hunk_beg,
        lines: body_lines,
    };
    Ok((hunk, cursor - cmd_idx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_unified_hunk() {
        let patch = b"--- f\n+++ f\n@@ -1,4 +1,4 @@\n A\n-B\n+B'\n C\n D\n";
        let entries = parse_patch_file(patch).unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.old_name.as_deref(), Some("f"));
        assert_eq!(entry.hunks.len(), 1);
        let hunk = &entry.hunks[0];
        assert_eq!(hunk.first, 1);
        assert_eq!(hunk.ptrn_lines, 4);
        assert_eq!(hunk.repl_lines, 4);
    }

    #[test]
    fn parses_context_hunk() {
        let patch = b"*** f\n--- f\n*** 1,4 ****\n  A\n! B\n  C\n  D\n--- 1,4 ----\n  A\n! B'\n  C\n  D\n";
        let entries = parse_patch_file(patch).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].hunks.len(), 1);
    }

    #[test]
    fn parses_normal_hunk() {
        let patch = b"2c2\n< B\n---\n> B'\n";
        let entries = parse_patch_file(patch).unwrap();
        assert_eq!(entries.len(), 1);
        let hunk = &entries[0].hunks[0];
        assert_eq!(hunk.first, 2);
        assert_eq!(hunk.ptrn_lines, 1);
        assert_eq!(hunk.repl_lines, 1);
    }

    #[test]
    fn recognizes_git_rename_with_no_hunks() {
        let patch =
            b"diff --git a/x b/y\nrename from x\nrename to y\nold mode 100644\nnew mode 100755\n";
        let entries = parse_patch_file(patch).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].rename_from.as_deref(), Some("x"));
        assert_eq!(entries[0].rename_to.as_deref(), Some("y"));
        assert_eq!(entries[0].new_mode, Some(0o755));
        assert!(entries[0].hunks.is_empty());
    }

    #[test]
    fn malformed_unified_header_is_rejected() {
        let patch = b"--- f\n+++ f\n@@ bogus @@\n A\n";
        let err = parse_patch_file(patch).unwrap_err();
        assert!(matches!(err, PatchError::MalformedPatch { .. }));
    }
}
