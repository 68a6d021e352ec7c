//! Output orchestrator (spec §4.8): the per-patch lifecycle tying the
//! parser, locator, applier, merge engine, registry and safe-path gateway
//! together, the way the teacher's `run`/`run_with_repo` tie together
//! `stack`/`commute`/`owned`.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use crate::applier::{apply_hunk, copy_till, OutputCursor};
use crate::backup_naming::{self, BackupNameOverride, VersionControl};
use crate::error::PatchError;
use crate::hunk::{Dialect, Hunk};
use crate::input::{contains_prereq_word, AnyInput, LineIndex};
use crate::locator::locate_hunk;
use crate::merge::{locate_merge, render_merge, MergeStyle};
use crate::parser::{parse_patch_file, PatchFileEntry};
use crate::policy::{self, PolicyFlags, PrereqDecision, ReadOnlyDecision, ReverseDecision};
use crate::registry::{FileId, Registry, Status};
use crate::safepath::SafePathGateway;
use crate::signals;

/// Deferred renames for a git-diff stream (spec §4.8 steps 2 and 9): a
/// concatenated `diff --git` series may reference the same file at several
/// revisions, so non-git outputs rename immediately but git outputs queue
/// here until the file is referenced again or the stream ends.
#[derive(Default)]
struct DeferredOutputQueue {
    order: Vec<PathBuf>,
    pending: std::collections::HashMap<PathBuf, Vec<u8>>,
}

impl DeferredOutputQueue {
    fn push(&mut self, path: PathBuf, bytes: Vec<u8>) {
        if !self.pending.contains_key(&path) {
            self.order.push(path.clone());
        }
        self.pending.insert(path, bytes);
    }

    /// Flushes every entry up to and including `path`, in enqueue order,
    /// because a later diff is about to read a file the queue would
    /// otherwise still be holding unrendered.
    fn flush_through(&mut self, path: &Path) -> Vec<(PathBuf, Vec<u8>)> {
        let mut flushed = Vec::new();
        if let Some(pos) = self.order.iter().position(|p| p == path) {
            for p in self.order.drain(0..=pos) {
                if let Some(bytes) = self.pending.remove(&p) {
                    flushed.push((p, bytes));
                }
            }
        }
        flushed
    }

    fn flush_all(&mut self) -> Vec<(PathBuf, Vec<u8>)> {
        self.order
            .drain(..)
            .filter_map(|p| self.pending.remove(&p).map(|bytes| (p, bytes)))
            .collect()
    }
}

pub struct Config<'a> {
    pub strip: Option<usize>,
    pub fuzz: Option<u64>,
    pub ignore_whitespace: bool,
    pub forward_only: bool,
    pub reverse: bool,
    /// The `ORIGFILE` positional operand: overrides the file name the
    /// patch headers would otherwise imply.
    pub orig_file: Option<&'a str>,
    /// The patch stream: `-i FILE` / the `PATCHFILE` positional, falling
    /// back to stdin.
    pub input: Option<&'a str>,
    pub output: Option<&'a str>,
    pub reject_file: Option<&'a str>,
    pub ifdef_symbol: Option<&'a str>,
    pub remove_empty_files: bool,
    pub backup: bool,
    pub version_control: VersionControl,
    pub backup_override: BackupNameOverride,
    pub simple_backup_suffix: String,
    pub batch: bool,
    pub force: bool,
    pub quiet: bool,
    pub dry_run: bool,
    pub directory: PathBuf,
    pub reject_format: Option<&'a str>,
    pub read_only: policy::ReadOnlyPolicy,
    pub follow_symlinks: bool,
    pub merge: Option<MergeStyle>,
    pub logger: &'a slog::Logger,
}

/// A single patch entry's lifecycle result, used to tally the process exit
/// code across the whole run (spec §6).
pub struct EntryOutcome {
    pub failed_hunks: u64,
    pub total_hunks: u64,
}

pub fn run(config: &Config) -> Result<i32> {
    let patch_bytes = match config.input {
        Some(path) => fs::read(path).with_context(|| format!("reading patch file {path}"))?,
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("reading patch from stdin")?;
            buf
        }
    };

    let entries = parse_patch_file(&patch_bytes).map_err(|e| anyhow!(e.to_string()))?;
    debug!(config.logger, "parsed patch stream"; "entries" => entries.len());

    let gateway = SafePathGateway::new(config.directory.clone(), config.follow_symlinks);
    let mut registry = Registry::new();
    let mut deferred = DeferredOutputQueue::default();

    let mut any_rejects = false;
    let mut any_fatal = false;

    for entry in &entries {
        let target_name = effective_target_name(entry, config);
        if let Ok(target_path) = gateway.resolve(Path::new(&target_name)) {
            let flushed = deferred.flush_through(&target_path);
            flush_deferred(flushed, config, &mut registry, config.logger);
        }

        match process_entry(entry, config, &gateway, &mut registry, &mut deferred) {
            Ok(outcome) => {
                if outcome.failed_hunks > 0 {
                    any_rejects = true;
                }
                info!(config.logger, "patch entry processed";
                      "path" => entry.new_name.clone().or_else(|| entry.old_name.clone()),
                      "failed" => outcome.failed_hunks,
                      "total" => outcome.total_hunks);
            }
            Err(e) => {
                crit!(config.logger, "fatal error processing entry"; "err" => e.to_string());
                any_fatal = true;
            }
        }
    }

    let remaining = deferred.flush_all();
    flush_deferred(remaining, config, &mut registry, config.logger);

    perform_pending_deletes(&mut registry, config);

    if any_fatal {
        Ok(2)
    } else if any_rejects {
        Ok(1)
    } else {
        Ok(0)
    }
}

/// Writes out every deferred git-diff output collected so far, in enqueue
/// order (spec §5: "queued outputs are applied in enqueue order").
fn flush_deferred(
    entries: Vec<(PathBuf, Vec<u8>)>,
    config: &Config,
    registry: &mut Registry,
    logger: &slog::Logger,
) {
    for (path, bytes) in entries {
        debug!(logger, "flushing deferred git-diff output"; "path" => path.display().to_string());
        if let Err(e) = write_output(&path, &bytes, config, registry) {
            crit!(logger, "failed to flush deferred output"; "path" => path.display().to_string(), "err" => e.to_string());
        }
    }
}

/// Runs at end-of-run (spec §4.2/§4.8 step 7): unlinks every file left
/// mapped to `DeleteLater` in the registry, backing it up first when `-b`
/// was requested. A file re-created since its `delete_later` call has
/// already been filtered out by `drain_pending_deletes`.
fn perform_pending_deletes(registry: &mut Registry, config: &Config) {
    if config.dry_run {
        return;
    }
    for (path, backup) in registry.drain_pending_deletes() {
        if backup && path.exists() {
            let dest = backup_naming::backup_path(
                &path,
                &config.backup_override,
                config.version_control,
                &config.simple_backup_suffix,
                |p| existing_numbered_backups(p),
            );
            if let Err(e) = fs::copy(&path, &dest) {
                crit!(config.logger, "failed to back up file before deletion";
                      "path" => path.display().to_string(), "err" => e.to_string());
                continue;
            }
        }
        if let Err(e) = fs::remove_file(&path) {
            crit!(config.logger, "failed to unlink emptied file";
                  "path" => path.display().to_string(), "err" => e.to_string());
        } else {
            debug!(config.logger, "unlinked emptied file"; "path" => path.display().to_string());
        }
    }
}

fn process_entry(
    entry: &PatchFileEntry,
    config: &Config,
    gateway: &SafePathGateway,
    registry: &mut Registry,
    deferred: &mut DeferredOutputQueue,
) -> Result<EntryOutcome> {
    let target_name = effective_target_name(entry, config);
    let target_path = gateway
        .resolve(Path::new(&target_name))
        .map_err(|e: PatchError| anyhow!(e.to_string()))?;

    if entry.hunks.is_empty() {
        apply_metadata_only(entry, &target_path, config)?;
        return Ok(EntryOutcome {
            failed_hunks: 0,
            total_hunks: 0,
        });
    }

    if target_path.exists() && is_read_only(&target_path) {
        match policy::resolve_read_only(config.read_only) {
            ReadOnlyDecision::Proceed => {}
            ReadOnlyDecision::ProceedWithWarning => {
                warn!(config.logger, "target is read-only, proceeding anyway";
                      "path" => target_path.display().to_string());
            }
            ReadOnlyDecision::SkipRestOfEntry => {
                warn!(config.logger, "target is read-only, skipping entry";
                      "path" => target_path.display().to_string());
                return Ok(EntryOutcome {
                    failed_hunks: entry.hunks.len() as u64,
                    total_hunks: entry.hunks.len() as u64,
                });
            }
        }
    }

    let input = if target_path.exists() {
        AnyInput::open(&target_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        AnyInput::A(crate::input::PlanA::from_bytes(Vec::new()))
    };

    if let Some(prereq) = &entry.prereq {
        if !contains_prereq_word(&input.to_bytes(), prereq) {
            match policy::resolve_prereq_mismatch(PolicyFlags {
                batch: config.batch,
                force: config.force,
                forward_only: config.forward_only,
            }) {
                PrereqDecision::WarnAndContinue => {
                    warn!(config.logger, "this file doesn't appear to be the prerequisite version -- patching anyway";
                          "prereq" => prereq.clone());
                }
                PrereqDecision::Abort => {
                    warn!(config.logger, "prerequisite mismatch, aborting entry"; "prereq" => prereq.clone());
                    return Ok(EntryOutcome {
                        failed_hunks: entry.hunks.len() as u64,
                        total_hunks: entry.hunks.len() as u64,
                    });
                }
            }
        }
    }

    let mut reverse = config.reverse;
    let mut hunks_owned: Vec<Hunk> = entry.hunks.clone();
    if !reverse && !config.forward_only && !hunks_owned.is_empty() {
        let forward_ok = locate_hunk(&input, &hunks_owned[0], 0, 0, 0, 0, config.ignore_whitespace).is_some();
        if !forward_ok {
            let mut swapped = hunks_owned[0].clone();
            swapped.swap();
            if locate_hunk(&input, &swapped, 0, 0, 0, 0, config.ignore_whitespace).is_some() {
                match policy::resolve_reverse(PolicyFlags {
                    batch: config.batch,
                    force: config.force,
                    forward_only: config.forward_only,
                }) {
                    ReverseDecision::Skip => {
                        return Ok(EntryOutcome {
                            failed_hunks: 0,
                            total_hunks: hunks_owned.len() as u64,
                        });
                    }
                    ReverseDecision::ApplyUnswapped => {}
                    ReverseDecision::AssumeSwap => {
                        warn!(config.logger, "Reversed (or previously applied) patch detected! Assuming -R.");
                        reverse = true;
                        for h in hunks_owned.iter_mut() {
                            h.swap();
                        }
                    }
                }
            }
        }
    } else if reverse {
        for h in hunks_owned.iter_mut() {
            h.swap();
        }
    }

    let mut out_buf: Vec<u8> = Vec::new();
    let mut last_frozen_line = 0u64;
    let mut in_offset = 0i64;
    let mut failed_hunks = 0u64;
    let mut rejects: Vec<Hunk> = Vec::new();

    {
        let mut out = OutputCursor::new(&mut out_buf);
        for hunk in &hunks_owned {
            let fuzz = config.fuzz.unwrap_or(0) as i64;
            let context = hunk.prefix_context.max(hunk.suffix_context) as i64;
            let prefix_fuzz = fuzz + hunk.prefix_context as i64 - context;
            let suffix_fuzz = fuzz + hunk.suffix_context as i64 - context;
            let located = locate_hunk(
                &input,
                hunk,
                in_offset,
                last_frozen_line,
                prefix_fuzz,
                suffix_fuzz,
                config.ignore_whitespace,
            );

            match located {
                Some(result) => {
                    apply_hunk(
                        &input,
                        hunk,
                        result.line,
                        &mut out,
                        &mut last_frozen_line,
                        config.ifdef_symbol,
                    )
                    .map_err(|e| anyhow!(e.to_string()))?;
                    in_offset = result.offset;
                }
                None => {
                    failed_hunks += 1;
                    if let Some(style) = config.merge {
                        let guess = (hunk.first as i64 + in_offset).max(1) as u64;
                        if let Some(window) = locate_merge(&input, hunk, guess, config.ignore_whitespace) {
                            copy_till(&input, &mut out, &mut last_frozen_line, window.start.saturating_sub(1))
                                .map_err(|e| anyhow!(e.to_string()))?;
                            let merged = render_merge(&input, hunk, window.start, window.end, style);
                            for line in &merged {
                                out.write_owned_line(line).map_err(|e| anyhow!(e.to_string()))?;
                            }
                            last_frozen_line = window.end;
                        } else {
                            rejects.push(hunk.clone());
                        }
                    } else {
                        rejects.push(hunk.clone());
                    }
                }
            }
        }
        copy_till(&input, &mut out, &mut last_frozen_line, input.input_lines())
            .map_err(|e| anyhow!(e.to_string()))?;
    }

    if !config.dry_run {
        if entry.git_diff {
            deferred.push(target_path.clone(), out_buf.clone());
        } else {
            write_output(&target_path, &out_buf, config, registry)?;
        }
    }

    if !rejects.is_empty() {
        write_reject_file(entry, &rejects, &target_path, config)?;
    }

    Ok(EntryOutcome {
        failed_hunks,
        total_hunks: hunks_owned.len() as u64,
    })
}

fn effective_target_name(entry: &PatchFileEntry, config: &Config) -> String {
    if let Some(output) = config.output {
        return output.to_string();
    }
    if let Some(orig) = config.orig_file {
        return orig.to_string();
    }
    let raw = entry
        .new_name
        .clone()
        .or_else(|| entry.old_name.clone())
        .unwrap_or_default();
    strip_components(&raw, config.strip.unwrap_or(0))
}

fn strip_components(name: &str, strip: usize) -> String {
    let mut parts: Vec<&str> = name.split('/').collect();
    if parts.len() > strip {
        parts.drain(0..strip);
    }
    parts.join("/")
}

fn apply_metadata_only(entry: &PatchFileEntry, target_path: &Path, config: &Config) -> Result<()> {
    if let (Some(old), Some(new)) = (&entry.old_name, &entry.new_name) {
        if old != new && !config.dry_run {
            let gateway = SafePathGateway::new(config.directory.clone(), config.follow_symlinks);
            let old_resolved = gateway
                .resolve(Path::new(old))
                .map_err(|e: PatchError| anyhow!(e.to_string()))?;
            if old_resolved.exists() {
                fs::rename(&old_resolved, target_path).context("renaming per git-diff metadata")?;
            }
        }
    }
    if let Some(mode) = entry.new_mode {
        if !config.dry_run && target_path.exists() {
            set_unix_mode(target_path, mode)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn set_unix_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = fs::Permissions::from_mode(mode);
    fs::set_permissions(path, perms).context("applying mode from git-diff metadata")
}

#[cfg(not(unix))]
fn set_unix_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

fn write_output(
    target_path: &Path,
    bytes: &[u8],
    config: &Config,
    registry: &mut Registry,
) -> Result<()> {
    if bytes.is_empty() && config.remove_empty_files {
        if target_path.exists() {
            if let Some(id) = file_id(target_path) {
                registry.delete_later(target_path.to_path_buf(), id, config.backup);
            } else {
                fs::remove_file(target_path).ok();
            }
        }
        return Ok(());
    }

    if config.backup && target_path.exists() {
        let backup = backup_naming::backup_path(
            target_path,
            &config.backup_override,
            config.version_control,
            &config.simple_backup_suffix,
            |p| existing_numbered_backups(p),
        );
        fs::copy(target_path, &backup).context("writing backup file")?;
    }

    if let Some(parent) = target_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).ok();
        }
    }

    let mut tmp_name = target_path.as_os_str().to_owned();
    tmp_name.push(".rpatch.tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let _guard = signals::SignalGuard::acquire();
    fs::write(&tmp_path, bytes).context("writing temp output")?;
    let token = signals::track_temp(tmp_path.clone());
    let rename_result = fs::rename(&tmp_path, target_path).context("renaming temp output into place");
    signals::untrack_temp(token);
    rename_result?;

    if let Some(id) = file_id(target_path) {
        let status = if registry.lookup(id).is_some() {
            Status::Overwritten
        } else {
            Status::Created
        };
        registry.insert(id, status);
    }

    Ok(())
}

#[cfg(unix)]
fn file_id(path: &Path) -> Option<FileId> {
    use std::os::unix::fs::MetadataExt;
    let meta = fs::metadata(path).ok()?;
    Some(FileId {
        device: meta.dev(),
        inode: meta.ino(),
    })
}

#[cfg(not(unix))]
fn file_id(_path: &Path) -> Option<FileId> {
    None
}

fn is_read_only(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.permissions().readonly())
        .unwrap_or(false)
}

fn existing_numbered_backups(target: &Path) -> Vec<u32> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let base = match target.file_name().and_then(|n| n.to_str()) {
        Some(b) => b,
        None => return Vec::new(),
    };
    let prefix = format!("{base}.~");
    let mut found = Vec::new();
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(rest) = name.strip_prefix(&prefix) {
                    if let Some(num) = rest.strip_suffix('~') {
                        if let Ok(n) = num.parse() {
                            found.push(n);
                        }
                    }
                }
            }
        }
    }
    found
}

fn write_reject_file(
    entry: &PatchFileEntry,
    rejects: &[Hunk],
    target_path: &Path,
    config: &Config,
) -> Result<()> {
    let reject_path = match config.reject_file {
        Some(path) => PathBuf::from(path),
        None => {
            let mut name = target_path.as_os_str().to_owned();
            name.push(".rej");
            PathBuf::from(name)
        }
    };

    let format = config.reject_format.unwrap_or(match rejects.first().map(|h| h.dialect) {
        Some(Dialect::Context) | Some(Dialect::NewContext) => "context",
        _ => "unified",
    });

    let mut out = fs::File::create(&reject_path).context("creating reject file")?;
    let old = entry.old_name.clone().unwrap_or_default();
    let new = entry.new_name.clone().unwrap_or_default();

    if format == "unified" {
        writeln!(out, "--- {old}")?;
        writeln!(out, "+++ {new}")?;
        for hunk in rejects {
            writeln!(
                out,
                "@@ -{},{} +{},{} @@",
                hunk.first, hunk.ptrn_lines, hunk.newfirst, hunk.repl_lines
            )?;
            for line in hunk.old_lines() {
                match line.role {
                    crate::hunk::Role::Context => write!(out, " ")?,
                    crate::hunk::Role::Delete => write!(out, "-")?,
                    _ => continue,
                }
                out.write_all(line.storage.bytes())?;
                writeln!(out)?;
            }
            for line in hunk.new_lines() {
                if line.role == crate::hunk::Role::Insert {
                    write!(out, "+")?;
                    out.write_all(line.storage.bytes())?;
                    writeln!(out)?;
                }
            }
        }
    } else {
        writeln!(out, "*** {old}")?;
        writeln!(out, "--- {new}")?;
        for hunk in rejects {
            writeln!(out, "***************")?;
            writeln!(out, "*** {},{} ****", hunk.first, hunk.first + hunk.ptrn_lines - 1)?;
            for line in hunk.old_lines() {
                let marker = match line.role {
                    crate::hunk::Role::Delete => "- ",
                    _ => "  ",
                };
                write!(out, "{marker}")?;
                out.write_all(line.storage.bytes())?;
                writeln!(out)?;
            }
            writeln!(out, "--- {},{} ----", hunk.newfirst, hunk.newfirst + hunk.repl_lines - 1)?;
            for line in hunk.new_lines() {
                let marker = match line.role {
                    crate::hunk::Role::Insert => "+ ",
                    _ => "  ",
                };
                write!(out, "{marker}")?;
                out.write_all(line.storage.bytes())?;
                writeln!(out)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_components_drops_leading_path() {
        assert_eq!(strip_components("a/b/c.txt", 1), "b/c.txt");
        assert_eq!(strip_components("a/b/c.txt", 0), "a/b/c.txt");
        assert_eq!(strip_components("c.txt", 5), "c.txt");
    }
}
