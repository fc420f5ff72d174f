//! Packaging insertion.
//!
//! Runs a packaging command against a token-rewritten view of a source tree.
//! The original tree is moved aside before the command runs and restored on
//! every exit path, including panics, via a scoped guard. If any transform
//! step fails, the command still runs against the untouched original;
//! packaging outcome takes priority over guaranteed rewriting.

use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::archive::{self, ArchiveReport};
use crate::error::{Error, Result};
use crate::tokens::ResolvedPattern;
use crate::utils::{command, io};

#[derive(Debug, Clone)]
pub struct PackageRequest {
    /// Directory the packaging command reads from.
    pub source: PathBuf,
    pub patterns: Vec<ResolvedPattern>,
    /// Packaging command argv; runs with inherited stdio.
    pub command: Vec<String>,
    /// Working directory for the command. Defaults to the process cwd.
    pub workdir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageReport {
    pub transformed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<ArchiveReport>,
    pub command: String,
    pub command_exit_code: i32,
    pub restored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<String>,
}

/// Run a packaging command with the rewrite inserted around it.
pub fn run_packaging(req: &PackageRequest) -> Result<PackageReport> {
    if req.command.is_empty() {
        return Err(Error::validation_missing_argument(vec!["command".to_string()]));
    }
    if !req.source.is_dir() {
        return Err(Error::validation_invalid_argument(
            "source",
            "Source directory does not exist",
            Some(req.source.display().to_string()),
            None,
        ));
    }

    let rendered_command = req.command.join(" ");
    let digest_before = tree_digest(&req.source)?;

    let scratch = scratch_root();
    let prepared = prepare_rewritten_tree(req, &scratch);

    let report = match prepared {
        Ok(prepared) => match swap_in(&req.source, &prepared.rewritten_dir) {
            Ok(guard) => {
                let exit_code = run_command(req);
                let backup_display = guard.backup.display().to_string();
                match guard.finish() {
                    Ok(()) => {
                        let verified = tree_digest(&req.source)
                            .map(|after| after == digest_before)
                            .ok();
                        PackageReport {
                            transformed: true,
                            transform_error: None,
                            archive: Some(prepared.report),
                            command: rendered_command,
                            command_exit_code: exit_code,
                            restored: true,
                            original_verified: verified,
                            backup_path: None,
                        }
                    }
                    Err(e) => {
                        crate::log_status!(
                            "package",
                            "Restore failed, original tree is at {}: {}",
                            backup_display,
                            e
                        );
                        PackageReport {
                            transformed: true,
                            transform_error: None,
                            archive: Some(prepared.report),
                            command: rendered_command,
                            command_exit_code: exit_code,
                            restored: false,
                            original_verified: None,
                            backup_path: Some(backup_display),
                        }
                    }
                }
            }
            Err(e) => run_untouched(req, rendered_command, e, digest_before.clone())?,
        },
        Err(e) => run_untouched(req, rendered_command, e, digest_before.clone())?,
    };

    let _ = std::fs::remove_dir_all(&scratch);
    Ok(report)
}

/// Fallback path: the transform failed, run against the original tree.
fn run_untouched(
    req: &PackageRequest,
    rendered_command: String,
    transform_error: Error,
    digest_before: String,
) -> Result<PackageReport> {
    if !req.source.is_dir() {
        // The source is gone; nothing safe to run against.
        return Err(transform_error);
    }

    crate::log_status!(
        "package",
        "Transform failed, packaging the untouched tree: {}",
        transform_error
    );

    let exit_code = run_command(req);
    let verified = tree_digest(&req.source)
        .map(|after| after == digest_before)
        .ok();

    Ok(PackageReport {
        transformed: false,
        transform_error: Some(transform_error.to_string()),
        archive: None,
        command: rendered_command,
        command_exit_code: exit_code,
        restored: true,
        original_verified: verified,
        backup_path: None,
    })
}

fn run_command(req: &PackageRequest) -> i32 {
    let program = &req.command[0];
    let args = &req.command[1..];
    match command::run_interactive(program, args, req.workdir.as_deref()) {
        Ok(code) => code,
        Err(e) => {
            crate::log_status!("package", "Packaging command failed to start: {}", e);
            -1
        }
    }
}

struct PreparedTree {
    rewritten_dir: PathBuf,
    report: ArchiveReport,
}

struct TransformContext<'a> {
    source: &'a Path,
    patterns: &'a [ResolvedPattern],
    scratch_copy: PathBuf,
    rewritten_dir: PathBuf,
    rewritten_bytes: Vec<u8>,
    report: Option<ArchiveReport>,
}

type StepFn = for<'a, 'b> fn(&'a mut TransformContext<'b>) -> Result<()>;

/// The transform steps, in order. The filename-aware rewrite is a regular
/// registered step here, nothing is patched into shared machinery.
const TRANSFORM_STEPS: &[(&str, StepFn)] = &[
    ("copy", copy_step),
    ("rewrite", rewrite_step),
    ("materialize", materialize_step),
];

fn prepare_rewritten_tree(req: &PackageRequest, scratch: &Path) -> Result<PreparedTree> {
    let mut ctx = TransformContext {
        source: &req.source,
        patterns: &req.patterns,
        scratch_copy: scratch.join("copy"),
        rewritten_dir: scratch.join("rewritten"),
        rewritten_bytes: Vec::new(),
        report: None,
    };

    for (name, step) in TRANSFORM_STEPS {
        crate::log_status!("package", "Transform step: {}", name);
        step(&mut ctx)?;
    }

    Ok(PreparedTree {
        rewritten_dir: ctx.rewritten_dir,
        report: ctx.report.unwrap_or_default(),
    })
}

fn copy_step(ctx: &mut TransformContext) -> Result<()> {
    io::copy_dir_recursive(ctx.source, &ctx.scratch_copy, "copy source tree")
}

fn rewrite_step(ctx: &mut TransformContext) -> Result<()> {
    let bytes = archive::zip_directory(&ctx.scratch_copy)?;
    let (rewritten, report) = archive::rewrite_archive(&bytes, ctx.patterns, true)?;
    ctx.rewritten_bytes = rewritten;
    ctx.report = Some(report);
    Ok(())
}

fn materialize_step(ctx: &mut TransformContext) -> Result<()> {
    std::fs::create_dir_all(&ctx.rewritten_dir)
        .map_err(|e| Error::internal_io(e.to_string(), Some("materialize tree".to_string())))?;
    archive::unzip_to_directory(&ctx.rewritten_bytes, &ctx.rewritten_dir)
}

/// Move the original aside and put the rewritten tree in its place.
///
/// On any failure the original is put back before returning, so the caller
/// can fall back to packaging the untouched tree.
fn swap_in(source: &Path, rewritten: &Path) -> Result<RestoreGuard> {
    let backup = backup_path(source)?;

    std::fs::rename(source, &backup)
        .map_err(|e| Error::internal_io(e.to_string(), Some("backup source tree".to_string())))?;

    let guard = RestoreGuard {
        source: source.to_path_buf(),
        backup: backup.clone(),
        done: false,
    };

    if let Err(copy_err) = io::copy_dir_recursive(rewritten, source, "swap in rewritten tree") {
        return match guard.finish() {
            Ok(()) => Err(copy_err),
            Err(restore_err) => Err(restore_err
                .with_hint(format!("The original tree was saved at {}", backup.display()))),
        };
    }

    Ok(guard)
}

fn backup_path(source: &Path) -> Result<PathBuf> {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| {
            Error::validation_invalid_argument(
                "source",
                "Source path has no directory name",
                Some(source.display().to_string()),
                None,
            )
        })?;

    let stamp = Local::now().format("%Y%m%d-%H%M%S");
    let backup = source.with_file_name(format!("{}.backup-{}", name, stamp));
    if backup.exists() {
        return Err(Error::internal_io(
            format!("Backup path already exists: {}", backup.display()),
            Some("backup source tree".to_string()),
        ));
    }
    Ok(backup)
}

/// Puts the original tree back when it goes out of scope.
#[derive(Debug)]
struct RestoreGuard {
    source: PathBuf,
    backup: PathBuf,
    done: bool,
}

impl RestoreGuard {
    fn finish(mut self) -> Result<()> {
        self.done = true;
        Self::restore(&self.source, &self.backup)
    }

    fn restore(source: &Path, backup: &Path) -> Result<()> {
        if source.exists() {
            std::fs::remove_dir_all(source).map_err(|e| {
                Error::internal_io(e.to_string(), Some("remove swapped tree".to_string()))
            })?;
        }
        std::fs::rename(backup, source).map_err(|e| {
            Error::internal_io(e.to_string(), Some("restore original tree".to_string()))
        })
    }
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if let Err(e) = Self::restore(&self.source, &self.backup) {
            crate::log_status!(
                "package",
                "Restore on unwind failed, original tree is at {}: {}",
                self.backup.display(),
                e
            );
        }
    }
}

fn scratch_root() -> PathBuf {
    std::env::temp_dir().join(format!("imprint-package-{}", uuid::Uuid::new_v4()))
}

/// Content digest of a directory tree.
///
/// Covers relative paths and file bytes, so a restored tree can be checked
/// against the digest captured before the swap.
pub fn tree_digest(dir: &Path) -> Result<String> {
    let mut paths = Vec::new();
    collect_relative(dir, dir, &mut paths)?;
    paths.sort();

    let mut hasher = Sha256::new();
    for (relative, is_dir) in paths {
        hasher.update(if is_dir { b"d" } else { b"f" });
        hasher.update(relative.as_bytes());
        hasher.update([0u8]);
        if !is_dir {
            let bytes = std::fs::read(dir.join(&relative))
                .map_err(|e| Error::internal_io(e.to_string(), Some(relative.clone())))?;
            hasher.update(&bytes);
            hasher.update([0u8]);
        }
    }

    Ok(format!("{:x}", hasher.finalize()))
}

fn collect_relative(root: &Path, dir: &Path, out: &mut Vec<(String, bool)>) -> Result<()> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| Error::internal_io(e.to_string(), Some("read directory".to_string())))?;

    for entry in entries {
        let entry = entry
            .map_err(|e| Error::internal_io(e.to_string(), Some("read directory".to_string())))?;
        let path = entry.path();
        let relative = path
            .strip_prefix(root)
            .map_err(|e| Error::internal_unexpected(e.to_string()))?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let is_dir = path.is_dir();
        out.push((relative, is_dir));
        if is_dir {
            collect_relative(root, &path, out)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn source_tree(root: &Path) -> PathBuf {
        let source = root.join("force-app");
        fs::create_dir_all(source.join("pages")).unwrap();
        fs::write(
            source.join("pages/__PROJECT_NAME__Home.page"),
            "__PROJECT_NAME__",
        )
        .unwrap();
        fs::write(source.join("app.cls"), "class App {}").unwrap();
        source
    }

    fn patterns() -> Vec<ResolvedPattern> {
        vec![ResolvedPattern::new("__PROJECT_NAME__", "Acme")]
    }

    #[test]
    fn command_sees_rewritten_tree_and_original_comes_back() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_tree(dir.path());
        let snapshot = dir.path().join("seen");

        let req = PackageRequest {
            source: source.clone(),
            patterns: patterns(),
            command: vec![
                "cp".to_string(),
                "-r".to_string(),
                source.display().to_string(),
                snapshot.display().to_string(),
            ],
            workdir: None,
        };

        let report = run_packaging(&req).unwrap();

        assert!(report.transformed);
        assert!(report.restored);
        assert_eq!(report.command_exit_code, 0);
        assert_eq!(report.original_verified, Some(true));

        // What the command saw was the rewritten view.
        assert!(snapshot.join("pages/AcmeHome.page").is_file());
        assert_eq!(
            fs::read_to_string(snapshot.join("pages/AcmeHome.page")).unwrap(),
            "Acme"
        );

        // The original is untouched afterwards.
        assert!(source.join("pages/__PROJECT_NAME__Home.page").is_file());
        assert_eq!(
            fs::read_to_string(source.join("pages/__PROJECT_NAME__Home.page")).unwrap(),
            "__PROJECT_NAME__"
        );
    }

    #[test]
    fn failed_swap_restores_the_original() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_tree(dir.path());
        let digest = tree_digest(&source).unwrap();

        let missing_rewrite = dir.path().join("does-not-exist");
        let err = swap_in(&source, &missing_rewrite).unwrap_err();
        assert_eq!(err.code.as_str(), "internal.io_error");

        assert!(source.join("pages/__PROJECT_NAME__Home.page").is_file());
        assert_eq!(tree_digest(&source).unwrap(), digest);

        // No backup left behind.
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().contains("backup"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn guard_restores_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_tree(dir.path());
        let digest = tree_digest(&source).unwrap();

        let rewritten = dir.path().join("rewritten");
        fs::create_dir_all(&rewritten).unwrap();
        fs::write(rewritten.join("other.txt"), "other").unwrap();

        {
            let _guard = swap_in(&source, &rewritten).unwrap();
            assert!(source.join("other.txt").is_file());
            // Dropped without finish(), as an unwind would.
        }

        assert!(!source.join("other.txt").exists());
        assert_eq!(tree_digest(&source).unwrap(), digest);
    }

    #[test]
    fn failing_command_still_restores() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_tree(dir.path());
        let digest = tree_digest(&source).unwrap();

        let req = PackageRequest {
            source: source.clone(),
            patterns: patterns(),
            command: vec!["sh".to_string(), "-c".to_string(), "exit 7".to_string()],
            workdir: None,
        };

        let report = run_packaging(&req).unwrap();

        assert_eq!(report.command_exit_code, 7);
        assert!(report.restored);
        assert_eq!(report.original_verified, Some(true));
        assert_eq!(tree_digest(&source).unwrap(), digest);
    }

    #[test]
    fn empty_command_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_tree(dir.path());

        let req = PackageRequest {
            source,
            patterns: vec![],
            command: vec![],
            workdir: None,
        };

        let err = run_packaging(&req).unwrap_err();
        assert_eq!(err.code.as_str(), "validation.missing_argument");
    }

    #[test]
    fn digest_changes_with_content() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_tree(dir.path());

        let before = tree_digest(&source).unwrap();
        fs::write(source.join("app.cls"), "class App { void x() {} }").unwrap();
        let after = tree_digest(&source).unwrap();

        assert_ne!(before, after);
    }
}
