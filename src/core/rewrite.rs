//! Filesystem token rewriting.
//!
//! Renames paths and rewrites file contents within a fixed target set.
//! Directory renames run deepest-first so a parent rename never invalidates
//! a pending child rename. Every filesystem failure inside the passes is a
//! warning, not an error; partial completion shows up in the final scan
//! instead of aborting the run.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::tokens::{self, ResolvedPattern};

/// Directories eligible for rewriting, relative to the project root.
pub const SEARCH_DIRS: [&str; 5] = ["force-app", "datasets", "robot", "category", ".cci"];

/// Root-level files that get content rewriting only.
pub const ROOT_FILES: [&str; 3] = [".gitignore", "sfdx-project.json", "README.md"];

/// Path components whose subtrees are never content-rewritten.
const SKIP_COMPONENTS: [&str; 3] = [".git", "__pycache__", "node_modules"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRecord {
    pub from: String,
    pub to: String,
}

/// What a rewrite run did.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteReport {
    pub renamed_dirs: Vec<RenameRecord>,
    pub renamed_files: Vec<RenameRecord>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_renames: Vec<RenameRecord>,
    pub updated_files: Vec<String>,
}

impl RewriteReport {
    pub fn change_count(&self) -> usize {
        self.renamed_dirs.len() + self.renamed_files.len() + self.updated_files.len()
    }
}

/// Leftover tokens found by a verification scan.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub name_hits: Vec<String>,
    pub content_hits: Vec<String>,
}

impl ScanReport {
    pub fn is_clean(&self) -> bool {
        self.name_hits.is_empty() && self.content_hits.is_empty()
    }

    pub fn hit_count(&self) -> usize {
        self.name_hits.len() + self.content_hits.len()
    }
}

/// Apply patterns to the target set under `root`.
///
/// Three passes: directory renames (deepest first), file renames, then
/// content rewriting. A rename whose target already exists is skipped and
/// recorded; the caller decides whether to surface it.
pub fn apply(root: &Path, patterns: &[ResolvedPattern]) -> RewriteReport {
    let mut report = RewriteReport::default();

    rename_pass(root, patterns, true, &mut report);
    rename_pass(root, patterns, false, &mut report);
    content_pass(root, patterns, &mut report);

    report
}

/// Re-scan the target set for anything still carrying a token.
pub fn scan(root: &Path) -> ScanReport {
    let mut report = ScanReport::default();

    for entry in collect_targets(root) {
        let name = entry
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if tokens::contains_token(&name) {
            report.name_hits.push(display_path(root, &entry));
        }

        if entry.is_file() && !is_skipped(&entry) {
            if let Some(content) = read_text(&entry) {
                if tokens::contains_token(&content) {
                    report.content_hits.push(display_path(root, &entry));
                }
            }
        }
    }

    for name in ROOT_FILES {
        let path = root.join(name);
        if !path.is_file() {
            continue;
        }
        if let Some(content) = read_text(&path) {
            if tokens::contains_token(&content) {
                report.content_hits.push(name.to_string());
            }
        }
    }

    report.name_hits.sort();
    report.content_hits.sort();
    report
}

fn rename_pass(root: &Path, patterns: &[ResolvedPattern], dirs: bool, report: &mut RewriteReport) {
    let mut candidates: Vec<PathBuf> = collect_targets(root)
        .into_iter()
        .filter(|p| p.is_dir() == dirs)
        .filter(|p| {
            p.file_name()
                .map(|n| {
                    let name = n.to_string_lossy();
                    tokens::apply_all(&name, patterns) != name
                })
                .unwrap_or(false)
        })
        .collect();

    // Deepest first keeps parent paths valid until their children are done.
    candidates.sort_by_key(|p| std::cmp::Reverse(p.components().count()));

    for path in candidates {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
            continue;
        };
        let new_name = tokens::apply_all(&name, patterns);
        let target = path.with_file_name(&new_name);

        let record = RenameRecord {
            from: display_path(root, &path),
            to: display_path(root, &target),
        };

        if target.exists() {
            crate::log_status!(
                "rewrite",
                "Skipping rename, target already exists: {}",
                record.to
            );
            report.skipped_renames.push(record);
            continue;
        }

        match std::fs::rename(&path, &target) {
            Ok(()) => {
                if dirs {
                    report.renamed_dirs.push(record);
                } else {
                    report.renamed_files.push(record);
                }
            }
            Err(e) => {
                crate::log_status!("rewrite", "Failed to rename {}: {}", record.from, e);
            }
        }
    }
}

fn content_pass(root: &Path, patterns: &[ResolvedPattern], report: &mut RewriteReport) {
    let mut files: Vec<PathBuf> = collect_targets(root)
        .into_iter()
        .filter(|p| p.is_file() && !is_skipped(p))
        .collect();

    for name in ROOT_FILES {
        let path = root.join(name);
        if path.is_file() {
            files.push(path);
        }
    }

    files.sort();

    for path in files {
        // Binary or non-UTF-8 files are left alone.
        let Some(content) = read_text(&path) else {
            continue;
        };

        let rewritten = tokens::apply_all(&content, patterns);
        if rewritten == content {
            continue;
        }

        match std::fs::write(&path, rewritten) {
            Ok(()) => report.updated_files.push(display_path(root, &path)),
            Err(e) => {
                crate::log_status!(
                    "rewrite",
                    "Failed to update {}: {}",
                    display_path(root, &path),
                    e
                );
            }
        }
    }
}

/// Every path (directories and files) under the search directories.
fn collect_targets(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for dir in SEARCH_DIRS {
        let base = root.join(dir);
        if base.is_dir() {
            walk(&base, &mut out);
        }
    }
    out
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            crate::log_status!("rewrite", "Cannot read {}: {}", dir.display(), e);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        out.push(path.clone());
        if path.is_dir() {
            walk(&path, out);
        }
    }
}

fn is_skipped(path: &Path) -> bool {
    if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pyc"))
    {
        return true;
    }

    path.components().any(|c| {
        let name = c.as_os_str().to_string_lossy();
        SKIP_COMPONENTS.contains(&name.as_ref())
    })
}

fn read_text(path: &Path) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    String::from_utf8(bytes).ok()
}

fn display_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .to_string()
}
