//! Zip archive token rewriting.
//!
//! Rewrites entry contents and, optionally, entry names with an ordered
//! pattern list. Entries that are not valid UTF-8 are copied verbatim; their
//! names are still eligible for renaming. Also provides the zip view of a
//! directory tree used by the packaging pipeline.

use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::error::{Error, Result};
use crate::tokens::{self, ResolvedPattern};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryRename {
    pub from: String,
    pub to: String,
}

/// What an archive rewrite did.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveReport {
    pub entry_count: usize,
    pub rewritten_entries: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub renamed_entries: Vec<EntryRename>,
}

/// Rewrite a zip archive held in memory.
///
/// Patterns apply to every UTF-8 entry body. With `rename_entries`, they
/// also apply to entry path strings while the archive is rebuilt.
pub fn rewrite_archive(
    bytes: &[u8],
    patterns: &[ResolvedPattern],
    rename_entries: bool,
) -> Result<(Vec<u8>, ArchiveReport)> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::archive_invalid(None, e.to_string()))?;

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let mut report = ArchiveReport {
        entry_count: archive.len(),
        ..Default::default()
    };

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| Error::archive_invalid(None, e.to_string()))?;
        let name = entry.name().to_string();

        let new_name = if rename_entries {
            tokens::apply_all(&name, patterns)
        } else {
            name.clone()
        };
        if new_name != name {
            report.renamed_entries.push(EntryRename {
                from: name.clone(),
                to: new_name.clone(),
            });
        }

        if entry.is_dir() {
            writer
                .add_directory(new_name.trim_end_matches('/'), entry_options(&entry))
                .map_err(|e| write_error(&name, e.to_string()))?;
            continue;
        }

        let mut data = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut data)
            .map_err(|e| Error::archive_invalid(Some(name.clone()), e.to_string()))?;

        let data = match String::from_utf8(data) {
            Ok(text) => {
                let rewritten = tokens::apply_all(&text, patterns);
                if rewritten != text {
                    report.rewritten_entries.push(new_name.clone());
                }
                rewritten.into_bytes()
            }
            // Binary entry, carried through untouched.
            Err(original) => original.into_bytes(),
        };

        writer
            .start_file(new_name.as_str(), entry_options(&entry))
            .map_err(|e| write_error(&name, e.to_string()))?;
        writer
            .write_all(&data)
            .map_err(|e| write_error(&name, e.to_string()))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| write_error("archive", e.to_string()))?;

    Ok((cursor.into_inner(), report))
}

/// Rewrite an archive on disk, writing the result to `output`.
pub fn rewrite_archive_file(
    input: &Path,
    output: &Path,
    patterns: &[ResolvedPattern],
    rename_entries: bool,
) -> Result<ArchiveReport> {
    let bytes = std::fs::read(input)
        .map_err(|e| Error::internal_io(e.to_string(), Some("read archive".to_string())))?;

    let (rewritten, report) = rewrite_archive(&bytes, patterns, rename_entries)?;

    std::fs::write(output, rewritten)
        .map_err(|e| Error::internal_io(e.to_string(), Some("write archive".to_string())))?;

    Ok(report)
}

/// Build the zip view of a directory tree.
///
/// Entry names are root-relative with forward slashes, sorted for
/// deterministic output.
pub fn zip_directory(dir: &Path) -> Result<Vec<u8>> {
    let mut paths = Vec::new();
    collect_paths(dir, &mut paths)?;
    paths.sort();

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options: FileOptions = FileOptions::default();

    for path in paths {
        let relative = path
            .strip_prefix(dir)
            .map_err(|e| Error::internal_unexpected(e.to_string()))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if path.is_dir() {
            writer
                .add_directory(name.as_str(), options)
                .map_err(|e| write_error(&name, e.to_string()))?;
        } else {
            let data = std::fs::read(&path)
                .map_err(|e| Error::internal_io(e.to_string(), Some(name.clone())))?;
            writer
                .start_file(name.as_str(), options)
                .map_err(|e| write_error(&name, e.to_string()))?;
            writer
                .write_all(&data)
                .map_err(|e| write_error(&name, e.to_string()))?;
        }
    }

    let cursor = writer
        .finish()
        .map_err(|e| write_error("archive", e.to_string()))?;
    Ok(cursor.into_inner())
}

/// Materialize a zip archive into a directory.
///
/// Entries that would escape the target directory are skipped with a
/// warning.
pub fn unzip_to_directory(bytes: &[u8], dir: &Path) -> Result<()> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::archive_invalid(None, e.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| Error::archive_invalid(None, e.to_string()))?;

        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            crate::log_status!("archive", "Skipping unsafe entry name: {}", entry.name());
            continue;
        };
        let target = dir.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&target)
                .map_err(|e| Error::internal_io(e.to_string(), Some("extract archive".to_string())))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::internal_io(e.to_string(), Some("extract archive".to_string())))?;
        }

        let mut data = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut data)
            .map_err(|e| Error::archive_invalid(Some(entry.name().to_string()), e.to_string()))?;
        std::fs::write(&target, data)
            .map_err(|e| Error::internal_io(e.to_string(), Some("extract archive".to_string())))?;
    }

    Ok(())
}

fn entry_options(entry: &zip::read::ZipFile) -> FileOptions {
    let options = FileOptions::default();
    match entry.unix_mode() {
        Some(mode) => options.unix_permissions(mode),
        None => options,
    }
}

fn write_error(entry: &str, error: String) -> Error {
    Error::internal_io(error, Some(format!("write archive entry {}", entry)))
}

fn collect_paths(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| Error::internal_io(e.to_string(), Some("read directory".to_string())))?;

    for entry in entries {
        let entry = entry
            .map_err(|e| Error::internal_io(e.to_string(), Some("read directory".to_string())))?;
        let path = entry.path();
        out.push(path.clone());
        if path.is_dir() {
            collect_paths(&path, out)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_zip(entries: &[(&str, Option<&[u8]>)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options: FileOptions = FileOptions::default();
        for (name, data) in entries {
            match data {
                Some(bytes) => {
                    writer.start_file(*name, options).unwrap();
                    writer.write_all(bytes).unwrap();
                }
                None => {
                    writer.add_directory(*name, options).unwrap();
                }
            }
        }
        writer.finish().unwrap().into_inner()
    }

    fn read_entry(bytes: &[u8], name: &str) -> Vec<u8> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut entry = archive.by_name(name).unwrap();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        data
    }

    fn entry_names(bytes: &[u8]) -> Vec<String> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn rewrites_contents_and_names() {
        let zip = build_zip(&[(
            "__PROJECT_NAME__Home.page",
            Some(b"__PROJECT_NAME__".as_slice()),
        )]);
        let patterns = vec![ResolvedPattern::new("__PROJECT_NAME__", "Acme")];

        let (out, report) = rewrite_archive(&zip, &patterns, true).unwrap();

        assert_eq!(entry_names(&out), vec!["AcmeHome.page"]);
        assert_eq!(read_entry(&out, "AcmeHome.page"), b"Acme");
        assert_eq!(report.entry_count, 1);
        assert_eq!(report.rewritten_entries, vec!["AcmeHome.page"]);
        assert_eq!(report.renamed_entries.len(), 1);
    }

    #[test]
    fn names_stay_put_without_rename_flag() {
        let zip = build_zip(&[(
            "__PROJECT_NAME__Home.page",
            Some(b"__PROJECT_NAME__".as_slice()),
        )]);
        let patterns = vec![ResolvedPattern::new("__PROJECT_NAME__", "Acme")];

        let (out, report) = rewrite_archive(&zip, &patterns, false).unwrap();

        assert_eq!(entry_names(&out), vec!["__PROJECT_NAME__Home.page"]);
        assert_eq!(read_entry(&out, "__PROJECT_NAME__Home.page"), b"Acme");
        assert!(report.renamed_entries.is_empty());
    }

    #[test]
    fn binary_entries_are_copied_verbatim() {
        let binary: &[u8] = &[0x00, 0xff, 0xfe, 0x01];
        let zip = build_zip(&[("__PROJECT_NAME__.bin", Some(binary))]);
        let patterns = vec![ResolvedPattern::new("__PROJECT_NAME__", "Acme")];

        let (out, report) = rewrite_archive(&zip, &patterns, true).unwrap();

        assert_eq!(read_entry(&out, "Acme.bin"), binary);
        assert!(report.rewritten_entries.is_empty());
    }

    #[test]
    fn directory_entries_are_carried_and_renamed() {
        let zip = build_zip(&[
            ("__PROJECT_LABEL__/", None),
            ("__PROJECT_LABEL__/suite.robot", Some(b"ok".as_slice())),
        ]);
        let patterns = vec![ResolvedPattern::new("__PROJECT_LABEL__", "Acme-App")];

        let (out, _) = rewrite_archive(&zip, &patterns, true).unwrap();

        let names = entry_names(&out);
        assert!(names.contains(&"Acme-App/".to_string()));
        assert!(names.contains(&"Acme-App/suite.robot".to_string()));
    }

    #[test]
    fn garbage_bytes_are_an_archive_error() {
        let err = rewrite_archive(b"not a zip", &[], false).unwrap_err();
        assert_eq!(err.code.as_str(), "archive.invalid");
    }

    #[test]
    fn directory_zip_round_trip() {
        let src = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("pages")).unwrap();
        std::fs::write(src.path().join("pages/home.page"), "home").unwrap();
        std::fs::write(src.path().join("app.cls"), "class App {}").unwrap();

        let bytes = zip_directory(src.path()).unwrap();

        let dst = tempfile::tempdir().unwrap();
        unzip_to_directory(&bytes, dst.path()).unwrap();

        assert_eq!(
            std::fs::read_to_string(dst.path().join("pages/home.page")).unwrap(),
            "home"
        );
        assert_eq!(
            std::fs::read_to_string(dst.path().join("app.cls")).unwrap(),
            "class App {}"
        );
    }
}
