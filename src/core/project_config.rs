//! Targeted edits to project configuration files.
//!
//! The project file (`cumulusci.yml`) is edited with anchored regexes on the
//! raw text instead of a parse/re-serialize round trip. A round trip would
//! reorder keys and drop comments; template users keep both.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::identity::ProjectIdentity;
use crate::tokens;
use crate::utils::io;

pub const PROJECT_CONFIG_FILE: &str = "cumulusci.yml";

/// Naming values extracted from an existing project file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedIdentity {
    pub project_name: String,
    pub package_name: String,
    pub name_managed: String,
}

/// Pull naming values out of a project file.
///
/// Returns `None` when the project or package name is absent. A missing
/// `name_managed` falls back to the project name.
pub fn extract_identity(path: &Path) -> Result<Option<ExtractedIdentity>> {
    let content = io::read_file(path, "read project config")?;

    let project_re = Regex::new(r#"project:\s*\n\s*name:\s*(?:"([^"]+)"|([^\n]+))"#)
        .expect("Invalid regex pattern");
    let package_re =
        Regex::new(r"package:\s*\n\s*name:\s*(\w+)").expect("Invalid regex pattern");
    let managed_re = Regex::new(r#"name_managed:\s*(?:"([^"]+)"|([^\n]+))"#)
        .expect("Invalid regex pattern");

    let project_name = match project_re.captures(&content) {
        Some(caps) => first_group(&caps),
        None => return Ok(None),
    };
    let package_name = match package_re.captures(&content) {
        Some(caps) => caps[1].trim().to_string(),
        None => return Ok(None),
    };
    let name_managed = managed_re
        .captures(&content)
        .map(|caps| first_group(&caps))
        .unwrap_or_else(|| project_name.clone());

    Ok(Some(ExtractedIdentity {
        project_name,
        package_name,
        name_managed,
    }))
}

fn first_group(caps: &regex::Captures) -> String {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Burn an identity into the project file.
///
/// Token replacement runs first, then three anchored edits pin the values
/// token replacement cannot express: the display name under `project:`, the
/// API name under `package:`, and `name_managed`. Permission set references
/// (`api_names:`) follow the API name. Quoting style is preserved. Returns
/// whether the file changed.
pub fn update_project_file(path: &Path, identity: &ProjectIdentity) -> Result<bool> {
    let original = io::read_file(path, "read project config")?;
    let mut content = tokens::apply_all(&original, &tokens::identity_patterns(identity));

    let project_re = Regex::new(r#"(project:\s*\n\s+name:\s+)(["']?)([^\n"']+)(["']?)"#)
        .expect("Invalid regex pattern");
    content = project_re
        .replace_all(&content, |caps: &regex::Captures| {
            format!("{}{}{}{}", &caps[1], &caps[2], identity.display_name, &caps[4])
        })
        .into_owned();

    let package_re =
        Regex::new(r"(package:\s*\n\s+name:\s+)(\w+)").expect("Invalid regex pattern");
    content = package_re
        .replace_all(&content, |caps: &regex::Captures| {
            format!("{}{}", &caps[1], identity.api_name)
        })
        .into_owned();

    let managed_re = Regex::new(r#"(\s+name_managed:\s+)(["']?)([^\n"']+)(["']?)"#)
        .expect("Invalid regex pattern");
    content = managed_re
        .replace_all(&content, |caps: &regex::Captures| {
            format!("{}{}{}{}", &caps[1], &caps[2], identity.display_name, &caps[4])
        })
        .into_owned();

    let permset_re = Regex::new(r"(api_names:\s*)\w+").expect("Invalid regex pattern");
    content = permset_re
        .replace_all(&content, |caps: &regex::Captures| {
            format!("{}{}Admin", &caps[1], identity.api_name)
        })
        .into_owned();

    if content == original {
        return Ok(false);
    }

    io::write_file_atomic(path, &content, "update project config")?;
    Ok(true)
}

/// Update org definition files under `orgs/`.
///
/// Each file gets token replacement plus an `orgName` derived from the
/// hyphenated label and the file stem. Unreadable files are skipped with a
/// warning. Returns the files that changed.
pub fn update_org_files(root: &Path, identity: &ProjectIdentity) -> Result<Vec<PathBuf>> {
    let org_name_re = Regex::new(r#""orgName":\s*"[^"]*""#).expect("Invalid regex pattern");
    let patterns = tokens::identity_patterns(identity);
    let mut changed = Vec::new();

    for path in glob_files(root, "orgs/*.json")? {
        let original = match io::read_file(&path, "read org file") {
            Ok(content) => content,
            Err(e) => {
                crate::log_status!("config", "Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let org_label = format!(
            r#""orgName": "{} - {} Org""#,
            identity.hyphenated_label,
            capitalize(&stem)
        );

        let mut content = tokens::apply_all(&original, &patterns);
        content = org_name_re
            .replace_all(&content, |_: &regex::Captures| org_label.clone())
            .into_owned();

        if content != original {
            io::write_file_atomic(&path, &content, "update org file")?;
            changed.push(path);
        }
    }

    Ok(changed)
}

/// Token replacement in snapshot definition files under `.cci/snapshot/`.
pub fn update_snapshot_files(root: &Path, identity: &ProjectIdentity) -> Result<Vec<PathBuf>> {
    let patterns = tokens::identity_patterns(identity);
    let mut changed = Vec::new();

    for path in glob_files(root, ".cci/snapshot/*.json")? {
        let original = match io::read_file(&path, "read snapshot file") {
            Ok(content) => content,
            Err(e) => {
                crate::log_status!("config", "Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        let content = tokens::apply_all(&original, &patterns);
        if content != original {
            io::write_file_atomic(&path, &content, "update snapshot file")?;
            changed.push(path);
        }
    }

    Ok(changed)
}

fn glob_files(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = root.join(pattern);
    let paths = glob::glob(&full.to_string_lossy())
        .map_err(|e| Error::internal_unexpected(format!("Invalid glob pattern: {}", e)))?;

    let mut files: Vec<PathBuf> = paths.flatten().filter(|p| p.is_file()).collect();
    files.sort();
    Ok(files)
}

/// First character uppercased, the rest lowercased.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const TEMPLATE_CONFIG: &str = concat!(
        "minimum_cumulusci_version: \"3.74.0\"\n",
        "project:\n",
        "    name: __PROJECT_NAME__\n",
        "    package:\n",
        "        name: __PROJECT_NAME__\n",
        "        name_managed: \"__PROJECT_LABEL__\"\n",
        "        api_version: \"58.0\"\n",
        "    git:\n",
        "        default_branch: \"main\"\n",
        "    # keep the sfdx source format\n",
        "    source_format: sfdx\n",
        "\n",
        "tasks:\n",
        "    robot:\n",
        "        options:\n",
        "            suites: robot/__PROJECT_LABEL__/tests\n",
        "    assign_permission_sets:\n",
        "        options:\n",
        "            api_names: __PROJECT_NAME__Admin\n",
    );

    fn identity() -> ProjectIdentity {
        ProjectIdentity::derive("Food-Bank")
    }

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join(PROJECT_CONFIG_FILE);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn update_pins_all_three_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), TEMPLATE_CONFIG);

        let changed = update_project_file(&path, &identity()).unwrap();
        assert!(changed);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("    name: Food Bank\n"));
        assert!(content.contains("        name: FoodBank\n"));
        assert!(content.contains("name_managed: \"Food Bank\""));
        assert!(content.contains("api_names: FoodBankAdmin"));
        assert!(content.contains("suites: robot/Food-Bank/tests"));
        assert!(!tokens::contains_token(&content));
    }

    #[test]
    fn update_preserves_unrelated_lines_and_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), TEMPLATE_CONFIG);

        update_project_file(&path, &identity()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("minimum_cumulusci_version: \"3.74.0\"\n"));
        assert!(content.contains("        api_version: \"58.0\"\n"));
        assert!(content.contains("    # keep the sfdx source format\n"));
        assert!(content.contains("        default_branch: \"main\"\n"));
    }

    #[test]
    fn update_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), TEMPLATE_CONFIG);

        assert!(update_project_file(&path, &identity()).unwrap());
        let after_first = fs::read_to_string(&path).unwrap();

        assert!(!update_project_file(&path, &identity()).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), after_first);
    }

    #[test]
    fn extract_reads_quoted_and_unquoted_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            concat!(
                "project:\n",
                "    name: Food Bank\n",
                "    package:\n",
                "        name: FoodBank\n",
                "        name_managed: \"Food Bank\"\n",
            ),
        );

        let extracted = extract_identity(&path).unwrap().unwrap();
        assert_eq!(extracted.project_name, "Food Bank");
        assert_eq!(extracted.package_name, "FoodBank");
        assert_eq!(extracted.name_managed, "Food Bank");
    }

    #[test]
    fn extract_returns_none_without_package_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "project:\n    name: Lonely\n");

        assert!(extract_identity(&path).unwrap().is_none());
    }

    #[test]
    fn org_files_get_names_from_their_stems() {
        let dir = tempfile::tempdir().unwrap();
        let orgs = dir.path().join("orgs");
        fs::create_dir_all(&orgs).unwrap();
        fs::write(
            orgs.join("dev.json"),
            r#"{"orgName": "__PROJECT_NAME__ Org", "edition": "Developer"}"#,
        )
        .unwrap();
        fs::write(
            orgs.join("qa.json"),
            r#"{"orgName": "placeholder", "edition": "Developer"}"#,
        )
        .unwrap();

        let changed = update_org_files(dir.path(), &identity()).unwrap();
        assert_eq!(changed.len(), 2);

        let dev = fs::read_to_string(orgs.join("dev.json")).unwrap();
        assert!(dev.contains(r#""orgName": "Food-Bank - Dev Org""#));
        let qa = fs::read_to_string(orgs.join("qa.json")).unwrap();
        assert!(qa.contains(r#""orgName": "Food-Bank - Qa Org""#));
    }

    #[test]
    fn snapshot_files_get_token_replacement_only() {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = dir.path().join(".cci/snapshot");
        fs::create_dir_all(&snapshots).unwrap();
        fs::write(
            snapshots.join("dev.json"),
            r#"{"project": "__PROJECT_NAME__"}"#,
        )
        .unwrap();

        let changed = update_snapshot_files(dir.path(), &identity()).unwrap();
        assert_eq!(changed.len(), 1);

        let content = fs::read_to_string(snapshots.join("dev.json")).unwrap();
        assert_eq!(content, r#"{"project": "FoodBank"}"#);
    }
}
