//! Local git remote inspection and repointing.

use std::path::Path;

use regex::Regex;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::utils::command;

/// Owner and repository name taken from a GitHub remote URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteInfo {
    pub owner: String,
    pub repo: String,
}

impl RemoteInfo {
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    let output = command::capture("git", &args, Some(dir))?;
    if !output.success {
        let text = if output.stderr.trim().is_empty() {
            output.stdout.trim().to_string()
        } else {
            output.stderr.trim().to_string()
        };
        return Err(Error::git_command_failed(format!(
            "git {} failed: {}",
            args.join(" "),
            text
        )));
    }
    Ok(output.stdout.trim().to_string())
}

/// Read the `origin` remote URL of the repository at `dir`.
pub fn origin_url(dir: &Path) -> Result<String> {
    run_git(dir, &["remote", "get-url", "origin"])
}

/// Owner/repo of the `origin` remote, which must point at GitHub.
pub fn remote_info(dir: &Path) -> Result<RemoteInfo> {
    let url = origin_url(dir)?;
    parse_github_url(&url).ok_or_else(|| {
        Error::config_invalid_value(
            "remote.origin.url",
            Some(url),
            "Not a recognized GitHub remote URL",
        )
    })
}

/// Repoint the `origin` remote at a new URL.
pub fn set_origin_url(dir: &Path, url: &str) -> Result<()> {
    run_git(dir, &["remote", "set-url", "origin", url])?;
    Ok(())
}

/// Parse `https://github.com/owner/repo(.git)` and
/// `git@github.com:owner/repo(.git)` forms.
pub fn parse_github_url(url: &str) -> Option<RemoteInfo> {
    let re = Regex::new(r"^(?:https://github\.com/|git@github\.com:)([^/]+)/([^/]+?)(?:\.git)?/?$")
        .expect("Invalid regex pattern");

    let caps = re.captures(url.trim())?;
    Some(RemoteInfo {
        owner: caps[1].to_string(),
        repo: caps[2].to_string(),
    })
}
