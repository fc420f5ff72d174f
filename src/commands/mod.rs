use std::path::{Path, PathBuf};

use clap::Args;

use imprint::identity::{self, ResolveRequest};
use imprint::project_config;
use imprint::tokens::{self, FindReplacePattern, ResolvedPattern};
use imprint::{keychain, tty, Error};

pub type CmdResult<T> = imprint::Result<(T, i32)>;

pub(crate) struct GlobalArgs {}

/// Identity inputs shared by the commands that resolve a project name.
#[derive(Args, Default, Debug)]
pub struct IdentityArgs {
    /// Repository name to derive naming from (e.g. "My-Project")
    #[arg(long)]
    pub repo_name: Option<String>,

    /// Explicit display name; requires --api-name and --label
    #[arg(long)]
    pub display_name: Option<String>,

    /// Explicit package/API name; requires --display-name and --label
    #[arg(long)]
    pub api_name: Option<String>,

    /// Explicit hyphenated label; requires --display-name and --api-name
    #[arg(long)]
    pub label: Option<String>,
}

impl IdentityArgs {
    pub fn to_request(&self, root: &Path, non_interactive: bool) -> ResolveRequest {
        ResolveRequest {
            explicit_display_name: self.display_name.clone(),
            explicit_api_name: self.api_name.clone(),
            explicit_label: self.label.clone(),
            repo_name: self.repo_name.clone(),
            repo_name_env: identity::repo_name_from_env(),
            config_path: Some(root.join(project_config::PROJECT_CONFIG_FILE)),
            non_interactive,
        }
    }
}

/// Find/replace pairs shared by package and archive.
#[derive(Args, Default, Debug)]
pub struct PatternArgs {
    /// Text to find (repeatable, pairs with --replace in order)
    #[arg(long = "find")]
    pub find: Vec<String>,

    /// Replacement text (repeatable, pairs with --find in order)
    #[arg(long = "replace")]
    pub replace: Vec<String>,
}

impl PatternArgs {
    pub fn is_empty(&self) -> bool {
        self.find.is_empty() && self.replace.is_empty()
    }

    /// Zip --find/--replace pairs into patterns.
    pub fn to_patterns(&self) -> imprint::Result<Vec<ResolvedPattern>> {
        if self.find.len() != self.replace.len() {
            return Err(Error::validation_invalid_argument(
                "replace",
                format!(
                    "Got {} --find flag(s) but {} --replace flag(s); they pair in order",
                    self.find.len(),
                    self.replace.len()
                ),
                None,
                None,
            ));
        }

        self.find
            .iter()
            .zip(self.replace.iter())
            .map(|(f, r)| FindReplacePattern::literal(f, r).resolve(None))
            .collect()
    }
}

/// Non-interactive is the flag or a CI environment.
pub fn non_interactive_mode(flag: bool) -> bool {
    flag || std::env::var("CI").map(|v| v == "true").unwrap_or(false)
}

/// Expand `~` and make a usable root path out of a CLI argument.
pub fn resolve_root(root: Option<&str>) -> PathBuf {
    let raw = root.unwrap_or(".");
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

/// GitHub token sources in priority order: flag, GITHUB_TOKEN, keychain,
/// interactive prompt. A prompted token is stored for later runs.
pub fn resolve_github_token(flag: Option<&str>, non_interactive: bool) -> imprint::Result<String> {
    if let Some(token) = normalize(flag) {
        return Ok(token);
    }

    if let Some(token) = normalize(std::env::var("GITHUB_TOKEN").ok().as_deref()) {
        return Ok(token);
    }

    match keychain::get_github_token() {
        Ok(Some(token)) => return Ok(token),
        Ok(None) => {}
        Err(e) => imprint::log_status!("auth", "Keychain lookup failed: {}", e),
    }

    if !non_interactive && tty::is_stdin_tty() {
        let token = tty::prompt_password("GitHub Personal Access Token (with 'repo' scope): ")?;
        if let Some(token) = normalize(Some(&token)) {
            if let Err(e) = keychain::store_github_token(&token) {
                imprint::log_status!("auth", "Could not store token in keychain: {}", e);
            }
            return Ok(token);
        }
    }

    Err(
        Error::validation_missing_argument(vec!["--token".to_string()])
            .with_hint("Set the GITHUB_TOKEN environment variable or pass --token"),
    )
}

fn normalize(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Patterns for the project tokens, resolved from CI env or cumulusci.yml.
/// Package and archive fall back to these when no --find/--replace pairs
/// are given.
pub fn identity_fallback_patterns(
    root: &Path,
    non_interactive: bool,
) -> imprint::Result<Vec<ResolvedPattern>> {
    let request = ResolveRequest {
        repo_name_env: identity::repo_name_from_env(),
        config_path: Some(root.join(project_config::PROJECT_CONFIG_FILE)),
        non_interactive,
        ..Default::default()
    };
    let resolved = identity::resolve(&request)?;
    Ok(tokens::identity_patterns(&resolved.identity))
}

pub mod apply;
pub mod archive;
pub mod auth;
pub mod fork;
pub mod package;
pub mod scan;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (imprint::Result<serde_json::Value>, i32) {
    tty::status("imprint is working...");

    match command {
        crate::Commands::Apply(args) => dispatch!(args, global, apply),
        crate::Commands::Scan(args) => dispatch!(args, global, scan),
        crate::Commands::Fork(args) => dispatch!(args, global, fork),
        crate::Commands::Auth(args) => dispatch!(args, global, auth),
        crate::Commands::Package(args) => dispatch!(args, global, package),
        crate::Commands::Archive(args) => dispatch!(args, global, archive),
    }
}
