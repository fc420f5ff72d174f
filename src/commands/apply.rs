use clap::Args;
use serde::Serialize;

use imprint::identity::{self, ResolvedIdentity};
use imprint::rewrite::{RewriteReport, ScanReport};
use imprint::tokens;
use imprint::{project_config, rewrite, tty, Error};

use super::{CmdResult, IdentityArgs};

/// Template repositories this tool instantiates. `apply` must never burn
/// tokens into these; CI runs on them are refused outright.
const TEMPLATE_REPOS: &[&str] = &[
    "extra-chill/scaffold-template",
    "extra-chill/scaffoldtemplate",
];

#[derive(Args)]
pub struct ApplyArgs {
    /// Directory to rewrite (defaults to the current directory)
    #[arg(long)]
    pub root: Option<String>,

    #[command(flatten)]
    pub identity: IdentityArgs,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Fail instead of prompting when input is needed
    #[arg(long)]
    pub non_interactive: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyOutput {
    pub command: String,
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<ResolvedIdentity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewrite: Option<RewriteReport>,
    pub project_file_updated: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub org_files_updated: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub snapshot_files_updated: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<ScanReport>,
}

pub fn run(args: ApplyArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<ApplyOutput> {
    let root = super::resolve_root(args.root.as_deref());
    let non_interactive = super::non_interactive_mode(args.non_interactive);

    if non_interactive {
        if let Some(slug) = detected_template_repository() {
            return Err(Error::validation_invalid_argument(
                "repository",
                format!(
                    "Refusing to rewrite the template repository itself ({})",
                    slug
                ),
                Some(slug),
                None,
            )
            .with_hint("Run this in a repository created from the template, not in the template"));
        }
    }

    let resolved = identity::resolve(&args.identity.to_request(&root, non_interactive))?;

    if !args.yes && !non_interactive {
        imprint::log_status!("apply", "Display name: {}", resolved.identity.display_name);
        imprint::log_status!("apply", "API name:     {}", resolved.identity.api_name);
        imprint::log_status!("apply", "Label:        {}", resolved.identity.hyphenated_label);

        if !tty::confirm("Use these values to replace tokens?")? {
            imprint::log_status!("apply", "Cancelled");
            return Ok((cancelled_output(), 0));
        }
    }

    let patterns = tokens::identity_patterns(&resolved.identity);
    let rewrite_report = rewrite::apply(&root, &patterns);

    let project_file = root.join(project_config::PROJECT_CONFIG_FILE);
    let project_file_updated = if project_file.is_file() {
        project_config::update_project_file(&project_file, &resolved.identity)?
    } else {
        false
    };

    let org_files = project_config::update_org_files(&root, &resolved.identity)?;
    let snapshot_files = project_config::update_snapshot_files(&root, &resolved.identity)?;

    let remaining = rewrite::scan(&root);
    if remaining.is_clean() {
        imprint::log_status!("apply", "No remaining tokens found");
    } else {
        imprint::log_status!(
            "apply",
            "{} path(s) still carry tokens; see the scan in the output",
            remaining.hit_count()
        );
    }

    Ok((
        ApplyOutput {
            command: "apply".to_string(),
            cancelled: false,
            identity: Some(resolved),
            rewrite: Some(rewrite_report),
            project_file_updated,
            org_files_updated: display_paths(org_files),
            snapshot_files_updated: display_paths(snapshot_files),
            remaining: Some(remaining),
        },
        0,
    ))
}

fn cancelled_output() -> ApplyOutput {
    ApplyOutput {
        command: "apply".to_string(),
        cancelled: true,
        identity: None,
        rewrite: None,
        project_file_updated: false,
        org_files_updated: Vec::new(),
        snapshot_files_updated: Vec::new(),
        remaining: None,
    }
}

fn detected_template_repository() -> Option<String> {
    let slug = std::env::var("GITHUB_REPOSITORY").ok()?.to_lowercase();
    TEMPLATE_REPOS.contains(&slug.as_str()).then_some(slug)
}

fn display_paths(paths: Vec<std::path::PathBuf>) -> Vec<String> {
    paths.iter().map(|p| p.display().to_string()).collect()
}
