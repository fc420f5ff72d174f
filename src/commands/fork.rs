use std::path::Path;

use clap::Args;
use serde::Serialize;

use imprint::github::{self, ForkOutcome, GitHubClient};
use imprint::{git, tty};

use super::CmdResult;

#[derive(Args)]
pub struct ForkArgs {
    /// Source repository owner (defaults to the origin remote)
    #[arg(long)]
    pub source_owner: Option<String>,

    /// Source repository name (defaults to the origin remote)
    #[arg(long)]
    pub source_repo: Option<String>,

    /// Name for the fork (prompted for interactively when omitted)
    #[arg(long)]
    pub new_name: Option<String>,

    /// GitHub token (falls back to GITHUB_TOKEN, then the keychain)
    #[arg(long)]
    pub token: Option<String>,

    /// Point the origin remote at the fork afterwards without asking
    #[arg(long)]
    pub update_remote: bool,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkOutput {
    pub command: String,
    pub cancelled: bool,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fork: Option<ForkOutcome>,
    pub remote_updated: bool,
}

pub fn run(args: ForkArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<ForkOutput> {
    let non_interactive = super::non_interactive_mode(false);
    let cwd = Path::new(".");

    let (source_owner, source_repo) = match (&args.source_owner, &args.source_repo) {
        (Some(owner), Some(repo)) => (owner.clone(), repo.clone()),
        _ => {
            let info = git::remote_info(cwd).map_err(|e| {
                e.with_hint("Pass --source-owner and --source-repo when there is no GitHub origin")
            })?;
            (info.owner, info.repo)
        }
    };
    let source = format!("{}/{}", source_owner, source_repo);

    let token = super::resolve_github_token(args.token.as_deref(), non_interactive)?;
    let client = GitHubClient::new(token)?;

    let verified = client.verify_token()?;
    imprint::log_status!("fork", "Token verified for {}", verified.login);
    if !verified.scopes.is_empty() {
        imprint::log_status!("fork", "Token scopes: {}", verified.scopes.join(", "));
    }

    let new_name = match args.new_name {
        Some(name) => Some(name),
        None if !non_interactive && tty::is_stdin_tty() => {
            let answer = tty::prompt(&format!(
                "New repository name (leave empty to keep '{}'): ",
                source_repo
            ))?;
            if answer.is_empty() {
                None
            } else {
                Some(answer)
            }
        }
        None => None,
    };

    if !args.yes && !non_interactive {
        let target = new_name.as_deref().unwrap_or(&source_repo);
        if !tty::confirm(&format!("Fork {} as {}/{}?", source, verified.login, target))? {
            imprint::log_status!("fork", "Cancelled");
            return Ok((
                ForkOutput {
                    command: "fork".to_string(),
                    cancelled: true,
                    source,
                    login: Some(verified.login),
                    fork: None,
                    remote_updated: false,
                },
                0,
            ));
        }
    }

    let outcome = github::fork_and_rename(
        &client,
        &source_owner,
        &source_repo,
        new_name.as_deref(),
    )?;
    imprint::log_status!("fork", "Fork available at {}", outcome.url);

    let remote_updated = update_remote(cwd, &outcome, args.update_remote, non_interactive);

    Ok((
        ForkOutput {
            command: "fork".to_string(),
            cancelled: false,
            source,
            login: Some(verified.login),
            fork: Some(outcome),
            remote_updated,
        },
        0,
    ))
}

/// Point origin at the fork. Failures are warnings; the fork itself stands.
fn update_remote(cwd: &Path, outcome: &ForkOutcome, forced: bool, non_interactive: bool) -> bool {
    let wanted = if forced {
        true
    } else if non_interactive || !tty::is_stdin_tty() {
        false
    } else {
        tty::confirm("Update the origin remote to point at the fork?").unwrap_or(false)
    };

    if !wanted {
        return false;
    }

    let url = format!("https://github.com/{}/{}.git", outcome.owner, outcome.repo);
    match git::set_origin_url(cwd, &url) {
        Ok(()) => {
            imprint::log_status!("fork", "Origin now points at {}", url);
            true
        }
        Err(e) => {
            imprint::log_status!("fork", "Could not update the origin remote: {}", e);
            false
        }
    }
}
