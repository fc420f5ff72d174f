use std::path::Path;

use clap::Args;
use serde::Serialize;

use imprint::error::Error;
use imprint::github::GitHubClient;
use imprint::{git, sf, tty};

use super::CmdResult;

#[derive(Args)]
pub struct AuthArgs {
    /// Salesforce org alias (prompted for interactively when omitted)
    #[arg(long)]
    pub org_alias: Option<String>,

    /// Name of the Actions secret to create
    #[arg(long, default_value = "DEV_HUB_AUTH_URL")]
    pub secret_name: String,

    /// Repository owner (defaults to the origin remote)
    #[arg(long)]
    pub owner: Option<String>,

    /// Repository name (defaults to the origin remote)
    #[arg(long)]
    pub repo: Option<String>,

    /// GitHub token (falls back to GITHUB_TOKEN, then the keychain)
    #[arg(long)]
    pub token: Option<String>,

    /// Reuse an existing org authorization instead of opening the browser
    #[arg(long)]
    pub skip_auth: bool,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthOutput {
    pub command: String,
    pub cancelled: bool,
    pub org_alias: String,
    pub secret_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    pub secret_created: bool,
}

pub fn run(args: AuthArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<AuthOutput> {
    let non_interactive = super::non_interactive_mode(false);
    let cwd = Path::new(".");

    let version = sf::ensure_installed()?;
    imprint::log_status!("auth", "Salesforce CLI {}", version);

    let org_alias = match args.org_alias {
        Some(alias) => alias,
        None if !non_interactive && tty::is_stdin_tty() => {
            let answer = tty::prompt("Org alias (e.g. 'dev-hub'): ")?;
            if answer.is_empty() {
                return Err(Error::validation_missing_argument(vec![
                    "--org-alias".to_string(),
                ]));
            }
            answer
        }
        None => {
            return Err(Error::validation_missing_argument(vec![
                "--org-alias".to_string(),
            ]))
        }
    };

    if args.skip_auth {
        imprint::log_status!("auth", "Using the existing authorization for '{}'", org_alias);
    } else {
        imprint::log_status!("auth", "Opening the browser login for '{}'", org_alias);
        sf::login_interactive(&org_alias)?;
    }

    let auth_url = sf::auth_url(&org_alias)?;
    imprint::log_status!("auth", "Auth URL retrieved ({})", preview(&auth_url));

    let (owner, repo) = match (&args.owner, &args.repo) {
        (Some(owner), Some(repo)) => (owner.clone(), repo.clone()),
        _ => {
            let info = git::remote_info(cwd).map_err(|e| {
                e.with_hint("Pass --owner and --repo when there is no GitHub origin")
            })?;
            (info.owner, info.repo)
        }
    };
    let repository = format!("{}/{}", owner, repo);

    if !args.yes && !non_interactive {
        let question = format!(
            "Store this as the {} secret on {}?",
            args.secret_name, repository
        );
        if !tty::confirm(&question)? {
            imprint::log_status!("auth", "Cancelled");
            return Ok((
                AuthOutput {
                    command: "auth".to_string(),
                    cancelled: true,
                    org_alias,
                    secret_name: args.secret_name,
                    repository: Some(repository),
                    secret_created: false,
                },
                0,
            ));
        }
    }

    let token = super::resolve_github_token(args.token.as_deref(), non_interactive)?;
    let client = GitHubClient::new(token)?;
    client.create_secret(&owner, &repo, &args.secret_name, &auth_url)?;
    imprint::log_status!("auth", "Secret {} set on {}", args.secret_name, repository);

    Ok((
        AuthOutput {
            command: "auth".to_string(),
            cancelled: false,
            org_alias,
            secret_name: args.secret_name,
            repository: Some(repository),
            secret_created: true,
        },
        0,
    ))
}

/// Shorten the auth URL for status output. The full value only ever goes to GitHub.
fn preview(url: &str) -> String {
    let shortened: String = url.chars().take(50).collect();
    if shortened.len() < url.len() {
        format!("{}...", shortened)
    } else {
        shortened
    }
}
