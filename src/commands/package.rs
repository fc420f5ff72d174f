use std::path::Path;

use clap::Args;
use serde::Serialize;

use imprint::error::Error;
use imprint::package::{self, PackageReport, PackageRequest};

use super::CmdResult;

#[derive(Args)]
pub struct PackageArgs {
    /// Directory to rewrite for the duration of the command
    #[arg(long, default_value = "force-app")]
    pub source: String,

    #[command(flatten)]
    pub patterns: super::PatternArgs,

    /// Run without prompts even outside CI
    #[arg(long)]
    pub non_interactive: bool,

    /// Packaging command, after `--` (e.g. `-- sf package version create ...`)
    #[arg(last = true)]
    pub command: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageOutput {
    pub command: String,
    pub source: String,
    pub report: PackageReport,
}

pub fn run(args: PackageArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<PackageOutput> {
    let non_interactive = super::non_interactive_mode(args.non_interactive);
    let source = super::resolve_root(Some(&args.source));

    let patterns = if args.patterns.is_empty() {
        super::identity_fallback_patterns(Path::new("."), non_interactive)?
    } else {
        args.patterns.to_patterns()?
    };

    let request = PackageRequest {
        source: source.clone(),
        patterns,
        command: args.command,
        workdir: None,
    };

    let report = package::run_packaging(&request)?;

    if !report.restored {
        let mut err = Error::internal_io(
            "The packaging run finished but the source tree was not restored",
            Some(source.display().to_string()),
        );
        if let Some(backup) = &report.backup_path {
            err = err.with_hint(format!("Your original tree is saved at {}", backup));
        }
        return Err(err);
    }

    let exit_code = if report.command_exit_code == 0 { 0 } else { 1 };

    Ok((
        PackageOutput {
            command: "package".to_string(),
            source: source.display().to_string(),
            report,
        },
        exit_code,
    ))
}
