use std::path::Path;

use clap::Args;
use serde::Serialize;

use imprint::archive::{self, ArchiveReport};

use super::CmdResult;

#[derive(Args)]
pub struct ArchiveArgs {
    /// Zip archive to rewrite
    #[arg(long)]
    pub input: String,

    /// Where to write the rewritten archive
    #[arg(long)]
    pub output: String,

    /// Apply the patterns to entry paths as well as contents
    #[arg(long)]
    pub rename_entries: bool,

    #[command(flatten)]
    pub patterns: super::PatternArgs,

    /// Run without prompts even outside CI
    #[arg(long)]
    pub non_interactive: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveOutput {
    pub command: String,
    pub input: String,
    pub output: String,
    pub report: ArchiveReport,
}

pub fn run(args: ArchiveArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<ArchiveOutput> {
    let non_interactive = super::non_interactive_mode(args.non_interactive);
    let input = super::resolve_root(Some(&args.input));
    let output = super::resolve_root(Some(&args.output));

    let patterns = if args.patterns.is_empty() {
        super::identity_fallback_patterns(Path::new("."), non_interactive)?
    } else {
        args.patterns.to_patterns()?
    };

    let report = archive::rewrite_archive_file(&input, &output, &patterns, args.rename_entries)?;
    imprint::log_status!(
        "archive",
        "Rewrote {} of {} entries into {}",
        report.rewritten_entries.len(),
        report.entry_count,
        output.display()
    );

    Ok((
        ArchiveOutput {
            command: "archive".to_string(),
            input: input.display().to_string(),
            output: output.display().to_string(),
            report,
        },
        0,
    ))
}
