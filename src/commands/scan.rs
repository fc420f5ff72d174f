use clap::Args;
use serde::Serialize;

use imprint::rewrite::{self, ScanReport};

use super::CmdResult;

#[derive(Args)]
pub struct ScanArgs {
    /// Directory to scan (defaults to the current directory)
    #[arg(long)]
    pub root: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOutput {
    pub command: String,
    pub clean: bool,
    pub report: ScanReport,
}

/// Advisory only: remaining tokens never fail the run.
pub fn run(args: ScanArgs, _global: &crate::commands::GlobalArgs) -> CmdResult<ScanOutput> {
    let root = super::resolve_root(args.root.as_deref());
    let report = rewrite::scan(&root);

    if report.is_clean() {
        imprint::log_status!("scan", "No tokens found");
    } else {
        imprint::log_status!("scan", "{} path(s) still carry tokens", report.hit_count());
    }

    Ok((
        ScanOutput {
            command: "scan".to_string(),
            clean: report.is_clean(),
            report,
        },
        0,
    ))
}
