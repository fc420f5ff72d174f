use clap::{Parser, Subcommand};

use commands::GlobalArgs;

mod commands;
mod output;

use commands::{apply, archive, auth, fork, package, scan};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "imprint")]
#[command(version = VERSION)]
#[command(about = "Stamp template repositories with a real project name")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite template tokens across the working tree
    Apply(apply::ApplyArgs),
    /// Report template tokens that are still present
    Scan(scan::ScanArgs),
    /// Fork a template repository under a new name
    Fork(fork::ForkArgs),
    /// Store a Salesforce auth URL as a GitHub Actions secret
    Auth(auth::AuthArgs),
    /// Run a packaging command against a token-free tree
    Package(package::PackageArgs),
    /// Rewrite tokens inside a zip archive
    Archive(archive::ArchiveArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let global = GlobalArgs {};

    let (json_result, exit_code) = commands::run_json(cli.command, &global);
    output::print_json_result(json_result);

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
