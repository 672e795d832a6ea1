use ca_cli::clap_args::Cli;
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    ca_cli::run(cli)
}
