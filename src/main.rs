use clap::Parser;
use market_analyzer::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
