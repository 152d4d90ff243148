use clap::Parser;
use rsitrend::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
