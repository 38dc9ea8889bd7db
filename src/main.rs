use clap::Parser;
use mlstock::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
