use clap::Parser;
use fundbook::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
