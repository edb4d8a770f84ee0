//! Binary entry point for the `ultraflate` command-line tool.

use clap::Parser;

use ultraflate::cli::{args::Cli, run};

fn main() {
    std::process::exit(run(Cli::parse()));
}
