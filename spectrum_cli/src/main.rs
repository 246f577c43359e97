//! The `spectrum` binary.

use clap::Parser;
use spectrum_cli::{Opts, Subcommand};
use std::process::ExitCode;

fn main() -> ExitCode {
    let opts = Opts::parse();

    opts.configuration.init_logger();

    match opts.subcommand.run(&opts.configuration) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("Error: {error:#}");
            ExitCode::FAILURE
        }
    }
}
