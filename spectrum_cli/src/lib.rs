//! Command-line interface of the `spectrum` comparison engine.

mod chi2;
mod envelope;
mod helpers;
mod ratio;
mod reconcile;

use anyhow::Result;
use clap::{ArgAction, Parser};
use enum_dispatch::enum_dispatch;
use git_version::git_version;
use log::LevelFilter;
use std::process::ExitCode;

#[derive(Parser)]
pub struct GlobalConfiguration {
    /// Increase the verbosity of diagnostic messages, can be given multiple times.
    #[arg(action = ArgAction::Count, global = true, long, short)]
    pub verbose: u8,
}

impl GlobalConfiguration {
    /// Returns the maximum log level corresponding to the number of `--verbose` flags.
    #[must_use]
    pub const fn level_filter(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Error,
            1 => LevelFilter::Warn,
            2 => LevelFilter::Info,
            3 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    /// Installs the logger. Messages go to standard error; `RUST_LOG` may refine the filter.
    pub fn init_logger(&self) {
        env_logger::Builder::new()
            .filter_level(self.level_filter())
            .parse_default_env()
            .format_timestamp(None)
            .init();
    }
}

/// Trait implemented by every subcommand.
#[enum_dispatch]
pub trait Subcommand {
    /// Executes the subcommand.
    ///
    /// # Errors
    ///
    /// Returns an error if an input can not be read or the comparison fails.
    fn run(&self, cfg: &GlobalConfiguration) -> Result<ExitCode>;
}

#[enum_dispatch(Subcommand)]
#[derive(Parser)]
pub enum SubcommandEnum {
    Chi2(chi2::Opts),
    Envelope(envelope::Opts),
    Ratio(ratio::Opts),
    Reconcile(reconcile::Opts),
}

#[derive(Parser)]
#[command(
    arg_required_else_help = true,
    author,
    about,
    disable_help_subcommand = true,
    name = "spectrum",
    version = git_version!(
        args = ["--always", "--dirty", "--long", "--tags"],
        cargo_prefix = "",
        fallback = "unknown"
    )
)]
pub struct Opts {
    #[command(flatten)]
    pub configuration: GlobalConfiguration,
    #[command(subcommand)]
    pub subcommand: SubcommandEnum,
}
