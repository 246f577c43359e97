use super::helpers;
use super::{GlobalConfiguration, Subcommand};
use anyhow::Result;
use clap::{Parser, ValueHint};
use spectrum::divide::{self, ErrorMode, Master};
use std::path::PathBuf;
use std::process::ExitCode;

/// Divides two series, rebinning one of them if necessary.
#[derive(Parser)]
pub struct Opts {
    /// Path to the numerator series.
    #[arg(value_hint = ValueHint::FilePath)]
    numerator: PathBuf,
    /// Path to the denominator series.
    #[arg(value_hint = ValueHint::FilePath)]
    denominator: PathBuf,
    /// How the errors of both operands are propagated: full, zero-numerator, zero-denominator or
    /// zero-all.
    #[arg(default_value_t = ErrorMode::Full, long)]
    mode: ErrorMode,
    /// The operand whose binning is kept: numerator or denominator.
    #[arg(default_value = "numerator", long)]
    master: Master,
    /// Set the number of fractional digits shown for values and errors.
    #[arg(default_value_t = 7, long, value_name = "DIGITS")]
    digits: usize,
}

impl Subcommand for Opts {
    fn run(&self, _: &GlobalConfiguration) -> Result<ExitCode> {
        let numerator = helpers::read_series(&self.numerator)?;
        let denominator = helpers::read_series(&self.denominator)?;

        let result = divide::ratio(&numerator, &denominator, self.mode, self.master)?;

        log::info!("divided with error mode '{}'", result.mode);

        let mut table = helpers::create_table();
        table.set_titles(helpers::series_title("ratio"));
        helpers::add_series_rows(&mut table, &result.series, self.digits);
        table.printstd();

        Ok(ExitCode::SUCCESS)
    }
}
