use super::helpers;
use super::{GlobalConfiguration, Subcommand};
use anyhow::Result;
use clap::{Parser, ValueHint};
use spectrum::pdf_uncertainty::{self, ErrorSize};
use std::path::PathBuf;
use std::process::ExitCode;

/// Calculates the PDF uncertainty envelope of an ensemble of member predictions.
#[derive(Parser)]
pub struct Opts {
    /// Path to the ensemble.
    #[arg(value_hint = ValueHint::FilePath)]
    ensemble: PathBuf,
    /// The members describe 90% confidence level uncertainties, rescale them to one sigma.
    #[arg(long)]
    ninety_percent: bool,
    /// Set the number of fractional digits shown for values and errors.
    #[arg(default_value_t = 7, long, value_name = "DIGITS")]
    digits: usize,
}

impl Subcommand for Opts {
    fn run(&self, _: &GlobalConfiguration) -> Result<ExitCode> {
        let ensemble = helpers::read_ensemble(&self.ensemble)?;
        let size = if self.ninety_percent {
            ErrorSize::NinetyPercent
        } else {
            ErrorSize::OneSigma
        };

        log::info!(
            "evaluating {} members with scheme {:?}",
            ensemble.members(),
            ensemble.scheme()
        );

        let result = pdf_uncertainty::envelope(&ensemble, size);

        let mut table = helpers::create_table();
        table.set_titles(helpers::series_title("central"));
        helpers::add_series_rows(&mut table, &result, self.digits);
        table.printstd();

        Ok(ExitCode::SUCCESS)
    }
}
