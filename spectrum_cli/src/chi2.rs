use super::helpers;
use super::{GlobalConfiguration, Subcommand};
use anyhow::{Context, Result};
use clap::{Parser, ValueHint};
use prettytable::{Row, cell};
use rayon::{ThreadPoolBuilder, prelude::*};
use spectrum::chi2;
use spectrum::reconcile;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;

/// Relative tolerance when comparing the covariance matrix with the errors of the data.
const COVARIANCE_RELTOL: f64 = 0.01;

/// Calculates the χ² of one or more theory predictions with respect to a measurement.
#[derive(Parser)]
pub struct Opts {
    /// Path to the measurement.
    #[arg(value_hint = ValueHint::FilePath)]
    data: PathBuf,
    /// Path to the covariance matrix of the measurement.
    #[arg(value_hint = ValueHint::FilePath)]
    covariance: PathBuf,
    /// Path(s) to the theory predictions.
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    theory: Vec<PathBuf>,
    /// Number of threads to utilize.
    #[arg(default_value_t = thread::available_parallelism().map_or(1, NonZeroUsize::get), long)]
    threads: usize,
    /// Set the number of fractional digits shown for the χ².
    #[arg(default_value_t = 4, long, value_name = "DIGITS")]
    digits: usize,
}

impl Subcommand for Opts {
    fn run(&self, _: &GlobalConfiguration) -> Result<ExitCode> {
        let data = helpers::read_series(&self.data)?;
        let covariance = helpers::read_covariance(&self.covariance)?;

        if !covariance.check_against(&data, COVARIANCE_RELTOL) {
            log::warn!(
                "covariance matrix '{}' is inconsistent with the errors of '{}'",
                self.covariance.display(),
                self.data.display()
            );
        }

        ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build_global()?;

        let results = self
            .theory
            .par_iter()
            .map(|path| {
                let mut theory = helpers::read_series(path)?;

                if !theory.is_cobinned(&data) {
                    log::info!("rebinning '{}' onto the binning of the data", path.display());
                    theory = reconcile::reconcile(&data, &theory)?;
                }

                let theory = theory.to_convention(data.density_form(), data.normalized())?;

                chi2::chi_square(&theory, &data, &covariance)
                    .with_context(|| format!("unable to compare '{}'", path.display()))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut title = Row::empty();
        title.add_cell(cell!(c->"theory"));
        title.add_cell(cell!(c->"chi2"));
        title.add_cell(cell!(c->"ndf"));
        title.add_cell(cell!(c->"chi2/ndf"));

        let mut table = helpers::create_table();
        table.set_titles(title);

        let ndf = data.len();
        let ndf_f64 = f64::from(u32::try_from(ndf)?);

        for (path, chi2) in self.theory.iter().zip(results) {
            let row = table.add_empty_row();

            row.add_cell(cell!(l->format!("{}", path.display())));
            row.add_cell(cell!(r->format!("{:.*}", self.digits, chi2)));
            row.add_cell(cell!(r->format!("{ndf}")));
            row.add_cell(cell!(r->format!("{:.*}", self.digits, chi2 / ndf_f64)));
        }

        table.printstd();

        Ok(ExitCode::SUCCESS)
    }
}
