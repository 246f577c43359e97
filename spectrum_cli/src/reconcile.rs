use super::helpers;
use super::{GlobalConfiguration, Subcommand};
use anyhow::Result;
use clap::{Parser, ValueHint};
use prettytable::{Row, cell};
use spectrum::reconcile;
use std::path::PathBuf;
use std::process::ExitCode;

/// Rebins a series onto the binning of another one.
#[derive(Parser)]
pub struct Opts {
    /// Path to the series defining the binning.
    #[arg(value_hint = ValueHint::FilePath)]
    master: PathBuf,
    /// Path to the series that is rebinned.
    #[arg(value_hint = ValueHint::FilePath)]
    slave: PathBuf,
    /// Show both series restricted to the bins they have in common instead.
    #[arg(long)]
    common: bool,
    /// Set the number of fractional digits shown for values and errors.
    #[arg(default_value_t = 7, long, value_name = "DIGITS")]
    digits: usize,
}

impl Subcommand for Opts {
    fn run(&self, _: &GlobalConfiguration) -> Result<ExitCode> {
        let master = helpers::read_series(&self.master)?;
        let slave = helpers::read_series(&self.slave)?;

        let mut table = helpers::create_table();

        if self.common {
            let (master, slave) = reconcile::common_bins(&master, &slave)?;

            let mut title = Row::empty();
            title.add_cell(cell!(c->"b"));
            title.add_cell(cell!(c->"left"));
            title.add_cell(cell!(c->"right"));
            title.add_cell(cell!(c->"master"));
            title.add_cell(cell!(c->"slave"));
            table.set_titles(title);

            for (index, (m_bin, s_bin)) in master.bins().iter().zip(slave.bins()).enumerate() {
                let row = table.add_empty_row();

                row.add_cell(cell!(r->format!("{index}")));
                row.add_cell(cell!(r->format!("{}", m_bin.left())));
                row.add_cell(cell!(r->format!("{}", m_bin.right())));
                row.add_cell(cell!(r->format!("{:.*e}", self.digits, m_bin.y)));
                row.add_cell(cell!(r->format!("{:.*e}", self.digits, s_bin.y)));
            }
        } else {
            let result = reconcile::reconcile(&master, &slave)?;

            table.set_titles(helpers::series_title("value"));
            helpers::add_series_rows(&mut table, &result, self.digits);
        }

        table.printstd();

        Ok(ExitCode::SUCCESS)
    }
}
