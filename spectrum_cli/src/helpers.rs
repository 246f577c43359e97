use anyhow::{Context, Result};
use prettytable::format::{FormatBuilder, LinePosition, LineSeparator};
use prettytable::{Row, Table, cell};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use spectrum::bin::BinnedSeries;
use spectrum::chi2::CovarianceMatrix;
use spectrum::pdf_uncertainty::{MemberEnsemble, PartitionConfig, Scheme};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub fn create_table() -> Table {
    let mut table = Table::new();
    table.set_format(
        FormatBuilder::new()
            .column_separator(' ')
            .separator(LinePosition::Title, LineSeparator::new('-', '+', ' ', ' '))
            .build(),
    );
    table
}

fn read_yaml<T: DeserializeOwned>(input: &Path) -> Result<T> {
    let reader = File::open(input)
        .map(BufReader::new)
        .with_context(|| format!("unable to open '{}'", input.display()))?;

    serde_yaml::from_reader(reader).with_context(|| format!("unable to parse '{}'", input.display()))
}

pub fn read_series(input: &Path) -> Result<BinnedSeries> {
    read_yaml(input)
}

pub fn read_covariance(input: &Path) -> Result<CovarianceMatrix> {
    read_yaml(input)
}

#[derive(Deserialize)]
struct EnsembleFile {
    scheme: String,
    #[serde(default)]
    central: usize,
    #[serde(default)]
    partition: Option<PartitionConfig>,
    members: Vec<BinnedSeries>,
}

pub fn read_ensemble(input: &Path) -> Result<MemberEnsemble> {
    let file: EnsembleFile = read_yaml(input)?;
    let scheme = Scheme::from_name(&file.scheme, file.partition)?;

    MemberEnsemble::new(file.members, scheme, file.central)
        .with_context(|| format!("invalid ensemble in '{}'", input.display()))
}

pub fn series_title(value_label: &str) -> Row {
    let mut title = Row::empty();
    title.add_cell(cell!(c->"b"));
    title.add_cell(cell!(c->"left"));
    title.add_cell(cell!(c->"right"));
    title.add_cell(cell!(c->value_label));
    title.add_cell(cell!(c->"+err"));
    title.add_cell(cell!(c->"-err"));
    title
}

pub fn add_series_rows(table: &mut Table, series: &BinnedSeries, digits: usize) {
    for (index, bin) in series.bins().iter().enumerate() {
        let row = table.add_empty_row();

        row.add_cell(cell!(r->format!("{index}")));
        row.add_cell(cell!(r->format!("{}", bin.left())));
        row.add_cell(cell!(r->format!("{}", bin.right())));
        row.add_cell(cell!(r->format!("{:.*e}", digits, bin.y)));
        row.add_cell(cell!(r->format!("{:.*e}", digits, bin.eyh)));
        row.add_cell(cell!(r->format!("{:.*e}", digits, bin.eyl)));
    }
}
