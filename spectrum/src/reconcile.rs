//! Bringing two binned series with different binnings onto a common binning.

use super::bin::{same_edge, Bin, BinnedSeries};
use super::error::{Error, Result};

fn definitely_less(lhs: f64, rhs: f64) -> bool {
    lhs < rhs && !same_edge(lhs, rhs)
}

/// Sum of sub-bins that are merged into a single master bin.
#[derive(Default)]
struct Merge {
    count: usize,
    left: f64,
    right: f64,
    y: f64,
    eyh: f64,
    eyl: f64,
}

impl Merge {
    fn add(&mut self, bin: &Bin, density_form: bool) -> Result<()> {
        if self.count == 0 {
            self.left = bin.left();
        } else if !same_edge(bin.left(), self.right) {
            return Err(Error::Binning(format!(
                "gap between slave bins [{}, {}] and [{}, {}]",
                self.left,
                self.right,
                bin.left(),
                bin.right()
            )));
        }

        let weight = if density_form { bin.width() } else { 1.0 };

        self.count += 1;
        self.right = bin.right();
        self.y += bin.y * weight;
        // errors are summed linearly, exactly like the values
        self.eyh += bin.eyh * weight;
        self.eyl += bin.eyl * weight;

        Ok(())
    }
}

/// Rebins `slave` so that it has exactly the bin limits of `master`. Slave bins whose center is
/// outside the range covered by `master` are dropped; slave bins with the same width as the
/// master bin they fall into are taken over unchanged, and runs of narrower slave bins are merged.
/// If `slave` is in density form, values and errors are weighted with the sub-bin widths and
/// divided by the width of the master bin, otherwise they are simply summed.
///
/// # Errors
///
/// Returns [`Error::Binning`] if a slave bin is wider than the master bin containing its center,
/// if a slave bin straddles a master bin limit (phase shift), or if a master bin is not fully
/// covered by slave bins, including gaps between them.
pub fn reconcile(master: &BinnedSeries, slave: &BinnedSeries) -> Result<BinnedSeries> {
    let (Some(m_xmin), Some(m_xmax)) = (master.left(), master.right()) else {
        return Err(Error::Binning("master series has no bins".to_owned()));
    };

    let slave_bins: Vec<_> = slave
        .bins()
        .iter()
        .filter(|bin| (bin.x >= m_xmin) && (bin.x <= m_xmax))
        .collect();

    log::debug!(
        "reconciling {} of {} slave bins onto {} master bins",
        slave_bins.len(),
        slave.len(),
        master.len()
    );

    let mut bins = Vec::with_capacity(master.len());

    for (index, m_bin) in master.bins().iter().enumerate() {
        let m_left = m_bin.left();
        let m_right = m_bin.right();
        let m_width = m_bin.width();

        let mut exact = None;
        let mut merge = Merge::default();

        for (s_index, s_bin) in slave_bins.iter().enumerate() {
            let s_left = s_bin.left();
            let s_right = s_bin.right();
            let s_width = s_bin.width();
            let inside = (s_bin.x >= m_left) && (s_bin.x <= m_right);

            if inside && definitely_less(m_width, s_width) {
                return Err(Error::Binning(format!(
                    "slave bin {s_index} [{s_left}, {s_right}] is wider than master bin {index} [{m_left}, {m_right}]"
                )));
            }

            if (definitely_less(s_left, m_left) && definitely_less(m_left, s_right))
                || (definitely_less(m_right, s_right) && definitely_less(s_left, m_right))
            {
                return Err(Error::Binning(format!(
                    "slave bin {s_index} [{s_left}, {s_right}] is phase-shifted with respect to master bin {index} [{m_left}, {m_right}]"
                )));
            }

            if !inside {
                // slave bins are ordered, nothing further can fall into this master bin
                if s_bin.x > m_right {
                    break;
                }

                continue;
            }

            if (merge.count == 0) && same_edge(s_width, m_width) {
                exact = Some(**s_bin);
                break;
            }

            merge.add(s_bin, slave.density_form())?;

            if same_edge(s_right, m_right) {
                break;
            }
        }

        if let Some(bin) = exact {
            bins.push(bin);
            continue;
        }

        if merge.count == 0 {
            return Err(Error::Binning(format!(
                "master bin {index} [{m_left}, {m_right}] does not contain any slave bin"
            )));
        }

        if !same_edge(merge.left, m_left) || !same_edge(merge.right, m_right) {
            return Err(Error::Binning(format!(
                "slave bins [{}, {}] do not cover master bin {index} [{m_left}, {m_right}]",
                merge.left, merge.right
            )));
        }

        let norm = if slave.density_form() {
            1.0 / m_width
        } else {
            1.0
        };

        log::debug!(
            "merged {} slave bins into master bin {index} [{m_left}, {m_right}]",
            merge.count
        );

        bins.push(Bin {
            y: merge.y * norm,
            eyh: merge.eyh * norm,
            eyl: merge.eyl * norm,
            ..*m_bin
        });
    }

    Ok(BinnedSeries::new(bins, slave.density_form())?.with_normalized(slave.normalized()))
}

/// Restricts `a` and `b` to the bins whose limits appear in both series. This is used to compare
/// two independent measurements where neither binning is a refinement of the other.
///
/// # Errors
///
/// Returns [`Error::Binning`] if the two series do not share a single bin.
pub fn common_bins(a: &BinnedSeries, b: &BinnedSeries) -> Result<(BinnedSeries, BinnedSeries)> {
    let (bins_a, bins_b): (Vec<_>, Vec<_>) = a
        .bins()
        .iter()
        .filter_map(|bin_a| {
            b.bins()
                .iter()
                .find(|bin_b| bin_a.same_limits(bin_b))
                .map(|bin_b| (*bin_a, *bin_b))
        })
        .unzip();

    if bins_a.is_empty() {
        return Err(Error::Binning(
            "the two series do not have any bin in common".to_owned(),
        ));
    }

    log::debug!(
        "found {} common bins between series with {} and {} bins",
        bins_a.len(),
        a.len(),
        b.len()
    );

    Ok((
        BinnedSeries::new(bins_a, a.density_form())?.with_normalized(a.normalized()),
        BinnedSeries::new(bins_b, b.density_form())?.with_normalized(b.normalized()),
    ))
}
