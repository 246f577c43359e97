//! Module that contains the binned series with asymmetric errors and helpers acting on them.

use super::error::{Error, Result};
use float_cmp::approx_eq;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Relative tolerance used when comparing bin edges and bin widths.
pub(crate) const EDGE_TOLERANCE: f64 = 1e-9;

/// Returns `true` if the two bin edges (or widths) `lhs` and `rhs` are equal up to the relative
/// tolerance used for binnings.
#[must_use]
pub fn same_edge(lhs: f64, rhs: f64) -> bool {
    approx_eq!(
        f64,
        lhs,
        rhs,
        epsilon = EDGE_TOLERANCE * lhs.abs().max(rhs.abs()),
        ulps = 8
    )
}

/// A single bin with a central value and asymmetric uncertainties.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Bin {
    /// Center of the bin.
    pub x: f64,
    /// Distance between the center and the left bin limit.
    pub exl: f64,
    /// Distance between the center and the right bin limit.
    pub exh: f64,
    /// Value of the bin, either the integrated content or a density.
    pub y: f64,
    /// Uncertainty in positive direction.
    pub eyh: f64,
    /// Uncertainty in negative direction.
    pub eyl: f64,
}

impl Bin {
    /// Constructor.
    #[must_use]
    pub const fn new(x: f64, exl: f64, exh: f64, y: f64, eyh: f64, eyl: f64) -> Self {
        Self {
            x,
            exl,
            exh,
            y,
            eyh,
            eyl,
        }
    }

    /// Create a bin from its `left` and `right` limits; the center is placed in the middle.
    #[must_use]
    pub fn from_limits(left: f64, right: f64, y: f64, eyh: f64, eyl: f64) -> Self {
        let half = 0.5 * (right - left);
        Self::new(left + half, half, half, y, eyh, eyl)
    }

    /// Returns the left bin limit.
    #[must_use]
    pub fn left(&self) -> f64 {
        self.x - self.exl
    }

    /// Returns the right bin limit.
    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.exh
    }

    /// Returns the size of the bin.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.exl + self.exh
    }

    /// Returns `true` if both limits of `self` and `other` agree.
    #[must_use]
    pub fn same_limits(&self, other: &Self) -> bool {
        same_edge(self.left(), other.left()) && same_edge(self.right(), other.right())
    }

    /// Returns a copy of this bin with the value and both errors multiplied by `factor`.
    #[must_use]
    pub fn scale_y(&self, factor: f64) -> Self {
        Self {
            y: self.y * factor,
            eyh: self.eyh * factor,
            eyl: self.eyl * factor,
            ..*self
        }
    }
}

#[derive(Deserialize)]
struct RawBinnedSeries {
    bins: Vec<Bin>,
    #[serde(default)]
    density_form: bool,
    #[serde(default)]
    normalized: bool,
}

impl TryFrom<RawBinnedSeries> for BinnedSeries {
    type Error = Error;

    fn try_from(raw: RawBinnedSeries) -> Result<Self> {
        Ok(Self::new(raw.bins, raw.density_form)?.with_normalized(raw.normalized))
    }
}

/// An ordered sequence of non-overlapping bins, strictly increasing in `x`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(try_from = "RawBinnedSeries")]
pub struct BinnedSeries {
    bins: Vec<Bin>,
    density_form: bool,
    normalized: bool,
}

impl BinnedSeries {
    /// Constructor. If `density_form` is `true` the values of the bins are densities, i.e. they
    /// have been divided by the bin width.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Binning`] if a bin has a negative width, if the centers are not strictly
    /// increasing or if two neighbouring bins overlap.
    pub fn new(bins: Vec<Bin>, density_form: bool) -> Result<Self> {
        if let Some((index, bin)) = bins
            .iter()
            .enumerate()
            .find(|(_, bin)| bin.exl < 0.0 || bin.exh < 0.0)
        {
            return Err(Error::Binning(format!(
                "bin {index} at x = {} has a negative half-width",
                bin.x
            )));
        }

        for (index, (lhs, rhs)) in bins.iter().tuple_windows().enumerate() {
            if lhs.x >= rhs.x {
                return Err(Error::Binning(format!(
                    "bin centers must be strictly increasing, but bin {} has x = {} and bin {} has x = {}",
                    index,
                    lhs.x,
                    index + 1,
                    rhs.x
                )));
            }

            if lhs.right() > rhs.left() && !same_edge(lhs.right(), rhs.left()) {
                return Err(Error::Binning(format!(
                    "bin {} ending at {} overlaps with bin {} starting at {}",
                    index,
                    lhs.right(),
                    index + 1,
                    rhs.left()
                )));
            }
        }

        Ok(Self {
            bins,
            density_form,
            normalized: false,
        })
    }

    /// Returns the same series with the normalization flag set to `normalized`.
    #[must_use]
    pub const fn with_normalized(mut self, normalized: bool) -> Self {
        self.normalized = normalized;
        self
    }

    /// Returns the bins of this series.
    #[must_use]
    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }

    /// Returns the number of bins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// Returns `true` if this series has no bins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Returns `true` if the values are densities (content per unit of `x`).
    #[must_use]
    pub const fn density_form(&self) -> bool {
        self.density_form
    }

    /// Returns `true` if the series has been normalized to its total integral.
    #[must_use]
    pub const fn normalized(&self) -> bool {
        self.normalized
    }

    /// Returns the left-most bin limit, or `None` for an empty series.
    #[must_use]
    pub fn left(&self) -> Option<f64> {
        self.bins.first().map(Bin::left)
    }

    /// Returns the right-most bin limit, or `None` for an empty series.
    #[must_use]
    pub fn right(&self) -> Option<f64> {
        self.bins.last().map(Bin::right)
    }

    /// Returns the values of all bins.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.bins.iter().map(|bin| bin.y).collect()
    }

    /// Returns the size of each bin.
    #[must_use]
    pub fn widths(&self) -> Vec<f64> {
        self.bins.iter().map(Bin::width).collect()
    }

    /// Returns `true` if `self` and `other` have the same number of bins with identical limits.
    #[must_use]
    pub fn is_cobinned(&self, other: &Self) -> bool {
        (self.len() == other.len())
            && self
                .bins
                .iter()
                .zip(&other.bins)
                .all(|(lhs, rhs)| lhs.same_limits(rhs))
    }

    /// Returns the integral of the series. If the series is in density form each value is
    /// multiplied with its bin width before summing.
    #[must_use]
    pub fn total_sigma(&self) -> f64 {
        if self.density_form {
            self.bins.iter().map(|bin| bin.y * bin.width()).sum()
        } else {
            self.bins.iter().map(|bin| bin.y).sum()
        }
    }

    /// Returns the largest relative uncertainty of all bins, considering both directions. Bins
    /// with a vanishing value are skipped.
    #[must_use]
    pub fn largest_relative_error(&self) -> f64 {
        self.bins
            .iter()
            .filter(|bin| bin.y != 0.0)
            .map(|bin| bin.eyh.abs().max(bin.eyl.abs()) / bin.y.abs())
            .fold(0.0, f64::max)
    }

    /// Scale the `x` coordinates (including the half-widths) with `x_scale` and the values
    /// (including the errors) with `y_scale`.
    #[must_use]
    pub fn scale(&self, x_scale: f64, y_scale: f64) -> Self {
        Self {
            bins: self
                .bins
                .iter()
                .map(|bin| Bin {
                    x: bin.x * x_scale,
                    exl: bin.exl * x_scale,
                    exh: bin.exh * x_scale,
                    ..bin.scale_y(y_scale)
                })
                .collect(),
            ..self.clone()
        }
    }

    /// Divide every value and its errors by the respective bin width, turning integrated contents
    /// into densities. A series that already is in density form is returned unchanged.
    #[must_use]
    pub fn divide_by_bin_width(&self) -> Self {
        if self.density_form {
            return self.clone();
        }

        Self {
            bins: self
                .bins
                .iter()
                .map(|bin| bin.scale_y(1.0 / bin.width()))
                .collect(),
            density_form: true,
            normalized: self.normalized,
        }
    }

    /// Divide the series by its total integral, see [`BinnedSeries::total_sigma`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Numerical`] if the integral vanishes.
    pub fn normalize_to_total_sigma(&self) -> Result<Self> {
        let total = self.total_sigma();

        if total == 0.0 {
            return Err(Error::Numerical(
                "can not normalize a series whose total sigma is zero".to_owned(),
            ));
        }

        log::debug!("normalizing series with total sigma {total:e}");

        Ok(Self {
            normalized: true,
            ..self.scale(1.0, 1.0 / total)
        })
    }

    /// Bring this series into the convention given by `density_form` and `normalized`, which is
    /// usually the one of the measurement it is compared with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the conversion would require turning densities back
    /// into integrated contents, and [`Error::Numerical`] if normalization fails.
    pub fn to_convention(&self, density_form: bool, normalized: bool) -> Result<Self> {
        if self.density_form && !density_form {
            return Err(Error::Configuration(
                "series is divided by the bin width but the target convention is not".to_owned(),
            ));
        }

        let mut result = if density_form {
            self.divide_by_bin_width()
        } else {
            self.clone()
        };

        if normalized && !result.normalized {
            result = result.normalize_to_total_sigma()?;
        }

        Ok(result)
    }

    /// Returns a new series with the same binning and flags as `self` but with the bins replaced
    /// by `bins`. The caller guarantees that the bins keep the limits.
    pub(crate) fn with_bins(&self, bins: Vec<Bin>) -> Self {
        debug_assert_eq!(bins.len(), self.bins.len());

        Self {
            bins,
            density_form: self.density_form,
            normalized: self.normalized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    fn series(limits: &[f64], values: &[f64], density_form: bool) -> BinnedSeries {
        BinnedSeries::new(
            limits
                .iter()
                .tuple_windows()
                .zip(values)
                .map(|((&left, &right), &y)| Bin::from_limits(left, right, y, 0.1 * y, 0.2 * y))
                .collect(),
            density_form,
        )
        .unwrap()
    }

    #[test]
    fn bin_limits() {
        let bin = Bin::from_limits(10.0, 30.0, 1.0, 0.0, 0.0);

        assert_eq!(bin.x, 20.0);
        assert_eq!(bin.left(), 10.0);
        assert_eq!(bin.right(), 30.0);
        assert_eq!(bin.width(), 20.0);
    }

    #[test]
    fn new_rejects_unordered_bins() {
        let result = BinnedSeries::new(
            vec![
                Bin::from_limits(10.0, 20.0, 1.0, 0.0, 0.0),
                Bin::from_limits(0.0, 10.0, 1.0, 0.0, 0.0),
            ],
            false,
        );

        assert!(matches!(result, Err(Error::Binning(_))));
    }

    #[test]
    fn new_rejects_overlapping_bins() {
        let result = BinnedSeries::new(
            vec![
                Bin::from_limits(0.0, 12.0, 1.0, 0.0, 0.0),
                Bin::from_limits(10.0, 20.0, 1.0, 0.0, 0.0),
            ],
            false,
        );

        assert!(matches!(result, Err(Error::Binning(_))));
    }

    #[test]
    fn new_accepts_gaps() {
        let series = BinnedSeries::new(
            vec![
                Bin::from_limits(0.0, 10.0, 1.0, 0.0, 0.0),
                Bin::from_limits(20.0, 30.0, 1.0, 0.0, 0.0),
            ],
            false,
        )
        .unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series.left(), Some(0.0));
        assert_eq!(series.right(), Some(30.0));
    }

    #[test]
    fn total_sigma() {
        let density = series(&[0.0, 10.0, 30.0], &[1.0, 2.0], true);
        let integrated = series(&[0.0, 10.0, 30.0], &[10.0, 40.0], false);

        assert_approx_eq!(f64, density.total_sigma(), 50.0, ulps = 4);
        assert_approx_eq!(f64, integrated.total_sigma(), 50.0, ulps = 4);
    }

    #[test]
    fn divide_by_bin_width() {
        let integrated = series(&[0.0, 10.0, 30.0], &[10.0, 40.0], false);
        let density = integrated.divide_by_bin_width();

        assert!(density.density_form());
        assert_eq!(density.values(), vec![1.0, 2.0]);
        assert_approx_eq!(f64, density.bins()[1].eyh, 0.2, ulps = 4);
        assert_approx_eq!(f64, density.bins()[1].eyl, 0.4, ulps = 4);

        // a second division does nothing
        assert_eq!(density.divide_by_bin_width(), density);
    }

    #[test]
    fn normalize_to_total_sigma() {
        let density = series(&[0.0, 10.0, 30.0], &[1.0, 2.0], true);
        let normalized = density.normalize_to_total_sigma().unwrap();

        assert!(normalized.normalized());
        assert_approx_eq!(f64, normalized.total_sigma(), 1.0, ulps = 4);

        let zero = series(&[0.0, 1.0], &[0.0], false);

        assert!(matches!(
            zero.normalize_to_total_sigma(),
            Err(Error::Numerical(_))
        ));
    }

    #[test]
    fn to_convention() {
        let integrated = series(&[0.0, 10.0, 30.0], &[10.0, 40.0], false);
        let converted = integrated.to_convention(true, true).unwrap();

        assert!(converted.density_form());
        assert!(converted.normalized());
        assert_approx_eq!(f64, converted.values()[0], 0.02, ulps = 4);
        assert_approx_eq!(f64, converted.values()[1], 0.04, ulps = 4);

        let density = series(&[0.0, 10.0], &[1.0], true);

        assert!(matches!(
            density.to_convention(false, false),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn scale() {
        let scaled = series(&[0.0, 10.0], &[2.0], false).scale(1000.0, 0.5);

        assert_eq!(scaled.left(), Some(0.0));
        assert_eq!(scaled.right(), Some(10000.0));
        assert_eq!(scaled.values(), vec![1.0]);
    }

    #[test]
    fn largest_relative_error() {
        let series = series(&[0.0, 1.0, 2.0], &[1.0, 0.0], false);

        assert_approx_eq!(f64, series.largest_relative_error(), 0.2, ulps = 4);
    }

    #[test]
    fn is_cobinned() {
        let lhs = series(&[0.0, 10.0, 30.0], &[1.0, 2.0], true);
        let rhs = series(&[0.0, 10.0, 30.0], &[3.0, 4.0], false);
        let other = series(&[0.0, 5.0, 30.0], &[3.0, 4.0], false);

        assert!(lhs.is_cobinned(&rhs));
        assert!(!lhs.is_cobinned(&other));
    }
}
