//! Uncertainty envelopes calculated from an ensemble of PDF member predictions.
//!
//! Each ensemble carries a [`Scheme`] which decides how the members are combined. The schemes
//! follow the conventions used by PDF fitting groups:
//!
//! - [`SymmetricHessian`]: members come in `±` pairs along the eigenvector directions,
//! - [`AsymmetricHessian`]: every member is an independent displacement from the central member,
//! - [`Partitioned`]: experimental eigenvector pairs, model variations added in quadrature and
//!   parametrisation variations of which only the largest deviation counts, each enabled
//!   separately by a [`PartitionConfig`],
//! - [`MonteCarlo`]: replicas whose mean and standard deviation define central value and error.

use super::bin::{Bin, BinnedSeries};
use super::convert::f64_from_usize;
use super::error::{Error, Result};
use enum_dispatch::enum_dispatch;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Factor converting an uncertainty given at 90% confidence level into one at 68.27%.
pub const CL_90_TO_1_SIGMA: f64 = 1.645;

/// Confidence level at which the members of an ensemble express their uncertainties.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorSize {
    /// The members describe one standard deviation; no rescaling happens.
    #[default]
    OneSigma,
    /// The members describe 90% confidence level; the envelope is divided by
    /// [`CL_90_TO_1_SIGMA`].
    NinetyPercent,
}

impl ErrorSize {
    /// Returns the factor the uncertainties are multiplied with.
    #[must_use]
    pub fn factor(self) -> f64 {
        match self {
            Self::OneSigma => 1.0,
            Self::NinetyPercent => 1.0 / CL_90_TO_1_SIGMA,
        }
    }
}

impl FromStr for ErrorSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "one-sigma" | "68cl" => Ok(Self::OneSigma),
            "ninety-percent" | "90cl" => Ok(Self::NinetyPercent),
            _ => Err(Error::Configuration(format!("unknown error size '{s}'"))),
        }
    }
}

/// Central value and asymmetric uncertainty of a single bin.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Uncertainty {
    /// Central value.
    pub central: f64,
    /// Uncertainty in positive direction.
    pub errplus: f64,
    /// Uncertainty in negative direction, as a positive number.
    pub errminus: f64,
}

impl Uncertainty {
    fn scaled(self, factor: f64) -> Self {
        Self {
            central: self.central,
            errplus: self.errplus * factor,
            errminus: self.errminus * factor,
        }
    }
}

/// Trait implemented by every uncertainty scheme.
#[enum_dispatch]
pub trait ErrorPropagation {
    /// Checks that an ensemble with `members` members and the central member at index `central`
    /// can be evaluated with this scheme.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the ensemble does not fit the scheme.
    fn validate(&self, members: usize, central: usize) -> Result<()>;

    /// Calculates the central value and the uncertainty from the `values` of all members in a
    /// single bin.
    fn uncertainty(&self, values: ArrayView1<f64>, central: usize) -> Uncertainty;
}

/// Square root of the sum of the squared half differences of consecutive pairs.
fn symmetric_pairs(values: impl Iterator<Item = f64>) -> f64 {
    let values: Vec<_> = values.collect();

    values
        .chunks_exact(2)
        .map(|pair| (0.5 * (pair[0] - pair[1])).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Positive and negative deviations from `central` added in quadrature separately.
fn asymmetric_quadrature(values: impl Iterator<Item = f64>, central: f64) -> (f64, f64) {
    let (plus, minus) = values.fold((0.0, 0.0), |(plus, minus), value| {
        let delta = value - central;

        if delta > 0.0 {
            (plus + delta * delta, minus)
        } else {
            (plus, minus + delta * delta)
        }
    });

    (plus.sqrt(), minus.sqrt())
}

/// Largest positive and largest negative deviation from `central`.
fn maximal_deviation(values: impl Iterator<Item = f64>, central: f64) -> (f64, f64) {
    values.fold((0.0_f64, 0.0_f64), |(plus, minus), value| {
        let delta = value - central;
        (plus.max(delta), minus.max(-delta))
    })
}

fn check_central(members: usize, central: usize, what: &str) -> Result<()> {
    if central >= members {
        return Err(Error::Configuration(format!(
            "{what} index {central} is out of range for an ensemble with {members} members"
        )));
    }

    Ok(())
}

/// Hessian set whose members are `±` displacements along each eigenvector.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SymmetricHessian;

impl ErrorPropagation for SymmetricHessian {
    fn validate(&self, members: usize, central: usize) -> Result<()> {
        check_central(members, central, "central member")?;

        if (members - 1) % 2 != 0 {
            return Err(Error::Configuration(format!(
                "symmetric Hessian set needs pairs of members besides the central one, but has {} of them",
                members - 1
            )));
        }

        Ok(())
    }

    fn uncertainty(&self, values: ArrayView1<f64>, central: usize) -> Uncertainty {
        let error = symmetric_pairs(
            values
                .iter()
                .enumerate()
                .filter(|&(index, _)| index != central)
                .map(|(_, &value)| value),
        );

        Uncertainty {
            central: values[central],
            errplus: error,
            errminus: error,
        }
    }
}

/// Hessian set in which each member is an independent displacement from the central member.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AsymmetricHessian;

impl ErrorPropagation for AsymmetricHessian {
    fn validate(&self, members: usize, central: usize) -> Result<()> {
        check_central(members, central, "central member")
    }

    fn uncertainty(&self, values: ArrayView1<f64>, central: usize) -> Uncertainty {
        let central_value = values[central];
        let (errplus, errminus) = asymmetric_quadrature(
            values
                .iter()
                .enumerate()
                .filter(|&(index, _)| index != central)
                .map(|(_, &value)| value),
            central_value,
        );

        Uncertainty {
            central: central_value,
            errplus,
            errminus,
        }
    }
}

/// Monte Carlo replica set.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MonteCarlo;

impl ErrorPropagation for MonteCarlo {
    fn validate(&self, members: usize, _: usize) -> Result<()> {
        if members < 2 {
            return Err(Error::Configuration(format!(
                "Monte Carlo set needs at least two replicas, but has {members}"
            )));
        }

        Ok(())
    }

    fn uncertainty(&self, values: ArrayView1<f64>, _: usize) -> Uncertainty {
        let n = f64_from_usize(values.len());
        let mean = values.sum() / n;
        let variance = values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let error = variance.sqrt();

        Uncertainty {
            central: mean,
            errplus: error,
            errminus: error,
        }
    }
}

/// Member ranges of a [`Partitioned`] set. Every range is inclusive and refers to member
/// indices of the ensemble; a group is enabled if its range is present.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// Eigenvector pairs, combined like a symmetric Hessian set around the central member.
    pub eigenvectors: Option<RangeInclusive<usize>>,
    /// Model variations, added in quadrature relative to `variation_central`.
    pub quadrature: Option<RangeInclusive<usize>>,
    /// Parametrisation variations, of which only the largest deviation from `variation_central`
    /// in each direction is taken.
    pub maximal: Option<RangeInclusive<usize>>,
    /// Index of the member the variation groups are compared with.
    pub variation_central: usize,
}

impl PartitionConfig {
    fn check_range(
        range: Option<&RangeInclusive<usize>>,
        members: usize,
        what: &str,
    ) -> Result<()> {
        if let Some(range) = range {
            if range.is_empty() || *range.end() >= members {
                return Err(Error::Configuration(format!(
                    "{what} members {}..={} are inconsistent with an ensemble of {members} members",
                    range.start(),
                    range.end()
                )));
            }
        }

        Ok(())
    }
}

/// Set whose members are partitioned into eigenvector pairs, a quadrature group and a
/// maximal-deviation group.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Partitioned(pub PartitionConfig);

impl ErrorPropagation for Partitioned {
    fn validate(&self, members: usize, central: usize) -> Result<()> {
        let config = &self.0;

        check_central(members, central, "central member")?;

        if config.eigenvectors.is_none() && config.quadrature.is_none() && config.maximal.is_none()
        {
            return Err(Error::Configuration(
                "partitioned set has no member group enabled".to_owned(),
            ));
        }

        PartitionConfig::check_range(config.eigenvectors.as_ref(), members, "eigenvector")?;
        PartitionConfig::check_range(config.quadrature.as_ref(), members, "quadrature")?;
        PartitionConfig::check_range(config.maximal.as_ref(), members, "maximal-deviation")?;

        if let Some(eigenvectors) = &config.eigenvectors {
            if eigenvectors.contains(&central) {
                return Err(Error::Configuration(format!(
                    "eigenvector members {}..={} contain the central member {central}",
                    eigenvectors.start(),
                    eigenvectors.end()
                )));
            }

            if eigenvectors.clone().count() % 2 != 0 {
                return Err(Error::Configuration(format!(
                    "eigenvector members {}..={} do not form pairs",
                    eigenvectors.start(),
                    eigenvectors.end()
                )));
            }
        }

        if config.quadrature.is_some() || config.maximal.is_some() {
            check_central(members, config.variation_central, "variation central member")?;
        }

        Ok(())
    }

    fn uncertainty(&self, values: ArrayView1<f64>, central: usize) -> Uncertainty {
        let config = &self.0;
        let select = |range: &RangeInclusive<usize>| {
            let range = range.clone();
            values
                .iter()
                .enumerate()
                .filter(move |(index, _)| range.contains(index))
                .map(|(_, &value)| value)
        };
        let variation_central = values[config.variation_central];

        let eig = config
            .eigenvectors
            .as_ref()
            .map_or(0.0, |range| symmetric_pairs(select(range)));
        let (quad_plus, quad_minus) = config.quadrature.as_ref().map_or((0.0, 0.0), |range| {
            asymmetric_quadrature(select(range), variation_central)
        });
        let (max_plus, max_minus) = config.maximal.as_ref().map_or((0.0, 0.0), |range| {
            maximal_deviation(select(range), variation_central)
        });

        Uncertainty {
            central: values[central],
            errplus: eig.hypot(quad_plus).hypot(max_plus),
            errminus: eig.hypot(quad_minus).hypot(max_minus),
        }
    }
}

/// The uncertainty scheme of a [`MemberEnsemble`].
#[enum_dispatch(ErrorPropagation)]
#[derive(Clone, Debug, PartialEq)]
pub enum Scheme {
    /// See [`SymmetricHessian`].
    SymmetricHessian,
    /// See [`AsymmetricHessian`].
    AsymmetricHessian,
    /// See [`Partitioned`].
    Partitioned,
    /// See [`MonteCarlo`].
    MonteCarlo,
}

impl Scheme {
    /// Selects the scheme by its `name`. Besides the descriptive names `symmetric-hessian`,
    /// `asymmetric-hessian`, `partitioned` and `monte-carlo` the error types used by LHAPDF are
    /// understood: `symmhessian`, `hessian` and `replicas`. The `partition` is required for the
    /// partitioned scheme and ignored otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `name` is unknown or the partitioned scheme is selected
    /// without a `partition`.
    pub fn from_name(name: &str, partition: Option<PartitionConfig>) -> Result<Self> {
        let scheme = match name {
            "symmetric-hessian" | "symmhessian" => Self::SymmetricHessian(SymmetricHessian),
            "asymmetric-hessian" | "hessian" => Self::AsymmetricHessian(AsymmetricHessian),
            "monte-carlo" | "replicas" => Self::MonteCarlo(MonteCarlo),
            "partitioned" => {
                return partition.map(|config| Self::Partitioned(Partitioned(config))).ok_or_else(
                    || {
                        Error::Configuration(
                            "partitioned scheme requires a partition configuration".to_owned(),
                        )
                    },
                );
            }
            _ => {
                return Err(Error::Configuration(format!(
                    "unknown uncertainty scheme '{name}'"
                )));
            }
        };

        if partition.is_some() {
            log::warn!("ignoring partition configuration for scheme '{name}'");
        }

        Ok(scheme)
    }
}

/// Predictions of all members of a PDF set sharing one binning.
#[derive(Clone, Debug)]
pub struct MemberEnsemble {
    binning: BinnedSeries,
    values: Array2<f64>,
    scheme: Scheme,
    central: usize,
}

impl MemberEnsemble {
    /// Constructor. The first member defines the binning and the flags of the ensemble, the
    /// member at index `central` is the central prediction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the ensemble is empty or does not fit `scheme`, and
    /// [`Error::Binning`] if the members are not binned identically.
    pub fn new(members: Vec<BinnedSeries>, scheme: Scheme, central: usize) -> Result<Self> {
        let Some(first) = members.first() else {
            return Err(Error::Configuration("ensemble has no members".to_owned()));
        };

        if let Some(index) = members.iter().position(|member| !member.is_cobinned(first)) {
            return Err(Error::Binning(format!(
                "member {index} is binned differently from member 0"
            )));
        }

        let mut values = Array2::zeros((members.len(), first.len()));

        for (mut row, member) in values.axis_iter_mut(Axis(0)).zip(&members) {
            for (value, bin) in row.iter_mut().zip(member.bins()) {
                *value = bin.y;
            }
        }

        Self::from_values(first.clone(), values, scheme, central)
    }

    /// Constructor taking the member predictions as a matrix with one row per member and one
    /// column per bin of `binning`. The values stored in `binning` itself are not used.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SizeMismatch`] if the number of columns differs from the number of bins
    /// and [`Error::Configuration`] if the ensemble does not fit `scheme`.
    pub fn from_values(
        binning: BinnedSeries,
        values: Array2<f64>,
        scheme: Scheme,
        central: usize,
    ) -> Result<Self> {
        if values.ncols() != binning.len() {
            return Err(Error::SizeMismatch {
                what: "member predictions",
                expected: binning.len(),
                found: values.ncols(),
            });
        }

        if values.nrows() == 0 {
            return Err(Error::Configuration("ensemble has no members".to_owned()));
        }

        scheme.validate(values.nrows(), central)?;

        Ok(Self {
            binning,
            values,
            scheme,
            central,
        })
    }

    /// Returns the number of members.
    #[must_use]
    pub fn members(&self) -> usize {
        self.values.nrows()
    }

    /// Returns the index of the central member.
    #[must_use]
    pub const fn central(&self) -> usize {
        self.central
    }

    /// Returns the uncertainty scheme.
    #[must_use]
    pub const fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    /// Returns the member predictions, one row per member.
    #[must_use]
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// Returns the binning shared by all members.
    #[must_use]
    pub const fn binning(&self) -> &BinnedSeries {
        &self.binning
    }

    /// Calculates central value and uncertainty of every bin.
    #[must_use]
    pub fn uncertainties(&self, size: ErrorSize) -> Vec<Uncertainty> {
        self.values
            .axis_iter(Axis(1))
            .map(|values| {
                self.scheme
                    .uncertainty(values, self.central)
                    .scaled(size.factor())
            })
            .collect()
    }
}

/// Turns the member predictions of `ensemble` into a single series. Values are the central
/// values of the ensemble's scheme, errors the scheme's uncertainties at the confidence level
/// given by `size`.
#[must_use]
pub fn envelope(ensemble: &MemberEnsemble, size: ErrorSize) -> BinnedSeries {
    let uncertainties = ensemble.uncertainties(size);

    for (index, unc) in uncertainties.iter().enumerate() {
        log::debug!(
            "bin {index}: central = {:e}, +{:e} -{:e}",
            unc.central,
            unc.errplus,
            unc.errminus
        );
    }

    ensemble.binning.with_bins(
        ensemble
            .binning
            .bins()
            .iter()
            .zip(uncertainties)
            .map(|(bin, unc)| Bin {
                y: unc.central,
                eyh: unc.errplus,
                eyl: unc.errminus,
                ..*bin
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use ndarray::array;

    fn binning(bins: usize) -> BinnedSeries {
        BinnedSeries::new(
            (0..bins)
                .map(|bin| {
                    let left = f64_from_usize(bin);
                    Bin::from_limits(left, left + 1.0, 0.0, 0.0, 0.0)
                })
                .collect(),
            true,
        )
        .unwrap()
    }

    fn ensemble(values: Array2<f64>, scheme: Scheme) -> MemberEnsemble {
        MemberEnsemble::from_values(binning(values.ncols()), values, scheme, 0).unwrap()
    }

    #[test]
    fn symmetric_hessian() {
        let ensemble = ensemble(
            array![[10.0, 5.0], [11.0, 5.5], [9.0, 4.0], [10.5, 5.0], [9.5, 5.25]],
            Scheme::SymmetricHessian(SymmetricHessian),
        );
        let result = envelope(&ensemble, ErrorSize::OneSigma);

        assert_eq!(result.values(), vec![10.0, 5.0]);
        assert_approx_eq!(f64, result.bins()[0].eyh, 1.25_f64.sqrt(), ulps = 4);
        assert_approx_eq!(f64, result.bins()[1].eyh, 0.578125_f64.sqrt(), ulps = 4);

        for bin in result.bins() {
            assert_eq!(bin.eyh, bin.eyl);
        }
    }

    #[test]
    fn symmetric_hessian_ninety_percent() {
        let ensemble = ensemble(
            array![[10.0], [11.645], [8.355]],
            Scheme::SymmetricHessian(SymmetricHessian),
        );
        let result = envelope(&ensemble, ErrorSize::NinetyPercent);

        assert_approx_eq!(f64, result.bins()[0].eyh, 1.0, epsilon = 1e-12);
        assert_approx_eq!(f64, result.bins()[0].eyl, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn asymmetric_hessian() {
        let ensemble = ensemble(
            array![[10.0], [11.0], [9.5], [10.2]],
            Scheme::AsymmetricHessian(AsymmetricHessian),
        );
        let result = envelope(&ensemble, ErrorSize::OneSigma);
        let bin = result.bins()[0];

        assert_eq!(bin.y, 10.0);
        assert_approx_eq!(f64, bin.eyh, (1.0_f64 + 0.2 * 0.2).sqrt(), epsilon = 1e-12);
        assert_approx_eq!(f64, bin.eyl, 0.5, ulps = 4);
    }

    #[test]
    fn partitioned() {
        let config = PartitionConfig {
            eigenvectors: Some(1..=2),
            quadrature: Some(4..=5),
            maximal: Some(6..=8),
            variation_central: 3,
        };
        // central, eigenvector pair, variation central, quadrature group, maximal group
        let ensemble = ensemble(
            array![[10.0], [11.0], [9.0], [10.1], [10.4], [9.8], [10.4], [10.2], [9.6]],
            Scheme::Partitioned(Partitioned(config)),
        );
        let result = envelope(&ensemble, ErrorSize::OneSigma);
        let bin = result.bins()[0];

        let eig: f64 = 1.0;
        let (quad_plus, quad_minus) = (0.3_f64, 0.3_f64);
        let (max_plus, max_minus) = (0.3_f64, 0.5_f64);

        assert_eq!(bin.y, 10.0);
        assert_approx_eq!(
            f64,
            bin.eyh,
            (eig * eig + quad_plus * quad_plus + max_plus * max_plus).sqrt(),
            epsilon = 1e-12
        );
        assert_approx_eq!(
            f64,
            bin.eyl,
            (eig * eig + quad_minus * quad_minus + max_minus * max_minus).sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn partitioned_groups_are_optional() {
        let config = PartitionConfig {
            eigenvectors: None,
            quadrature: None,
            maximal: Some(1..=3),
            variation_central: 0,
        };
        let ensemble = ensemble(
            array![[10.0], [10.5], [9.0], [10.7]],
            Scheme::Partitioned(Partitioned(config)),
        );
        let bin = envelope(&ensemble, ErrorSize::OneSigma).bins()[0];

        assert_approx_eq!(f64, bin.eyh, 0.7, epsilon = 1e-12);
        assert_approx_eq!(f64, bin.eyl, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn partitioned_rejects_inconsistent_bounds() {
        let values = array![[10.0], [11.0], [9.0]];
        let out_of_range = PartitionConfig {
            eigenvectors: Some(1..=4),
            ..PartitionConfig::default()
        };
        let odd = PartitionConfig {
            eigenvectors: Some(1..=1),
            ..PartitionConfig::default()
        };

        for config in [out_of_range, odd, PartitionConfig::default()] {
            assert!(matches!(
                MemberEnsemble::from_values(
                    binning(1),
                    values.clone(),
                    Scheme::Partitioned(Partitioned(config)),
                    0
                ),
                Err(Error::Configuration(_))
            ));
        }
    }

    #[test]
    fn monte_carlo() {
        let ensemble = ensemble(
            array![[1.0, 10.0], [2.0, 10.0], [3.0, 10.0], [4.0, 10.0]],
            Scheme::MonteCarlo(MonteCarlo),
        );
        let result = envelope(&ensemble, ErrorSize::OneSigma);

        assert_approx_eq!(f64, result.values()[0], 2.5, ulps = 4);
        assert_approx_eq!(f64, result.bins()[0].eyh, (5.0_f64 / 3.0).sqrt(), ulps = 4);
        assert_approx_eq!(f64, result.bins()[0].eyl, (5.0_f64 / 3.0).sqrt(), ulps = 4);
        assert_approx_eq!(f64, result.values()[1], 10.0, ulps = 4);
        assert_eq!(result.bins()[1].eyh, 0.0);
    }

    #[test]
    fn scheme_from_name() {
        assert_eq!(
            Scheme::from_name("replicas", None).unwrap(),
            Scheme::MonteCarlo(MonteCarlo)
        );
        assert_eq!(
            Scheme::from_name("symmhessian", None).unwrap(),
            Scheme::SymmetricHessian(SymmetricHessian)
        );
        assert!(matches!(
            Scheme::from_name("partitioned", None),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            Scheme::from_name("bootstrap", None),
            Err(Error::Configuration(_))
        ));
        assert_eq!(
            "90cl".parse::<ErrorSize>().unwrap(),
            ErrorSize::NinetyPercent
        );
        assert!("95cl".parse::<ErrorSize>().is_err());
    }

    #[test]
    fn ensemble_rejects_different_binnings() {
        let first = binning(2);
        let second = binning(3);

        assert!(matches!(
            MemberEnsemble::new(
                vec![first.clone(), first, second],
                Scheme::AsymmetricHessian(AsymmetricHessian),
                0
            ),
            Err(Error::Binning(_))
        ));
    }

    #[test]
    fn ensemble_rejects_bad_central_index() {
        assert!(matches!(
            MemberEnsemble::new(
                vec![binning(2), binning(2)],
                Scheme::AsymmetricHessian(AsymmetricHessian),
                2
            ),
            Err(Error::Configuration(_))
        ));
    }
}
