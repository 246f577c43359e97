//! Goodness of fit between a theory prediction and a measurement with correlated uncertainties.

use super::bin::BinnedSeries;
use super::error::{Error, Result};
use float_cmp::approx_eq;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Symmetric matrix of covariances between the bins of a series.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(into = "Vec<Vec<f64>>", try_from = "Vec<Vec<f64>>")]
pub struct CovarianceMatrix {
    matrix: DMatrix<f64>,
}

impl CovarianceMatrix {
    /// Constructor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `matrix` is not square or not symmetric.
    pub fn new(matrix: DMatrix<f64>) -> Result<Self> {
        if !matrix.is_square() {
            return Err(Error::Configuration(format!(
                "covariance matrix must be square, but has {} rows and {} columns",
                matrix.nrows(),
                matrix.ncols()
            )));
        }

        for i in 0..matrix.nrows() {
            for j in 0..i {
                let (lhs, rhs) = (matrix[(i, j)], matrix[(j, i)]);

                let epsilon = 1e-12 * lhs.abs().max(rhs.abs());

                if !approx_eq!(f64, lhs, rhs, epsilon = epsilon, ulps = 8) {
                    return Err(Error::Configuration(format!(
                        "covariance matrix is not symmetric: element ({i}, {j}) = {lhs} but ({j}, {i}) = {rhs}"
                    )));
                }
            }
        }

        Ok(Self { matrix })
    }

    /// Create a matrix without correlations from the `variances` of each bin.
    #[must_use]
    pub fn from_diagonal(variances: &[f64]) -> Self {
        Self {
            matrix: DMatrix::from_diagonal(&DVector::from_column_slice(variances)),
        }
    }

    /// Create a matrix without correlations whose diagonal holds the squared, symmetrized errors
    /// of `series`.
    #[must_use]
    pub fn from_errors(series: &BinnedSeries) -> Self {
        let variances: Vec<_> = series
            .bins()
            .iter()
            .map(|bin| (0.5 * (bin.eyh + bin.eyl)).powi(2))
            .collect();

        Self::from_diagonal(&variances)
    }

    /// Create a matrix from the uncertainties `sigmas` and the `correlation` coefficients, with
    /// elements `sigmas[i] * sigmas[j] * correlation[(i, j)]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SizeMismatch`] if the dimension of `correlation` does not match the
    /// length of `sigmas` and [`Error::Configuration`] if `correlation` is not symmetric.
    pub fn from_correlation(sigmas: &[f64], correlation: &DMatrix<f64>) -> Result<Self> {
        if correlation.nrows() != sigmas.len() || correlation.ncols() != sigmas.len() {
            return Err(Error::SizeMismatch {
                what: "correlation matrix",
                expected: sigmas.len(),
                found: correlation.nrows(),
            });
        }

        Self::new(DMatrix::from_fn(sigmas.len(), sigmas.len(), |i, j| {
            sigmas[i] * sigmas[j] * correlation[(i, j)]
        }))
    }

    /// Returns the number of bins this matrix describes.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.matrix.nrows()
    }

    /// Returns the underlying matrix.
    #[must_use]
    pub const fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Sum of two independent contributions, for instance statistical and systematic.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SizeMismatch`] if the two matrices have different dimensions.
    pub fn combine(&self, other: &Self) -> Result<Self> {
        if self.dim() != other.dim() {
            return Err(Error::SizeMismatch {
                what: "covariance matrix",
                expected: self.dim(),
                found: other.dim(),
            });
        }

        Ok(Self {
            matrix: &self.matrix + &other.matrix,
        })
    }

    /// Compares the square root of the diagonal with the symmetrized errors of `series` and
    /// returns `true` if all of them agree within the relative tolerance `reltol`. Every
    /// disagreement is reported as a warning; the matrix itself is not changed.
    #[must_use]
    pub fn check_against(&self, series: &BinnedSeries, reltol: f64) -> bool {
        if self.dim() != series.len() {
            log::warn!(
                "covariance matrix describes {} bins, but the series has {}",
                self.dim(),
                series.len()
            );
            return false;
        }

        let mut consistent = true;

        for (index, bin) in series.bins().iter().enumerate() {
            let from_matrix = self.matrix[(index, index)].sqrt();
            let from_series = 0.5 * (bin.eyh + bin.eyl);

            if !from_matrix.is_finite()
                || (from_matrix - from_series).abs() > reltol * from_series.abs()
            {
                log::warn!(
                    "bin {index}: uncertainty from covariance matrix {from_matrix:e} differs from series uncertainty {from_series:e}"
                );
                consistent = false;
            }
        }

        consistent
    }
}

impl From<CovarianceMatrix> for Vec<Vec<f64>> {
    fn from(covariance: CovarianceMatrix) -> Self {
        covariance
            .matrix
            .row_iter()
            .map(|row| row.iter().copied().collect())
            .collect()
    }
}

impl TryFrom<Vec<Vec<f64>>> for CovarianceMatrix {
    type Error = Error;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = rows.len();

        if let Some((index, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != n) {
            return Err(Error::Configuration(format!(
                "covariance matrix must be square, but row {index} has {} instead of {n} elements",
                row.len()
            )));
        }

        Self::new(DMatrix::from_row_iterator(n, n, rows.into_iter().flatten()))
    }
}

/// Calculates `(data - theory)ᵀ C⁻¹ (data - theory)`, where `C` is `data_covariance` plus a
/// diagonal matrix with the squared, symmetrized uncertainties of `theory`. Round-off can make
/// the result slightly negative for nearly identical inputs.
///
/// # Errors
///
/// Returns [`Error::SizeMismatch`] if `theory` or `data_covariance` do not have as many bins as
/// `data`, and [`Error::Numerical`] if the total covariance matrix can not be inverted.
pub fn chi_square(
    theory: &BinnedSeries,
    data: &BinnedSeries,
    data_covariance: &CovarianceMatrix,
) -> Result<f64> {
    if theory.len() != data.len() {
        return Err(Error::SizeMismatch {
            what: "theory",
            expected: data.len(),
            found: theory.len(),
        });
    }

    if data_covariance.dim() != data.len() {
        return Err(Error::SizeMismatch {
            what: "covariance matrix",
            expected: data.len(),
            found: data_covariance.dim(),
        });
    }

    let total = data_covariance.combine(&CovarianceMatrix::from_errors(theory))?;
    let inverse = total.matrix.try_inverse().ok_or_else(|| {
        Error::Numerical("total covariance matrix is singular".to_owned())
    })?;

    let residuals = DVector::from_iterator(
        data.len(),
        data.bins()
            .iter()
            .zip(theory.bins())
            .map(|(d, t)| d.y - t.y),
    );

    let chi2 = residuals.dot(&(inverse * &residuals));

    log::debug!("chi2 = {chi2:e} for {} bins", data.len());

    Ok(chi2)
}
