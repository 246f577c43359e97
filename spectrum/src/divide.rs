//! Division of binned series with asymmetric errors.

use super::bin::{Bin, BinnedSeries};
use super::error::{Error, Result};
use super::reconcile;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Determines how the relative errors of numerator and denominator enter the ratio.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorMode {
    /// Add the relative errors of numerator and denominator in quadrature.
    #[default]
    Full,
    /// Ignore the errors of the numerator.
    ZeroNumerator,
    /// Ignore the errors of the denominator.
    ZeroDenominator,
    /// The ratio has no errors at all; only the shapes are compared.
    ZeroAll,
}

impl FromStr for ErrorMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "full" => Ok(Self::Full),
            "zero-numerator" => Ok(Self::ZeroNumerator),
            "zero-denominator" => Ok(Self::ZeroDenominator),
            "zero-all" => Ok(Self::ZeroAll),
            _ => Err(Error::Configuration(format!(
                "unknown error mode '{s}', expected one of 'full', 'zero-numerator', 'zero-denominator', 'zero-all'"
            ))),
        }
    }
}

impl Display for ErrorMode {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Full => "full",
            Self::ZeroNumerator => "zero-numerator",
            Self::ZeroDenominator => "zero-denominator",
            Self::ZeroAll => "zero-all",
        })
    }
}

/// Selects which operand of [`ratio`] defines the binning.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Master {
    /// The denominator is rebinned to the binning of the numerator.
    #[default]
    Numerator,
    /// The numerator is rebinned to the binning of the denominator.
    Denominator,
}

impl FromStr for Master {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "numerator" => Ok(Self::Numerator),
            "denominator" => Ok(Self::Denominator),
            _ => Err(Error::Configuration(format!(
                "unknown master '{s}', expected 'numerator' or 'denominator'"
            ))),
        }
    }
}

/// Result of a division, see [`divide`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DivisionResult {
    /// The ratio with its propagated errors.
    pub series: BinnedSeries,
    /// The mode that was used to combine the errors.
    pub mode: ErrorMode,
}

fn relative(error: f64, value: f64) -> f64 {
    if value == 0.0 { 0.0 } else { error / value }
}

fn divide_bins(num: &Bin, den: &Bin, mode: ErrorMode) -> Bin {
    // a vanishing denominator is substituted, which yields a zero ratio
    let ratio = if den.y == 0.0 { den.y } else { num.y / den.y };

    let (mut num_h, mut num_l) = (relative(num.eyh, num.y), relative(num.eyl, num.y));
    let (mut den_h, mut den_l) = (relative(den.eyh, den.y), relative(den.eyl, den.y));

    match mode {
        ErrorMode::Full => {}
        ErrorMode::ZeroNumerator => {
            num_h = 0.0;
            num_l = 0.0;
        }
        ErrorMode::ZeroDenominator => {
            den_h = 0.0;
            den_l = 0.0;
        }
        ErrorMode::ZeroAll => {
            return Bin {
                y: ratio,
                eyh: 0.0,
                eyl: 0.0,
                ..*num
            };
        }
    }

    Bin {
        y: ratio,
        eyh: num_h.hypot(den_h) * ratio.abs(),
        eyl: num_l.hypot(den_l) * ratio.abs(),
        ..*num
    }
}

/// Divides `numerator` by `denominator` bin by bin. Bins are matched by their centers, which
/// must agree within a quarter of the sum of the four half-widths of both bins. The relative
/// errors are combined according to `mode`; the `x` coordinates of the result are the ones of
/// the numerator.
///
/// # Errors
///
/// Returns [`Error::SizeMismatch`] if the series have different numbers of bins and
/// [`Error::Binning`] if a numerator bin matches none or more than one denominator bin.
pub fn divide(
    numerator: &BinnedSeries,
    denominator: &BinnedSeries,
    mode: ErrorMode,
) -> Result<DivisionResult> {
    if numerator.len() != denominator.len() {
        return Err(Error::SizeMismatch {
            what: "denominator",
            expected: numerator.len(),
            found: denominator.len(),
        });
    }

    let mut bins = Vec::with_capacity(numerator.len());

    for (index, num) in numerator.bins().iter().enumerate() {
        let mut matches = denominator.bins().iter().filter(|den| {
            let tolerance = (num.exh + den.exh + num.exl + den.exl) / 4.0;
            (num.x - den.x).abs() <= tolerance
        });

        let Some(den) = matches.next() else {
            return Err(Error::Binning(format!(
                "numerator bin {index} at x = {} has no counterpart in the denominator",
                num.x
            )));
        };

        if matches.next().is_some() {
            return Err(Error::Binning(format!(
                "numerator bin {index} at x = {} matches more than one denominator bin",
                num.x
            )));
        }

        bins.push(divide_bins(num, den, mode));
    }

    log::debug!("divided {} bins using error mode '{mode}'", bins.len());

    Ok(DivisionResult {
        series: BinnedSeries::new(bins, false)?,
        mode,
    })
}

/// Divides `numerator` by `denominator` like [`divide`], but first rebins the operand that is
/// not the `master` onto the binning of the master with [`reconcile::reconcile`] if both are not
/// already binned identically.
///
/// # Errors
///
/// Returns the errors of [`reconcile::reconcile`] and [`divide`].
pub fn ratio(
    numerator: &BinnedSeries,
    denominator: &BinnedSeries,
    mode: ErrorMode,
    master: Master,
) -> Result<DivisionResult> {
    if numerator.is_cobinned(denominator) {
        return divide(numerator, denominator, mode);
    }

    log::debug!("operands are not co-binned, rebinning onto the binning of the {master:?}");

    match master {
        Master::Numerator => divide(
            numerator,
            &reconcile::reconcile(numerator, denominator)?,
            mode,
        ),
        Master::Denominator => divide(
            &reconcile::reconcile(denominator, numerator)?,
            denominator,
            mode,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    fn single(y: f64, eyh: f64, eyl: f64) -> BinnedSeries {
        BinnedSeries::new(vec![Bin::from_limits(0.0, 1.0, y, eyh, eyl)], false).unwrap()
    }

    fn series(values: &[f64]) -> BinnedSeries {
        BinnedSeries::new(
            values
                .iter()
                .enumerate()
                .map(|(i, &y)| {
                    let left = f64::from(u32::try_from(i).unwrap());
                    Bin::from_limits(left, left + 1.0, y, 0.1 * y, 0.05 * y)
                })
                .collect(),
            false,
        )
        .unwrap()
    }

    #[test]
    fn divide_full() {
        let result = divide(
            &single(10.0, 1.0, 1.0),
            &single(5.0, 0.5, 0.5),
            ErrorMode::Full,
        )
        .unwrap();
        let bin = result.series.bins()[0];

        assert_eq!(result.mode, ErrorMode::Full);
        assert_approx_eq!(f64, bin.y, 2.0, ulps = 4);
        assert_approx_eq!(f64, bin.eyh, 0.2828427124746190, ulps = 8);
        assert_approx_eq!(f64, bin.eyl, 0.2828427124746190, ulps = 8);
    }

    #[test]
    fn divide_error_modes() {
        let num = single(10.0, 1.0, 2.0);
        let den = single(5.0, 0.5, 0.5);

        let zero_num = divide(&num, &den, ErrorMode::ZeroNumerator).unwrap();
        assert_approx_eq!(f64, zero_num.series.bins()[0].eyh, 0.2, ulps = 4);
        assert_approx_eq!(f64, zero_num.series.bins()[0].eyl, 0.2, ulps = 4);

        let zero_den = divide(&num, &den, ErrorMode::ZeroDenominator).unwrap();
        assert_approx_eq!(f64, zero_den.series.bins()[0].eyh, 0.2, ulps = 4);
        assert_approx_eq!(f64, zero_den.series.bins()[0].eyl, 0.4, ulps = 4);

        let zero_all = divide(&num, &den, ErrorMode::ZeroAll).unwrap();
        assert_eq!(zero_all.series.bins()[0].eyh, 0.0);
        assert_eq!(zero_all.series.bins()[0].eyl, 0.0);
        assert_approx_eq!(f64, zero_all.series.bins()[0].y, 2.0, ulps = 4);
    }

    #[test]
    fn divide_by_zero_is_substituted() {
        let result = divide(
            &single(10.0, 1.0, 1.0),
            &single(0.0, 0.5, 0.5),
            ErrorMode::Full,
        )
        .unwrap();
        let bin = result.series.bins()[0];

        assert_eq!(bin.y, 0.0);
        assert_eq!(bin.eyh, 0.0);
        assert_eq!(bin.eyl, 0.0);
    }

    #[test]
    fn divide_round_trip() {
        let a = series(&[3.0, 7.5, 1.25, 100.0]);
        let b = series(&[1.5, 2.5, 0.5, 8.0]);

        let result = divide(&a, &b, ErrorMode::Full).unwrap();

        for ((ratio, den), num) in result
            .series
            .values()
            .iter()
            .zip(b.values())
            .zip(a.values())
        {
            assert_approx_eq!(f64, ratio * den, num, ulps = 4);
        }
    }

    #[test]
    fn divide_size_mismatch() {
        assert!(matches!(
            divide(&series(&[1.0, 2.0]), &series(&[1.0]), ErrorMode::Full),
            Err(Error::SizeMismatch {
                expected: 2,
                found: 1,
                ..
            })
        ));
    }

    #[test]
    fn divide_ambiguous_match() {
        let num = BinnedSeries::new(
            vec![
                Bin::from_limits(0.0, 10.0, 1.0, 0.0, 0.0),
                Bin::from_limits(10.0, 20.0, 1.0, 0.0, 0.0),
            ],
            false,
        )
        .unwrap();
        let den = BinnedSeries::new(
            vec![
                Bin::from_limits(4.0, 5.0, 1.0, 0.0, 0.0),
                Bin::from_limits(5.0, 6.0, 1.0, 0.0, 0.0),
            ],
            false,
        )
        .unwrap();

        assert!(matches!(
            divide(&num, &den, ErrorMode::Full),
            Err(Error::Binning(msg)) if msg.contains("more than one")
        ));
    }

    #[test]
    fn ratio_reconciles_denominator() {
        let num = BinnedSeries::new(
            vec![
                Bin::from_limits(0.0, 10.0, 2.0, 0.0, 0.0),
                Bin::from_limits(10.0, 30.0, 4.0, 0.0, 0.0),
            ],
            true,
        )
        .unwrap();
        let den = BinnedSeries::new(
            vec![
                Bin::from_limits(0.0, 5.0, 1.0, 0.0, 0.0),
                Bin::from_limits(5.0, 10.0, 1.0, 0.0, 0.0),
                Bin::from_limits(10.0, 20.0, 2.0, 0.0, 0.0),
                Bin::from_limits(20.0, 30.0, 2.0, 0.0, 0.0),
            ],
            true,
        )
        .unwrap();

        let result = ratio(&num, &den, ErrorMode::Full, Master::Numerator).unwrap();

        assert!(result.series.is_cobinned(&num));
        assert_approx_eq!(f64, result.series.values()[0], 2.0, ulps = 4);
        assert_approx_eq!(f64, result.series.values()[1], 2.0, ulps = 4);

        // the finer series can not be the master
        assert!(ratio(&num, &den, ErrorMode::Full, Master::Denominator).is_err());
    }

    #[test]
    fn error_mode_from_str() {
        assert_eq!("zero-all".parse::<ErrorMode>().unwrap(), ErrorMode::ZeroAll);
        assert_eq!(ErrorMode::ZeroNumerator.to_string(), "zero-numerator");
        assert!(matches!(
            "partial".parse::<ErrorMode>(),
            Err(Error::Configuration(_))
        ));
    }
}
