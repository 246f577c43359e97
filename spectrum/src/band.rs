//! Combination of uncertainty bands.

use super::bin::{Bin, BinnedSeries};
use super::error::{Error, Result};

fn check_cobinned(lhs: &BinnedSeries, rhs: &BinnedSeries, what: &'static str) -> Result<()> {
    if lhs.len() != rhs.len() {
        return Err(Error::SizeMismatch {
            what,
            expected: lhs.len(),
            found: rhs.len(),
        });
    }

    if !lhs.is_cobinned(rhs) {
        return Err(Error::Binning(format!(
            "{what} is not binned like the band it is combined with"
        )));
    }

    Ok(())
}

/// Adds the uncertainties of `b` to the ones of `a` in quadrature, separately for both
/// directions. The values of `a` are kept.
///
/// # Errors
///
/// Returns [`Error::SizeMismatch`] or [`Error::Binning`] if the two series are not co-binned.
pub fn add_in_quadrature(a: &BinnedSeries, b: &BinnedSeries) -> Result<BinnedSeries> {
    check_cobinned(a, b, "uncertainty contribution")?;

    Ok(a.with_bins(
        a.bins()
            .iter()
            .zip(b.bins())
            .map(|(lhs, rhs)| Bin {
                eyh: lhs.eyh.hypot(rhs.eyh),
                eyl: lhs.eyl.hypot(rhs.eyl),
                ..*lhs
            })
            .collect(),
    ))
}

/// Widens `band` by the deviation of `variation` from its values. An upward deviation changes
/// the upper uncertainty, a downward one the lower. With `quadrature` the deviation is added in
/// quadrature, otherwise the uncertainty becomes the larger of the deviation and the existing one.
///
/// # Errors
///
/// Returns [`Error::SizeMismatch`] or [`Error::Binning`] if the two series are not co-binned.
pub fn add_to_band(
    band: &BinnedSeries,
    variation: &BinnedSeries,
    quadrature: bool,
) -> Result<BinnedSeries> {
    check_cobinned(band, variation, "variation")?;

    let widen = |error: f64, delta: f64| {
        if quadrature {
            error.hypot(delta)
        } else {
            error.max(delta.abs())
        }
    };

    Ok(band.with_bins(
        band.bins()
            .iter()
            .zip(variation.bins())
            .map(|(bin, var)| {
                let delta = var.y - bin.y;

                if delta >= 0.0 {
                    Bin {
                        eyh: widen(bin.eyh, delta),
                        ..*bin
                    }
                } else {
                    Bin {
                        eyl: widen(bin.eyl, delta),
                        ..*bin
                    }
                }
            })
            .collect(),
    ))
}

/// Envelope of scale-varied predictions: the values of `central` with uncertainties given by the
/// largest upward and downward deviation of any of the `variations`.
///
/// # Errors
///
/// Returns [`Error::SizeMismatch`] or [`Error::Binning`] if a variation is not co-binned with
/// `central`.
pub fn scale_envelope(central: &BinnedSeries, variations: &[BinnedSeries]) -> Result<BinnedSeries> {
    let band = central.with_bins(
        central
            .bins()
            .iter()
            .map(|bin| Bin {
                eyh: 0.0,
                eyl: 0.0,
                ..*bin
            })
            .collect(),
    );

    variations
        .iter()
        .try_fold(band, |band, variation| add_to_band(&band, variation, false))
}
