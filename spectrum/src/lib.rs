//! `Spectrum` compares binned theory predictions with measurements.
//!
//! The crate contains the numerical core: reconciling two binnings with each other
//! ([`reconcile`]), dividing series with asymmetric errors ([`divide`]), turning an ensemble of
//! PDF member predictions into an uncertainty envelope ([`pdf_uncertainty`]) and calculating a
//! covariance-weighted χ² ([`chi2`]). Uncertainty bands are combined with the functions in
//! [`band`]. All operations are pure functions of their inputs;
//! diagnostics are emitted through the [`log`] facade and never change results.

mod convert;

pub mod band;
pub mod bin;
pub mod chi2;
pub mod divide;
pub mod error;
pub mod pdf_uncertainty;
pub mod reconcile;
