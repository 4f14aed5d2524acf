//! Quantitative analysis of normalized traces.
//!
//! - [`feedback`] - steady-state current and analytical SECM feedback curves
//! - [`fit`] - fitting RG and the heterogeneous rate constant to approach curves
//! - [`chrono`] - chronoamperometry helpers
//! - [`voltammetry`] - cycle splitting, scan rate and formal potential

pub mod chrono;
pub mod feedback;
pub mod fit;
pub mod voltammetry;

pub use chrono::{tail_mean, DEFAULT_TAIL_FRACTION};
pub use feedback::{
    mixed_kinetics, negative_feedback, positive_feedback, steady_state_current, FARADAY,
};
pub use fit::{dimensionless, fit_kappa, fit_rg, rate_constant, Fit};
pub use voltammetry::{count_cycles, formal_potential, scan_rate_mv_s, split_cycles};

use crate::error::{FluxError, Result};

/// Reject parameters that are not finite and strictly positive
pub(crate) fn ensure_positive(name: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(FluxError::InvalidParameter(format!(
            "{} must be positive, got {}",
            name, value
        )))
    }
}

/// Reject RG values below 1 (insulating sheath thinner than the electrode)
pub(crate) fn ensure_rg(rg: f64) -> Result<f64> {
    if rg.is_finite() && rg >= 1.0 {
        Ok(rg)
    } else {
        Err(FluxError::InvalidParameter(format!(
            "RG must be at least 1, got {}",
            rg
        )))
    }
}
