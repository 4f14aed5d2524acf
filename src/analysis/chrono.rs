//! Chronoamperometry helpers.

use super::ensure_positive;
use crate::error::{FluxError, Result};
use crate::math::mean;

/// Fraction of a transient averaged for the experimental steady-state current
pub const DEFAULT_TAIL_FRACTION: f64 = 0.05;

/// Mean of the last `fraction` of `values` (at least one sample).
///
/// Used as the experimental steady-state current of a transient.
pub fn tail_mean(values: &[f64], fraction: f64) -> Result<f64> {
    let fraction = ensure_positive("tail fraction", fraction)?;
    if fraction > 1.0 {
        return Err(FluxError::InvalidParameter(format!(
            "tail fraction must be at most 1, got {}",
            fraction
        )));
    }
    let count = ((values.len() as f64 * fraction).ceil() as usize).max(1);
    let start = values.len().saturating_sub(count);
    mean(&values[start..]).ok_or(FluxError::InsufficientData {
        found: 0,
        required: 1,
    })
}
