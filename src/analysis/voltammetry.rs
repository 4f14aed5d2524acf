//! Cyclic voltammetry helpers.
//!
//! Multi-cycle recordings restart their time axis at zero for every cycle.

use std::ops::Range;

use crate::error::{FluxError, Result};
use crate::math::{argmax_by, gradient};
use crate::trace::Trace;

/// Number of cycles in a recording, counted as restarts of the time axis
pub fn count_cycles(time: &[f64]) -> usize {
    let restarts = time.iter().filter(|&&t| t == 0.0).count();
    if restarts == 0 && !time.is_empty() {
        1
    } else {
        restarts
    }
}

/// Sample ranges of the individual cycles, in order
pub fn split_cycles(time: &[f64]) -> Vec<Range<usize>> {
    let mut starts: Vec<usize> = time
        .iter()
        .enumerate()
        .filter(|&(i, &t)| i > 0 && t == 0.0)
        .map(|(i, _)| i)
        .collect();
    if time.is_empty() {
        return Vec::new();
    }
    starts.insert(0, 0);
    starts
        .iter()
        .zip(starts.iter().skip(1).chain(std::iter::once(&time.len())))
        .map(|(&start, &end)| start..end)
        .collect()
}

/// Scan rate in mV/s from the secant over the first quarter of the first cycle.
///
/// `time` in seconds, `potential` in volts.
pub fn scan_rate_mv_s(time: &[f64], potential: &[f64]) -> Result<f64> {
    let cycle = split_cycles(time).into_iter().next().unwrap_or(0..0);
    let quarter = cycle.len() / 4;
    if quarter == 0 || potential.len() < cycle.end {
        return Err(FluxError::InsufficientData {
            found: cycle.len().min(potential.len()),
            required: 4,
        });
    }

    let dt = time[quarter] - time[0];
    if dt == 0.0 {
        return Err(FluxError::InvalidParameter(
            "time does not advance over the first quarter cycle".to_string(),
        ));
    }
    Ok(1000.0 * (potential[quarter] - potential[0]) / dt)
}

/// Formal potential estimate: mean potential at the steepest rising and
/// steepest falling current of the trace (x = potential, y = current)
pub fn formal_potential(trace: &Trace) -> Result<f64> {
    let slope = gradient(trace.y().values());
    let rising = argmax_by(&slope, |v| v);
    let falling = argmax_by(&slope, |v| -v);

    match (rising, falling) {
        (Some(max), Some(min)) => {
            let potential = trace.x().values();
            Ok((potential[max] + potential[min]) / 2.0)
        }
        _ => Err(FluxError::InsufficientData {
            found: trace.len(),
            required: 2,
        }),
    }
}
