//! Trace normalization.
//!
//! Turns one or more [`RawRecord`]s into a [`Trace`]: select the
//! independent/current column pair, optionally calibrate and correct the
//! data, smooth it, detect the contact point and convert to display units.
//!
//! Every step is a pure function of its inputs. With
//! [`ProcessingOptions::default`] the returned current values equal the
//! selected column exactly.

use crate::error::{FluxError, Result};
use crate::math::{argmax_by, fit_line, gradient, mean};
use crate::options::{ProcessingOptions, ZeroDistance, DEFAULT_EDGE_THRESHOLD};
use crate::parsers::{
    AxisRole, Column, Experiment, RawRecord, CURRENT_CONVENTION, DISTANCE_ORIENTATION,
    POLAROGRAPHIC, REVERSED,
};
use crate::trace::{Axis, Trace};
use crate::units::conversion_factor;
use crate::warning::{Outcome, Warning};

/// Minimum number of samples a trace must keep
pub const MIN_SAMPLES: usize = 3;

/// Steps up to this fraction of the largest step count as background
pub const BACKGROUND_FRACTION: f64 = 0.1;

// ============================================================================
// Column selection
// ============================================================================

/// The single column of `record` with `role`
fn pick(record: &RawRecord, role: AxisRole) -> Result<&Column> {
    match record.columns_with_role(role).as_slice() {
        [only] => Ok(*only),
        [] => Err(FluxError::ColumnSelection(format!(
            "{} record has no {} column",
            record.vendor(),
            role
        ))),
        many => {
            let names: Vec<&str> = many.iter().map(|c| c.name()).collect();
            Err(FluxError::ColumnSelection(format!(
                "{} record has {} {} columns: {}",
                record.vendor(),
                many.len(),
                role,
                names.join(", ")
            )))
        }
    }
}

/// Independent and current columns of a record
pub fn select_columns(record: &RawRecord, role: AxisRole) -> Result<(&Column, &Column)> {
    Ok((pick(record, role)?, pick(record, AxisRole::Current)?))
}

/// Apply the conventions a vendor declared in the record metadata
fn apply_conventions(record: &RawRecord, role: AxisRole, x: &mut [f64], y: &mut [f64]) {
    if role == AxisRole::Distance && record.meta(DISTANCE_ORIENTATION) == Some(REVERSED) {
        let max = x
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(f64::NEG_INFINITY, f64::max);
        if max.is_finite() {
            x.iter_mut().for_each(|v| *v = max - *v);
        }
    }
    if record.meta(CURRENT_CONVENTION) == Some(POLAROGRAPHIC) {
        y.iter_mut().for_each(|v| *v = -*v);
    }
}

// ============================================================================
// Distance calibration
// ============================================================================

/// Result of [`zero_distance`]
#[derive(Clone, Debug, PartialEq)]
pub struct Calibrated {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// Leading samples dropped because no current was recorded
    pub without_current: usize,
    /// Samples dropped before the steepest current change
    pub before_contact: usize,
}

/// Calibrate the zero of an approach curve's distance axis
pub fn zero_distance(x: &[f64], y: &[f64], mode: ZeroDistance) -> Calibrated {
    if mode == ZeroDistance::None {
        return Calibrated {
            x: x.to_vec(),
            y: y.to_vec(),
            without_current: 0,
            before_contact: 0,
        };
    }

    let start = y.iter().position(|v| v.is_finite()).unwrap_or(y.len());
    let origin = x[start..]
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f64::INFINITY, f64::min);
    let origin = if origin.is_finite() { origin } else { 0.0 };

    let mut xs: Vec<f64> = x[start..].iter().map(|v| v - origin).collect();
    let mut ys: Vec<f64> = y[start..].to_vec();

    let mut before_contact = 0;
    if mode == ZeroDistance::MaxDerivative {
        before_contact = argmax_by(&gradient(&ys), f64::abs).unwrap_or(0);
        xs.drain(..before_contact);
        ys.drain(..before_contact);
    }

    Calibrated {
        x: xs,
        y: ys,
        without_current: start,
        before_contact,
    }
}

// ============================================================================
// Background correction
// ============================================================================

/// Length of the background prefix: the leading run of samples whose
/// backward difference is at most [`BACKGROUND_FRACTION`] of the largest one.
/// Always at least one sample for non-empty input.
pub fn background_len(values: &[f64]) -> usize {
    if values.len() < 2 {
        return values.len();
    }
    let steps: Vec<f64> = values.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    let max = steps
        .iter()
        .copied()
        .filter(|s| s.is_finite())
        .fold(0.0, f64::max);
    let limit = BACKGROUND_FRACTION * max;
    1 + steps.iter().take_while(|&&s| s <= limit).count()
}

/// Background level at the first sample, bounded to lie between zero and
/// `first` so the corrected first sample never moves away from zero
fn baseline_level(level: f64, first: f64) -> f64 {
    if !level.is_finite() || !first.is_finite() {
        return 0.0;
    }
    let (lo, hi) = if first < 0.0 { (first, 0.0) } else { (0.0, first) };
    level.clamp(lo, hi)
}

/// Subtract a constant and/or linear background fitted to the background
/// prefix of `y`.
///
/// The line `a + b·x` is fitted to the prefix (a flat line at the prefix mean
/// when no line can be fitted).
///
/// - baseline: the fitted level at `x₀`, bounded by `y[0]`
/// - slope: the slope term `b·(x − x₀)`
///
/// With both enabled the two terms are subtracted together, so
/// `|y'[0]| ≤ |y[0]|` holds in every mode.
pub fn correct_background(x: &[f64], y: &[f64], baseline: bool, slope: bool) -> Vec<f64> {
    if (!baseline && !slope) || y.is_empty() {
        return y.to_vec();
    }

    let n = background_len(y);
    let x0 = x[0];
    let (level, b) = match fit_line(&x[..n], &y[..n]) {
        Some((a, b)) => (a + b * x0, b),
        None => (mean(&y[..n]).unwrap_or(0.0), 0.0),
    };
    let offset = if baseline { baseline_level(level, y[0]) } else { 0.0 };
    let b = if slope { b } else { 0.0 };

    x.iter()
        .zip(y)
        .map(|(xi, yi)| yi - offset - b * (xi - x0))
        .collect()
}

// ============================================================================
// Smoothing and feature detection
// ============================================================================

/// Centered moving average of width `window`.
///
/// Near the ends the window shrinks symmetrically so it never reads out of
/// bounds. Windows of 0 or 1 return the input unchanged; the output always
/// has the input's length.
pub fn smooth(values: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 {
        return values.to_vec();
    }
    let half = window / 2;
    let n = values.len();
    (0..n)
        .map(|i| {
            let h = half.min(i).min(n - 1 - i);
            let slice = &values[i - h..=i + h];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// First index whose backward difference reaches `threshold` times the
/// largest backward difference.
///
/// With `d[i] = values[i] − values[i−1]` for `i ≥ 1`, this is the first `i`
/// with `|d[i]| > 0` and `|d[i]| ≥ threshold · max|d|`. `None` when the
/// sequence is flat.
pub fn detect_edge(values: &[f64], threshold: f64) -> Option<usize> {
    let steps: Vec<f64> = values.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    let max = steps
        .iter()
        .copied()
        .filter(|s| s.is_finite())
        .fold(0.0, f64::max);
    if max <= 0.0 {
        return None;
    }
    let limit = threshold * max;
    steps
        .iter()
        .position(|&s| s > 0.0 && s >= limit)
        .map(|i| i + 1)
}

fn effective_window(requested: usize, warnings: &mut Vec<Warning>) -> usize {
    if requested > 1 && requested % 2 == 0 {
        warnings.push(Warning::OptionAdjusted {
            option: "smoothing_window",
            requested: requested.to_string(),
            used: (requested + 1).to_string(),
        });
        return requested + 1;
    }
    requested
}

fn effective_threshold(requested: f64, warnings: &mut Vec<Warning>) -> f64 {
    let used = if requested.is_nan() {
        DEFAULT_EDGE_THRESHOLD
    } else {
        requested.clamp(0.0, 1.0)
    };
    if used != requested {
        warnings.push(Warning::OptionAdjusted {
            option: "edge_threshold",
            requested: requested.to_string(),
            used: used.to_string(),
        });
    }
    used
}

// ============================================================================
// Display units
// ============================================================================

fn display_unit(role: AxisRole, options: &ProcessingOptions) -> Option<&'static str> {
    match role {
        AxisRole::Distance | AxisRole::X | AxisRole::Y => options.distance_unit.map(|u| u.symbol()),
        AxisRole::Current => options.current_unit.map(|u| u.symbol()),
        AxisRole::Potential => options.potential_unit.map(|u| u.symbol()),
        AxisRole::Index | AxisRole::Time => None,
    }
}

/// Convert `values` from `unit` to `target`, keeping them unchanged with a
/// warning when the units are not convertible.
fn convert(
    label: &str,
    values: Vec<f64>,
    unit: &str,
    target: Option<&'static str>,
    warnings: &mut Vec<Warning>,
) -> (Vec<f64>, String) {
    let Some(target) = target else {
        return (values, unit.to_string());
    };
    match conversion_factor(unit, target) {
        Some(factor) => (values.into_iter().map(|v| v * factor).collect(), target.to_string()),
        None => {
            warnings.push(Warning::UnitNotConvertible {
                column: label.to_string(),
                from: unit.to_string(),
                to: target.to_string(),
            });
            (values, unit.to_string())
        }
    }
}

fn ensure_len(len: usize) -> Result<()> {
    if len < MIN_SAMPLES {
        return Err(FluxError::InsufficientData {
            found: len,
            required: MIN_SAMPLES,
        });
    }
    Ok(())
}

// ============================================================================
// Pipeline
// ============================================================================

/// Normalize `records` into a single trace.
///
/// Records are concatenated in order and must agree on units. Fails with
/// [`FluxError::ColumnSelection`] when a record has no unambiguous
/// independent/current pair (always for [`Experiment::Image`]), and with
/// [`FluxError::InsufficientData`] when fewer than [`MIN_SAMPLES`] remain.
pub fn normalize(
    records: &[RawRecord],
    options: &ProcessingOptions,
    experiment: Experiment,
) -> Result<Outcome<Trace>> {
    let role = experiment.independent_role().ok_or_else(|| {
        FluxError::ColumnSelection(
            "image data has two independent axes; build a CurrentMap instead".to_string(),
        )
    })?;
    if records.is_empty() {
        return Err(FluxError::ColumnSelection("no records to normalize".to_string()));
    }

    let mut warnings = Vec::new();
    let mut x = Vec::new();
    let mut y = Vec::new();
    let mut units: Option<(String, String)> = None;

    for record in records {
        let (x_column, y_column) = select_columns(record, role)?;
        match &units {
            None => units = Some((x_column.unit().to_string(), y_column.unit().to_string())),
            Some((x_unit, y_unit)) if x_unit != x_column.unit() || y_unit != y_column.unit() => {
                return Err(FluxError::ColumnSelection(format!(
                    "records disagree on units: {}/{} vs {}/{}",
                    x_unit,
                    y_unit,
                    x_column.unit(),
                    y_column.unit()
                )));
            }
            Some(_) => {}
        }

        let mut xs = x_column.samples().to_vec();
        let mut ys = y_column.samples().to_vec();
        if options.apply_conventions {
            apply_conventions(record, role, &mut xs, &mut ys);
        }
        x.extend(xs);
        y.extend(ys);
    }
    let (x_unit, y_unit) = units.unwrap_or_default();
    ensure_len(x.len())?;

    // Calibration
    let mode = match (options.zero_distance, role) {
        (ZeroDistance::None, _) | (_, AxisRole::Distance) => options.zero_distance,
        (requested, _) => {
            warnings.push(Warning::OptionAdjusted {
                option: "zero_distance",
                requested: requested.as_ref().to_string(),
                used: ZeroDistance::None.as_ref().to_string(),
            });
            ZeroDistance::None
        }
    };
    let calibrated = zero_distance(&x, &y, mode);
    if calibrated.without_current > 0 {
        warnings.push(Warning::SamplesDropped {
            count: calibrated.without_current,
            reason: "no current recorded",
        });
    }
    if calibrated.before_contact > 0 {
        warnings.push(Warning::SamplesDropped {
            count: calibrated.before_contact,
            reason: "before the steepest current change",
        });
    }
    let Calibrated { x, y, .. } = calibrated;
    ensure_len(x.len())?;

    // Correction, smoothing, detection
    let y = correct_background(&x, &y, options.baseline_correction, options.slope_correction);
    let y = smooth(&y, effective_window(options.smoothing_window, &mut warnings));
    let threshold = effective_threshold(options.edge_threshold, &mut warnings);
    let features: Vec<usize> = match experiment {
        Experiment::ApproachCurve => detect_edge(&y, threshold).into_iter().collect(),
        _ => Vec::new(),
    };

    // Display units
    let x_label = role.as_ref();
    let y_label = AxisRole::Current.as_ref();
    let (x, x_unit) = convert(x_label, x, &x_unit, display_unit(role, options), &mut warnings);
    let (y, y_unit) = convert(
        y_label,
        y,
        &y_unit,
        display_unit(AxisRole::Current, options),
        &mut warnings,
    );

    let trace = Trace::new(Axis::new(x_label, x_unit, x), Axis::new(y_label, y_unit, y))?
        .with_features(features)?;

    for warning in &warnings {
        tracing::warn!("{}", warning);
    }
    tracing::debug!(
        "Normalized {} trace: {} samples, features {:?}, {} warnings",
        experiment,
        trace.len(),
        trace.features(),
        warnings.len()
    );

    Ok(Outcome::new(trace, warnings))
}
