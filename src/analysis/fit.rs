//! Fitting approach curves to the feedback approximations.
//!
//! Both fits minimise the sum of squared residuals over a single parameter:
//! a deterministic log-spaced grid search locates the basin, then a
//! golden-section search refines the estimate between the neighbouring grid
//! points. Only points with `L ≥ 0.1` take part; closer points are dominated
//! by tip geometry the approximations do not model.

use super::feedback::{mixed_kinetics, negative_feedback};
use super::{ensure_positive, ensure_rg};
use crate::error::{FluxError, Result};
use crate::trace::{Axis, Trace};
use crate::units::conversion_factor;

/// Smallest normalized distance used for fitting
pub const MIN_FIT_DISTANCE: f64 = 0.1;

const GRID_STEPS: usize = 200;
const GOLDEN_ITERATIONS: usize = 100;

const RG_RANGE: (f64, f64) = (1.0, 1000.0);
const KAPPA_RANGE: (f64, f64) = (1e-4, 1e4);

/// Result of a one-parameter fit
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fit {
    pub value: f64,
    /// Sum of squared residuals at `value`
    pub sse: f64,
    /// Number of points that took part in the fit
    pub points: usize,
}

/// Convert a trace in physical units to normalized distance `L = d/a` and
/// normalized current `I = i/iss`.
pub fn dimensionless(trace: &Trace, radius_um: f64, iss_na: f64) -> Result<Trace> {
    let radius_um = ensure_positive("electrode radius", radius_um)?;
    let iss_na = ensure_positive("steady-state current", iss_na)?;

    let factor = |axis: &Axis, target: &str| {
        conversion_factor(axis.unit(), target).ok_or_else(|| {
            FluxError::InvalidParameter(format!(
                "{} in '{}' cannot be expressed in {}",
                axis.label(),
                axis.unit(),
                target
            ))
        })
    };
    let to_um = factor(trace.x(), "µm")?;
    let to_na = factor(trace.y(), "nA")?;

    let l = trace.x().values().iter().map(|d| d * to_um / radius_um).collect();
    let i = trace.y().values().iter().map(|c| c * to_na / iss_na).collect();

    Trace::new(Axis::new("L", "d/a", l), Axis::new("I", "i/iss", i))?
        .with_features(trace.features().to_vec())
}

/// Heterogeneous rate constant in cm/s from `kappa`, `D` in m²/s and the
/// electrode radius in µm
pub fn rate_constant(kappa: f64, diffusion_m2_s: f64, radius_um: f64) -> Result<f64> {
    let kappa = ensure_positive("kappa", kappa)?;
    let diffusion = ensure_positive("diffusion coefficient", diffusion_m2_s)?;
    let radius_um = ensure_positive("electrode radius", radius_um)?;
    Ok(1e8 * kappa * diffusion / radius_um)
}

/// Points of a dimensionless trace eligible for fitting
fn fit_points(trace: &Trace) -> Result<Vec<(f64, f64)>> {
    let points: Vec<(f64, f64)> = trace
        .points()
        .filter(|&(l, i)| l.is_finite() && i.is_finite() && l >= MIN_FIT_DISTANCE)
        .collect();
    if points.is_empty() {
        return Err(FluxError::InvalidParameter(format!(
            "no points with L ≥ {} to fit",
            MIN_FIT_DISTANCE
        )));
    }
    Ok(points)
}

fn sse(points: &[(f64, f64)], model: impl Fn(f64) -> f64) -> f64 {
    let total: f64 = points.iter().map(|&(l, i)| (model(l) - i).powi(2)).sum();
    if total.is_nan() {
        f64::INFINITY
    } else {
        total
    }
}

/// `steps` log-spaced points between `min` and `max` (inclusive)
fn log_space(min: f64, max: f64, steps: usize) -> Vec<f64> {
    let ln_min = min.ln();
    let step = (max.ln() - ln_min) / (steps as f64 - 1.0);
    (0..steps).map(|i| (ln_min + step * i as f64).exp()).collect()
}

/// Minimiser of a unimodal `f` on `[a, b]`
fn golden_section(f: impl Fn(f64) -> f64, mut a: f64, mut b: f64) -> f64 {
    let ratio = (5f64.sqrt() - 1.0) / 2.0;
    let mut c = b - ratio * (b - a);
    let mut d = a + ratio * (b - a);
    let (mut fc, mut fd) = (f(c), f(d));

    for _ in 0..GOLDEN_ITERATIONS {
        if fc < fd {
            b = d;
            d = c;
            fd = fc;
            c = b - ratio * (b - a);
            fc = f(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + ratio * (b - a);
            fd = f(d);
        }
    }
    (a + b) / 2.0
}

/// Grid search over `range` in log space, then golden-section refinement
fn minimize(objective: impl Fn(f64) -> f64, range: (f64, f64)) -> (f64, f64) {
    let grid = log_space(range.0, range.1, GRID_STEPS);
    let scores: Vec<f64> = grid.iter().map(|&v| objective(v)).collect();
    let best = scores
        .iter()
        .enumerate()
        .fold(0, |best, (i, &s)| if s < scores[best] { i } else { best });

    let lo = grid[best.saturating_sub(1)].ln();
    let hi = grid[(best + 1).min(grid.len() - 1)].ln();
    let refined = golden_section(|ln| objective(ln.exp()), lo, hi).exp();

    let refined_score = objective(refined);
    if refined_score <= scores[best] {
        (refined, refined_score)
    } else {
        (grid[best], scores[best])
    }
}

/// Fit RG (≥ 1) of an insulating approach curve.
///
/// `trace` must be dimensionless (see [`dimensionless`]).
pub fn fit_rg(trace: &Trace) -> Result<Fit> {
    let points = fit_points(trace)?;
    let (value, sse) = minimize(|rg| sse(&points, |l| negative_feedback(l, rg)), RG_RANGE);
    Ok(Fit {
        value,
        sse,
        points: points.len(),
    })
}

/// Fit the dimensionless rate constant `kappa` (> 0) for a known RG
pub fn fit_kappa(trace: &Trace, rg: f64) -> Result<Fit> {
    let rg = ensure_rg(rg)?;
    let points = fit_points(trace)?;
    let (value, sse) = minimize(
        |kappa| sse(&points, |l| mixed_kinetics(l, rg, kappa)),
        KAPPA_RANGE,
    );
    Ok(Fit {
        value,
        sse,
        points: points.len(),
    })
}
