//! Analytical approximations for disk ultramicroelectrode approach curves.
//!
//! `L` is the probe-to-substrate distance normalized by the electrode
//! radius, `rg` the ratio of sheath to electrode radius and `kappa` the
//! dimensionless heterogeneous rate constant. Currents are normalized by the
//! bulk steady-state current.

use std::f64::consts::{FRAC_2_PI, LN_2, PI};

use super::{ensure_positive, ensure_rg};
use crate::error::Result;

/// Faraday constant in C/mol
pub const FARADAY: f64 = 96485.0;

/// RG correction factor of the bulk steady-state current
fn beta_rg(rg: f64) -> f64 {
    1.0 + 0.23 / (rg.powi(3) - 0.81).powf(0.36)
}

/// Bulk steady-state current of a disk electrode in nA.
///
/// `radius_um` in µm, `diffusion_m2_s` in m²/s, `concentration_mm` in mM
/// (mol/m³). Computes `4·F·β(RG)·D·a·C`.
pub fn steady_state_current(
    radius_um: f64,
    rg: f64,
    diffusion_m2_s: f64,
    concentration_mm: f64,
) -> Result<f64> {
    let radius_um = ensure_positive("electrode radius", radius_um)?;
    let rg = ensure_rg(rg)?;
    let diffusion = ensure_positive("diffusion coefficient", diffusion_m2_s)?;
    let concentration = ensure_positive("concentration", concentration_mm)?;

    Ok(4.0 * 1e9 * FARADAY * beta_rg(rg) * diffusion * (radius_um / 1e6) * concentration)
}

/// Normalized current over an insulating substrate
pub fn negative_feedback(l: f64, rg: f64) -> f64 {
    let slope = 2.08 / rg.powf(0.358);
    let numerator = slope * (l - 0.145 / rg) + 1.585;
    let denominator = slope * (l + 0.0023 * rg)
        + 1.57
        + rg.ln() / l
        + 2.0 / (PI * rg) * (1.0 + PI * rg / (2.0 * l)).ln();
    numerator / denominator
}

/// `(alpha, beta)` coefficients of the conductor approximation
fn conductor_coefficients(rg: f64) -> (f64, f64) {
    let s = 1.0 - FRAC_2_PI * (1.0 / rg).acos();
    let s2 = 1.0 - (FRAC_2_PI * (1.0 / rg).acos()).powi(2);
    let alpha = LN_2 + LN_2 * s - LN_2 * s2;
    let beta = 1.0 + 0.639 * s - 0.186 * s2;
    (alpha, beta)
}

fn conductor(l: f64, alpha: f64, beta: f64) -> f64 {
    alpha + (1.0 / beta) * (PI / (4.0 * l.atan())) + (1.0 - alpha - 0.5 / beta) * FRAC_2_PI * l.atan()
}

/// Normalized current over a conducting substrate (diffusion-limited regeneration)
pub fn positive_feedback(l: f64, rg: f64) -> f64 {
    let (alpha, beta) = conductor_coefficients(rg);
    conductor(l, alpha, beta)
}

/// Normalized current for finite substrate kinetics
pub fn mixed_kinetics(l: f64, rg: f64, kappa: f64) -> f64 {
    let (alpha, beta) = conductor_coefficients(rg);
    let conducting = conductor(l + 1.0 / kappa, alpha, beta);
    let insulating = negative_feedback(l, rg) - 1.0;

    let damping = (1.0 + 2.47 * l * kappa * rg.powf(0.31))
        * (1.0 + l.powf(0.006 * rg + 0.113) * kappa.powf(-0.0236 * rg + 0.91));
    conducting + insulating / damping
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steady_state_current() {
        // 10 µm radius, RG 10, D = 1e-9 m²/s, 1 mM
        let iss = steady_state_current(10.0, 10.0, 1e-9, 1.0).unwrap();
        let expected = 4.0 * 96485.0 * beta_rg(10.0) * 1e-9 * 1e-5 * 1.0 * 1e9;
        assert!((iss - expected).abs() < 1e-12);
        assert!(iss > 3.8 && iss < 4.0);

        assert!(steady_state_current(-1.0, 10.0, 1e-9, 1.0).is_err());
        assert!(steady_state_current(10.0, 0.5, 1e-9, 1.0).is_err());
    }

    #[test]
    fn test_feedback_limits() {
        // Far from the substrate both curves approach the bulk current
        assert!((negative_feedback(50.0, 10.0) - 1.0).abs() < 0.05);
        assert!((positive_feedback(50.0, 10.0) - 1.0).abs() < 0.05);

        // Close to the substrate they diverge
        assert!(negative_feedback(0.2, 10.0) < 0.5);
        assert!(positive_feedback(0.2, 10.0) > 3.0);
    }

    #[test]
    fn test_mixed_kinetics_between_limits() {
        let l = 0.5;
        let slow = mixed_kinetics(l, 10.0, 1e-4);
        let fast = mixed_kinetics(l, 10.0, 1e4);
        assert!((slow - negative_feedback(l, 10.0)).abs() < 0.05);
        assert!((fast - positive_feedback(l, 10.0)).abs() < 0.05);

        let mid = mixed_kinetics(l, 10.0, 1.0);
        assert!(mid > slow && mid < fast);
    }
}
