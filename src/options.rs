//! Processing options for [`crate::normalize::normalize`].
//!
//! Every field has a default, so a partial JSON document (or `{}`) is a
//! valid configuration. With all defaults the normalizer only selects the
//! independent/current pair and detects features; data values are unchanged.

use serde::{Deserialize, Serialize};
use std::path::Path;
use strum::{AsRefStr, EnumString};

use crate::error::{FluxError, Result};
use crate::units::{CurrentUnit, DistanceUnit, PotentialUnit};

/// Default relative sensitivity of contact detection
pub const DEFAULT_EDGE_THRESHOLD: f64 = 0.5;

/// How the zero of the distance axis is calibrated
#[derive(
    AsRefStr, Clone, Copy, Debug, Default, Deserialize, EnumString, PartialEq, Eq, Serialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ZeroDistance {
    /// Keep the recorded distances
    #[default]
    None,
    /// Drop leading samples without a current and shift the distances so
    /// the smallest is zero
    FirstPoint,
    /// As `FirstPoint`, then also drop everything before the steepest
    /// current change (the probe touching the substrate)
    MaxDerivative,
}

/// Options controlling trace normalization
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct ProcessingOptions {
    /// Subtract the mean of the background prefix
    pub baseline_correction: bool,
    /// Remove the linear drift fitted to the background prefix
    pub slope_correction: bool,
    /// Centered moving-average width; 0 or 1 disables smoothing
    pub smoothing_window: usize,
    /// Fraction of the largest step a step must reach to count as contact
    pub edge_threshold: f64,
    pub zero_distance: ZeroDistance,
    /// Honour vendor-declared reversed distance axes and polarographic currents
    pub apply_conventions: bool,
    pub distance_unit: Option<DistanceUnit>,
    pub current_unit: Option<CurrentUnit>,
    pub potential_unit: Option<PotentialUnit>,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            baseline_correction: false,
            slope_correction: false,
            smoothing_window: 0,
            edge_threshold: DEFAULT_EDGE_THRESHOLD,
            zero_distance: ZeroDistance::None,
            apply_conventions: false,
            distance_unit: None,
            current_unit: None,
            potential_unit: None,
        }
    }
}

impl ProcessingOptions {
    /// Parse options from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| FluxError::InvalidParameter(format!("invalid processing options: {e}")))
    }

    /// Load options from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| FluxError::io(path, e))?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ProcessingOptions::default();
        assert!(!options.baseline_correction);
        assert!(!options.slope_correction);
        assert_eq!(options.smoothing_window, 0);
        assert_eq!(options.edge_threshold, 0.5);
        assert_eq!(options.zero_distance, ZeroDistance::None);
        assert_eq!(options.distance_unit, None);
    }

    #[test]
    fn test_partial_json() {
        let options = ProcessingOptions::from_json(
            r#"{"smoothing_window": 5, "zero_distance": "max_derivative", "current_unit": "pA"}"#,
        )
        .unwrap();
        assert_eq!(options.smoothing_window, 5);
        assert_eq!(options.zero_distance, ZeroDistance::MaxDerivative);
        assert_eq!(options.current_unit, Some(CurrentUnit::Picoamps));
        assert_eq!(options.edge_threshold, DEFAULT_EDGE_THRESHOLD);

        assert_eq!(
            ProcessingOptions::from_json("{}").unwrap(),
            ProcessingOptions::default()
        );
    }

    #[test]
    fn test_invalid_json() {
        let err = ProcessingOptions::from_json(r#"{"smoothing_window": -1}"#).unwrap_err();
        assert!(matches!(err, FluxError::InvalidParameter(_)));
    }
}
