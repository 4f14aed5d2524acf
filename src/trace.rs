//! The normalized 1D trace handed to plotting and fitting consumers.

use serde::Serialize;

use crate::error::{FluxError, Result};

/// One axis of a trace: values plus the label and unit to display them with
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Axis {
    label: String,
    unit: String,
    values: Vec<f64>,
}

impl Axis {
    pub fn new(label: impl Into<String>, unit: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            unit: unit.into(),
            values,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `label (unit)`, as used for plot axes and export headers
    pub fn title(&self) -> String {
        format!("{} ({})", self.label, self.unit)
    }

    /// Same label, new unit and values
    pub fn with_values(&self, unit: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            label: self.label.clone(),
            unit: unit.into(),
            values,
        }
    }
}

/// Parallel independent (`x`) and current (`y`) sequences with detected
/// feature indices.
///
/// Both axes always have the same, non-zero length and every feature index
/// is in range.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Trace {
    x: Axis,
    y: Axis,
    features: Vec<usize>,
}

impl Trace {
    /// Build a trace without features
    pub fn new(x: Axis, y: Axis) -> Result<Self> {
        if x.len() != y.len() {
            return Err(FluxError::InvalidParameter(format!(
                "trace axes differ in length: {} x values, {} y values",
                x.len(),
                y.len()
            )));
        }
        if x.is_empty() {
            return Err(FluxError::InsufficientData {
                found: 0,
                required: 1,
            });
        }
        Ok(Self {
            x,
            y,
            features: Vec::new(),
        })
    }

    /// Attach feature indices, sorted and deduplicated
    pub fn with_features(mut self, mut features: Vec<usize>) -> Result<Self> {
        if let Some(&bad) = features.iter().find(|&&i| i >= self.len()) {
            return Err(FluxError::InvalidParameter(format!(
                "feature index {} out of range for a trace of {} samples",
                bad,
                self.len()
            )));
        }
        features.sort_unstable();
        features.dedup();
        self.features = features;
        Ok(self)
    }

    pub fn x(&self) -> &Axis {
        &self.x
    }

    pub fn y(&self) -> &Axis {
        &self.y
    }

    pub fn features(&self) -> &[usize] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// `(x, y)` pairs in order
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x.values.iter().copied().zip(self.y.values.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(values: &[f64]) -> Axis {
        Axis::new("Distance", "µm", values.to_vec())
    }

    #[test]
    fn test_rejects_mismatched_axes() {
        let err = Trace::new(axis(&[0.0, 1.0]), axis(&[1.0])).unwrap_err();
        assert!(matches!(err, FluxError::InvalidParameter(_)));
        let err = Trace::new(axis(&[]), axis(&[])).unwrap_err();
        assert!(matches!(err, FluxError::InsufficientData { .. }));
    }

    #[test]
    fn test_features_in_range() {
        let trace = Trace::new(axis(&[0.0, 1.0, 2.0]), axis(&[3.0, 2.0, 1.0])).unwrap();
        let trace = trace.with_features(vec![2, 1, 2]).unwrap();
        assert_eq!(trace.features(), &[1, 2]);
        assert!(trace.clone().with_features(vec![3]).is_err());
        assert_eq!(trace.x().title(), "Distance (µm)");
        assert_eq!(trace.points().nth(1), Some((1.0, 2.0)));
    }
}
