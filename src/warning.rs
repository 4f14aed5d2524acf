//! Non-fatal diagnostics returned alongside successful results.

use std::fmt;

use serde::Serialize;

/// A non-fatal issue encountered while importing or normalizing
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Warning {
    /// The file declared no unit for a column, so a default was assumed
    DefaultUnit { column: String, unit: String },
    /// No unit could be determined and none was assumed
    UnspecifiedUnit { column: String },
    /// A display unit was requested but the source unit is not convertible
    UnitNotConvertible { column: String, from: String, to: String },
    /// A processing option was outside its valid range and was adjusted
    OptionAdjusted {
        option: &'static str,
        requested: String,
        used: String,
    },
    /// Samples were dropped during calibration
    SamplesDropped { count: usize, reason: &'static str },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::DefaultUnit { column, unit } => {
                write!(f, "used default unit '{}' for column '{}'", unit, column)
            }
            Warning::UnspecifiedUnit { column } => {
                write!(f, "no unit declared for column '{}'", column)
            }
            Warning::UnitNotConvertible { column, from, to } => write!(
                f,
                "cannot convert column '{}' from '{}' to '{}'; kept source unit",
                column, from, to
            ),
            Warning::OptionAdjusted {
                option,
                requested,
                used,
            } => write!(f, "{} {} is invalid; using {}", option, requested, used),
            Warning::SamplesDropped { count, reason } => {
                write!(f, "dropped {} samples ({})", count, reason)
            }
        }
    }
}

/// A successful result together with the warnings raised while producing it
#[derive(Clone, Debug, Serialize)]
pub struct Outcome<T> {
    pub value: T,
    pub warnings: Vec<Warning>,
}

impl<T> Outcome<T> {
    pub fn new(value: T, warnings: Vec<Warning>) -> Self {
        Self { value, warnings }
    }

    pub fn into_parts(self) -> (T, Vec<Warning>) {
        (self.value, self.warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_display() {
        let w = Warning::DefaultUnit {
            column: "Z".to_string(),
            unit: "µm".to_string(),
        };
        assert_eq!(w.to_string(), "used default unit 'µm' for column 'Z'");

        let w = Warning::OptionAdjusted {
            option: "smoothing_window",
            requested: "4".to_string(),
            used: "5".to_string(),
        };
        assert_eq!(w.to_string(), "smoothing_window 4 is invalid; using 5");
    }
}
