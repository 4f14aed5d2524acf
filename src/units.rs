//! Unit types, conversions and column-name inference.
//!
//! Vendor files spell units in many ways (`um`, `µm`, `μm`, `Distance/um`,
//! `current_nA`). Everything is mapped onto a small set of canonical symbols
//! with an SI scale factor so traces can be converted to display units.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use strum::{AsRefStr, EnumString};

use crate::parsers::AxisRole;

/// Physical quantity a unit measures
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quantity {
    Length,
    Current,
    Potential,
    Time,
}

/// Canonical symbol for a unit token, if it is a recognized unit
pub fn canonical_unit(token: &str) -> Option<&'static str> {
    let token = token.trim();
    let symbol = match token {
        "m" => "m",
        "cm" => "cm",
        "mm" => "mm",
        "um" | "µm" | "μm" => "µm",
        "nm" => "nm",
        "A" => "A",
        "mA" => "mA",
        "uA" | "µA" | "μA" => "µA",
        "nA" => "nA",
        "pA" => "pA",
        "V" => "V",
        "mV" => "mV",
        "s" => "s",
        "ms" => "ms",
        _ => match token.to_lowercase().as_str() {
            "micron" | "microns" => "µm",
            "sec" | "secs" | "seconds" => "s",
            "volt" | "volts" => "V",
            "amp" | "amps" => "A",
            _ => return None,
        },
    };
    Some(symbol)
}

/// Quantity and SI scale factor of a unit (`"nA"` → `(Current, 1e-9)`)
pub fn unit_scale(unit: &str) -> Option<(Quantity, f64)> {
    let scale = match canonical_unit(unit)? {
        "m" => (Quantity::Length, 1.0),
        "cm" => (Quantity::Length, 1e-2),
        "mm" => (Quantity::Length, 1e-3),
        "µm" => (Quantity::Length, 1e-6),
        "nm" => (Quantity::Length, 1e-9),
        "A" => (Quantity::Current, 1.0),
        "mA" => (Quantity::Current, 1e-3),
        "µA" => (Quantity::Current, 1e-6),
        "nA" => (Quantity::Current, 1e-9),
        "pA" => (Quantity::Current, 1e-12),
        "V" => (Quantity::Potential, 1.0),
        "mV" => (Quantity::Potential, 1e-3),
        "s" => (Quantity::Time, 1.0),
        "ms" => (Quantity::Time, 1e-3),
        _ => return None,
    };
    Some(scale)
}

/// Multiplicative factor converting values in `from` to `to`.
///
/// `None` when either unit is unknown or they measure different quantities.
pub fn conversion_factor(from: &str, to: &str) -> Option<f64> {
    let (from_quantity, from_scale) = unit_scale(from)?;
    let (to_quantity, to_scale) = unit_scale(to)?;
    if from_quantity != to_quantity {
        return None;
    }
    Some(from_scale / to_scale)
}

/// Distance display unit preference
#[derive(AsRefStr, Clone, Copy, Debug, Default, Deserialize, EnumString, PartialEq, Serialize)]
pub enum DistanceUnit {
    #[serde(rename = "nm")]
    #[strum(serialize = "nm")]
    Nanometers,
    #[default]
    #[serde(rename = "µm", alias = "um")]
    #[strum(serialize = "µm", serialize = "um")]
    Micrometers,
    #[serde(rename = "mm")]
    #[strum(serialize = "mm")]
    Millimeters,
}

impl DistanceUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            DistanceUnit::Nanometers => "nm",
            DistanceUnit::Micrometers => "µm",
            DistanceUnit::Millimeters => "mm",
        }
    }
}

/// Current display unit preference
#[derive(AsRefStr, Clone, Copy, Debug, Default, Deserialize, EnumString, PartialEq, Serialize)]
pub enum CurrentUnit {
    #[serde(rename = "pA")]
    #[strum(serialize = "pA")]
    Picoamps,
    #[default]
    #[serde(rename = "nA")]
    #[strum(serialize = "nA")]
    Nanoamps,
    #[serde(rename = "µA", alias = "uA")]
    #[strum(serialize = "µA", serialize = "uA")]
    Microamps,
}

impl CurrentUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            CurrentUnit::Picoamps => "pA",
            CurrentUnit::Nanoamps => "nA",
            CurrentUnit::Microamps => "µA",
        }
    }
}

/// Potential display unit preference
#[derive(AsRefStr, Clone, Copy, Debug, Default, Deserialize, EnumString, PartialEq, Serialize)]
pub enum PotentialUnit {
    #[default]
    #[serde(rename = "V")]
    #[strum(serialize = "V")]
    Volts,
    #[serde(rename = "mV")]
    #[strum(serialize = "mV")]
    Millivolts,
}

impl PotentialUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            PotentialUnit::Volts => "V",
            PotentialUnit::Millivolts => "mV",
        }
    }
}

// ============================================================================
// Column name inference
// ============================================================================

/// Role and unit guessed from a free-form column header
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ColumnGuess {
    pub role: Option<AxisRole>,
    pub unit: Option<&'static str>,
}

/// Unit suffix patterns, tried in order: `name (u)`, `name [u]`, `name/u`, `name_u`
static UNIT_SUFFIXES: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        Regex::new(r"^(?<base>.*?)\s*\((?<unit>[^)]*)\)\s*$").expect("Failed to compile regex"),
        Regex::new(r"^(?<base>.*?)\s*\[(?<unit>[^\]]*)\]\s*$").expect("Failed to compile regex"),
        Regex::new(r"^(?<base>[^/]+?)\s*/\s*(?<unit>\S+)\s*$").expect("Failed to compile regex"),
        Regex::new(r"^(?<base>.+?)[_ ](?<unit>[^_ ]+)$").expect("Failed to compile regex"),
    ]
});

/// Split a header like `Distance (µm)` or `z_um` into base name and unit
fn split_unit(name: &str) -> (&str, Option<&'static str>) {
    let name = name.trim();
    for pattern in UNIT_SUFFIXES.iter() {
        if let Some(captures) = pattern.captures(name) {
            if let Some(unit) = canonical_unit(&captures["unit"]) {
                let base = captures.name("base").map_or(name, |m| m.as_str());
                return (base, Some(unit));
            }
        }
    }
    (name, None)
}

/// Infer the axis role from a column's base name
fn infer_role(base: &str) -> Option<AxisRole> {
    let lower = base.trim().to_lowercase();

    match lower.as_str() {
        "z" | "d" | "gap" | "pos" => return Some(AxisRole::Distance),
        "t" => return Some(AxisRole::Time),
        "e" | "u" | "ewe" => return Some(AxisRole::Potential),
        "i" | "imon" | "i-mon" => return Some(AxisRole::Current),
        "x" | "xpos" | "x rel" | "xrel" => return Some(AxisRole::X),
        "y" | "ypos" | "y rel" | "yrel" => return Some(AxisRole::Y),
        "#" | "pt" | "idx" | "index" | "ptindex" | "point" => return Some(AxisRole::Index),
        _ => {}
    }

    if lower.contains("distance") || lower.contains("position") || lower.contains("height") {
        return Some(AxisRole::Distance);
    }
    if lower.contains("current") {
        return Some(AxisRole::Current);
    }
    if lower.contains("potential") || lower.contains("voltage") {
        return Some(AxisRole::Potential);
    }
    if lower.contains("time") {
        return Some(AxisRole::Time);
    }
    if lower.contains("index") {
        return Some(AxisRole::Index);
    }
    None
}

/// Guess role and unit for a column header
pub fn infer_column(name: &str) -> ColumnGuess {
    let (base, unit) = split_unit(name);

    let role = infer_role(base).or_else(|| {
        unit.and_then(unit_scale).map(|(quantity, _)| match quantity {
            Quantity::Length => AxisRole::Distance,
            Quantity::Current => AxisRole::Current,
            Quantity::Potential => AxisRole::Potential,
            Quantity::Time => AxisRole::Time,
        })
    });

    ColumnGuess { role, unit }
}
