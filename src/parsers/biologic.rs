//! Bio-Logic M470 / SECMLab `.txt` exports.
//!
//! Whitespace separated columns without a unit row. Positions are written in
//! micrometers, currents in amperes.

use std::collections::BTreeMap;

use super::text::{self, assign, col, ColumnSpec, Delimiter};
use super::types::{AxisRole, Decode, Decoded, Experiment, Input};
use crate::error::Result;

use AxisRole::{Current, Distance, Potential, Time, X, Y};

const APPROACH: [ColumnSpec; 2] = [
    col("Distance", "µm", Some(Distance)),
    col("Current", "A", Some(Current)),
];

const CHRONO: [ColumnSpec; 2] = [
    col("Time", "s", Some(Time)),
    col("Current", "A", Some(Current)),
];

const VOLTAMMETRY: [ColumnSpec; 2] = [
    col("Potential", "V", Some(Potential)),
    col("Current", "A", Some(Current)),
];

const AREA_SCAN: [ColumnSpec; 3] = [
    col("X", "µm", Some(X)),
    col("Y", "µm", Some(Y)),
    col("Current", "A", Some(Current)),
];

/// Bio-Logic decoder
pub struct Biologic;

impl Biologic {
    /// Check whether a `.txt` file looks like a Bio-Logic export.
    ///
    /// Bio-Logic tables have at least one whitespace separated numeric row
    /// and never use commas between fields.
    pub fn detect(contents: &str) -> bool {
        let mut data_rows = 0;
        for (idx, line) in contents.lines().enumerate() {
            match text::parse_row(line, Delimiter::Whitespace, idx + 1) {
                Some(Ok(_)) => {
                    if line.contains(',') {
                        return false;
                    }
                    data_rows += 1;
                }
                Some(Err(_)) => return false,
                None => {}
            }
        }
        data_rows > 0
    }

    fn layout(experiment: Experiment) -> &'static [ColumnSpec] {
        match experiment {
            Experiment::ApproachCurve => &APPROACH,
            Experiment::Chronoamperometry => &CHRONO,
            Experiment::CyclicVoltammetry => &VOLTAMMETRY,
            Experiment::Image => &AREA_SCAN,
        }
    }
}

impl Decode for Biologic {
    fn decode(&self, input: &Input<'_>) -> Result<Decoded> {
        let contents = input.text();
        let table = text::read_table(&contents, Delimiter::Whitespace)?;

        let mut metadata = BTreeMap::new();
        for line in contents.lines() {
            if text::parse_row(line, Delimiter::Whitespace, 0).is_some() {
                break;
            }
            if let Some((key, value)) = text::key_value(line) {
                metadata.insert(key, value);
            }
        }

        let layout = Self::layout(input.experiment);
        Ok(Decoded {
            columns: assign(table.into_columns(), layout, "Bio-Logic export")?,
            metadata,
            warnings: Vec::new(),
        })
    }
}
