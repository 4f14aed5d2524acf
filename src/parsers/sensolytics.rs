//! Sensolytics `.dat` exports.
//!
//! A block of `#`-prefixed or `Key: value` header lines, then comma separated
//! data rows (each row usually ends with a trailing comma).

use std::collections::BTreeMap;

use super::text::{self, assign, col, ColumnSpec, Delimiter, Table};
use super::types::{AxisRole, Decode, Decoded, Experiment, Input};
use crate::error::{FluxError, Result};
use crate::warning::Warning;

use AxisRole::{Current, Distance, Index, Potential, Time, X, Y};

const APPROACH: [ColumnSpec; 3] = [
    col("Distance", "µm", Some(Distance)),
    col("Index", "", Some(Index)),
    col("Current", "nA", Some(Current)),
];

const AMPEROMETRY: [ColumnSpec; 2] = [
    col("Time", "s", Some(Time)),
    col("Current", "A", Some(Current)),
];

const PULSED_AMPEROMETRY: [ColumnSpec; 3] = [
    col("Time", "s", Some(Time)),
    col("Potential", "V", Some(Potential)),
    col("Current", "A", Some(Current)),
];

const DUAL_ELECTRODE: [ColumnSpec; 3] = [
    col("Time", "s", Some(Time)),
    col("Current 1", "A", Some(Current)),
    col("Current 2", "A", None),
];

const VOLTAMMETRY: [ColumnSpec; 2] = [
    col("Potential", "V", Some(Potential)),
    col("Current", "A", Some(Current)),
];

/// Area scans carry absolute and relative positions and two channels.
/// The channel unit depends on the acquisition settings and is not exported.
const AREA_SCAN: [ColumnSpec; 8] = [
    col("X", "µm", None),
    col("X rel", "µm", Some(X)),
    col("Y", "µm", None),
    col("Y rel", "µm", Some(Y)),
    col("Z", "µm", None),
    col("Z rel", "µm", None),
    col("Ch1", "", Some(Current)),
    col("Ch2", "", None),
];

/// Sensolytics decoder
pub struct Sensolytics;

impl Sensolytics {
    fn header_entry(line: &str) -> Option<(String, String)> {
        if let Some(entry) = text::key_value(line) {
            return Some(entry);
        }
        let trimmed = line.trim_start_matches('#').trim();
        let (key, value) = trimmed.split_once('\t')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some((key.to_string(), value.trim().to_string()))
    }

    fn is_pulsed(metadata: &BTreeMap<String, String>) -> bool {
        metadata
            .iter()
            .any(|(key, value)| key.eq_ignore_ascii_case("method") && value.starts_with("Pul"))
    }

    fn layout(
        experiment: Experiment,
        width: usize,
        metadata: &BTreeMap<String, String>,
    ) -> Result<&'static [ColumnSpec]> {
        let layout: &'static [ColumnSpec] = match (experiment, width) {
            (Experiment::ApproachCurve, _) => &APPROACH,
            (Experiment::Chronoamperometry, 2) => &AMPEROMETRY,
            (Experiment::Chronoamperometry, 3) if Self::is_pulsed(metadata) => &PULSED_AMPEROMETRY,
            (Experiment::Chronoamperometry, 3) => &DUAL_ELECTRODE,
            (Experiment::Chronoamperometry, _) => {
                return Err(FluxError::malformed(format!(
                    "Sensolytics amperometry export with {} columns is not a known layout",
                    width
                )));
            }
            (Experiment::CyclicVoltammetry, _) => &VOLTAMMETRY,
            (Experiment::Image, _) => &AREA_SCAN,
        };
        Ok(layout)
    }
}

impl Decode for Sensolytics {
    fn decode(&self, input: &Input<'_>) -> Result<Decoded> {
        let contents = input.text();
        let delimiter = Delimiter::Char(',');

        let mut metadata = BTreeMap::new();
        let mut table = Table::default();

        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match text::parse_row(line, delimiter, idx + 1) {
                Some(row) => table.push(row?, idx + 1)?,
                None if table.is_empty() => match Self::header_entry(line) {
                    Some((key, value)) => {
                        metadata.insert(key, value);
                    }
                    None => table.skipped += 1,
                },
                None => table.skipped += 1,
            }
        }

        if table.is_empty() {
            return Err(FluxError::malformed("Sensolytics export contains no data rows"));
        }

        let layout = Self::layout(input.experiment, table.width(), &metadata)?;
        let columns = assign(table.into_columns(), layout, "Sensolytics export")?;

        let warnings = columns
            .iter()
            .filter(|c| c.role() == Some(Current) && c.unit() == super::types::UNSPECIFIED_UNIT)
            .map(|c| Warning::UnspecifiedUnit {
                column: c.name().to_string(),
            })
            .collect();

        Ok(Decoded {
            columns,
            metadata,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(experiment: Experiment, sample: &str) -> Result<Decoded> {
        Sensolytics.decode(&Input {
            format: crate::parsers::types::FileFormat::Dat,
            experiment,
            bytes: sample.as_bytes(),
        })
    }

    #[test]
    fn test_parse_approach() {
        let sample = "Sensolytics SECM\n\
                      Date: 2019-03-05\n\
                      Speed: 1 um/s\n\
                      0.0,0,1.50,\n\
                      1.0,1,1.45,\n\
                      2.0,2,1.20,\n";
        let decoded = decode(Experiment::ApproachCurve, sample).unwrap();
        assert_eq!(decoded.columns.len(), 3);
        assert_eq!(decoded.columns[0].unit(), "µm");
        assert_eq!(decoded.columns[2].unit(), "nA");
        assert_eq!(decoded.columns[2].samples(), &[1.50, 1.45, 1.20]);
        assert_eq!(decoded.metadata["Date"], "2019-03-05");
    }

    #[test]
    fn test_pulsed_amperometry() {
        let sample = "#Sensolytics\n#Method: Pulsed amperometry\n#Channels: 3\n\
                      0.0,0.5,1e-9,\n0.1,0.5,2e-9,\n";
        let decoded = decode(Experiment::Chronoamperometry, sample).unwrap();
        assert_eq!(decoded.columns[1].role(), Some(Potential));
        assert_eq!(decoded.columns[2].role(), Some(Current));
    }

    #[test]
    fn test_dual_electrode_amperometry() {
        let sample = "#Method: Amperometry\n0.0,1e-9,3e-9,\n0.1,2e-9,4e-9,\n";
        let decoded = decode(Experiment::Chronoamperometry, sample).unwrap();
        assert_eq!(decoded.columns[1].role(), Some(Current));
        assert_eq!(decoded.columns[2].role(), None);
    }

    #[test]
    fn test_area_scan_channel_unit_unspecified() {
        let sample = "#Scan\n\
                      100,0,200,0,50,0,1.0,0.0,\n\
                      101,1,200,0,50,0,1.1,0.0,\n";
        let decoded = decode(Experiment::Image, sample).unwrap();
        assert_eq!(decoded.columns.len(), 8);
        assert_eq!(decoded.columns[1].role(), Some(X));
        assert_eq!(decoded.columns[6].unit(), "unspecified");
        assert_eq!(
            decoded.warnings,
            vec![Warning::UnspecifiedUnit {
                column: "Ch1".to_string()
            }]
        );
    }

    #[test]
    fn test_tab_separated_header() {
        let sample = "#Scan rate\t0.1\n0.0,1e-9,\n0.1,2e-9,\n";
        let decoded = decode(Experiment::CyclicVoltammetry, sample).unwrap();
        assert_eq!(decoded.metadata["Scan rate"], "0.1");
    }
}
