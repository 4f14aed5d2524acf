//! Princeton Applied Research (VersaSCAN) `.csv` exports.
//!
//! Line scans and approach curves: a short preamble of `Key,value` rows, a
//! row of column names, then numeric rows. Positions are in millimeters and
//! currents in microamperes unless the header says otherwise. The probe
//! position is recorded, so the distance axis runs opposite to the gap.
//!
//! Area scans: after the preamble, one row of X positions, then one row per
//! line holding the currents at each X followed by that line's Y position.

use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::BTreeMap;

use super::types::{
    AxisRole, Column, Decode, Decoded, Experiment, Input, DISTANCE_ORIENTATION, REVERSED,
};
use crate::error::{FluxError, Result};
use crate::units::infer_column;
use crate::warning::Warning;

/// Princeton Applied Research decoder
pub struct Par;

/// Parse every field of a record as a number, `None` if any field is not one
fn numeric(record: &StringRecord) -> Option<Vec<f64>> {
    let values: Option<Vec<f64>> = record
        .iter()
        .filter(|field| !field.is_empty())
        .map(|field| field.parse::<f64>().ok())
        .collect();
    values.filter(|v| !v.is_empty())
}

fn default_unit(role: Option<AxisRole>) -> Option<&'static str> {
    match role? {
        AxisRole::Distance | AxisRole::X | AxisRole::Y => Some("mm"),
        AxisRole::Current => Some("µA"),
        AxisRole::Time => Some("s"),
        AxisRole::Potential => Some("V"),
        AxisRole::Index => None,
    }
}

impl Par {
    fn records(input: &Input<'_>) -> Result<Vec<StringRecord>> {
        let contents = input.text();
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(contents.as_bytes());

        reader
            .records()
            .map(|r| r.map_err(|e| FluxError::malformed(format!("CSV parse error: {e}"))))
            .filter(|r| r.as_ref().map_or(true, |rec| rec.iter().any(|f| !f.is_empty())))
            .collect()
    }

    fn preamble(records: &[StringRecord]) -> BTreeMap<String, String> {
        records
            .iter()
            .filter_map(|record| {
                let key = record.get(0)?.trim_end_matches(':').trim();
                if key.is_empty() {
                    return None;
                }
                let value: Vec<&str> = record.iter().skip(1).filter(|f| !f.is_empty()).collect();
                Some((key.to_string(), value.join(",")))
            })
            .collect()
    }

    fn decode_scan(records: Vec<StringRecord>) -> Result<Decoded> {
        // Header: the first non-numeric row that is directly followed by a numeric row
        let header_idx = records
            .windows(2)
            .position(|pair| numeric(&pair[0]).is_none() && numeric(&pair[1]).is_some())
            .ok_or_else(|| FluxError::malformed("PAR export has no column header row"))?;

        let header: Vec<String> = records[header_idx]
            .iter()
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();
        let mut metadata = Self::preamble(&records[..header_idx]);

        let mut samples: Vec<Vec<f64>> = vec![Vec::new(); header.len()];
        for (offset, record) in records[header_idx + 1..].iter().enumerate() {
            let row = numeric(record).ok_or_else(|| {
                FluxError::malformed(format!(
                    "row {}: non-numeric field in data section",
                    header_idx + offset + 2
                ))
            })?;
            if row.len() != header.len() {
                return Err(FluxError::malformed(format!(
                    "row {}: {} fields but the header names {}",
                    header_idx + offset + 2,
                    row.len(),
                    header.len()
                )));
            }
            for (column, value) in samples.iter_mut().zip(row) {
                column.push(value);
            }
        }

        let mut warnings = Vec::new();
        let mut columns: Vec<Column> = Vec::with_capacity(header.len());
        for (name, data) in header.into_iter().zip(samples) {
            let guess = infer_column(&name);
            let unit = match (guess.unit, default_unit(guess.role)) {
                (Some(unit), _) => unit,
                (None, Some(unit)) => {
                    warnings.push(Warning::DefaultUnit {
                        column: name.clone(),
                        unit: unit.to_string(),
                    });
                    unit
                }
                (None, None) => "",
            };
            columns.push(Column::new(name, unit, guess.role, data));
        }

        if columns.iter().any(|c| c.role() == Some(AxisRole::Distance)) {
            metadata.insert(DISTANCE_ORIENTATION.to_string(), REVERSED.to_string());
        }

        Ok(Decoded {
            columns,
            metadata,
            warnings,
        })
    }

    fn decode_area(records: Vec<StringRecord>) -> Result<Decoded> {
        let positions_idx = records
            .iter()
            .position(|r| numeric(r).is_some())
            .ok_or_else(|| FluxError::malformed("PAR area scan has no X position row"))?;
        let positions = numeric(&records[positions_idx]).unwrap_or_default();
        let metadata = Self::preamble(&records[..positions_idx]);

        let mut x = Vec::new();
        let mut y = Vec::new();
        let mut current = Vec::new();
        for (offset, record) in records[positions_idx + 1..].iter().enumerate() {
            let row_no = positions_idx + offset + 2;
            let row = numeric(record).ok_or_else(|| {
                FluxError::malformed(format!("row {}: non-numeric field in area scan", row_no))
            })?;
            if row.len() != positions.len() + 1 {
                return Err(FluxError::malformed(format!(
                    "row {}: expected {} currents and a Y position, found {} fields",
                    row_no,
                    positions.len(),
                    row.len()
                )));
            }
            let (currents, line_y) = row.split_at(positions.len());
            x.extend_from_slice(&positions);
            y.extend(std::iter::repeat(line_y[0]).take(positions.len()));
            current.extend_from_slice(currents);
        }

        if current.is_empty() {
            return Err(FluxError::malformed("PAR area scan contains no lines"));
        }

        let warnings = ["X", "Y", "Current"]
            .iter()
            .zip(["mm", "mm", "µA"])
            .map(|(column, unit)| Warning::DefaultUnit {
                column: column.to_string(),
                unit: unit.to_string(),
            })
            .collect();

        Ok(Decoded {
            columns: vec![
                Column::new("X", "mm", Some(AxisRole::X), x),
                Column::new("Y", "mm", Some(AxisRole::Y), y),
                Column::new("Current", "µA", Some(AxisRole::Current), current),
            ],
            metadata,
            warnings,
        })
    }
}

impl Decode for Par {
    fn decode(&self, input: &Input<'_>) -> Result<Decoded> {
        let records = Self::records(input)?;
        match input.experiment {
            Experiment::Image => Self::decode_area(records),
            _ => Self::decode_scan(records),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::types::FileFormat;

    fn decode(experiment: Experiment, sample: &str) -> Result<Decoded> {
        Par.decode(&Input {
            format: FileFormat::Csv,
            experiment,
            bytes: sample.as_bytes(),
        })
    }

    #[test]
    fn test_parse_line_scan() {
        let sample = "Experiment,Approach\n\
                      Probe,10 um Pt\n\
                      \n\
                      Point,Position (mm),Current\n\
                      0,0.000,1.00\n\
                      1,0.001,0.95\n\
                      2,0.002,0.90\n";
        let decoded = decode(Experiment::ApproachCurve, sample).unwrap();

        assert_eq!(decoded.columns.len(), 3);
        assert_eq!(decoded.columns[0].role(), Some(AxisRole::Index));
        assert_eq!(decoded.columns[1].role(), Some(AxisRole::Distance));
        assert_eq!(decoded.columns[1].unit(), "mm");
        assert_eq!(decoded.columns[2].unit(), "µA");
        assert_eq!(decoded.columns[2].samples(), &[1.00, 0.95, 0.90]);
        assert_eq!(
            decoded.warnings,
            vec![Warning::DefaultUnit {
                column: "Current".to_string(),
                unit: "µA".to_string()
            }]
        );
        assert_eq!(decoded.metadata["Probe"], "10 um Pt");
        assert_eq!(decoded.metadata[DISTANCE_ORIENTATION], REVERSED);
    }

    #[test]
    fn test_missing_header() {
        let err = decode(Experiment::ApproachCurve, "0,1\n1,2\n").unwrap_err();
        assert!(matches!(err, FluxError::MalformedFile(_)));
    }

    #[test]
    fn test_ragged_row() {
        let sample = "z_um,current_nA\n0,1\n1,2,3\n";
        let err = decode(Experiment::ApproachCurve, sample).unwrap_err();
        assert!(matches!(err, FluxError::MalformedFile(_)));
    }

    #[test]
    fn test_parse_area_scan() {
        let sample = "Experiment,Area Scan\n\
                      0.0,0.1,0.2,\n\
                      1.0,1.1,1.2,0.0\n\
                      2.0,2.1,2.2,0.1\n";
        let decoded = decode(Experiment::Image, sample).unwrap();
        assert_eq!(decoded.columns[0].samples(), &[0.0, 0.1, 0.2, 0.0, 0.1, 0.2]);
        assert_eq!(decoded.columns[1].samples(), &[0.0, 0.0, 0.0, 0.1, 0.1, 0.1]);
        assert_eq!(decoded.columns[2].samples(), &[1.0, 1.1, 1.2, 2.0, 2.1, 2.2]);
        assert_eq!(decoded.warnings.len(), 3);
    }
}
