//! SECMx ASCII exports (`.zsc` approach curves, `.img` area scans).
//!
//! Header lines start with `|`, `[`, `p`, `F` or `R`; everything else is a
//! whitespace separated data row. `Unit=` header entries declare the
//! position and current units, and the `p` line names the data columns.
//! Binary SECMx files are not supported.

use std::collections::BTreeMap;

use super::text::{self, Delimiter, Table};
use super::types::{AxisRole, Column, Decode, Decoded, FileFormat, Input};
use crate::error::{FluxError, Result};
use crate::units::{canonical_unit, unit_scale, Quantity};
use crate::warning::Warning;

const DEFAULT_POSITION_UNIT: &str = "µm";
const DEFAULT_CURRENT_UNIT: &str = "nA";

/// SECMx decoder
pub struct Secmx;

/// Header facts needed to lay out the data columns
#[derive(Debug, Default)]
struct Header {
    position_unit: Option<&'static str>,
    current_unit: Option<&'static str>,
    /// The column header line has four fields, i.e. an ADC channel is present
    has_adc: bool,
    metadata: BTreeMap<String, String>,
}

impl Header {
    fn is_header_line(line: &str) -> bool {
        line.trim().is_empty() || line.starts_with(|c: char| matches!(c, '|' | '[' | 'p' | 'F' | 'R'))
    }

    fn read(&mut self, line: &str) {
        if line.starts_with('p') {
            self.has_adc = line.trim_end().split('\t').count() == 4;
        }

        if let Some(pos) = line.rfind("Unit=") {
            let token = line[pos + 5..].split_whitespace().next().unwrap_or_default();
            if let Some(unit) = canonical_unit(token) {
                match unit_scale(unit).map(|(quantity, _)| quantity) {
                    Some(Quantity::Length) => self.position_unit = Some(unit),
                    Some(Quantity::Current) => self.current_unit = Some(unit),
                    _ => {}
                }
            }
            return;
        }

        let entry = line.trim_start_matches(|c: char| matches!(c, '[' | 'p' | 'F' | 'R'));
        if let Some((key, value)) = text::key_value(entry) {
            self.metadata.insert(key, value);
        }
    }
}

impl Secmx {
    fn column_name(idx: usize) -> String {
        format!("Column {}", idx)
    }

    fn zsc_columns(
        samples: Vec<Vec<f64>>,
        header: &Header,
        position: &str,
        current: &str,
    ) -> Result<Vec<Column>> {
        let width = samples.len();
        let mut columns = Vec::with_capacity(width);
        for (idx, data) in samples.into_iter().enumerate() {
            let column = match (idx, width, header.has_adc) {
                (0, _, _) => Column::new("Index", "", Some(AxisRole::Index), data),
                (1, _, _) => Column::new("Z", position, Some(AxisRole::Distance), data),
                (2, 3, _) | (2, 4, false) | (3, 4, true) => {
                    Column::new("Current", current, Some(AxisRole::Current), data)
                }
                (2, 4, true) => Column::new("ADC", "", None, data),
                (3, 4, false) => Column::new("Extra", "", None, data),
                _ => {
                    return Err(FluxError::malformed(format!(
                        "SECMx .zsc export with {} columns is not a known layout",
                        width
                    )));
                }
            };
            columns.push(column);
        }
        Ok(columns)
    }

    fn img_columns(samples: Vec<Vec<f64>>, position: &str, current: &str) -> Result<Vec<Column>> {
        let width = samples.len();
        if width < 4 {
            return Err(FluxError::malformed(format!(
                "SECMx .img export needs at least 4 columns, found {}",
                width
            )));
        }
        Ok(samples
            .into_iter()
            .enumerate()
            .map(|(idx, data)| match idx {
                0 => Column::new("Index", "", Some(AxisRole::Index), data),
                1 => Column::new("X", position, Some(AxisRole::X), data),
                3 => Column::new("Y", position, Some(AxisRole::Y), data),
                i if i == width - 1 => {
                    Column::new("Current", current, Some(AxisRole::Current), data)
                }
                i => Column::new(Self::column_name(i), "", None, data),
            })
            .collect())
    }

    /// Reorder all columns so that `key` is ascending
    fn sort_by(samples: &mut [Vec<f64>], key: usize) {
        let Some(keys) = samples.get(key) else {
            return;
        };
        let mut order: Vec<usize> = (0..keys.len()).collect();
        order.sort_by(|&a, &b| keys[a].total_cmp(&keys[b]));
        for column in samples.iter_mut() {
            *column = order.iter().map(|&i| column[i]).collect();
        }
    }
}

impl Decode for Secmx {
    fn decode(&self, input: &Input<'_>) -> Result<Decoded> {
        let contents = input.text();
        let mut header = Header::default();
        let mut table = Table::default();

        for (idx, line) in contents.lines().enumerate() {
            if Header::is_header_line(line) {
                header.read(line);
                continue;
            }
            match text::parse_row(line, Delimiter::Whitespace, idx + 1) {
                Some(row) => table.push(row?, idx + 1)?,
                None => table.skipped += 1,
            }
        }

        if table.is_empty() {
            return Err(FluxError::malformed("SECMx export contains no data rows"));
        }

        let mut warnings = Vec::new();
        let position = header.position_unit.unwrap_or_else(|| {
            warnings.push(Warning::DefaultUnit {
                column: "position".to_string(),
                unit: DEFAULT_POSITION_UNIT.to_string(),
            });
            DEFAULT_POSITION_UNIT
        });
        let current = header.current_unit.unwrap_or_else(|| {
            warnings.push(Warning::DefaultUnit {
                column: "current".to_string(),
                unit: DEFAULT_CURRENT_UNIT.to_string(),
            });
            DEFAULT_CURRENT_UNIT
        });

        let mut samples = table.into_columns();
        let columns = match input.format {
            FileFormat::Zsc => {
                Self::sort_by(&mut samples, 1);
                Self::zsc_columns(samples, &header, position, current)?
            }
            FileFormat::Img => Self::img_columns(samples, position, current)?,
            other => {
                return Err(FluxError::UnsupportedFormat(format!(
                    "SECMx does not export .{} files",
                    other
                )));
            }
        };

        Ok(Decoded {
            columns,
            metadata: header.metadata,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::types::Experiment;

    fn decode(format: FileFormat, sample: &str) -> Result<Decoded> {
        Secmx.decode(&Input {
            format,
            experiment: Experiment::ApproachCurve,
            bytes: sample.as_bytes(),
        })
    }

    #[test]
    fn test_parse_zsc_with_adc() {
        let sample = "|SECMx approach\n\
                      |Axis Z Unit=µm\n\
                      |Channel I Unit=pA\n\
                      |Speed=2\n\
                      pt\tz\tadc\ti\n\
                      0 2.0 0.1 30\n\
                      1 0.0 0.1 10\n\
                      2 1.0 0.1 20\n";
        let decoded = decode(FileFormat::Zsc, sample).unwrap();

        assert_eq!(decoded.columns.len(), 4);
        assert_eq!(decoded.columns[1].unit(), "µm");
        assert_eq!(decoded.columns[1].samples(), &[0.0, 1.0, 2.0]);
        assert_eq!(decoded.columns[2].name(), "ADC");
        assert_eq!(decoded.columns[3].unit(), "pA");
        assert_eq!(decoded.columns[3].samples(), &[10.0, 20.0, 30.0]);
        assert_eq!(decoded.metadata["Speed"], "2");
        assert!(decoded.warnings.is_empty());
    }

    #[test]
    fn test_zsc_defaults_units() {
        let sample = "pt\tz\ti\n0 0.0 1.0\n1 1.0 2.0\n";
        let decoded = decode(FileFormat::Zsc, sample).unwrap();
        assert_eq!(decoded.columns[2].unit(), "nA");
        assert_eq!(decoded.columns[2].role(), Some(AxisRole::Current));
        assert_eq!(decoded.warnings.len(), 2);
    }

    #[test]
    fn test_parse_img() {
        let sample = "|Unit=nm\n|Unit=nA\n\
                      0 0 0 0 1 5\n\
                      1 10 0 0 1 6\n\
                      2 0 0 10 1 7\n\
                      3 10 0 10 1 8\n";
        let decoded = decode(FileFormat::Img, sample).unwrap();
        assert_eq!(decoded.columns[1].role(), Some(AxisRole::X));
        assert_eq!(decoded.columns[1].unit(), "nm");
        assert_eq!(decoded.columns[3].role(), Some(AxisRole::Y));
        assert_eq!(decoded.columns[5].role(), Some(AxisRole::Current));
        assert_eq!(decoded.columns[2].name(), "Column 2");
        assert_eq!(decoded.columns[5].samples(), &[5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_no_data() {
        let err = decode(FileFormat::Zsc, "|header only\n").unwrap_err();
        assert!(matches!(err, FluxError::MalformedFile(_)));
    }
}
