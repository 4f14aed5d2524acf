//! CH Instruments `.txt` exports (CHI 900 series SECM).
//!
//! Format: free-form instrument header (`Key: value` / `Key = value`),
//! then a comma separated column header of `Name/unit` fields, then
//! comma separated data rows.
//!
//! CHI reports currents in the polarographic convention and records the
//! probe position rather than the probe-to-substrate gap; both are declared
//! in the record metadata.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use super::text::{self, Delimiter, Table};
use super::types::{
    AxisRole, Column, Decode, Decoded, Input, CURRENT_CONVENTION, DISTANCE_ORIENTATION,
    POLAROGRAPHIC, REVERSED,
};
use crate::error::{FluxError, Result};
use crate::units::{canonical_unit, infer_column};
use crate::warning::Warning;

/// A single `Name/unit` header field
static NAME_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?<name>[^,/]+?)\s*/\s*(?<unit>[^,/]+?)\s*$").expect("Failed to compile regex")
});

/// Instrument identification lines written by the CHI software
static INSTRUMENT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*instrument model\s*:\s*CHI\s*\d+").expect("Failed to compile regex")
});

/// CH Instruments decoder
pub struct ChInstruments;

impl ChInstruments {
    /// Parse a comma separated `Name/unit` header line into `(name, unit)` pairs
    fn header_fields(line: &str) -> Option<Vec<(String, String)>> {
        let fields = Delimiter::Char(',').split(line.trim());
        if fields.len() < 2 {
            return None;
        }
        fields
            .iter()
            .map(|field| {
                let captures = NAME_UNIT.captures(field)?;
                Some((captures["name"].to_string(), captures["unit"].to_string()))
            })
            .collect()
    }

    /// Check whether a `.txt` file looks like a CHI export
    pub fn detect(contents: &str) -> bool {
        contents
            .lines()
            .any(|line| INSTRUMENT_LINE.is_match(line) || Self::header_fields(line).is_some())
    }
}

impl Decode for ChInstruments {
    fn decode(&self, input: &Input<'_>) -> Result<Decoded> {
        let contents = input.text();
        let delimiter = Delimiter::Char(',');

        let mut metadata = BTreeMap::new();
        let mut header: Option<Vec<(String, String)>> = None;
        let mut table = Table::default();

        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            if header.is_some() {
                match text::parse_row(line, delimiter, idx + 1) {
                    Some(row) => table.push(row?, idx + 1)?,
                    None => table.skipped += 1,
                }
                continue;
            }
            if let Some(fields) = Self::header_fields(line) {
                header = Some(fields);
            } else if let Some((key, value)) = text::key_value(line) {
                metadata.insert(key, value);
            } else {
                table.skipped += 1;
            }
        }

        let header = header.ok_or_else(|| {
            FluxError::malformed("CHI export has no 'Name/unit' column header")
        })?;
        if table.is_empty() {
            return Err(FluxError::malformed("CHI export contains no data rows"));
        }
        if table.width() != header.len() {
            return Err(FluxError::malformed(format!(
                "CHI header names {} columns but data rows have {}",
                header.len(),
                table.width()
            )));
        }

        let mut warnings = Vec::new();
        let columns: Vec<Column> = header
            .into_iter()
            .zip(table.into_columns())
            .map(|((name, unit), samples)| {
                let guess = infer_column(&name);
                let unit = match canonical_unit(&unit) {
                    Some(symbol) => symbol.to_string(),
                    None => {
                        warnings.push(Warning::UnspecifiedUnit {
                            column: name.clone(),
                        });
                        String::new()
                    }
                };
                Column::new(name, unit, guess.role, samples)
            })
            .collect();

        metadata.insert(CURRENT_CONVENTION.to_string(), POLAROGRAPHIC.to_string());
        if columns.iter().any(|c| c.role() == Some(AxisRole::Distance)) {
            metadata.insert(DISTANCE_ORIENTATION.to_string(), REVERSED.to_string());
        }

        Ok(Decoded {
            columns,
            metadata,
            warnings,
        })
    }
}
