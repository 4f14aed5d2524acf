//! Shared helpers for the line-oriented text formats.
//!
//! Vendor exports mix free-form header lines with numeric tables. A line is
//! a data row when its first field parses as a number; every other field on
//! a data row must parse too, and all data rows must have the same width.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

use super::types::{AxisRole, Column};
use crate::error::{FluxError, Result};

/// `Key : Value` or `Key = Value` header lines
static KEY_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[#|\s]*(?<name>[^:=]+?)\s*[:=]\s*(?<value>.*?)\s*$")
        .expect("Failed to compile regex")
});

/// Decode file bytes as UTF-8, falling back to Latin-1 for legacy exports
pub(crate) fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s.strip_prefix('\u{feff}').unwrap_or(s)),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
    }
}

/// Split a header line into a metadata key and value
pub(crate) fn key_value(line: &str) -> Option<(String, String)> {
    let captures = KEY_VALUE.captures(line)?;
    let name = captures["name"].trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), captures["value"].to_string()))
}

/// Field separator of a text table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Delimiter {
    Whitespace,
    Char(char),
}

impl Delimiter {
    /// Split a line into trimmed fields, dropping trailing empty fields
    pub(crate) fn split<'a>(&self, line: &'a str) -> Vec<&'a str> {
        match self {
            Delimiter::Whitespace => line.split_whitespace().collect(),
            Delimiter::Char(c) => {
                let mut fields: Vec<&str> = line.split(*c).map(str::trim).collect();
                while fields.last().is_some_and(|f| f.is_empty()) {
                    fields.pop();
                }
                fields
            }
        }
    }
}

/// Parse `line` as a numeric data row.
///
/// Returns `None` for header/comment lines (first field is not a number).
pub(crate) fn parse_row(
    line: &str,
    delimiter: Delimiter,
    line_no: usize,
) -> Option<Result<Vec<f64>>> {
    let fields = delimiter.split(line.trim());
    let first = fields.first()?;
    first.parse::<f64>().ok()?;

    Some(
        fields
            .iter()
            .map(|field| {
                field.parse::<f64>().map_err(|_| {
                    FluxError::malformed(format!("line {}: '{}' is not a number", line_no, field))
                })
            })
            .collect(),
    )
}

/// Row-major numeric table accumulated from data rows
#[derive(Debug, Default)]
pub(crate) struct Table {
    rows: Vec<Vec<f64>>,
    width: Option<usize>,
    /// Non-blank lines that were not data rows
    pub skipped: usize,
}

impl Table {
    /// Append a row, rejecting rows whose width differs from the first
    pub(crate) fn push(&mut self, row: Vec<f64>, line_no: usize) -> Result<()> {
        match self.width {
            None => self.width = Some(row.len()),
            Some(width) if width != row.len() => {
                return Err(FluxError::malformed(format!(
                    "line {}: {} fields but earlier rows have {}",
                    line_no,
                    row.len(),
                    width
                )));
            }
            Some(_) => {}
        }
        self.rows.push(row);
        Ok(())
    }

    pub(crate) fn width(&self) -> usize {
        self.width.unwrap_or(0)
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Transpose into column vectors
    pub(crate) fn into_columns(self) -> Vec<Vec<f64>> {
        let width = self.width();
        let mut columns: Vec<Vec<f64>> = (0..width)
            .map(|_| Vec::with_capacity(self.rows.len()))
            .collect();
        for row in self.rows {
            for (column, value) in columns.iter_mut().zip(row) {
                column.push(value);
            }
        }
        columns
    }
}

/// Collect every numeric row of `text`, skipping header lines
pub(crate) fn read_table(text: &str, delimiter: Delimiter) -> Result<Table> {
    let mut table = Table::default();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_row(line, delimiter, idx + 1) {
            Some(row) => table.push(row?, idx + 1)?,
            None => table.skipped += 1,
        }
    }
    if table.is_empty() {
        return Err(FluxError::malformed("no numeric data rows found"));
    }
    Ok(table)
}

/// Static description of one column in a fixed vendor layout
#[derive(Clone, Copy, Debug)]
pub(crate) struct ColumnSpec {
    pub name: &'static str,
    pub unit: &'static str,
    pub role: Option<AxisRole>,
}

pub(crate) const fn col(name: &'static str, unit: &'static str, role: Option<AxisRole>) -> ColumnSpec {
    ColumnSpec { name, unit, role }
}

/// Attach names, units and roles from `layout` to decoded sample columns
pub(crate) fn assign(samples: Vec<Vec<f64>>, layout: &[ColumnSpec], what: &str) -> Result<Vec<Column>> {
    if samples.len() != layout.len() {
        return Err(FluxError::malformed(format!(
            "{} expects {} columns, found {}",
            what,
            layout.len(),
            samples.len()
        )));
    }
    Ok(samples
        .into_iter()
        .zip(layout)
        .map(|(data, spec)| Column::new(spec.name, spec.unit, spec.role, data))
        .collect())
}
