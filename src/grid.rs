//! 2D current maps from area-scan records.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::analysis::ensure_positive;
use crate::error::{FluxError, Result};
use crate::math::fit_line;
use crate::normalize::MIN_SAMPLES;
use crate::parsers::{AxisRole, Column, RawRecord};

/// Current sampled on a rectangular grid, stored row-major (`ny` rows of `nx`)
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CurrentMap {
    x: Vec<f64>,
    y: Vec<f64>,
    current: Vec<f64>,
    position_unit: String,
    current_unit: String,
}

/// Which edge line of the map a slope is fitted to
#[derive(
    AsRefStr, Clone, Copy, Debug, Deserialize, Display, EnumString, Eq, PartialEq, Serialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Reference {
    /// The line at the smallest coordinate (`Y = 0` row, `X = 0` column)
    First,
    /// The line at the largest coordinate (`Y = Max` row, `X = Max` column)
    Last,
}

/// Slope of the least-squares line through the finite `(t, v)` pairs
fn slope_of(t: &[f64], v: &[f64]) -> Result<f64> {
    let (t, v): (Vec<f64>, Vec<f64>) = t
        .iter()
        .zip(v)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .unzip();
    fit_line(&t, &v)
        .map(|(_, b)| b)
        .ok_or(FluxError::InsufficientData {
            found: t.len(),
            required: 2,
        })
}

fn single<'a>(record: &'a RawRecord, role: AxisRole) -> Result<Option<&'a Column>> {
    match record.columns_with_role(role).as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(*only)),
        many => Err(FluxError::ColumnSelection(format!(
            "{} columns declare role {}",
            many.len(),
            role
        ))),
    }
}

/// Sorted distinct values
fn distinct(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    sorted
}

/// Line number of each sample of a raster scan: a new line starts whenever X
/// moves back
fn raster_lines(x: &[f64]) -> Vec<f64> {
    let mut line = 0.0;
    x.iter()
        .enumerate()
        .map(|(i, &v)| {
            if i > 0 && v < x[i - 1] {
                line += 1.0;
            }
            line
        })
        .collect()
}

impl CurrentMap {
    /// Build a map from the X, Y and Current columns of `record`.
    ///
    /// Without a Y column every restart of X starts a new line. Every
    /// `(x, y)` combination must be present exactly once.
    pub fn from_record(record: &RawRecord) -> Result<Self> {
        let x_column = single(record, AxisRole::X)?
            .ok_or_else(|| FluxError::ColumnSelection("record has no X column".to_string()))?;
        let current_column = single(record, AxisRole::Current)?.ok_or_else(|| {
            FluxError::ColumnSelection("record has no Current column".to_string())
        })?;
        let y_values = match single(record, AxisRole::Y)? {
            Some(column) => column.samples().to_vec(),
            None => raster_lines(x_column.samples()),
        };

        if record.len() < MIN_SAMPLES {
            return Err(FluxError::InsufficientData {
                found: record.len(),
                required: MIN_SAMPLES,
            });
        }

        let x = distinct(x_column.samples());
        let y = distinct(&y_values);
        let (nx, ny) = (x.len(), y.len());
        if nx * ny != record.len() {
            return Err(FluxError::malformed(format!(
                "{} points do not form a complete {} x {} grid",
                record.len(),
                nx,
                ny
            )));
        }

        let mut current = vec![f64::NAN; nx * ny];
        let mut filled = vec![false; nx * ny];
        for ((xv, yv), &value) in x_column
            .samples()
            .iter()
            .zip(&y_values)
            .zip(current_column.samples())
        {
            let col = x.binary_search_by(|p| p.total_cmp(xv)).map_err(|_| {
                FluxError::malformed(format!("X position {} is not a grid coordinate", xv))
            })?;
            let row = y.binary_search_by(|p| p.total_cmp(yv)).map_err(|_| {
                FluxError::malformed(format!("Y position {} is not a grid coordinate", yv))
            })?;
            let idx = row * nx + col;
            if filled[idx] {
                return Err(FluxError::malformed(format!(
                    "grid point ({}, {}) appears more than once",
                    xv, yv
                )));
            }
            filled[idx] = true;
            current[idx] = value;
        }

        tracing::debug!("Built {} x {} current map", nx, ny);

        Ok(Self {
            x,
            y,
            current,
            position_unit: x_column.unit().to_string(),
            current_unit: current_column.unit().to_string(),
        })
    }

    pub fn nx(&self) -> usize {
        self.x.len()
    }

    pub fn ny(&self) -> usize {
        self.y.len()
    }

    /// Distinct X coordinates, ascending
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    /// Distinct Y coordinates, ascending
    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn position_unit(&self) -> &str {
        &self.position_unit
    }

    pub fn current_unit(&self) -> &str {
        &self.current_unit
    }

    /// Current at grid row `row` (Y index) and column `col` (X index)
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.ny() && col < self.nx() {
            Some(self.current[row * self.nx() + col])
        } else {
            None
        }
    }

    /// Currents of one line of constant Y
    pub fn row(&self, row: usize) -> Option<&[f64]> {
        let nx = self.nx();
        self.current.get(row * nx..(row + 1) * nx)
    }

    /// Currents of one column of constant X
    pub fn column(&self, col: usize) -> Option<Vec<f64>> {
        let nx = self.nx();
        (col < nx).then(|| self.current.iter().skip(col).step_by(nx).copied().collect())
    }

    fn reference_index(reference: Reference, len: usize) -> usize {
        match reference {
            Reference::First => 0,
            Reference::Last => len.saturating_sub(1),
        }
    }

    /// Remove the tilt along X.
    ///
    /// The slope `b` of the reference row is fitted against X and
    /// `b·(x − x₀)` is subtracted from every row.
    pub fn correct_x_slope(&self, reference: Reference) -> Result<Self> {
        let row = Self::reference_index(reference, self.ny());
        let slope = slope_of(&self.x, self.row(row).unwrap_or_default())?;
        let (nx, x0) = (self.nx(), self.x[0]);

        let mut corrected = self.clone();
        for (idx, value) in corrected.current.iter_mut().enumerate() {
            *value -= slope * (self.x[idx % nx] - x0);
        }
        Ok(corrected)
    }

    /// Remove the tilt along Y.
    ///
    /// The slope `b` of the reference column is fitted against Y and
    /// `b·(y − y₀)` is subtracted from every column.
    pub fn correct_y_slope(&self, reference: Reference) -> Result<Self> {
        let col = Self::reference_index(reference, self.nx());
        let slope = slope_of(&self.y, &self.column(col).unwrap_or_default())?;
        let (nx, y0) = (self.nx(), self.y[0]);

        let mut corrected = self.clone();
        for (idx, value) in corrected.current.iter_mut().enumerate() {
            *value -= slope * (self.y[idx / nx] - y0);
        }
        Ok(corrected)
    }

    /// Currents divided by the steady-state current `iss`, given in the
    /// map's current unit
    pub fn normalized(&self, iss: f64) -> Result<Self> {
        let iss = ensure_positive("steady-state current", iss)?;
        Ok(Self {
            current: self.current.iter().map(|c| c / iss).collect(),
            current_unit: "i/iss".to_string(),
            ..self.clone()
        })
    }

    /// The map as an `ny × nx` matrix
    pub fn matrix(&self) -> DMatrix<f64> {
        DMatrix::from_row_slice(self.ny(), self.nx(), &self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::{FileFormat, Vendor};
    use std::collections::BTreeMap;
    use std::str::FromStr;

    fn record(columns: Vec<Column>) -> RawRecord {
        RawRecord::new(FileFormat::Txt, Vendor::Biologic, columns, BTreeMap::new()).unwrap()
    }

    #[test]
    fn test_builds_sorted_grid() {
        let rec = record(vec![
            Column::new("X", "µm", Some(AxisRole::X), vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.0]),
            Column::new("Y", "µm", Some(AxisRole::Y), vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0]),
            Column::new("I", "nA", Some(AxisRole::Current), vec![2.0, 1.0, 4.0, 3.0, 6.0, 5.0]),
        ]);
        let map = CurrentMap::from_record(&rec).unwrap();
        assert_eq!((map.nx(), map.ny()), (2, 3));
        assert_eq!(map.row(0), Some(&[1.0, 2.0][..]));
        assert_eq!(map.get(2, 1), Some(6.0));
        assert_eq!(map.get(3, 0), None);
        assert_eq!(map.matrix()[(1, 0)], 3.0);
        assert_eq!(map.position_unit(), "µm");
    }

    #[test]
    fn test_raster_lines_without_y() {
        let rec = record(vec![
            Column::new("X", "µm", Some(AxisRole::X), vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0]),
            Column::new("I", "nA", Some(AxisRole::Current), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]),
        ]);
        let map = CurrentMap::from_record(&rec).unwrap();
        assert_eq!(map.y(), &[0.0, 1.0]);
        assert_eq!(map.row(1), Some(&[4.0, 5.0, 6.0][..]));
    }

    #[test]
    fn test_incomplete_grid() {
        let rec = record(vec![
            Column::new("X", "µm", Some(AxisRole::X), vec![0.0, 1.0, 0.0, 2.0]),
            Column::new("Y", "µm", Some(AxisRole::Y), vec![0.0, 0.0, 1.0, 1.0]),
            Column::new("I", "nA", Some(AxisRole::Current), vec![1.0, 2.0, 3.0, 4.0]),
        ]);
        let err = CurrentMap::from_record(&rec).unwrap_err();
        assert!(matches!(err, FluxError::MalformedFile(_)));
    }

    #[test]
    fn test_duplicate_point() {
        let rec = record(vec![
            Column::new("X", "µm", Some(AxisRole::X), vec![0.0, 0.0, 1.0, 1.0]),
            Column::new("Y", "µm", Some(AxisRole::Y), vec![0.0, 0.0, 1.0, 0.0]),
            Column::new("I", "nA", Some(AxisRole::Current), vec![1.0, 2.0, 3.0, 4.0]),
        ]);
        let err = CurrentMap::from_record(&rec).unwrap_err();
        assert!(matches!(err, FluxError::MalformedFile(_)));
    }

    /// 3 x 3 map: 1 + 0.5·x + 2·y on x, y ∈ {0, 1, 2}
    fn tilted() -> CurrentMap {
        let mut x = Vec::new();
        let mut y = Vec::new();
        let mut i = Vec::new();
        for yv in 0..3 {
            for xv in 0..3 {
                x.push(xv as f64);
                y.push(yv as f64);
                i.push(1.0 + 0.5 * xv as f64 + 2.0 * yv as f64);
            }
        }
        let rec = record(vec![
            Column::new("X", "µm", Some(AxisRole::X), x),
            Column::new("Y", "µm", Some(AxisRole::Y), y),
            Column::new("I", "nA", Some(AxisRole::Current), i),
        ]);
        CurrentMap::from_record(&rec).unwrap()
    }

    #[test]
    fn test_slope_corrections() {
        let map = tilted();
        assert_eq!(map.column(2), Some(vec![2.0, 4.0, 6.0]));
        assert_eq!(map.column(3), None);

        let flat_x = map.correct_x_slope(Reference::First).unwrap();
        for row in 0..3 {
            let line = flat_x.row(row).unwrap();
            assert!(line.iter().all(|v| (v - line[0]).abs() < 1e-9));
        }
        assert!((flat_x.get(2, 0).unwrap() - 5.0).abs() < 1e-9);

        let flat = flat_x.correct_y_slope(Reference::Last).unwrap();
        for row in 0..3 {
            for col in 0..3 {
                assert!((flat.get(row, col).unwrap() - 1.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_slope_needs_two_points() {
        let rec = record(vec![
            Column::new("X", "µm", Some(AxisRole::X), vec![0.0, 0.0, 0.0]),
            Column::new("Y", "µm", Some(AxisRole::Y), vec![0.0, 1.0, 2.0]),
            Column::new("I", "nA", Some(AxisRole::Current), vec![1.0, 2.0, 3.0]),
        ]);
        let map = CurrentMap::from_record(&rec).unwrap();
        assert!(matches!(
            map.correct_x_slope(Reference::First),
            Err(FluxError::InsufficientData { found: 1, required: 2 })
        ));
        assert!(map.correct_y_slope(Reference::First).is_ok());
    }

    #[test]
    fn test_normalized() {
        let map = tilted().normalized(2.0).unwrap();
        assert_eq!(map.current_unit(), "i/iss");
        assert_eq!(map.get(0, 0), Some(0.5));
        assert_eq!(map.get(2, 2), Some(3.0));
        assert!(matches!(tilted().normalized(0.0), Err(FluxError::InvalidParameter(_))));
        assert_eq!(Reference::from_str("last").unwrap(), Reference::Last);
    }

    #[test]
    fn test_requires_roles() {
        let rec = record(vec![Column::new("X", "µm", Some(AxisRole::X), vec![0.0, 1.0, 2.0])]);
        let err = CurrentMap::from_record(&rec).unwrap_err();
        assert!(matches!(err, FluxError::ColumnSelection(_)));
    }
}
