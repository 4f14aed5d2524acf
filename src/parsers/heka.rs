//! HEKA PATCHMASTER exports.
//!
//! - `.asc`: whitespace separated tables, one row per sample, preceded by
//!   sweep/series header lines. Values are in SI units (m, s, A, V).
//! - `.mat`: MATLAB workspaces with one `Trace_<group>_<series>_<sweep>_<trace>`
//!   matrix per recorded trace; column 0 is the sweep axis, column 1 the signal.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use super::matlab::{self, Variable};
use super::text::{self, assign, col, ColumnSpec, Delimiter};
use super::types::{AxisRole, Column, Decode, Decoded, Experiment, FileFormat, Input};
use crate::error::{FluxError, Result};

use AxisRole::{Current, Distance, Index, Potential, Time, X, Y};

const APPROACH: [ColumnSpec; 3] = [
    col("Index", "", Some(Index)),
    col("Distance", "m", Some(Distance)),
    col("Current", "A", Some(Current)),
];

const APPROACH_PAIR: [ColumnSpec; 5] = [
    col("Index", "", Some(Index)),
    col("Distance", "m", Some(Distance)),
    col("Current", "A", Some(Current)),
    col("Distance 2", "m", None),
    col("Current 2", "A", None),
];

const TRANSIENT: [ColumnSpec; 3] = [
    col("Index", "", Some(Index)),
    col("Time", "s", Some(Time)),
    col("Current", "A", Some(Current)),
];

const TRANSIENT_WITH_POTENTIAL: [ColumnSpec; 5] = [
    col("Index", "", Some(Index)),
    col("Time", "s", Some(Time)),
    col("Current", "A", Some(Current)),
    col("Time 2", "s", None),
    col("Potential", "V", Some(Potential)),
];

const LINE_SCAN: [ColumnSpec; 3] = [
    col("Index", "", Some(Index)),
    col("X", "m", Some(X)),
    col("Current", "A", Some(Current)),
];

static TRACE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Trace_(\d+)_(\d+)_(\d+)_(\d+)$").expect("Failed to compile regex")
});

/// HEKA PATCHMASTER decoder
pub struct Heka;

impl Heka {
    /// Column layout of an `.asc` table with `width` columns
    fn asc_layout(experiment: Experiment, width: usize) -> Option<&'static [ColumnSpec]> {
        match (experiment, width) {
            (Experiment::ApproachCurve, 3) => Some(&APPROACH),
            (Experiment::ApproachCurve, 5) => Some(&APPROACH_PAIR),
            (Experiment::Chronoamperometry | Experiment::CyclicVoltammetry, 3) => Some(&TRANSIENT),
            (Experiment::Chronoamperometry | Experiment::CyclicVoltammetry, 5) => {
                Some(&TRANSIENT_WITH_POTENTIAL)
            }
            (Experiment::Image, 3) => Some(&LINE_SCAN),
            _ => None,
        }
    }

    fn decode_asc(input: &Input<'_>) -> Result<Decoded> {
        let contents = input.text();
        let table = text::read_table(&contents, Delimiter::Whitespace)?;
        let width = table.width();
        let skipped = table.skipped;

        let layout = Self::asc_layout(input.experiment, width).ok_or_else(|| {
            FluxError::malformed(format!(
                "HEKA {} export with {} columns is not a known layout",
                input.experiment, width
            ))
        })?;

        let mut metadata = BTreeMap::new();
        metadata.insert("header_lines".to_string(), skipped.to_string());

        Ok(Decoded {
            columns: assign(table.into_columns(), layout, "HEKA .asc export")?,
            metadata,
            warnings: Vec::new(),
        })
    }

    /// Sort key of a `Trace_g_s_sw_t` variable name
    fn trace_key(name: &str) -> Option<[u32; 4]> {
        let captures = TRACE_NAME.captures(name)?;
        let mut key = [0u32; 4];
        for (slot, idx) in key.iter_mut().zip(1..=4) {
            *slot = captures[idx].parse().ok()?;
        }
        Some(key)
    }

    fn decode_mat(input: &Input<'_>) -> Result<Decoded> {
        let mat = matlab::parse(input.bytes)?;
        let ignored = mat.variables.len();

        let mut traces: Vec<([u32; 4], Variable)> = mat
            .variables
            .into_iter()
            .filter_map(|v| Self::trace_key(&v.name).map(|key| (key, v)))
            .collect();

        if traces.is_empty() {
            return Err(FluxError::malformed(
                "MAT file contains no Trace_<group>_<series>_<sweep>_<trace> variables",
            ));
        }
        traces.sort_by_key(|(key, _)| *key);

        if let Some((_, narrow)) = traces.iter().find(|(_, v)| v.cols < 2) {
            return Err(FluxError::malformed(format!(
                "MAT variable '{}' has {} columns, expected at least 2",
                narrow.name, narrow.cols
            )));
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("mat.header".to_string(), mat.header);
        metadata.insert("mat.traces".to_string(), traces.len().to_string());
        metadata.insert(
            "mat.ignored".to_string(),
            (ignored - traces.len() + mat.skipped).to_string(),
        );

        let columns = match input.experiment {
            Experiment::Image => Self::stack_lines(&traces),
            experiment => Self::trace_columns(&traces, experiment),
        };

        Ok(Decoded {
            columns,
            metadata,
            warnings: Vec::new(),
        })
    }

    /// One `.x`/`.y` column pair per trace; roles go to the first current
    /// trace (trace number 1) and, for voltammetry, the first potential trace.
    fn trace_columns(traces: &[([u32; 4], Variable)], experiment: Experiment) -> Vec<Column> {
        let current_trace = traces
            .iter()
            .position(|(key, _)| key[3] == 1)
            .unwrap_or(0);
        let potential_trace = match experiment {
            Experiment::CyclicVoltammetry => traces.iter().position(|(key, _)| key[3] == 2),
            _ => None,
        };

        let x_unit = match experiment {
            Experiment::ApproachCurve => "m",
            _ => "s",
        };
        let x_role = match experiment {
            Experiment::ApproachCurve => Some(Distance),
            _ => Some(Time),
        };

        let mut columns = Vec::with_capacity(traces.len() * 2);
        for (idx, (_, variable)) in traces.iter().enumerate() {
            let is_current = idx == current_trace;
            let is_potential = Some(idx) == potential_trace;

            let (y_unit, y_role) = if is_potential {
                ("V", Some(Potential))
            } else if is_current {
                ("A", Some(Current))
            } else if experiment == Experiment::CyclicVoltammetry && traces[idx].0[3] == 2 {
                ("V", None)
            } else {
                ("A", None)
            };

            columns.push(Column::new(
                format!("{}.x", variable.name),
                x_unit,
                if is_current { x_role } else { None },
                variable.column(0).unwrap_or_default().to_vec(),
            ));
            columns.push(Column::new(
                format!("{}.y", variable.name),
                y_unit,
                y_role,
                variable.column(1).unwrap_or_default().to_vec(),
            ));
        }
        columns
    }

    /// Concatenate line scans into X / Line / Current columns
    fn stack_lines(traces: &[([u32; 4], Variable)]) -> Vec<Column> {
        let mut x = Vec::new();
        let mut line = Vec::new();
        let mut current = Vec::new();

        for (idx, (_, variable)) in traces.iter().enumerate() {
            let positions = variable.column(0).unwrap_or_default();
            x.extend_from_slice(positions);
            line.extend(std::iter::repeat(idx as f64).take(positions.len()));
            current.extend_from_slice(variable.column(1).unwrap_or_default());
        }

        vec![
            Column::new("X", "m", Some(X), x),
            Column::new("Line", "", Some(Y), line),
            Column::new("Current", "A", Some(Current), current),
        ]
    }
}

impl Decode for Heka {
    fn decode(&self, input: &Input<'_>) -> Result<Decoded> {
        match input.format {
            FileFormat::Asc => Self::decode_asc(input),
            FileFormat::Mat => Self::decode_mat(input),
            other => Err(FluxError::UnsupportedFormat(format!(
                "HEKA does not export .{} files",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::matlab::fixture;

    fn input(format: FileFormat, experiment: Experiment, bytes: &[u8]) -> Input<'_> {
        Input {
            format,
            experiment,
            bytes,
        }
    }

    #[test]
    fn test_parse_approach_asc() {
        let sample = "Series_1_1\n\
                      \"Index\" \"Distance[m]\" \"I-mon[A]\"\n\
                      0 0.0 1.0e-9\n\
                      1 1.0e-6 0.9e-9\n\
                      2 2.0e-6 0.8e-9\n";
        let decoded = Heka
            .decode(&input(FileFormat::Asc, Experiment::ApproachCurve, sample.as_bytes()))
            .unwrap();

        assert_eq!(decoded.columns.len(), 3);
        assert_eq!(decoded.columns[1].name(), "Distance");
        assert_eq!(decoded.columns[1].unit(), "m");
        assert_eq!(decoded.columns[1].role(), Some(Distance));
        assert_eq!(decoded.columns[2].samples(), &[1.0e-9, 0.9e-9, 0.8e-9]);
        assert_eq!(decoded.metadata["header_lines"], "2");
    }

    #[test]
    fn test_transient_asc_with_potential() {
        let sample = "0 0.0 1e-9 0.0 0.1\n1 0.1 2e-9 0.1 0.2\n";
        let decoded = Heka
            .decode(&input(FileFormat::Asc, Experiment::CyclicVoltammetry, sample.as_bytes()))
            .unwrap();
        assert_eq!(decoded.columns.len(), 5);
        assert_eq!(decoded.columns[4].role(), Some(Potential));
        assert_eq!(decoded.columns[3].role(), None);
    }

    #[test]
    fn test_unknown_asc_width() {
        let sample = "0 0.0 1e-9 5\n";
        let err = Heka
            .decode(&input(FileFormat::Asc, Experiment::ApproachCurve, sample.as_bytes()))
            .unwrap_err();
        assert!(matches!(err, FluxError::MalformedFile(_)));
    }

    #[test]
    fn test_mat_variables_map_deterministically() {
        let bytes = fixture::file(&[
            fixture::matrix("Trace_1_1_2_1", &[&[0.0, 1.0], &[5.0, 6.0]]),
            fixture::matrix("Trace_1_1_1_1", &[&[0.0, 1.0], &[1.0, 2.0]]),
            fixture::matrix("notes", &[&[42.0, 43.0]]),
        ]);
        let decoded = Heka
            .decode(&input(FileFormat::Mat, Experiment::ApproachCurve, &bytes))
            .unwrap();

        let names: Vec<&str> = decoded.columns.iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            vec![
                "Trace_1_1_1_1.x",
                "Trace_1_1_1_1.y",
                "Trace_1_1_2_1.x",
                "Trace_1_1_2_1.y"
            ]
        );
        assert_eq!(decoded.columns[0].role(), Some(Distance));
        assert_eq!(decoded.columns[1].role(), Some(Current));
        assert_eq!(decoded.columns[1].samples(), &[1.0, 2.0]);
        assert_eq!(decoded.columns[3].role(), None);
        assert_eq!(decoded.metadata["mat.traces"], "2");
        assert_eq!(decoded.metadata["mat.ignored"], "1");
    }

    #[test]
    fn test_mat_without_traces() {
        let bytes = fixture::file(&[fixture::matrix("data", &[&[1.0], &[2.0]])]);
        let err = Heka
            .decode(&input(FileFormat::Mat, Experiment::ApproachCurve, &bytes))
            .unwrap_err();
        assert!(matches!(err, FluxError::MalformedFile(_)));
    }

    #[test]
    fn test_mat_voltammetry_roles() {
        let bytes = fixture::file(&[
            fixture::matrix("Trace_1_1_1_1", &[&[0.0, 0.1], &[1e-9, 2e-9]]),
            fixture::matrix("Trace_1_1_1_2", &[&[0.0, 0.1], &[0.2, 0.3]]),
        ]);
        let decoded = Heka
            .decode(&input(FileFormat::Mat, Experiment::CyclicVoltammetry, &bytes))
            .unwrap();
        assert_eq!(decoded.columns[1].role(), Some(Current));
        assert_eq!(decoded.columns[3].role(), Some(Potential));
        assert_eq!(decoded.columns[3].unit(), "V");
    }

    #[test]
    fn test_mat_image_lines_stack() {
        let bytes = fixture::file(&[
            fixture::matrix("Trace_1_1_1_1", &[&[0.0, 1e-6], &[1e-9, 2e-9]]),
            fixture::matrix("Trace_1_1_2_1", &[&[0.0, 1e-6], &[3e-9, 4e-9]]),
        ]);
        let decoded = Heka
            .decode(&input(FileFormat::Mat, Experiment::Image, &bytes))
            .unwrap();
        assert_eq!(decoded.columns.len(), 3);
        assert_eq!(decoded.columns[1].samples(), &[0.0, 0.0, 1.0, 1.0]);
        assert_eq!(decoded.columns[2].samples(), &[1e-9, 2e-9, 3e-9, 4e-9]);
    }
}
