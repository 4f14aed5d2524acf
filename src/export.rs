//! Writing traces and current maps as tab-separated text or JSON.

use std::io::{self, Write};

use serde::Serialize;

use crate::grid::CurrentMap;
use crate::trace::Trace;

fn tsv_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(writer)
}

fn finish<W: Write>(table: csv::Writer<W>) -> io::Result<W> {
    table.into_inner().map_err(|e| e.into_error())
}

/// Write `trace` as a two-column table with a `label (unit)` header.
///
/// Feature indices follow as a trailing `# features:` comment line.
pub fn write_trace<W: Write>(trace: &Trace, writer: W) -> io::Result<()> {
    let mut table = tsv_writer(writer);
    table.write_record([trace.x().title(), trace.y().title()])?;
    for (x, y) in trace.points() {
        table.write_record([x.to_string(), y.to_string()])?;
    }

    let mut writer = finish(table)?;
    if !trace.features().is_empty() {
        let indices: Vec<String> = trace.features().iter().map(usize::to_string).collect();
        writeln!(writer, "# features: {}", indices.join(" "))?;
    }
    writer.flush()
}

/// Write `map` as a matrix: the header holds the X coordinates, each row
/// starts with its Y coordinate.
pub fn write_map<W: Write>(map: &CurrentMap, writer: W) -> io::Result<()> {
    let mut table = tsv_writer(writer);

    let corner = format!("Y ({}) \\ X ({})", map.position_unit(), map.position_unit());
    let header = std::iter::once(corner).chain(map.x().iter().map(f64::to_string));
    table.write_record(header)?;

    for (j, y) in map.y().iter().enumerate() {
        let currents = map.row(j).unwrap_or_default();
        let row = std::iter::once(y.to_string()).chain(currents.iter().map(f64::to_string));
        table.write_record(row)?;
    }

    let mut writer = finish(table)?;
    writeln!(writer, "# current ({})", map.current_unit())?;
    writer.flush()
}

/// Pretty-printed JSON of any exported value
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::{AxisRole, Column, FileFormat, RawRecord, Vendor};
    use crate::trace::Axis;
    use std::collections::BTreeMap;

    fn trace() -> Trace {
        Trace::new(
            Axis::new("Distance", "µm", vec![0.0, 1.5, 3.0]),
            Axis::new("Current", "nA", vec![1.0, 0.5, 0.25]),
        )
        .unwrap()
    }

    #[test]
    fn test_write_trace() {
        let trace = trace().with_features(vec![1]).unwrap();
        let mut out = Vec::new();
        write_trace(&trace, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Distance (µm)\tCurrent (nA)");
        assert_eq!(lines[2], "1.5\t0.5");
        assert_eq!(lines.last(), Some(&"# features: 1"));
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_write_trace_without_features() {
        let mut out = Vec::new();
        write_trace(&trace(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains('#'));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_write_map() {
        let record = RawRecord::new(
            FileFormat::Txt,
            Vendor::Biologic,
            vec![
                Column::new("X", "µm", Some(AxisRole::X), vec![0.0, 5.0, 0.0, 5.0]),
                Column::new("Y", "µm", Some(AxisRole::Y), vec![0.0, 0.0, 5.0, 5.0]),
                Column::new("I", "nA", Some(AxisRole::Current), vec![1.0, 2.0, 3.0, 4.0]),
            ],
            BTreeMap::new(),
        )
        .unwrap();
        let map = CurrentMap::from_record(&record).unwrap();

        let mut out = Vec::new();
        write_map(&map, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Y (µm) \\ X (µm)\t0\t5");
        assert_eq!(lines[2], "5\t3\t4");
        assert_eq!(lines[3], "# current (nA)");
    }

    #[test]
    fn test_to_json() {
        let json = to_json(&trace().with_features(vec![2]).unwrap()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["features"][0], 2);
        assert_eq!(value["x"]["unit"], "µm");
    }
}
