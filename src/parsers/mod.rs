//! Vendor file readers.
//!
//! [`read`] picks a decoder from the file extension (and, for `.txt`, by
//! sniffing the contents), decodes the file and seals the result into an
//! immutable [`RawRecord`].

pub mod biologic;
pub mod chi;
pub mod heka;
pub mod matlab;
pub mod par;
pub mod secmx;
pub mod sensolytics;
mod text;
pub mod types;

pub use biologic::Biologic;
pub use chi::ChInstruments;
pub use heka::Heka;
pub use par::Par;
pub use secmx::Secmx;
pub use sensolytics::Sensolytics;
pub use types::{
    AxisRole, Column, Decode, Decoded, Experiment, FileFormat, Input, RawRecord, Vendor,
    CURRENT_CONVENTION, DISTANCE_ORIENTATION, POLAROGRAPHIC, REVERSED, UNSPECIFIED_UNIT,
};

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{FluxError, Result};
use crate::warning::Outcome;

/// Which decoder to use: detect from the file, or a named vendor
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatHint {
    #[default]
    Auto,
    Vendor(Vendor),
}

impl FromStr for FormatHint {
    type Err = FluxError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(FormatHint::Auto);
        }
        Vendor::from_str(s.trim())
            .map(FormatHint::Vendor)
            .map_err(|_| FluxError::UnsupportedFormat(format!("unknown vendor '{}'", s)))
    }
}

impl fmt::Display for FormatHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatHint::Auto => write!(f, "auto"),
            FormatHint::Vendor(vendor) => write!(f, "{}", vendor),
        }
    }
}

impl Vendor {
    /// Decode `input` with this vendor's decoder
    pub fn decode(&self, input: &Input<'_>) -> Result<Decoded> {
        match self {
            Vendor::Heka => Heka.decode(input),
            Vendor::Biologic => Biologic.decode(input),
            Vendor::ChInstruments => ChInstruments.decode(input),
            Vendor::Sensolytics => Sensolytics.decode(input),
            Vendor::Par => Par.decode(input),
            Vendor::Secmx => Secmx.decode(input),
        }
    }
}

/// File format implied by the extension of `path`
pub fn format_of(path: &Path) -> Result<FileFormat> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| {
            FluxError::UnsupportedFormat(format!("{} has no file extension", path.display()))
        })?;
    FileFormat::from_str(extension)
        .map_err(|_| FluxError::UnsupportedFormat(format!("'.{}' files are not supported", extension)))
}

/// Pick the vendor for a file of `format` with the given contents
pub fn detect(format: FileFormat, bytes: &[u8]) -> Result<Vendor> {
    if let Some(vendor) = Vendor::for_format(format) {
        return Ok(vendor);
    }

    let contents = text::decode_text(bytes);
    match (ChInstruments::detect(&contents), Biologic::detect(&contents)) {
        (true, false) => Ok(Vendor::ChInstruments),
        (false, true) => Ok(Vendor::Biologic),
        (true, true) => Err(FluxError::UnsupportedFormat(
            "text file matches both CH Instruments and Biologic layouts".to_string(),
        )),
        (false, false) => Err(FluxError::UnsupportedFormat(
            "text file matches no known vendor layout".to_string(),
        )),
    }
}

/// Decode in-memory file contents
pub fn read_bytes(
    format: FileFormat,
    hint: FormatHint,
    experiment: Experiment,
    bytes: &[u8],
) -> Result<Outcome<RawRecord>> {
    let vendor = match hint {
        FormatHint::Vendor(vendor) if vendor.formats().contains(&format) => vendor,
        FormatHint::Vendor(vendor) => {
            return Err(FluxError::UnsupportedFormat(format!(
                "{} does not export .{} files",
                vendor, format
            )));
        }
        FormatHint::Auto => detect(format, bytes)?,
    };

    let input = Input {
        format,
        experiment,
        bytes,
    };
    let decoded = vendor.decode(&input)?;
    let record = RawRecord::new(format, vendor, decoded.columns, decoded.metadata)?;
    for warning in &decoded.warnings {
        tracing::warn!("{}: {}", vendor, warning);
    }

    tracing::info!(
        "Parsed {} .{} file: {} columns, {} samples, {} warnings",
        vendor,
        format,
        record.columns().len(),
        record.len(),
        decoded.warnings.len()
    );

    Ok(Outcome::new(record, decoded.warnings))
}

/// Read and decode the file at `path`
pub fn read(
    path: impl AsRef<Path>,
    hint: FormatHint,
    experiment: Experiment,
) -> Result<Outcome<RawRecord>> {
    let path = path.as_ref();
    let format = format_of(path)?;
    let bytes = fs::read(path).map_err(|e| FluxError::io(path, e))?;
    if bytes.is_empty() && format.is_binary() {
        return Err(FluxError::malformed(format!("{} is empty", path.display())));
    }
    read_bytes(format, hint, experiment, &bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hint_from_str() {
        assert_eq!(FormatHint::from_str("auto").unwrap(), FormatHint::Auto);
        assert_eq!(
            FormatHint::from_str("CH Instruments").unwrap(),
            FormatHint::Vendor(Vendor::ChInstruments)
        );
        assert_eq!(
            FormatHint::from_str("sensolytics").unwrap(),
            FormatHint::Vendor(Vendor::Sensolytics)
        );
        let err = FormatHint::from_str("Gamry").unwrap_err();
        assert!(matches!(err, FluxError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_format_of() {
        assert_eq!(format_of(Path::new("scan.ZSC")).unwrap(), FileFormat::Zsc);
        assert!(matches!(
            format_of(Path::new("scan.xyz")),
            Err(FluxError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            format_of(Path::new("scan")),
            Err(FluxError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_detect_text_vendor() {
        let chi = b"Instrument Model:  CHI920D\nDistance/um, Current/A\n0, 1e-9\n";
        assert_eq!(detect(FileFormat::Txt, chi).unwrap(), Vendor::ChInstruments);

        let biologic = b"0.0\t1e-9\n1.0\t2e-9\n";
        assert_eq!(detect(FileFormat::Txt, biologic).unwrap(), Vendor::Biologic);

        let neither = b"hello\nworld\n";
        assert!(matches!(
            detect(FileFormat::Txt, neither),
            Err(FluxError::UnsupportedFormat(_))
        ));

        assert_eq!(detect(FileFormat::Csv, b"").unwrap(), Vendor::Par);
    }

    #[test]
    fn test_ambiguous_text() {
        let both = b"Instrument Model:  CHI920D\n0.0 1e-9\n1.0 2e-9\n";
        assert!(matches!(
            detect(FileFormat::Txt, both),
            Err(FluxError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_hint_must_match_format() {
        let err = read_bytes(
            FileFormat::Csv,
            FormatHint::Vendor(Vendor::Heka),
            Experiment::ApproachCurve,
            b"z_um,current_nA\n0,1\n",
        )
        .unwrap_err();
        assert!(matches!(err, FluxError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_read_bytes_seals_record() {
        let outcome = read_bytes(
            FileFormat::Csv,
            FormatHint::Auto,
            Experiment::ApproachCurve,
            b"z_um,current_nA\n0,1\n1,2\n2,3\n",
        )
        .unwrap();
        let record = outcome.value;
        assert_eq!(record.vendor(), Vendor::Par);
        assert_eq!(record.len(), 3);
        assert_eq!(record.columns_with_role(AxisRole::Distance).len(), 1);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_read_mat_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("approach.mat");
        let bytes = matlab::fixture::file(&[matlab::fixture::matrix(
            "Trace_1_1_1_1",
            &[&[0.0, 1e-6, 2e-6], &[1e-9, 0.9e-9, 0.5e-9]],
        )]);
        fs::write(&path, bytes).unwrap();

        let record = read(&path, FormatHint::Auto, Experiment::ApproachCurve)
            .unwrap()
            .value;
        assert_eq!(record.vendor(), Vendor::Heka);
        assert_eq!(record.format(), FileFormat::Mat);
        assert_eq!(record.len(), 3);

        let empty = dir.path().join("empty.mat");
        fs::write(&empty, b"").unwrap();
        let err = read(&empty, FormatHint::Auto, Experiment::ApproachCurve).unwrap_err();
        assert!(matches!(err, FluxError::MalformedFile(_)));
    }
}
