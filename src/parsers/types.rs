use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use strum::{AsRefStr, Display, EnumIter, EnumString};

use super::text;
use crate::error::{FluxError, Result};
use crate::warning::Warning;

/// Unit string used when a column carries no known unit
pub const UNSPECIFIED_UNIT: &str = "unspecified";

/// Metadata key declaring how the distance axis is oriented in the file
pub const DISTANCE_ORIENTATION: &str = "distance_orientation";
/// Value of [`DISTANCE_ORIENTATION`] for files that record probe position
/// instead of probe-to-substrate gap
pub const REVERSED: &str = "reversed";
/// Metadata key declaring the sign convention of the current column
pub const CURRENT_CONVENTION: &str = "current_convention";
/// Value of [`CURRENT_CONVENTION`] for cathodic-positive currents
pub const POLAROGRAPHIC: &str = "polarographic";

/// File formats understood by the reader, keyed by file extension
#[derive(
    AsRefStr, Clone, Copy, Debug, Display, EnumIter, EnumString, Eq, Hash, PartialEq, Serialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum FileFormat {
    Asc,
    Txt,
    Dat,
    Mat,
    Csv,
    Img,
    Zsc,
}

impl FileFormat {
    /// Whether this format is a binary container rather than text
    pub fn is_binary(&self) -> bool {
        matches!(self, FileFormat::Mat)
    }
}

/// Instrument vendors, named as in the manufacturer selection of the host UI
#[derive(
    AsRefStr, Clone, Copy, Debug, Display, EnumIter, EnumString, Eq, Hash, PartialEq, Serialize,
)]
#[strum(ascii_case_insensitive)]
pub enum Vendor {
    #[strum(serialize = "HEKA")]
    Heka,
    #[strum(serialize = "Biologic")]
    Biologic,
    #[strum(to_string = "CH Instruments", serialize = "CHI")]
    ChInstruments,
    #[strum(serialize = "Sensolytics")]
    Sensolytics,
    #[strum(serialize = "PAR")]
    Par,
    #[strum(serialize = "SECMx")]
    Secmx,
}

impl Vendor {
    /// File formats this vendor's software exports
    pub fn formats(&self) -> &'static [FileFormat] {
        match self {
            Vendor::Heka => &[FileFormat::Asc, FileFormat::Mat],
            Vendor::Biologic => &[FileFormat::Txt],
            Vendor::ChInstruments => &[FileFormat::Txt],
            Vendor::Sensolytics => &[FileFormat::Dat],
            Vendor::Par => &[FileFormat::Csv],
            Vendor::Secmx => &[FileFormat::Img, FileFormat::Zsc],
        }
    }

    /// The only vendor producing `format`, if the extension alone decides it
    pub fn for_format(format: FileFormat) -> Option<Vendor> {
        match format {
            FileFormat::Asc | FileFormat::Mat => Some(Vendor::Heka),
            FileFormat::Dat => Some(Vendor::Sensolytics),
            FileFormat::Csv => Some(Vendor::Par),
            FileFormat::Img | FileFormat::Zsc => Some(Vendor::Secmx),
            FileFormat::Txt => None,
        }
    }
}

/// Kind of SECM experiment a file belongs to.
///
/// Passed explicitly to the reader and normalizer; it selects decoder
/// layouts and the independent axis.
#[derive(
    AsRefStr,
    Clone,
    Copy,
    Debug,
    Default,
    Display,
    EnumIter,
    EnumString,
    Eq,
    Hash,
    PartialEq,
    Serialize,
)]
#[strum(ascii_case_insensitive)]
pub enum Experiment {
    #[default]
    #[strum(to_string = "approach-curve", serialize = "pac")]
    ApproachCurve,
    #[strum(to_string = "chronoamperometry", serialize = "ca")]
    Chronoamperometry,
    #[strum(to_string = "cyclic-voltammetry", serialize = "cv")]
    CyclicVoltammetry,
    #[strum(to_string = "image")]
    Image,
}

impl Experiment {
    /// Axis role of the independent variable, `None` for 2D images
    pub fn independent_role(&self) -> Option<AxisRole> {
        match self {
            Experiment::ApproachCurve => Some(AxisRole::Distance),
            Experiment::Chronoamperometry => Some(AxisRole::Time),
            Experiment::CyclicVoltammetry => Some(AxisRole::Potential),
            Experiment::Image => None,
        }
    }
}

/// Physical role a column plays in an experiment
#[derive(AsRefStr, Clone, Copy, Debug, Display, EnumString, Eq, Hash, PartialEq, Serialize)]
#[strum(ascii_case_insensitive)]
pub enum AxisRole {
    Index,
    Distance,
    Time,
    Potential,
    Current,
    X,
    Y,
}

/// One named, unit-tagged column of samples
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Column {
    name: String,
    unit: String,
    role: Option<AxisRole>,
    samples: Vec<f64>,
}

impl Column {
    /// Create a column. An empty unit is stored as [`UNSPECIFIED_UNIT`].
    pub fn new(
        name: impl Into<String>,
        unit: impl Into<String>,
        role: Option<AxisRole>,
        samples: Vec<f64>,
    ) -> Self {
        let unit = unit.into();
        let unit = if unit.trim().is_empty() {
            UNSPECIFIED_UNIT.to_string()
        } else {
            unit
        };
        Self {
            name: name.into(),
            unit,
            role,
            samples,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn role(&self) -> Option<AxisRole> {
        self.role
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Parsed file contents in a vendor-neutral tabular form.
///
/// All columns share the same length. Fields are private so a record cannot
/// change after [`RawRecord::new`] validated it.
#[derive(Clone, Debug, Serialize)]
pub struct RawRecord {
    format: FileFormat,
    vendor: Vendor,
    columns: Vec<Column>,
    metadata: BTreeMap<String, String>,
}

impl RawRecord {
    /// Build a record, rejecting empty column sets and ragged columns
    pub fn new(
        format: FileFormat,
        vendor: Vendor,
        columns: Vec<Column>,
        metadata: BTreeMap<String, String>,
    ) -> Result<Self> {
        let first = columns
            .first()
            .ok_or_else(|| FluxError::malformed("record contains no columns"))?;
        let expected = first.len();

        if let Some(bad) = columns.iter().find(|c| c.len() != expected) {
            return Err(FluxError::malformed(format!(
                "column '{}' has {} samples but column '{}' has {}",
                bad.name,
                bad.len(),
                first.name,
                expected
            )));
        }

        Ok(Self {
            format,
            vendor,
            columns,
            metadata,
        })
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    pub fn vendor(&self) -> Vendor {
        self.vendor
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Look up a metadata value
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Number of samples per column
    pub fn len(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find a column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// All columns declaring `role`, in file order
    pub fn columns_with_role(&self, role: AxisRole) -> Vec<&Column> {
        self.columns
            .iter()
            .filter(|c| c.role == Some(role))
            .collect()
    }
}

/// Raw bytes of one file plus the context needed to decode it
pub struct Input<'a> {
    pub format: FileFormat,
    pub experiment: Experiment,
    pub bytes: &'a [u8],
}

impl<'a> Input<'a> {
    /// File contents as text (UTF-8, falling back to Latin-1)
    pub fn text(&self) -> Cow<'a, str> {
        text::decode_text(self.bytes)
    }
}

/// Decoder output before it is sealed into a [`RawRecord`]
#[derive(Debug, Default)]
pub struct Decoded {
    pub columns: Vec<Column>,
    pub metadata: BTreeMap<String, String>,
    pub warnings: Vec<Warning>,
}

/// Common capability of every vendor decoder
pub trait Decode {
    fn decode(&self, input: &Input<'_>) -> Result<Decoded>;
}
