//! flux-secm - Import and analysis of scanning electrochemical microscopy data
//!
//! This library reads the export files of SECM instruments from several
//! vendors into a common record form, normalizes them into plot-ready traces
//! and provides the analysis helpers used to interpret approach curves,
//! transients and voltammograms.
//!
//! ## Module Structure
//!
//! - [`parsers`] - Vendor file readers (HEKA, Biologic, CH Instruments, Sensolytics, PAR, SECMx)
//! - [`normalize`] - Column selection, calibration, background correction, smoothing, edge detection
//! - [`options`] - Processing options for the normalizer
//! - [`trace`] - The normalized 1D trace
//! - [`grid`] - 2D current maps from area scans
//! - [`analysis`] - Feedback theory, curve fitting, chronoamperometry and voltammetry helpers
//! - [`export`] - Tab-separated and JSON output
//! - [`units`] - Unit recognition and conversion
//! - [`error`] / [`warning`] - Failure kinds and non-fatal diagnostics
//! - [`math`] - Small numeric helpers shared by the pipeline

pub mod analysis;
pub mod error;
pub mod export;
pub mod grid;
pub mod math;
pub mod normalize;
pub mod options;
pub mod parsers;
pub mod trace;
pub mod units;
pub mod warning;

pub use error::{FluxError, Result};
pub use grid::{CurrentMap, Reference};
pub use normalize::normalize;
pub use options::{ProcessingOptions, ZeroDistance};
pub use parsers::{read, Experiment, FileFormat, FormatHint, RawRecord, Vendor};
pub use trace::{Axis, Trace};
pub use warning::{Outcome, Warning};
