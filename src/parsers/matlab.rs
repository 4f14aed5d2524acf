//! MATLAB Level 5 MAT-file reader.
//!
//! Only what instrument exports need: numeric 2D matrices, uncompressed or
//! wrapped in zlib `miCOMPRESSED` elements. Format structure:
//! - Header: 116 bytes descriptive text, 8 bytes subsystem offset,
//!   2 bytes version, 2 bytes endian indicator (`IM` little, `MI` big)
//! - Data elements: 8 byte tag (type + size) followed by the payload,
//!   padded to 8 bytes. Small elements pack type, size and up to 4 payload
//!   bytes into the tag itself.
//! - `miMATRIX` payloads hold sub-elements: array flags, dimensions, name,
//!   real part (and an ignored imaginary part).

use flate2::read::ZlibDecoder;
use std::io::Read;

use super::text::decode_text;
use crate::error::{FluxError, Result};

const HEADER_LEN: usize = 128;

/// MAT data element types
const MI_INT8: u32 = 1;
const MI_UINT8: u32 = 2;
const MI_INT16: u32 = 3;
const MI_UINT16: u32 = 4;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_SINGLE: u32 = 7;
const MI_DOUBLE: u32 = 9;
const MI_INT64: u32 = 12;
const MI_UINT64: u32 = 13;
const MI_MATRIX: u32 = 14;
const MI_COMPRESSED: u32 = 15;

/// Array classes holding plain numbers (mxDOUBLE_CLASS ..= mxUINT64_CLASS)
const NUMERIC_CLASSES: std::ops::RangeInclusive<u32> = 6..=15;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn u32(&self, bytes: &[u8], offset: usize) -> Option<u32> {
        let raw: [u8; 4] = bytes.get(offset..offset + 4)?.try_into().ok()?;
        Some(match self {
            ByteOrder::Little => u32::from_le_bytes(raw),
            ByteOrder::Big => u32::from_be_bytes(raw),
        })
    }
}

/// A numeric matrix stored in column-major order
#[derive(Clone, Debug, PartialEq)]
pub struct Variable {
    pub name: String,
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl Variable {
    /// Samples of one matrix column
    pub fn column(&self, index: usize) -> Option<&[f64]> {
        if index >= self.cols {
            return None;
        }
        self.data.get(index * self.rows..(index + 1) * self.rows)
    }
}

/// Parsed MAT file
#[derive(Clone, Debug, Default)]
pub struct MatFile {
    /// Descriptive header text
    pub header: String,
    /// Numeric variables in file order
    pub variables: Vec<Variable>,
    /// Number of non-numeric variables that were skipped
    pub skipped: usize,
}

/// Parse a Level 5 MAT file
pub fn parse(bytes: &[u8]) -> Result<MatFile> {
    if bytes.len() < HEADER_LEN {
        return Err(FluxError::malformed("file too short for a MAT header"));
    }

    let header = decode_text(&bytes[..116])
        .trim_end_matches(|c: char| c == '\0' || c == ' ')
        .to_string();
    if header.starts_with("MATLAB 7.3") {
        return Err(FluxError::UnsupportedFormat(
            "MATLAB 7.3 (HDF5) MAT files".to_string(),
        ));
    }
    if !header.starts_with("MATLAB 5.0") {
        return Err(FluxError::malformed("missing MATLAB 5.0 MAT-file header"));
    }

    let order = match &bytes[126..128] {
        b"IM" => ByteOrder::Little,
        b"MI" => ByteOrder::Big,
        _ => return Err(FluxError::malformed("invalid MAT endian indicator")),
    };

    let mut mat = MatFile {
        header,
        ..MatFile::default()
    };
    parse_elements(&bytes[HEADER_LEN..], order, &mut mat)?;
    Ok(mat)
}

/// One data element: type, payload and offset of the next element
struct Element<'a> {
    kind: u32,
    payload: &'a [u8],
    next: usize,
}

fn next_element(data: &[u8], offset: usize, order: ByteOrder) -> Result<Option<Element<'_>>> {
    // Trailing padding shorter than a tag ends the stream
    if data.len().saturating_sub(offset) < 8 {
        return Ok(None);
    }
    let truncated = || FluxError::malformed(format!("truncated MAT element at byte {}", offset));

    let first = order.u32(data, offset).ok_or_else(truncated)?;
    if first >> 16 != 0 {
        let size = (first >> 16) as usize;
        if size > 4 {
            return Err(truncated());
        }
        return Ok(Some(Element {
            kind: first & 0xffff,
            payload: &data[offset + 4..offset + 4 + size],
            next: offset + 8,
        }));
    }

    let size = order.u32(data, offset + 4).ok_or_else(truncated)? as usize;
    let start = offset + 8;
    let payload = data.get(start..start + size).ok_or_else(truncated)?;
    // Compressed elements are not padded
    let advance = if first == MI_COMPRESSED {
        size
    } else {
        size.div_ceil(8) * 8
    };

    Ok(Some(Element {
        kind: first,
        payload,
        next: start + advance,
    }))
}

fn parse_elements(data: &[u8], order: ByteOrder, mat: &mut MatFile) -> Result<()> {
    let mut offset = 0;
    while let Some(element) = next_element(data, offset, order)? {
        match element.kind {
            MI_COMPRESSED => {
                let mut inflated = Vec::new();
                ZlibDecoder::new(element.payload)
                    .read_to_end(&mut inflated)
                    .map_err(|e| FluxError::malformed(format!("corrupt compressed MAT element: {}", e)))?;
                parse_elements(&inflated, order, mat)?;
            }
            MI_MATRIX => match parse_matrix(element.payload, order)? {
                Some(variable) => mat.variables.push(variable),
                None => mat.skipped += 1,
            },
            other => {
                tracing::debug!("Skipping MAT element of type {}", other);
            }
        }
        offset = element.next;
    }
    Ok(())
}

/// Decode a `miMATRIX` payload, `None` for non-numeric arrays
fn parse_matrix(payload: &[u8], order: ByteOrder) -> Result<Option<Variable>> {
    let missing = |what: &str| FluxError::malformed(format!("MAT matrix without {}", what));

    let flags = next_element(payload, 0, order)?.ok_or_else(|| missing("array flags"))?;
    let class = order.u32(flags.payload, 0).ok_or_else(|| missing("array flags"))? & 0xff;

    let dims = next_element(payload, flags.next, order)?.ok_or_else(|| missing("dimensions"))?;
    let dimensions = numeric(dims.kind, dims.payload, order).ok_or_else(|| missing("dimensions"))?;

    let name = next_element(payload, dims.next, order)?.ok_or_else(|| missing("a name"))?;
    let name_text = decode_text(name.payload).into_owned();

    if !NUMERIC_CLASSES.contains(&class) {
        tracing::debug!("Skipping non-numeric MAT variable '{}' (class {})", name_text, class);
        return Ok(None);
    }

    let (rows, cols) = shape(&dimensions).ok_or_else(|| {
        FluxError::malformed(format!("MAT variable '{}' has invalid dimensions", name_text))
    })?;

    let real = next_element(payload, name.next, order)?.ok_or_else(|| missing("real part"))?;
    let data = numeric(real.kind, real.payload, order).ok_or_else(|| {
        FluxError::malformed(format!(
            "MAT variable '{}' uses unsupported data type {}",
            name_text, real.kind
        ))
    })?;

    if Some(data.len()) != rows.checked_mul(cols) {
        return Err(FluxError::malformed(format!(
            "MAT variable '{}' declares {}x{} but holds {} values",
            name_text,
            rows,
            cols,
            data.len()
        )));
    }

    Ok(Some(Variable {
        name: name_text,
        rows,
        cols,
        data,
    }))
}

/// `(rows, cols)` of a dimensions element; trailing dimensions fold into
/// the column count. `None` for negative, fractional or overflowing sizes.
fn shape(dimensions: &[f64]) -> Option<(usize, usize)> {
    let mut sizes = dimensions.iter().map(|&d| {
        if d.is_finite() && d >= 0.0 && d.fract() == 0.0 && d <= u32::MAX as f64 {
            Some(d as usize)
        } else {
            None
        }
    });
    let rows = sizes.next().unwrap_or(Some(0))?;
    let cols = sizes.try_fold(1usize, |acc, d| acc.checked_mul(d?))?;
    rows.checked_mul(cols)?;
    Some((rows, cols))
}

fn chunks<const N: usize>(bytes: &[u8], convert: impl Fn([u8; N]) -> f64) -> Vec<f64> {
    bytes
        .chunks_exact(N)
        .map(|chunk| {
            let mut raw = [0u8; N];
            raw.copy_from_slice(chunk);
            convert(raw)
        })
        .collect()
}

/// Convert a numeric element payload to `f64`s
fn numeric(kind: u32, bytes: &[u8], order: ByteOrder) -> Option<Vec<f64>> {
    let little = order == ByteOrder::Little;
    let values = match kind {
        MI_INT8 => bytes.iter().map(|&b| b as i8 as f64).collect(),
        MI_UINT8 => bytes.iter().map(|&b| b as f64).collect(),
        MI_INT16 => chunks::<2>(bytes, |b| {
            (if little { i16::from_le_bytes(b) } else { i16::from_be_bytes(b) }) as f64
        }),
        MI_UINT16 => chunks::<2>(bytes, |b| {
            (if little { u16::from_le_bytes(b) } else { u16::from_be_bytes(b) }) as f64
        }),
        MI_INT32 => chunks::<4>(bytes, |b| {
            (if little { i32::from_le_bytes(b) } else { i32::from_be_bytes(b) }) as f64
        }),
        MI_UINT32 => chunks::<4>(bytes, |b| {
            (if little { u32::from_le_bytes(b) } else { u32::from_be_bytes(b) }) as f64
        }),
        MI_SINGLE => chunks::<4>(bytes, |b| {
            (if little { f32::from_le_bytes(b) } else { f32::from_be_bytes(b) }) as f64
        }),
        MI_DOUBLE => chunks::<8>(bytes, |b| {
            if little {
                f64::from_le_bytes(b)
            } else {
                f64::from_be_bytes(b)
            }
        }),
        MI_INT64 => chunks::<8>(bytes, |b| {
            (if little { i64::from_le_bytes(b) } else { i64::from_be_bytes(b) }) as f64
        }),
        MI_UINT64 => chunks::<8>(bytes, |b| {
            (if little { u64::from_le_bytes(b) } else { u64::from_be_bytes(b) }) as f64
        }),
        _ => return None,
    };
    Some(values)
}

/// Builders for little-endian MAT files used by the decoder tests
#[cfg(test)]
pub(crate) mod fixture {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn element(kind: u32, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&kind.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        while out.len() % 8 != 0 {
            out.push(0);
        }
        out
    }

    /// A double matrix element, `columns` given column by column
    pub(crate) fn matrix(name: &str, columns: &[&[f64]]) -> Vec<u8> {
        let rows = columns.first().map_or(0, |c| c.len());
        let values: Vec<f64> = columns.iter().flat_map(|c| c.iter().copied()).collect();
        shaped(name, &[rows as i32, columns.len() as i32], &values)
    }

    /// A double matrix element with explicit (possibly inconsistent) dimensions
    pub(crate) fn shaped(name: &str, dimensions: &[i32], values: &[f64]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend(element(6, &[6u8, 0, 0, 0, 0, 0, 0, 0]));
        let dims: Vec<u8> = dimensions.iter().flat_map(|d| d.to_le_bytes()).collect();
        body.extend(element(5, &dims));
        body.extend(element(1, name.as_bytes()));
        let real: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        body.extend(element(9, &real));
        element(14, &body)
    }

    /// Wrap an element in a zlib `miCOMPRESSED` element
    pub(crate) fn compressed(inner: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(inner).unwrap();
        let packed = encoder.finish().unwrap();
        let mut out = Vec::new();
        out.extend_from_slice(&15u32.to_le_bytes());
        out.extend_from_slice(&(packed.len() as u32).to_le_bytes());
        out.extend_from_slice(&packed);
        out
    }

    /// A complete file: header followed by `elements`
    pub(crate) fn file(elements: &[Vec<u8>]) -> Vec<u8> {
        let mut out = format!("{:<116}", "MATLAB 5.0 MAT-file, Platform: test").into_bytes();
        out.extend_from_slice(&[0u8; 8]);
        out.extend_from_slice(&0x0100u16.to_le_bytes());
        out.extend_from_slice(b"IM");
        for element in elements {
            out.extend_from_slice(element);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_double_matrix() {
        let bytes = fixture::file(&[fixture::matrix("Trace_1_1_1_1", &[&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]])]);
        let mat = parse(&bytes).unwrap();

        assert!(mat.header.starts_with("MATLAB 5.0"));
        assert_eq!(mat.variables.len(), 1);
        let var = &mat.variables[0];
        assert_eq!(var.name, "Trace_1_1_1_1");
        assert_eq!((var.rows, var.cols), (3, 2));
        assert_eq!(var.column(0).unwrap(), &[1.0, 2.0, 3.0]);
        assert_eq!(var.column(1).unwrap(), &[4.0, 5.0, 6.0]);
        assert!(var.column(2).is_none());
    }

    #[test]
    fn test_parse_compressed_matrix() {
        let inner = fixture::matrix("Trace_1_1_2_1", &[&[0.5, 1.5], &[2.5, 3.5]]);
        let bytes = fixture::file(&[fixture::compressed(&inner)]);
        let mat = parse(&bytes).unwrap();

        assert_eq!(mat.variables.len(), 1);
        assert_eq!(mat.variables[0].column(1).unwrap(), &[2.5, 3.5]);
    }

    #[test]
    fn test_rejects_non_mat() {
        let err = parse(&[0u8; 200]).unwrap_err();
        assert!(matches!(err, FluxError::MalformedFile(_)));

        let mut v73 = format!("{:<116}", "MATLAB 7.3 MAT-file").into_bytes();
        v73.extend_from_slice(&[0u8; 12]);
        let err = parse(&v73).unwrap_err();
        assert!(matches!(err, FluxError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_rejects_oversized_dimensions() {
        let huge = fixture::file(&[fixture::shaped("Trace_1_1_1_1", &[i32::MAX; 4], &[1.0])]);
        assert!(matches!(parse(&huge), Err(FluxError::MalformedFile(_))));

        let negative = fixture::file(&[fixture::shaped("Trace_1_1_1_1", &[-1, 2], &[1.0, 2.0])]);
        assert!(matches!(parse(&negative), Err(FluxError::MalformedFile(_))));

        let mismatched = fixture::file(&[fixture::shaped("Trace_1_1_1_1", &[2, 2], &[1.0])]);
        assert!(matches!(parse(&mismatched), Err(FluxError::MalformedFile(_))));
    }

    #[test]
    fn test_truncated_element() {
        let mut bytes = fixture::file(&[fixture::matrix("Trace_1_1_1_1", &[&[1.0], &[2.0]])]);
        bytes.truncate(bytes.len() - 12);
        assert!(matches!(parse(&bytes), Err(FluxError::MalformedFile(_))));
    }
}
