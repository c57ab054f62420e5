//! Typed tensors and the NumPy wire format they cross the host boundary in.
//!
//! A single tensor travels as a `.npy` blob; a list of tensors travels as an
//! `.npz` archive whose entries are named `arr_0.npy`, `arr_1.npy`, ... in
//! list order, which is what `numpy.savez(file, *arrays)` produces.

use std::io::{Cursor, Read, Write};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use ndarray::{ArrayD, IxDyn, ShapeBuilder};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::error::AdapterError;

const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";
// local file header or, for an empty archive, end of central directory
const ZIP_MAGIC: &[u8; 2] = b"PK";
const HEADER_ALIGNMENT: usize = 64;

/// Fills a freshly allocated vector from the data section in the given byte order.
macro_rules! read_elements {
    ($data:expr, $count:expr, $big_endian:expr, $ty:ty, $method:ident) => {{
        let mut values: Vec<$ty> = vec![<$ty>::default(); $count];
        let mut reader: &[u8] = $data;
        let result = if $big_endian {
            reader.$method::<BigEndian>(&mut values)
        } else {
            reader.$method::<LittleEndian>(&mut values)
        };
        result
            .map(|_| values)
            .map_err(|e| AdapterError::CodecError(format!("Failed to read tensor data: {}", e)))
    }};
}

/// An n-dimensional numeric array with an explicit element type.
#[derive(Debug, Clone, PartialEq)]
pub enum NdArray {
    Int64(ArrayD<i64>),
    Int32(ArrayD<i32>),
    Float32(ArrayD<f32>),
    Float64(ArrayD<f64>),
}

impl From<ArrayD<i64>> for NdArray {
    fn from(array: ArrayD<i64>) -> Self {
        NdArray::Int64(array)
    }
}

impl From<ArrayD<i32>> for NdArray {
    fn from(array: ArrayD<i32>) -> Self {
        NdArray::Int32(array)
    }
}

impl From<ArrayD<f32>> for NdArray {
    fn from(array: ArrayD<f32>) -> Self {
        NdArray::Float32(array)
    }
}

impl From<ArrayD<f64>> for NdArray {
    fn from(array: ArrayD<f64>) -> Self {
        NdArray::Float64(array)
    }
}

impl NdArray {
    pub fn shape(&self) -> &[usize] {
        match self {
            NdArray::Int64(a) => a.shape(),
            NdArray::Int32(a) => a.shape(),
            NdArray::Float32(a) => a.shape(),
            NdArray::Float64(a) => a.shape(),
        }
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// NumPy type descriptor this array is written with.
    pub fn descr(&self) -> &'static str {
        match self {
            NdArray::Int64(_) => "<i8",
            NdArray::Int32(_) => "<i4",
            NdArray::Float32(_) => "<f4",
            NdArray::Float64(_) => "<f8",
        }
    }

    /// Checks that the array has exactly `rank` dimensions.
    ///
    /// `expected` describes the required layout in the resulting `ShapeError`.
    pub fn ensure_rank(&self, rank: usize, expected: &str) -> Result<(), AdapterError> {
        if self.ndim() != rank {
            return Err(AdapterError::shape(expected, self.shape()));
        }
        Ok(())
    }

    /// Serializes the array as a version 1.0 `.npy` blob (little-endian, C order).
    pub fn to_npy(&self) -> Vec<u8> {
        let mut header = format!(
            "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
            self.descr(),
            shape_literal(self.shape())
        );
        // magic + version + u16 length prefix, then the header ends in '\n'
        let unpadded = NPY_MAGIC.len() + 2 + 2 + header.len() + 1;
        let padding = (HEADER_ALIGNMENT - unpadded % HEADER_ALIGNMENT) % HEADER_ALIGNMENT;
        header.push_str(&" ".repeat(padding));
        header.push('\n');

        let item_size = match self {
            NdArray::Int64(_) | NdArray::Float64(_) => 8,
            NdArray::Int32(_) | NdArray::Float32(_) => 4,
        };
        let mut out = Vec::with_capacity(10 + header.len() + self.len() * item_size);
        out.extend_from_slice(NPY_MAGIC);
        out.extend_from_slice(&[1, 0]);
        out.extend_from_slice(&(header.len() as u16).to_le_bytes());
        out.extend_from_slice(header.as_bytes());

        // iter() walks logical row-major order whatever the memory layout
        match self {
            NdArray::Int64(a) => a.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
            NdArray::Int32(a) => a.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
            NdArray::Float32(a) => a.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
            NdArray::Float64(a) => a.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
        }
        out
    }

    /// Parses a `.npy` blob.
    ///
    /// # Errors
    /// - `CodecError` if the magic string, header or element type is invalid
    /// - `CodecError` if the data section is shorter than the shape requires
    pub fn from_npy(bytes: &[u8]) -> Result<Self, AdapterError> {
        if bytes.len() < 10 || !is_npy(bytes) {
            return Err(AdapterError::CodecError("Missing .npy magic string".into()));
        }

        let (header_len, offset) = match bytes[6] {
            1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
            2 | 3 => {
                if bytes.len() < 12 {
                    return Err(AdapterError::CodecError("Truncated .npy header".into()));
                }
                (u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize, 12)
            }
            major => {
                return Err(AdapterError::CodecError(format!(
                    "Unsupported .npy format version {}.{}",
                    major, bytes[7]
                )))
            }
        };

        let data_start = offset + header_len;
        if bytes.len() < data_start {
            return Err(AdapterError::CodecError("Truncated .npy header".into()));
        }
        let header = std::str::from_utf8(&bytes[offset..data_start])
            .map_err(|e| AdapterError::CodecError(format!("Header is not valid text: {}", e)))?;
        let header = NpyHeader::parse(header)?;

        let (count, needed) = header
            .shape
            .iter()
            .try_fold(1usize, |count, &dim| count.checked_mul(dim))
            .and_then(|count| Some((count, count.checked_mul(header.item_size)?)))
            .ok_or_else(|| AdapterError::CodecError(format!("Shape {:?} is too large", header.shape)))?;
        let data = &bytes[data_start..];
        if data.len() < needed {
            return Err(AdapterError::CodecError(format!(
                "Data section holds {} bytes, shape {:?} needs {}",
                data.len(),
                header.shape,
                needed
            )));
        }
        let data = &data[..needed];

        let array = match header.kind {
            ElementKind::Int64 => NdArray::Int64(header.build(read_elements!(data, count, header.big_endian, i64, read_i64_into)?)?),
            ElementKind::Int32 => NdArray::Int32(header.build(read_elements!(data, count, header.big_endian, i32, read_i32_into)?)?),
            ElementKind::Float32 => NdArray::Float32(header.build(read_elements!(data, count, header.big_endian, f32, read_f32_into)?)?),
            ElementKind::Float64 => NdArray::Float64(header.build(read_elements!(data, count, header.big_endian, f64, read_f64_into)?)?),
        };
        Ok(array)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementKind {
    Int64,
    Int32,
    Float32,
    Float64,
}

#[derive(Debug)]
struct NpyHeader {
    kind: ElementKind,
    item_size: usize,
    big_endian: bool,
    fortran_order: bool,
    shape: Vec<usize>,
}

impl NpyHeader {
    fn parse(header: &str) -> Result<Self, AdapterError> {
        let descr = dict_value(header, "descr")
            .and_then(quoted)
            .ok_or_else(|| AdapterError::CodecError(format!("Header has no descr: {}", header.trim())))?;
        let fortran_order = dict_value(header, "fortran_order")
            .map(|v| v.starts_with("True"))
            .ok_or_else(|| AdapterError::CodecError("Header has no fortran_order".into()))?;
        let shape = dict_value(header, "shape")
            .ok_or_else(|| AdapterError::CodecError("Header has no shape".into()))
            .and_then(parse_shape)?;

        let mut chars = descr.chars();
        let big_endian = match chars.next() {
            Some('<' | '=' | '|') => false,
            Some('>') => true,
            _ => return Err(AdapterError::CodecError(format!("Unsupported dtype '{}'", descr))),
        };
        let code = chars.as_str();
        let (kind, item_size) = match code {
            "i8" => (ElementKind::Int64, 8),
            "i4" => (ElementKind::Int32, 4),
            "f4" => (ElementKind::Float32, 4),
            "f8" => (ElementKind::Float64, 8),
            _ => return Err(AdapterError::CodecError(format!("Unsupported dtype '{}'", descr))),
        };

        Ok(Self {
            kind,
            item_size,
            big_endian,
            fortran_order,
            shape,
        })
    }

    fn build<T>(&self, values: Vec<T>) -> Result<ArrayD<T>, AdapterError> {
        let dim = IxDyn(&self.shape);
        let array = if self.fortran_order {
            ArrayD::from_shape_vec(dim.f(), values)
        } else {
            ArrayD::from_shape_vec(dim, values)
        };
        array.map_err(|e| AdapterError::CodecError(format!("Invalid shape {:?}: {}", self.shape, e)))
    }
}

/// Returns the text following `'key':` in a header dict literal.
fn dict_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    ["'", "\""].iter().find_map(|q| {
        let needle = format!("{q}{key}{q}");
        let start = header.find(&needle)? + needle.len();
        let rest = header[start..].trim_start();
        Some(rest.strip_prefix(':')?.trim_start())
    })
}

fn quoted(value: &str) -> Option<&str> {
    let quote = value.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let inner = &value[1..];
    inner.find(quote).map(|end| &inner[..end])
}

fn parse_shape(value: &str) -> Result<Vec<usize>, AdapterError> {
    let inner = value
        .strip_prefix('(')
        .and_then(|v| v.find(')').map(|end| &v[..end]))
        .ok_or_else(|| AdapterError::CodecError(format!("Malformed shape: {}", value)))?;
    inner
        .split(',')
        .map(str::trim)
        .filter(|dim| !dim.is_empty())
        .map(|dim| {
            dim.trim_end_matches('L')
                .parse::<usize>()
                .map_err(|_| AdapterError::CodecError(format!("Malformed shape dimension '{}'", dim)))
        })
        .collect()
}

fn shape_literal(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [n] => format!("({},)", n),
        dims => format!(
            "({})",
            dims.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
        ),
    }
}

/// Whether `bytes` starts like a single `.npy` blob rather than an archive.
pub fn is_npy(bytes: &[u8]) -> bool {
    bytes.starts_with(NPY_MAGIC)
}

pub fn is_npz(bytes: &[u8]) -> bool {
    bytes.starts_with(ZIP_MAGIC)
}

/// Packs a list of arrays into an `.npz` archive, one stored entry per array.
///
/// Entries carry a fixed timestamp so the same arrays always produce the
/// same bytes.
pub fn to_npz(arrays: &[NdArray]) -> Result<Vec<u8>, AdapterError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .last_modified_time(DateTime::default());

    for (i, array) in arrays.iter().enumerate() {
        zip.start_file(format!("arr_{}.npy", i), options)?;
        zip.write_all(&array.to_npy())?;
    }

    Ok(zip.finish()?.into_inner())
}

/// Unpacks an `.npz` archive.
///
/// Entries named `arr_<n>` come first, ordered by `n`; any other entries
/// follow in archive order.
pub fn from_npz(bytes: &[u8]) -> Result<Vec<NdArray>, AdapterError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let key = entry_order(file.name(), i);
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        entries.push((key, NdArray::from_npy(&buf)?));
    }

    entries.sort_by_key(|(key, _)| *key);
    Ok(entries.into_iter().map(|(_, array)| array).collect())
}

fn entry_order(name: &str, position: usize) -> (u8, usize) {
    name.trim_end_matches(".npy")
        .strip_prefix("arr_")
        .and_then(|n| n.parse::<usize>().ok())
        .map(|n| (0, n))
        .unwrap_or((1, position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array};

    #[test]
    fn test_npy_header_is_aligned() {
        let array = NdArray::from(arr2(&[[101i64, 7, 102]]).into_dyn());
        let bytes = array.to_npy();
        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!((10 + header_len) % HEADER_ALIGNMENT, 0);
        assert_eq!(bytes[10 + header_len - 1], b'\n');
        assert_eq!(bytes.len(), 10 + header_len + 3 * 8);

        let header = std::str::from_utf8(&bytes[10..10 + header_len]).unwrap();
        assert!(header.starts_with("{'descr': '<i8', 'fortran_order': False, 'shape': (1, 3), }"));
    }

    #[test]
    fn test_npy_decodes_vector_and_scalar_shapes() {
        let vector = NdArray::from(Array::from_vec(vec![1.5f64, -2.0]).into_dyn());
        assert_eq!(NdArray::from_npy(&vector.to_npy()).unwrap(), vector);

        let scalar = NdArray::from(ArrayD::from_elem(IxDyn(&[]), 3i32));
        let decoded = NdArray::from_npy(&scalar.to_npy()).unwrap();
        assert_eq!(decoded.shape(), &[] as &[usize]);
        assert_eq!(decoded, scalar);
    }

    fn handmade_npy(descr: &str, fortran: bool, shape: &str, data: &[u8]) -> Vec<u8> {
        let header = format!(
            "{{'descr': '{}', 'fortran_order': {}, 'shape': {}, }}\n",
            descr,
            if fortran { "True" } else { "False" },
            shape
        );
        let mut bytes = NPY_MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 0]);
        bytes.extend_from_slice(&(header.len() as u16).to_le_bytes());
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(data);
        bytes
    }

    #[test]
    fn test_npy_big_endian_and_fortran_order() {
        let data: Vec<u8> = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]
            .iter()
            .flat_map(|v| v.to_be_bytes())
            .collect();
        let bytes = handmade_npy(">f4", true, "(2, 3)", &data);
        let decoded = NdArray::from_npy(&bytes).unwrap();
        // column-major data: first column is [1, 2]
        assert_eq!(decoded, NdArray::from(arr2(&[[1.0f32, 3.0, 5.0], [2.0, 4.0, 6.0]]).into_dyn()));
    }

    #[test]
    fn test_npy_rejects_bad_input() {
        assert!(matches!(NdArray::from_npy(b"not numpy"), Err(AdapterError::CodecError(_))));

        let bool_array = handmade_npy("|b1", false, "(2,)", &[1, 0]);
        assert!(matches!(NdArray::from_npy(&bool_array), Err(AdapterError::CodecError(_))));

        let short = handmade_npy("<f4", false, "(4,)", &[0u8; 8]);
        assert!(matches!(NdArray::from_npy(&short), Err(AdapterError::CodecError(_))));
    }

    #[test]
    fn test_npz_keeps_list_order() {
        let ids = NdArray::from(arr2(&[[2i64, 4, 5, 3]]).into_dyn());
        let mask = NdArray::from(arr2(&[[1i64, 1, 1, 1]]).into_dyn());
        let bytes = to_npz(&[ids.clone(), mask.clone()]).unwrap();
        assert!(is_npz(&bytes));

        let decoded = from_npz(&bytes).unwrap();
        assert_eq!(decoded, vec![ids, mask]);
    }

    #[test]
    fn test_npz_orders_by_index_not_archive_position() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, value) in [("arr_10.npy", 10i32), ("arr_2.npy", 2), ("extra.npy", 99)] {
            zip.start_file(name, options).unwrap();
            let array = NdArray::from(ArrayD::from_elem(IxDyn(&[1]), value));
            zip.write_all(&array.to_npy()).unwrap();
        }
        let bytes = zip.finish().unwrap().into_inner();

        let values: Vec<i32> = from_npz(&bytes)
            .unwrap()
            .into_iter()
            .map(|a| match a {
                NdArray::Int32(a) => a[[0]],
                other => panic!("unexpected dtype {}", other.descr()),
            })
            .collect();
        assert_eq!(values, vec![2, 10, 99]);
    }

    #[test]
    fn test_npz_is_deterministic() {
        let scores = NdArray::from(arr2(&[[0.1f32, 0.9]]).into_dyn());
        assert_eq!(
            to_npz(&[scores.clone()]).unwrap(),
            to_npz(&[scores]).unwrap()
        );
    }

    #[test]
    fn test_npy_rejects_malformed_descr() {
        for descr in ["", "\u{e9}f4"] {
            let bytes = handmade_npy(descr, false, "(1, 2)", &[0u8; 8]);
            assert!(
                matches!(NdArray::from_npy(&bytes), Err(AdapterError::CodecError(_))),
                "descr {:?} should be rejected",
                descr
            );
        }
    }

    #[test]
    fn test_npy_rejects_oversized_shape() {
        let bytes = handmade_npy("<f8", false, "(4294967296, 4294967296, 4294967296)", &[]);
        assert!(matches!(NdArray::from_npy(&bytes), Err(AdapterError::CodecError(_))));
    }

    #[test]
    fn test_ensure_rank() {
        let rank3 = NdArray::from(ArrayD::<f32>::zeros(IxDyn(&[1, 2, 3])));
        assert!(rank3.ensure_rank(3, "rank 3 tensor").is_ok());
        match rank3.ensure_rank(2, "rank 2 tensor") {
            Err(AdapterError::ShapeError { actual, .. }) => assert_eq!(actual, vec![1, 2, 3]),
            other => panic!("expected shape error, got {:?}", other),
        }
    }
}
