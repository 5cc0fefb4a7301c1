//! # Binary motion field containers
//!
//! Two uncompressed, little-endian formats are supported:
//!
//! * Dense (`.pdvm`) - `width: u32`, `height: u32`, `channels: u32`, followed by
//!   `width * height * channels` `f64` values in planar order (see
//!   [`DenseVectorField::as_slice`]).
//! * Sparse (`.psvm`) - `count: u32`, followed by `count` groups of 4 `f64` values:
//!   `source x`, `source y`, `dx`, `dy`.
//!
//! Triangulation is never stored. Loaded sparse fields always need to be triangulated again.

use crate::error::{Error, Result};
use crate::field::{DenseVectorField, SparseVectorField, MOTION_CHANNELS};
use nalgebra as na;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Extension of dense field containers.
pub const DENSE_EXTENSION: &str = "pdvm";
/// Extension of sparse field containers.
pub const SPARSE_EXTENSION: &str = "psvm";

const F64_SIZE: usize = std::mem::size_of::<f64>();

pub(crate) fn read_u32(reader: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; std::mem::size_of::<u32>()];
    reader
        .read_exact(&mut buf)
        .map_err(|e| Error::format(format!("truncated header: {e}")))?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn header_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::config(format!("{what} {value} does not fit a u32")))
}

/// Read exactly `count` floats, failing if there are less or more left in the stream.
pub(crate) fn read_payload(reader: &mut impl Read, count: usize) -> Result<Vec<f64>> {
    let len = count
        .checked_mul(F64_SIZE)
        .ok_or_else(|| Error::format("payload size overflows"))?;

    let mut bytes = vec![];
    (&mut *reader).take(len as u64).read_to_end(&mut bytes)?;

    if bytes.len() != len {
        return Err(Error::format(format!(
            "payload holds {} bytes, header declares {len}",
            bytes.len()
        )));
    }

    let mut rest = [0u8; 1];
    if reader.read(&mut rest)? != 0 {
        return Err(Error::format(format!(
            "payload is longer than the {len} bytes the header declares"
        )));
    }

    Ok(bytes
        .chunks_exact(F64_SIZE)
        .map(|c| {
            let mut b = [0u8; F64_SIZE];
            b.copy_from_slice(c);
            f64::from_le_bytes(b)
        })
        .collect())
}

/// Write a dense field container.
pub fn write_dense(field: &DenseVectorField, writer: &mut impl Write) -> Result<()> {
    let (w, h) = field.dim();

    writer.write_all(&header_u32(w, "width")?.to_le_bytes())?;
    writer.write_all(&header_u32(h, "height")?.to_le_bytes())?;
    writer.write_all(&header_u32(field.channels(), "channel count")?.to_le_bytes())?;

    for v in field.as_slice() {
        writer.write_all(&v.to_le_bytes())?;
    }

    Ok(())
}

/// Read a dense field container.
///
/// The resulting field has no direction attached.
pub fn read_dense(reader: &mut impl Read) -> Result<DenseVectorField> {
    let width = read_u32(reader)? as usize;
    let height = read_u32(reader)? as usize;
    let channels = read_u32(reader)? as usize;

    if width == 0 || height == 0 || channels == 0 {
        return Err(Error::format(format!(
            "empty dense field header {width}x{height}x{channels}"
        )));
    }

    if channels < MOTION_CHANNELS {
        return Err(Error::format(format!(
            "dense field declares {channels} channels, at least {MOTION_CHANNELS} needed"
        )));
    }

    let count = width
        .checked_mul(height)
        .and_then(|c| c.checked_mul(channels))
        .ok_or_else(|| Error::format("dense field header overflows"))?;

    let data = read_payload(reader, count)?;

    DenseVectorField::from_planar(width, height, channels, data)
}

/// Write a sparse field container.
///
/// Only the correspondences are stored, never the mesh.
pub fn write_sparse(field: &SparseVectorField, writer: &mut impl Write) -> Result<()> {
    writer.write_all(&header_u32(field.len(), "point count")?.to_le_bytes())?;

    for v in field
        .entries()
        .iter()
        .flat_map(|(p, m)| [p.x, p.y, m.x, m.y])
    {
        writer.write_all(&v.to_le_bytes())?;
    }

    Ok(())
}

/// Read a sparse field container.
///
/// The resulting field is untriangulated and has no direction attached.
pub fn read_sparse(reader: &mut impl Read) -> Result<SparseVectorField> {
    let count = read_u32(reader)? as usize;

    let count4 = count
        .checked_mul(4)
        .ok_or_else(|| Error::format("sparse field header overflows"))?;

    let data = read_payload(reader, count4)?;

    Ok(data
        .chunks_exact(4)
        .map(|v| (na::Point2::new(v[0], v[1]), na::Vector2::new(v[2], v[3])))
        .collect())
}

pub fn save_dense(field: &DenseVectorField, path: impl AsRef<Path>) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_dense(field, &mut out)?;
    out.flush()?;
    Ok(())
}

pub fn load_dense(path: impl AsRef<Path>) -> Result<DenseVectorField> {
    read_dense(&mut BufReader::new(File::open(path)?))
}

pub fn save_sparse(field: &SparseVectorField, path: impl AsRef<Path>) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_sparse(field, &mut out)?;
    out.flush()?;
    Ok(())
}

pub fn load_sparse(path: impl AsRef<Path>) -> Result<SparseVectorField> {
    read_sparse(&mut BufReader::new(File::open(path)?))
}
