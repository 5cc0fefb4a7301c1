//! Raster image input and output.

use crate::error::{Error, Result};
use crate::field::DenseVectorField;
use crate::serialize::{header_u32, read_payload, read_u32};
use image::{DynamicImage, GrayImage};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Load an image in any format the `image` crate can decode.
///
/// All failures, missing files included, are reported as [`Error::InputFormat`].
pub fn load_image(path: impl AsRef<Path>) -> Result<DynamicImage> {
    let path = path.as_ref();

    let image = image::open(path)
        .map_err(|e| Error::format(format!("unable to load {}: {e}", path.display())))?;

    log::debug!(
        "loaded {} ({}x{}, {:?})",
        path.display(),
        image.width(),
        image.height(),
        image.color()
    );

    Ok(image)
}

/// Save an 8-bit raster, format is chosen by the extension.
pub fn save_image(image: impl Into<DynamicImage>, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    image.into().save(path)?;
    log::debug!("saved {}", path.display());
    Ok(())
}

/// Map values to 8 bits so that their histogram becomes flat.
///
/// Equal values map to equal outputs, and the order of values is kept. Non-finite values are
/// ordered as by [`f64::total_cmp`].
pub fn equalize(values: &[f64]) -> Vec<u8> {
    if values.is_empty() {
        return vec![];
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let last = (sorted.len() - 1).max(1) as f64;

    values
        .iter()
        .map(|v| {
            let rank = sorted.partition_point(|s| s.total_cmp(v).is_lt());
            (rank as f64 / last * 255.0).round() as u8
        })
        .collect()
}

/// Render quality channel `k` of a field as an equalized grayscale image.
pub fn quality_image(field: &DenseVectorField, k: usize) -> Result<GrayImage> {
    let plane = quality_plane(field, k)?;
    let (w, h) = field.dim();

    GrayImage::from_raw(w as u32, h as u32, equalize(plane))
        .ok_or_else(|| Error::format("quality plane does not match field size"))
}

/// Save quality channel `k` of a field as an equalized 8-bit image.
pub fn save_quality_channel(
    field: &DenseVectorField,
    k: usize,
    path: impl AsRef<Path>,
) -> Result<()> {
    save_image(quality_image(field, k)?, path)
}

fn quality_plane(field: &DenseVectorField, k: usize) -> Result<&[f64]> {
    if k >= field.quality_channels() {
        return Err(Error::config(format!(
            "quality channel {k} requested, field has {}",
            field.quality_channels()
        )));
    }

    Ok(field.channel(crate::field::MOTION_CHANNELS + k))
}

/// Write quality channel `k` of a field without any loss.
///
/// The layout is a little-endian `u32` width and height, followed by `width * height` `f64`
/// values in row-major order.
pub fn write_quality_raw(field: &DenseVectorField, k: usize, writer: &mut impl Write) -> Result<()> {
    let plane = quality_plane(field, k)?;
    let (w, h) = field.dim();

    writer.write_all(&header_u32(w, "width")?.to_le_bytes())?;
    writer.write_all(&header_u32(h, "height")?.to_le_bytes())?;

    for v in plane {
        writer.write_all(&v.to_le_bytes())?;
    }

    Ok(())
}

/// Read a plane written by [`write_quality_raw`], as `(width, height, values)`.
pub fn read_quality_raw(reader: &mut impl Read) -> Result<(usize, usize, Vec<f64>)> {
    let width = read_u32(reader)? as usize;
    let height = read_u32(reader)? as usize;

    let count = width
        .checked_mul(height)
        .ok_or_else(|| Error::format("quality plane header overflows"))?;

    Ok((width, height, read_payload(reader, count)?))
}

pub fn save_quality_raw(field: &DenseVectorField, k: usize, path: impl AsRef<Path>) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_quality_raw(field, k, &mut out)?;
    out.flush()?;
    Ok(())
}

pub fn load_quality_raw(path: impl AsRef<Path>) -> Result<(usize, usize, Vec<f64>)> {
    read_quality_raw(&mut BufReader::new(File::open(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn equalize_spreads_values() {
        assert_eq!(equalize(&[0.1, 1000.0, 0.2, 0.3]), vec![0, 255, 85, 170]);
        assert_eq!(equalize(&[5.0, 5.0, 5.0]), vec![0, 0, 0]);
        assert_eq!(equalize(&[1.0, 1.0, 2.0]), vec![0, 0, 255]);
        assert_eq!(equalize(&[3.0]), vec![0]);
        assert!(equalize(&[]).is_empty());
    }

    #[test]
    fn quality_channel_dump() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quality0.png");

        let mut field = DenseVectorField::new(3, 2, 1);
        for (i, (x, y)) in [(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)]
            .into_iter()
            .enumerate()
        {
            field.set_quality(0, x, y, i as f64 * i as f64);
        }

        save_quality_channel(&field, 0, &path).unwrap();

        let loaded = load_image(&path).unwrap().to_luma8();
        assert_eq!(loaded.dimensions(), (3, 2));
        assert_eq!(loaded.get_pixel(0, 0), &Luma([0]));
        assert_eq!(loaded.get_pixel(2, 1), &Luma([255]));
        assert_eq!(loaded.get_pixel(2, 0), &Luma([102]));

        assert!(matches!(
            save_quality_channel(&field, 1, &path),
            Err(Error::UnsupportedConfiguration(_))
        ));
    }

    #[test]
    fn raw_quality_keeps_every_bit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quality2.raw");

        let values = [
            1.0 / 3.0,
            -0.0,
            f64::MIN_POSITIVE / 4.0,
            f64::MAX,
            f64::INFINITY,
            1e-300,
        ];
        let mut field = DenseVectorField::new(3, 2, 2);
        for (i, v) in values.iter().enumerate() {
            field.set_quality(1, i % 3, i / 3, *v);
            field.set_quality(0, i % 3, i / 3, 7.0);
        }

        save_quality_raw(&field, 1, &path).unwrap();
        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            8 + 6 * std::mem::size_of::<f64>() as u64
        );

        let (w, h, loaded) = load_quality_raw(&path).unwrap();
        assert_eq!((w, h), (3, 2));
        assert_eq!(
            loaded.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
            values.iter().map(|v| v.to_bits()).collect::<Vec<_>>()
        );

        assert!(matches!(
            save_quality_raw(&field, 2, &path),
            Err(Error::UnsupportedConfiguration(_))
        ));
    }

    #[test]
    fn raw_quality_rejects_short_payload() {
        let mut field = DenseVectorField::new(2, 2, 1);
        field.set_quality(0, 1, 1, 0.5);

        let mut bytes = vec![];
        write_quality_raw(&field, 0, &mut bytes).unwrap();
        bytes.pop();

        assert!(matches!(
            read_quality_raw(&mut bytes.as_slice()),
            Err(Error::InputFormat(_))
        ));
    }

    #[test]
    fn missing_file_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_image(dir.path().join("nope.png")),
            Err(Error::InputFormat(_))
        ));
    }
}
