//! # Image warping primitives
//!
//! Both warps here fill every destination pixel by looking up the source image (inverse
//! mapping), so that no holes appear in the output.

use crate::error::{Error, Result};
use crate::field::{DenseVectorField, TriangulatedField};
use crate::triangulation::orient;
use image::{GrayImage, Luma};
use nalgebra as na;

/// Policy for source lookups that land outside of the image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub enum Boundary {
    /// Use the closest edge pixel.
    Clamp,
    /// Use a fixed intensity.
    Constant(u8),
}

impl Default for Boundary {
    fn default() -> Self {
        Self::Clamp
    }
}

fn pixel(image: &GrayImage, x: i64, y: i64, boundary: Boundary) -> f64 {
    let (w, h) = (image.width() as i64, image.height() as i64);

    let (x, y) = match boundary {
        Boundary::Clamp => (x.clamp(0, w - 1), y.clamp(0, h - 1)),
        Boundary::Constant(v) => {
            if x < 0 || y < 0 || x >= w || y >= h {
                return v as f64;
            }
            (x, y)
        }
    };

    image.get_pixel(x as u32, y as u32)[0] as f64
}

/// Sample an image at sub-pixel coordinates using bilinear interpolation.
///
/// Pixel centres lie on integer coordinates.
///
/// # Arguments
///
/// * `image` - the image to sample. Must not be empty.
/// * `x` - horizontal coordinate.
/// * `y` - vertical coordinate.
/// * `boundary` - policy for pixels outside the image.
pub fn sample_bilinear(image: &GrayImage, x: f64, y: f64, boundary: Boundary) -> f64 {
    if !x.is_finite() || !y.is_finite() {
        return pixel(image, -1, -1, boundary);
    }

    // Every tap is outside the image beyond this band, for both policies.
    let x = x.clamp(-2.0, image.width() as f64 + 1.0);
    let y = y.clamp(-2.0, image.height() as f64 + 1.0);

    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let (ix, iy) = (x0 as i64, y0 as i64);

    let p00 = pixel(image, ix, iy, boundary);
    let p01 = pixel(image, ix + 1, iy, boundary);
    let p10 = pixel(image, ix, iy + 1, boundary);
    let p11 = pixel(image, ix + 1, iy + 1, boundary);

    let top = p00 + (p01 - p00) * fx;
    let bottom = p10 + (p11 - p10) * fx;

    top + (bottom - top) * fy
}

/// Convert an interpolated intensity back to 8 bits.
pub fn to_u8(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Warp an image through a dense field.
///
/// Every output pixel `p` is sampled from `image` at `p - scale * field(p)`.
///
/// The field must have the same dimensions as the image.
pub fn warp_dense(
    image: &GrayImage,
    field: &DenseVectorField,
    scale: f64,
    boundary: Boundary,
) -> GrayImage {
    let (w, h) = field.dim();

    GrayImage::from_fn(w as u32, h as u32, |x, y| {
        let motion = field.get_motion(x as usize, y as usize) * scale;
        let v = sample_bilinear(
            image,
            x as f64 - motion.x,
            y as f64 - motion.y,
            boundary,
        );
        Luma([to_u8(v)])
    })
}

/// Signed double area of a triangle.
///
/// Fails with [`Error::DegenerateGeometry`] if the triangle has no usable area.
pub fn triangle_area(tri: &[na::Point2<f64>; 3]) -> Result<f64> {
    let area = orient(&tri[0], &tri[1], &tri[2]);

    if area.abs() <= f64::EPSILON || !area.is_finite() {
        return Err(Error::DegenerateGeometry(format!(
            "triangle {:?} {:?} {:?} has area {area}",
            tri[0].coords.as_slice(),
            tri[1].coords.as_slice(),
            tri[2].coords.as_slice()
        )));
    }

    Ok(area)
}

/// Warp an image through a triangulated sparse field.
///
/// Every triangle of the mesh is moved so that its vertices end up at `position + scale *
/// motion`, and the source triangle's contents are mapped onto it. Output pixels not covered by
/// any moved triangle keep their value from `image`.
///
/// Returns the warped image together with the number of skipped zero-area triangles.
pub fn warp_mesh(
    image: &GrayImage,
    field: &TriangulatedField,
    scale: f64,
    boundary: Boundary,
) -> (GrayImage, usize) {
    let mut out = image.clone();
    let (w, h) = (image.width() as i64, image.height() as i64);
    let mut degenerate = 0;

    for tri in field.triangles() {
        let src = tri.map(|(p, _)| p);
        let dst = tri.map(|(p, m)| p + m * scale);

        let area = match triangle_area(&dst) {
            Ok(area) => area,
            Err(_) => {
                degenerate += 1;
                continue;
            }
        };

        let inv_area = 1.0 / area;

        let min = dst.iter().fold(na::Point2::new(f64::MAX, f64::MAX), |a, p| {
            na::Point2::new(a.x.min(p.x), a.y.min(p.y))
        });
        let max = dst.iter().fold(na::Point2::new(f64::MIN, f64::MIN), |a, p| {
            na::Point2::new(a.x.max(p.x), a.y.max(p.y))
        });

        let (x0, x1) = ((min.x.ceil() as i64).max(0), (max.x.floor() as i64).min(w - 1));
        let (y0, y1) = ((min.y.ceil() as i64).max(0), (max.y.floor() as i64).min(h - 1));

        // Small tolerance so that pixels exactly on shared edges are not lost.
        let tol = -1e-9;

        for y in y0..=y1 {
            for x in x0..=x1 {
                let p = na::Point2::new(x as f64, y as f64);

                let w0 = orient(&dst[1], &dst[2], &p) * inv_area;
                let w1 = orient(&dst[2], &dst[0], &p) * inv_area;
                let w2 = 1.0 - w0 - w1;

                if w0 < tol || w1 < tol || w2 < tol {
                    continue;
                }

                let s = src[0].coords * w0 + src[1].coords * w1 + src[2].coords * w2;

                let v = sample_bilinear(image, s.x, s.y, boundary);
                out.put_pixel(x as u32, y as u32, Luma([to_u8(v)]));
            }
        }
    }

    if degenerate > 0 {
        log::debug!("skipped {degenerate} degenerate triangles");
    }

    (out, degenerate)
}

/// Blend two equally sized images, `(1 - t) * a + t * b`.
///
/// # Panics
///
/// If image dimensions differ.
pub fn cross_dissolve(a: &GrayImage, b: &GrayImage, t: f64) -> GrayImage {
    assert_eq!(a.dimensions(), b.dimensions());

    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        let va = a.get_pixel(x, y)[0] as f64;
        let vb = b.get_pixel(x, y)[0] as f64;
        Luma([to_u8((1.0 - t) * va + t * vb)])
    })
}
