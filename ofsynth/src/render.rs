//! # Motion field visualisation
//!
//! Fields are drawn as arrows on top of a canvas, usually the one produced by the
//! [`Preprocessor`](crate::preprocess::Preprocessor). Arrow hue encodes direction, and
//! brightness encodes magnitude relative to the largest motion in the field.

use crate::error::{Error, Result};
use crate::field::{DenseVectorField, TriangulatedField, VectorField};
use crate::properties::{Properties, PropertyMut};
use image::{Rgb, RgbImage};
use nalgebra as na;

const MESH_COLOUR: Rgb<u8> = Rgb([60, 90, 160]);

/// Arrow renderer.
#[derive(Clone, Copy, Debug)]
pub struct Renderer {
    /// Distance between rendered dense samples, in pixels.
    pub stride: usize,
    /// Arrow length multiplier.
    pub scale: f64,
    /// Draw the mesh of sparse fields underneath the arrows.
    pub draw_mesh: bool,
}

impl Default for Renderer {
    fn default() -> Self {
        Self {
            stride: 10,
            scale: 1.0,
            draw_mesh: false,
        }
    }
}

impl Properties for Renderer {
    fn props_mut(&mut self) -> Vec<(&str, PropertyMut)> {
        vec![
            ("stride", PropertyMut::usize(&mut self.stride, 1, 256)),
            ("scale", PropertyMut::float(&mut self.scale, 0.01, 100.0)),
            ("draw-mesh", PropertyMut::bool(&mut self.draw_mesh)),
        ]
    }
}

/// Convert hue, saturation and value (all in `[0; 1]`) to RGB.
fn hsv(h: f64, s: f64, v: f64) -> Rgb<u8> {
    let h = h.rem_euclid(1.0) * 6.0;
    let sector = h.floor();
    let f = h - sector;

    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    let (r, g, b) = match sector as u8 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    let c = |c: f64| (c * 255.0).round().clamp(0.0, 255.0) as u8;

    Rgb([c(r), c(g), c(b)])
}

/// Colour of a motion vector.
fn motion_colour(motion: na::Vector2<f64>, max_magnitude: f64) -> Rgb<u8> {
    let angle = (motion.x.atan2(motion.y) + std::f64::consts::PI) / std::f64::consts::TAU;
    let rel = if max_magnitude > 0.0 {
        (motion.norm() / max_magnitude).min(1.0)
    } else {
        0.0
    };
    hsv(angle, 1.0, 0.5 + 0.5 * rel)
}

fn put(image: &mut RgbImage, x: i64, y: i64, colour: Rgb<u8>) {
    if x >= 0 && y >= 0 && x < image.width() as i64 && y < image.height() as i64 {
        image.put_pixel(x as u32, y as u32, colour);
    }
}

/// Bresenham line, clipped to the image.
fn line(image: &mut RgbImage, p0: (i64, i64), p1: (i64, i64), colour: Rgb<u8>) {
    let (mut x0, mut y0) = p0;
    let (x1, y1) = p1;

    let dx = (x1 - x0).abs();
    let dy = (y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };

    let mut err = dx - dy;

    loop {
        put(image, x0, y0, colour);

        if x0 == x1 && y0 == y1 {
            break;
        }

        let e2 = 2 * err;

        if e2 > -dy {
            err -= dy;
            x0 += sx;
        }

        if e2 < dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn round(p: na::Point2<f64>) -> Option<(i64, i64)> {
    // Far off points would take forever to rasterize.
    const LIMIT: f64 = 1e6;
    if p.x.abs() < LIMIT && p.y.abs() < LIMIT {
        Some((p.x.round() as i64, p.y.round() as i64))
    } else {
        None
    }
}

impl Renderer {
    fn arrow(
        &self,
        image: &mut RgbImage,
        from: na::Point2<f64>,
        motion: na::Vector2<f64>,
        colour: Rgb<u8>,
    ) {
        let delta = motion * self.scale;
        let to = from + delta;

        let (Some(a), Some(b)) = (round(from), round(to)) else {
            return;
        };

        line(image, a, b, colour);

        let len = delta.norm();

        if len < 2.0 {
            return;
        }

        let head = (len * 0.35).min(5.0);
        let back = -delta / len * head;

        for angle in [0.5f64, -0.5] {
            let side = na::Rotation2::new(angle) * back;
            if let Some(c) = round(to + side) {
                line(image, b, c, colour);
            }
        }
    }

    fn check_canvas(canvas: &RgbImage, dim: (usize, usize)) -> Result<()> {
        let cdim = (canvas.width() as usize, canvas.height() as usize);
        if cdim != dim {
            Err(Error::dimensions(dim, cdim))
        } else {
            Ok(())
        }
    }

    /// Draw a dense field.
    ///
    /// Every `stride`-th cell in both directions gets an arrow. The canvas must match the
    /// field dimensions.
    ///
    /// # Arguments
    ///
    /// * `field` - field to draw.
    /// * `canvas` - background to draw on, left untouched.
    pub fn render_dense(&self, field: &DenseVectorField, canvas: &RgbImage) -> Result<RgbImage> {
        Self::check_canvas(canvas, field.dim())?;

        let stride = self.stride.max(1);
        let max = field.max_magnitude();
        let mut out = canvas.clone();

        let (w, h) = field.dim();

        for y in (stride / 2..h).step_by(stride) {
            for x in (stride / 2..w).step_by(stride) {
                let motion = field.get_motion(x, y);
                let from = na::Point2::new(x as f64, y as f64);
                self.arrow(&mut out, from, motion, motion_colour(motion, max));
            }
        }

        Ok(out)
    }

    /// Draw a triangulated sparse field.
    ///
    /// Every correspondence gets an arrow from its source position to the moved position.
    /// Points outside the canvas are clipped.
    pub fn render_sparse(&self, field: &TriangulatedField, canvas: &RgbImage) -> RgbImage {
        let mut out = canvas.clone();

        if self.draw_mesh {
            let points = field.positions();
            for (a, b) in field.mesh().edges() {
                if let (Some(a), Some(b)) = (round(points[a]), round(points[b])) {
                    line(&mut out, a, b, MESH_COLOUR);
                }
            }
        }

        let max = field
            .entries()
            .iter()
            .map(|(_, m)| m.norm())
            .fold(0.0, f64::max);

        for &(pos, motion) in field.entries() {
            self.arrow(&mut out, pos, motion, motion_colour(motion, max));
        }

        out
    }

    /// Draw any field.
    ///
    /// Sparse fields without a mesh are rejected with [`Error::UseBeforeTriangulation`].
    pub fn render(&self, field: &VectorField, canvas: &RgbImage) -> Result<RgbImage> {
        match field {
            VectorField::Dense(field) => self.render_dense(field, canvas),
            VectorField::Triangulated(field) => Ok(self.render_sparse(field, canvas)),
            VectorField::Sparse(_) => Err(Error::UseBeforeTriangulation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::SparseVectorField;

    fn swirl(w: usize, h: usize) -> DenseVectorField {
        let mut field = DenseVectorField::new(w, h, 0);
        for y in 0..h {
            for x in 0..w {
                let (fx, fy) = (x as f64 - w as f64 / 2.0, y as f64 - h as f64 / 2.0);
                field.set_motion(x, y, na::Vector2::new(-fy, fx) * 0.2);
            }
        }
        field
    }

    fn grey(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([100, 100, 100]))
    }

    #[test]
    fn hsv_primaries() {
        assert_eq!(hsv(0.0, 1.0, 1.0), Rgb([255, 0, 0]));
        assert_eq!(hsv(1.0 / 3.0, 1.0, 1.0), Rgb([0, 255, 0]));
        assert_eq!(hsv(2.0 / 3.0, 1.0, 1.0), Rgb([0, 0, 255]));
        assert_eq!(hsv(0.5, 0.0, 0.5), Rgb([128, 128, 128]));
    }

    #[test]
    fn line_endpoints() {
        let mut image = grey(10, 10);
        let c = Rgb([1, 2, 3]);
        line(&mut image, (1, 1), (8, 4), c);
        assert_eq!(image.get_pixel(1, 1), &c);
        assert_eq!(image.get_pixel(8, 4), &c);
        assert_eq!(image.pixels().filter(|p| **p == c).count(), 8);

        // Clipped, must not panic.
        line(&mut image, (-5, -5), (20, 3), c);
    }

    #[test]
    fn dense_is_deterministic() {
        let field = swirl(64, 48);
        let canvas = grey(64, 48);
        let renderer = Renderer::default();

        let a = renderer.render_dense(&field, &canvas).unwrap();
        let b = renderer.render_dense(&field, &canvas).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, canvas);
        assert_eq!(a.dimensions(), (64, 48));
        // Canvas pixel far from any sample stays as is.
        assert_eq!(a.get_pixel(0, 0), &Rgb([100, 100, 100]));
    }

    #[test]
    fn dense_rejects_wrong_canvas() {
        assert!(matches!(
            Renderer::default().render_dense(&swirl(8, 8), &grey(8, 9)),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn sparse_arrows() {
        let field = [
            (na::Point2::new(2.0, 2.0), na::Vector2::new(6.0, 0.0)),
            (na::Point2::new(2.0, 12.0), na::Vector2::new(0.0, -3.0)),
            (na::Point2::new(14.0, 14.0), na::Vector2::new(0.0, 0.0)),
        ]
        .into_iter()
        .collect::<SparseVectorField>()
        .triangulate();

        let renderer = Renderer {
            draw_mesh: true,
            ..Default::default()
        };
        let out = renderer.render_sparse(&field, &grey(16, 16));

        // Strongest arrow is drawn at full brightness, its tip included.
        let tip = out.get_pixel(8, 2);
        assert_eq!(tip, &motion_colour(na::Vector2::new(6.0, 0.0), 6.0));
        assert_ne!(out.get_pixel(2, 10), &Rgb([100, 100, 100]));

        let sparse = VectorField::from(field.into_inner());
        assert!(matches!(
            renderer.render(&sparse, &grey(16, 16)),
            Err(Error::UseBeforeTriangulation)
        ));
    }
}
