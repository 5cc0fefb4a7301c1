//! # Lucas-Kanade motion extractors
//!
//! [`LucasKanade`] computes a dense field by solving the optical flow constraint over a window
//! around every pixel, coarse to fine. [`Klt`] picks well-textured corners and tracks each of
//! them individually, producing a sparse field.

use nalgebra as na;
use ofsynth::prelude::v1::*;
use ofsynth::pyramid;

pub mod klt;

pub use klt::Klt;

/// Solve the 2x2 system `[a b; b c] * d = -[bx by]`.
///
/// Returns `None` if the system is singular.
pub(crate) fn solve(a: f64, b: f64, c: f64, bx: f64, by: f64) -> Option<(f64, f64)> {
    let det = a * c - b * b;

    if det.abs() <= f64::EPSILON || !det.is_finite() {
        return None;
    }

    Some((-(c * bx - b * by) / det, -(a * by - b * bx) / det))
}

/// Smallest eigenvalue of the symmetric matrix `[a b; b c]`.
pub(crate) fn min_eigenvalue(a: f64, b: f64, c: f64) -> f64 {
    let half_trace = (a + c) * 0.5;
    let half_diff = (a - c) * 0.5;
    half_trace - (half_diff * half_diff + b * b).sqrt()
}

/// Dense pyramidal Lucas-Kanade extractor.
///
/// Intensities are processed in their 8-bit range. The single quality channel holds the
/// smallest eigenvalue of the window structure tensor, divided by the window area.
#[derive(Clone, Debug)]
pub struct LucasKanade {
    levels: usize,
    window_radius: usize,
    iterations: usize,
    tau: f64,
    sigma_p: f64,
}

impl Default for LucasKanade {
    fn default() -> Self {
        Self {
            levels: 4,
            window_radius: 16,
            iterations: 5,
            tau: 0.0025,
            sigma_p: 0.0,
        }
    }
}

impl Properties for LucasKanade {
    fn props_mut(&mut self) -> Vec<(&str, PropertyMut)> {
        vec![
            ("levels", PropertyMut::usize(&mut self.levels, 1, 10)),
            (
                "window-radius",
                PropertyMut::usize(&mut self.window_radius, 1, 64),
            ),
            ("iterations", PropertyMut::usize(&mut self.iterations, 1, 100)),
            ("tau", PropertyMut::float(&mut self.tau, 0.0, 1000.0)),
            ("sigma-p", PropertyMut::float(&mut self.sigma_p, 0.0, 1000.0)),
        ]
    }
}

impl LucasKanade {
    pub fn levels(self, levels: usize) -> Self {
        Self { levels, ..self }
    }

    pub fn window_radius(self, window_radius: usize) -> Self {
        Self {
            window_radius,
            ..self
        }
    }

    pub fn iterations(self, iterations: usize) -> Self {
        Self { iterations, ..self }
    }

    /// Structure tensors with a smaller normalised eigenvalue do not update the flow.
    pub fn tau(self, tau: f64) -> Self {
        Self { tau, ..self }
    }

    /// Tikhonov regulariser added to the structure tensor diagonal.
    pub fn sigma_p(self, sigma_p: f64) -> Self {
        Self { sigma_p, ..self }
    }
}

impl DenseExtractor for LucasKanade {
    fn compute(&mut self, image1: &GrayImage, image2: &GrayImage) -> Result<DenseVectorField> {
        let p1 = pyramid::build(Plane::from_gray(image1, 1.0), self.levels);
        let p2 = pyramid::build(Plane::from_gray(image2, 1.0), self.levels);

        let radius = self.window_radius;

        let (cw, ch) = p1[p1.len() - 1].dim();
        let mut u = Plane::zeros(cw, ch);
        let mut v = Plane::zeros(cw, ch);
        let mut quality = Plane::zeros(cw, ch);

        for (level, (i1, i2)) in p1.iter().zip(&p2).enumerate().rev() {
            let (w, h) = i1.dim();

            if u.dim() != (w, h) {
                let factor = w as f64 / u.width() as f64;
                u = u.resize(w, h, factor);
                v = v.resize(w, h, factor);
            }

            let (gx, gy) = i1.gradients();
            let area = Plane::from_fn(w, h, |_, _| 1.0).window_sum(radius);
            let sxx = gx.mul(&gx).window_sum(radius);
            let sxy = gx.mul(&gy).window_sum(radius);
            let syy = gy.mul(&gy).window_sum(radius);

            quality = Plane::from_fn(w, h, |x, y| {
                min_eigenvalue(sxx.get(x, y), sxy.get(x, y), syy.get(x, y)) / area.get(x, y)
            });

            let mut updated = 0;

            for _ in 0..self.iterations {
                let it = Plane::from_fn(w, h, |x, y| {
                    let (fx, fy) = (x as f64 + u.get(x, y), y as f64 + v.get(x, y));
                    i2.sample(fx, fy) - i1.get(x, y)
                });

                let bx = gx.mul(&it).window_sum(radius);
                let by = gy.mul(&it).window_sum(radius);

                updated = 0;

                for y in 0..h {
                    for x in 0..w {
                        if quality.get(x, y) < self.tau {
                            continue;
                        }

                        let a = sxx.get(x, y) + self.sigma_p;
                        let c = syy.get(x, y) + self.sigma_p;

                        if let Some((du, dv)) =
                            solve(a, sxy.get(x, y), c, bx.get(x, y), by.get(x, y))
                        {
                            u.set(x, y, u.get(x, y) + du);
                            v.set(x, y, v.get(x, y) + dv);
                            updated += 1;
                        }
                    }
                }
            }

            log::debug!("level {level} ({w}x{h}): {updated} pixels updated");
        }

        let (w, h) = u.dim();
        let mut field = DenseVectorField::new(w, h, 1);

        for y in 0..h {
            for x in 0..w {
                field.set_motion(x, y, na::Vector2::new(u.get(x, y), v.get(x, y)));
                field.set_quality(0, x, y, quality.get(x, y));
            }
        }

        Ok(field.with_direction(Direction::Forward))
    }

    fn quality_channel_count(&self) -> usize {
        1
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn pattern(w: u32, h: u32, ox: f64, oy: f64) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            let (x, y) = (x as f64 - ox, y as f64 - oy);
            let v = 128.0
                + 60.0 * (x * std::f64::consts::TAU / 24.0).sin()
                + 50.0 * (y * std::f64::consts::TAU / 20.0).cos();
            Luma([v.round() as u8])
        })
    }

    pub fn mean_motion(field: &DenseVectorField, from: usize, to: usize) -> (f64, f64) {
        let (mut sx, mut sy, mut n) = (0.0, 0.0, 0.0);
        for y in from..to {
            for x in from..to {
                let m = field.get_motion(x, y);
                sx += m.x;
                sy += m.y;
                n += 1.0;
            }
        }
        (sx / n, sy / n)
    }

    #[test]
    fn solves_symmetric_system() {
        let (dx, dy) = solve(2.0, 1.0, 3.0, -4.0, -7.0).unwrap();
        assert!((2.0 * dx + dy - 4.0).abs() < 1e-12);
        assert!((dx + 3.0 * dy - 7.0).abs() < 1e-12);
        assert!(solve(1.0, 1.0, 1.0, 1.0, 1.0).is_none());
        assert!((min_eigenvalue(3.0, 0.0, 1.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn still_pair_has_no_motion() {
        let image = pattern(32, 32, 0.0, 0.0);
        let field = LucasKanade::default()
            .levels(2)
            .compute(&image, &image)
            .unwrap();

        assert_eq!(field.dim(), (32, 32));
        assert_eq!(field.quality_channels(), 1);
        assert_eq!(field.max_magnitude(), 0.0);
        assert!(field.get_quality(0, 16, 16) > 0.0);
    }

    #[test]
    fn flat_images_are_left_alone() {
        let image = GrayImage::from_pixel(20, 20, Luma([90]));
        let other = GrayImage::from_pixel(20, 20, Luma([120]));
        let field = LucasKanade::default().compute(&image, &other).unwrap();
        assert_eq!(field.max_magnitude(), 0.0);
        assert_eq!(field.get_quality(0, 10, 10), 0.0);
    }

    #[test]
    fn recovers_translation() {
        let image1 = pattern(48, 48, 0.0, 0.0);
        let image2 = pattern(48, 48, 1.5, 1.0);

        let field = LucasKanade::default()
            .levels(2)
            .window_radius(6)
            .iterations(8)
            .compute(&image1, &image2)
            .unwrap();

        assert_eq!(field.direction(), Some(Direction::Forward));

        let (mx, my) = mean_motion(&field, 12, 36);
        assert!((mx - 1.5).abs() < 0.2, "{mx}");
        assert!((my - 1.0).abs() < 0.2, "{my}");
    }

    #[test]
    fn properties_are_bounded() {
        let mut lk = LucasKanade::default();
        lk.set_prop_str("window-radius", "8").unwrap();
        assert_eq!(lk.window_radius, 8);
        assert!(lk.set_prop_str("levels", "0").is_err());
        assert!(lk.set_prop_str("tau", "-1").is_err());
    }
}
