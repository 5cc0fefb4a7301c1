//! # Floating point image planes
//!
//! Helpers shared by motion extractors: single channel `f64` planes, image pyramids, spatial
//! gradients and window sums.

use image::GrayImage;
use nalgebra as na;

/// Levels are not built below this size.
pub const MIN_LEVEL_SIZE: usize = 8;

/// Single channel floating point image.
///
/// Stored as a `height x width` matrix, so that `data[(y, x)]` addresses pixel `(x, y)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Plane {
    data: na::DMatrix<f64>,
}

impl Plane {
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            data: na::DMatrix::zeros(height, width),
        }
    }

    /// Create a plane by evaluating `f(x, y)` at every pixel.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        Self {
            data: na::DMatrix::from_fn(height, width, |y, x| f(x, y)),
        }
    }

    /// Convert an 8-bit image, multiplying every intensity by `scale`.
    pub fn from_gray(image: &GrayImage, scale: f64) -> Self {
        Self::from_fn(image.width() as usize, image.height() as usize, |x, y| {
            image.get_pixel(x as u32, y as u32)[0] as f64 * scale
        })
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn dim(&self) -> (usize, usize) {
        (self.width(), self.height())
    }

    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.data[(y, x)]
    }

    pub fn set(&mut self, x: usize, y: usize, v: f64) {
        self.data[(y, x)] = v;
    }

    /// Get a pixel with coordinates clamped to the plane.
    pub fn get_clamped(&self, x: isize, y: isize) -> f64 {
        let x = x.clamp(0, self.width() as isize - 1) as usize;
        let y = y.clamp(0, self.height() as isize - 1) as usize;
        self.data[(y, x)]
    }

    /// Bilinear sample with edge clamping.
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let x = if x.is_finite() { x } else { 0.0 };
        let y = if y.is_finite() { y } else { 0.0 };

        let x = x.clamp(0.0, (self.width() - 1) as f64);
        let y = y.clamp(0.0, (self.height() - 1) as f64);

        let (x0, y0) = (x.floor(), y.floor());
        let (fx, fy) = (x - x0, y - y0);
        let (ix, iy) = (x0 as isize, y0 as isize);

        let top = self.get_clamped(ix, iy) * (1.0 - fx) + self.get_clamped(ix + 1, iy) * fx;
        let bottom =
            self.get_clamped(ix, iy + 1) * (1.0 - fx) + self.get_clamped(ix + 1, iy + 1) * fx;

        top * (1.0 - fy) + bottom * fy
    }

    /// Central difference gradients, `(d/dx, d/dy)`.
    pub fn gradients(&self) -> (Plane, Plane) {
        let (w, h) = self.dim();
        let gx = Self::from_fn(w, h, |x, y| {
            let (x, y) = (x as isize, y as isize);
            (self.get_clamped(x + 1, y) - self.get_clamped(x - 1, y)) * 0.5
        });
        let gy = Self::from_fn(w, h, |x, y| {
            let (x, y) = (x as isize, y as isize);
            (self.get_clamped(x, y + 1) - self.get_clamped(x, y - 1)) * 0.5
        });
        (gx, gy)
    }

    /// Element-wise product.
    pub fn mul(&self, other: &Plane) -> Plane {
        Self {
            data: self.data.component_mul(&other.data),
        }
    }

    /// Sums over square windows of given radius, clipped to the plane.
    ///
    /// Computed through a summed area table, so the cost does not depend on the radius.
    pub fn window_sum(&self, radius: usize) -> Plane {
        let (w, h) = self.dim();

        let mut table = na::DMatrix::<f64>::zeros(h + 1, w + 1);
        for y in 0..h {
            let mut row = 0.0;
            for x in 0..w {
                row += self.data[(y, x)];
                table[(y + 1, x + 1)] = table[(y, x + 1)] + row;
            }
        }

        Self::from_fn(w, h, |x, y| {
            let x0 = x.saturating_sub(radius);
            let y0 = y.saturating_sub(radius);
            let x1 = (x + radius + 1).min(w);
            let y1 = (y + radius + 1).min(h);
            table[(y1, x1)] - table[(y0, x1)] - table[(y1, x0)] + table[(y0, x0)]
        })
    }

    /// Blur with the 5-tap binomial kernel and drop every other row and column.
    pub fn downsample(&self) -> Plane {
        const KERNEL: [f64; 5] = [1.0 / 16.0, 4.0 / 16.0, 6.0 / 16.0, 4.0 / 16.0, 1.0 / 16.0];

        let (w, h) = self.dim();

        let horizontal = Self::from_fn(w, h, |x, y| {
            KERNEL
                .iter()
                .enumerate()
                .map(|(i, k)| k * self.get_clamped(x as isize + i as isize - 2, y as isize))
                .sum()
        });

        Self::from_fn((w + 1) / 2, (h + 1) / 2, |x, y| {
            KERNEL
                .iter()
                .enumerate()
                .map(|(i, k)| {
                    k * horizontal.get_clamped(2 * x as isize, 2 * y as isize + i as isize - 2)
                })
                .sum()
        })
    }

    /// Resample to given size, scaling values by `factor`.
    ///
    /// Pixel `(x, y)` of the output corresponds to `(x, y) * self.width / width` of the input.
    /// Used to carry flow between pyramid levels.
    pub fn resize(&self, width: usize, height: usize, factor: f64) -> Plane {
        let sx = self.width() as f64 / width as f64;
        let sy = self.height() as f64 / height as f64;
        Self::from_fn(width, height, |x, y| {
            self.sample(x as f64 * sx, y as f64 * sy) * factor
        })
    }

    pub fn as_slice(&self) -> &[f64] {
        self.data.as_slice()
    }
}

/// Build an image pyramid, finest level first.
///
/// At most `levels` levels are produced, fewer if the plane gets smaller than
/// [`MIN_LEVEL_SIZE`].
pub fn build(base: Plane, levels: usize) -> Vec<Plane> {
    let mut pyramid = vec![base];

    while pyramid.len() < levels.max(1) {
        let next = match pyramid.last() {
            Some(p) if p.width() / 2 >= MIN_LEVEL_SIZE && p.height() / 2 >= MIN_LEVEL_SIZE => {
                p.downsample()
            }
            _ => break,
        };
        pyramid.push(next);
    }

    pyramid
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn ramp(w: usize, h: usize) -> Plane {
        Plane::from_fn(w, h, |x, y| x as f64 * 2.0 + y as f64)
    }

    #[test]
    fn sampling_and_gradients() {
        let plane = ramp(10, 6);
        assert_approx_eq!(plane.sample(2.5, 1.5), 6.5);
        assert_approx_eq!(plane.sample(-4.0, 0.0), 0.0);
        assert_approx_eq!(plane.sample(f64::NAN, 0.0), 0.0);

        let (gx, gy) = plane.gradients();
        assert_approx_eq!(gx.get(4, 3), 2.0);
        assert_approx_eq!(gy.get(4, 3), 1.0);
        // One sided at the edge.
        assert_approx_eq!(gx.get(0, 3), 1.0);
    }

    #[test]
    fn window_sums() {
        let ones = Plane::from_fn(7, 5, |_, _| 1.0);
        let sums = ones.window_sum(1);
        assert_approx_eq!(sums.get(3, 2), 9.0);
        assert_approx_eq!(sums.get(0, 0), 4.0);
        assert_approx_eq!(sums.get(6, 4), 4.0);

        let sums = ramp(7, 5).window_sum(0);
        assert_eq!(sums, ramp(7, 5));
    }

    #[test]
    fn pyramid_levels() {
        let pyramid = build(ramp(40, 20), 4);
        let dims = pyramid.iter().map(Plane::dim).collect::<Vec<_>>();
        assert_eq!(dims, vec![(40, 20), (20, 10)]);

        // Linear ramps survive the binomial kernel in the interior.
        assert_approx_eq!(pyramid[1].get(5, 2), ramp(40, 20).get(10, 4));

        let up = pyramid[1].resize(40, 20, 2.0);
        assert_eq!(up.dim(), (40, 20));
        assert_approx_eq!(up.get(10, 4), 2.0 * pyramid[1].get(5, 2));
    }
}
