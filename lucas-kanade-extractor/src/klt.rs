//! # Sparse feature tracking
//!
//! Shi-Tomasi corners are selected in the first image and tracked into the second one using
//! pyramidal Lucas-Kanade, one window per feature.

use crate::{min_eigenvalue, solve};
use nalgebra as na;
use ofsynth::prelude::v1::*;
use ofsynth::pyramid;

/// Radius of the structure tensor window used for corner scoring.
const CORNER_RADIUS: usize = 2;

/// Windows whose normalised smallest eigenvalue is below this can not be tracked.
const MIN_EIGENVALUE: f64 = 1e-4;

/// Kanade-Lucas-Tomasi sparse extractor.
#[derive(Clone, Debug)]
pub struct Klt {
    levels: usize,
    window_size: usize,
    max_points: usize,
    min_distance: f64,
    quality_level: f64,
    max_iterations: usize,
    epsilon: f64,
}

impl Default for Klt {
    fn default() -> Self {
        Self {
            levels: 4,
            window_size: 40,
            max_points: 1000,
            min_distance: 10.0,
            quality_level: 0.025,
            max_iterations: 10,
            epsilon: 0.001,
        }
    }
}

impl Properties for Klt {
    fn props_mut(&mut self) -> Vec<(&str, PropertyMut)> {
        vec![
            ("levels", PropertyMut::usize(&mut self.levels, 1, 10)),
            ("window-size", PropertyMut::usize(&mut self.window_size, 3, 128)),
            ("max-points", PropertyMut::usize(&mut self.max_points, 1, 100000)),
            (
                "min-distance",
                PropertyMut::float(&mut self.min_distance, 0.0, 1000.0),
            ),
            (
                "quality-level",
                PropertyMut::float(&mut self.quality_level, 0.0, 1.0),
            ),
            (
                "max-iterations",
                PropertyMut::usize(&mut self.max_iterations, 1, 1000),
            ),
            ("epsilon", PropertyMut::float(&mut self.epsilon, 0.0, 10.0)),
        ]
    }
}

impl Klt {
    pub fn levels(self, levels: usize) -> Self {
        Self { levels, ..self }
    }

    pub fn window_size(self, window_size: usize) -> Self {
        Self {
            window_size,
            ..self
        }
    }

    pub fn max_points(self, max_points: usize) -> Self {
        Self { max_points, ..self }
    }

    pub fn min_distance(self, min_distance: f64) -> Self {
        Self {
            min_distance,
            ..self
        }
    }

    pub fn quality_level(self, quality_level: f64) -> Self {
        Self {
            quality_level,
            ..self
        }
    }

    /// Select features worth tracking.
    ///
    /// Returns points sorted by decreasing corner response.
    pub fn select_features(&self, image: &Plane) -> Vec<na::Point2<f64>> {
        let (w, h) = image.dim();
        let (gx, gy) = image.gradients();

        let sxx = gx.mul(&gx).window_sum(CORNER_RADIUS);
        let sxy = gx.mul(&gy).window_sum(CORNER_RADIUS);
        let syy = gy.mul(&gy).window_sum(CORNER_RADIUS);

        let score = Plane::from_fn(w, h, |x, y| {
            min_eigenvalue(sxx.get(x, y), sxy.get(x, y), syy.get(x, y))
        });

        let max = score.as_slice().iter().copied().fold(0.0, f64::max);

        if max <= 0.0 {
            return vec![];
        }

        let threshold = max * self.quality_level;

        let mut candidates = vec![];

        for y in 1..h.saturating_sub(1) {
            for x in 1..w.saturating_sub(1) {
                let s = score.get(x, y);

                if s <= threshold {
                    continue;
                }

                let is_max = (-1..=1)
                    .flat_map(|dy| (-1..=1).map(move |dx| (dx, dy)))
                    .all(|(dx, dy)| score.get_clamped(x as isize + dx, y as isize + dy) <= s);

                if is_max {
                    candidates.push((s, x, y));
                }
            }
        }

        candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then((a.2, a.1).cmp(&(b.2, b.1))));

        let min_dist2 = self.min_distance * self.min_distance;
        let mut points: Vec<na::Point2<f64>> = vec![];

        for (_, x, y) in candidates {
            if points.len() >= self.max_points {
                break;
            }

            let p = na::Point2::new(x as f64, y as f64);

            if points.iter().all(|o| (*o - p).norm_squared() >= min_dist2) {
                points.push(p);
            }
        }

        points
    }

    /// Track a single point through both pyramids.
    ///
    /// Returns the displacement, or `None` if the feature was lost.
    fn track(
        &self,
        point: na::Point2<f64>,
        p1: &[Plane],
        p2: &[Plane],
        gradients: &[(Plane, Plane)],
    ) -> Option<na::Vector2<f64>> {
        let half = (self.window_size / 2) as isize;
        let mut guess = na::Vector2::zeros();

        for level in (0..p1.len()).rev() {
            let scale = (1 << level) as f64;
            let p = point / scale;
            let (i1, i2) = (&p1[level], &p2[level]);
            let (gx, gy) = &gradients[level];

            let window = (-half..=half)
                .flat_map(|wy| (-half..=half).map(move |wx| (wx as f64, wy as f64)))
                .map(|(wx, wy)| {
                    let (x, y) = (p.x + wx, p.y + wy);
                    (wx, wy, i1.sample(x, y), gx.sample(x, y), gy.sample(x, y))
                })
                .collect::<Vec<_>>();

            let (mut a, mut b, mut c) = (0.0, 0.0, 0.0);
            for &(_, _, _, ix, iy) in &window {
                a += ix * ix;
                b += ix * iy;
                c += iy * iy;
            }

            if min_eigenvalue(a, b, c) / (window.len() as f64) < MIN_EIGENVALUE {
                return None;
            }

            let mut delta = na::Vector2::zeros();

            for _ in 0..self.max_iterations {
                let q = p + guess + delta;
                let (mut bx, mut by) = (0.0, 0.0);

                for &(wx, wy, v, ix, iy) in &window {
                    let it = i2.sample(q.x + wx, q.y + wy) - v;
                    bx += ix * it;
                    by += iy * it;
                }

                let (dx, dy) = solve(a, b, c, bx, by)?;
                delta += na::Vector2::new(dx, dy);

                if dx * dx + dy * dy < self.epsilon * self.epsilon {
                    break;
                }
            }

            guess += delta;

            if level > 0 {
                guess *= 2.0;
            }
        }

        let end = point + guess;
        let (w, h) = p1[0].dim();

        if !guess.iter().all(|v| v.is_finite())
            || end.x < 0.0
            || end.y < 0.0
            || end.x > (w - 1) as f64
            || end.y > (h - 1) as f64
        {
            return None;
        }

        Some(guess)
    }
}

impl SparseExtractor for Klt {
    fn compute(&mut self, image1: &GrayImage, image2: &GrayImage) -> Result<SparseVectorField> {
        let p1 = pyramid::build(Plane::from_gray(image1, 1.0), self.levels);
        let p2 = pyramid::build(Plane::from_gray(image2, 1.0), self.levels);
        let gradients = p1.iter().map(Plane::gradients).collect::<Vec<_>>();

        let features = self.select_features(&p1[0]);

        log::info!(
            "selected {} features over {} levels",
            features.len(),
            p1.len()
        );

        let field = features
            .iter()
            .filter_map(|&p| self.track(p, &p1, &p2, &gradients).map(|m| (p, m)))
            .collect::<SparseVectorField>();

        if field.len() < features.len() {
            log::warn!("lost {} of {} tracks", features.len() - field.len(), features.len());
        }

        Ok(field.with_direction(Direction::Forward))
    }
}
