//! # Bidirectional diffusion motion extractor
//!
//! Computes forward and backward fields at the same time. Each field is updated with a
//! linearised brightness constancy step followed by smoothing, where neighbours are weighted by
//! how consistent the two fields are with each other. This keeps occluded or otherwise
//! inconsistent areas from bleeding into their surroundings.

use nalgebra as na;
use ofsynth::prelude::v1::*;
use ofsynth::pyramid;

/// Treatment of the flow outside of the image during smoothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoundaryCondition {
    /// Flow outside is a copy of the nearest edge flow.
    Neumann,
    /// Flow outside is zero.
    Dirichlet,
}

impl BoundaryCondition {
    /// Map the numeric code used on the command line.
    ///
    /// `1` is Neumann, `2` is Dirichlet, anything else is rejected.
    pub fn from_code(code: usize) -> Result<Self> {
        match code {
            1 => Ok(Self::Neumann),
            2 => Ok(Self::Dirichlet),
            c => Err(Error::config(format!("unknown boundary condition {c}"))),
        }
    }

    pub fn code(self) -> usize {
        match self {
            Self::Neumann => 1,
            Self::Dirichlet => 2,
        }
    }
}

#[derive(Clone)]
struct Flow {
    u: Plane,
    v: Plane,
}

impl Flow {
    fn zeros(w: usize, h: usize) -> Self {
        Self {
            u: Plane::zeros(w, h),
            v: Plane::zeros(w, h),
        }
    }

    fn dim(&self) -> (usize, usize) {
        self.u.dim()
    }

    fn get(&self, x: usize, y: usize) -> na::Vector2<f64> {
        na::Vector2::new(self.u.get(x, y), self.v.get(x, y))
    }

    fn sample(&self, p: na::Point2<f64>) -> na::Vector2<f64> {
        na::Vector2::new(self.u.sample(p.x, p.y), self.v.sample(p.x, p.y))
    }

    fn resize(&self, w: usize, h: usize) -> Self {
        let factor = w as f64 / self.u.width() as f64;
        Self {
            u: self.u.resize(w, h, factor),
            v: self.v.resize(w, h, factor),
        }
    }

    /// Per-pixel agreement with the opposite field, in `(0; 1]`.
    fn consistency(&self, other: &Flow) -> Plane {
        let (w, h) = self.dim();
        Plane::from_fn(w, h, |x, y| {
            let m = self.get(x, y);
            let p = na::Point2::new(x as f64, y as f64) + m;
            let e = m + other.sample(p);
            1.0 / (1.0 + e.norm_squared())
        })
    }
}

/// Per-level inputs of a single direction.
struct Level<'a> {
    src: &'a Plane,
    dst: &'a Plane,
    gx: &'a Plane,
    gy: &'a Plane,
}

/// Proesmans-style dense extractor.
///
/// The single quality channel holds the forward/backward consistency of the returned field.
#[derive(Clone, Debug)]
pub struct Proesmans {
    iterations: usize,
    lambda: f64,
    levels: usize,
    boundary_condition: usize,
}

impl Default for Proesmans {
    fn default() -> Self {
        Self {
            iterations: 200,
            lambda: 100.0,
            levels: 4,
            boundary_condition: BoundaryCondition::Neumann.code(),
        }
    }
}

impl Properties for Proesmans {
    fn props_mut(&mut self) -> Vec<(&str, PropertyMut)> {
        vec![
            ("iterations", PropertyMut::usize(&mut self.iterations, 1, 10000)),
            ("lambda", PropertyMut::float(&mut self.lambda, 0.001, 100000.0)),
            ("levels", PropertyMut::usize(&mut self.levels, 1, 10)),
            (
                "boundary-condition",
                PropertyMut::usize(&mut self.boundary_condition, 1, 2),
            ),
        ]
    }
}

impl Proesmans {
    pub fn iterations(self, iterations: usize) -> Self {
        Self { iterations, ..self }
    }

    /// Smoothness weight.
    pub fn lambda(self, lambda: f64) -> Self {
        Self { lambda, ..self }
    }

    pub fn levels(self, levels: usize) -> Self {
        Self { levels, ..self }
    }

    /// Set the boundary condition by its numeric code.
    pub fn boundary_condition(self, code: usize) -> Result<Self> {
        BoundaryCondition::from_code(code)?;
        Ok(Self {
            boundary_condition: code,
            ..self
        })
    }

    /// Weighted average of the 4-neighbourhood.
    fn neighbour_mean(
        flow: &Flow,
        weights: &Plane,
        x: usize,
        y: usize,
        bc: BoundaryCondition,
    ) -> na::Vector2<f64> {
        let (w, h) = flow.dim();
        let (mut sum, mut total) = (na::Vector2::zeros(), 0.0);

        for (dx, dy) in [(-1isize, 0isize), (1, 0), (0, -1), (0, 1)] {
            let (nx, ny) = (x as isize + dx, y as isize + dy);
            let inside = nx >= 0 && ny >= 0 && nx < w as isize && ny < h as isize;

            if inside {
                let (nx, ny) = (nx as usize, ny as usize);
                let c = weights.get(nx, ny);
                sum += flow.get(nx, ny) * c;
                total += c;
            } else {
                match bc {
                    BoundaryCondition::Neumann => {
                        let c = weights.get(x, y);
                        sum += flow.get(x, y) * c;
                        total += c;
                    }
                    BoundaryCondition::Dirichlet => total += 1.0,
                }
            }
        }

        if total > f64::EPSILON {
            sum / total
        } else {
            flow.get(x, y)
        }
    }

    /// Single diffusion step of one direction.
    fn step(&self, level: &Level, flow: &Flow, weights: &Plane, bc: BoundaryCondition) -> Flow {
        let (w, h) = flow.dim();
        let mut out = Flow::zeros(w, h);

        for y in 0..h {
            for x in 0..w {
                let m = flow.get(x, y);
                let (px, py) = (x as f64 + m.x, y as f64 + m.y);

                let it = level.dst.sample(px, py) - level.src.get(x, y);
                let ix = level.gx.sample(px, py);
                let iy = level.gy.sample(px, py);

                let mean = Self::neighbour_mean(flow, weights, x, y, bc);

                let r = it + ix * (mean.x - m.x) + iy * (mean.y - m.y);
                let k = r / (self.lambda + ix * ix + iy * iy);

                out.u.set(x, y, mean.x - ix * k);
                out.v.set(x, y, mean.y - iy * k);
            }
        }

        out
    }

    /// Compute both the forward (`image1` to `image2`) and backward fields.
    pub fn compute_bidirectional(
        &mut self,
        image1: &GrayImage,
        image2: &GrayImage,
    ) -> Result<(DenseVectorField, DenseVectorField)> {
        let bc = BoundaryCondition::from_code(self.boundary_condition)?;

        let dim1 = (image1.width() as usize, image1.height() as usize);
        let dim2 = (image2.width() as usize, image2.height() as usize);

        if dim1 != dim2 {
            return Err(Error::DimensionMismatch {
                expected: dim1,
                found: dim2,
            });
        }

        let p1 = pyramid::build(Plane::from_gray(image1, 1.0), self.levels);
        let p2 = pyramid::build(Plane::from_gray(image2, 1.0), self.levels);

        let (cw, ch) = p1[p1.len() - 1].dim();
        let mut forward = Flow::zeros(cw, ch);
        let mut backward = Flow::zeros(cw, ch);

        for (level, (i1, i2)) in p1.iter().zip(&p2).enumerate().rev() {
            let (w, h) = i1.dim();

            if forward.dim() != (w, h) {
                forward = forward.resize(w, h);
                backward = backward.resize(w, h);
            }

            let (g1x, g1y) = i1.gradients();
            let (g2x, g2y) = i2.gradients();

            let fwd = Level {
                src: i1,
                dst: i2,
                gx: &g2x,
                gy: &g2y,
            };

            let bwd = Level {
                src: i2,
                dst: i1,
                gx: &g1x,
                gy: &g1y,
            };

            for _ in 0..self.iterations {
                let cf = forward.consistency(&backward);
                let cb = backward.consistency(&forward);
                forward = self.step(&fwd, &forward, &cf, bc);
                backward = self.step(&bwd, &backward, &cb, bc);
            }

            log::debug!("level {level} ({w}x{h}) done");
        }

        let cf = forward.consistency(&backward);
        let cb = backward.consistency(&forward);

        Ok((
            to_field(&forward, &cf).with_direction(Direction::Forward),
            to_field(&backward, &cb).with_direction(Direction::Backward),
        ))
    }
}

fn to_field(flow: &Flow, consistency: &Plane) -> DenseVectorField {
    let (w, h) = flow.dim();
    let mut field = DenseVectorField::new(w, h, 1);

    for y in 0..h {
        for x in 0..w {
            field.set_motion(x, y, flow.get(x, y));
            field.set_quality(0, x, y, consistency.get(x, y));
        }
    }

    field
}

impl DenseExtractor for Proesmans {
    fn compute(&mut self, image1: &GrayImage, image2: &GrayImage) -> Result<DenseVectorField> {
        self.compute_bidirectional(image1, image2)
            .map(|(forward, _)| forward)
    }

    fn quality_channel_count(&self) -> usize {
        1
    }
}
