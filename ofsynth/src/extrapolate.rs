//! # Frame extrapolation
//!
//! Synthesizes frames that continue the motion described by a field, starting from a single
//! image.

use crate::error::{Error, Result};
use crate::field::{DenseVectorField, TriangulatedField, VectorField};
use crate::warp::{self, Boundary};
use image::GrayImage;

/// Time-stepped frame synthesizer.
///
/// Dense fields are applied by inverse warping: output pixel `p` at time `t` is sampled from the
/// base image at `p - t * field(p)`. Sparse fields move their mesh vertices to
/// `position + t * motion` and map the base image's triangles onto the moved ones.
#[derive(Clone, Copy, Debug, Default)]
pub struct Extrapolator {
    boundary: Boundary,
}

impl Extrapolator {
    pub fn new(boundary: Boundary) -> Self {
        Self { boundary }
    }

    pub fn boundary(&self) -> Boundary {
        self.boundary
    }

    /// Extrapolate through a dense field.
    ///
    /// # Arguments
    ///
    /// * `image` - base image at time 0.
    /// * `field` - field of the same size as `image`.
    /// * `steps` - number of frames to produce, at least 1.
    pub fn extrapolate_dense<'a>(
        &self,
        image: &'a GrayImage,
        field: &'a DenseVectorField,
        steps: usize,
    ) -> Result<Frames<'a>> {
        let dim = (image.width() as usize, image.height() as usize);

        if field.dim() != dim {
            return Err(Error::dimensions(dim, field.dim()));
        }

        self.frames(image, FieldRef::Dense(field), steps)
    }

    /// Extrapolate through a triangulated sparse field.
    pub fn extrapolate_sparse<'a>(
        &self,
        image: &'a GrayImage,
        field: &'a TriangulatedField,
        steps: usize,
    ) -> Result<Frames<'a>> {
        self.frames(image, FieldRef::Mesh(field), steps)
    }

    /// Extrapolate through any field.
    ///
    /// Sparse fields without a mesh are rejected with [`Error::UseBeforeTriangulation`].
    pub fn extrapolate<'a>(
        &self,
        image: &'a GrayImage,
        field: &'a VectorField,
        steps: usize,
    ) -> Result<Frames<'a>> {
        match field {
            VectorField::Dense(field) => self.extrapolate_dense(image, field, steps),
            VectorField::Triangulated(field) => self.extrapolate_sparse(image, field, steps),
            VectorField::Sparse(_) => Err(Error::UseBeforeTriangulation),
        }
    }

    fn frames<'a>(&self, image: &'a GrayImage, field: FieldRef<'a>, steps: usize) -> Result<Frames<'a>> {
        if steps == 0 {
            return Err(Error::config("at least one extrapolation step is needed"));
        }

        if image.width() == 0 || image.height() == 0 {
            return Err(Error::format("cannot extrapolate an empty image"));
        }

        Ok(Frames {
            image,
            field,
            boundary: self.boundary,
            step: 0,
            steps,
        })
    }
}

#[derive(Clone, Copy)]
enum FieldRef<'a> {
    Dense(&'a DenseVectorField),
    Mesh(&'a TriangulatedField),
}

/// Lazily synthesized frames.
///
/// Frame `i` (counting from 1) is at time `i / steps`, so the last one applies the full field.
/// Nothing is retained between frames.
pub struct Frames<'a> {
    image: &'a GrayImage,
    field: FieldRef<'a>,
    boundary: Boundary,
    step: usize,
    steps: usize,
}

impl<'a> Frames<'a> {
    /// Time of the frame that will be produced next.
    pub fn next_time(&self) -> f64 {
        (self.step + 1) as f64 / self.steps as f64
    }
}

impl<'a> Iterator for Frames<'a> {
    type Item = GrayImage;

    fn next(&mut self) -> Option<Self::Item> {
        if self.step >= self.steps {
            return None;
        }

        let t = self.next_time();
        self.step += 1;

        log::debug!("synthesizing frame {}/{} at t={t}", self.step, self.steps);

        Some(match self.field {
            FieldRef::Dense(field) => warp::warp_dense(self.image, field, t, self.boundary),
            FieldRef::Mesh(field) => {
                let (frame, degenerate) = warp::warp_mesh(self.image, field, t, self.boundary);
                if degenerate > 0 {
                    log::warn!("frame {}: skipped {degenerate} degenerate triangles", self.step);
                }
                frame
            }
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.steps - self.step;
        (left, Some(left))
    }
}

impl<'a> ExactSizeIterator for Frames<'a> {}
