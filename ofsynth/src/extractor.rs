//! # Motion extractor boundary
//!
//! Algorithms that compute motion between two images implement either [`DenseExtractor`] or
//! [`SparseExtractor`]. The rest of the library only cares about which of the two it got, never
//! about the concrete algorithm.

use crate::error::{Error, Result};
use crate::field::{DenseVectorField, SparseVectorField, VectorField};
use crate::properties::{Properties, PropertyMut};
use image::GrayImage;

/// Algorithm producing a per-pixel field.
pub trait DenseExtractor: Properties {
    /// Compute motion from `image1` to `image2`.
    ///
    /// The field must have the dimensions of the input images and exactly
    /// [`quality_channel_count`](Self::quality_channel_count) quality channels.
    fn compute(&mut self, image1: &GrayImage, image2: &GrayImage) -> Result<DenseVectorField>;

    /// Number of quality channels produced by this extractor.
    fn quality_channel_count(&self) -> usize;
}

/// Algorithm producing point correspondences.
pub trait SparseExtractor: Properties {
    /// Compute motion from `image1` to `image2`.
    ///
    /// The returned field is never triangulated.
    fn compute(&mut self, image1: &GrayImage, image2: &GrayImage) -> Result<SparseVectorField>;
}

/// Extractor of either kind, chosen once at construction.
pub enum MotionExtractor {
    Dense(Box<dyn DenseExtractor>),
    Sparse(Box<dyn SparseExtractor>),
}

impl MotionExtractor {
    pub fn is_dense(&self) -> bool {
        matches!(self, Self::Dense(_))
    }

    /// Number of quality channels the computed fields will carry.
    pub fn quality_channel_count(&self) -> usize {
        match self {
            Self::Dense(e) => e.quality_channel_count(),
            Self::Sparse(_) => 0,
        }
    }

    /// Compute motion from `image1` to `image2`.
    ///
    /// Images must share the same dimensions. Dense output is verified against the contract of
    /// [`DenseExtractor::compute`].
    pub fn compute(&mut self, image1: &GrayImage, image2: &GrayImage) -> Result<VectorField> {
        let dim = (image1.width() as usize, image1.height() as usize);
        let dim2 = (image2.width() as usize, image2.height() as usize);

        if dim != dim2 {
            return Err(Error::dimensions(dim, dim2));
        }

        match self {
            Self::Dense(e) => {
                let field = e.compute(image1, image2)?;

                if field.dim() != dim {
                    return Err(Error::dimensions(dim, field.dim()));
                }

                if field.quality_channels() != e.quality_channel_count() {
                    return Err(Error::format(format!(
                        "extractor produced {} quality channels, declared {}",
                        field.quality_channels(),
                        e.quality_channel_count()
                    )));
                }

                Ok(field.into())
            }
            Self::Sparse(e) => {
                let field = e.compute(image1, image2)?;
                log::info!("extracted {} correspondences", field.len());
                Ok(field.into())
            }
        }
    }
}

impl Properties for MotionExtractor {
    fn props_mut(&mut self) -> Vec<(&str, PropertyMut)> {
        match self {
            Self::Dense(e) => e.props_mut(),
            Self::Sparse(e) => e.props_mut(),
        }
    }
}

impl From<Box<dyn DenseExtractor>> for MotionExtractor {
    fn from(e: Box<dyn DenseExtractor>) -> Self {
        Self::Dense(e)
    }
}

impl From<Box<dyn SparseExtractor>> for MotionExtractor {
    fn from(e: Box<dyn SparseExtractor>) -> Self {
        Self::Sparse(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Direction;
    use nalgebra as na;

    /// Reports a constant shift, optionally with a broken output size.
    struct Shift {
        shift: f64,
        broken: bool,
    }

    impl Properties for Shift {
        fn props_mut(&mut self) -> Vec<(&str, PropertyMut)> {
            vec![("shift", PropertyMut::float(&mut self.shift, -10.0, 10.0))]
        }
    }

    impl DenseExtractor for Shift {
        fn compute(&mut self, image1: &GrayImage, _: &GrayImage) -> Result<DenseVectorField> {
            let w = image1.width() as usize + self.broken as usize;
            let h = image1.height() as usize;
            let mut field = DenseVectorField::new(w, h, 1);
            for y in 0..h {
                for x in 0..w {
                    field.set_motion(x, y, na::Vector2::new(self.shift, 0.0));
                }
            }
            Ok(field.with_direction(Direction::Forward))
        }

        fn quality_channel_count(&self) -> usize {
            1
        }
    }

    struct Corners;

    impl Properties for Corners {}

    impl SparseExtractor for Corners {
        fn compute(&mut self, image1: &GrayImage, _: &GrayImage) -> Result<SparseVectorField> {
            let (w, h) = (image1.width() as f64 - 1.0, image1.height() as f64 - 1.0);
            Ok([(0.0, 0.0), (w, 0.0), (0.0, h)]
                .into_iter()
                .map(|(x, y)| (na::Point2::new(x, y), na::Vector2::new(1.0, 1.0)))
                .collect())
        }
    }

    #[test]
    fn dense_dispatch() {
        let mut extractor = MotionExtractor::from(Box::new(Shift {
            shift: 0.0,
            broken: false,
        }) as Box<dyn DenseExtractor>);

        extractor.set_prop_str("shift", "2.5").unwrap();
        assert!(extractor.is_dense());
        assert_eq!(extractor.quality_channel_count(), 1);

        let image = GrayImage::new(6, 4);
        let field = extractor.compute(&image, &image).unwrap();
        let VectorField::Dense(field) = field else {
            panic!("expected a dense field");
        };
        assert_eq!(field.dim(), (6, 4));
        assert_eq!(field.get_motion(5, 3), na::Vector2::new(2.5, 0.0));
        assert_eq!(field.direction(), Some(Direction::Forward));
    }

    #[test]
    fn contract_violations() {
        let mut extractor = MotionExtractor::Dense(Box::new(Shift {
            shift: 0.0,
            broken: true,
        }));
        let image = GrayImage::new(6, 4);
        assert!(matches!(
            extractor.compute(&image, &image),
            Err(Error::DimensionMismatch { .. })
        ));
        assert!(matches!(
            extractor.compute(&image, &GrayImage::new(5, 4)),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn sparse_output_is_untriangulated() {
        let mut extractor = MotionExtractor::Sparse(Box::new(Corners));
        assert_eq!(extractor.quality_channel_count(), 0);

        let image = GrayImage::new(10, 10);
        let field = extractor.compute(&image, &image).unwrap();
        assert!(matches!(
            field.as_triangulated(),
            Err(Error::UseBeforeTriangulation)
        ));
        assert_eq!(field.triangulate().as_triangulated().unwrap().mesh().len(), 1);
    }
}
