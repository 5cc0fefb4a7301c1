//! # Extraction pipeline
//!
//! Preprocess an image pair, run an extractor on it and render the result.

use crate::error::Result;
use crate::extractor::MotionExtractor;
use crate::field::VectorField;
use crate::preprocess::{Preprocessed, Preprocessor};
use crate::render::Renderer;
use image::{DynamicImage, GrayImage, RgbImage};

/// Everything produced by a single [`extract`] call.
pub struct Extraction {
    /// Smoothed first image.
    pub image1: GrayImage,
    /// Smoothed second image.
    pub image2: GrayImage,
    /// Extracted field, triangulated if sparse.
    pub field: VectorField,
    /// Field drawn on the preprocessed canvas.
    pub motion_image: RgbImage,
}

/// Run the whole extraction pipeline.
///
/// # Arguments
///
/// * `extractor` - algorithm to compute motion with.
/// * `image1` - first input image.
/// * `image2` - second input image, same size as `image1`.
/// * `preprocessor` - smoothing to apply before extraction.
/// * `renderer` - visualisation settings.
pub fn extract(
    extractor: &mut MotionExtractor,
    image1: &DynamicImage,
    image2: &DynamicImage,
    preprocessor: &Preprocessor,
    renderer: &Renderer,
) -> Result<Extraction> {
    let Preprocessed {
        image1,
        image2,
        canvas,
    } = preprocessor.process(image1, image2)?;

    log::info!("computing motion");

    let field = extractor.compute(&image1, &image2)?.triangulate();

    log::info!("rendering motion");

    let motion_image = renderer.render(&field, &canvas)?;

    Ok(Extraction {
        image1,
        image2,
        field,
        motion_image,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::SparseExtractor;
    use crate::field::SparseVectorField;
    use crate::properties::Properties;
    use nalgebra as na;

    struct Grid;

    impl Properties for Grid {}

    impl SparseExtractor for Grid {
        fn compute(&mut self, _: &GrayImage, _: &GrayImage) -> Result<SparseVectorField> {
            Ok((0..9)
                .map(|i| {
                    let p = na::Point2::new((i % 3) as f64 * 7.0, (i / 3) as f64 * 7.0);
                    (p, na::Vector2::new(1.0, 2.0))
                })
                .collect())
        }
    }

    #[test]
    fn sparse_fields_come_out_triangulated() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_fn(16, 16, |x, y| {
            image::Luma([(x * 8 + y) as u8])
        }));

        let mut extractor = MotionExtractor::Sparse(Box::new(Grid));
        let out = extract(
            &mut extractor,
            &image,
            &image,
            &Preprocessor::default(),
            &Renderer::default(),
        )
        .unwrap();

        let field = out.field.as_triangulated().unwrap();
        assert_eq!(field.mesh().len(), 8);
        assert_eq!(out.motion_image.dimensions(), (16, 16));
        assert_eq!(out.image1.dimensions(), (16, 16));
    }
}
