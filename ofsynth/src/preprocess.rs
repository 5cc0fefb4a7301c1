//! # Input normalisation
//!
//! Reduces an image pair to single-channel, smoothed working copies, and prepares a dimmed RGB
//! canvas that motion can be drawn on.

use crate::error::{Error, Result};
use crate::properties::{Properties, PropertyMut};
use image::{imageops, DynamicImage, GrayImage, Rgb, RgbImage};

/// Intensity of the canvas relative to the smoothed first image.
const CANVAS_INTENSITY: f64 = 0.75;

/// Gaussian smoothing stage.
#[derive(Clone, Copy, Debug)]
pub struct Preprocessor {
    sigma: f64,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self { sigma: 3.0 }
    }
}

impl Properties for Preprocessor {
    fn props_mut(&mut self) -> Vec<(&str, PropertyMut)> {
        vec![("sigma", PropertyMut::float(&mut self.sigma, 0.0, 100.0))]
    }
}

/// Output of the [`Preprocessor`].
#[derive(Clone, Debug)]
pub struct Preprocessed {
    pub image1: GrayImage,
    pub image2: GrayImage,
    /// Smoothed first image at 75% intensity.
    pub canvas: RgbImage,
}

/// Take the first channel of an image.
///
/// Grayscale images are returned as is, colour ones lose everything but their red channel.
pub fn intensity(image: &DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(image) => image.clone(),
        other => {
            let rgb = other.to_rgb8();
            GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
                image::Luma([rgb.get_pixel(x, y)[0]])
            })
        }
    }
}

/// Build the base visualisation canvas from a grayscale image.
pub fn canvas(image: &GrayImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let v = (image.get_pixel(x, y)[0] as f64 * CANVAS_INTENSITY).round() as u8;
        Rgb([v, v, v])
    })
}

impl Preprocessor {
    /// Create a preprocessor with given smoothing.
    ///
    /// # Arguments
    ///
    /// * `sigma` - standard deviation of the gaussian kernel, 0 disables smoothing.
    pub fn new(sigma: f64) -> Result<Self> {
        if !sigma.is_finite() || sigma < 0.0 {
            return Err(Error::config(format!("invalid smoothing sigma {sigma}")));
        }
        Ok(Self { sigma })
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// Smooth a single image.
    pub fn smooth(&self, image: &GrayImage) -> GrayImage {
        if self.sigma > 0.0 {
            imageops::blur(image, self.sigma as f32)
        } else {
            image.clone()
        }
    }

    /// Normalise an image pair.
    ///
    /// Both images must have the same dimensions and must not be empty. Inputs are left
    /// untouched.
    pub fn process(&self, image1: &DynamicImage, image2: &DynamicImage) -> Result<Preprocessed> {
        let dim1 = (image1.width() as usize, image1.height() as usize);
        let dim2 = (image2.width() as usize, image2.height() as usize);

        if dim1 != dim2 {
            return Err(Error::dimensions(dim1, dim2));
        }

        if dim1.0 == 0 || dim1.1 == 0 {
            return Err(Error::format("input images are empty"));
        }

        log::info!(
            "preprocessing {}x{} pair, sigma={}",
            dim1.0,
            dim1.1,
            self.sigma
        );

        let image1 = self.smooth(&intensity(image1));
        let image2 = self.smooth(&intensity(image2));
        let canvas = canvas(&image1);

        Ok(Preprocessed {
            image1,
            image2,
            canvas,
        })
    }
}
