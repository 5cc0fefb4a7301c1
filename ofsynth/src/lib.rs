//! # Optical Flow Synthesis Library
//!
//! This library provides a model for dense and sparse motion fields between two images, along
//! with everything needed to put such fields to use: lossless binary containers, a renderer for
//! visual inspection, and frame synthesis through extrapolation and morphing. Motion extraction
//! algorithms plug in through the [`extractor`] traits.
//!
//! The easiest way to use the library is to import its prelude:
//!
//! ```
//! use ofsynth::prelude::v1::*;
//! ```
//!
//! You may need [`nalgebra`](https://crates.io/crates/nalgebra) and
//! [`image`](https://crates.io/crates/image) to make use of the functionality.

pub mod error;
pub mod extractor;
pub mod extrapolate;
pub mod field;
pub mod io;
pub mod morph;
pub mod pipeline;
pub mod preprocess;
pub mod properties;
pub mod pyramid;
pub mod render;
pub mod serialize;
pub mod triangulation;
pub mod warp;

pub use error::{Error, Result};

pub mod prelude {
    pub mod v1 {
        pub use crate::{
            error::{Error, Result},
            extractor::{DenseExtractor, MotionExtractor, SparseExtractor},
            extrapolate::{Extrapolator, Frames},
            field::{
                DenseVectorField, Direction, MotionEntry, SparseVectorField, TriangulatedField,
                VectorField,
            },
            morph::Morpher,
            pipeline::{extract, Extraction},
            preprocess::{Preprocessed, Preprocessor},
            properties::*,
            pyramid::Plane,
            render::Renderer,
            triangulation::Triangulation,
            warp::Boundary,
        };
        pub use image::{self, DynamicImage, GrayImage, Luma, Rgb, RgbImage};
    }
}
