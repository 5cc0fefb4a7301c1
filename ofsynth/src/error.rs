//! # Error taxonomy

use thiserror::Error;

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while extracting, storing or consuming motion fields.
#[derive(Debug, Error)]
pub enum Error {
    /// Unreadable image, or a field container inconsistent with its own header.
    #[error("invalid input format: {0}")]
    InputFormat(String),
    /// Field grid or image sizes that should agree do not.
    #[error("dimension mismatch: expected {expected:?}, got {found:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },
    /// Algorithm or synthesis parameter outside of its valid domain.
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),
    /// Mesh-dependent operation invoked on a sparse field that was never triangulated.
    #[error("sparse field must be triangulated before use")]
    UseBeforeTriangulation,
    /// Zero-area geometry where a proper triangle is required.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),
    /// A field tagged with one direction was supplied where the opposite one is expected.
    #[error("field direction mismatch: {0}")]
    DirectionMismatch(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn dimensions(expected: (usize, usize), found: (usize, usize)) -> Self {
        Self::DimensionMismatch { expected, found }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::UnsupportedConfiguration(msg.into())
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self::InputFormat(msg.into())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(e) => Self::Io(e),
            e => Self::InputFormat(e.to_string()),
        }
    }
}
