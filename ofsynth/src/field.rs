//! # Motion field model
//!
//! Two representations are provided. [`DenseVectorField`] stores a displacement for every pixel,
//! plus any number of auxiliary quality channels. [`SparseVectorField`] stores a list of tracked
//! correspondences, and needs to be turned into a [`TriangulatedField`] before it can be
//! rendered or used to warp images.

use crate::error::{Error, Result};
use crate::triangulation::Triangulation;
use nalgebra as na;
use std::ops::Deref;

/// Number of displacement channels in a dense field.
pub const MOTION_CHANNELS: usize = 2;

/// Pair containing source coordinates and motion at them.
pub type MotionEntry = (na::Point2<f64>, na::Vector2<f64>);

/// Direction a field describes, relative to the image pair it was extracted from.
///
/// Motion fields do not carry their direction in the stored containers, thus a freshly loaded
/// field has no direction attached to it. Extractors tag their output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub enum Direction {
    /// Motion from the first image to the second.
    Forward,
    /// Motion from the second image back to the first.
    Backward,
}

impl Direction {
    pub fn reverse(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }
}

/// Fixed size, per-pixel motion field.
///
/// Channels are stored as planes: first the horizontal displacement plane, then the vertical
/// one, then every quality plane. Each plane is in row-major order.
#[derive(Clone, Debug, PartialEq)]
pub struct DenseVectorField {
    vf: na::DMatrix<f64>,
    width: usize,
    direction: Option<Direction>,
}

impl DenseVectorField {
    /// Create a new zero-filled field.
    ///
    /// # Arguments
    ///
    /// * `width` - width of the field.
    /// * `height` - height of the field.
    /// * `quality_channels` - number of auxiliary quality channels.
    pub fn new(width: usize, height: usize, quality_channels: usize) -> Self {
        Self {
            vf: na::DMatrix::zeros(width * height, MOTION_CHANNELS + quality_channels),
            width,
            direction: None,
        }
    }

    /// Create a field from planar data.
    ///
    /// `data` must hold `width * height * channels` values, ordered the same way as
    /// [`as_slice`](Self::as_slice) returns them.
    pub fn from_planar(width: usize, height: usize, channels: usize, data: Vec<f64>) -> Result<Self> {
        if channels < MOTION_CHANNELS {
            return Err(Error::format(format!(
                "dense field needs at least {MOTION_CHANNELS} channels, got {channels}"
            )));
        }

        if data.len() != width * height * channels {
            return Err(Error::format(format!(
                "expected {} values for a {width}x{height}x{channels} field, got {}",
                width * height * channels,
                data.len()
            )));
        }

        Ok(Self {
            vf: na::DMatrix::from_vec(width * height, channels, data),
            width,
            direction: None,
        })
    }

    /// Attach direction metadata to the field.
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Get the direction of the field, if known.
    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    /// Get width and height of the field.
    pub fn dim(&self) -> (usize, usize) {
        if self.width == 0 {
            (0, 0)
        } else {
            (self.width, self.vf.nrows() / self.width)
        }
    }

    /// Get the number of cells in the field.
    ///
    /// This is the same as `width * height`
    pub fn size(&self) -> usize {
        self.vf.nrows()
    }

    /// Total number of channels, displacement included.
    pub fn channels(&self) -> usize {
        self.vf.ncols()
    }

    /// Number of auxiliary quality channels.
    pub fn quality_channels(&self) -> usize {
        self.channels() - MOTION_CHANNELS
    }

    /// Get all channels in planar order.
    ///
    /// The elements returned are in the following order:
    ///
    /// `dx[0,0], dx[1,0], ... dx[W-1,H-1], dy[0,0], ... dy[W-1,H-1], q0[0,0], ...`
    pub fn as_slice(&self) -> &[f64] {
        self.vf.as_slice()
    }

    /// Get a single channel plane in row-major order.
    ///
    /// # Panics
    ///
    /// If `channel` is out of range.
    pub fn channel(&self, channel: usize) -> &[f64] {
        let size = self.size();
        &self.vf.as_slice()[channel * size..(channel + 1) * size]
    }

    fn idx(&self, x: usize, y: usize) -> usize {
        self.width * y + x
    }

    /// Get motion at coordinates.
    ///
    /// # Arguments
    ///
    /// * `x` - horizontal coordinate.
    /// * `y` - vertical coordinate.
    pub fn get_motion(&self, x: usize, y: usize) -> na::Vector2<f64> {
        let idx = self.idx(x, y);
        na::Vector2::new(self.vf[(idx, 0)], self.vf[(idx, 1)])
    }

    /// Set motion at given position.
    ///
    /// # Arguments
    ///
    /// * `x` - horizontal coordinate to set at.
    /// * `y` - vertical coordinate to set at.
    /// * `motion` - motion to set.
    pub fn set_motion(&mut self, x: usize, y: usize, motion: na::Vector2<f64>) {
        let idx = self.idx(x, y);
        self.vf[(idx, 0)] = motion.x;
        self.vf[(idx, 1)] = motion.y;
    }

    /// Get quality value `k` at coordinates.
    pub fn get_quality(&self, k: usize, x: usize, y: usize) -> f64 {
        self.vf[(self.idx(x, y), MOTION_CHANNELS + k)]
    }

    /// Set quality value `k` at coordinates.
    pub fn set_quality(&mut self, k: usize, x: usize, y: usize, value: f64) {
        let idx = self.idx(x, y);
        self.vf[(idx, MOTION_CHANNELS + k)] = value;
    }

    /// Largest displacement magnitude in the field.
    pub fn max_magnitude(&self) -> f64 {
        self.iter()
            .map(|(_, _, m)| m.norm())
            .fold(0.0, f64::max)
    }

    /// Iterate every element of the motion field.
    ///
    /// The resulting iterator yields `(x, y, motion)` entries.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, na::Vector2<f64>)> + '_ {
        let (width, height) = self.dim();
        (0..height).flat_map(move |y| (0..width).map(move |x| (x, y, self.get_motion(x, y))))
    }
}

/// List of point correspondences between two images.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SparseVectorField {
    entries: Vec<MotionEntry>,
    direction: Option<Direction>,
}

impl SparseVectorField {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach direction metadata to the field.
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Get the direction of the field, if known.
    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    /// Add a correspondence.
    ///
    /// # Arguments
    ///
    /// * `pos` - source position of the tracked point, in pixels.
    /// * `motion` - displacement of the point, in pixels.
    pub fn push(&mut self, pos: na::Point2<f64>, motion: na::Vector2<f64>) {
        self.entries.push((pos, motion));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[MotionEntry] {
        &self.entries
    }

    /// Source positions of every correspondence.
    pub fn positions(&self) -> Vec<na::Point2<f64>> {
        self.entries.iter().map(|(p, _)| *p).collect()
    }

    /// Build a mesh over the source positions.
    ///
    /// This is the only way to obtain a field that can be rendered or used for warping.
    pub fn triangulate(self) -> TriangulatedField {
        let mesh = Triangulation::new(&self.positions());
        log::debug!(
            "triangulated {} points into {} triangles",
            self.len(),
            mesh.len()
        );
        TriangulatedField { field: self, mesh }
    }
}

impl FromIterator<MotionEntry> for SparseVectorField {
    fn from_iter<T: IntoIterator<Item = MotionEntry>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
            direction: None,
        }
    }
}

/// Sparse field together with a mesh valid for its point set.
///
/// The point set can not be modified while the mesh exists. Use
/// [`into_inner`](Self::into_inner) to drop the mesh and get back a mutable field.
#[derive(Clone, Debug)]
pub struct TriangulatedField {
    field: SparseVectorField,
    mesh: Triangulation,
}

impl TriangulatedField {
    pub fn mesh(&self) -> &Triangulation {
        &self.mesh
    }

    pub fn field(&self) -> &SparseVectorField {
        &self.field
    }

    pub fn into_inner(self) -> SparseVectorField {
        self.field
    }

    /// Iterate every mesh triangle as `[(position, motion); 3]`.
    pub fn triangles(&self) -> impl Iterator<Item = [MotionEntry; 3]> + '_ {
        self.mesh
            .triangles()
            .iter()
            .map(move |t| t.map(|i| self.field.entries[i]))
    }
}

impl Deref for TriangulatedField {
    type Target = SparseVectorField;

    fn deref(&self) -> &Self::Target {
        &self.field
    }
}

/// Any motion field, as produced by an extractor or loaded from storage.
#[derive(Clone, Debug)]
pub enum VectorField {
    Dense(DenseVectorField),
    Sparse(SparseVectorField),
    Triangulated(TriangulatedField),
}

impl VectorField {
    /// Triangulate the field if it is sparse and has no mesh yet.
    pub fn triangulate(self) -> Self {
        match self {
            Self::Sparse(field) => Self::Triangulated(field.triangulate()),
            other => other,
        }
    }

    /// Get the mesh-carrying field.
    ///
    /// Fails with [`Error::UseBeforeTriangulation`] on sparse fields without a mesh. Dense
    /// fields are rejected as a configuration error.
    pub fn as_triangulated(&self) -> Result<&TriangulatedField> {
        match self {
            Self::Triangulated(field) => Ok(field),
            Self::Sparse(_) => Err(Error::UseBeforeTriangulation),
            Self::Dense(_) => Err(Error::config("expected a sparse field, got a dense one")),
        }
    }

    pub fn is_dense(&self) -> bool {
        matches!(self, Self::Dense(_))
    }

    /// Get the direction of the field, if known.
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Self::Dense(f) => f.direction(),
            Self::Sparse(f) => f.direction(),
            Self::Triangulated(f) => f.direction(),
        }
    }
}

impl From<DenseVectorField> for VectorField {
    fn from(field: DenseVectorField) -> Self {
        Self::Dense(field)
    }
}

impl From<SparseVectorField> for VectorField {
    fn from(field: SparseVectorField) -> Self {
        Self::Sparse(field)
    }
}

impl From<TriangulatedField> for VectorField {
    fn from(field: TriangulatedField) -> Self {
        Self::Triangulated(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_layout_is_planar() {
        let mut field = DenseVectorField::new(3, 2, 1);
        field.set_motion(1, 1, na::Vector2::new(5.0, -2.0));
        field.set_quality(0, 2, 0, 0.5);

        assert_eq!(field.dim(), (3, 2));
        assert_eq!(field.channels(), 3);
        assert_eq!(field.quality_channels(), 1);

        let data = field.as_slice();
        assert_eq!(data.len(), 18);
        assert_eq!(data[4], 5.0);
        assert_eq!(data[6 + 4], -2.0);
        assert_eq!(data[12 + 2], 0.5);
        assert_eq!(field.channel(1)[4], -2.0);
        assert_eq!(field.get_motion(1, 1), na::Vector2::new(5.0, -2.0));
    }

    #[test]
    fn dense_from_planar_validates() {
        assert!(matches!(
            DenseVectorField::from_planar(2, 2, 2, vec![0.0; 7]),
            Err(Error::InputFormat(_))
        ));
        assert!(matches!(
            DenseVectorField::from_planar(2, 2, 1, vec![0.0; 4]),
            Err(Error::InputFormat(_))
        ));

        let data = (0..12).map(f64::from).collect::<Vec<_>>();
        let field = DenseVectorField::from_planar(3, 2, 2, data.clone()).unwrap();
        assert_eq!(field.as_slice(), &data[..]);
        assert_eq!(field.get_motion(0, 1), na::Vector2::new(3.0, 9.0));
    }

    #[test]
    fn iter_visits_row_major() {
        let field = DenseVectorField::new(2, 2, 0);
        let coords = field.iter().map(|(x, y, _)| (x, y)).collect::<Vec<_>>();
        assert_eq!(coords, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
    }

    #[test]
    fn untriangulated_is_rejected() {
        let field = VectorField::from(
            [
                (na::Point2::new(0.0, 0.0), na::Vector2::zeros()),
                (na::Point2::new(4.0, 0.0), na::Vector2::zeros()),
                (na::Point2::new(0.0, 4.0), na::Vector2::zeros()),
            ]
            .into_iter()
            .collect::<SparseVectorField>(),
        );

        assert!(matches!(
            field.as_triangulated(),
            Err(Error::UseBeforeTriangulation)
        ));

        let field = field.triangulate();
        let mesh = field.as_triangulated().unwrap();
        assert_eq!(mesh.mesh().len(), 1);
        assert_eq!(mesh.triangles().count(), 1);
    }

    #[test]
    fn direction_metadata() {
        let field = DenseVectorField::new(1, 1, 0);
        assert_eq!(field.direction(), None);
        let field = field.with_direction(Direction::Forward);
        assert_eq!(field.direction(), Some(Direction::Forward));
        assert_eq!(Direction::Forward.reverse(), Direction::Backward);
    }
}
