//! # Image morphing
//!
//! A morph warps both images towards an in-between time and cross-dissolves the results.

use crate::error::{Error, Result};
use crate::field::{DenseVectorField, Direction, TriangulatedField, VectorField};
use crate::warp::{self, Boundary};
use image::GrayImage;

/// In-between frame synthesizer.
#[derive(Clone, Copy, Debug, Default)]
pub struct Morpher {
    boundary: Boundary,
}

fn check_time(t: f64) -> Result<()> {
    if (0.0..=1.0).contains(&t) {
        Ok(())
    } else {
        Err(Error::config(format!("blend parameter {t} is outside of [0; 1]")))
    }
}

fn check_dim(expected: &GrayImage, image: &GrayImage) -> Result<()> {
    if expected.dimensions() != image.dimensions() {
        let dim = |i: &GrayImage| (i.width() as usize, i.height() as usize);
        Err(Error::dimensions(dim(expected), dim(image)))
    } else {
        Ok(())
    }
}

fn check_direction(which: &str, got: Option<Direction>, want: Direction) -> Result<()> {
    match got {
        Some(dir) if dir != want => Err(Error::DirectionMismatch(format!(
            "{which} is tagged {dir:?}, {want:?} expected"
        ))),
        _ => Ok(()),
    }
}

/// Times of an `n` frame morph sequence, from the first image (0) to the second (1).
pub fn sequence_times(n: usize) -> Result<impl Iterator<Item = f64>> {
    if n < 2 {
        return Err(Error::config("a morph sequence needs at least 2 frames"));
    }
    Ok((0..n).map(move |i| i as f64 / (n - 1) as f64))
}

impl Morpher {
    pub fn new(boundary: Boundary) -> Self {
        Self { boundary }
    }

    /// Morph using dense fields.
    ///
    /// # Arguments
    ///
    /// * `image1` - first image.
    /// * `image2` - second image, same size as `image1`.
    /// * `forward` - motion from `image1` to `image2`.
    /// * `backward` - motion from `image2` to `image1`.
    /// * `t` - blend parameter, 0 yields `image1`, 1 yields `image2`.
    pub fn morph_dense(
        &self,
        image1: &GrayImage,
        image2: &GrayImage,
        forward: &DenseVectorField,
        backward: &DenseVectorField,
        t: f64,
    ) -> Result<GrayImage> {
        check_time(t)?;
        check_dim(image1, image2)?;

        let dim = (image1.width() as usize, image1.height() as usize);
        for field in [forward, backward] {
            if field.dim() != dim {
                return Err(Error::dimensions(dim, field.dim()));
            }
        }

        check_direction("first field", forward.direction(), Direction::Forward)?;
        check_direction("second field", backward.direction(), Direction::Backward)?;

        let warped1 = warp::warp_dense(image1, forward, t, self.boundary);
        let warped2 = warp::warp_dense(image2, backward, 1.0 - t, self.boundary);

        Ok(warp::cross_dissolve(&warped1, &warped2, t))
    }

    /// Morph using triangulated sparse fields.
    ///
    /// Each mesh is warped independently, the first one towards `t`, the second one towards
    /// `1 - t`.
    pub fn morph_sparse(
        &self,
        image1: &GrayImage,
        image2: &GrayImage,
        forward: &TriangulatedField,
        backward: &TriangulatedField,
        t: f64,
    ) -> Result<GrayImage> {
        check_time(t)?;
        check_dim(image1, image2)?;
        check_direction("first field", forward.direction(), Direction::Forward)?;
        check_direction("second field", backward.direction(), Direction::Backward)?;

        let (warped1, skipped1) = warp::warp_mesh(image1, forward, t, self.boundary);
        let (warped2, skipped2) = warp::warp_mesh(image2, backward, 1.0 - t, self.boundary);

        if skipped1 + skipped2 > 0 {
            log::warn!("skipped {} degenerate triangles", skipped1 + skipped2);
        }

        Ok(warp::cross_dissolve(&warped1, &warped2, t))
    }

    /// Morph using any pair of fields of the same kind.
    pub fn morph(
        &self,
        image1: &GrayImage,
        image2: &GrayImage,
        forward: &VectorField,
        backward: &VectorField,
        t: f64,
    ) -> Result<GrayImage> {
        match (forward, backward) {
            (VectorField::Dense(f), VectorField::Dense(b)) => {
                self.morph_dense(image1, image2, f, b, t)
            }
            (VectorField::Dense(_), _) | (_, VectorField::Dense(_)) => Err(Error::config(
                "cannot morph with a mix of dense and sparse fields",
            )),
            (f, b) => {
                let (f, b) = (f.as_triangulated()?, b.as_triangulated()?);
                self.morph_sparse(image1, image2, f, b, t)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::SparseVectorField;
    use image::Luma;
    use nalgebra as na;

    fn blob(w: u32, h: u32, cx: f64, cy: f64) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| {
            let d2 = (x as f64 - cx).powi(2) + (y as f64 - cy).powi(2);
            Luma([warp::to_u8(30.0 + 200.0 * (-d2 / 60.0).exp())])
        })
    }

    fn constant(w: usize, h: usize, m: na::Vector2<f64>, dir: Direction) -> DenseVectorField {
        let mut field = DenseVectorField::new(w, h, 0);
        for y in 0..h {
            for x in 0..w {
                field.set_motion(x, y, m);
            }
        }
        field.with_direction(dir)
    }

    fn mesh(m: na::Vector2<f64>) -> SparseVectorField {
        (0..4)
            .flat_map(|y| (0..4).map(move |x| (x as f64 * 10.0 + 1.0, y as f64 * 10.0 + 2.0)))
            .map(|(x, y)| (na::Point2::new(x, y), m))
            .collect()
    }

    #[test]
    fn dense_boundary_law() {
        let i1 = blob(40, 40, 15.0, 18.0);
        let i2 = blob(40, 40, 21.0, 14.0);
        let v1 = constant(40, 40, na::Vector2::new(6.0, -4.0), Direction::Forward);
        let v2 = constant(40, 40, na::Vector2::new(-6.0, 4.0), Direction::Backward);

        let morpher = Morpher::default();
        assert_eq!(morpher.morph_dense(&i1, &i2, &v1, &v2, 0.0).unwrap(), i1);
        assert_eq!(morpher.morph_dense(&i1, &i2, &v1, &v2, 1.0).unwrap(), i2);

        // Half way the blob sits between both positions.
        let mid = morpher.morph_dense(&i1, &i2, &v1, &v2, 0.5).unwrap();
        let expected = blob(40, 40, 18.0, 16.0);
        for y in 5..35 {
            for x in 5..35 {
                let d = mid.get_pixel(x, y)[0] as i32 - expected.get_pixel(x, y)[0] as i32;
                assert!(d.abs() <= 2, "{x} {y}: {d}");
            }
        }
    }

    #[test]
    fn sparse_boundary_law() {
        let i1 = blob(32, 32, 12.0, 12.0);
        let i2 = blob(32, 32, 16.0, 15.0);
        let v1 = mesh(na::Vector2::new(4.0, 3.0))
            .with_direction(Direction::Forward)
            .triangulate();
        let v2 = mesh(na::Vector2::new(-4.0, -3.0)).triangulate();

        let morpher = Morpher::default();
        assert_eq!(morpher.morph_sparse(&i1, &i2, &v1, &v2, 0.0).unwrap(), i1);
        assert_eq!(morpher.morph_sparse(&i1, &i2, &v1, &v2, 1.0).unwrap(), i2);
    }

    #[test]
    fn rejects_bad_input() {
        let i1 = blob(16, 16, 8.0, 8.0);
        let v1 = constant(16, 16, na::Vector2::zeros(), Direction::Forward);
        let v2 = constant(16, 16, na::Vector2::zeros(), Direction::Backward);
        let morpher = Morpher::default();

        assert!(matches!(
            morpher.morph_dense(&i1, &i1, &v1, &v2, 1.5),
            Err(Error::UnsupportedConfiguration(_))
        ));
        assert!(matches!(
            morpher.morph_dense(&i1, &blob(16, 15, 8.0, 8.0), &v1, &v2, 0.5),
            Err(Error::DimensionMismatch { .. })
        ));
        assert!(matches!(
            morpher.morph_dense(&i1, &i1, &v2, &v1, 0.5),
            Err(Error::DirectionMismatch(_))
        ));

        let small = DenseVectorField::new(4, 4, 0);
        assert!(matches!(
            morpher.morph_dense(&i1, &i1, &small, &v2, 0.5),
            Err(Error::DimensionMismatch { .. })
        ));

        let sparse = VectorField::from(mesh(na::Vector2::zeros()));
        assert!(matches!(
            morpher.morph(&i1, &i1, &sparse, &sparse, 0.5),
            Err(Error::UseBeforeTriangulation)
        ));
        assert!(matches!(
            morpher.morph(&i1, &i1, &VectorField::from(v1), &sparse, 0.5),
            Err(Error::UnsupportedConfiguration(_))
        ));
    }

    #[test]
    fn sequence_includes_both_ends() {
        let times = sequence_times(5).unwrap().collect::<Vec<_>>();
        assert_eq!(times, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert!(sequence_times(1).is_err());
    }
}
