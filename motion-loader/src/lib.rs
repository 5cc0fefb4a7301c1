//! Common extractor and motion field loader.

use lucas_kanade_extractor::{Klt, LucasKanade};
use ofsynth::prelude::v1::*;
use ofsynth::serialize::{self, DENSE_EXTENSION, SPARSE_EXTENSION};
use proesmans_extractor::Proesmans;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Names of all extractors [`create_extractor`] knows about.
pub const EXTRACTORS: &[&str] = &["lucaskanade", "proesmans", "klt"];

/// Names of the extractors usable for morphing.
pub const MORPH_EXTRACTORS: &[&str] = &["proesmans", "klt"];

/// Create an extractor by name.
pub fn create_extractor(name: &str) -> Result<MotionExtractor> {
    let extractor = match name {
        "lucaskanade" => MotionExtractor::Dense(Box::new(LucasKanade::default())),
        "proesmans" => MotionExtractor::Dense(Box::new(Proesmans::default())),
        "klt" => MotionExtractor::Sparse(Box::new(Klt::default())),
        _ => {
            return Err(Error::config(format!(
                "unknown algorithm {name}, expected one of {EXTRACTORS:?}"
            )))
        }
    };

    log::debug!("created {name} extractor");

    Ok(extractor)
}

/// Load a stored motion field, picking the container by file extension.
///
/// Files ending with `.pdvm` are read as dense fields, `.psvm` as sparse ones. Sparse fields are
/// triangulated right away.
pub fn load_field(path: impl AsRef<Path>) -> Result<VectorField> {
    let path = path.as_ref();

    match path.extension().and_then(|e| e.to_str()) {
        Some(DENSE_EXTENSION) => Ok(serialize::load_dense(path)?.into()),
        Some(SPARSE_EXTENSION) => Ok(serialize::load_sparse(path)?.triangulate().into()),
        _ => Err(Error::format(format!(
            "{} is neither a .{DENSE_EXTENSION} nor a .{SPARSE_EXTENSION} file",
            path.display()
        ))),
    }
}

/// Store a motion field next to `prefix`, appending the matching extension.
///
/// Returns the path that was written.
pub fn save_field(field: &VectorField, prefix: &str) -> Result<PathBuf> {
    let path = match field {
        VectorField::Dense(field) => {
            let path = PathBuf::from(format!("{prefix}.{DENSE_EXTENSION}"));
            serialize::save_dense(field, &path)?;
            path
        }
        VectorField::Sparse(field) => {
            let path = PathBuf::from(format!("{prefix}.{SPARSE_EXTENSION}"));
            serialize::save_sparse(field, &path)?;
            path
        }
        VectorField::Triangulated(field) => {
            let path = PathBuf::from(format!("{prefix}.{SPARSE_EXTENSION}"));
            serialize::save_sparse(field, &path)?;
            path
        }
    };

    Ok(path)
}

/// Path of the dump of quality channel `k`, numbered from 1.
pub fn quality_path(prefix: &str, k: usize, extension: &str) -> PathBuf {
    PathBuf::from(format!("{prefix}-quality{}.{extension}", k + 1))
}

/// Apply a JSON property file to an object.
pub fn load_config(obj: &mut dyn Properties, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let props: BTreeMap<String, Property> = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| Error::format(format!("{}: {e}", path.display())))?;
    obj.set_props(&props)
}

/// Write all properties of an object as pretty JSON, followed by a newline.
pub fn write_config(obj: &mut dyn Properties, writer: &mut impl Write) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, &obj.prop_map()).map_err(|e| Error::Io(e.into()))?;
    writeln!(writer)?;
    Ok(())
}

/// Write all properties of an object to a JSON file.
pub fn save_config(obj: &mut dyn Properties, path: impl AsRef<Path>) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_config(obj, &mut out)?;
    out.flush()?;
    Ok(())
}

/// Extractor producing a field pair for morphing.
pub enum MorphExtractor {
    Proesmans(Proesmans),
    Klt(Klt),
}

impl MorphExtractor {
    pub fn new(name: &str) -> Result<Self> {
        match name {
            "proesmans" => Ok(Self::Proesmans(Proesmans::default())),
            "klt" => Ok(Self::Klt(Klt::default())),
            _ => Err(Error::config(format!(
                "unknown morphing algorithm {name}, expected one of {MORPH_EXTRACTORS:?}"
            ))),
        }
    }

    /// Compute motion from `image1` to `image2` and back.
    ///
    /// Sparse fields are returned triangulated, and every field carries its direction.
    pub fn compute_pair(
        &mut self,
        image1: &GrayImage,
        image2: &GrayImage,
    ) -> Result<(VectorField, VectorField)> {
        match self {
            Self::Proesmans(p) => {
                let (forward, backward) = p.compute_bidirectional(image1, image2)?;
                Ok((forward.into(), backward.into()))
            }
            Self::Klt(klt) => {
                let forward = klt.compute(image1, image2)?;
                let backward = klt.compute(image2, image1)?;
                Ok((
                    forward.with_direction(Direction::Forward).triangulate().into(),
                    backward.with_direction(Direction::Backward).triangulate().into(),
                ))
            }
        }
    }
}

impl Properties for MorphExtractor {
    fn props_mut(&mut self) -> Vec<(&str, PropertyMut)> {
        match self {
            Self::Proesmans(p) => p.props_mut(),
            Self::Klt(k) => k.props_mut(),
        }
    }
}
