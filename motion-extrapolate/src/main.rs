//! Extrapolate frames from an image and a stored motion field.

use anyhow::{Context, Result};
use clap::*;
use ofsynth::prelude::v1::*;
use ofsynth::{io, preprocess};

fn main() -> Result<()> {
    env_logger::init();

    let matches = Command::new("motion-extrapolate")
        .version(crate_version!())
        .author(crate_authors!())
        .about("Continues the motion of a stored field, starting from a single image")
        .arg(Arg::new("image").required(true).help("Image to extrapolate"))
        .arg(
            Arg::new("motionfield")
                .required(true)
                .help("Motion field in .pdvm or .psvm format"),
        )
        .arg(
            Arg::new("numtimesteps")
                .required(true)
                .help("Number of images to produce"),
        )
        .arg(
            Arg::new("outprefix")
                .required(true)
                .help("Prefix for output file names"),
        )
        .arg(
            Arg::new("fill")
                .long("fill")
                .short('f')
                .takes_value(true)
                .help("Intensity to use outside the image, edges are replicated if unset"),
        )
        .get_matches();

    let image_path = matches.value_of("image").context("no image given")?;
    let field_path = matches
        .value_of("motionfield")
        .context("no motion field given")?;
    let steps: usize = matches
        .value_of("numtimesteps")
        .context("no step count given")?
        .parse()
        .context("invalid step count")?;
    let prefix = matches.value_of("outprefix").context("no output prefix")?;

    let boundary = match matches.value_of("fill") {
        Some(fill) => Boundary::Constant(fill.parse().context("invalid fill intensity")?),
        None => Boundary::Clamp,
    };

    let image = preprocess::intensity(&io::load_image(image_path)?);
    let field = motion_loader::load_field(field_path)
        .with_context(|| format!("unable to load {field_path}"))?;

    let frames = Extrapolator::new(boundary).extrapolate(&image, &field, steps)?;

    for (i, frame) in frames.enumerate() {
        let path = format!("{prefix}-{:02}.png", i + 1);
        io::save_image(frame, &path)?;
        log::info!("wrote {path}");
    }

    Ok(())
}
