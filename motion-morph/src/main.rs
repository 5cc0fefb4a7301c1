//! Morph between two images through motion extracted from them.

use anyhow::{Context, Result};
use clap::*;
use ofsynth::prelude::v1::*;
use ofsynth::{io, morph, preprocess};

/// Dense fields are drawn sparser than in extraction output.
const DENSE_STRIDE: usize = 15;

fn main() -> Result<()> {
    env_logger::init();

    let matches = Command::new("motion-morph")
        .version(crate_version!())
        .author(crate_authors!())
        .about("Synthesizes in-between frames of two images")
        .arg(Arg::new("image1").required(true).help("First source image"))
        .arg(Arg::new("image2").required(true).help("Second source image"))
        .arg(
            Arg::new("numtimesteps")
                .required(true)
                .help("Number of images to produce, including both sources"),
        )
        .arg(
            Arg::new("algorithm")
                .required(true)
                .possible_values(motion_loader::MORPH_EXTRACTORS.iter().copied())
                .help("Motion extraction algorithm to use"),
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
                .help("Intensity to use outside the images, edges are replicated if unset"),
        )
        .get_matches();

    let image1_path = matches.value_of("image1").context("no first image")?;
    let image2_path = matches.value_of("image2").context("no second image")?;
    let steps: usize = matches
        .value_of("numtimesteps")
        .context("no step count given")?
        .parse()
        .context("invalid step count")?;
    let algorithm = matches
        .value_of("algorithm")
        .context("no algorithm given")?;
    let prefix = matches.value_of("outprefix").context("no output prefix")?;

    let boundary = match matches.value_of("fill") {
        Some(fill) => Boundary::Constant(fill.parse().context("invalid fill intensity")?),
        None => Boundary::Clamp,
    };

    // Fail on a bad step count before any extraction work is done.
    let times = morph::sequence_times(steps)?;

    let mut extractor = motion_loader::MorphExtractor::new(algorithm)?;

    let image1 = io::load_image(image1_path)?;
    let image2 = io::load_image(image2_path)?;

    let smoothed = Preprocessor::default().process(&image1, &image2)?;

    log::info!("computing motion in both directions");

    let (forward, backward) = extractor.compute_pair(&smoothed.image1, &smoothed.image2)?;

    let renderer = Renderer {
        stride: DENSE_STRIDE,
        ..Default::default()
    };
    let canvas = RgbImage::new(smoothed.image1.width(), smoothed.image1.height());

    io::save_image(
        renderer.render(&forward, &canvas)?,
        format!("{prefix}-motion-1.png"),
    )?;
    io::save_image(
        renderer.render(&backward, &canvas)?,
        format!("{prefix}-motion-2.png"),
    )?;

    let image1 = preprocess::intensity(&image1);
    let image2 = preprocess::intensity(&image2);
    let morpher = Morpher::new(boundary);

    for (i, t) in times.enumerate() {
        let frame = morpher.morph(&image1, &image2, &forward, &backward, t)?;
        let path = format!("{prefix}-morph-{:02}.png", i + 1);
        io::save_image(frame, &path)?;
        log::info!("wrote {path} (t={t:.3})");
    }

    Ok(())
}
