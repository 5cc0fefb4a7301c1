//! Extract a motion field from an image pair.

use anyhow::{anyhow, Context, Result};
use clap::*;
use ofsynth::io;
use ofsynth::prelude::v1::*;
use std::path::Path;

/// Every property name any extractor, the preprocessor or the renderer understands.
fn parameter_names() -> Result<Vec<String>> {
    let mut names = vec![];

    for name in motion_loader::EXTRACTORS {
        names.extend(motion_loader::create_extractor(name)?.prop_map().into_keys());
    }

    names.extend(Preprocessor::default().prop_map().into_keys());
    names.extend(Renderer::default().prop_map().into_keys());

    names.sort();
    names.dedup();

    Ok(names)
}

fn main() -> Result<()> {
    env_logger::init();

    let params = parameter_names()?;

    let command = Command::new("motion-extract")
        .version(crate_version!())
        .author(crate_authors!())
        .about("Extracts motion between two images, and renders it")
        .arg(
            Arg::new("algorithm")
                .required(true)
                .possible_values(motion_loader::EXTRACTORS.iter().copied()),
        )
        .arg(Arg::new("image1").required_unless_present("dump-config"))
        .arg(Arg::new("image2").required_unless_present("dump-config"))
        .arg(Arg::new("outprefix").required_unless_present("dump-config"))
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .takes_value(true)
                .help("JSON file with algorithm parameters"),
        )
        .arg(
            Arg::new("dump-config")
                .long("dump-config")
                .help("Print the effective algorithm parameters as JSON and exit"),
        )
        .arg(
            Arg::new("raw-quality")
                .long("raw-quality")
                .help("Also write quality channels losslessly as raw little-endian f64"),
        );

    let matches = params
        .iter()
        .fold(command, |command, name| {
            command.arg(Arg::new(name.as_str()).long(name.as_str()).takes_value(true))
        })
        .get_matches();

    let algorithm = matches
        .value_of("algorithm")
        .context("no algorithm given")?;

    let mut extractor = motion_loader::create_extractor(algorithm)?;
    let mut preprocessor = Preprocessor::default();
    let mut renderer = Renderer::default();

    if let Some(config) = matches.value_of("config") {
        motion_loader::load_config(&mut extractor, config)
            .with_context(|| format!("unable to apply {config}"))?;
    }

    let extractor_params = extractor.prop_map();
    let preprocessor_params = preprocessor.prop_map();
    let renderer_params = renderer.prop_map();

    for name in &params {
        let value = match matches.value_of(name.as_str()) {
            Some(value) => value,
            None => continue,
        };

        let target: &mut dyn Properties = if extractor_params.contains_key(name) {
            &mut extractor
        } else if preprocessor_params.contains_key(name) {
            &mut preprocessor
        } else if renderer_params.contains_key(name) {
            &mut renderer
        } else {
            return Err(anyhow!("{algorithm} has no parameter {name}"));
        };

        target
            .set_prop_str(name, value)
            .with_context(|| format!("invalid --{name}"))?;
    }

    if matches.is_present("dump-config") {
        motion_loader::write_config(&mut extractor, &mut std::io::stdout().lock())?;
        return Ok(());
    }

    let image1_path = matches.value_of("image1").context("no first image")?;
    let image2_path = matches.value_of("image2").context("no second image")?;
    let prefix = matches.value_of("outprefix").context("no output prefix")?;

    let image1 = io::load_image(image1_path)?;
    let image2 = io::load_image(image2_path)?;

    let extraction = extract(&mut extractor, &image1, &image2, &preprocessor, &renderer)?;

    for (path, image) in [(image1_path, extraction.image1), (image2_path, extraction.image2)] {
        let base = Path::new(path).with_extension("");
        io::save_image(image, format!("{}-smoothed.png", base.display()))?;
    }

    io::save_image(extraction.motion_image, format!("{prefix}-motion.png"))?;

    let field_path = motion_loader::save_field(&extraction.field, &format!("{prefix}-motion"))?;
    log::info!("motion field written to {}", field_path.display());

    if let VectorField::Dense(field) = &extraction.field {
        for k in 0..field.quality_channels() {
            io::save_quality_channel(field, k, motion_loader::quality_path(prefix, k, "png"))?;
            if matches.is_present("raw-quality") {
                io::save_quality_raw(field, k, motion_loader::quality_path(prefix, k, "raw"))?;
            }
        }
    }

    Ok(())
}
