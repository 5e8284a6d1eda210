use anyhow::{bail, Result};
use tracing_subscriber::EnvFilter;
use unipart::geometry::Geometry;
use unipart::output;
use unipart::settings;
use unipart::survey::Survey;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let settings = settings::load_config()?;
    println!("{}", settings);

    let mut geom = Geometry::from_file(&settings.geometry)?;
    geom.finalize(settings.axis, settings.partition_threshold);

    let result = Survey::new(&geom, &settings)?.run();
    println!("{}", result);

    output::write_universes(&geom, &settings.directory)?;
    output::write_survey(&result, &settings.directory)?;

    if let Some(mismatches) = result.mismatches.filter(|&m| m > 0) {
        bail!("{} samples found a different cell with partitioners", mismatches);
    }
    Ok(())
}
