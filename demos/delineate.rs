use clap::Parser;
use ea_delineate::io::{ascii_grid, geojson as ea_geojson};
use ea_delineate::{BoundaryFeatures, Crs, DelineationConfig, Delineator, EaConstraints, PartitionInputs, SplitPopulation};
use geojson::GeoJson;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Population raster (ESRI ASCII grid)
    #[arg(short, long)]
    population: PathBuf,

    /// EPSG code of the population raster
    #[arg(long, default_value_t = 3857)]
    population_epsg: u32,

    /// Boundary layers (GeoJSON, WGS84): roads, rivers, settlements...
    #[arg(short, long)]
    boundary: Vec<PathBuf>,

    /// Study region polygon (GeoJSON, WGS84)
    #[arg(long)]
    region: Option<PathBuf>,

    /// Output GeoJSON file (EAs, WGS84)
    #[arg(short, long)]
    output: PathBuf,

    /// JSON config file; the cap flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    max_population: Option<f64>,

    #[arg(long)]
    max_area_km2: Option<f64>,

    /// Split cell population by area instead of copying it to every fragment
    #[arg(long, default_value_t = false)]
    area_weighted: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DelineationConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => DelineationConfig::default(),
    };
    let defaults = config.constraints;
    config.constraints = EaConstraints::new(
        args.max_population.unwrap_or(defaults.max_population),
        args.max_area_km2.unwrap_or(defaults.max_area_km2),
    );
    if args.area_weighted {
        config.split_population = SplitPopulation::AreaWeighted;
    }

    println!("Reading population from {:?}", args.population);
    let grid = ascii_grid::read(&args.population, Some(Crs::from_epsg(args.population_epsg)))?;

    let boundaries = args
        .boundary
        .iter()
        .map(|path| -> Result<BoundaryFeatures, Box<dyn std::error::Error>> {
            let name = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
            Ok(ea_geojson::read_boundary(&name, &std::fs::read_to_string(path)?, None)?)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let region = match &args.region {
        Some(path) => Some(ea_geojson::read_region(std::fs::read_to_string(path)?.parse::<GeoJson>()?)?),
        None => None,
    };

    let mut inputs = PartitionInputs::new(&grid).with_boundaries(&boundaries);
    if let Some(region) = &region {
        inputs = inputs.with_region(region, Crs::Wgs84);
    }

    let working_crs = config.working_crs;
    let partition = Delineator::new(config).delineate(&inputs)?;

    println!(
        "{} EAs ({} oversize, {} refined), population {} of {}, {} diagnostics",
        partition.summary.ea_count,
        partition.summary.oversize_count,
        partition.summary.refined_count,
        partition.summary.output_population,
        partition.summary.input_population,
        partition.summary.diagnostic_count
    );

    let collection = ea_geojson::eas_to_geojson(&partition.eas, working_crs, Crs::Wgs84)?;
    let writer = BufWriter::new(File::create(&args.output)?);
    serde_json::to_writer_pretty(writer, &GeoJson::FeatureCollection(collection))?;

    println!("Wrote output to {:?}", args.output);
    Ok(())
}
