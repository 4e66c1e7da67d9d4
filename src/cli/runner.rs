use std::path::{Path, PathBuf};

use tracing::info;
use tracing_subscriber::EnvFilter;

use s2mosaic::api::{
    ProductSummary, export_band_level, export_file_name, open_product, process_directory_to_path,
};
use s2mosaic::{ExportParams, ReaderConfig, Sentinel2Product};

use super::args::CliArgs;
use super::errors::AppError;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Config file (if any) with command-line overrides applied
fn reader_config(args: &CliArgs) -> Result<ReaderConfig, AppError> {
    let mut config = match &args.config {
        Some(path) => ReaderConfig::from_json_file(path)?,
        None => ReaderConfig::default(),
    };
    if let Some(dir) = &args.cache_dir {
        config.cache_root = Some(dir.clone());
    }
    if let Some(fill) = args.fill_value {
        config.fill_value = fill;
    }
    if args.sequential {
        config.parallel_decode = false;
    }
    if let Some(epsg) = &args.epsg {
        config.epsg_filter = Some(epsg.clone());
    }
    Ok(config)
}

fn check_export(product: &Sentinel2Product, params: &ExportParams) -> Result<(), AppError> {
    let band = product
        .band(&params.band)
        .map_err(|_| AppError::BandNotAvailable {
            band: params.band.clone(),
            available: product.band_names().join(", "),
        })?;
    if params.level >= band.num_resolutions() {
        return Err(AppError::LevelNotAvailable {
            band: params.band.clone(),
            level: params.level,
            max: band.num_resolutions(),
        });
    }
    Ok(())
}

fn process_single_product(
    input: &Path,
    output: Option<&Path>,
    config: &ReaderConfig,
    params: &ExportParams,
    info_only: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let product = open_product(input, config)?;

    if info_only {
        println!("{}", ProductSummary::from_product(&product).to_json()?);
        return Ok(());
    }

    check_export(&product, params)?;
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(export_file_name(&product, params)));
    export_band_level(&product, params, &output)?;
    info!("Successfully processed: {:?} -> {:?}", input, output);
    Ok(())
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.log {
        init_logging();
    }

    let config = reader_config(&args)?;
    let params = ExportParams {
        band: args.band.clone(),
        level: args.level,
        format: args.format,
    };

    let batch_mode = args.batch || args.input_dir.is_some();

    if batch_mode {
        let input_dir = args.input_dir.ok_or(AppError::MissingArgument {
            arg: "--input-dir".to_string(),
        })?;
        let output_dir = args.output_dir.ok_or(AppError::MissingArgument {
            arg: "--output-dir".to_string(),
        })?;

        info!("Starting batch processing from directory: {:?}", input_dir);
        info!("Output directory: {:?}", output_dir);

        let report = process_directory_to_path(&input_dir, &output_dir, &config, &params, true)?;

        info!("Batch processing complete!");
        info!("Processed: {}", report.processed);
        info!("Skipped: {}", report.skipped);
        info!("Errors: {}", report.errors);
    } else {
        let input = args.input.ok_or(AppError::MissingArgument {
            arg: "--input".to_string(),
        })?;
        process_single_product(&input, args.output.as_deref(), &config, &params, args.info)?;
    }

    Ok(())
}
