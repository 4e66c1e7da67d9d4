use clap::Parser;
use std::path::PathBuf;

use s2mosaic::types::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "s2mosaic", version, about = "Sentinel-2 tile mosaic reader")]
pub struct CliArgs {
    /// Input MTD_*.xml (whole product) or IMG_*.jp2 (single tile)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Input directory containing product subdirectories (batch mode)
    #[arg(long)]
    pub input_dir: Option<PathBuf>,

    /// Output filename (single product mode); defaults to <product>_<band>_L<level>.<ext>
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing (batch mode)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Band to export, e.g. B4 or B8A
    #[arg(short, long, default_value = "B4")]
    pub band: String,

    /// Overview level; 0 is full resolution, each level halves both sides
    #[arg(short, long, default_value_t = 0)]
    pub level: usize,

    /// Output format (tiff or jpeg)
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::TIFF)]
    pub format: OutputFormat,

    /// Print a JSON summary of the product instead of exporting
    #[arg(long, default_value_t = false)]
    pub info: bool,

    /// JSON reader configuration file; flags below override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Application data directory holding the decode cache
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Value written where no tile covers the mosaic
    #[arg(long)]
    pub fill_value: Option<u16>,

    /// Decode tiles one after another instead of in parallel
    #[arg(long, default_value_t = false)]
    pub sequential: bool,

    /// Keep only tiles in this CRS, e.g. EPSG:32615
    #[arg(long)]
    pub epsg: Option<String>,

    /// Batch mode: continue with the next product after an error
    #[arg(long, default_value_t = false)]
    pub batch: bool,

    /// Enable logging (honours RUST_LOG, defaults to debug)
    #[arg(long, default_value_t = false)]
    pub log: bool,
}
