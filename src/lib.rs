#![doc = r#"
S2MOSAIC: a Sentinel-2 MSI product reader.

A Sentinel-2 L1C/L2A product ships every band as one JPEG2000 image per tile
(granule), and tiles may sit at different resolutions (10, 20, 60 m). This crate
places every tile of a product on a common 10 m pixel grid and exposes each band
as one multi-resolution, geo-referenced mosaic image. Level `k` halves the level
`k - 1` image in both directions. Images are composed lazily, one level at a time,
with tile decodes running in parallel and later tiles overwriting earlier ones
where they overlap.

Requirements
------------
- GDAL development headers and runtime with a JPEG2000 driver (e.g. JP2OpenJPEG).
- Rust 2024 edition toolchain.

Quick start: open a product and export one band
-----------------------------------------------
```rust,no_run
use std::path::Path;
use s2mosaic::{export_band_level, open_product, ExportParams, OutputFormat, ReaderConfig};

fn main() -> s2mosaic::Result<()> {
    let product = open_product(
        Path::new("/data/S2_L1C/MTD_GPPL1C_054_20091210235100_20091210235130_0001.xml"),
        &ReaderConfig::default(),
    )?;

    let params = ExportParams {
        band: "B4".to_string(),
        level: 3,
        format: OutputFormat::TIFF,
    };
    export_band_level(&product, &params, Path::new("/out/b4_l3.tif"))
}
```

Read pixels
-----------
```rust,no_run
use std::path::Path;
use s2mosaic::{open_product, PixelRect, ReaderConfig};

fn main() -> s2mosaic::Result<()> {
    let product = open_product(
        Path::new("/data/S2_L1C/MTD_GPPL1C_054_20091210235100_20091210235130_0001.xml"),
        &ReaderConfig::default(),
    )?;
    let band = product.band("B8")?;

    // Whole level, cached until `release`
    if let Some(image) = band.image_at(5)? {
        println!("{}x{} at {:?}", image.width(), image.height(), image.rect());
    }

    // A window of level 0, decoding only the tiles it touches
    let window = band.read_region(0, PixelRect::new(10_000, 10_000, 512, 512))?;
    println!("window decoded: {}", window.is_some());

    product.release();
    Ok(())
}
```

Batch helpers
-------------
```rust,no_run
use std::path::Path;
use s2mosaic::{process_directory_to_path, ExportParams, OutputFormat, ReaderConfig};

fn main() -> s2mosaic::Result<()> {
    let params = ExportParams {
        band: "B2".to_string(),
        level: 4,
        format: OutputFormat::JPEG,
    };

    let report = process_directory_to_path(
        Path::new("/data/products"),
        Path::new("/out"),
        &ReaderConfig::default(),
        &params,
        true, // continue_on_error
    )?;

    println!("processed={} skipped={} errors={}", report.processed, report.skipped, report.errors);
    Ok(())
}
```

Error handling
--------------
All public functions return `s2mosaic::Result<T>`; match on `s2mosaic::Error` to handle
specific cases, e.g. metadata or GDAL errors.

```rust,no_run
use std::path::Path;
use s2mosaic::{open_product, Error, ReaderConfig};

fn main() {
    match open_product(Path::new("/bad/MTD_x.xml"), &ReaderConfig::default()) {
        Ok(product) => println!("{} band(s)", product.bands().len()),
        Err(Error::Metadata(e)) => eprintln!("Metadata error: {e}"),
        Err(Error::NoValidBands(path)) => eprintln!("No usable band in {path:?}"),
        Err(other) => eprintln!("Other error: {other}"),
    }
}
```

Useful modules
--------------
- [`api`]: high-level, ergonomic entry points.
- [`types`]: resolutions, pixel rectangles, envelopes and output formats.
- [`core`]: scene layout, mosaic compositor and multi-level sources.
- [`io`]: metadata header reader, tile decoding, product reader and writers.
- [`error`]: crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod types;

// Curated public API surface
// Types
pub use core::cancel::CancelFlag;
pub use core::layout::SceneDescription;
pub use core::mosaic::{FILL_CODE_MOSAIC_BG, MosaicCompositor};
pub use core::multilevel::{ImageComposer, MultiLevelSource};
pub use core::params::{ExportParams, ReaderConfig};
pub use core::raster::Raster;
pub use error::{Error, Result};
pub use types::{Envelope, OutputFormat, PixelRect, SpatialResolution, TileLayout};

// Readers
pub use io::decoder::{CodecError, DecodeRequest, TileCodec};
pub use io::gdal::{GdalCodec, GdalMetadata, GdalTileReader};
pub use io::metadata::{MetadataError, ProductMetadata};
pub use io::sentinel2::{CrsGeoCoding, ProductBand, ProductKind, Sentinel2Product, Sentinel2Reader};

// Selected writer helpers (keep low-level metadata helpers public)
pub use io::writers::metadata::{
    ExportMetadata, create_metadata_sidecar, embed_tiff_metadata, extract_metadata_fields,
};

// High-level API re-exports
pub use api::{
    BatchReport, ProductSummary, export_band_level, export_file_name, find_metadata_file,
    iterate_product_dirs, open_product, process_directory_to_path,
};
