//! I/O layer for Sentinel-2 products.
//! Provides the metadata header reader, file naming rules, the tile decoder
//! adapter and its GDAL codec, the `sentinel2` product reader, and `writers`
//! for GeoTIFF/JPEG outputs and metadata embedding/sidecars.
pub mod decoder;
pub use decoder::{CacheDir, CodecError, DecodeRequest, TileCodec, TileDecoder};

pub mod gdal;
pub use gdal::{GdalCodec, GdalMetadata, GdalTileReader};

pub mod metadata;
pub use metadata::{MetadataError, ProductMetadata};

pub mod naming;
pub use naming::{ImgFilename, MtdFilename};

pub mod sentinel2;
pub use sentinel2::{CrsGeoCoding, ProductBand, ProductKind, Sentinel2Product, Sentinel2Reader};

pub mod writers;
