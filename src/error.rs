//! Crate-level error type and `Result` alias for structured error handling.
//! Converts metadata, geometry, codec and I/O errors, and adds semantic
//! variants for product opening, decoding and compositing failures.
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metadata error: {0}")]
    Metadata(#[from] crate::io::MetadataError),

    #[error("Geometry error: {0}")]
    Geometry(#[from] crate::core::geometry::GeometryError),

    #[error("Codec error: {0}")]
    Codec(#[from] crate::io::CodecError),

    #[error("Cache directory {path:?} is unavailable: {reason}")]
    CacheUnavailable { path: PathBuf, reason: String },

    #[error("Failed to decode tile {tile_id} at level {level}: {reason}")]
    TileDecode {
        tile_id: String,
        level: usize,
        reason: String,
    },

    #[error("No tile could be decoded for band {band} at level {level}")]
    EmptyMosaic { band: String, level: usize },

    #[error("Level {level} is out of range, valid levels are 0..{num_resolutions}")]
    LevelOutOfRange { level: usize, num_resolutions: usize },

    #[error("No valid bands found in product {0:?}")]
    NoValidBands(PathBuf),

    #[error("Not a Sentinel-2 metadata or image file: {0:?}")]
    UnsupportedProductFile(PathBuf),

    #[error("Band {0} is not part of this product")]
    UnknownBand(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid argument: {arg}={value}")]
    InvalidArgument { arg: &'static str, value: String },

    #[error("External error: {0}")]
    External(String),
}

impl Error {
    pub fn external<E: std::fmt::Display>(e: E) -> Self {
        Error::External(e.to_string())
    }
}
