use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing required argument: {arg}")]
    MissingArgument { arg: String },

    #[error("Band {band} not found. Available bands: {available}")]
    BandNotAvailable { band: String, available: String },

    #[error("Level {level} exceeds the {max} levels of band {band}")]
    LevelNotAvailable {
        band: String,
        level: usize,
        max: usize,
    },

    #[error("Reader error: {0}")]
    Reader(#[from] s2mosaic::Error),
}
