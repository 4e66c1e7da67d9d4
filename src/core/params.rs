use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::OutputFormat;

/// Environment variable overriding the application data root.
pub const DATA_DIR_ENV: &str = "S2MOSAIC_DATA_DIR";

/// Reader settings suitable for config files and CLI flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Application data root; the per-product cache lives under `<root>/cache/`.
    /// None resolves from the environment.
    pub cache_root: Option<PathBuf>,
    /// Value of mosaic pixels no tile covers
    pub fill_value: u16,
    /// Decode the tiles of one composite on the rayon pool
    pub parallel_decode: bool,
    /// Keep only tiles whose horizontal CS code matches, e.g. "EPSG:32615"
    pub epsg_filter: Option<String>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            cache_root: None,
            fill_value: crate::core::mosaic::FILL_CODE_MOSAIC_BG,
            parallel_decode: true,
            epsg_filter: None,
        }
    }
}

impl ReaderConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| Error::InvalidArgument {
            arg: "config",
            value: format!("{}: {}", path.display(), e),
        })
    }

    /// Data root in priority order: explicit setting, `S2MOSAIC_DATA_DIR`,
    /// `$HOME/.s2mosaic`, system temp dir.
    pub fn resolve_cache_root(&self) -> PathBuf {
        if let Some(root) = &self.cache_root {
            return root.clone();
        }
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
            return PathBuf::from(dir);
        }
        if let Some(home) = std::env::var_os("HOME").filter(|v| !v.is_empty()) {
            return PathBuf::from(home).join(".s2mosaic");
        }
        std::env::temp_dir().join("s2mosaic")
    }

    /// Cache directory for the product stored in `product_dir`.
    pub fn product_cache_dir(&self, product_dir: &Path) -> PathBuf {
        let name = product_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "product".to_string());
        self.resolve_cache_root().join("cache").join(name)
    }
}

/// What to export from an opened product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportParams {
    /// Band name, e.g. "B4"
    pub band: String,
    /// Overview level; 0 is full resolution
    pub level: usize,
    pub format: OutputFormat,
}

impl Default for ExportParams {
    fn default() -> Self {
        Self {
            band: "B4".to_string(),
            level: 0,
            format: OutputFormat::TIFF,
        }
    }
}
