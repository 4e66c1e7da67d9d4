//! Sentinel-2 product file names.
//!
//! Metadata headers are named
//! `MTD_<class>_<orbit>_<start>_<stop>_<version>.xml` and tile images
//! `IMG_<class>_<orbit>_<start>_<stop>_<version>_<band>_<tileId>.jp2`, where
//! `<start>`/`<stop>` are `YYYYMMDDhhmmss`, `<band>` is the two-digit band
//! index and `<tileId>` the five-character MGRS tile code.
use chrono::NaiveDateTime;

const TIME_FORMAT: &str = "%Y%m%d%H%M%S";

fn is_timestamp(s: &str) -> bool {
    s.len() == 14 && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_tile_id(s: &str) -> bool {
    s.len() == 5 && s.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Parses a file-name timestamp; `None` when it is not a valid date.
pub fn parse_time(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIME_FORMAT).ok()
}

/// Fields shared by metadata and image file names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductStem {
    pub file_class: String,
    pub orbit: String,
    pub start: String,
    pub stop: String,
    pub version: String,
}

impl ProductStem {
    fn parse(parts: &[&str]) -> Option<Self> {
        let [file_class, orbit, start, stop, version] = parts else {
            return None;
        };
        if file_class.len() < 3
            || !file_class.is_ascii()
            || !is_digits(orbit)
            || !is_timestamp(start)
            || !is_timestamp(stop)
            || version.is_empty()
        {
            return None;
        }
        Some(Self {
            file_class: file_class.to_string(),
            orbit: orbit.to_string(),
            start: start.to_string(),
            stop: stop.to_string(),
            version: version.to_string(),
        })
    }

    /// Last three characters of the file class, e.g. `GPPL1C` -> `L1C`. The
    /// class is ASCII, so byte and character offsets agree.
    pub fn processing_level(&self) -> &str {
        let class = self.file_class.as_str();
        &class[class.len() - 3..]
    }

    pub fn start_time(&self) -> Option<NaiveDateTime> {
        parse_time(&self.start)
    }

    pub fn stop_time(&self) -> Option<NaiveDateTime> {
        parse_time(&self.stop)
    }

    fn joined(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}",
            self.file_class, self.orbit, self.start, self.stop, self.version
        )
    }
}

/// A parsed `MTD_*.xml` metadata file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MtdFilename {
    pub name: String,
    pub stem: ProductStem,
}

impl MtdFilename {
    pub fn parse(name: &str) -> Option<Self> {
        let body = name.strip_prefix("MTD_")?.strip_suffix(".xml")?;
        let parts: Vec<&str> = body.split('_').collect();
        Some(Self {
            name: name.to_string(),
            stem: ProductStem::parse(&parts)?,
        })
    }

    pub fn is_metadata_filename(name: &str) -> bool {
        Self::parse(name).is_some()
    }

    /// Product name: the file stem without `MTD_`.
    pub fn product_name(&self) -> String {
        self.stem.joined()
    }

    pub fn processing_level(&self) -> &str {
        self.stem.processing_level()
    }

    /// Image file name of band `band_index` of tile `tile_id` in this product.
    pub fn img_filename(&self, band_index: usize, tile_id: &str) -> String {
        format!("IMG_{}_{:02}_{}.jp2", self.stem.joined(), band_index, tile_id)
    }
}

/// A parsed `IMG_*.jp2` tile image file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImgFilename {
    pub name: String,
    pub stem: ProductStem,
    pub band_index: usize,
    pub tile_id: String,
}

impl ImgFilename {
    pub fn parse(name: &str) -> Option<Self> {
        let body = name.strip_prefix("IMG_")?.strip_suffix(".jp2")?;
        let parts: Vec<&str> = body.split('_').collect();
        let [head @ .., band, tile_id] = parts.as_slice() else {
            return None;
        };
        if band.len() != 2 || !is_digits(band) || !is_tile_id(tile_id) {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            stem: ProductStem::parse(head)?,
            band_index: band.parse().ok()?,
            tile_id: tile_id.to_string(),
        })
    }

    pub fn is_image_filename(name: &str) -> bool {
        Self::parse(name).is_some()
    }

    pub fn processing_level(&self) -> &str {
        self.stem.processing_level()
    }

    /// Whether `other` is another band of the same tile of the same product.
    pub fn is_sibling(&self, other: &ImgFilename) -> bool {
        self.stem == other.stem && self.tile_id == other.tile_id
    }
}
