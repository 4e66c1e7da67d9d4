//! Reader for Sentinel-2 `MTD_*.xml` product metadata headers.
//!
//! Extracts the product characteristics (spectral band table), the
//! radiometric resampling data and the per-tile geometry and angle grids.
//! Parsing is a single quick-xml event pass tracking the element path.
use std::collections::{BTreeMap, HashSet};
use std::io::BufRead;
use std::path::Path;

use ndarray::Array2;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::geometry::{AnglesGrid, Tile, TileGeometry};
use crate::types::SpatialResolution;

/// Errors encountered when reading metadata headers
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("Missing field `{0}` in product metadata")]
    MissingField(&'static str),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Tile {0} is listed more than once")]
    DuplicateTile(String),
}

/// One entry of the spectral band table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpectralInformation {
    pub band_id: usize,
    pub physical_band: String,
    /// Metres per pixel.
    pub resolution: u32,
    pub wavelength_min: f64,
    pub wavelength_max: f64,
    pub wavelength_central: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProductCharacteristics {
    pub spacecraft: String,
    pub dataset_production_date: String,
    pub processing_level: String,
    pub band_informations: Vec<SpectralInformation>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReflectanceConversion {
    pub u: f64,
    /// Indexed by band id.
    pub solar_irradiances: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResampleData {
    /// TOA scale for Level-1C, BOA scale for Level-2A.
    pub quantification_value: f64,
    /// Level-2A aerosol optical thickness scale.
    pub aot_quantification_value: Option<f64>,
    /// Level-2A water vapour scale.
    pub wvp_quantification_value: Option<f64>,
    pub reflectance_conversion: ReflectanceConversion,
}

/// Everything read from one metadata header.
#[derive(Debug, Clone, Default)]
pub struct ProductMetadata {
    pub product_characteristics: ProductCharacteristics,
    pub resample_data: ResampleData,
    pub tiles: Vec<Tile>,
}

impl ProductMetadata {
    pub fn parse_file(path: &Path) -> Result<Self, MetadataError> {
        let mut reader = Reader::from_file(path)?;
        reader.trim_text(true);
        debug!("Parsing metadata header {:?}", path);
        parse_events(reader)
    }

    pub fn parse_str(xml: &str) -> Result<Self, MetadataError> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);
        parse_events(reader)
    }

    pub fn tile(&self, tile_id: &str) -> Option<&Tile> {
        self.tiles.iter().find(|t| t.id == tile_id)
    }

    /// Spectral entry whose band id is `band_id`.
    pub fn band_information(&self, band_id: usize) -> Option<&SpectralInformation> {
        self.product_characteristics
            .band_informations
            .iter()
            .find(|b| b.band_id == band_id)
    }

    /// Bottom-of-atmosphere product, which also carries quality layers.
    pub fn is_level_2a(&self) -> bool {
        self.product_characteristics.processing_level.ends_with("2A")
            || self.resample_data.aot_quantification_value.is_some()
            || self.resample_data.wvp_quantification_value.is_some()
    }

    pub fn solar_irradiance(&self, band_id: usize) -> Option<f64> {
        self.resample_data
            .reflectance_conversion
            .solar_irradiances
            .get(band_id)
            .copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AngleKind {
    Zenith,
    Azimuth,
}

#[derive(Default)]
struct GridBuilder {
    band_id: Option<u32>,
    detector_id: Option<u32>,
    zenith: Vec<Vec<f32>>,
    azimuth: Vec<Vec<f32>>,
}

impl GridBuilder {
    fn build(self, tile_id: &str) -> Result<AnglesGrid, MetadataError> {
        Ok(AnglesGrid {
            band_id: self.band_id,
            detector_id: self.detector_id,
            zenith: rows_to_array(self.zenith, tile_id)?,
            azimuth: rows_to_array(self.azimuth, tile_id)?,
        })
    }
}

struct TileBuilder {
    tile: Tile,
    sizes: BTreeMap<SpatialResolution, (usize, usize)>,
    positions: BTreeMap<SpatialResolution, [f64; 4]>,
}

impl TileBuilder {
    fn new(id: String) -> Self {
        Self {
            tile: Tile::new(id),
            sizes: BTreeMap::new(),
            positions: BTreeMap::new(),
        }
    }

    /// Geometry exists for every resolution that has both a size and a position.
    fn build(mut self) -> Tile {
        for (resolution, (num_rows, num_cols)) in &self.sizes {
            let Some([ulx, uly, x_dim, y_dim]) = self.positions.get(resolution) else {
                warn!(
                    "Tile {} has a size but no position at {}",
                    self.tile.id, resolution
                );
                continue;
            };
            self.tile.geometries.insert(
                *resolution,
                TileGeometry {
                    num_rows: *num_rows,
                    num_cols: *num_cols,
                    upper_left_x: *ulx,
                    upper_left_y: *uly,
                    x_dim: *x_dim,
                    y_dim: *y_dim,
                },
            );
        }
        self.tile
    }
}

fn rows_to_array(rows: Vec<Vec<f32>>, tile_id: &str) -> Result<Array2<f32>, MetadataError> {
    let nrows = rows.len();
    let ncols = rows.first().map_or(0, |r| r.len());
    if rows.iter().any(|r| r.len() != ncols) {
        return Err(MetadataError::Parse(format!(
            "ragged angle grid in tile {}",
            tile_id
        )));
    }
    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((nrows, ncols), flat).map_err(|e| MetadataError::Parse(e.to_string()))
}

/// Angle values are space separated; `NaN` marks cells without observation.
fn parse_angle_row(text: &str) -> Result<Vec<f32>, MetadataError> {
    text.split_whitespace()
        .map(|token| {
            token
                .parse::<f32>()
                .map_err(|_| MetadataError::Parse(format!("bad angle value `{}`", token)))
        })
        .collect()
}

fn parse_num<T: std::str::FromStr>(text: &str, field: &str) -> Result<T, MetadataError> {
    text.trim()
        .parse()
        .map_err(|_| MetadataError::Parse(format!("bad value `{}` for {}", text, field)))
}

fn attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, MetadataError> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == name.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn resolution_attribute(e: &BytesStart<'_>) -> Result<Option<SpatialResolution>, MetadataError> {
    let Some(value) = attribute(e, "resolution")? else {
        return Ok(None);
    };
    let meters: u32 = parse_num(&value, "resolution")?;
    Ok(SpatialResolution::from_meters(meters))
}

#[derive(Default)]
struct ParseState {
    meta: ProductMetadata,
    path: Vec<String>,
    band: Option<SpectralInformation>,
    irradiance_band: Option<usize>,
    tile: Option<TileBuilder>,
    resolution: Option<SpatialResolution>,
    grid: Option<GridBuilder>,
    angle: Option<AngleKind>,
    seen_tiles: HashSet<String>,
}

impl ParseState {
    fn inside(&self, name: &str) -> bool {
        self.path.iter().any(|p| p == name)
    }

    fn start(&mut self, e: &BytesStart<'_>) -> Result<(), MetadataError> {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
        match name.as_str() {
            "Spectral_Information" => {
                let band_id = attribute(e, "bandId")?.ok_or(MetadataError::MissingField("bandId"))?;
                self.band = Some(SpectralInformation {
                    band_id: parse_num(&band_id, "bandId")?,
                    physical_band: attribute(e, "physicalBand")?.unwrap_or_default(),
                    ..SpectralInformation::default()
                });
            }
            "SOLAR_IRRADIANCE" => {
                self.irradiance_band = match attribute(e, "bandId")? {
                    Some(v) => Some(parse_num(&v, "bandId")?),
                    None => None,
                };
            }
            "Tile" => {
                let id = attribute(e, "tileId")?.ok_or(MetadataError::MissingField("tileId"))?;
                if !self.seen_tiles.insert(id.clone()) {
                    return Err(MetadataError::DuplicateTile(id));
                }
                self.tile = Some(TileBuilder::new(id));
            }
            "Size" | "Geoposition" if self.tile.is_some() => {
                self.resolution = resolution_attribute(e)?;
                if self.resolution.is_none() {
                    warn!("Skipping {} with unsupported resolution", name);
                }
            }
            "Sun_Angles_Grid" if self.tile.is_some() => {
                self.grid = Some(GridBuilder::default());
            }
            "Viewing_Incidence_Angles_Grids" if self.tile.is_some() => {
                let parse_id = |v: Option<String>, field: &'static str| match v {
                    Some(v) => parse_num::<u32>(&v, field).map(Some),
                    None => Ok(None),
                };
                self.grid = Some(GridBuilder {
                    band_id: parse_id(attribute(e, "bandId")?, "bandId")?,
                    detector_id: parse_id(attribute(e, "detectorId")?, "detectorId")?,
                    ..GridBuilder::default()
                });
            }
            "Zenith" if self.grid.is_some() => self.angle = Some(AngleKind::Zenith),
            "Azimuth" if self.grid.is_some() => self.angle = Some(AngleKind::Azimuth),
            _ => {}
        }
        self.path.push(name);
        Ok(())
    }

    fn end(&mut self) -> Result<(), MetadataError> {
        let Some(name) = self.path.pop() else {
            return Ok(());
        };
        match name.as_str() {
            "Spectral_Information" => {
                if let Some(band) = self.band.take() {
                    self.meta.product_characteristics.band_informations.push(band);
                }
            }
            "SOLAR_IRRADIANCE" => self.irradiance_band = None,
            "Size" | "Geoposition" => self.resolution = None,
            "Zenith" | "Azimuth" => self.angle = None,
            "Sun_Angles_Grid" => {
                if let (Some(grid), Some(tile)) = (self.grid.take(), self.tile.as_mut()) {
                    tile.tile.sun_angles = Some(grid.build(&tile.tile.id)?);
                }
            }
            "Viewing_Incidence_Angles_Grids" => {
                if let (Some(grid), Some(tile)) = (self.grid.take(), self.tile.as_mut()) {
                    let grid = grid.build(&tile.tile.id)?;
                    tile.tile.viewing_incidence_angles.push(grid);
                }
            }
            "Tile" => {
                if let Some(builder) = self.tile.take() {
                    self.meta.tiles.push(builder.build());
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), MetadataError> {
        let Some(current) = self.path.last().map(String::as_str) else {
            return Ok(());
        };
        match current {
            "SPACECRAFT_NAME" => {
                self.meta.product_characteristics.spacecraft = text.to_string();
            }
            "DATASET_PRODUCTION_DATE" => {
                self.meta.product_characteristics.dataset_production_date = text.to_string();
            }
            "PROCESSING_LEVEL" => {
                self.meta.product_characteristics.processing_level = text.to_string();
            }
            "RESOLUTION" if self.band.is_some() => {
                let value = parse_num(text, "RESOLUTION")?;
                if let Some(band) = self.band.as_mut() {
                    band.resolution = value;
                }
            }
            "MIN" | "MAX" | "CENTRAL" if self.band.is_some() && self.inside("Wavelength") => {
                let value: f64 = parse_num(text, current)?;
                if let Some(band) = self.band.as_mut() {
                    match current {
                        "MIN" => band.wavelength_min = value,
                        "MAX" => band.wavelength_max = value,
                        _ => band.wavelength_central = value,
                    }
                }
            }
            "QUANTIFICATION_VALUE" | "L2A_BOA_QUANTIFICATION_VALUE" => {
                self.meta.resample_data.quantification_value = parse_num(text, current)?;
            }
            "L2A_AOT_QUANTIFICATION_VALUE" => {
                self.meta.resample_data.aot_quantification_value = Some(parse_num(text, current)?);
            }
            "L2A_WVP_QUANTIFICATION_VALUE" => {
                self.meta.resample_data.wvp_quantification_value = Some(parse_num(text, current)?);
            }
            "U" if self.inside("Reflectance_Conversion") => {
                self.meta.resample_data.reflectance_conversion.u = parse_num(text, current)?;
            }
            "SOLAR_IRRADIANCE" => {
                let value: f64 = parse_num(text, current)?;
                let irradiances = &mut self.meta.resample_data.reflectance_conversion.solar_irradiances;
                match self.irradiance_band {
                    Some(band_id) => {
                        if irradiances.len() <= band_id {
                            irradiances.resize(band_id + 1, f64::NAN);
                        }
                        irradiances[band_id] = value;
                    }
                    None => irradiances.push(value),
                }
            }
            "HORIZONTAL_CS_NAME" => {
                if let Some(tile) = self.tile.as_mut() {
                    tile.tile.horizontal_cs_name = text.to_string();
                }
            }
            "HORIZONTAL_CS_CODE" => {
                if let Some(tile) = self.tile.as_mut() {
                    tile.tile.horizontal_cs_code = text.to_string();
                }
            }
            "NROWS" | "NCOLS" => {
                let value: usize = parse_num(text, current)?;
                if let (Some(tile), Some(res)) = (self.tile.as_mut(), self.resolution) {
                    let entry = tile.sizes.entry(res).or_insert((0, 0));
                    if current == "NROWS" {
                        entry.0 = value;
                    } else {
                        entry.1 = value;
                    }
                }
            }
            "ULX" | "ULY" | "XDIM" | "YDIM" => {
                let value: f64 = parse_num(text, current)?;
                if let (Some(tile), Some(res)) = (self.tile.as_mut(), self.resolution) {
                    let entry = tile.positions.entry(res).or_insert([0.0; 4]);
                    let slot = match current {
                        "ULX" => 0,
                        "ULY" => 1,
                        "XDIM" => 2,
                        _ => 3,
                    };
                    entry[slot] = value;
                }
            }
            "VALUES" if self.inside("Values_List") => {
                let row = parse_angle_row(text)?;
                if let (Some(grid), Some(kind)) = (self.grid.as_mut(), self.angle) {
                    match kind {
                        AngleKind::Zenith => grid.zenith.push(row),
                        AngleKind::Azimuth => grid.azimuth.push(row),
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn parse_events<R: BufRead>(mut reader: Reader<R>) -> Result<ProductMetadata, MetadataError> {
    let mut state = ParseState::default();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => state.start(e)?,
            Event::Empty(ref e) => {
                state.start(e)?;
                state.end()?;
            }
            Event::End(_) => state.end()?,
            Event::Text(e) => {
                let text = e.unescape()?;
                state.text(&text)?;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let meta = state.meta;
    if meta.product_characteristics.band_informations.is_empty() {
        return Err(MetadataError::MissingField("Spectral_Information"));
    }
    debug!(
        "Metadata: {} band(s), {} tile(s)",
        meta.product_characteristics.band_informations.len(),
        meta.tiles.len()
    );
    Ok(meta)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Level-1C_User_Product>
  <General_Info>
    <Product_Info>
      <Datatake>
        <SPACECRAFT_NAME>Sentinel-2A</SPACECRAFT_NAME>
      </Datatake>
      <DATASET_PRODUCTION_DATE>2013-06-26T14:01:00Z</DATASET_PRODUCTION_DATE>
      <PROCESSING_LEVEL>Level-1C</PROCESSING_LEVEL>
    </Product_Info>
    <Product_Image_Characteristics>
      <QUANTIFICATION_VALUE unit="none">3413</QUANTIFICATION_VALUE>
      <Reflectance_Conversion>
        <U>1.030577302</U>
        <Solar_Irradiance_List>
          <SOLAR_IRRADIANCE bandId="0" unit="W/m2/um">1895.27</SOLAR_IRRADIANCE>
          <SOLAR_IRRADIANCE bandId="1" unit="W/m2/um">1962.16</SOLAR_IRRADIANCE>
        </Solar_Irradiance_List>
      </Reflectance_Conversion>
      <Spectral_Information_List>
        <Spectral_Information bandId="0" physicalBand="B1">
          <RESOLUTION>60</RESOLUTION>
          <Wavelength>
            <MIN unit="nm">430</MIN>
            <MAX unit="nm">457</MAX>
            <CENTRAL unit="nm">443</CENTRAL>
          </Wavelength>
        </Spectral_Information>
        <Spectral_Information bandId="1" physicalBand="B2">
          <RESOLUTION>10</RESOLUTION>
          <Wavelength>
            <MIN unit="nm">440</MIN>
            <MAX unit="nm">538</MAX>
            <CENTRAL unit="nm">490</CENTRAL>
          </Wavelength>
        </Spectral_Information>
      </Spectral_Information_List>
    </Product_Image_Characteristics>
  </General_Info>
  <Geometric_Info>
    <Tile tileId="15SUC">
      <HORIZONTAL_CS_NAME>WGS84 / UTM zone 15N</HORIZONTAL_CS_NAME>
      <HORIZONTAL_CS_CODE>EPSG:32615</HORIZONTAL_CS_CODE>
      <Size resolution="10"><NROWS>10960</NROWS><NCOLS>10960</NCOLS></Size>
      <Size resolution="60"><NROWS>1826</NROWS><NCOLS>1826</NCOLS></Size>
      <Geoposition resolution="10">
        <ULX>299940</ULX><ULY>4300060</ULY><XDIM>10</XDIM><YDIM>-10</YDIM>
      </Geoposition>
      <Geoposition resolution="60">
        <ULX>299940</ULX><ULY>4300060</ULY><XDIM>60</XDIM><YDIM>-60</YDIM>
      </Geoposition>
      <Sun_Angles_Grid>
        <Zenith>
          <Values_List>
            <VALUES>30.1 30.2 NaN</VALUES>
            <VALUES>30.3 30.4 30.5</VALUES>
          </Values_List>
        </Zenith>
        <Azimuth>
          <Values_List>
            <VALUES>150.0 150.5 151.0</VALUES>
            <VALUES>NaN NaN NaN</VALUES>
          </Values_List>
        </Azimuth>
      </Sun_Angles_Grid>
      <Viewing_Incidence_Angles_Grids bandId="1" detectorId="4">
        <Zenith><Values_List><VALUES>5.0 NaN</VALUES></Values_List></Zenith>
        <Azimuth><Values_List><VALUES>NaN 100.0</VALUES></Values_List></Azimuth>
      </Viewing_Incidence_Angles_Grids>
    </Tile>
    <Tile tileId="15SUD">
      <HORIZONTAL_CS_NAME>WGS84 / UTM zone 15N</HORIZONTAL_CS_NAME>
      <HORIZONTAL_CS_CODE>EPSG:32615</HORIZONTAL_CS_CODE>
      <Size resolution="10"><NROWS>10960</NROWS><NCOLS>10960</NCOLS></Size>
      <Geoposition resolution="10">
        <ULX>299940</ULX><ULY>4400060</ULY><XDIM>10</XDIM><YDIM>-10</YDIM>
      </Geoposition>
    </Tile>
  </Geometric_Info>
</Level-1C_User_Product>
"#;

    #[test]
    fn test_product_characteristics() {
        let meta = ProductMetadata::parse_str(SAMPLE).unwrap();
        let pc = &meta.product_characteristics;
        assert_eq!(pc.spacecraft, "Sentinel-2A");
        assert_eq!(pc.processing_level, "Level-1C");
        assert_eq!(pc.dataset_production_date, "2013-06-26T14:01:00Z");
        assert_eq!(pc.band_informations.len(), 2);
        let b2 = meta.band_information(1).unwrap();
        assert_eq!(b2.physical_band, "B2");
        assert_eq!(b2.resolution, 10);
        assert_eq!(b2.wavelength_min, 440.0);
        assert_eq!(b2.wavelength_max, 538.0);
        assert_eq!(b2.wavelength_central, 490.0);
    }

    #[test]
    fn test_resample_data() {
        let meta = ProductMetadata::parse_str(SAMPLE).unwrap();
        assert_eq!(meta.resample_data.quantification_value, 3413.0);
        assert!((meta.resample_data.reflectance_conversion.u - 1.030577302).abs() < 1e-12);
        assert_eq!(meta.solar_irradiance(0), Some(1895.27));
        assert_eq!(meta.solar_irradiance(1), Some(1962.16));
        assert_eq!(meta.solar_irradiance(2), None);
    }

    pub(crate) const SAMPLE_L2A: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Level-2A_User_Product>
  <General_Info>
    <L2A_Product_Info>
      <PROCESSING_LEVEL>Level-2A</PROCESSING_LEVEL>
      <Datatake>
        <SPACECRAFT_NAME>Sentinel-2A</SPACECRAFT_NAME>
      </Datatake>
    </L2A_Product_Info>
    <L2A_Product_Image_Characteristics>
      <L1C_L2A_Quantification_Values_List>
        <L1C_TOA_QUANTIFICATION_VALUE unit="none">1000</L1C_TOA_QUANTIFICATION_VALUE>
        <L2A_BOA_QUANTIFICATION_VALUE unit="none">10000</L2A_BOA_QUANTIFICATION_VALUE>
        <L2A_AOT_QUANTIFICATION_VALUE unit="none">1000.0</L2A_AOT_QUANTIFICATION_VALUE>
        <L2A_WVP_QUANTIFICATION_VALUE unit="cm">1000.0</L2A_WVP_QUANTIFICATION_VALUE>
      </L1C_L2A_Quantification_Values_List>
      <Reflectance_Conversion>
        <U>0.9672</U>
        <Solar_Irradiance_List>
          <SOLAR_IRRADIANCE bandId="1" unit="W/m2/um">1941.63</SOLAR_IRRADIANCE>
        </Solar_Irradiance_List>
      </Reflectance_Conversion>
      <Spectral_Information_List>
        <Spectral_Information bandId="0" physicalBand="B1">
          <RESOLUTION>60</RESOLUTION>
        </Spectral_Information>
        <Spectral_Information bandId="1" physicalBand="B2">
          <RESOLUTION>10</RESOLUTION>
          <Wavelength>
            <MIN unit="nm">440</MIN>
            <MAX unit="nm">538</MAX>
            <CENTRAL unit="nm">490</CENTRAL>
          </Wavelength>
        </Spectral_Information>
      </Spectral_Information_List>
    </L2A_Product_Image_Characteristics>
  </General_Info>
  <Geometric_Info>
    <Tile tileId="32TNR">
      <HORIZONTAL_CS_NAME>WGS84 / UTM zone 32N</HORIZONTAL_CS_NAME>
      <HORIZONTAL_CS_CODE>EPSG:32632</HORIZONTAL_CS_CODE>
      <Size resolution="10"><NROWS>10980</NROWS><NCOLS>10980</NCOLS></Size>
      <Geoposition resolution="10">
        <ULX>499980</ULX><ULY>5200020</ULY><XDIM>10</XDIM><YDIM>-10</YDIM>
      </Geoposition>
    </Tile>
  </Geometric_Info>
</Level-2A_User_Product>
"#;

    #[test]
    fn test_level_2a_header() {
        let meta = ProductMetadata::parse_str(SAMPLE_L2A).unwrap();
        assert!(meta.is_level_2a());
        assert_eq!(meta.product_characteristics.processing_level, "Level-2A");
        // BOA scale, not the L1C TOA one listed next to it
        assert_eq!(meta.resample_data.quantification_value, 10000.0);
        assert_eq!(meta.resample_data.aot_quantification_value, Some(1000.0));
        assert_eq!(meta.resample_data.wvp_quantification_value, Some(1000.0));
        assert_eq!(meta.solar_irradiance(1), Some(1941.63));
        assert_eq!(meta.product_characteristics.band_informations.len(), 2);
        assert_eq!(meta.band_information(1).unwrap().wavelength_central, 490.0);
        assert_eq!(meta.tile("32TNR").unwrap().horizontal_cs_code, "EPSG:32632");

        let l1c = ProductMetadata::parse_str(SAMPLE).unwrap();
        assert!(!l1c.is_level_2a());
        assert_eq!(l1c.resample_data.aot_quantification_value, None);
    }

    #[test]
    fn test_tile_geometry() {
        let meta = ProductMetadata::parse_str(SAMPLE).unwrap();
        assert_eq!(meta.tiles.len(), 2);
        let tile = meta.tile("15SUC").unwrap();
        assert_eq!(tile.horizontal_cs_code, "EPSG:32615");
        assert_eq!(tile.horizontal_cs_name, "WGS84 / UTM zone 15N");
        let g10 = tile.geometry(SpatialResolution::R10M).unwrap();
        assert_eq!((g10.num_rows, g10.num_cols), (10960, 10960));
        assert_eq!((g10.x_dim, g10.y_dim), (10.0, -10.0));
        assert_eq!(g10.upper_left_y, 4300060.0);
        let g60 = tile.geometry(SpatialResolution::R60M).unwrap();
        assert_eq!(g60.num_rows, 1826);
        assert_eq!(g60.y_dim, -60.0);
        assert!(tile.geometry(SpatialResolution::R20M).is_err());
    }

    #[test]
    fn test_angle_grids_keep_nan() {
        let meta = ProductMetadata::parse_str(SAMPLE).unwrap();
        let tile = meta.tile("15SUC").unwrap();
        let sun = tile.sun_angles.as_ref().unwrap();
        assert_eq!(sun.zenith.dim(), (2, 3));
        assert!(sun.zenith[(0, 2)].is_nan());
        assert_eq!(sun.zenith[(1, 2)], 30.5);
        assert_eq!(sun.azimuth_nan_count(), 3);

        assert_eq!(tile.viewing_incidence_angles.len(), 1);
        let view = &tile.viewing_incidence_angles[0];
        assert_eq!(view.band_id, Some(1));
        assert_eq!(view.detector_id, Some(4));
        assert!(view.zenith[(0, 1)].is_nan());
        assert_eq!(view.azimuth[(0, 1)], 100.0);

        assert!(meta.tile("15SUD").unwrap().sun_angles.is_none());
    }

    #[test]
    fn test_duplicate_tile_is_rejected() {
        let xml = SAMPLE.replace("tileId=\"15SUD\"", "tileId=\"15SUC\"");
        assert!(matches!(
            ProductMetadata::parse_str(&xml),
            Err(MetadataError::DuplicateTile(id)) if id == "15SUC"
        ));
    }

    #[test]
    fn test_ragged_grid_is_a_parse_error() {
        let xml = SAMPLE.replace("30.3 30.4 30.5", "30.3 30.4");
        assert!(matches!(
            ProductMetadata::parse_str(&xml),
            Err(MetadataError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_band_table() {
        let xml = "<Level-1C_User_Product><General_Info/></Level-1C_User_Product>";
        assert!(matches!(
            ProductMetadata::parse_str(xml),
            Err(MetadataError::MissingField("Spectral_Information"))
        ));
    }
}
