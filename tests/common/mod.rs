//! Synthetic Sentinel-2 product folders shared by the integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

pub const STEM: &str = "GPPL1C_054_20091210235100_20091210235130_0001";

pub struct TileSpec {
    pub id: &'static str,
    pub crs: &'static str,
    pub ulx: f64,
    pub uly: f64,
}

/// Three 16 px (160 m) tiles in a row, each shifted 8 px east of the previous.
pub fn row_of_tiles() -> Vec<TileSpec> {
    ["15SUA", "15SUB", "15SUC"]
        .into_iter()
        .enumerate()
        .map(|(i, id)| TileSpec {
            id,
            crs: "EPSG:32615",
            ulx: 300000.0 + i as f64 * 80.0,
            uly: 4500000.0,
        })
        .collect()
}

pub fn header_xml(tiles: &[TileSpec]) -> String {
    let mut tiles_xml = String::new();
    for t in tiles {
        tiles_xml.push_str(&format!(
            r#"
    <Tile tileId="{id}">
      <HORIZONTAL_CS_NAME>WGS84 / UTM</HORIZONTAL_CS_NAME>
      <HORIZONTAL_CS_CODE>{crs}</HORIZONTAL_CS_CODE>
      <Size resolution="10"><NROWS>16</NROWS><NCOLS>16</NCOLS></Size>
      <Geoposition resolution="10">
        <ULX>{ulx}</ULX><ULY>{uly}</ULY><XDIM>10</XDIM><YDIM>-10</YDIM>
      </Geoposition>
    </Tile>"#,
            id = t.id,
            crs = t.crs,
            ulx = t.ulx,
            uly = t.uly
        ));
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Level-1C_User_Product>
  <General_Info>
    <Product_Info>
      <Datatake><SPACECRAFT_NAME>Sentinel-2A</SPACECRAFT_NAME></Datatake>
    </Product_Info>
    <Product_Image_Characteristics>
      <QUANTIFICATION_VALUE unit="none">10000</QUANTIFICATION_VALUE>
      <Reflectance_Conversion>
        <U>1.0</U>
        <Solar_Irradiance_List>
          <SOLAR_IRRADIANCE bandId="1" unit="W/m2/um">1960.0</SOLAR_IRRADIANCE>
        </Solar_Irradiance_List>
      </Reflectance_Conversion>
      <Spectral_Information_List>
        <Spectral_Information bandId="0" physicalBand="B1">
          <RESOLUTION>60</RESOLUTION>
          <Wavelength><MIN unit="nm">430</MIN><MAX unit="nm">457</MAX><CENTRAL unit="nm">443</CENTRAL></Wavelength>
        </Spectral_Information>
        <Spectral_Information bandId="1" physicalBand="B2">
          <RESOLUTION>10</RESOLUTION>
          <Wavelength><MIN unit="nm">440</MIN><MAX unit="nm">538</MAX><CENTRAL unit="nm">490</CENTRAL></Wavelength>
        </Spectral_Information>
        <Spectral_Information bandId="2" physicalBand="B3">
          <RESOLUTION>10</RESOLUTION>
          <Wavelength><MIN unit="nm">537</MIN><MAX unit="nm">582</MAX><CENTRAL unit="nm">560</CENTRAL></Wavelength>
        </Spectral_Information>
        <Spectral_Information bandId="3" physicalBand="B4">
          <RESOLUTION>10</RESOLUTION>
          <Wavelength><MIN unit="nm">646</MIN><MAX unit="nm">684</MAX><CENTRAL unit="nm">665</CENTRAL></Wavelength>
        </Spectral_Information>
        <Spectral_Information bandId="4" physicalBand="B5">
          <RESOLUTION>20</RESOLUTION>
          <Wavelength><MIN unit="nm">694</MIN><MAX unit="nm">713</MAX><CENTRAL unit="nm">705</CENTRAL></Wavelength>
        </Spectral_Information>
      </Spectral_Information_List>
    </Product_Image_Characteristics>
  </General_Info>
  <Geometric_Info>{tiles_xml}
  </Geometric_Info>
</Level-1C_User_Product>
"#
    )
}

/// [`header_xml`] as a Level-2A header: BOA scale 9000, AOT scale 200 and no
/// WVP scale.
pub fn l2a_header_xml(tiles: &[TileSpec]) -> String {
    header_xml(tiles)
        .replace("Level-1C_User_Product", "Level-2A_User_Product")
        .replace(
            r#"<QUANTIFICATION_VALUE unit="none">10000</QUANTIFICATION_VALUE>"#,
            r#"<L1C_L2A_Quantification_Values_List>
        <L1C_TOA_QUANTIFICATION_VALUE unit="none">10000</L1C_TOA_QUANTIFICATION_VALUE>
        <L2A_BOA_QUANTIFICATION_VALUE unit="none">9000</L2A_BOA_QUANTIFICATION_VALUE>
        <L2A_AOT_QUANTIFICATION_VALUE unit="none">200</L2A_AOT_QUANTIFICATION_VALUE>
      </L1C_L2A_Quantification_Values_List>"#,
        )
}

pub fn img_name(band: usize, tile: &str) -> String {
    format!("IMG_{}_{:02}_{}.jp2", STEM, band, tile)
}

/// Writes a product folder; `images` lists (band index, tile id, content).
pub fn write_product(dir: &Path, tiles: &[TileSpec], images: &[(usize, &str, &str)]) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let mtd = dir.join(format!("MTD_{}.xml", STEM));
    std::fs::write(&mtd, header_xml(tiles)).unwrap();
    for (band, tile, content) in images {
        std::fs::write(dir.join(img_name(*band, tile)), content).unwrap();
    }
    mtd
}

