use gdal::Dataset;
use gdal::Metadata;
use gdal::spatial_ref::SpatialRef;
use serde_json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Descriptive fields written alongside an exported band raster
#[derive(Debug, Clone, Default)]
pub struct ExportMetadata {
    pub product_name: String,
    pub product_type: String,
    pub spacecraft: Option<String>,
    pub start_time: Option<String>,
    pub stop_time: Option<String>,
    pub band_name: String,
    pub band_index: usize,
    pub native_resolution: u32,
    pub wavelength: f64,
    pub bandwidth: f64,
    pub solar_irradiance: f64,
    pub quantification_value: f64,
    pub level: usize,
    pub pixel_size: f64,
    pub tile_count: usize,
    pub fill_value: u16,
    pub geotransform: Option<[f64; 6]>,
    pub crs: Option<String>,
    pub crs_name: Option<String>,
}

/// Flatten export metadata into upper-case GDAL metadata items
pub fn extract_metadata_fields(meta: &ExportMetadata) -> HashMap<String, String> {
    let mut metadata = HashMap::new();

    metadata.insert("PRODUCT_NAME".to_string(), meta.product_name.clone());
    metadata.insert("PRODUCT_TYPE".to_string(), meta.product_type.clone());
    if let Some(spacecraft) = &meta.spacecraft {
        metadata.insert("SPACECRAFT".to_string(), spacecraft.clone());
    }
    if let Some(start) = &meta.start_time {
        metadata.insert("PRODUCT_START_TIME".to_string(), start.clone());
    }
    if let Some(stop) = &meta.stop_time {
        metadata.insert("PRODUCT_STOP_TIME".to_string(), stop.clone());
    }

    // Band description
    metadata.insert("BAND_NAME".to_string(), meta.band_name.clone());
    metadata.insert("BAND_INDEX".to_string(), meta.band_index.to_string());
    metadata.insert(
        "NATIVE_RESOLUTION".to_string(),
        meta.native_resolution.to_string(),
    );
    metadata.insert("WAVELENGTH".to_string(), meta.wavelength.to_string());
    metadata.insert("BANDWIDTH".to_string(), meta.bandwidth.to_string());
    metadata.insert(
        "SOLAR_IRRADIANCE".to_string(),
        meta.solar_irradiance.to_string(),
    );
    metadata.insert(
        "QUANTIFICATION_VALUE".to_string(),
        meta.quantification_value.to_string(),
    );

    // Mosaic
    metadata.insert("LEVEL".to_string(), meta.level.to_string());
    metadata.insert("PIXEL_SIZE".to_string(), meta.pixel_size.to_string());
    metadata.insert("TILE_COUNT".to_string(), meta.tile_count.to_string());
    metadata.insert("FILL_VALUE".to_string(), meta.fill_value.to_string());
    if let Some(name) = &meta.crs_name {
        metadata.insert("CRS_NAME".to_string(), name.clone());
    }

    metadata.insert("CONVERSION_TOOL".to_string(), env!("CARGO_PKG_NAME").to_string());
    metadata.insert(
        "CONVERSION_VERSION".to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    metadata.insert(
        "CONVERSION_TIMESTAMP".to_string(),
        chrono::Utc::now().to_rfc3339(),
    );

    metadata
}

/// Convert metadata HashMap to JSON format
pub fn convert_metadata_to_json(
    metadata: &HashMap<String, String>,
) -> HashMap<String, serde_json::Value> {
    let mut json_metadata = HashMap::new();

    for (key, value) in metadata {
        let json_key = key.to_lowercase();

        // Numbers stay numbers; everything else is a string
        let json_value = value
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(value.clone()));
        json_metadata.insert(json_key, json_value);
    }

    json_metadata
}

/// Adds the array-valued georeferencing fields
pub fn add_special_json_fields(
    json_metadata: &mut HashMap<String, serde_json::Value>,
    meta: &ExportMetadata,
) {
    if let Some(geotransform) = meta.geotransform {
        let values: Vec<serde_json::Value> = geotransform
            .iter()
            .filter_map(|&v| serde_json::Number::from_f64(v))
            .map(serde_json::Value::Number)
            .collect();
        json_metadata.insert("geotransform".to_string(), serde_json::Value::Array(values));
    }

    if let Some(crs) = meta.crs.as_deref().filter(|c| !c.is_empty()) {
        json_metadata.insert("crs".to_string(), serde_json::Value::String(crs.to_string()));
    }
}

/// WKT of a CRS given as `EPSG:<code>`, WKT or any other OSR user input
pub fn crs_to_wkt(crs: &str) -> Result<String, Box<dyn std::error::Error>> {
    Ok(SpatialRef::from_definition(crs)?.to_wkt()?)
}

/// Embed georeferencing and band metadata into a GeoTIFF dataset
pub fn embed_tiff_metadata(
    ds: &mut Dataset,
    meta: &ExportMetadata,
) -> Result<(), Box<dyn std::error::Error>> {
    // Projection is only meaningful together with a geotransform
    if let Some(gt) = meta.geotransform {
        ds.set_geo_transform(&gt)?;
        if let Some(crs) = meta.crs.as_deref().filter(|c| !c.is_empty()) {
            ds.set_projection(&crs_to_wkt(crs)?)?;
        }
    }

    for (key, value) in extract_metadata_fields(meta) {
        ds.set_metadata_item(&key, &value, "")?;
    }

    Ok(())
}

/// Create a JSON sidecar next to `output_path`
pub fn create_metadata_sidecar(
    output_path: &Path,
    meta: &ExportMetadata,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let metadata = extract_metadata_fields(meta);
    let mut json_metadata = convert_metadata_to_json(&metadata);
    add_special_json_fields(&mut json_metadata, meta);

    let sidecar_path = output_path.with_extension("json");
    let json_string = serde_json::to_string_pretty(&json_metadata)?;
    std::fs::write(&sidecar_path, json_string)?;

    info!("Created metadata sidecar: {:?}", sidecar_path);
    Ok(sidecar_path)
}
