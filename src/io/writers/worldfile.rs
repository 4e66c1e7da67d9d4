use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// World file path for an image: `.jgw` for JPEG, `.tfw` for TIFF, `.pgw`
/// for PNG, otherwise the extension's first letter plus `w`.
pub fn world_file_path(output_image: &Path) -> PathBuf {
    let ext = output_image
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let world_ext = match ext.as_str() {
        "jpg" | "jpeg" => "jgw".to_string(),
        "png" => "pgw".to_string(),
        "tif" | "tiff" => "tfw".to_string(),
        other => match other.chars().next() {
            Some(first) => format!("{}w", first),
            None => "wld".to_string(),
        },
    };
    output_image.with_extension(world_ext)
}

/// Write a world file next to the raster image using the provided geotransform.
/// The world file stores the transform in pixel-center convention.
pub fn write_world_file(
    output_image: &Path,
    geotransform: [f64; 6],
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let world_path = world_file_path(output_image);

    // A: pixel size in X, D: rotation about Y, B: rotation about X, E: pixel size Y
    // C, F: center of upper-left pixel
    let a = geotransform[1];
    let d = geotransform[4];
    let b = geotransform[2];
    let e = geotransform[5];
    let c = geotransform[0] + 0.5 * a + 0.5 * b;
    let f = geotransform[3] + 0.5 * d + 0.5 * e;

    let mut file = File::create(&world_path)?;
    for value in [a, d, b, e, c, f] {
        writeln!(file, "{:.12}", value)?;
    }
    Ok(world_path)
}

/// Write a .prj file with the provided projection (WKT or EPSG:XXXX)
pub fn write_prj_file(
    output_image: &Path,
    projection: &str,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let prj_path = output_image.with_extension("prj");
    std::fs::write(&prj_path, projection.as_bytes())?;
    Ok(prj_path)
}
