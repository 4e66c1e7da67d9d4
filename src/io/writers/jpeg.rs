use jpeg_encoder::{ColorType, Encoder};
use ndarray::ArrayView2;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// 8-bit grayscale JPEG at full quality. JPEG caps both sides at 65535 pixels.
pub fn write_gray_jpeg(
    output: &Path,
    image: ArrayView2<'_, u8>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (rows, cols) = image.dim();
    let width = u16::try_from(cols).map_err(|_| format!("JPEG width {} exceeds 65535", cols))?;
    let height = u16::try_from(rows).map_err(|_| format!("JPEG height {} exceeds 65535", rows))?;
    let pixels: Vec<u8> = image.iter().copied().collect();
    let mut writer = BufWriter::new(File::create(output)?);
    Encoder::new(&mut writer, 100).encode(&pixels, width, height, ColorType::Luma)?;
    Ok(())
}
