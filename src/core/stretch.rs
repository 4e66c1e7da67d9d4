use ndarray::Array2;
use tracing::debug;

const LOW_PERCENTILE: f64 = 0.02;
const HIGH_PERCENTILE: f64 = 0.98;

/// Value at cumulative fraction `p` of a full-range u16 histogram.
fn percentile(histogram: &[u64], total: u64, p: f64) -> u16 {
    let target = ((total as f64) * p).ceil().max(1.0) as u64;
    let mut cumulative = 0u64;
    for (value, &count) in histogram.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return value as u16;
        }
    }
    u16::MAX
}

/// Linear 2-98 % stretch of reflectance counts to 8 bits for quicklooks.
///
/// Pixels equal to `fill_value` are excluded from the statistics and map to 0.
/// A flat image maps every valid pixel to 255.
pub fn stretch_to_u8(data: &Array2<u16>, fill_value: u16) -> Array2<u8> {
    let mut histogram = vec![0u64; u16::MAX as usize + 1];
    let mut total = 0u64;
    for &v in data.iter() {
        if v != fill_value {
            histogram[v as usize] += 1;
            total += 1;
        }
    }
    if total == 0 {
        return Array2::zeros(data.raw_dim());
    }

    let lo = percentile(&histogram, total, LOW_PERCENTILE) as f64;
    let hi = percentile(&histogram, total, HIGH_PERCENTILE) as f64;
    debug!("Stretch p02={} p98={} over {} valid pixels", lo, hi, total);

    let range = hi - lo;
    data.mapv(|v| {
        if v == fill_value {
            0
        } else if range <= 0.0 {
            255
        } else {
            (((v as f64 - lo) / range) * 255.0).round().clamp(0.0, 255.0) as u8
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_maps_to_full_range() {
        let data = Array2::from_shape_fn((10, 10), |(r, c)| (r * 10 + c + 1) as u16);
        let out = stretch_to_u8(&data, 0);
        assert_eq!(out[(0, 0)], 0);
        assert_eq!(out[(9, 9)], 255);
        assert!(out[(5, 0)] > 100 && out[(5, 0)] < 155);
    }

    #[test]
    fn test_fill_pixels_stay_black() {
        let mut data = Array2::from_elem((4, 4), 500u16);
        data[(0, 0)] = 0;
        let out = stretch_to_u8(&data, 0);
        assert_eq!(out[(0, 0)], 0);
        assert_eq!(out[(1, 1)], 255);
    }

    #[test]
    fn test_all_fill() {
        let out = stretch_to_u8(&Array2::zeros((3, 3)), 0);
        assert!(out.iter().all(|&v| v == 0));
    }
}
