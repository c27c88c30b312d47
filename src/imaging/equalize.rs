use image::GrayImage;

/// `step` subsamples the histogram-building pass; the CDF still normalizes
/// against the full pixel count, so a larger step trades fidelity for speed
/// without changing the output range.
pub fn equalize_hist(plane: &mut GrayImage, step: usize) {
    let step = step.max(1);
    let pixels: Vec<u8> = plane.pixels().map(|p| p.0[0]).collect();

    let mut histogram = [0u32; 256];
    let mut sampled = 0usize;
    for value in pixels.iter().step_by(step) {
        histogram[*value as usize] += 1;
        sampled += 1;
    }

    if sampled == 0 {
        return;
    }

    let scale = 255.0 * step as f64 / pixels.len() as f64;
    let mut cdf = [0u32; 256];
    let mut running = 0u32;
    for (bin, count) in histogram.iter().enumerate() {
        running += count;
        cdf[bin] = running;
    }

    let lut: Vec<u8> = cdf.iter().map(|&c| ((c as f64 * scale).round().clamp(0.0, 255.0)) as u8).collect();

    for p in plane.pixels_mut() {
        p.0[0] = lut[p.0[0] as usize];
    }
}

pub fn equalized(plane: &GrayImage, step: usize) -> GrayImage {
    let mut out = plane.clone();
    equalize_hist(&mut out, step);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn flat_image_stays_flat() {
        let mut plane = GrayImage::from_pixel(10, 10, Luma([128]));
        equalize_hist(&mut plane, 1);
        // A single-valued histogram maps everything to the same output
        // level, whatever that level ends up being.
        let first = plane.get_pixel(0, 0).0[0];
        assert!(plane.pixels().all(|p| p.0[0] == first));
    }

    #[test]
    fn spreads_a_narrow_range_wider() {
        let plane = GrayImage::from_fn(16, 16, |x, _| Luma([100 + (x % 4) as u8]));
        let eq = equalized(&plane, 1);
        let min = eq.pixels().map(|p| p.0[0]).min().unwrap();
        let max = eq.pixels().map(|p| p.0[0]).max().unwrap();
        assert!(max - min > 3);
    }

    #[test]
    fn step_greater_than_one_still_produces_a_valid_image() {
        let plane = GrayImage::from_fn(20, 20, |x, y| Luma([((x * 13 + y * 7) % 256) as u8]));
        let eq = equalized(&plane, 5);
        assert_eq!(eq.dimensions(), plane.dimensions());
    }
}
