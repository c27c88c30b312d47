use image::GrayImage;

use super::convolve::separable_convolve;

// sign kernel [-1,0,1] separable with scale kernel [1,2,1] in the
// orthogonal direction, and symmetrically for Gy.
const SIGN: [f32; 3] = [-1.0, 0.0, 1.0];
const SCALE: [f32; 3] = [1.0, 2.0, 1.0];

pub fn sobel_gx(plane: &GrayImage) -> Vec<f32> {
    separable_convolve(plane, &SCALE, &SIGN)
}

pub fn sobel_gy(plane: &GrayImage) -> Vec<f32> {
    separable_convolve(plane, &SIGN, &SCALE)
}

pub fn sobel(plane: &GrayImage) -> Vec<f32> {
    let gx = sobel_gx(plane);
    let gy = sobel_gy(plane);
    gx.iter()
        .zip(gy.iter())
        .map(|(&x, &y)| (x * x + y * y).sqrt())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn flat_image_has_zero_gradient() {
        let plane = GrayImage::from_pixel(8, 8, Luma([128]));
        let mag = sobel(&plane);
        assert!(mag.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn vertical_edge_produces_horizontal_gradient() {
        let plane = GrayImage::from_fn(6, 6, |x, _| Luma([if x < 3 { 0 } else { 255 }]));
        let mag = sobel(&plane);
        // Interior columns straddling the edge should have non-zero
        // magnitude; far columns away from the edge should be flat.
        let (w, _) = plane.dimensions();
        let center = mag[(2 * w + 2) as usize];
        let far = mag[(2 * w + 0) as usize];
        assert!(center > far);
    }
}
