use image::GrayImage;
use imageproc::rect::Rect;
use ndarray::{Array2, Axis};

/// Last column has no right neighbor; treated as identical to the current
/// pixel, so its gradient is zero.
pub fn gradient_x(plane: &GrayImage) -> Vec<f64> {
    let (w, h) = plane.dimensions();
    let mut out = vec![0.0; (w * h) as usize];
    for y in 0..h {
        for x in 0..w {
            let here = plane.get_pixel(x, y).0[0] as f64;
            let right = if x + 1 < w { plane.get_pixel(x + 1, y).0[0] as f64 } else { here };
            let d = right - here;
            out[(y * w + x) as usize] = d * d;
        }
    }
    out
}

pub fn gradient_y(plane: &GrayImage) -> Vec<f64> {
    let (w, h) = plane.dimensions();
    let mut out = vec![0.0; (w * h) as usize];
    for y in 0..h {
        for x in 0..w {
            let here = plane.get_pixel(x, y).0[0] as f64;
            let below = if y + 1 < h { plane.get_pixel(x, y + 1).0[0] as f64 } else { here };
            let d = below - here;
            out[(y * w + x) as usize] = d * d;
        }
    }
    out
}

pub fn projection_x(values: &[f64], width: u32, height: u32, roi: Option<Rect>) -> Vec<f64> {
    let (x0, x1, y0, y1) = roi_bounds(width, height, roi);
    let plane = Array2::from_shape_vec((height as usize, width as usize), values.to_vec())
        .expect("values.len() must equal width * height");
    let region = plane.slice(ndarray::s![y0 as usize..y1 as usize, x0 as usize..x1 as usize]);
    region.sum_axis(Axis(0)).to_vec()
}

pub fn projection_y(values: &[f64], width: u32, height: u32, roi: Option<Rect>) -> Vec<f64> {
    let (x0, x1, y0, y1) = roi_bounds(width, height, roi);
    let plane = Array2::from_shape_vec((height as usize, width as usize), values.to_vec())
        .expect("values.len() must equal width * height");
    let region = plane.slice(ndarray::s![y0 as usize..y1 as usize, x0 as usize..x1 as usize]);
    region.sum_axis(Axis(1)).to_vec()
}

fn roi_bounds(width: u32, height: u32, roi: Option<Rect>) -> (u32, u32, u32, u32) {
    match roi {
        Some(r) => (
            r.left().max(0) as u32,
            (r.left() + r.width() as i32).min(width as i32) as u32,
            r.top().max(0) as u32,
            (r.top() + r.height() as i32).min(height as i32) as u32,
        ),
        None => (0, width, 0, height),
    }
}

/// Ties resolve to the first occurrence.
pub fn find_max_index(seq: &[f64], before: usize, after: usize) -> usize {
    assert!(!seq.is_empty(), "find_max_index: seq must not be empty");
    let window = before + after + 1;
    let mut best_index = 0usize;
    let mut best_value = f64::NEG_INFINITY;

    for i in 0..seq.len() {
        let start = i.saturating_sub(before);
        let end = (i + after + 1).min(seq.len());
        let sum: f64 = seq[start..end].iter().sum();
        let avg = sum / window.min(end - start) as f64;
        if avg > best_value {
            best_value = avg;
            best_index = i;
        }
    }
    best_index
}

fn hann(n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

pub fn horizontal_symmetry(plane: &GrayImage) -> usize {
    let (w, h) = plane.dimensions();
    let window = hann(w as usize);
    let mut columns = vec![0.0; w as usize];
    for y in 0..h {
        for x in 0..w {
            columns[x as usize] += plane.get_pixel(x, y).0[0] as f64;
        }
    }
    for (c, weight) in columns.iter_mut().zip(window.iter()) {
        *c *= weight;
    }
    find_max_index(&columns, 0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn gradient_is_zero_on_flat_plane() {
        let plane = GrayImage::from_pixel(5, 5, Luma([10]));
        assert!(gradient_x(&plane).iter().all(|&v| v == 0.0));
        assert!(gradient_y(&plane).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn last_column_has_zero_horizontal_gradient() {
        let plane = GrayImage::from_fn(4, 1, |x, _| Luma([(x * 60) as u8]));
        let g = gradient_x(&plane);
        assert_eq!(g[3], 0.0);
    }

    #[test]
    fn find_max_index_picks_first_tie() {
        let seq = [1.0, 5.0, 5.0, 1.0];
        assert_eq!(find_max_index(&seq, 0, 0), 1);
    }

    #[test]
    fn projection_respects_roi() {
        let w = 4;
        let h = 4;
        let values: Vec<f64> = (0..w * h).map(|i| i as f64).collect();
        let roi = Rect::at(1, 1).of_size(2, 2);
        let proj = projection_x(&values, w, h, Some(roi));
        assert_eq!(proj.len(), 2);
    }

    #[test]
    fn symmetry_axis_is_centered_for_a_mirrored_image() {
        let plane = GrayImage::from_fn(10, 10, |x, _| {
            let d = (x as i32 - 4).unsigned_abs() as u8;
            Luma([255 - d * 20])
        });
        let axis = horizontal_symmetry(&plane);
        assert!((axis as i32 - 4).abs() <= 1);
    }
}
