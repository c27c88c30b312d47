use image::{GrayImage, Luma};
use imageproc::geometric_transformations::{rotate, Interpolation};

use crate::error::{Error, Result};
use crate::geometry::{self, Point};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeParams {
    pub offset_percent: (f64, f64),
    pub dest_size: u32,
}

impl Default for NormalizeParams {
    fn default() -> Self {
        Self { offset_percent: (0.5, 0.5), dest_size: 150 }
    }
}

impl NormalizeParams {
    pub fn validate(&self) -> Result<()> {
        if self.dest_size == 0 {
            return Err(Error::Usage("dest_size must be > 0".into()));
        }
        Ok(())
    }
}

// eye_left == eye_right is a degenerate case (distance 0) rather than an
// error: the result is an all-white dest_size x dest_size image.
pub fn normalize(source: &GrayImage, eye_left: Point, eye_right: Point, params: &NormalizeParams) -> Result<GrayImage> {
    params.validate()?;

    let distance = geometry::distance(eye_left, eye_right);
    let (ox, oy) = params.offset_percent;
    let off_x = (ox * distance).round();
    let off_y = (oy * distance).round();
    let edge = (distance + 2.0 * off_x).round().max(0.0) as u32;

    if edge == 0 || distance == 0.0 {
        return Ok(GrayImage::from_pixel(params.dest_size, params.dest_size, Luma([255])));
    }

    let angle = geometry::angle(eye_left, eye_right, false);
    let (cx, cy) = geometry::center_f64(eye_left, eye_right);

    let rotated = rotate(source, (cx as f32, cy as f32), -(angle as f32), Interpolation::Bilinear, Luma([255]));

    // After rotating the image by `-angle` about the eye midpoint, the eye
    // line is horizontal and both eyes sit at `(center +/- distance/2,
    // center_y)` in the rotated frame, independent of the original angle.
    let top_left_x = (cx - distance / 2.0 - off_x).round() as i32;
    let top_left_y = (cy - off_y).round() as i32;

    let canvas = paste_into_white_canvas(&rotated, top_left_x, top_left_y, edge);
    let resized = image::imageops::resize(&canvas, params.dest_size, params.dest_size, image::imageops::FilterType::Triangle);
    Ok(resized)
}

// Crops the edge x edge square at (x, y), clamped to the source bounds; a
// region smaller than edge x edge is centered into a white edge x edge canvas.
fn paste_into_white_canvas(image: &GrayImage, x: i32, y: i32, edge: u32) -> GrayImage {
    let mut canvas = GrayImage::from_pixel(edge, edge, Luma([255]));
    let (sw, sh) = image.dimensions();

    let src_x0 = x.max(0);
    let src_y0 = y.max(0);
    let src_x1 = (x + edge as i32).min(sw as i32);
    let src_y1 = (y + edge as i32).min(sh as i32);

    if src_x1 <= src_x0 || src_y1 <= src_y0 {
        return canvas;
    }

    let valid_w = (src_x1 - src_x0) as u32;
    let valid_h = (src_y1 - src_y0) as u32;
    let paste_x = (edge - valid_w) / 2;
    let paste_y = (edge - valid_h) / 2;

    for dy in 0..valid_h {
        for dx in 0..valid_w {
            let px = *image.get_pixel(src_x0 as u32 + dx, src_y0 as u32 + dy);
            canvas.put_pixel(paste_x + dx, paste_y + dy, px);
        }
    }
    canvas
}
