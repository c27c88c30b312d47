use image::{GrayImage, Luma};
use imageproc::integral_image::{integral_image, integral_squared_image, sum_image_pixels};

use crate::error::{Error, Result};

use super::sobel::sobel;

#[derive(Debug, Clone, Copy, Default)]
pub struct IntegralRequest {
    pub sum: bool,
    pub sum_sq: bool,
    pub tilted: bool,
    pub sobel: bool,
}

impl IntegralRequest {
    pub fn any(&self) -> bool {
        self.sum || self.sum_sq || self.tilted || self.sobel
    }
}

#[derive(Debug, Clone)]
enum SatBacking {
    U32(image::ImageBuffer<Luma<u32>, Vec<u32>>),
    U64(image::ImageBuffer<Luma<u64>, Vec<u64>>),
}

// Wraps imageproc's running-sum image. Out-of-bounds lookups (x < 0, y < 0,
// or beyond the image) are zero, matching the open rectangle convention the
// detector's feature evaluation relies on.
#[derive(Debug, Clone)]
pub struct Sat {
    width: u32,
    height: u32,
    backing: SatBacking,
}

impl Sat {
    fn get(&self, x: i32, y: i32) -> i64 {
        if x < 0 || y < 0 {
            return 0;
        }
        self.rect_sum(0, 0, x + 1, y + 1)
    }

    /// Sum over the half-open rectangle `[x, x+w) x [y, y+h)`, clamped to
    /// the image bounds (there are no pixels outside it to contribute).
    pub fn rect_sum(&self, x: i32, y: i32, w: i32, h: i32) -> i64 {
        if w <= 0 || h <= 0 {
            return 0;
        }
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + w - 1).min(self.width as i32 - 1);
        let y1 = (y + h - 1).min(self.height as i32 - 1);
        if x0 > x1 || y0 > y1 {
            return 0;
        }
        match &self.backing {
            SatBacking::U32(img) => sum_image_pixels(img, x0 as u32, y0 as u32, x1 as u32, y1 as u32)[0] as i64,
            SatBacking::U64(img) => sum_image_pixels(img, x0 as u32, y0 as u32, x1 as u32, y1 as u32)[0] as i64,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

// Tilted (45-degree rotated) running-sum image. Rectangle sums over a
// tilted feature use the classic four-corner diagonal formula rather than
// the axis-aligned one Sat::rect_sum uses.
#[derive(Debug, Clone)]
pub struct Rsat {
    width: u32,
    height: u32,
    data: Vec<i64>,
}

impl Rsat {
    fn get(&self, x: i32, y: i32) -> i64 {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return 0;
        }
        self.data[(y as u32 * self.width + x as u32) as usize]
    }

    pub fn rect_sum(&self, x: i32, y: i32, w: i32, h: i32) -> i64 {
        if w <= 0 || h <= 0 {
            return 0;
        }
        let p0 = self.get(x, y);
        let p1 = self.get(x - h, y + h);
        let p2 = self.get(x + w, y + w);
        let p3 = self.get(x + w - h, y + w + h);
        p0 + p3 - p1 - p2
    }
}

pub struct IntegralImages {
    pub width: u32,
    pub height: u32,
    pub sum: Option<Sat>,
    pub sum_sq: Option<Sat>,
    pub tilted: Option<Rsat>,
    pub sobel: Option<Sat>,
}

/// Builds any subset of the four integral images in a single logical pass.
/// Fails with [`Error::Usage`] if no output was requested.
pub fn compute_integral_images(plane: &GrayImage, request: IntegralRequest) -> Result<IntegralImages> {
    if !request.any() {
        return Err(Error::Usage(
            "compute_integral_images: at least one of sum/sum_sq/tilted/sobel must be requested".into(),
        ));
    }

    let (width, height) = plane.dimensions();

    let sum = request.sum.then(|| Sat { width, height, backing: SatBacking::U32(integral_image(plane)) });
    let sum_sq = request
        .sum_sq
        .then(|| Sat { width, height, backing: SatBacking::U64(integral_squared_image(plane)) });
    let tilted = request.tilted.then(|| build_rsat(plane, width, height));
    let sobel_integral = request.sobel.then(|| {
        let magnitude = sobel(plane);
        let clamped = GrayImage::from_fn(width, height, |x, y| {
            Luma([magnitude[(y * width + x) as usize].round().clamp(0.0, 255.0) as u8])
        });
        Sat { width, height, backing: SatBacking::U32(integral_image(&clamped)) }
    });

    Ok(IntegralImages {
        width,
        height,
        sum,
        sum_sq,
        tilted,
        sobel: sobel_integral,
    })
}

fn rsat_get(data: &[i64], width: u32, height: u32, x: i32, y: i32) -> i64 {
    if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
        return 0;
    }
    data[(y as u32 * width + x as u32) as usize]
}

fn px(plane: &GrayImage, width: u32, height: u32, x: i32, y: i32) -> i64 {
    if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
        return 0;
    }
    plane.get_pixel(x as u32, y as u32).0[0] as i64
}

// R[x,y] = R[x-1,y-1] + R[x+1,y-1] - R[x,y-2] + I[x,y] + I[x,y-1]
fn build_rsat(plane: &GrayImage, width: u32, height: u32) -> Rsat {
    let mut data = vec![0i64; (width * height) as usize];
    for y in 0..height as i32 {
        for x in 0..width as i32 {
            let r_diag_left = rsat_get(&data, width, height, x - 1, y - 1);
            let r_diag_right = rsat_get(&data, width, height, x + 1, y - 1);
            let r_up2 = rsat_get(&data, width, height, x, y - 2);
            let i_here = px(plane, width, height, x, y);
            let i_above = px(plane, width, height, x, y - 1);
            data[(y as u32 * width + x as u32) as usize] =
                r_diag_left + r_diag_right - r_up2 + i_here + i_above;
        }
    }
    Rsat { width, height, data }
}
