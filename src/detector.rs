use image::GrayImage;
use imageproc::rect::Rect;

use crate::cascade::Cascade;
use crate::error::{Error, Result};
use crate::imaging::{compute_integral_images, IntegralImages, IntegralRequest};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorParams {
    pub initial_scale: f64,
    pub scale_factor: f64,
    pub step_size: f64,
    /// `0.0` disables the Sobel-based early rejection entirely.
    pub edges_density: f64,
    /// `0` disables merge filtering: every surviving window is returned,
    /// ungrouped.
    pub neighbors: u32,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            initial_scale: 1.0,
            scale_factor: 1.1,
            step_size: 1.0,
            edges_density: 0.0,
            neighbors: 2,
        }
    }
}

impl DetectorParams {
    pub fn validate(&self) -> Result<()> {
        if self.scale_factor <= 1.0 {
            return Err(Error::Usage("scale_factor must be > 1.0".into()));
        }
        if self.initial_scale < 1.0 {
            return Err(Error::Usage("initial_scale must be >= 1.0".into()));
        }
        if self.step_size < 1.0 {
            return Err(Error::Usage("step_size must be >= 1.0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Detection {
    pub rect: Rect,
    pub neighbors: u32,
}

// Entering -> EdgeRejected | VarianceComputed -> Stage(0) -> ... -> Accepted,
// with any Stage(k) able to fall through to Rejected. Rejection is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Entering,
    EdgeRejected,
    VarianceComputed,
    Stage(u32),
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy)]
struct RawWindow {
    x: i32,
    y: i32,
    w: i32,
    h: i32,
    scale: f64,
}

pub fn detect(plane: &GrayImage, cascade: &Cascade, params: &DetectorParams) -> Result<Vec<Detection>> {
    params.validate()?;
    let (width, height) = plane.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::Usage("detect: image has zero dimensions".into()));
    }

    let integrals = compute_integral_images(
        plane,
        IntegralRequest { sum: true, sum_sq: true, tilted: true, sobel: params.edges_density > 0.0 },
    )?;

    tracing::debug!(width, height, stages = cascade.stage_count(), "starting multi-scale scan");
    let raw = scan_all_scales(width, height, cascade, params, &integrals);
    let merged = merge(raw, params.neighbors);
    tracing::debug!(detections = merged.len(), "scan complete");
    Ok(merged)
}

// Scales scan concurrently; raw survivors sort back into the same order
// before merging so the result matches the serial path exactly.
#[cfg(feature = "rayon")]
pub fn detect_parallel(plane: &GrayImage, cascade: &Cascade, params: &DetectorParams) -> Result<Vec<Detection>> {
    use rayon::prelude::*;

    params.validate()?;
    let (width, height) = plane.dimensions();
    if width == 0 || height == 0 {
        return Err(Error::Usage("detect_parallel: image has zero dimensions".into()));
    }

    let integrals = compute_integral_images(
        plane,
        IntegralRequest { sum: true, sum_sq: true, tilted: true, sobel: params.edges_density > 0.0 },
    )?;

    let scales = scale_sequence(width, height, cascade, params);
    let raw: Vec<RawWindow> = scales
        .into_par_iter()
        .flat_map(|scale| scan_one_scale(width, height, scale, cascade, params, &integrals))
        .collect();

    Ok(merge(raw, params.neighbors))
}

fn scale_sequence(width: u32, height: u32, cascade: &Cascade, params: &DetectorParams) -> Vec<f64> {
    let win_w = cascade.window_width() as f64;
    let win_h = cascade.window_height() as f64;
    let mut scale = params.initial_scale;
    let mut scales = Vec::new();
    while scale * win_w <= width as f64 && scale * win_h <= height as f64 {
        scales.push(scale);
        scale *= params.scale_factor;
    }
    scales
}

fn scan_all_scales(
    width: u32,
    height: u32,
    cascade: &Cascade,
    params: &DetectorParams,
    integrals: &IntegralImages,
) -> Vec<RawWindow> {
    let mut out = Vec::new();
    for scale in scale_sequence(width, height, cascade, params) {
        out.extend(scan_one_scale(width, height, scale, cascade, params, integrals));
    }
    out
}

fn scan_one_scale(
    width: u32,
    height: u32,
    scale: f64,
    cascade: &Cascade,
    params: &DetectorParams,
    integrals: &IntegralImages,
) -> Vec<RawWindow> {
    let sw = (scale * cascade.window_width() as f64).floor() as i32;
    let sh = (scale * cascade.window_height() as f64).floor() as i32;
    let step = ((params.step_size * scale).floor() as i32).max(1);

    let mut out = Vec::new();
    let mut y = 0i32;
    while y + sh <= height as i32 {
        let mut x = 0i32;
        while x + sw <= width as i32 {
            if evaluate_window(x, y, sw, sh, scale, cascade, params, integrals) == WindowState::Accepted {
                out.push(RawWindow { x, y, w: sw, h: sh, scale });
            }
            x += step;
        }
        y += step;
    }
    out
}

// Largest magnitude the Sobel kernels in imaging::sobel can produce for an
// 8-bit plane ([1,2,1] sums to a gain of 4 per orientation).
fn max_sobel_magnitude() -> f64 {
    let max_channel = 4.0 * 255.0;
    (2.0 * max_channel * max_channel).sqrt()
}

fn evaluate_window(
    x: i32,
    y: i32,
    sw: i32,
    sh: i32,
    scale: f64,
    cascade: &Cascade,
    params: &DetectorParams,
    integrals: &IntegralImages,
) -> WindowState {
    tracing::trace!(x, y, state = ?WindowState::Entering, "evaluating window");

    if params.edges_density > 0.0 {
        let sobel_sat = integrals.sobel.as_ref().expect("sobel integral requested but missing");
        let area = (sw * sh) as f64;
        let mean_magnitude = sobel_sat.rect_sum(x, y, sw, sh) as f64 / area;
        let density = mean_magnitude / max_sobel_magnitude();
        if density < params.edges_density {
            return WindowState::EdgeRejected;
        }
    }

    let sum = integrals.sum.as_ref().expect("sum integral missing");
    let sum_sq = integrals.sum_sq.as_ref().expect("squared integral missing");
    let area = (sw * sh) as f64;
    let total = sum.rect_sum(x, y, sw, sh) as f64;
    let total_sq = sum_sq.rect_sum(x, y, sw, sh) as f64;
    let mean = total / area;
    let variance = (total_sq / area - mean * mean).max(0.0);
    let mut sigma = variance.sqrt();
    if sigma < 1.0 {
        sigma = 1.0;
    }

    let mut state = WindowState::VarianceComputed;
    for (stage_index, stage) in cascade.stages().enumerate() {
        let mut stage_sum = 0.0;
        for weak in stage.weaks() {
            let feature_value = evaluate_feature(&weak, x, y, scale, integrals);
            let normalized = feature_value / sigma;
            stage_sum += if normalized < weak.node_threshold { weak.leaf_left } else { weak.leaf_right };
        }
        if stage_sum < stage.threshold {
            return WindowState::Rejected;
        }
        state = WindowState::Stage(stage_index as u32);
    }

    tracing::trace!(x, y, ?state, "window passed all stages");
    WindowState::Accepted
}

fn evaluate_feature(weak: &crate::cascade::Weak<'_>, x: i32, y: i32, scale: f64, integrals: &IntegralImages) -> f64 {
    let scale_sq = scale * scale;
    let mut total = 0.0;
    for rect in weak.rects() {
        let rx = x + (rect.x as f64 * scale).round() as i32;
        let ry = y + (rect.y as f64 * scale).round() as i32;
        let rw = (rect.width as f64 * scale).round() as i32;
        let rh = (rect.height as f64 * scale).round() as i32;

        let sum = if weak.tilted {
            integrals
                .tilted
                .as_ref()
                .expect("tilted integral missing for a tilted feature")
                .rect_sum(rx, ry, rw, rh)
        } else {
            integrals.sum.as_ref().expect("sum integral missing").rect_sum(rx, ry, rw, rh)
        };

        total += sum as f64 * rect.weight;
    }
    total / scale_sq
}

fn merge(mut raw: Vec<RawWindow>, neighbors: u32) -> Vec<Detection> {
    // Ordering guarantee: scale ascending, then y, then x.
    raw.sort_by(|a, b| {
        a.scale
            .partial_cmp(&b.scale)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.y.cmp(&b.y))
            .then(a.x.cmp(&b.x))
    });

    if neighbors == 0 {
        return raw
            .into_iter()
            .map(|w| Detection { rect: Rect::at(w.x, w.y).of_size(w.w as u32, w.h as u32), neighbors: 1 })
            .collect();
    }

    let mut groups: Vec<Vec<RawWindow>> = Vec::new();
    'windows: for window in raw {
        for group in groups.iter_mut() {
            if overlaps(&group[0], &window) {
                group.push(window);
                continue 'windows;
            }
        }
        groups.push(vec![window]);
    }

    groups
        .into_iter()
        .filter(|g| g.len() as u32 >= neighbors + 1)
        .map(|g| average_group(&g))
        .collect()
}

fn overlaps(a: &RawWindow, b: &RawWindow) -> bool {
    let min_side = a.w.min(a.h).min(b.w).min(b.h) as f64;
    let (cax, cay) = (a.x as f64 + a.w as f64 / 2.0, a.y as f64 + a.h as f64 / 2.0);
    let (cbx, cby) = (b.x as f64 + b.w as f64 / 2.0, b.y as f64 + b.h as f64 / 2.0);
    let center_distance = ((cax - cbx).powi(2) + (cay - cby).powi(2)).sqrt();
    center_distance < min_side * 0.2 || iou(a, b) >= 0.5
}

fn iou(a: &RawWindow, b: &RawWindow) -> f64 {
    let ix1 = a.x.max(b.x);
    let iy1 = a.y.max(b.y);
    let ix2 = (a.x + a.w).min(b.x + b.w);
    let iy2 = (a.y + a.h).min(b.y + b.h);
    if ix2 <= ix1 || iy2 <= iy1 {
        return 0.0;
    }
    let intersection = ((ix2 - ix1) * (iy2 - iy1)) as f64;
    let area_a = (a.w * a.h) as f64;
    let area_b = (b.w * b.h) as f64;
    intersection / (area_a + area_b - intersection)
}

fn average_group(group: &[RawWindow]) -> Detection {
    let n = group.len() as i32;
    let x = group.iter().map(|w| w.x).sum::<i32>() / n;
    let y = group.iter().map(|w| w.y).sum::<i32>() / n;
    let w = (group.iter().map(|w| w.w).sum::<i32>() / n).max(0);
    let h = (group.iter().map(|w| w.h).sum::<i32>() / n).max(0);
    Detection { rect: Rect::at(x, y).of_size(w as u32, h as u32), neighbors: group.len() as u32 }
}
