//! Pure Rust template matching using Normalized Cross-Correlation (NCC).
//!
//! Large templates are matched coarse-to-fine: a search on a downsampled
//! copy of the screen proposes candidates, which are then re-scored at full
//! resolution in a small window. Scale and rotation are not searched.

pub mod templates;

use image::{imageops, GrayImage};
use serde::{Deserialize, Serialize};

pub use templates::TemplateStore;

/// Detection result with location and confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Center X coordinate
    pub x: i32,
    /// Center Y coordinate
    pub y: i32,
    /// Bounding box [x1, y1, x2, y2]
    pub box_coords: [i32; 4],
    /// Detection confidence (0.0 to 1.0)
    pub confidence: f32,
}

/// Smallest side a downsampled template may have
const MIN_COARSE_DIM: u32 = 12;
/// How far below the threshold a coarse hit may score and still be refined
const COARSE_SLACK: f32 = 0.2;
const MAX_CANDIDATES: usize = 16;

/// Find every occurrence of `template` in `screen` scoring at least `threshold`.
///
/// Returns detections sorted by confidence (highest first), with overlapping
/// hits suppressed.
pub fn find_template(screen: &GrayImage, template: &GrayImage, threshold: f32) -> Vec<Detection> {
    let (sw, sh) = screen.dimensions();
    let (tw, th) = template.dimensions();
    if tw == 0 || th == 0 || tw > sw || th > sh {
        return Vec::new();
    }

    let Some(stats) = TemplateStats::new(template) else {
        // Flat template (no variation), can't match reliably
        return Vec::new();
    };

    let factor = pyramid_factor(tw, th);
    let hits = if factor == 1 {
        scan(screen, template, &stats, threshold, (0, 0, sw - tw, sh - th))
    } else {
        coarse_to_fine(screen, template, &stats, threshold, factor)
    };

    let radius = (tw.max(th) / 2).max(1) as i32;
    suppress(hits, radius)
        .into_iter()
        .map(|(x, y, confidence)| {
            let (x, y) = (x as i32, y as i32);
            Detection {
                x: x + tw as i32 / 2,
                y: y + th as i32 / 2,
                box_coords: [x, y, x + tw as i32, y + th as i32],
                confidence,
            }
        })
        .collect()
}

/// Highest scoring detection, if any clears the threshold
pub fn best_match(screen: &GrayImage, template: &GrayImage, threshold: f32) -> Option<Detection> {
    find_template(screen, template, threshold).into_iter().next()
}

fn pyramid_factor(tw: u32, th: u32) -> u32 {
    let side = tw.min(th);
    if side >= MIN_COARSE_DIM * 4 {
        4
    } else if side >= MIN_COARSE_DIM * 2 {
        2
    } else {
        1
    }
}

fn coarse_to_fine(
    screen: &GrayImage,
    template: &GrayImage,
    stats: &TemplateStats,
    threshold: f32,
    factor: u32,
) -> Vec<(u32, u32, f32)> {
    let (sw, sh) = screen.dimensions();
    let (tw, th) = template.dimensions();

    let small_screen = imageops::resize(
        screen,
        sw / factor,
        sh / factor,
        imageops::FilterType::Triangle,
    );
    let small_tmpl = imageops::resize(
        template,
        tw / factor,
        th / factor,
        imageops::FilterType::Triangle,
    );
    let Some(small_stats) = TemplateStats::new(&small_tmpl) else {
        return Vec::new();
    };
    let (ssw, ssh) = small_screen.dimensions();
    let (stw, sth) = small_tmpl.dimensions();
    if stw > ssw || sth > ssh {
        return Vec::new();
    }

    let coarse = scan(
        &small_screen,
        &small_tmpl,
        &small_stats,
        (threshold - COARSE_SLACK).max(0.0),
        (0, 0, ssw - stw, ssh - sth),
    );
    let radius = (stw.max(sth) / 2).max(1) as i32;

    let max_x = sw - tw;
    let max_y = sh - th;
    let mut refined = Vec::new();
    for (cx, cy, _) in suppress(coarse, radius).into_iter().take(MAX_CANDIDATES) {
        let (fx, fy) = (cx * factor, cy * factor);
        let window = (
            fx.saturating_sub(factor),
            fy.saturating_sub(factor),
            (fx + factor).min(max_x),
            (fy + factor).min(max_y),
        );
        let best = scan(screen, template, stats, threshold, window)
            .into_iter()
            .max_by(|a, b| a.2.total_cmp(&b.2));
        if let Some(hit) = best {
            refined.push(hit);
        }
    }
    refined
}

/// Template pixels centred on their mean, plus their standard deviation
struct TemplateStats {
    centered: Vec<f32>,
    std: f32,
}

impl TemplateStats {
    fn new(tmpl: &GrayImage) -> Option<Self> {
        let pixels: Vec<f32> = tmpl.pixels().map(|p| p.0[0] as f32).collect();
        let n = pixels.len() as f32;
        let mean = pixels.iter().sum::<f32>() / n;
        let std = (pixels.iter().map(|&p| (p - mean).powi(2)).sum::<f32>() / n).sqrt();
        if std < 1e-6 {
            return None;
        }
        Some(Self {
            centered: pixels.into_iter().map(|p| p - mean).collect(),
            std,
        })
    }
}

/// Score every position in the inclusive window `(x0, y0, x1, y1)`
fn scan(
    img: &GrayImage,
    tmpl: &GrayImage,
    stats: &TemplateStats,
    threshold: f32,
    (x0, y0, x1, y1): (u32, u32, u32, u32),
) -> Vec<(u32, u32, f32)> {
    let mut matches = Vec::new();
    for y in y0..=y1 {
        for x in x0..=x1 {
            let ncc = ncc_at(img, x, y, tmpl, stats);
            if ncc >= threshold {
                matches.push((x, y, ncc));
            }
        }
    }
    matches
}

/// Compute NCC score for a single position
fn ncc_at(img: &GrayImage, x: u32, y: u32, tmpl: &GrayImage, stats: &TemplateStats) -> f32 {
    let (tw, th) = tmpl.dimensions();
    let n = (tw * th) as f32;

    let mut sum_img = 0.0f32;
    let mut sum_img_sq = 0.0f32;
    let mut sum_cross = 0.0f32;

    for ty in 0..th {
        let row = (ty * tw) as usize;
        for tx in 0..tw {
            let img_px = img.get_pixel(x + tx, y + ty).0[0] as f32;
            sum_img += img_px;
            sum_img_sq += img_px * img_px;
            sum_cross += img_px * stats.centered[row + tx as usize];
        }
    }

    let img_mean = sum_img / n;
    let img_var = sum_img_sq / n - img_mean * img_mean;
    let img_std = img_var.max(0.0).sqrt();

    if img_std < 1e-6 {
        return 0.0;
    }

    (sum_cross / (n * img_std * stats.std)).clamp(0.0, 1.0)
}

/// Non-maximum suppression: keep the best hit in each neighbourhood
fn suppress(mut hits: Vec<(u32, u32, f32)>, radius: i32) -> Vec<(u32, u32, f32)> {
    hits.sort_by(|a, b| b.2.total_cmp(&a.2));
    let mut kept: Vec<(u32, u32, f32)> = Vec::new();
    for hit in hits {
        let dominated = kept.iter().any(|k| {
            (hit.0 as i32 - k.0 as i32).abs() < radius && (hit.1 as i32 - k.1 as i32).abs() < radius
        });
        if !dominated {
            kept.push(hit);
        }
    }
    kept
}
