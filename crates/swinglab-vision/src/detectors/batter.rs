//! Batter selection among detected persons.

use image::RgbImage;
use serde::Serialize;
use swinglab_models::{BoundingBox, Detection};

/// Margin added around the batter before cropping.
pub const CROP_MARGIN: f64 = 0.1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatterSelection {
    pub detection: Detection,
    /// Absent when there was only one candidate
    pub relevance_score: Option<f64>,
}

/// Pick the person most likely to be the batter.
///
/// Larger, centered, upright boxes win. A lone person is returned unscored.
pub fn select_batter(persons: &[Detection], frame_size: (u32, u32)) -> Option<BatterSelection> {
    match persons {
        [] => None,
        [only] => Some(BatterSelection {
            detection: only.clone(),
            relevance_score: None,
        }),
        _ => {
            let mut best: Option<(f64, &Detection)> = None;
            for person in persons {
                let score = relevance(person, frame_size);
                if best.map_or(true, |(s, _)| score > s) {
                    best = Some((score, person));
                }
            }
            best.map(|(score, detection)| BatterSelection {
                detection: detection.clone(),
                relevance_score: Some(score),
            })
        }
    }
}

fn relevance(person: &Detection, (width, height): (u32, u32)) -> f64 {
    let (w, h) = (width as f64, height as f64);
    let bbox = &person.bbox;
    let mut score = 0.0;

    let area_ratio = if w * h > 0.0 { bbox.area() / (w * h) } else { 0.0 };
    if (0.05..=0.5).contains(&area_ratio) {
        score += area_ratio * 2.0;
    } else if area_ratio > 0.5 {
        // Probably a foreground object
        score += 0.5;
    }

    let max_distance = (w / 2.0).hypot(h / 2.0);
    if max_distance > 0.0 {
        let distance = (bbox.cx() - w / 2.0).hypot(bbox.cy() - h / 2.0);
        score += (1.0 - distance / max_distance) * 1.5;
    }

    let aspect = if bbox.height() > 0.0 {
        bbox.width() / bbox.height()
    } else {
        0.0
    };
    if (0.3..=0.7).contains(&aspect) {
        score += 1.0;
    } else if aspect > 0.7 && aspect <= 1.0 {
        score += 0.5;
    }

    score + person.confidence
}

/// Integer crop box around `bbox` with `margin` of its size on each side,
/// clipped to the frame.
pub fn crop_region(bbox: &BoundingBox, margin: f64, (width, height): (u32, u32)) -> BoundingBox {
    let x1 = bbox.x1.trunc();
    let y1 = bbox.y1.trunc();
    let x2 = bbox.x2.trunc();
    let y2 = bbox.y2.trunc();
    let mx = ((x2 - x1) * margin).trunc();
    let my = ((y2 - y1) * margin).trunc();

    BoundingBox::new(
        (x1 - mx).max(0.0),
        (y1 - my).max(0.0),
        (x2 + mx).min(width as f64),
        (y2 + my).min(height as f64),
    )
}

/// Copy the pixels inside `region`. Returns `None` for an empty region.
pub fn crop_image(frame: &RgbImage, region: &BoundingBox) -> Option<RgbImage> {
    let x = region.x1.max(0.0) as u32;
    let y = region.y1.max(0.0) as u32;
    let w = (region.x2.min(frame.width() as f64) as u32).saturating_sub(x);
    let h = (region.y2.min(frame.height() as f64) as u32).saturating_sub(y);
    if w == 0 || h == 0 {
        return None;
    }
    Some(image::imageops::crop_imm(frame, x, y, w, h).to_image())
}
