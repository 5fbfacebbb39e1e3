// Text region detection capability

use async_trait::async_trait;
use image::RgbaImage;
use tracing::{debug, trace};

use crate::core::types::Region;

/// Finds text regions in an image.
///
/// Implementations never fail: an unavailable model yields an empty list.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, image: &RgbaImage, confidence_threshold: f32) -> Vec<Region>;
}

/// Raw model output before filtering
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    pub bbox: [i32; 4],
    pub confidence: f32,
}

/// Turn raw boxes into the region list a `Detector` returns.
///
/// Drops boxes under the confidence threshold and degenerate boxes, removes
/// overlapping duplicates (IoU above `iou_threshold`, higher confidence wins)
/// and orders the survivors by width, widest first.
pub fn normalize_detections(
    detections: Vec<RawDetection>,
    confidence_threshold: f32,
    iou_threshold: f32,
) -> Vec<Region> {
    let total = detections.len();
    let mut sorted: Vec<(Region, f32)> = detections
        .into_iter()
        .filter(|d| d.confidence >= confidence_threshold)
        .filter_map(|d| {
            let [x1, y1, x2, y2] = d.bbox;
            Region::new(x1, y1, x2, y2).map(|region| (region, d.confidence))
        })
        .collect();
    sorted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut keep: Vec<Region> = Vec::new();
    for (candidate, confidence) in sorted {
        if let Some(kept) = keep.iter().find(|k| iou(k, &candidate) > iou_threshold) {
            trace!(
                "Suppressed {:?} ({:.2}) overlapping {:?}",
                candidate.as_array(),
                confidence,
                kept.as_array()
            );
            continue;
        }
        keep.push(candidate);
    }

    keep.sort_by_key(|region| std::cmp::Reverse(region.width()));
    debug!("Kept {}/{} detections", keep.len(), total);
    keep
}

fn iou(a: &Region, b: &Region) -> f32 {
    let x1 = a.x1().max(b.x1());
    let y1 = a.y1().max(b.y1());
    let x2 = a.x2().min(b.x2());
    let y2 = a.y2().min(b.y2());

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let intersection = ((x2 - x1) as f32) * ((y2 - y1) as f32);
    let area_a = a.width() as f32 * a.height() as f32;
    let area_b = b.width() as f32 * b.height() as f32;
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}
