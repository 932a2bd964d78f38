//! Detection quality scoring
//!
//! Scores how far a set of predicted boxes is from the ground truth of one
//! image and ranks a batch of images so the worst ones can be sent back for
//! manual correction. The score is a cheap relative proxy, not mAP: there is
//! no confidence thresholding, no one-to-one assignment and class ids are not
//! compared.

use std::cmp::Ordering;

use crate::types::{BoundingBox, ImageScore};

/// Smoothing term added to every IoU denominator.
pub const IOU_EPSILON: f64 = 1e-6;

/// Fixed penalty for an image where one side has no boxes at all.
pub const EMPTY_SIDE_PENALTY: f64 = 5.0;

/// Penalty per box of difference between ground-truth and predicted counts.
pub const COUNT_MISMATCH_PENALTY: f64 = 0.5;

/// Default share of images selected by [`select_hardest`].
pub const DEFAULT_HARDEST_FRACTION: f64 = 0.1;

/// Intersection-over-union of two centre-size boxes.
///
/// Non-overlapping boxes give `0.0`. Two degenerate boxes give `0.0` rather
/// than a division error because of [`IOU_EPSILON`].
pub fn intersection_over_union(a: &BoundingBox, b: &BoundingBox) -> f64 {
    let (ax1, ay1, ax2, ay2) = a.corners();
    let (bx1, by1, bx2, by2) = b.corners();

    let inter_w = (ax2.min(bx2) - ax1.max(bx1)).max(0.0);
    let inter_h = (ay2.min(by2) - ay1.max(by1)).max(0.0);
    let inter_area = inter_w * inter_h;

    inter_area / (a.area() + b.area() - inter_area + IOU_EPSILON)
}

/// Disagreement between ground truth and predictions for one image. Higher is worse.
///
/// Each ground-truth box is matched to its best-overlapping prediction; a
/// prediction may serve as the best match for several ground-truth boxes.
pub fn score_image(ground_truth: &[BoundingBox], predicted: &[BoundingBox]) -> f64 {
    match (ground_truth.is_empty(), predicted.is_empty()) {
        (true, true) => 0.0,
        (true, false) => EMPTY_SIDE_PENALTY + predicted.len() as f64,
        (false, true) => EMPTY_SIDE_PENALTY + ground_truth.len() as f64,
        (false, false) => {
            let total_iou: f64 = ground_truth
                .iter()
                .map(|gt| {
                    predicted
                        .iter()
                        .map(|pred| intersection_over_union(gt, pred))
                        .fold(0.0, f64::max)
                })
                .sum();
            let avg_iou = total_iou / ground_truth.len() as f64;

            let count_diff = ground_truth.len().abs_diff(predicted.len());
            (1.0 - avg_iou) + COUNT_MISMATCH_PENALTY * count_diff as f64
        }
    }
}

/// Worst-first prefix of `scores`.
///
/// Keeps `max(1, floor(len * fraction))` entries, never more than `len`, and
/// nothing for an empty batch. Equal scores keep their input order.
pub fn select_hardest(mut scores: Vec<ImageScore>, fraction: f64) -> Vec<ImageScore> {
    if scores.is_empty() {
        return scores;
    }

    scores.sort_by(|a, b| {
        b.error_score
            .partial_cmp(&a.error_score)
            .unwrap_or(Ordering::Equal)
    });

    let keep = hardest_count(scores.len(), fraction);
    scores.truncate(keep);
    scores
}

/// Number of entries [`select_hardest`] keeps out of `total`.
pub fn hardest_count(total: usize, fraction: f64) -> usize {
    if total == 0 {
        return 0;
    }
    let wanted = (total as f64 * fraction).floor();
    // NaN and negative fractions fall through to the floor of one
    let wanted = if wanted.is_finite() && wanted > 0.0 {
        wanted as usize
    } else {
        0
    };
    wanted.max(1).min(total)
}
