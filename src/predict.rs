//! Prediction interface
//!
//! The detector itself lives outside this crate. [`PredictionDir`] consumes
//! the label files a detector saved for each image (one `<stem>.txt` per
//! image, optional confidence in the sixth column).

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use crate::labels::{label_path_for, read_label_file};
use crate::scoring::intersection_over_union;
use crate::types::Detection;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.25;
pub const DEFAULT_NMS_IOU_THRESHOLD: f64 = 0.7;

/// Confidence and NMS IoU thresholds handed to a detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionThresholds {
    pub confidence: f64,
    pub iou: f64,
}

impl Default for DetectionThresholds {
    fn default() -> Self {
        Self {
            confidence: DEFAULT_CONFIDENCE_THRESHOLD,
            iou: DEFAULT_NMS_IOU_THRESHOLD,
        }
    }
}

/// Anything that turns an image into normalized detections.
pub trait Detector: Sync {
    fn predict(&self, image: &Path, thresholds: DetectionThresholds) -> io::Result<Vec<Detection>>;
}

/// Detections saved as label files next to each other in one directory.
#[derive(Debug, Clone)]
pub struct PredictionDir {
    root: PathBuf,
}

impl PredictionDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Detector for PredictionDir {
    fn predict(&self, image: &Path, thresholds: DetectionThresholds) -> io::Result<Vec<Detection>> {
        let image_id = image
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let path = label_path_for(&self.root, &image_id);
        if !path.is_file() {
            // The detector writes no file for an image without detections
            return Ok(Vec::new());
        }

        let detections = read_label_file(&path)?
            .into_iter()
            .filter(|d| d.confidence.map_or(true, |c| c >= thresholds.confidence))
            .collect();
        Ok(nms(detections, thresholds.iou))
    }
}

/// Class-aware non-maximum suppression.
///
/// Detections without a confidence rank above scored ones. Output is grouped
/// by class id, highest confidence first within each class.
pub fn nms(detections: Vec<Detection>, iou_threshold: f64) -> Vec<Detection> {
    if detections.is_empty() {
        return detections;
    }

    let mut class_groups: BTreeMap<u32, Vec<Detection>> = BTreeMap::new();
    for detection in detections {
        class_groups
            .entry(detection.class_id)
            .or_default()
            .push(detection);
    }

    let mut all_results = Vec::new();
    for (_, mut class_detections) in class_groups {
        class_detections.sort_by(|a, b| {
            let a_conf = a.confidence.unwrap_or(f64::INFINITY);
            let b_conf = b.confidence.unwrap_or(f64::INFINITY);
            b_conf.partial_cmp(&a_conf).unwrap_or(Ordering::Equal)
        });

        let mut suppressed = vec![false; class_detections.len()];
        for i in 0..class_detections.len() {
            if suppressed[i] {
                continue;
            }
            all_results.push(class_detections[i]);

            for j in (i + 1)..class_detections.len() {
                if !suppressed[j]
                    && intersection_over_union(&class_detections[i].bbox, &class_detections[j].bbox)
                        > iou_threshold
                {
                    suppressed[j] = true;
                }
            }
        }
    }

    all_results
}
