use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

// Supported image formats
pub const IMG_FORMATS: &[&str] = &[
    "bmp", "dng", "jpeg", "jpg", "mpo", "png", "tif", "tiff", "webp", "pfm",
];

// Precomputed HashSet of image extensions for fast lookup
pub static IMAGE_EXTENSIONS_SET: OnceLock<HashSet<String>> = OnceLock::new();

/// Get the image extensions set
pub fn get_image_extensions_set() -> &'static HashSet<String> {
    IMAGE_EXTENSIONS_SET.get_or_init(|| IMG_FORMATS.iter().map(|ext| ext.to_lowercase()).collect())
}

/// A normalized axis-aligned box in YOLO centre-size form.
///
/// All four values are relative to the image dimensions. A box with zero
/// width or height is kept as-is and simply has zero area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x_center: f64, y_center: f64, width: f64, height: f64) -> Self {
        Self {
            x_center,
            y_center,
            width,
            height,
        }
    }

    /// Corner form `(x1, y1, x2, y2)`.
    pub fn corners(&self) -> (f64, f64, f64, f64) {
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;
        (
            self.x_center - half_w,
            self.y_center - half_h,
            self.x_center + half_w,
            self.y_center + half_h,
        )
    }

    pub fn area(&self) -> f64 {
        let (x1, y1, x2, y2) = self.corners();
        (x2 - x1) * (y2 - y1)
    }
}

/// One labelled object: a class id and its box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub class_id: u32,
    pub bbox: BoundingBox,
}

/// One box produced by a detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub class_id: u32,
    pub bbox: BoundingBox,
    pub confidence: Option<f64>,
}

impl From<Detection> for Annotation {
    fn from(detection: Detection) -> Self {
        Annotation {
            class_id: detection.class_id,
            bbox: detection.bbox,
        }
    }
}

/// Per-image disagreement score, as written to `results.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageScore {
    #[serde(rename = "image")]
    pub image_id: String,
    pub error_score: f64,
    #[serde(rename = "num_gt")]
    pub num_ground_truth: usize,
    #[serde(rename = "num_pred")]
    pub num_predicted: usize,
}

/// Train/val/test proportions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitRatios {
    pub train: f64,
    pub val: f64,
    pub test: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.8,
            val: 0.1,
            test: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    pub fn dir_name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Items partitioned into the three splits.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitData<T> {
    pub train: Vec<T>,
    pub val: Vec<T>,
    pub test: Vec<T>,
}

impl<T> SplitData<T> {
    pub fn get(&self, split: Split) -> &[T] {
        match split {
            Split::Train => &self.train,
            Split::Val => &self.val,
            Split::Test => &self.test,
        }
    }
}

// Struct to hold the paths to the output directories for train/val/test splits
#[derive(Debug, Clone)]
pub struct OutputDirs {
    pub train_labels_dir: PathBuf,
    pub val_labels_dir: PathBuf,
    pub train_images_dir: PathBuf,
    pub val_images_dir: PathBuf,
    pub test_labels_dir: Option<PathBuf>,
    pub test_images_dir: Option<PathBuf>,
}

impl OutputDirs {
    /// `(images_dir, labels_dir)` for a split, `None` when the split is disabled.
    pub fn for_split(&self, split: Split) -> Option<(&PathBuf, &PathBuf)> {
        match split {
            Split::Train => Some((&self.train_images_dir, &self.train_labels_dir)),
            Split::Val => Some((&self.val_images_dir, &self.val_labels_dir)),
            Split::Test => self.test_images_dir.as_ref().zip(self.test_labels_dir.as_ref()),
        }
    }
}
