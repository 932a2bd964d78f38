//! YOLO dataset curation
//!
//! This library scores detector output against YOLO ground truth to find the
//! images most in need of manual correction, and prepares the datasets around
//! that loop: COCO conversion, image gathering, splitting, label cleanup and
//! merging corrected images back in.

pub mod coco;
pub mod coco_dataset;
pub mod config;
pub mod curation;
pub mod dataset;
pub mod error;
pub mod evaluate;
pub mod io;
pub mod labels;
pub mod predict;
pub mod scoring;
pub mod types;
pub mod utils;

// Re-export commonly used types and functions
pub use config::{Cli, Command};
pub use error::{Error, LabelError, Result};
pub use evaluate::{run_scoring, ScoreReport};
pub use labels::{LabelDir, LabelSource};
pub use predict::{DetectionThresholds, Detector, PredictionDir};
pub use scoring::{intersection_over_union, score_image, select_hardest};
pub use types::{Annotation, BoundingBox, Detection, ImageScore};

// Dataset preparation exports
pub use coco_dataset::convert_coco_dataset;
pub use curation::{clean_and_merge, gather_images};
pub use dataset::split_dataset;
pub use labels::fix_label_files;
