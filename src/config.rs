use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

use crate::predict::{DetectionThresholds, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_NMS_IOU_THRESHOLD};
use crate::scoring::DEFAULT_HARDEST_FRACTION;
use crate::types::SplitRatios;

/// Curate YOLO detection datasets: convert, split, clean labels and surface
/// the images a model gets most wrong.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Score saved predictions against ground truth and copy the hardest images
    Score(ScoreArgs),
    /// Convert a COCO annotation file into a split YOLO dataset
    Convert(ConvertArgs),
    /// Collect the images referenced by a COCO file into one directory
    Gather(GatherArgs),
    /// Split a flat images/labels dataset into train and val
    Split(SplitArgs),
    /// Drop label lines whose class id is out of range
    FixLabels(FixLabelsArgs),
    /// Rebuild a dataset from the originals and the corrected hardest images
    Merge(MergeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ScoreArgs {
    /// Directory of images to score
    #[arg(long = "images_dir", default_value = "dataset/images")]
    pub images_dir: PathBuf,

    /// Directory of ground-truth label files
    #[arg(long = "labels_dir", default_value = "dataset/labels")]
    pub labels_dir: PathBuf,

    /// Directory of label files saved by the detector, one per image
    #[arg(long = "predictions_dir")]
    pub predictions_dir: PathBuf,

    /// Directory for results.json and the hardest images
    #[arg(long = "output_dir", default_value = "inference_results")]
    pub output_dir: PathBuf,

    /// Name of the folder, under output_dir, receiving the hardest images
    #[arg(long = "hardest_dir", default_value = "hardest_10_percent")]
    pub hardest_dir_name: String,

    /// Share of images to select as hardest
    #[arg(long = "fraction", default_value_t = DEFAULT_HARDEST_FRACTION, value_parser = validate_fraction)]
    pub fraction: f64,

    /// Minimum detection confidence
    #[arg(long = "conf", default_value_t = DEFAULT_CONFIDENCE_THRESHOLD, value_parser = validate_size)]
    pub confidence: f64,

    /// IoU threshold for non-maximum suppression
    #[arg(long = "iou", default_value_t = DEFAULT_NMS_IOU_THRESHOLD, value_parser = validate_size)]
    pub iou: f64,
}

impl ScoreArgs {
    pub fn thresholds(&self) -> DetectionThresholds {
        DetectionThresholds {
            confidence: self.confidence,
            iou: self.iou,
        }
    }

    pub fn hardest_dir(&self) -> PathBuf {
        self.output_dir.join(&self.hardest_dir_name)
    }
}

#[derive(Args, Debug, Clone)]
pub struct ConvertArgs {
    /// COCO annotation file
    #[arg(long = "coco_json")]
    pub coco_json: PathBuf,

    /// Directory holding every image referenced by the COCO file
    #[arg(long = "images_root")]
    pub images_root: PathBuf,

    /// Output directory of the YOLO dataset
    #[arg(long = "output_dir", default_value = "yolo_dataset")]
    pub output_dir: PathBuf,

    /// Proportion of images used for training
    #[arg(long = "train_size", default_value_t = 0.8, value_parser = validate_size)]
    pub train_size: f64,

    /// Proportion of images used for validation
    #[arg(long = "val_size", default_value_t = 0.1, value_parser = validate_size)]
    pub val_size: f64,

    /// Proportion of images used for testing
    #[arg(long = "test_size", default_value_t = 0.1, value_parser = validate_size)]
    pub test_size: f64,

    /// Seed for random shuffling
    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,

    /// Ordered class names to keep; their position is the YOLO class id.
    /// All categories are kept, in id order, when empty
    #[arg(use_value_delimiter = true)]
    pub classes: Vec<String>,
}

impl ConvertArgs {
    pub fn ratios(&self) -> SplitRatios {
        SplitRatios {
            train: self.train_size,
            val: self.val_size,
            test: self.test_size,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct GatherArgs {
    /// COCO annotation file listing the images
    #[arg(long = "coco_json")]
    pub coco_json: PathBuf,

    /// Destination directory
    #[arg(long = "dest")]
    pub dest: PathBuf,

    /// Directories searched in order, directly and then recursively
    #[arg(long = "search_root", required = true)]
    pub search_roots: Vec<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct SplitArgs {
    /// Dataset directory containing images/ and labels/
    #[arg(long = "source", default_value = "dataset/clean_dataset")]
    pub source: PathBuf,

    /// Output directory for the split dataset
    #[arg(long = "output_dir", default_value = "dataset/split_dataset")]
    pub output_dir: PathBuf,

    /// Proportion of images used for training, the rest goes to val
    #[arg(long = "train_size", default_value_t = 0.8, value_parser = validate_size)]
    pub train_size: f64,

    /// Seed for random shuffling
    #[arg(long = "seed", default_value_t = 42)]
    pub seed: u64,
}

impl SplitArgs {
    pub fn ratios(&self) -> SplitRatios {
        SplitRatios {
            train: self.train_size,
            val: 1.0 - self.train_size,
            test: 0.0,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct FixLabelsArgs {
    /// Label directories to fix in place
    #[arg(required = true)]
    pub labels_dirs: Vec<PathBuf>,

    /// Highest valid class id
    #[arg(long = "max_class_id", default_value_t = 4)]
    pub max_class_id: u32,
}

#[derive(Args, Debug, Clone)]
pub struct MergeArgs {
    /// Original images
    #[arg(long = "images_dir", default_value = "dataset/images")]
    pub images_dir: PathBuf,

    /// Original labels
    #[arg(long = "labels_dir", default_value = "dataset/labels")]
    pub labels_dir: PathBuf,

    /// Images that were sent for review; replaced by their corrected versions
    #[arg(long = "hardest_dir", default_value = "inference_results/hardest_10_percent")]
    pub hardest_dir: PathBuf,

    /// Corrected labels for the reviewed images
    #[arg(long = "corrected_labels_dir", default_value = "dataset/corrected_images_labels")]
    pub corrected_labels_dir: PathBuf,

    /// Output directory receiving images/ and labels/
    #[arg(long = "output_dir", default_value = "dataset/clean_dataset")]
    pub output_dir: PathBuf,
}

// Validate that the size is between 0.0 and 1.0
pub fn validate_size(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("SIZE must be between 0.0 and 1.0".to_string()),
    }
}

// Validate that the fraction is in (0.0, 1.0]
pub fn validate_fraction(s: &str) -> Result<f64, String> {
    match f64::from_str(s) {
        Ok(val) if val > 0.0 && val <= 1.0 => Ok(val),
        _ => Err("FRACTION must be greater than 0.0 and at most 1.0".to_string()),
    }
}
