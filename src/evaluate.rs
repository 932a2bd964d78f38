//! Batch scoring of a folder of images.
//!
//! Resolves ground truth and predictions for each image, scores them in
//! parallel, writes `results.json` and copies the hardest images for review.

use log::{info, warn};
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::config::ScoreArgs;
use crate::error::Result;
use crate::io::list_images;
use crate::labels::LabelSource;
use crate::predict::{DetectionThresholds, Detector};
use crate::scoring::{score_image, select_hardest};
use crate::types::{BoundingBox, ImageScore};
use crate::utils::create_progress_bar;

pub const RESULTS_FILE_NAME: &str = "results.json";

/// Outcome of one scoring run.
#[derive(Debug, Clone)]
pub struct ScoreReport {
    /// Every scored image, in input order.
    pub scores: Vec<ImageScore>,
    /// Worst-first selection copied to the hardest directory.
    pub hardest: Vec<ImageScore>,
    /// Images skipped because their labels or predictions could not be read.
    pub failed: usize,
    pub results_path: PathBuf,
}

/// Score one image: ground truth from `labels`, predictions from `detector`.
///
/// A missing label record counts as an image with no objects.
pub fn score_single_image(
    image_path: &Path,
    labels: &dyn LabelSource,
    detector: &dyn Detector,
    thresholds: DetectionThresholds,
) -> std::io::Result<ImageScore> {
    let image_id = image_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let ground_truth: Vec<BoundingBox> = labels
        .ground_truth(&image_id)?
        .unwrap_or_default()
        .into_iter()
        .map(|annotation| annotation.bbox)
        .collect();
    let predicted: Vec<BoundingBox> = detector
        .predict(image_path, thresholds)?
        .into_iter()
        .map(|detection| detection.bbox)
        .collect();

    Ok(ImageScore {
        error_score: score_image(&ground_truth, &predicted),
        num_ground_truth: ground_truth.len(),
        num_predicted: predicted.len(),
        image_id,
    })
}

/// Score a set of images in parallel. Failed images are logged and left out.
pub fn score_images(
    images: &[PathBuf],
    labels: &dyn LabelSource,
    detector: &dyn Detector,
    thresholds: DetectionThresholds,
) -> (Vec<ImageScore>, usize) {
    let pb = create_progress_bar(images.len() as u64, "Score");
    let results: Vec<Option<ImageScore>> = images
        .par_iter()
        .map(|image_path| {
            let result = score_single_image(image_path, labels, detector, thresholds);
            pb.inc(1);
            match result {
                Ok(score) => Some(score),
                Err(e) => {
                    warn!("Failed to score {}: {}", image_path.display(), e);
                    None
                }
            }
        })
        .collect();
    pb.finish_with_message("Scoring complete");

    let failed = results.iter().filter(|r| r.is_none()).count();
    (results.into_iter().flatten().collect(), failed)
}

/// Write the results manifest as a JSON array.
pub fn write_results(path: &Path, scores: &[ImageScore]) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, scores)?;
    Ok(())
}

/// Read a results manifest written by [`write_results`].
pub fn read_results(path: &Path) -> Result<Vec<ImageScore>> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
}

/// Full scoring run driven by `args`.
pub fn run_scoring(
    args: &ScoreArgs,
    labels: &dyn LabelSource,
    detector: &dyn Detector,
) -> Result<ScoreReport> {
    let images = list_images(&args.images_dir)?;
    info!(
        "Found {} images in {}",
        images.len(),
        args.images_dir.display()
    );

    let (scores, failed) = score_images(&images, labels, detector, args.thresholds());

    fs::create_dir_all(&args.output_dir)?;
    let results_path = args.output_dir.join(RESULTS_FILE_NAME);
    write_results(&results_path, &scores)?;
    info!("Wrote {}", results_path.display());

    let hardest = select_hardest(scores.clone(), args.fraction);
    let hardest_dir = args.hardest_dir();
    fs::create_dir_all(&hardest_dir)?;
    for item in &hardest {
        // Same name as the original, so a later merge can match it
        let src = args.images_dir.join(&item.image_id);
        if let Err(e) = fs::copy(&src, hardest_dir.join(&item.image_id)) {
            warn!("Failed to copy {}: {}", src.display(), e);
        }
    }

    info!("=== Scoring Summary ===");
    info!("Images scored: {}", scores.len());
    if failed > 0 {
        warn!("Images skipped after label or prediction errors: {}", failed);
    }
    if let Some(worst) = hardest.first() {
        info!("Worst image: {} (error {:.4})", worst.image_id, worst.error_score);
    }
    info!(
        "Copied {} hardest images to {}",
        hardest.len(),
        hardest_dir.display()
    );

    Ok(ScoreReport {
        scores,
        hardest,
        failed,
        results_path,
    })
}
