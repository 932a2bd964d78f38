use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::Path;

use crate::config::SplitArgs;
use crate::error::{Error, Result};
use crate::io::{list_images, setup_output_directories};
use crate::labels::label_path_for;
use crate::types::{Split, SplitData, SplitRatios};
use crate::utils::{create_progress_bar, try_copy_into};

/// Sizes of the train, val and test splits for `total` items.
///
/// Train and val are floored; the last enabled split takes the remainder, so
/// val absorbs it when the test ratio is zero.
pub fn split_counts(total: usize, ratios: SplitRatios) -> (usize, usize, usize) {
    let n_train = ((total as f64 * ratios.train).floor() as usize).min(total);
    if ratios.test > 0.0 {
        let n_val = ((total as f64 * ratios.val).floor() as usize).min(total - n_train);
        (n_train, n_val, total - n_train - n_val)
    } else {
        (n_train, total - n_train, 0)
    }
}

/// Shuffle with a seeded RNG and partition into train/val/test.
pub fn split_items<T>(mut items: Vec<T>, ratios: SplitRatios, seed: u64) -> SplitData<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    items.shuffle(&mut rng);

    let (n_train, n_val, _) = split_counts(items.len(), ratios);
    let test = items.split_off(n_train + n_val);
    let val = items.split_off(n_train);

    SplitData {
        train: items,
        val,
        test,
    }
}

/// Counters reported by [`split_dataset`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SplitStats {
    pub train_images: usize,
    pub val_images: usize,
    pub missing_labels: usize,
    /// Images or labels that could not be copied.
    pub failed: usize,
}

/// Split `source/images` + `source/labels` into `output/{images,labels}/{train,val}`.
pub fn split_dataset(args: &SplitArgs) -> Result<SplitStats> {
    let source_images = args.source.join("images");
    let source_labels = args.source.join("labels");
    if !source_images.is_dir() {
        return Err(Error::InvalidArgument(format!(
            "{} does not exist; expected images/ and labels/ under {}",
            source_images.display(),
            args.source.display()
        )));
    }

    let image_files = list_images(&source_images)?;
    info!(
        "Found {} images in {}",
        image_files.len(),
        source_images.display()
    );

    let split = split_items(image_files, args.ratios(), args.seed);
    info!("Splitting dataset:");
    info!("  Training images: {}", split.train.len());
    info!("  Validation images: {}", split.val.len());

    let output_dirs = setup_output_directories(&args.output_dir, false)?;
    let mut stats = SplitStats {
        train_images: split.train.len(),
        val_images: split.val.len(),
        missing_labels: 0,
        failed: 0,
    };

    for part in [Split::Train, Split::Val] {
        let Some((images_dir, labels_dir)) = output_dirs.for_split(part) else {
            continue;
        };
        let files = split.get(part);
        let pb = create_progress_bar(files.len() as u64, &part.to_string());
        for image_path in files {
            pb.inc(1);
            if !try_copy_into(image_path, images_dir) {
                stats.failed += 1;
                continue;
            }
            match copy_label(image_path, &source_labels, labels_dir) {
                LabelCopy::Copied => {}
                LabelCopy::Missing => stats.missing_labels += 1,
                LabelCopy::Failed => stats.failed += 1,
            }
        }
        pb.finish_with_message(format!("{} copy complete", part));
    }

    if stats.missing_labels > 0 {
        warn!("{} images had no label file", stats.missing_labels);
    }
    if stats.failed > 0 {
        warn!("{} files could not be copied", stats.failed);
    }
    info!("Dataset split complete: {}", args.output_dir.display());
    Ok(stats)
}

enum LabelCopy {
    Copied,
    Missing,
    Failed,
}

fn copy_label(image_path: &Path, source_labels: &Path, labels_dir: &Path) -> LabelCopy {
    let image_name = image_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let label_path = label_path_for(source_labels, &image_name);
    if !label_path.is_file() {
        warn!("Label not found for {}", image_name);
        LabelCopy::Missing
    } else if try_copy_into(&label_path, labels_dir) {
        LabelCopy::Copied
    } else {
        LabelCopy::Failed
    }
}
