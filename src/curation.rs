//! Image gathering and clean-dataset rebuilding.

use jwalk::WalkDir;
use log::{debug, info, warn};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::coco::CocoFile;
use crate::config::{GatherArgs, MergeArgs};
use crate::error::Result;
use crate::io::list_images;
use crate::labels::label_path_for;
use crate::utils::{
    create_progress_bar, is_contained_relative_path, is_same_file, try_copy_into,
};

/// Counters reported by [`gather_images`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GatherStats {
    pub found: usize,
    pub missing: usize,
    /// Images found but not copied.
    pub failed: usize,
}

/// Locate `name` under the search roots.
///
/// Each root is tried directly first and then recursively; the first hit wins.
pub fn find_image(name: &str, search_roots: &[PathBuf]) -> Option<PathBuf> {
    for root in search_roots {
        let candidate = root.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }

        let file_name = Path::new(name).file_name()?;
        let hit = WalkDir::new(root)
            .sort(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .find(|entry| entry.file_type().is_file() && entry.file_name() == file_name);
        if let Some(entry) = hit {
            return Some(entry.path());
        }
    }
    None
}

/// Copy every image referenced by a COCO file into `args.dest`.
pub fn gather_images(args: &GatherArgs) -> Result<GatherStats> {
    let coco = CocoFile::from_path(&args.coco_json)?;
    let names: BTreeSet<&str> = coco.images.iter().map(|im| im.file_name.as_str()).collect();
    fs::create_dir_all(&args.dest)?;

    let mut stats = GatherStats::default();
    let pb = create_progress_bar(names.len() as u64, "Gather");
    for name in names {
        if !is_contained_relative_path(name) {
            warn!("Refusing file name outside the search roots: {}", name);
            stats.missing += 1;
        } else {
            match find_image(name, &args.search_roots) {
                Some(hit) => {
                    let dst = args.dest.join(name);
                    if is_same_file(&hit, &dst) {
                        debug!("Already in place: {}", dst.display());
                        stats.found += 1;
                    } else if let Err(e) = copy_file(&hit, &dst) {
                        warn!("Failed to copy {} to {}: {}", hit.display(), dst.display(), e);
                        stats.failed += 1;
                    } else {
                        stats.found += 1;
                    }
                }
                None => {
                    warn!("Missing: {}", name);
                    stats.missing += 1;
                }
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("Gathering complete");

    info!("Consolidated {} images to {}", stats.found, args.dest.display());
    if stats.missing > 0 {
        warn!(
            "Missing {} images that were not found in the search roots",
            stats.missing
        );
    }
    if stats.failed > 0 {
        warn!("Failed to copy {} images", stats.failed);
    }
    Ok(stats)
}

fn copy_file(src: &Path, dst: &Path) -> std::io::Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dst).map(|_| ())
}

/// Counters reported by [`clean_and_merge`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub removed: usize,
    pub kept_images: usize,
    pub kept_labels: usize,
    pub corrected_images: usize,
    pub corrected_labels: usize,
    /// Images or labels that could not be copied.
    pub failed: usize,
}

/// Rebuild a dataset: originals minus the reviewed images, plus the reviewed
/// images with their corrected labels.
pub fn clean_and_merge(args: &MergeArgs) -> Result<MergeStats> {
    let cleaned_images = args.output_dir.join("images");
    let cleaned_labels = args.output_dir.join("labels");
    fs::create_dir_all(&cleaned_images)?;
    fs::create_dir_all(&cleaned_labels)?;

    let reviewed = if args.hardest_dir.is_dir() {
        list_images(&args.hardest_dir)?
    } else {
        warn!("{} does not exist", args.hardest_dir.display());
        Vec::new()
    };
    let bad_filenames: HashSet<String> = reviewed
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect();
    info!("Found {} images to replace.", bad_filenames.len());

    let mut stats = MergeStats {
        removed: bad_filenames.len(),
        ..MergeStats::default()
    };

    for img_path in list_images(&args.images_dir)? {
        let file_name = img_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        if bad_filenames.contains(&file_name) {
            continue;
        }

        if !try_copy_into(&img_path, &cleaned_images) {
            stats.failed += 1;
            continue;
        }
        stats.kept_images += 1;

        let label_path = label_path_for(&args.labels_dir, &file_name);
        if label_path.is_file() {
            if try_copy_into(&label_path, &cleaned_labels) {
                stats.kept_labels += 1;
            } else {
                stats.failed += 1;
            }
        }
    }
    info!(
        "Copied {} original images and {} labels.",
        stats.kept_images, stats.kept_labels
    );

    for img_path in &reviewed {
        let file_name = img_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        if !try_copy_into(img_path, &cleaned_images) {
            stats.failed += 1;
            continue;
        }
        stats.corrected_images += 1;

        let corrected_label = label_path_for(&args.corrected_labels_dir, &file_name);
        if corrected_label.is_file() {
            if try_copy_into(&corrected_label, &cleaned_labels) {
                stats.corrected_labels += 1;
            } else {
                stats.failed += 1;
            }
        } else {
            warn!("No corrected label for {}", file_name);
        }
    }
    info!(
        "Added {} corrected images and {} labels.",
        stats.corrected_images, stats.corrected_labels
    );
    if stats.failed > 0 {
        warn!("{} files could not be copied", stats.failed);
    }
    info!("Cleaned dataset created in {}", args.output_dir.display());

    Ok(stats)
}
