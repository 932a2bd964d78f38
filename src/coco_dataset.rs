//! COCO to YOLO dataset conversion
//!
//! Keeps the requested classes, drops crowd boxes and images left without
//! boxes, splits the remaining images and writes a YOLO dataset with its
//! `data.yaml`.

use indicatif::ProgressBar;
use log::{info, warn};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering::Relaxed};

use crate::coco::{coco_bbox_to_yolo, CocoFile, Image};
use crate::config::ConvertArgs;
use crate::dataset::split_items;
use crate::error::{Error, Result};
use crate::io::{create_dataset_yaml, setup_output_directories};
use crate::labels::{label_path_for, write_label_file};
use crate::types::{Annotation, Split};
use crate::utils::{copy_into, create_progress_bar, image_dimensions, sanitized_file_name};

pub const DATA_YAML_FILE_NAME: &str = "data.yaml";

/// One image ready to be written: its COCO record and YOLO annotations.
#[derive(Debug, Clone)]
pub struct PendingImage<'a> {
    pub image: &'a Image,
    pub coco_boxes: Vec<(u32, [f64; 4])>,
}

/// Counters reported by [`convert_coco_dataset`].
#[derive(Debug, Default)]
pub struct ConvertStats {
    pub copied: AtomicUsize,
    pub missing: AtomicUsize,
    pub train_labels: AtomicUsize,
    pub val_labels: AtomicUsize,
    pub test_labels: AtomicUsize,
}

impl ConvertStats {
    fn labels_for(&self, split: Split) -> &AtomicUsize {
        match split {
            Split::Train => &self.train_labels,
            Split::Val => &self.val_labels,
            Split::Test => &self.test_labels,
        }
    }

    pub fn labels_written(&self, split: Split) -> usize {
        self.labels_for(split).load(Relaxed)
    }

    pub fn print_summary(&self, images_root: &Path) {
        info!("=== Conversion Summary ===");
        info!("Copied images: {}", self.copied.load(Relaxed));
        let missing = self.missing.load(Relaxed);
        if missing > 0 {
            warn!(
                "Missing images (not found under {}): {}",
                images_root.display(),
                missing
            );
        }
        info!(
            "Labels written -> train: {}, val: {}, test: {}",
            self.labels_written(Split::Train),
            self.labels_written(Split::Val),
            self.labels_written(Split::Test)
        );
    }
}

/// Group kept, non-crowd annotations by image, in COCO image-id order.
///
/// `class_map` maps COCO category ids to YOLO class ids; other categories are
/// dropped. Images without a kept annotation are left out.
pub fn collect_pending_images<'a>(
    coco: &'a CocoFile,
    class_map: &HashMap<u64, u32>,
) -> Vec<PendingImage<'a>> {
    let images: HashMap<u64, &Image> = coco.images.iter().map(|im| (im.id, im)).collect();

    let mut boxes_by_image: BTreeMap<u64, Vec<(u32, [f64; 4])>> = BTreeMap::new();
    for annotation in &coco.annotations {
        if annotation.iscrowd != 0 {
            continue;
        }
        if let Some(&class_id) = class_map.get(&annotation.category_id) {
            boxes_by_image
                .entry(annotation.image_id)
                .or_default()
                .push((class_id, annotation.bbox));
        }
    }

    boxes_by_image
        .into_iter()
        .filter_map(|(image_id, coco_boxes)| match images.get(&image_id) {
            Some(image) => Some(PendingImage { image, coco_boxes }),
            None => {
                warn!("Annotation refers to unknown image id {}", image_id);
                None
            }
        })
        .collect()
}

/// Convert a COCO file into a YOLO dataset under `args.output_dir`.
pub fn convert_coco_dataset(args: &ConvertArgs) -> Result<ConvertStats> {
    let coco = CocoFile::from_path(&args.coco_json)?;
    let (class_map, class_names) = coco.class_mapping(&args.classes);
    if class_map.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "none of the classes {:?} exist in {}",
            args.classes,
            args.coco_json.display()
        )));
    }

    let pending = collect_pending_images(&coco, &class_map);
    if pending.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "no image in {} contains the selected classes",
            args.coco_json.display()
        )));
    }
    info!("Kept {} images with the selected classes", pending.len());

    let ratios = args.ratios();
    let with_test = ratios.test > 0.0;
    let output_dirs = setup_output_directories(&args.output_dir, with_test)?;
    let split = split_items(pending, ratios, args.seed);
    let stats = ConvertStats::default();

    for part in Split::ALL {
        let items = split.get(part);
        if items.is_empty() {
            continue;
        }
        let Some((images_dir, labels_dir)) = output_dirs.for_split(part) else {
            continue;
        };
        let pb = create_progress_bar(items.len() as u64, &part.to_string());
        convert_images_in_parallel(items, images_dir, labels_dir, args, part, &stats, &pb);
        pb.finish_with_message(format!("{} conversion complete", part));
    }

    let yaml_path =
        create_dataset_yaml(&args.output_dir, DATA_YAML_FILE_NAME, &class_names, with_test)?;
    stats.print_summary(&args.images_root);
    info!("YOLO dataset at: {}", args.output_dir.display());
    info!("data.yaml at: {}", yaml_path.display());
    Ok(stats)
}

fn convert_images_in_parallel(
    items: &[PendingImage],
    images_dir: &Path,
    labels_dir: &Path,
    args: &ConvertArgs,
    split: Split,
    stats: &ConvertStats,
    pb: &ProgressBar,
) {
    items.par_iter().for_each(|item| {
        match convert_image(item, images_dir, labels_dir, &args.images_root) {
            Ok(true) => {
                stats.copied.fetch_add(1, Relaxed);
                stats.labels_for(split).fetch_add(1, Relaxed);
            }
            Ok(false) => {
                stats.missing.fetch_add(1, Relaxed);
            }
            Err(e) => {
                warn!("Failed to convert {}: {}", item.image.file_name, e);
                stats.missing.fetch_add(1, Relaxed);
            }
        }
        pb.inc(1);
    });
}

/// Copy one image and write its label file. `Ok(false)` when the image is
/// missing or its size cannot be determined.
fn convert_image(
    item: &PendingImage,
    images_dir: &Path,
    labels_dir: &Path,
    images_root: &Path,
) -> std::io::Result<bool> {
    let src = images_root.join(&item.image.file_name);
    if !src.is_file() {
        warn!("Missing image (not in {}): {}", images_root.display(), item.image.file_name);
        return Ok(false);
    }

    let dimensions = match (item.image.width, item.image.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
        _ => image_dimensions(&src),
    };
    let Some((width, height)) = dimensions else {
        warn!("Could not read image size for: {}", src.display());
        return Ok(false);
    };

    let dst = copy_into(&src, images_dir)?;

    let annotations: Vec<Annotation> = item
        .coco_boxes
        .iter()
        .map(|&(class_id, bbox)| Annotation {
            class_id,
            bbox: coco_bbox_to_yolo(bbox, width, height),
        })
        .collect();
    let image_name = sanitized_file_name(&dst).unwrap_or_default();
    write_label_file(&label_path_for(labels_dir, &image_name), &annotations)?;
    Ok(true)
}
