//! COCO format data structures and utilities
//!
//! Only the parts of a COCO file needed to build a YOLO dataset are modelled;
//! unknown fields are ignored.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::Result;
use crate::types::BoundingBox;

/// COCO category information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub supercategory: Option<String>,
}

/// COCO image information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: u64,
    pub file_name: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// COCO annotation information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(default)]
    pub id: Option<u64>,
    pub image_id: u64,
    pub category_id: u64,
    pub bbox: [f64; 4], // [x, y, width, height]
    #[serde(default)]
    pub iscrowd: u32,
}

/// Complete COCO dataset structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CocoFile {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl CocoFile {
    /// Parse a COCO file straight from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Map from COCO category id to YOLO class id.
    ///
    /// With a class list, ids follow its order and categories not in it are
    /// dropped. Without one, every category is kept in ascending id order.
    /// Returns the map and the class names indexed by YOLO id.
    pub fn class_mapping(&self, keep_classes: &[String]) -> (HashMap<u64, u32>, Vec<String>) {
        if keep_classes.is_empty() {
            let mut categories: Vec<&Category> = self.categories.iter().collect();
            categories.sort_by_key(|c| c.id);
            let mapping = categories
                .iter()
                .enumerate()
                .map(|(yolo_id, c)| (c.id, yolo_id as u32))
                .collect();
            let names = categories.iter().map(|c| c.name.clone()).collect();
            return (mapping, names);
        }

        let mapping = self
            .categories
            .iter()
            .filter_map(|c| {
                keep_classes
                    .iter()
                    .position(|name| name == &c.name)
                    .map(|yolo_id| (c.id, yolo_id as u32))
            })
            .collect();
        (mapping, keep_classes.to_vec())
    }
}

/// Convert a COCO `[x, y, w, h]` pixel box to a normalized YOLO box.
///
/// Image dimensions below one are treated as one.
pub fn coco_bbox_to_yolo(bbox: [f64; 4], image_width: u32, image_height: u32) -> BoundingBox {
    let [x, y, w, h] = bbox;
    let img_w = image_width.max(1) as f64;
    let img_h = image_height.max(1) as f64;
    BoundingBox::new(
        (x + w / 2.0) / img_w,
        (y + h / 2.0) / img_h,
        w / img_w,
        h / img_h,
    )
}
