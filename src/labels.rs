//! YOLO label files
//!
//! One object per line, `class_id x_center y_center width height`, with an
//! optional trailing confidence on prediction files.

use log::{info, warn};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{LabelError, Result};
use crate::io::list_files_with_extension;
use crate::types::{Annotation, BoundingBox, Detection};

/// Parse one label line into a detection (confidence is `None` when absent).
pub fn parse_label_line(line: &str) -> std::result::Result<Detection, LabelError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 5 {
        return Err(LabelError::TooFewFields(parts.len()));
    }

    let class_id = parse_class_id(parts[0])?;
    let coord = |s: &str| {
        s.parse::<f64>()
            .map_err(|_| LabelError::InvalidCoordinate(s.to_string()))
    };
    let bbox = BoundingBox::new(
        coord(parts[1])?,
        coord(parts[2])?,
        coord(parts[3])?,
        coord(parts[4])?,
    );
    let confidence = match parts.get(5) {
        Some(s) => Some(
            s.parse::<f64>()
                .map_err(|_| LabelError::InvalidCoordinate(s.to_string()))?,
        ),
        None => None,
    };

    Ok(Detection {
        class_id,
        bbox,
        confidence,
    })
}

fn parse_class_id(field: &str) -> std::result::Result<u32, LabelError> {
    field
        .parse::<u32>()
        .map_err(|_| LabelError::InvalidClassId(field.to_string()))
}

/// Format an annotation as a label line, without the trailing newline.
pub fn format_label_line(annotation: &Annotation) -> String {
    let b = &annotation.bbox;
    format!(
        "{} {:.6} {:.6} {:.6} {:.6}",
        annotation.class_id, b.x_center, b.y_center, b.width, b.height
    )
}

/// Read every well-formed line of a label file. Malformed lines are logged and skipped.
pub fn read_label_file(path: &Path) -> io::Result<Vec<Detection>> {
    let content = fs::read_to_string(path)?;
    let detections = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(index, line)| match parse_label_line(line) {
            Ok(detection) => Some(detection),
            Err(e) => {
                warn!("Skipping {}:{}: {}", path.display(), index + 1, e);
                None
            }
        })
        .collect();
    Ok(detections)
}

/// Write annotations as a label file, one line each.
pub fn write_label_file(path: &Path, annotations: &[Annotation]) -> io::Result<()> {
    let lines: Vec<String> = annotations.iter().map(format_label_line).collect();
    let mut writer = BufWriter::new(fs::File::create(path)?);
    writer.write_all(lines.join("\n").as_bytes())?;
    writer.flush()
}

/// Lookup from image identifier to its ground-truth annotations.
pub trait LabelSource: Sync {
    /// `Ok(None)` when the image has no label record.
    fn ground_truth(&self, image_id: &str) -> io::Result<Option<Vec<Annotation>>>;
}

/// Ground truth stored as `<image stem>.txt` files in one directory.
#[derive(Debug, Clone)]
pub struct LabelDir {
    root: PathBuf,
}

impl LabelDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn label_path(&self, image_id: &str) -> PathBuf {
        label_path_for(&self.root, image_id)
    }
}

impl LabelSource for LabelDir {
    fn ground_truth(&self, image_id: &str) -> io::Result<Option<Vec<Annotation>>> {
        let path = self.label_path(image_id);
        if !path.is_file() {
            return Ok(None);
        }
        let annotations = read_label_file(&path)?
            .into_iter()
            .map(Annotation::from)
            .collect();
        Ok(Some(annotations))
    }
}

/// `<dir>/<stem of image_id>.txt`
pub fn label_path_for(dir: &Path, image_id: &str) -> PathBuf {
    // Only the final extension is replaced, `a.b.png` maps to `a.b.txt`
    let mut name = Path::new(image_id)
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| image_id.into());
    name.push(".txt");
    dir.join(name)
}

/// Counters reported by [`fix_label_files`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FixStats {
    pub files_fixed: usize,
    pub lines_removed: usize,
}

/// Drop label lines whose class id is outside `0..=max_class_id`.
///
/// Lines with fewer than five fields are dropped as well, but only a bad
/// class id marks the file for rewriting. Untouched files keep their bytes.
pub fn fix_label_files(labels_dir: &Path, max_class_id: u32) -> Result<FixStats> {
    let mut stats = FixStats::default();

    for label_path in list_files_with_extension(labels_dir, "txt")? {
        let content = fs::read_to_string(&label_path)?;
        let file_name = label_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut valid_lines = Vec::new();
        let mut had_issues = false;

        for line in content.split_inclusive('\n') {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 5 {
                continue;
            }
            match parse_class_id(parts[0]) {
                Ok(class_id) if class_id <= max_class_id => valid_lines.push(line),
                Ok(class_id) => {
                    had_issues = true;
                    stats.lines_removed += 1;
                    info!("Removed invalid class {} from {}", class_id, file_name);
                }
                Err(e) => {
                    had_issues = true;
                    stats.lines_removed += 1;
                    warn!("Removed line from {}: {}", file_name, e);
                }
            }
        }

        if had_issues {
            fs::write(&label_path, valid_lines.concat())?;
            stats.files_fixed += 1;
        }
    }

    info!("Fixed {} label files", stats.files_fixed);
    info!("Removed {} invalid labels", stats.lines_removed);
    Ok(stats)
}
