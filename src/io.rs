use glob::glob;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::{get_image_extensions_set, OutputDirs, Split};
use crate::utils::create_output_directory;

/// Whether the path has one of the supported image extensions (case-insensitive).
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| get_image_extensions_set().contains(&ext.to_lowercase()))
}

/// Image files directly inside `dir`, sorted by path.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = dir.join("*");
    let mut images: Vec<PathBuf> = glob(&pattern.to_string_lossy())?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file() && is_image_file(path))
        .collect();
    images.sort();
    Ok(images)
}

/// Files directly inside `dir` with the given extension, sorted by path.
pub fn list_files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let pattern = dir.join(format!("*.{}", extension));
    let mut files: Vec<PathBuf> = glob(&pattern.to_string_lossy())?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Set up `images/<split>` and `labels/<split>` under `root`.
///
/// The test directories are only created when `with_test` is set. Existing
/// split directories are recreated empty.
pub fn setup_output_directories(root: &Path, with_test: bool) -> std::io::Result<OutputDirs> {
    let labels_dir = root.join("labels");
    let images_dir = root.join("images");

    let train_labels_dir = create_output_directory(&labels_dir.join(Split::Train.dir_name()))?;
    let val_labels_dir = create_output_directory(&labels_dir.join(Split::Val.dir_name()))?;
    let train_images_dir = create_output_directory(&images_dir.join(Split::Train.dir_name()))?;
    let val_images_dir = create_output_directory(&images_dir.join(Split::Val.dir_name()))?;

    let (test_labels_dir, test_images_dir) = if with_test {
        (
            Some(create_output_directory(
                &labels_dir.join(Split::Test.dir_name()),
            )?),
            Some(create_output_directory(
                &images_dir.join(Split::Test.dir_name()),
            )?),
        )
    } else {
        (None, None)
    };

    Ok(OutputDirs {
        train_labels_dir,
        val_labels_dir,
        train_images_dir,
        val_images_dir,
        test_labels_dir,
        test_images_dir,
    })
}

/// Write the `data.yaml` file the trainer reads.
///
/// `class_names` is indexed by YOLO class id.
pub fn create_dataset_yaml(
    root: &Path,
    file_name: &str,
    class_names: &[String],
    with_test: bool,
) -> std::io::Result<PathBuf> {
    let dataset_yaml_path = root.join(file_name);
    let mut dataset_yaml = BufWriter::new(File::create(&dataset_yaml_path)?);
    let absolute_path = fs::canonicalize(root)?;
    let mut yaml_content = format!(
        "path: {}\ntrain: images/train\nval: images/val\n",
        absolute_path.to_string_lossy()
    );
    if with_test {
        yaml_content.push_str("test: images/test\n");
    } else {
        yaml_content.push_str("test:\n");
    }
    yaml_content.push_str("\nnames:\n");

    for (id, label) in class_names.iter().enumerate() {
        yaml_content.push_str(&format!("  {}: {}\n", id, label));
    }
    dataset_yaml.write_all(yaml_content.as_bytes())?;
    dataset_yaml.flush()?;
    Ok(dataset_yaml_path)
}
