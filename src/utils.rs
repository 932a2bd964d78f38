use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
                label
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Safely create output directories and return their paths
pub fn create_output_directory(path: &Path) -> std::io::Result<PathBuf> {
    if path.exists() {
        log::warn!(
            "Directory {:?} already exists. Deleting and recreating it.",
            path
        );
        fs::remove_dir_all(path).and_then(|_| fs::create_dir_all(path))?;
    } else {
        fs::create_dir_all(path)?;
    }
    Ok(path.to_path_buf())
}

/// Sanitized file name of `path`, or `None` when it has no final component.
pub fn sanitized_file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(sanitize_filename::sanitize)
}

/// Copy `src` into `dir` under its sanitized file name, returning the destination.
pub fn copy_into(src: &Path, dir: &Path) -> std::io::Result<PathBuf> {
    let file_name = sanitized_file_name(src).ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("no file name in {}", src.display()),
        )
    })?;
    let dst = dir.join(file_name);
    fs::copy(src, &dst)?;
    Ok(dst)
}

/// [`copy_into`] that logs a failure instead of returning it.
pub fn try_copy_into(src: &Path, dir: &Path) -> bool {
    match copy_into(src, dir) {
        Ok(_) => true,
        Err(e) => {
            log::warn!("Failed to copy {} into {}: {}", src.display(), dir.display(), e);
            false
        }
    }
}

/// Whether `name` is a relative path that cannot leave the directory it is joined onto.
pub fn is_contained_relative_path(name: &str) -> bool {
    !name.is_empty()
        && Path::new(name)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Whether both paths exist and resolve to the same file.
pub fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Image dimensions `(width, height)` read from the file header.
pub fn image_dimensions(path: &Path) -> Option<(u32, u32)> {
    match imagesize::size(path) {
        Ok(size) => Some((size.width as u32, size.height as u32)),
        Err(e) => {
            log::debug!("Could not read image size for {}: {}", path.display(), e);
            None
        }
    }
}
