use crate::error::AppError;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Lower-case extensions treated as JPEG images.
pub const IMAGE_EXTENSIONS: [&str; 2] = ["jpg", "jpeg"];

pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Lists the JPEG files in `folder`, descending into every sub-directory
/// when `recursive` is set. The result is sorted so that a given directory
/// state always yields the same sequence.
pub fn list_images(folder: &Path, recursive: bool) -> Result<Vec<PathBuf>, AppError> {
    if !folder.is_dir() {
        return Err(AppError::FileNotFound(folder.to_path_buf()));
    }
    log::info!(
        "Starting file discovery in {:?} (recursive: {})",
        folder,
        recursive
    );

    let mut walker = WalkDir::new(folder).min_depth(1).follow_links(true);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut images = Vec::new();
    for entry in walker.into_iter() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() {
            log::trace!("Skipping non-file entry: {:?}", path);
            continue;
        }
        if is_image_path(path) {
            log::debug!("Discovered image: {:?}", path);
            images.push(path.to_path_buf());
        } else {
            log::trace!("Skipping file due to unsupported extension: {:?}", path);
        }
    }

    images.sort();
    log::info!("File discovery complete, {} image(s) found.", images.len());
    Ok(images)
}
