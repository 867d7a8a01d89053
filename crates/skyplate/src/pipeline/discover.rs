use std::path::{Path, PathBuf};

use log::{debug, info};
use walkdir::WalkDir;

use crate::client::ResultFile;
use crate::error::{Result, SkyplateError};

/// FITS files, which mime_guess does not always classify as images.
const FITS_EXTENSIONS: &[&str] = &["fits", "fit", "fts"];

/// Whether a file looks like something the solver accepts.
pub fn is_solvable_image(path: &Path) -> bool {
    let is_fits = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| FITS_EXTENSIONS.iter().any(|f| ext.eq_ignore_ascii_case(f)))
        .unwrap_or(false);

    is_fits
        || mime_guess::from_path(path)
            .first()
            .map(|m| m.essence_str().starts_with("image/"))
            .unwrap_or(false)
}

/// Whether a file is one of the result files a solve writes next to its
/// artifacts, such as `m42_new.fits`.
fn is_result_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|name| {
            ResultFile::ALL
                .iter()
                .any(|f| name.len() > f.file_suffix().len() && name.ends_with(f.file_suffix()))
        })
        .unwrap_or(false)
}

/// Expands the given paths into a sorted list of image files.
///
/// Files named explicitly are kept whatever their type. Directories are
/// walked recursively and only image and FITS files are kept, skipping
/// result files written by an earlier solve.
pub fn discover_images(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();

    for path in paths {
        if path.is_file() {
            images.push(path.clone());
        } else if path.is_dir() {
            let before = images.len();
            for entry in WalkDir::new(path)
                .min_depth(1)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let candidate = entry.path();
                if !entry.file_type().is_file() || !is_solvable_image(candidate) {
                    continue;
                }
                if is_result_file(candidate) {
                    debug!("Skipping result file: {}", candidate.display());
                } else {
                    debug!("Found image: {}", candidate.display());
                    images.push(candidate.to_path_buf());
                }
            }
            info!(
                "Found {} image(s) in {}",
                images.len() - before,
                path.display()
            );
        } else {
            return Err(SkyplateError::InputNotFound(path.clone()));
        }
    }

    images.sort();
    images.dedup();
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_image_detection() {
        assert!(is_solvable_image(Path::new("m42.jpg")));
        assert!(is_solvable_image(Path::new("m42.PNG")));
        assert!(is_solvable_image(Path::new("m42.fits")));
        assert!(is_solvable_image(Path::new("m42.FIT")));
        assert!(!is_solvable_image(Path::new("notes.txt")));
        assert!(!is_solvable_image(Path::new("m42_results.json")));
    }

    #[test]
    fn test_directory_walk_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("night2");
        fs::create_dir(&nested).unwrap();
        fs::write(dir.path().join("b.jpg"), b"x").unwrap();
        fs::write(dir.path().join("a.fits"), b"x").unwrap();
        fs::write(dir.path().join("log.txt"), b"x").unwrap();
        fs::write(nested.join("c.png"), b"x").unwrap();

        let images = discover_images(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = images
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(images.len(), 3);
        assert!(names.contains(&"a.fits".to_string()));
        assert!(names.contains(&"c.png".to_string()));
        assert!(!names.contains(&"log.txt".to_string()));
    }

    #[test]
    fn test_directory_walk_skips_result_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("m42.jpg"), b"x").unwrap();
        fs::write(dir.path().join("m42_new.fits"), b"x").unwrap();
        fs::write(dir.path().join("m42_corr.fits"), b"x").unwrap();
        fs::write(dir.path().join("m42.wcs"), b"x").unwrap();

        let images = discover_images(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(images, vec![dir.path().join("m42.jpg")]);

        let explicit = dir.path().join("m42_new.fits");
        let images = discover_images(&[explicit.clone()]).unwrap();
        assert_eq!(images, vec![explicit]);
    }

    #[test]
    fn test_explicit_file_kept_and_deduplicated() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("frame.raw");
        fs::write(&file, b"x").unwrap();

        let images = discover_images(&[file.clone(), file.clone()]).unwrap();
        assert_eq!(images, vec![file]);
    }

    #[test]
    fn test_missing_input() {
        let result = discover_images(&[PathBuf::from("/nonexistent/frames")]);
        assert!(matches!(result, Err(SkyplateError::InputNotFound(_))));
    }
}
