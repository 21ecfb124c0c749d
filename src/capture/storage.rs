use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
};
use uuid::Uuid;

const FILE_PREFIX: &str = "JPEG_";
const FILE_SUFFIX: &str = ".jpg";

/// `JPEG_<yyyyMMdd_HHmmss>_<suffix>.jpg`
pub fn image_file_name(now: DateTime<Local>, unique: &str) -> String {
    format!(
        "{FILE_PREFIX}{}_{unique}{FILE_SUFFIX}",
        now.format("%Y%m%d_%H%M%S")
    )
}

/// Creates an empty destination file for the capture facility to fill in.
///
/// The file is created exclusively, so two captures within the same second
/// never share a file.
pub fn create_image_file(dir: &Path, now: DateTime<Local>) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create pictures directory {}", dir.display()))?;

    let unique = Uuid::new_v4().simple().to_string();
    let path = dir.join(image_file_name(now, &unique));
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .with_context(|| format!("Failed to create image file {}", path.display()))?;
    Ok(path)
}

/// Removes a placeholder the capture facility never wrote to.
///
/// Returns `Ok(true)` when a file was removed. Files with content are kept.
pub fn discard_if_empty(path: &Path) -> Result<bool> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to inspect {}", path.display()))
        }
    };
    if metadata.len() > 0 {
        return Ok(false);
    }
    fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("compass-photo-storage-{}", Uuid::new_v4()))
    }

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).unwrap()
    }

    #[test]
    fn file_name_follows_pattern() {
        assert_eq!(
            image_file_name(fixed_time(), "abc123"),
            "JPEG_20240309_070502_abc123.jpg"
        );
    }

    #[test]
    fn creates_directory_and_empty_file() {
        let dir = scratch_dir().join("Pictures");
        let path = create_image_file(&dir, fixed_time()).unwrap();

        assert!(path.starts_with(&dir));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("JPEG_20240309_070502_"));
        assert!(name.ends_with(".jpg"));
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);

        fs::remove_dir_all(dir.parent().unwrap()).unwrap();
    }

    #[test]
    fn same_second_gives_distinct_files() {
        let dir = scratch_dir();
        let first = create_image_file(&dir, fixed_time()).unwrap();
        let second = create_image_file(&dir, fixed_time()).unwrap();
        assert_ne!(first, second);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn discards_only_empty_placeholders() {
        let dir = scratch_dir();
        let empty = create_image_file(&dir, fixed_time()).unwrap();
        let written = create_image_file(&dir, fixed_time()).unwrap();
        fs::write(&written, b"data").unwrap();

        assert!(discard_if_empty(&empty).unwrap());
        assert!(!empty.exists());
        assert!(!discard_if_empty(&written).unwrap());
        assert!(written.exists());
        assert!(!discard_if_empty(&dir.join("missing.jpg")).unwrap());

        fs::remove_dir_all(dir).unwrap();
    }
}
