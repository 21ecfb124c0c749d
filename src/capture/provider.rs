use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    path::{Component, Path, PathBuf},
};

/// Shareable reference to a file, handed to the capture facility instead of a raw path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentHandle(String);

impl ContentHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps files below one shared root to `content://` handles.
#[derive(Debug, Clone)]
pub struct FileProvider {
    authority: String,
    root_name: String,
    root: PathBuf,
}

impl FileProvider {
    pub fn new(authority: impl Into<String>, root_name: impl Into<String>, root: PathBuf) -> Self {
        Self {
            authority: authority.into(),
            root_name: root_name.into(),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `content://<authority>/<root-name>/<path relative to root>`
    pub fn uri_for(&self, path: &Path) -> Result<ContentHandle> {
        let relative = path.strip_prefix(&self.root).map_err(|_| {
            anyhow!(
                "{} is outside the shared root {}",
                path.display(),
                self.root.display()
            )
        })?;

        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => segments.push(
                    part.to_str()
                        .ok_or_else(|| anyhow!("{} is not valid UTF-8", path.display()))?
                        .to_string(),
                ),
                _ => return Err(anyhow!("{} is not a plain path below the root", path.display())),
            }
        }
        if segments.is_empty() {
            return Err(anyhow!("cannot share the root directory itself"));
        }

        Ok(ContentHandle(format!(
            "content://{}/{}/{}",
            self.authority,
            self.root_name,
            segments.join("/")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> FileProvider {
        FileProvider::new(
            "io.daveyg.dev.fileprovider",
            "my_images",
            PathBuf::from("/data/app/files/Pictures"),
        )
    }

    #[test]
    fn builds_content_uri_below_root() {
        let handle = provider()
            .uri_for(Path::new("/data/app/files/Pictures/JPEG_20240309_070502_ab.jpg"))
            .unwrap();
        assert_eq!(
            handle.as_str(),
            "content://io.daveyg.dev.fileprovider/my_images/JPEG_20240309_070502_ab.jpg"
        );
    }

    #[test]
    fn nested_paths_use_forward_slashes() {
        let handle = provider()
            .uri_for(Path::new("/data/app/files/Pictures/trip/a.jpg"))
            .unwrap();
        assert!(handle.to_string().ends_with("/my_images/trip/a.jpg"));
    }

    #[test]
    fn rejects_paths_outside_root() {
        assert!(provider().uri_for(Path::new("/tmp/a.jpg")).is_err());
        assert!(provider().uri_for(Path::new("/data/app/files/Pictures")).is_err());
        assert!(provider()
            .uri_for(Path::new("/data/app/files/Pictures/../secret.jpg"))
            .is_err());
    }
}
