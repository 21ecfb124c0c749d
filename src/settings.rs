use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
};

use crate::exif::DirectionRef;
use crate::sensing::SensorRate;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompassPhotoSettings {
    pub sensor_rate: SensorRate,
    /// Authority of the content provider that shares the pictures directory.
    pub file_provider_authority: String,
    /// Path segment naming the shared root inside content URIs.
    pub file_provider_root: String,
    /// Also tag photos with `GPSImgDirectionRef = "M"`.
    pub write_direction_ref: bool,
}

impl Default for CompassPhotoSettings {
    fn default() -> Self {
        Self {
            sensor_rate: SensorRate::Game,
            file_provider_authority: "io.daveyg.dev.fileprovider".into(),
            file_provider_root: "my_images".into(),
            write_direction_ref: true,
        }
    }
}

impl CompassPhotoSettings {
    pub fn direction_ref(&self) -> Option<DirectionRef> {
        self.write_direction_ref.then_some(DirectionRef::Magnetic)
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<CompassPhotoSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log_warn!("ignoring unreadable settings in {}: {err}", path.display());
                CompassPhotoSettings::default()
            })
        } else {
            CompassPhotoSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn settings(&self) -> CompassPhotoSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update(&self, settings: CompassPhotoSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = settings;
        self.persist(&guard)
    }

    fn persist(&self, data: &CompassPhotoSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("compass-photo-settings-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = scratch_dir();
        let store = SettingsStore::new(dir.join("settings.json")).unwrap();
        assert_eq!(store.settings(), CompassPhotoSettings::default());
        assert_eq!(store.settings().direction_ref(), Some(DirectionRef::Magnetic));
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn update_persists_and_reloads() {
        let dir = scratch_dir();
        let path = dir.join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let updated = CompassPhotoSettings {
            sensor_rate: SensorRate::Ui,
            write_direction_ref: false,
            ..Default::default()
        };
        store.update(updated.clone()).unwrap();

        let reloaded = SettingsStore::new(path).unwrap();
        assert_eq!(reloaded.settings(), updated);
        assert_eq!(reloaded.settings().direction_ref(), None);
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn partial_and_corrupt_files_fall_back() {
        let dir = scratch_dir();
        let partial = dir.join("partial.json");
        fs::write(&partial, r#"{"sensorRate":"fastest"}"#).unwrap();
        let settings = SettingsStore::new(partial).unwrap().settings();
        assert_eq!(settings.sensor_rate, SensorRate::Fastest);
        assert_eq!(settings.file_provider_root, "my_images");

        let corrupt = dir.join("corrupt.json");
        fs::write(&corrupt, "{not json").unwrap();
        assert_eq!(
            SettingsStore::new(corrupt).unwrap().settings(),
            CompassPhotoSettings::default()
        );
        fs::remove_dir_all(dir).unwrap();
    }
}
