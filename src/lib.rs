pub mod capture;
pub mod exif;
pub mod heading;
pub mod screen;
pub mod sensing;
pub mod settings;
mod utils;

use anyhow::{Context, Result};
use std::{fs, path::Path, sync::Arc};

use capture::{CaptureController, CaptureFacility, FileProvider};
use heading::HeadingEstimator;
use screen::{CompassScreen, HeadingDisplay};
use sensing::SensorManager;
use settings::SettingsStore;

pub use capture::{CaptureOutcome, CaptureReport};
pub use exif::{encode, read_direction, write_direction, DirectionRational};
pub use heading::Bearing;
pub use screen::ScreenHandle;

/// Initialise logging (reads the RUST_LOG env var). Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

/// Host services the screen talks to.
pub struct HostAdapters {
    pub sensors: Arc<dyn SensorManager>,
    pub capture: Arc<dyn CaptureFacility>,
    pub display: Box<dyn HeadingDisplay>,
}

/// Builds the compass screen.
///
/// `app_data_dir` holds `settings.json`; `pictures_dir` is the app-private
/// directory photos are written to.
pub fn setup(app_data_dir: &Path, pictures_dir: &Path, adapters: HostAdapters) -> Result<CompassScreen> {
    fs::create_dir_all(app_data_dir)
        .with_context(|| format!("Failed to create {}", app_data_dir.display()))?;

    let settings_store = SettingsStore::new(app_data_dir.join("settings.json"))?;
    let settings = settings_store.settings();

    let provider = FileProvider::new(
        settings.file_provider_authority.clone(),
        settings.file_provider_root.clone(),
        pictures_dir.to_path_buf(),
    );
    let capture = CaptureController::new(adapters.capture, provider, settings.direction_ref());

    log::info!(
        "compass photo ready: pictures in {}, sensors at {:?}",
        pictures_dir.display(),
        settings.sensor_rate
    );

    Ok(CompassScreen::new(
        HeadingEstimator::new(),
        capture,
        adapters.display,
        adapters.sensors,
        settings.sensor_rate,
    ))
}
