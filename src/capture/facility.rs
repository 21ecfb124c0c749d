use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::oneshot;

use super::provider::ContentHandle;

/// What the capture facility is asked to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Where the facility writes the image.
    pub output: ContentHandle,
    /// The same location as a local path, for hosts that can write directly.
    pub path: PathBuf,
}

/// Single result of a capture request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureOutcome {
    Succeeded(PathBuf),
    Failed(String),
    /// The user backed out of the capture screen.
    Cancelled,
}

/// The host's still-image capture service.
pub trait CaptureFacility: Send + Sync {
    /// Whether any capture-capable handler exists on this device.
    fn is_available(&self) -> bool;

    /// Starts the capture. `reply` must receive exactly one outcome; dropping it
    /// is reported as a failure.
    fn launch(&self, request: CaptureRequest, reply: oneshot::Sender<CaptureOutcome>) -> Result<()>;
}
