pub mod controller;
pub mod facility;
pub mod provider;
pub mod state;
pub mod storage;

pub use controller::{CaptureController, CaptureReport, DispatchResult};
pub use facility::{CaptureFacility, CaptureOutcome, CaptureRequest};
pub use provider::{ContentHandle, FileProvider};
pub use state::{CaptureState, CaptureStatus};
