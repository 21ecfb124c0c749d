use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::heading::Bearing;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CaptureStatus {
    Idle,
    Capturing,
}

impl Default for CaptureStatus {
    fn default() -> Self {
        CaptureStatus::Idle
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureState {
    pub status: CaptureStatus,
    pub photo_path: Option<PathBuf>,
    /// Heading read when the capture was dispatched. It is not re-read when
    /// the capture completes.
    pub bearing_at_dispatch: Option<Bearing>,
    pub dispatched_at: Option<DateTime<Utc>>,
}

impl CaptureState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_capturing(&self) -> bool {
        self.status == CaptureStatus::Capturing
    }

    pub fn begin(&mut self, photo_path: PathBuf, bearing: Option<Bearing>, now: DateTime<Utc>) {
        *self = Self {
            status: CaptureStatus::Capturing,
            photo_path: Some(photo_path),
            bearing_at_dispatch: bearing,
            dispatched_at: Some(now),
        };
    }

    /// Returns to `Idle`, handing back the in-flight path and bearing.
    pub fn finish(&mut self) -> (Option<PathBuf>, Option<Bearing>) {
        let finished = std::mem::take(self);
        (finished.photo_path, finished.bearing_at_dispatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_and_finish_cycle_back_to_idle() {
        let mut state = CaptureState::new();
        assert_eq!(state.status, CaptureStatus::Idle);

        let bearing = Bearing::from_degrees(45.0);
        state.begin(PathBuf::from("/pics/a.jpg"), bearing, Utc::now());
        assert!(state.is_capturing());
        assert!(state.dispatched_at.is_some());

        let (path, sampled) = state.finish();
        assert_eq!(path, Some(PathBuf::from("/pics/a.jpg")));
        assert_eq!(sampled, bearing);
        assert_eq!(state.status, CaptureStatus::Idle);
        assert!(state.photo_path.is_none());
    }
}
