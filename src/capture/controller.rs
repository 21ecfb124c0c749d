use anyhow::Context;
use chrono::{Local, Utc};
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::oneshot;

use crate::exif::{encode, write_direction, DirectionRational, DirectionRef};
use crate::heading::Bearing;

use super::facility::{CaptureFacility, CaptureOutcome, CaptureRequest};
use super::provider::FileProvider;
use super::state::CaptureState;
use super::storage::{create_image_file, discard_if_empty};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// How a capture attempt ended. Every variant leaves the controller idle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum CaptureReport {
    /// Photo saved and tagged with the dispatch-time heading.
    DirectionWritten {
        path: PathBuf,
        direction: DirectionRational,
    },
    /// Photo saved, but without the direction attribute.
    SavedWithoutDirection { path: PathBuf, reason: String },
    Failed { reason: String },
    Cancelled,
    /// No capture facility on this device; nothing was created.
    Unavailable,
}

#[derive(Debug)]
pub enum DispatchResult {
    Launched,
    /// A capture is already in flight; the request was ignored.
    AlreadyCapturing,
    /// The attempt ended before reaching the capture facility.
    Rejected(CaptureReport),
}

pub struct CaptureController {
    facility: Arc<dyn CaptureFacility>,
    provider: FileProvider,
    direction_ref: Option<DirectionRef>,
    state: CaptureState,
    pending: Option<oneshot::Receiver<CaptureOutcome>>,
}

impl CaptureController {
    pub fn new(
        facility: Arc<dyn CaptureFacility>,
        provider: FileProvider,
        direction_ref: Option<DirectionRef>,
    ) -> Self {
        Self {
            facility,
            provider,
            direction_ref,
            state: CaptureState::new(),
            pending: None,
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Allocates the destination file and hands it to the capture facility.
    ///
    /// `bearing` is the heading at this moment; it is what ends up in the
    /// photo, however long the capture takes.
    pub fn dispatch(&mut self, bearing: Option<Bearing>) -> DispatchResult {
        if self.state.is_capturing() {
            log_warn!("capture requested while another capture is in flight; ignoring");
            return DispatchResult::AlreadyCapturing;
        }

        if !self.facility.is_available() {
            log_warn!("no capture facility available; capture aborted");
            return DispatchResult::Rejected(CaptureReport::Unavailable);
        }

        let path = match create_image_file(self.provider.root(), Local::now()) {
            Ok(path) => path,
            Err(err) => {
                log_error!("failed to create capture destination: {err:?}");
                return DispatchResult::Rejected(CaptureReport::Failed {
                    reason: format!("{err:#}"),
                });
            }
        };

        let output = match self.provider.uri_for(&path) {
            Ok(output) => output,
            Err(err) => {
                log_error!("failed to share {}: {err:?}", path.display());
                self.discard_placeholder(&path);
                return DispatchResult::Rejected(CaptureReport::Failed {
                    reason: format!("{err:#}"),
                });
            }
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let request = CaptureRequest {
            output,
            path: path.clone(),
        };
        if let Err(err) = self.facility.launch(request, reply_tx) {
            log_error!("failed to launch capture: {err:?}");
            self.discard_placeholder(&path);
            return DispatchResult::Rejected(CaptureReport::Failed {
                reason: format!("{err:#}"),
            });
        }

        match bearing {
            Some(bearing) => log_info!("capture dispatched to {} at heading {bearing}", path.display()),
            None => log_info!("capture dispatched to {} without a heading", path.display()),
        }
        self.state.begin(path, bearing, Utc::now());
        self.pending = Some(reply_rx);
        DispatchResult::Launched
    }

    /// Resolves once the facility replies. Never resolves while nothing is in flight.
    ///
    /// Cancel safe: dropping the future keeps the request pending.
    pub async fn wait_for_outcome(&mut self) -> CaptureOutcome {
        match self.pending.as_mut() {
            Some(receiver) => match receiver.await {
                Ok(outcome) => outcome,
                Err(_) => CaptureOutcome::Failed("capture facility dropped the request".into()),
            },
            None => std::future::pending().await,
        }
    }

    /// Applies the capture outcome: tags the photo on success, cleans up the
    /// unused placeholder otherwise.
    pub async fn complete(&mut self, outcome: CaptureOutcome) -> CaptureReport {
        self.pending = None;
        let (dispatched_path, bearing) = self.state.finish();

        match outcome {
            CaptureOutcome::Succeeded(reported) => {
                // Only the file allocated at dispatch is ever tagged.
                let Some(path) = dispatched_path else {
                    log_warn!("capture succeeded with nothing in flight; ignoring {}", reported.display());
                    return CaptureReport::Failed {
                        reason: "no capture was in flight".into(),
                    };
                };
                if reported != path {
                    log_warn!(
                        "capture facility reported {} instead of {}; ignoring it",
                        reported.display(),
                        path.display()
                    );
                }
                if !has_content(&path) {
                    log_warn!("capture facility left {} empty", path.display());
                    self.discard_placeholder(&path);
                    return CaptureReport::Failed {
                        reason: format!("no image was written to {}", path.display()),
                    };
                }

                let Some(bearing) = bearing else {
                    log_warn!("no heading was available at dispatch; {} left untagged", path.display());
                    return CaptureReport::SavedWithoutDirection {
                        path,
                        reason: "heading unavailable when the capture started".into(),
                    };
                };

                let direction = encode(bearing);
                let reference = self.direction_ref;
                let target = path.clone();
                let written = tokio::task::spawn_blocking(move || {
                    write_direction(&target, &direction, reference)
                })
                .await
                .context("metadata writer task failed to join")
                .and_then(|result| result);

                match written {
                    Ok(()) => {
                        log_info!("tagged {} with direction {direction}", path.display());
                        CaptureReport::DirectionWritten { path, direction }
                    }
                    Err(err) => {
                        log_error!("failed to write direction to {}: {err:?}", path.display());
                        CaptureReport::SavedWithoutDirection {
                            path,
                            reason: format!("{err:#}"),
                        }
                    }
                }
            }
            CaptureOutcome::Failed(reason) => {
                log_warn!("capture failed: {reason}");
                if let Some(path) = dispatched_path {
                    self.discard_placeholder(&path);
                }
                CaptureReport::Failed { reason }
            }
            CaptureOutcome::Cancelled => {
                log_info!("capture cancelled");
                if let Some(path) = dispatched_path {
                    self.discard_placeholder(&path);
                }
                CaptureReport::Cancelled
            }
        }
    }

    fn discard_placeholder(&self, path: &Path) {
        if let Err(err) = discard_if_empty(path) {
            log_warn!("failed to clean up {}: {err:?}", path.display());
        }
    }
}

fn has_content(path: &Path) -> bool {
    fs::metadata(path).map(|metadata| metadata.len() > 0).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exif::read_direction;
    use anyhow::{bail, Result};
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::{io::Cursor, sync::Mutex};
    use uuid::Uuid;

    #[derive(Default)]
    struct FakeFacility {
        unavailable: bool,
        refuse: bool,
        requests: Mutex<Vec<CaptureRequest>>,
        replies: Mutex<Vec<oneshot::Sender<CaptureOutcome>>>,
    }

    impl FakeFacility {
        fn reply(&self, outcome: CaptureOutcome) {
            let sender = self.replies.lock().unwrap().pop().unwrap();
            sender.send(outcome).unwrap();
        }
    }

    impl CaptureFacility for FakeFacility {
        fn is_available(&self) -> bool {
            !self.unavailable
        }

        fn launch(&self, request: CaptureRequest, reply: oneshot::Sender<CaptureOutcome>) -> Result<()> {
            if self.refuse {
                bail!("camera busy");
            }
            self.requests.lock().unwrap().push(request);
            self.replies.lock().unwrap().push(reply);
            Ok(())
        }
    }

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("compass-photo-capture-{}", Uuid::new_v4()))
    }

    fn controller(facility: Arc<FakeFacility>, dir: &Path) -> CaptureController {
        let provider = FileProvider::new("test.fileprovider", "my_images", dir.to_path_buf());
        CaptureController::new(facility, provider, Some(DirectionRef::Magnetic))
    }

    fn fill_with_jpeg(path: &Path) {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(4, 4))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
            .unwrap();
        fs::write(path, buf).unwrap();
    }

    fn file_count(dir: &Path) -> usize {
        fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn unavailable_facility_touches_nothing() {
        let dir = scratch_dir();
        let facility = Arc::new(FakeFacility {
            unavailable: true,
            ..Default::default()
        });
        let mut capture = controller(facility, &dir);

        let result = capture.dispatch(Bearing::from_degrees(10.0));
        assert!(matches!(result, DispatchResult::Rejected(CaptureReport::Unavailable)));
        assert!(!dir.exists());
        assert!(!capture.state().is_capturing());
        assert!(!capture.is_pending());
    }

    #[tokio::test]
    async fn refused_launch_removes_placeholder() {
        let dir = scratch_dir();
        let facility = Arc::new(FakeFacility {
            refuse: true,
            ..Default::default()
        });
        let mut capture = controller(facility, &dir);

        let result = capture.dispatch(Bearing::from_degrees(10.0));
        assert!(matches!(result, DispatchResult::Rejected(CaptureReport::Failed { .. })));
        assert_eq!(file_count(&dir), 0);
        assert!(!capture.state().is_capturing());

        let _ = fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn success_writes_dispatch_time_heading() {
        let dir = scratch_dir();
        let facility = Arc::new(FakeFacility::default());
        let mut capture = controller(facility.clone(), &dir);

        assert!(matches!(capture.dispatch(Bearing::from_degrees(45.0)), DispatchResult::Launched));
        assert!(capture.state().is_capturing());

        let request = facility.requests.lock().unwrap()[0].clone();
        assert!(request.output.as_str().starts_with("content://test.fileprovider/my_images/JPEG_"));
        fill_with_jpeg(&request.path);
        facility.reply(CaptureOutcome::Succeeded(request.path.clone()));

        let outcome = capture.wait_for_outcome().await;
        let report = capture.complete(outcome).await;
        assert_eq!(
            report,
            CaptureReport::DirectionWritten {
                path: request.path.clone(),
                direction: DirectionRational::new(4500, 100).unwrap(),
            }
        );
        assert_eq!(read_direction(&request.path).unwrap().unwrap().to_string(), "4500/100");
        assert!(!capture.state().is_capturing());

        fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn second_request_while_capturing_is_ignored() {
        let dir = scratch_dir();
        let facility = Arc::new(FakeFacility::default());
        let mut capture = controller(facility.clone(), &dir);

        assert!(matches!(capture.dispatch(None), DispatchResult::Launched));
        assert!(matches!(capture.dispatch(None), DispatchResult::AlreadyCapturing));
        assert_eq!(facility.requests.lock().unwrap().len(), 1);

        fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn success_without_heading_leaves_photo_untagged() {
        let dir = scratch_dir();
        let facility = Arc::new(FakeFacility::default());
        let mut capture = controller(facility.clone(), &dir);

        capture.dispatch(None);
        let path = facility.requests.lock().unwrap()[0].path.clone();
        fill_with_jpeg(&path);

        let report = capture.complete(CaptureOutcome::Succeeded(path.clone())).await;
        assert!(matches!(report, CaptureReport::SavedWithoutDirection { .. }));
        assert!(read_direction(&path).unwrap().is_none());

        fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn unreadable_photo_is_kept_without_direction() {
        let dir = scratch_dir();
        let facility = Arc::new(FakeFacility::default());
        let mut capture = controller(facility.clone(), &dir);

        capture.dispatch(Bearing::from_degrees(90.0));
        let path = facility.requests.lock().unwrap()[0].path.clone();
        fs::write(&path, b"not an image").unwrap();

        let report = capture.complete(CaptureOutcome::Succeeded(path.clone())).await;
        assert!(matches!(report, CaptureReport::SavedWithoutDirection { .. }));
        assert_eq!(fs::read(&path).unwrap(), b"not an image");
        assert!(!capture.state().is_capturing());

        fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn reported_path_is_ignored_in_favour_of_dispatched_file() {
        let dir = scratch_dir();
        let facility = Arc::new(FakeFacility::default());
        let mut capture = controller(facility.clone(), &dir);

        capture.dispatch(Bearing::from_degrees(45.0));
        let placeholder = facility.requests.lock().unwrap()[0].path.clone();
        let elsewhere = dir.join("elsewhere.jpg");
        fill_with_jpeg(&elsewhere);

        let report = capture.complete(CaptureOutcome::Succeeded(elsewhere.clone())).await;
        assert!(matches!(report, CaptureReport::Failed { .. }));
        assert!(!placeholder.exists());
        assert!(read_direction(&elsewhere).unwrap().is_none());
        assert!(!capture.state().is_capturing());

        fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn dispatched_file_is_tagged_whatever_path_is_reported() {
        let dir = scratch_dir();
        let facility = Arc::new(FakeFacility::default());
        let mut capture = controller(facility.clone(), &dir);

        capture.dispatch(Bearing::from_degrees(90.0));
        let placeholder = facility.requests.lock().unwrap()[0].path.clone();
        fill_with_jpeg(&placeholder);

        let report = capture.complete(CaptureOutcome::Succeeded(dir.join("bogus.jpg"))).await;
        assert_eq!(
            report,
            CaptureReport::DirectionWritten {
                path: placeholder.clone(),
                direction: DirectionRational::new(9000, 100).unwrap(),
            }
        );
        assert_eq!(read_direction(&placeholder).unwrap().unwrap().to_string(), "9000/100");

        fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn cancel_and_failure_clean_up_placeholder() {
        let dir = scratch_dir();
        let facility = Arc::new(FakeFacility::default());
        let mut capture = controller(facility.clone(), &dir);

        capture.dispatch(Bearing::from_degrees(1.0));
        facility.reply(CaptureOutcome::Cancelled);
        let outcome = capture.wait_for_outcome().await;
        assert_eq!(capture.complete(outcome).await, CaptureReport::Cancelled);
        assert_eq!(file_count(&dir), 0);

        capture.dispatch(Bearing::from_degrees(1.0));
        facility.replies.lock().unwrap().clear();
        let outcome = capture.wait_for_outcome().await;
        assert!(matches!(outcome, CaptureOutcome::Failed(_)));
        assert!(matches!(capture.complete(outcome).await, CaptureReport::Failed { .. }));
        assert_eq!(file_count(&dir), 0);
        assert!(!capture.state().is_capturing());

        fs::remove_dir_all(dir).unwrap();
    }
}
