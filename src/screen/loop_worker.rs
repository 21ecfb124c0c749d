use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::capture::{CaptureReport, DispatchResult};
use crate::sensing::{SensorReading, SensorSubscription};

use super::{CompassScreen, ScreenCommand};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Drives one active period of the screen: from resume to pause.
///
/// Sensor readings, capture requests and the capture outcome are handled one at
/// a time, so the screen state needs no locking.
pub(super) async fn screen_loop(
    mut screen: CompassScreen,
    subscription: SensorSubscription,
    mut readings: mpsc::UnboundedReceiver<SensorReading>,
    mut commands: mpsc::UnboundedReceiver<ScreenCommand>,
    reports: mpsc::UnboundedSender<CaptureReport>,
    cancel_token: CancellationToken,
) -> CompassScreen {
    log_info!("compass screen active");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                break;
            }
            outcome = screen.capture.wait_for_outcome(), if screen.capture.is_pending() => {
                let report = screen.capture.complete(outcome).await;
                publish(&reports, report);
            }
            Some(command) = commands.recv() => match command {
                ScreenCommand::Capture => {
                    let bearing = screen.estimator.current_bearing();
                    match screen.capture.dispatch(bearing) {
                        DispatchResult::Launched | DispatchResult::AlreadyCapturing => {}
                        DispatchResult::Rejected(report) => publish(&reports, report),
                    }
                }
            },
            Some(reading) = readings.recv() => {
                screen.on_reading(reading);
            }
        }
    }

    subscription.release();
    log_info!("compass screen paused");
    screen
}

fn publish(reports: &mpsc::UnboundedSender<CaptureReport>, report: CaptureReport) {
    if reports.send(report).is_err() {
        log_warn!("capture report dropped: no listener");
    }
}
