//! The single compass-camera screen.
//!
//! [`CompassScreen`] owns the heading estimator and the capture controller. While
//! resumed it runs as one task that merges the sensor stream, capture requests
//! and the capture outcome; pausing stops that task and hands the screen back.

pub mod display;
mod loop_worker;

use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::capture::{CaptureController, CaptureReport, CaptureState};
use crate::heading::{Bearing, HeadingEstimator};
use crate::sensing::{SensorManager, SensorRate, SensorReading, SensorSubscription};

pub use display::{HeadingDisplay, LogDisplay};

use loop_worker::screen_loop;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenCommand {
    Capture,
}

pub struct CompassScreen {
    estimator: HeadingEstimator,
    capture: CaptureController,
    display: Box<dyn HeadingDisplay>,
    sensors: Arc<dyn SensorManager>,
    sensor_rate: SensorRate,
}

impl CompassScreen {
    pub fn new(
        estimator: HeadingEstimator,
        capture: CaptureController,
        display: Box<dyn HeadingDisplay>,
        sensors: Arc<dyn SensorManager>,
        sensor_rate: SensorRate,
    ) -> Self {
        Self {
            estimator,
            capture,
            display,
            sensors,
            sensor_rate,
        }
    }

    pub fn current_bearing(&self) -> Option<Bearing> {
        self.estimator.current_bearing()
    }

    pub fn capture_state(&self) -> &CaptureState {
        self.capture.state()
    }

    /// Subscribes to the sensors and starts the screen task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn resume(self) -> ScreenHandle {
        let (subscription, readings) =
            SensorSubscription::acquire(self.sensors.clone(), self.sensor_rate);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (report_tx, report_rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();

        let handle = tokio::spawn(screen_loop(
            self,
            subscription,
            readings,
            command_rx,
            report_tx,
            cancel_token.clone(),
        ));

        ScreenHandle {
            commands: command_tx,
            reports: report_rx,
            cancel_guard: cancel_token.drop_guard(),
            handle,
        }
    }

    fn on_reading(&mut self, reading: SensorReading) {
        if let Some(bearing) = self.estimator.apply(reading) {
            self.display.show_heading(&bearing.display_text());
        }
    }
}

/// Control surface of a resumed screen.
///
/// Dropping the handle without [`ScreenHandle::pause`] still stops the screen
/// task and releases the sensors; the screen itself is then lost.
pub struct ScreenHandle {
    commands: mpsc::UnboundedSender<ScreenCommand>,
    reports: mpsc::UnboundedReceiver<CaptureReport>,
    cancel_guard: DropGuard,
    handle: JoinHandle<CompassScreen>,
}

impl ScreenHandle {
    /// The shutter action. The heading is read when the request is handled.
    pub fn request_capture(&self) -> Result<()> {
        self.commands
            .send(ScreenCommand::Capture)
            .map_err(|_| anyhow!("compass screen is no longer running"))
    }

    /// Next finished capture attempt. `None` once the screen task has stopped.
    pub async fn next_report(&mut self) -> Option<CaptureReport> {
        self.reports.recv().await
    }

    /// Releases the sensors and returns the screen. An in-flight capture stays
    /// pending and is completed after the next [`CompassScreen::resume`].
    pub async fn pause(self) -> Result<CompassScreen> {
        let Self {
            cancel_guard,
            handle,
            ..
        } = self;
        cancel_guard.disarm().cancel();
        handle
            .await
            .context("compass screen task failed to join")
    }
}
