use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::reading::{SensorAxis, SensorRate, SensorReading};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error};

/// Host sensor service. Implementations forward every callback into `sink`.
pub trait SensorManager: Send + Sync {
    fn register(
        &self,
        axis: SensorAxis,
        rate: SensorRate,
        sink: mpsc::UnboundedSender<SensorReading>,
    ) -> Result<()>;

    /// Drops every listener registered through this manager.
    fn unregister_all(&self);
}

/// Listener registration for both axes, released when dropped.
pub struct SensorSubscription {
    manager: Arc<dyn SensorManager>,
    released: bool,
}

impl SensorSubscription {
    /// Registers both axes on one merged channel.
    ///
    /// A failed registration is logged and skipped: that axis never reports and
    /// the heading stays unavailable, but the screen keeps working.
    pub fn acquire(
        manager: Arc<dyn SensorManager>,
        rate: SensorRate,
    ) -> (Self, mpsc::UnboundedReceiver<SensorReading>) {
        let (tx, rx) = mpsc::unbounded_channel();

        for axis in [SensorAxis::Magnetometer, SensorAxis::Accelerometer] {
            match manager.register(axis, rate, tx.clone()) {
                Ok(()) => log_debug!(
                    "registered {} listener every {:?}",
                    axis.as_str(),
                    rate.sampling_period()
                ),
                Err(err) => log_error!("failed to register {} listener: {err:?}", axis.as_str()),
            }
        }

        (
            Self {
                manager,
                released: false,
            },
            rx,
        )
    }

    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.manager.unregister_all();
            self.released = true;
            log_debug!("sensor listeners released");
        }
    }
}

impl Drop for SensorSubscription {
    fn drop(&mut self) {
        self.release_inner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingManager {
        registered: Mutex<Vec<SensorAxis>>,
        sinks: Mutex<Vec<mpsc::UnboundedSender<SensorReading>>>,
        unregister_calls: Mutex<u32>,
        missing: Option<SensorAxis>,
    }

    impl SensorManager for RecordingManager {
        fn register(
            &self,
            axis: SensorAxis,
            _rate: SensorRate,
            sink: mpsc::UnboundedSender<SensorReading>,
        ) -> Result<()> {
            if self.missing == Some(axis) {
                bail!("no {} on this device", axis.as_str());
            }
            self.registered.lock().unwrap().push(axis);
            self.sinks.lock().unwrap().push(sink);
            Ok(())
        }

        fn unregister_all(&self) {
            *self.unregister_calls.lock().unwrap() += 1;
            self.sinks.lock().unwrap().clear();
        }
    }

    #[test]
    fn registers_both_axes_on_one_channel() {
        let manager = Arc::new(RecordingManager::default());
        let (_subscription, mut rx) = SensorSubscription::acquire(manager.clone(), SensorRate::Game);

        assert_eq!(manager.registered.lock().unwrap().len(), 2);
        for sink in manager.sinks.lock().unwrap().iter() {
            sink.send(SensorReading::accelerometer([0.0, 0.0, 9.8])).unwrap();
        }
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn drop_releases_listeners_once() {
        let manager = Arc::new(RecordingManager::default());
        let (subscription, _rx) = SensorSubscription::acquire(manager.clone(), SensorRate::Normal);
        drop(subscription);
        assert_eq!(*manager.unregister_calls.lock().unwrap(), 1);

        let (subscription, _rx) = SensorSubscription::acquire(manager.clone(), SensorRate::Normal);
        subscription.release();
        assert_eq!(*manager.unregister_calls.lock().unwrap(), 2);
    }

    #[test]
    fn missing_sensor_is_skipped() {
        let manager = Arc::new(RecordingManager {
            missing: Some(SensorAxis::Magnetometer),
            ..Default::default()
        });
        let (_subscription, _rx) = SensorSubscription::acquire(manager.clone(), SensorRate::Game);
        assert_eq!(
            *manager.registered.lock().unwrap(),
            vec![SensorAxis::Accelerometer]
        );
    }

    #[test]
    fn rates_match_platform_periods() {
        assert_eq!(SensorRate::default(), SensorRate::Game);
        assert_eq!(SensorRate::Game.sampling_period().as_millis(), 20);
        assert_eq!(SensorRate::Fastest.sampling_period(), std::time::Duration::ZERO);
    }
}
