pub mod reading;
pub mod subscription;

pub use reading::{SensorAxis, SensorRate, SensorReading};
pub use subscription::{SensorManager, SensorSubscription};
