pub mod bearing;
pub mod estimator;
pub mod rotation;

pub use bearing::{normalize_degrees, Bearing};
pub use estimator::HeadingEstimator;
pub use rotation::Orientation;
