pub mod jpeg;
pub mod rational;
pub mod tiff;
pub mod writer;

pub use rational::{encode, DirectionRational, DIRECTION_DENOMINATOR};
pub use writer::{read_direction, read_direction_ref, write_direction, DirectionRef};
