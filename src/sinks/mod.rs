//! Physical log destinations

pub mod console;
pub mod rotating_file;

pub use console::{ConsoleSink, SharedBuffer};
pub use rotating_file::{
    Backup, RotatingFileSink, RotationPolicy, FLUSH_INTERVAL, FORCED_ROTATION_INTERVAL,
};
