pub mod clock;
pub mod config;
pub mod generator;
pub mod midi;
pub mod output;
pub mod sequencing;
pub mod time;

pub use crate::midi::types::{Channel, ValidationError};
