use crate::midi::types::{check_u7, ValidationError, U7};

/// A note scheduled in a sequence slot: an on event followed by an off event
/// `duration` ticks later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceNote {
  key: U7,
  velocity: U7,
  duration: u32,
}

impl SequenceNote {
  pub fn new(key: u8, velocity: u8, duration: u32) -> Result<SequenceNote, ValidationError> {
    if duration == 0 {
      return Err(ValidationError::Duration);
    }
    Ok(SequenceNote {
      key: check_u7(key, ValidationError::Note)?,
      velocity: check_u7(velocity, ValidationError::Velocity)?,
      duration,
    })
  }

  pub fn key(&self) -> U7 {
    self.key
  }

  pub fn velocity(&self) -> U7 {
    self.velocity
  }

  pub fn duration(&self) -> u32 {
    self.duration
  }
}
