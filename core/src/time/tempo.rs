use std::time::Duration;

use crate::midi::types::ValidationError;
use crate::time::ticks::TICKS_PER_BEAT;

pub const MIN_BPM: u16 = 1;
pub const MAX_BPM: u16 = 360;
pub const DEFAULT_BPM: u16 = 120;

const NANOS_PER_MINUTE: u64 = 60_000_000_000;

/// Beats per minute, always within [MIN_BPM, MAX_BPM].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tempo(u16);

impl Tempo {
  /// Builds a tempo clamping the value into the valid range.
  pub fn new(value: u16) -> Tempo {
    Tempo(value.max(MIN_BPM).min(MAX_BPM))
  }

  /// Builds a tempo rejecting values out of range.
  pub fn checked(value: u16) -> Result<Tempo, ValidationError> {
    if value >= MIN_BPM && value <= MAX_BPM {
      Ok(Tempo(value))
    } else {
      Err(ValidationError::Tempo(value))
    }
  }

  pub fn get_value(&self) -> u16 {
    self.0
  }

  /// Time between two consecutive clock ticks.
  pub fn tick_period(&self) -> Duration {
    let ticks_per_minute = u64::from(self.0) * u64::from(TICKS_PER_BEAT);
    Duration::from_nanos(NANOS_PER_MINUTE / ticks_per_minute)
  }
}

impl Default for Tempo {
  fn default() -> Tempo {
    Tempo(DEFAULT_BPM)
  }
}

#[cfg(test)]
mod test {

  use super::*;

  #[test]
  pub fn tempo_new_clamps() {
    assert_eq!(Tempo::new(120).get_value(), 120);
    assert_eq!(Tempo::new(0).get_value(), MIN_BPM);
    assert_eq!(Tempo::new(1000).get_value(), MAX_BPM);
  }

  #[test]
  pub fn tempo_checked() {
    assert_eq!(Tempo::checked(1), Ok(Tempo(1)));
    assert_eq!(Tempo::checked(360), Ok(Tempo(360)));
    assert_eq!(Tempo::checked(0), Err(ValidationError::Tempo(0)));
    assert_eq!(Tempo::checked(361), Err(ValidationError::Tempo(361)));
  }

  #[test]
  pub fn tick_period() {
    assert_eq!(Tempo::new(120).tick_period(), Duration::from_nanos(20_833_333));
    assert_eq!(Tempo::new(60).tick_period(), Duration::from_nanos(41_666_666));
    assert_eq!(Tempo::new(360).tick_period(), Duration::from_nanos(6_944_444));
  }
}
