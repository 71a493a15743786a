use std::fmt;

use failure::Fail;

pub type U4 = u8;
pub type U7 = u8;
pub type U14 = u16;

pub const MAX_U7: U7 = 0x7f;
pub const MAX_U14: U14 = 0x3fff;
pub const CHANNELS: u8 = 16;

#[derive(Debug, Fail, Clone, PartialEq)]
pub enum ValidationError {
  #[fail(display = "Channel out of range [0, 16): {}", _0)]
  Channel(u8),

  #[fail(display = "Note out of range [0, 127]: {}", _0)]
  Note(u8),

  #[fail(display = "Velocity out of range [0, 127]: {}", _0)]
  Velocity(u8),

  #[fail(display = "Controller out of range [0, 127]: {}", _0)]
  Controller(u8),

  #[fail(display = "Control value out of range [0, 127]: {}", _0)]
  ControlValue(u8),

  #[fail(display = "Program out of range [0, 127]: {}", _0)]
  Program(u8),

  #[fail(display = "Pitch bend out of range [0, 16383]: {}", _0)]
  PitchBend(u16),

  #[fail(display = "SysEx data byte out of range [0, 127]: {}", _0)]
  SysExData(u8),

  #[fail(display = "Duration must be at least one tick")]
  Duration,

  #[fail(display = "Tempo out of range [1, 360]: {}", _0)]
  Tempo(u16),

  #[fail(display = "Sequence length must be greater than zero")]
  EmptySequence,

  #[fail(display = "Slot {} out of range for a sequence of length {}", slot, length)]
  Slot { slot: usize, length: usize },

  #[fail(display = "Probability out of range (0, 1]: {}", _0)]
  Probability(f64),

  #[fail(display = "Quantization must be at least one tick")]
  Quantization,

  #[fail(display = "No notes to generate sequences with")]
  EmptyNoteSet,
}

pub(crate) fn check_u7<F>(value: u8, err: F) -> Result<U7, ValidationError>
where
  F: FnOnce(u8) -> ValidationError,
{
  if value <= MAX_U7 {
    Ok(value)
  } else {
    Err(err(value))
  }
}

/// A MIDI channel in the range [0, 16).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Channel(U4);

impl Channel {
  /// General MIDI routes percussion to the tenth channel.
  pub const PERCUSSION: Channel = Channel(9);

  pub fn new(channel: u8) -> Result<Channel, ValidationError> {
    if channel < CHANNELS {
      Ok(Channel(channel))
    } else {
      Err(ValidationError::Channel(channel))
    }
  }

  pub fn index(self) -> U4 {
    self.0
  }
}

impl From<Channel> for u8 {
  fn from(item: Channel) -> Self {
    item.0
  }
}

impl fmt::Display for Channel {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}
