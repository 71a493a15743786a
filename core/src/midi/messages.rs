use super::types::{check_u7, ValidationError, CHANNELS, MAX_U14, U14, U4, U7};

/// Channel mode controller that silences every note held on a channel.
pub const ALL_NOTES_OFF: U7 = 123;

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
  NoteOff {
    channel: U4,
    key: U7,
    velocity: U7,
  },
  NoteOn {
    channel: U4,
    key: U7,
    velocity: U7,
  },
  ControlChange {
    channel: U4,
    controller: U7,
    value: U7,
  },
  ProgramChange {
    channel: U4,
    program: U7,
  },
  PitchBend {
    channel: U4,
    value: U14,
  },
  SysEx {
    data: Vec<U7>,
  },
  TimingClock,
  Start,
  Continue,
  Stop,
  ActiveSensing,
  SystemReset,
  Unknown(Vec<u8>),
}

fn check_channel(channel: u8) -> Result<U4, ValidationError> {
  if channel < CHANNELS {
    Ok(channel)
  } else {
    Err(ValidationError::Channel(channel))
  }
}

impl Message {
  pub fn note_on(channel: u8, key: u8, velocity: u8) -> Result<Message, ValidationError> {
    Ok(Message::NoteOn {
      channel: check_channel(channel)?,
      key: check_u7(key, ValidationError::Note)?,
      velocity: check_u7(velocity, ValidationError::Velocity)?,
    })
  }

  pub fn note_off(channel: u8, key: u8, velocity: u8) -> Result<Message, ValidationError> {
    Ok(Message::NoteOff {
      channel: check_channel(channel)?,
      key: check_u7(key, ValidationError::Note)?,
      velocity: check_u7(velocity, ValidationError::Velocity)?,
    })
  }

  pub fn control_change(channel: u8, controller: u8, value: u8) -> Result<Message, ValidationError> {
    Ok(Message::ControlChange {
      channel: check_channel(channel)?,
      controller: check_u7(controller, ValidationError::Controller)?,
      value: check_u7(value, ValidationError::ControlValue)?,
    })
  }

  pub fn program_change(channel: u8, program: u8) -> Result<Message, ValidationError> {
    Ok(Message::ProgramChange {
      channel: check_channel(channel)?,
      program: check_u7(program, ValidationError::Program)?,
    })
  }

  pub fn pitch_bend(channel: u8, value: u16) -> Result<Message, ValidationError> {
    if value > MAX_U14 {
      return Err(ValidationError::PitchBend(value));
    }
    Ok(Message::PitchBend {
      channel: check_channel(channel)?,
      value,
    })
  }

  /// Checks that every field of an already built message is in range.
  pub fn validate(&self) -> Result<(), ValidationError> {
    match self {
      Message::NoteOff {
        channel,
        key,
        velocity,
      }
      | Message::NoteOn {
        channel,
        key,
        velocity,
      } => {
        check_channel(*channel)?;
        check_u7(*key, ValidationError::Note)?;
        check_u7(*velocity, ValidationError::Velocity).map(|_| ())
      }
      Message::ControlChange {
        channel,
        controller,
        value,
      } => {
        check_channel(*channel)?;
        check_u7(*controller, ValidationError::Controller)?;
        check_u7(*value, ValidationError::ControlValue).map(|_| ())
      }
      Message::ProgramChange { channel, program } => {
        check_channel(*channel)?;
        check_u7(*program, ValidationError::Program).map(|_| ())
      }
      Message::PitchBend { channel, value } => {
        check_channel(*channel)?;
        if *value > MAX_U14 {
          Err(ValidationError::PitchBend(*value))
        } else {
          Ok(())
        }
      }
      Message::SysEx { data } => data
        .iter()
        .try_for_each(|byte| check_u7(*byte, ValidationError::SysExData).map(|_| ())),
      _ => Ok(()),
    }
  }

  pub fn channel(&self) -> Option<U4> {
    match self {
      Message::NoteOff { channel, .. }
      | Message::NoteOn { channel, .. }
      | Message::ControlChange { channel, .. }
      | Message::ProgramChange { channel, .. }
      | Message::PitchBend { channel, .. } => Some(*channel),
      _ => None,
    }
  }

  pub fn is_real_time(&self) -> bool {
    match self {
      Message::TimingClock
      | Message::Start
      | Message::Continue
      | Message::Stop
      | Message::ActiveSensing
      | Message::SystemReset => true,
      _ => false,
    }
  }
}
