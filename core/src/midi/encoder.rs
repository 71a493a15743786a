use super::messages::Message;
use super::types::{U14, U4, U7};

pub const NOTE_OFF: U4 = 0b1000;
pub const NOTE_ON: U4 = 0b1001;
pub const CONTROL_CHANGE: U4 = 0b1011;
pub const PROGRAM_CHANGE: U4 = 0b1100;
pub const PITCH_BEND: U4 = 0b1110;

pub const SYSEX_START: u8 = 0xf0;
pub const SYSEX_END: u8 = 0xf7;
pub const TIMING_CLOCK: u8 = 0xf8;
pub const START: u8 = 0xfa;
pub const CONTINUE: u8 = 0xfb;
pub const STOP: u8 = 0xfc;
pub const ACTIVE_SENSING: u8 = 0xfe;
pub const SYSTEM_RESET: u8 = 0xff;

#[inline]
fn u7(d: &U7) -> u8 {
  d & 0x7f
}

#[inline]
fn u14_msb(d: &U14) -> u8 {
  ((d >> 7) & 0x7fu16) as u8
}

#[inline]
fn u14_lsb(d: &U14) -> u8 {
  (d & 0x7f) as u8
}

#[inline]
fn status_and_channel(status: U4, channel: &U4) -> u8 {
  (status << 4) | (channel & 0x0f)
}

pub struct Encoder;

impl Encoder {
  pub fn data_size(msg: &Message) -> usize {
    match msg {
      Message::NoteOff { .. } => 3,
      Message::NoteOn { .. } => 3,
      Message::ControlChange { .. } => 3,
      Message::ProgramChange { .. } => 2,
      Message::PitchBend { .. } => 3,
      Message::SysEx { data } => data.len() + 2,
      Message::TimingClock
      | Message::Start
      | Message::Continue
      | Message::Stop
      | Message::ActiveSensing
      | Message::SystemReset => 1,
      Message::Unknown(data) => data.len(),
    }
  }

  /// Writes the wire bytes of `msg` into `out`, which must hold at least
  /// `data_size(msg)` bytes. Returns the number of bytes written.
  pub fn encode(msg: &Message, out: &mut [u8]) -> usize {
    match msg {
      Message::NoteOff {
        channel,
        key,
        velocity,
      } => out[..3].copy_from_slice(&[status_and_channel(NOTE_OFF, channel), u7(key), u7(velocity)]),
      Message::NoteOn {
        channel,
        key,
        velocity,
      } => out[..3].copy_from_slice(&[status_and_channel(NOTE_ON, channel), u7(key), u7(velocity)]),
      Message::ControlChange {
        channel,
        controller,
        value,
      } => out[..3].copy_from_slice(&[
        status_and_channel(CONTROL_CHANGE, channel),
        u7(controller),
        u7(value),
      ]),
      Message::ProgramChange { channel, program } => {
        out[..2].copy_from_slice(&[status_and_channel(PROGRAM_CHANGE, channel), u7(program)])
      }
      Message::PitchBend { channel, value } => out[..3].copy_from_slice(&[
        status_and_channel(PITCH_BEND, channel),
        u14_lsb(value),
        u14_msb(value),
      ]),
      Message::SysEx { data } => {
        out[0] = SYSEX_START;
        for (dst, src) in out[1..=data.len()].iter_mut().zip(data.iter()) {
          *dst = u7(src);
        }
        out[data.len() + 1] = SYSEX_END;
      }
      Message::TimingClock => out[0] = TIMING_CLOCK,
      Message::Start => out[0] = START,
      Message::Continue => out[0] = CONTINUE,
      Message::Stop => out[0] = STOP,
      Message::ActiveSensing => out[0] = ACTIVE_SENSING,
      Message::SystemReset => out[0] = SYSTEM_RESET,
      Message::Unknown(data) => out[..data.len()].copy_from_slice(data),
    }
    Self::data_size(msg)
  }

  pub fn to_vec(msg: &Message) -> Vec<u8> {
    let mut out = vec![0; Self::data_size(msg)];
    Self::encode(msg, &mut out);
    out
  }

  /// Packs a message of up to three bytes into the host short message word:
  /// `status | data1 << 8 | data2 << 16`.
  pub fn to_short(msg: &Message) -> Option<u32> {
    let size = Self::data_size(msg);
    match msg {
      Message::SysEx { .. } | Message::Unknown(_) => None,
      _ => {
        let mut out = [0u8; 3];
        Self::encode(msg, &mut out);
        Some(
          out[..size]
            .iter()
            .enumerate()
            .fold(0u32, |word, (i, byte)| word | (u32::from(*byte) << (8 * i))),
        )
      }
    }
  }
}
