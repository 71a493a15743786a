use crate::midi::encoder;
use crate::midi::messages::Message;
use crate::midi::types::{U14, U4, U7};

/// Iterates over the messages found in a raw MIDI byte stream.
///
/// Malformed or unsupported data is reported as `Message::Unknown` with the
/// bytes that were consumed, so decoding always makes progress.
pub struct Decoder<'a> {
  pos: usize,
  start: usize,
  sysex_data: Vec<U7>,
  sysex_decoding: bool,
  data: &'a [u8],
}

impl<'a> Decoder<'a> {
  pub fn new(data: &'a [u8]) -> Decoder<'a> {
    Decoder {
      pos: 0,
      start: 0,
      sysex_data: Vec::new(),
      sysex_decoding: false,
      data,
    }
  }

  /// Unpacks a host short message word (`status | data1 << 8 | data2 << 16`).
  pub fn from_short(word: u32) -> Message {
    let bytes = [
      (word & 0xff) as u8,
      ((word >> 8) & 0xff) as u8,
      ((word >> 16) & 0xff) as u8,
    ];
    let size = match bytes[0] >> 4 {
      0b1100 | 0b1101 => 2,
      0b1111 => 1,
      _ => 3,
    };
    Decoder::new(&bytes[..size])
      .next()
      .unwrap_or_else(|| Message::Unknown(bytes[..size].to_vec()))
  }

  fn unknown(&self, end: usize) -> Message {
    Message::Unknown(self.data[self.start..end].to_vec())
  }

  fn next_data(&mut self) -> Result<U7, usize> {
    if self.pos < self.data.len() {
      let d1 = self.data[self.pos];
      if d1 & 0b1000_0000 == 0 {
        self.pos += 1;
        Ok(d1)
      } else {
        Err(self.pos)
      }
    } else {
      Err(self.pos)
    }
  }

  fn next_data2(&mut self) -> Result<(U7, U7), usize> {
    self
      .next_data()
      .and_then(|d1| self.next_data().map(|d2| (d1, d2)))
  }

  fn decode_note(&mut self, channel: U4, is_on: bool) -> Message {
    match self.next_data2() {
      Ok((key, velocity)) if is_on => Message::NoteOn {
        channel,
        key,
        velocity,
      },
      Ok((key, velocity)) => Message::NoteOff {
        channel,
        key,
        velocity,
      },
      Err(end) => self.unknown(end),
    }
  }

  fn decode_control_change(&mut self, channel: U4) -> Message {
    match self.next_data2() {
      Ok((controller, value)) => Message::ControlChange {
        channel,
        controller,
        value,
      },
      Err(end) => self.unknown(end),
    }
  }

  fn decode_program_change(&mut self, channel: U4) -> Message {
    match self.next_data() {
      Ok(program) => Message::ProgramChange { channel, program },
      Err(end) => self.unknown(end),
    }
  }

  fn decode_pitch_bend(&mut self, channel: U4) -> Message {
    match self.next_data2() {
      Ok((lsb, msb)) => Message::PitchBend {
        channel,
        value: ((msb as U14) << 7) | (lsb as U14),
      },
      Err(end) => self.unknown(end),
    }
  }

  /// Consumes the data bytes of a message kind that is not modelled.
  fn skip_data(&mut self, count: usize) -> Message {
    for _ in 0..count {
      if self.next_data().is_err() {
        break;
      }
    }
    self.unknown(self.pos)
  }

  fn decode_sysex_start(&mut self) -> Option<Message> {
    if !self.sysex_decoding {
      self.sysex_decoding = true;
      self.decode_sysex_data()
    } else {
      Some(self.unknown(self.pos))
    }
  }

  fn decode_sysex_end(&mut self) -> Option<Message> {
    if self.sysex_decoding {
      self.sysex_decoding = false;
      let data = std::mem::replace(&mut self.sysex_data, Vec::new());
      Some(Message::SysEx { data })
    } else {
      Some(self.unknown(self.pos))
    }
  }

  fn decode_sysex_data(&mut self) -> Option<Message> {
    let start = self.pos;
    let mut pos = start;
    while pos < self.data.len() && (self.data[pos] & 0x80) == 0 {
      pos += 1
    }
    self.pos = pos;
    self.sysex_data.extend_from_slice(&self.data[start..pos]);
    if pos < self.data.len() {
      let status = self.data[pos];
      self.start = self.pos;
      self.pos += 1;
      self.decode(status)
    } else {
      self.sysex_decoding = false;
      let mut data = std::mem::replace(&mut self.sysex_data, Vec::new());
      data.insert(0, encoder::SYSEX_START);
      Some(Message::Unknown(data))
    }
  }

  fn decode(&mut self, status: u8) -> Option<Message> {
    let channel = status & 0x0f;
    match status >> 4 {
      encoder::NOTE_OFF => Some(self.decode_note(channel, false)),
      encoder::NOTE_ON => Some(self.decode_note(channel, true)),
      encoder::CONTROL_CHANGE => Some(self.decode_control_change(channel)),
      encoder::PROGRAM_CHANGE => Some(self.decode_program_change(channel)),
      encoder::PITCH_BEND => Some(self.decode_pitch_bend(channel)),
      0b1010 => Some(self.skip_data(2)),
      0b1101 => Some(self.skip_data(1)),
      0b1111 => match status {
        encoder::SYSEX_START => self.decode_sysex_start(),
        encoder::SYSEX_END => self.decode_sysex_end(),
        0xf1 | 0xf3 => Some(self.skip_data(1)),
        0xf2 => Some(self.skip_data(2)),
        encoder::TIMING_CLOCK => Some(Message::TimingClock),
        encoder::START => Some(Message::Start),
        encoder::CONTINUE => Some(Message::Continue),
        encoder::STOP => Some(Message::Stop),
        encoder::ACTIVE_SENSING => Some(Message::ActiveSensing),
        encoder::SYSTEM_RESET => Some(Message::SystemReset),
        _ => Some(self.unknown(self.pos)),
      },
      _ => Some(Message::Unknown(vec![status])),
    }
  }
}

impl<'a> Iterator for Decoder<'a> {
  type Item = Message;

  fn next(&mut self) -> Option<Message> {
    if self.sysex_decoding {
      self.decode_sysex_data()
    } else if self.pos < self.data.len() {
      let status = self.data[self.pos];
      self.start = self.pos;
      self.pos += 1;
      self.decode(status)
    } else {
      None
    }
  }
}
