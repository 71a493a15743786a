use std::rc::Rc;

use portmidi::{DeviceInfo, InputPort, MidiEvent, MidiMessage, OutputPort, PortMidi};

use tickseq_core::midi::{Encoder, InputHandle, Message};

use super::{
  MidiDestination, MidiDriver, MidiEndpoint, MidiError, MidiInput, MidiOutput, MidiResult,
  MidiSource,
};

pub const ID: &str = "PortMIDI";

const MIDI_BUF_LEN: usize = 8 * 1024;

const READ_BATCH: usize = 256;

pub struct PortMidiDriver {
  context: Rc<PortMidi>,
}

impl PortMidiDriver {
  pub fn new() -> MidiResult<PortMidiDriver> {
    PortMidi::new()
      .map_err(|err| MidiError::Init {
        cause: format!("{:?}", err),
      })
      .map(|context| PortMidiDriver {
        context: Rc::new(context),
      })
  }

  fn devices<P>(&self, predicate: P) -> Vec<DeviceInfo>
  where
    P: Fn(&DeviceInfo) -> bool,
  {
    self
      .context
      .devices()
      .map(|devices| devices.into_iter().filter(|device| predicate(device)).collect())
      .unwrap_or_else(|_| Vec::new())
  }
}

impl MidiDriver for PortMidiDriver {
  fn id(&self) -> &str {
    ID
  }

  fn sources(&self) -> Vec<Box<dyn MidiSource>> {
    self
      .devices(DeviceInfo::is_input)
      .into_iter()
      .map(|device| {
        Box::new(PortMidiEndpoint {
          name: device.name().clone(),
          context: Rc::clone(&self.context),
          device,
        }) as Box<dyn MidiSource>
      })
      .collect()
  }

  fn destinations(&self) -> Vec<Box<dyn MidiDestination>> {
    self
      .devices(DeviceInfo::is_output)
      .into_iter()
      .map(|device| {
        Box::new(PortMidiEndpoint {
          name: device.name().clone(),
          context: Rc::clone(&self.context),
          device,
        }) as Box<dyn MidiDestination>
      })
      .collect()
  }
}

struct PortMidiEndpoint {
  name: String,
  context: Rc<PortMidi>,
  device: DeviceInfo,
}

impl MidiEndpoint for PortMidiEndpoint {
  fn name(&self) -> &str {
    self.name.as_str()
  }
}

impl MidiDestination for PortMidiEndpoint {
  fn open(&self) -> MidiResult<Box<dyn MidiOutput>> {
    self
      .context
      .output_port(self.device.clone(), MIDI_BUF_LEN)
      .map_err(|err| MidiError::DestinationOpen {
        cause: format!("Device={:?}, Error={:?}", self.name, err),
      })
      .map(|port| {
        Box::new(PortMidiOutput {
          name: self.name.clone(),
          _context: self.context.clone(),
          port,
        }) as Box<dyn MidiOutput>
      })
  }
}

impl MidiSource for PortMidiEndpoint {
  fn open(&self) -> MidiResult<Box<dyn MidiInput>> {
    self
      .context
      .input_port(self.device.clone(), MIDI_BUF_LEN)
      .map_err(|err| MidiError::SourceOpen {
        cause: format!("Device={:?}, Error={:?}", self.name, err),
      })
      .map(|port| {
        Box::new(PortMidiInput {
          name: self.name.clone(),
          _context: self.context.clone(),
          port,
        }) as Box<dyn MidiInput>
      })
  }
}

struct PortMidiOutput {
  name: String,
  _context: Rc<PortMidi>,
  port: OutputPort,
}

impl MidiEndpoint for PortMidiOutput {
  fn name(&self) -> &str {
    self.name.as_str()
  }
}

impl MidiOutput for PortMidiOutput {
  fn send(&mut self, message: &Message) -> MidiResult<()> {
    let result = match Encoder::to_short(message) {
      Some(word) => {
        let message = MidiMessage::from([
          (word & 0xff) as u8,
          ((word >> 8) & 0xff) as u8,
          ((word >> 16) & 0xff) as u8,
        ]);
        self.port.write_event(MidiEvent {
          message,
          timestamp: 0,
        })
      }
      None => self.port.write_sysex(0, &Encoder::to_vec(message)),
    };
    result.map_err(|err| MidiError::Send {
      cause: format!("Device={:?}, Error={:?}", self.name, err),
    })
  }
}

struct PortMidiInput {
  name: String,
  _context: Rc<PortMidi>,
  port: InputPort,
}

impl MidiEndpoint for PortMidiInput {
  fn name(&self) -> &str {
    self.name.as_str()
  }
}

impl MidiInput for PortMidiInput {
  fn poll(&mut self, input: &InputHandle) -> MidiResult<usize> {
    let events = self
      .port
      .read_n(READ_BATCH)
      .map_err(|err| MidiError::Receive {
        cause: format!("Device={:?}, Error={:?}", self.name, err),
      })?
      .unwrap_or_default();

    for event in events.iter() {
      let MidiMessage {
        status,
        data1,
        data2,
        ..
      } = event.message;
      let bytes = [status, data1, data2];
      input.push(event.timestamp, &bytes[..short_message_len(status)]);
    }
    Ok(events.len())
  }
}

/// Number of bytes of a short message given its status byte.
fn short_message_len(status: u8) -> usize {
  match status {
    0x80..=0xbf | 0xe0..=0xef | 0xf2 => 3,
    0xc0..=0xdf | 0xf1 | 0xf3 => 2,
    _ => 1,
  }
}
