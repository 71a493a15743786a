use log::{info, trace};

use tickseq_core::midi::{Encoder, Message};

use super::{MidiDestination, MidiDriver, MidiEndpoint, MidiOutput, MidiResult, MidiSource};

pub const ID: &str = "logger";

const DESTINATION_NAME: &str = "log";

/// A driver without devices that writes every outgoing message to the log.
pub struct LoggerDriver {
  app_name: String,
}

impl LoggerDriver {
  pub fn new(app_name: String) -> LoggerDriver {
    LoggerDriver { app_name }
  }
}

impl MidiDriver for LoggerDriver {
  fn id(&self) -> &str {
    ID
  }

  fn sources(&self) -> Vec<Box<dyn MidiSource>> {
    Vec::new()
  }

  fn destinations(&self) -> Vec<Box<dyn MidiDestination>> {
    vec![Box::new(LoggerDestination {
      target: self.app_name.clone(),
    })]
  }
}

struct LoggerDestination {
  target: String,
}

impl MidiEndpoint for LoggerDestination {
  fn name(&self) -> &str {
    DESTINATION_NAME
  }
}

impl MidiDestination for LoggerDestination {
  fn open(&self) -> MidiResult<Box<dyn MidiOutput>> {
    Ok(Box::new(LoggerOutput {
      target: self.target.clone(),
      sent: 0,
    }))
  }
}

struct LoggerOutput {
  target: String,
  sent: u64,
}

impl MidiEndpoint for LoggerOutput {
  fn name(&self) -> &str {
    DESTINATION_NAME
  }
}

impl MidiOutput for LoggerOutput {
  fn send(&mut self, message: &Message) -> MidiResult<()> {
    self.sent += 1;
    let bytes = Encoder::to_vec(message);
    if message.is_real_time() {
      trace!("[{}] #{} {:?} {:02x?}", self.target, self.sent, message, bytes);
    } else {
      info!("[{}] #{} {:?} {:02x?}", self.target, self.sent, message, bytes);
    }
    Ok(())
  }
}
