use crossbeam_channel::{Sender, TrySendError};
use failure::Fail;

use crate::midi::{Message, ValidationError};

#[derive(Debug, Fail, Clone, PartialEq)]
pub enum SinkError {
  #[fail(display = "Invalid message: {}", _0)]
  Invalid(#[fail(cause)] ValidationError),

  #[fail(display = "The output queue is full")]
  Full,

  #[fail(display = "The output has been disconnected")]
  Disconnected,

  #[fail(display = "Failed to send to the device: {}", cause)]
  Device { cause: String },
}

impl From<ValidationError> for SinkError {
  fn from(err: ValidationError) -> Self {
    SinkError::Invalid(err)
  }
}

/// Destination of the events produced by the sequencer.
///
/// `send` is called with the sequencer lock held, so it must not block.
pub trait NoteSink: Send {
  fn send(&mut self, message: Message) -> Result<(), SinkError>;

  fn send_note_on(&mut self, channel: u8, key: u8, velocity: u8) -> Result<(), SinkError> {
    self.send(Message::note_on(channel, key, velocity)?)
  }

  fn send_note_off(&mut self, channel: u8, key: u8, velocity: u8) -> Result<(), SinkError> {
    self.send(Message::note_off(channel, key, velocity)?)
  }
}

/// Forwards messages into a channel, typically towards a device thread.
pub struct ChannelSink<T> {
  tx: Sender<T>,
}

impl<T> ChannelSink<T>
where
  T: From<Message> + Send,
{
  pub fn new(tx: Sender<T>) -> ChannelSink<T> {
    ChannelSink { tx }
  }
}

impl<T> NoteSink for ChannelSink<T>
where
  T: From<Message> + Send,
{
  fn send(&mut self, message: Message) -> Result<(), SinkError> {
    message.validate()?;
    self.tx.try_send(T::from(message)).map_err(|err| match err {
      TrySendError::Full(_) => SinkError::Full,
      TrySendError::Disconnected(_) => SinkError::Disconnected,
    })
  }
}

#[cfg(test)]
pub(crate) mod test {

  use super::*;
  use std::sync::{Arc, Mutex};

  /// Records everything it receives.
  #[derive(Clone, Default)]
  pub struct RecordingSink {
    pub messages: Arc<Mutex<Vec<Message>>>,
  }

  impl RecordingSink {
    pub fn take(&self) -> Vec<Message> {
      std::mem::replace(&mut *self.messages.lock().unwrap(), Vec::new())
    }
  }

  impl NoteSink for RecordingSink {
    fn send(&mut self, message: Message) -> Result<(), SinkError> {
      message.validate()?;
      self.messages.lock().unwrap().push(message);
      Ok(())
    }
  }

  #[test]
  pub fn note_helpers_validate() {
    let mut sink = RecordingSink::default();
    assert_eq!(sink.send_note_on(9, 36, 80), Ok(()));
    assert_eq!(
      sink.send_note_on(16, 36, 80),
      Err(SinkError::Invalid(ValidationError::Channel(16)))
    );
    assert_eq!(
      sink.send_note_off(0, 128, 0),
      Err(SinkError::Invalid(ValidationError::Note(128)))
    );
    assert_eq!(
      sink.take(),
      vec![Message::NoteOn {
        channel: 9,
        key: 36,
        velocity: 80
      }]
    );
  }

  #[test]
  pub fn channel_sink_errors() {
    let (tx, rx) = crossbeam_channel::bounded::<Message>(1);
    let mut sink = ChannelSink::new(tx);
    assert_eq!(sink.send(Message::TimingClock), Ok(()));
    assert_eq!(sink.send(Message::TimingClock), Err(SinkError::Full));
    assert_eq!(rx.recv(), Ok(Message::TimingClock));
    drop(rx);
    assert_eq!(sink.send(Message::Start), Err(SinkError::Disconnected));
  }
}
