use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;

use failure::Fail;
use log::{debug, error, info, warn};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use tickseq_core::midi::{InputHandle, Message};
use tickseq_core::output::ChannelSink;

use crate::config::{Midi as MidiConfig, MidiPort};
use crate::midi::drivers::{
  MidiDriver, MidiDrivers, MidiEndpoint, MidiError, MidiInput, MidiOutput, MidiResult,
};

#[derive(Debug, Fail)]
pub enum MidiIoError {
  #[fail(display = "Failed to create the MIDI I/O thread: {}", cause)]
  Start { cause: String },

  #[fail(display = "Failed to initialise MIDI: {}", cause)]
  Init { cause: MidiError },

  #[fail(display = "Failed to join the MIDI I/O thread")]
  Stop,
}

pub enum Protocol {
  Stop,

  Send(Message),
}

impl From<Message> for Protocol {
  fn from(message: Message) -> Self {
    Protocol::Send(message)
  }
}

/// Owns the driver and its ports. Device handles are not always `Send`, so
/// everything is created and used on the I/O thread.
struct MidiIoThread {
  _driver: Box<dyn MidiDriver>,
  output: Option<Box<dyn MidiOutput>>,
  input: Option<(Box<dyn MidiInput>, InputHandle)>,
  poll_interval: Duration,
}

impl MidiIoThread {
  fn new(
    config: &MidiConfig,
    app_name: &str,
    input_handle: Option<InputHandle>,
  ) -> MidiResult<MidiIoThread> {
    info!("Initialising MIDI ...");

    let drivers = MidiDrivers::new();
    debug!("Available MIDI drivers: {:?}", drivers.drivers());
    let driver = match &config.driver {
      Some(id) => drivers.driver(id.as_str(), app_name)?,
      None => drivers.default(app_name)?,
    };
    debug!("MIDI Driver: {:?}", driver.id());

    let output = match select("destination", driver.destinations(), &config.output)? {
      Some(destination) => {
        info!("Opening MIDI destination {:?} ...", destination.name());
        Some(destination.open()?)
      }
      None => None,
    };

    let input = match input_handle {
      Some(handle) => match select("source", driver.sources(), &config.input)? {
        Some(source) => {
          info!("Opening MIDI source {:?} ...", source.name());
          Some((source.open()?, handle))
        }
        None => {
          warn!("No MIDI source configured, nothing will feed the input queue");
          None
        }
      },
      None => None,
    };

    Ok(MidiIoThread {
      _driver: driver,
      output,
      input,
      poll_interval: config.poll_interval(),
    })
  }

  fn handle_messages(&mut self, protocol_rx: Receiver<Protocol>) {
    info!("Handling MIDI messages ...");

    loop {
      let received = if self.input.is_some() {
        protocol_rx.recv_timeout(self.poll_interval)
      } else {
        protocol_rx
          .recv()
          .map_err(|_| RecvTimeoutError::Disconnected)
      };

      match received {
        Ok(Protocol::Stop) => {
          info!("MIDI I/O thread stopped ...");
          break;
        }
        Ok(Protocol::Send(message)) => self.send(&message),
        Err(RecvTimeoutError::Timeout) => {}
        Err(RecvTimeoutError::Disconnected) => {
          warn!("MIDI I/O channel disconnected");
          break;
        }
      }

      self.poll_input();
    }
  }

  fn send(&mut self, message: &Message) {
    if let Some(output) = self.output.as_mut() {
      if let Err(err) = output.send(message) {
        error!("{}", err);
      }
    }
  }

  fn poll_input(&mut self) {
    if let Some((input, handle)) = self.input.as_mut() {
      if let Err(err) = input.poll(handle) {
        error!("{}", err);
      }
    }
  }
}

fn select<E>(
  kind: &'static str,
  endpoints: Vec<Box<E>>,
  port: &MidiPort,
) -> MidiResult<Option<Box<E>>>
where
  E: MidiEndpoint + ?Sized,
{
  debug!("Available {}s:", kind);
  for endpoint in endpoints.iter() {
    debug!("=> {:?}", endpoint.name());
  }

  match port {
    MidiPort::None => Ok(None),
    MidiPort::SystemDefault => endpoints
      .into_iter()
      .next()
      .map(Some)
      .ok_or_else(|| MidiError::EndpointNotFound {
        kind,
        name: "default".to_string(),
      }),
    MidiPort::ByName(name) => endpoints
      .into_iter()
      .find(|endpoint| endpoint.name() == name.as_str())
      .map(Some)
      .ok_or_else(|| MidiError::EndpointNotFound {
        kind,
        name: name.clone(),
      }),
  }
}

/// The MIDI I/O thread: sends what the sequencer produces and, when an input
/// handle is given, feeds the input queue from the configured source.
pub struct MidiIo {
  handler: JoinHandle<()>,
  protocol_tx: Sender<Protocol>,
}

impl MidiIo {
  pub fn new(
    config: &MidiConfig,
    app_name: &str,
    input_handle: Option<InputHandle>,
  ) -> Result<MidiIo, MidiIoError> {
    let (protocol_tx, protocol_rx) = crossbeam_channel::bounded(config.output_queue_capacity);
    let (init_tx, init_rx) = crossbeam_channel::bounded::<MidiResult<()>>(1);

    let config = config.clone();
    let app_name = app_name.to_string();

    let handler = thread::Builder::new()
      .name("midi-io".into())
      .spawn(move || match MidiIoThread::new(&config, &app_name, input_handle) {
        Ok(mut io_thread) => {
          drop(init_tx.send(Ok(())));
          io_thread.handle_messages(protocol_rx)
        }
        Err(err) => drop(init_tx.send(Err(err))),
      })
      .map_err(|err| MidiIoError::Start {
        cause: err.to_string(),
      })?;

    match init_rx.recv() {
      Ok(Ok(())) => Ok(MidiIo {
        handler,
        protocol_tx,
      }),
      Ok(Err(cause)) => {
        drop(handler.join());
        Err(MidiIoError::Init { cause })
      }
      Err(_) => Err(MidiIoError::Start {
        cause: "the thread exited while initialising".to_string(),
      }),
    }
  }

  /// A sink feeding this thread, to be given to the sequencer.
  pub fn sink(&self) -> ChannelSink<Protocol> {
    ChannelSink::new(self.protocol_tx.clone())
  }

  pub fn stop(self) -> Result<(), MidiIoError> {
    info!("Stopping MIDI I/O thread ...");
    drop(self.protocol_tx.send(Protocol::Stop));
    self.handler.join().map_err(|_| MidiIoError::Stop)
  }
}

#[cfg(test)]
mod test {

  use super::*;

  use tickseq_core::midi::input_queue;
  use tickseq_core::output::NoteSink;

  fn logger_config() -> MidiConfig {
    MidiConfig {
      driver: Some("logger".to_string()),
      ..MidiConfig::default()
    }
  }

  #[test]
  pub fn logger_io_round() {
    let midi_io = MidiIo::new(&logger_config(), "test", None).unwrap();
    let mut sink = midi_io.sink();
    assert!(sink.send_note_on(9, 36, 100).is_ok());
    assert!(sink.send_note_off(9, 36, 0).is_ok());
    assert!(midi_io.stop().is_ok());
  }

  #[test]
  pub fn unknown_destination_fails_init() {
    let config = MidiConfig {
      output: MidiPort::ByName("missing".to_string()),
      ..logger_config()
    };
    match MidiIo::new(&config, "test", None) {
      Err(MidiIoError::Init {
        cause: MidiError::EndpointNotFound { name, .. },
      }) => assert_eq!(name, "missing"),
      _ => panic!("expected EndpointNotFound"),
    }
  }

  #[test]
  pub fn no_source_is_not_an_error() {
    let (handle, _rx) = input_queue(4);
    let midi_io = MidiIo::new(&logger_config(), "test", Some(handle)).unwrap();
    assert!(midi_io.stop().is_ok());
  }

  #[test]
  pub fn default_source_must_exist() {
    let config = MidiConfig {
      input: MidiPort::SystemDefault,
      ..logger_config()
    };
    let (handle, _rx) = input_queue(4);
    assert!(MidiIo::new(&config, "test", Some(handle)).is_err());
  }

  #[test]
  pub fn sink_reports_disconnection() {
    let midi_io = MidiIo::new(&logger_config(), "test", None).unwrap();
    let mut sink = midi_io.sink();
    assert!(midi_io.stop().is_ok());
    assert!(sink.send(Message::TimingClock).is_err());
  }
}
