mod logger;
pub use self::logger::ID as LOGGER_ID;

#[cfg(feature = "portmidi")]
mod portmidi;

#[cfg(feature = "portmidi")]
pub use self::portmidi::ID as PORT_MIDI_ID;

#[cfg(feature = "portmidi")]
const DEFAULT_ID: &str = PORT_MIDI_ID;

#[cfg(not(feature = "portmidi"))]
const DEFAULT_ID: &str = LOGGER_ID;

use std::collections::HashMap;

use failure::Fail;

use tickseq_core::midi::{InputHandle, Message};

#[derive(Debug, Fail)]
pub enum MidiError {
  #[fail(display = "Failed to initialise the MIDI driver: {}", cause)]
  Init { cause: String },

  #[fail(display = "Driver not found: {}", id)]
  DriverNotFound { id: String },

  #[fail(display = "No {} endpoint named {:?}", kind, name)]
  EndpointNotFound { kind: &'static str, name: String },

  #[fail(display = "Failed to open a destination: {}", cause)]
  DestinationOpen { cause: String },

  #[fail(display = "Failed to open a source: {}", cause)]
  SourceOpen { cause: String },

  #[fail(display = "Failed to send a message: {}", cause)]
  Send { cause: String },

  #[fail(display = "Failed to read from a source: {}", cause)]
  Receive { cause: String },
}

pub type MidiResult<T> = Result<T, MidiError>;

type MidiDriverFactory = Box<dyn Fn(String) -> MidiResult<Box<dyn MidiDriver>>>;

pub struct MidiDrivers {
  drivers: HashMap<String, MidiDriverFactory>,
}

impl MidiDrivers {
  pub fn new() -> MidiDrivers {
    let mut drivers: HashMap<String, MidiDriverFactory> = HashMap::new();

    Self::add_device_drivers(&mut drivers);

    Self::add_common_drivers(&mut drivers);

    MidiDrivers { drivers }
  }

  #[cfg(feature = "portmidi")]
  fn add_device_drivers(drivers: &mut HashMap<String, MidiDriverFactory>) {
    let portmidi_factory = Box::new(|_app_name: String| {
      portmidi::PortMidiDriver::new().map(|driver| Box::new(driver) as Box<dyn MidiDriver>)
    });
    drivers.insert(portmidi::ID.to_string(), portmidi_factory);
  }

  #[cfg(not(feature = "portmidi"))]
  fn add_device_drivers(_drivers: &mut HashMap<String, MidiDriverFactory>) {}

  fn add_common_drivers(drivers: &mut HashMap<String, MidiDriverFactory>) {
    let logger_factory = Box::new(|app_name: String| {
      Ok(Box::new(logger::LoggerDriver::new(app_name)) as Box<dyn MidiDriver>)
    });
    drivers.insert(logger::ID.to_string(), logger_factory);
  }

  pub fn drivers(&self) -> Vec<&String> {
    let mut ids: Vec<&String> = self.drivers.keys().collect();
    ids.sort();
    ids
  }

  pub fn driver<A, B>(&self, id: A, app_name: B) -> MidiResult<Box<dyn MidiDriver>>
  where
    A: Into<String>,
    B: Into<String>,
  {
    let id = id.into();
    self
      .drivers
      .get(&id)
      .map(|driver_factory| driver_factory(app_name.into()))
      .unwrap_or_else(|| Err(MidiError::DriverNotFound { id }))
  }

  pub fn default<T>(&self, app_name: T) -> MidiResult<Box<dyn MidiDriver>>
  where
    T: Into<String>,
  {
    self.driver(DEFAULT_ID, app_name.into())
  }
}

pub trait MidiDriver {
  fn id(&self) -> &str;

  fn sources(&self) -> Vec<Box<dyn MidiSource>>;

  fn destinations(&self) -> Vec<Box<dyn MidiDestination>>;
}

pub trait MidiEndpoint {
  fn name(&self) -> &str;
}

pub trait MidiDestination: MidiEndpoint {
  fn open(&self) -> MidiResult<Box<dyn MidiOutput>>;
}

pub trait MidiSource: MidiEndpoint {
  fn open(&self) -> MidiResult<Box<dyn MidiInput>>;
}

pub trait MidiOutput: MidiEndpoint {
  fn send(&mut self, message: &Message) -> MidiResult<()>;
}

pub trait MidiInput: MidiEndpoint {
  /// Moves whatever the device has buffered into the input queue and
  /// returns how many messages were read.
  fn poll(&mut self, input: &InputHandle) -> MidiResult<usize>;
}
