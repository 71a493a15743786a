use failure::Error;

use serde_derive::Deserialize;

use std::fs::File;
use std::io::Read;
use std::time::Duration;

use tickseq_core::config::ConfigError;

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub enum MidiPort {
  #[serde(rename = "none")]
  None,

  #[serde(rename = "default")]
  SystemDefault,

  #[serde(rename = "name")]
  ByName(String),
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Midi {
  pub driver: Option<String>,
  pub output: MidiPort,
  pub input: MidiPort,
  pub input_queue_capacity: usize,
  pub output_queue_capacity: usize,
  pub poll_interval_ms: u64,
}

impl Default for Midi {
  fn default() -> Midi {
    Midi {
      driver: None,
      output: MidiPort::SystemDefault,
      input: MidiPort::None,
      input_queue_capacity: 1024,
      output_queue_capacity: 4096,
      poll_interval_ms: 1,
    }
  }
}

impl Midi {
  pub fn poll_interval(&self) -> Duration {
    Duration::from_millis(self.poll_interval_ms)
  }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Run {
  /// Seconds to play before shutting down, zero plays until killed.
  pub duration_secs: u64,
  pub status_interval_secs: u64,
}

impl Default for Run {
  fn default() -> Run {
    Run {
      duration_secs: 0,
      status_interval_secs: 5,
    }
  }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
  pub midi: Midi,
  pub run: Run,
}

impl Default for AppConfig {
  fn default() -> AppConfig {
    AppConfig {
      midi: Midi::default(),
      run: Run::default(),
    }
  }
}

impl AppConfig {
  pub fn from_file<'a, T>(path: T) -> Result<AppConfig, Error>
  where
    T: Into<&'a str>,
  {
    let mut content = String::new();
    let mut file = File::open(path.into())?;
    file.read_to_string(&mut content)?;
    Self::from_str(content.as_str())
  }

  pub fn from_str<'a, T>(content: T) -> Result<AppConfig, Error>
  where
    T: Into<&'a str>,
  {
    let config: AppConfig = toml::from_str(content.into())?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.midi.input_queue_capacity == 0 {
      return Err(ConfigError::Invalid {
        field: "midi.input_queue_capacity",
        cause: "must be greater than zero".to_string(),
      });
    }
    if self.midi.output_queue_capacity == 0 {
      return Err(ConfigError::Invalid {
        field: "midi.output_queue_capacity",
        cause: "must be greater than zero".to_string(),
      });
    }
    if self.midi.poll_interval_ms == 0 {
      return Err(ConfigError::Invalid {
        field: "midi.poll_interval_ms",
        cause: "must be at least one millisecond".to_string(),
      });
    }
    Ok(())
  }
}

#[cfg(test)]
mod test {

  use super::*;

  #[test]
  pub fn defaults() {
    let config = AppConfig::from_str("").unwrap();
    assert_eq!(config, AppConfig::default());
    assert_eq!(config.midi.output, MidiPort::SystemDefault);
    assert_eq!(config.midi.input, MidiPort::None);
    assert_eq!(config.run.duration_secs, 0);
  }

  #[test]
  pub fn ports() {
    let config = AppConfig::from_str(
      r#"
      [clock]
      bpm = 100

      [midi]
      driver = "logger"
      output = { name = "IAC Driver Bus 1" }
      input = "default"

      [run]
      duration_secs = 30
      "#,
    )
    .unwrap();

    assert_eq!(config.midi.driver, Some("logger".to_string()));
    assert_eq!(
      config.midi.output,
      MidiPort::ByName("IAC Driver Bus 1".to_string())
    );
    assert_eq!(config.midi.input, MidiPort::SystemDefault);
    assert_eq!(config.run.duration_secs, 30);
  }

  #[test]
  pub fn rejects_zero_poll_interval() {
    assert!(AppConfig::from_str("[midi]\npoll_interval_ms = 0").is_err());
    assert!(AppConfig::from_str("[midi]\ninput_queue_capacity = 0").is_err());
  }
}
