use failure;
use failure::{Error, Fail};

use serde_derive::Deserialize;

use std::fs::File;
use std::io::Read;

use crate::generator::{parse_notes_descriptor, NotesError};
use crate::time::tempo::{DEFAULT_BPM, MAX_BPM, MIN_BPM};
use crate::time::ticks::TICKS_PER_BEAT;

pub const MAX_LENGTH_TICKS: usize = 100_000;

#[derive(Debug, Fail, PartialEq)]
pub enum ConfigError {
  #[fail(display = "Invalid value for {}: {}", field, cause)]
  Invalid { field: &'static str, cause: String },

  #[fail(display = "Invalid drummer.note_set: {}", _0)]
  Notes(#[fail(cause)] NotesError),
}

fn invalid<T: ToString>(field: &'static str, cause: T) -> ConfigError {
  ConfigError::Invalid {
    field,
    cause: cause.to_string(),
  }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum ClockSource {
  #[serde(rename = "internal")]
  Internal,
  #[serde(rename = "external")]
  External,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Clock {
  pub source: ClockSource,
  pub bpm: u16,
}

impl Default for Clock {
  fn default() -> Clock {
    Clock {
      source: ClockSource::Internal,
      bpm: DEFAULT_BPM,
    }
  }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Drummer {
  pub channel: u8,
  pub length_beats: u32,
  pub quantize_ticks: u32,
  pub probability: f64,
  pub note: u8,
  pub random_sequences: usize,
  pub pattern: Option<String>,
  pub pattern_notes: Vec<u8>,
  pub note_set: Option<String>,
  pub seed: Option<u64>,
}

impl Default for Drummer {
  fn default() -> Drummer {
    Drummer {
      channel: 9,
      length_beats: 16,
      quantize_ticks: 12,
      probability: 0.4,
      note: 60,
      random_sequences: 0,
      pattern: None,
      pattern_notes: Vec::new(),
      note_set: None,
      seed: None,
    }
  }
}

impl Drummer {
  pub fn length_ticks(&self) -> usize {
    self.length_beats as usize * TICKS_PER_BEAT as usize
  }

  /// Notes to build patterns with: the explicit list when given, otherwise
  /// the note set descriptor, a comma separated mix of set names and notes.
  pub fn resolve_pattern_notes(&self) -> Result<Vec<u8>, ConfigError> {
    if !self.pattern_notes.is_empty() {
      return Ok(self.pattern_notes.clone());
    }
    match &self.note_set {
      Some(descriptor) => parse_notes_descriptor(descriptor).map_err(ConfigError::Notes),
      None => Ok(Vec::new()),
    }
  }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
  pub clock: Clock,
  pub drummer: Drummer,
}

impl Default for Config {
  fn default() -> Config {
    Config {
      clock: Clock::default(),
      drummer: Drummer::default(),
    }
  }
}

impl Config {
  pub fn from_file<'a, T>(path: T) -> Result<Config, Error>
  where
    T: Into<&'a str>,
  {
    let mut content = String::new();
    let path_str = path.into();
    let mut file = File::open(path_str)?;
    file.read_to_string(&mut content)?;
    Self::from_str(content.as_str())
  }

  pub fn from_str<'a, T>(content: T) -> Result<Config, Error>
  where
    T: Into<&'a str>,
  {
    let config: Config = toml::from_str(content.into())?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    let bpm = self.clock.bpm;
    if bpm < MIN_BPM || bpm > MAX_BPM {
      return Err(invalid("clock.bpm", format!("{} not in [{}, {}]", bpm, MIN_BPM, MAX_BPM)));
    }

    let drummer = &self.drummer;
    if drummer.channel > 15 {
      return Err(invalid("drummer.channel", format!("{} not in [0, 15]", drummer.channel)));
    }
    if drummer.note > 127 {
      return Err(invalid("drummer.note", format!("{} not in [0, 127]", drummer.note)));
    }
    if drummer.quantize_ticks < 1 || drummer.quantize_ticks > TICKS_PER_BEAT {
      return Err(invalid(
        "drummer.quantize_ticks",
        format!("{} not in [1, {}]", drummer.quantize_ticks, TICKS_PER_BEAT),
      ));
    }
    if !(drummer.probability > 0.0 && drummer.probability <= 1.0) {
      return Err(invalid(
        "drummer.probability",
        format!("{} not in (0, 1]", drummer.probability),
      ));
    }
    let length_ticks = drummer.length_ticks();
    if length_ticks == 0 || length_ticks > MAX_LENGTH_TICKS {
      return Err(invalid(
        "drummer.length_beats",
        format!("{} ticks not in (0, {}]", length_ticks, MAX_LENGTH_TICKS),
      ));
    }
    if let Some(note) = drummer.pattern_notes.iter().find(|note| **note > 127) {
      return Err(invalid("drummer.pattern_notes", format!("{} not in [0, 127]", note)));
    }
    drummer.resolve_pattern_notes().map(|_| ())
  }
}

#[cfg(test)]
mod test {

  use super::*;

  #[test]
  pub fn defaults_from_empty_file() {
    let config = Config::from_str("").unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.clock.source, ClockSource::Internal);
    assert_eq!(config.clock.bpm, 120);
    assert_eq!(config.drummer.length_ticks(), 384);
  }

  #[test]
  pub fn parse_sections() {
    let config = Config::from_str(
      r#"
      [clock]
      source = "external"
      bpm = 90

      [drummer]
      channel = 9
      probability = 0.25
      random_sequences = 2
      pattern = "1"
      note_set = "percussion"
      seed = 42
      "#,
    )
    .unwrap();

    assert_eq!(config.clock.source, ClockSource::External);
    assert_eq!(config.clock.bpm, 90);
    assert_eq!(config.drummer.probability, 0.25);
    assert_eq!(config.drummer.random_sequences, 2);
    assert_eq!(config.drummer.pattern, Some("1".to_string()));
    assert_eq!(config.drummer.seed, Some(42));
    assert_eq!(config.drummer.resolve_pattern_notes().unwrap().len(), 47);
    assert_eq!(config.drummer.quantize_ticks, 12);
  }

  #[test]
  pub fn explicit_notes_win_over_note_set() {
    let config = Config::from_str(
      r#"
      [drummer]
      pattern_notes = [36, 38]
      note_set = "percussion"
      "#,
    )
    .unwrap();
    assert_eq!(config.drummer.resolve_pattern_notes(), Ok(vec![36, 38]));
  }

  #[test]
  pub fn note_set_descriptor() {
    let config = Config::from_str(
      r#"
      [drummer]
      note_set = "Circuit, 36"
      "#,
    )
    .unwrap();
    assert_eq!(
      config.drummer.resolve_pattern_notes(),
      Ok(vec![36, 60, 62, 64, 65])
    );
  }

  #[test]
  pub fn bpm_range_is_inclusive() {
    let mut config = Config::default();
    config.clock.bpm = 1;
    assert!(config.validate().is_ok());
    config.clock.bpm = 360;
    assert!(config.validate().is_ok());
    config.clock.bpm = 0;
    assert!(config.validate().is_err());
    config.clock.bpm = 361;
    assert!(config.validate().is_err());
  }

  #[test]
  pub fn rejects_out_of_range_values() {
    let cases = vec![
      "[drummer]\nchannel = 16",
      "[drummer]\nnote = 128",
      "[drummer]\nquantize_ticks = 0",
      "[drummer]\nquantize_ticks = 25",
      "[drummer]\nprobability = 0.0",
      "[drummer]\nprobability = 1.5",
      "[drummer]\nlength_beats = 0",
      "[drummer]\nlength_beats = 5000",
      "[drummer]\npattern_notes = [36, 200]",
      "[drummer]\nnote_set = \"strings\"",
    ];
    for case in cases {
      assert!(Config::from_str(case).is_err(), "{}", case);
    }
  }
}
