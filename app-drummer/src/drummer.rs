use std::io::Write;
use std::sync::Arc;

use failure::{Error, Fail};
use log::info;

use tickseq_core::clock::InternalClock;
use tickseq_core::config::Drummer as DrummerConfig;
use tickseq_core::generator::{
  length_in_beats, parse_notes_descriptor, PatternBank, PatternParams, SequenceGenerator,
};
use tickseq_core::midi::U7;
use tickseq_core::sequencing::{Sequence, Sequencer};
use tickseq_core::time::TICKS_PER_BEAT;
use tickseq_core::Channel;

use crate::console::{parse_indexes, Command, HELP};

#[derive(Debug, Fail)]
pub enum DrummerError {
  #[fail(display = "Unknown pattern: {}", id)]
  UnknownPattern { id: String },

  #[fail(display = "No pattern notes to create a pattern with")]
  NoPatternNotes,
}

/// Creates sequences from the current generation settings and applies
/// console commands to the sequencer.
pub struct Drummer<'a> {
  sequencer: &'a Sequencer,
  tempo: Option<Arc<InternalClock>>,
  generator: SequenceGenerator,
  bank: PatternBank,
  channel: Channel,
  length_ticks: usize,
  quantize_ticks: u32,
  probability: f64,
  note: U7,
  pattern_notes: Vec<U7>,
}

impl<'a> Drummer<'a> {
  /// `tempo` is the internal clock when there is one, tempo commands are
  /// refused otherwise.
  pub fn new(
    sequencer: &'a Sequencer,
    config: &DrummerConfig,
    tempo: Option<Arc<InternalClock>>,
  ) -> Result<Drummer<'a>, Error> {
    let generator = match config.seed {
      Some(seed) => SequenceGenerator::with_seed(seed),
      None => SequenceGenerator::new(),
    };
    Ok(Drummer {
      sequencer,
      tempo,
      generator,
      bank: PatternBank::default(),
      channel: Channel::new(config.channel)?,
      length_ticks: config.length_ticks(),
      quantize_ticks: config.quantize_ticks,
      probability: config.probability,
      note: config.note,
      pattern_notes: config.resolve_pattern_notes()?,
    })
  }

  /// Adds the random sequences and the pattern named in the configuration.
  pub fn load(&mut self, config: &DrummerConfig) -> Result<(), Error> {
    for _ in 0..config.random_sequences {
      self.add_random()?;
    }
    if let Some(id) = &config.pattern {
      self.add_pattern(id)?;
    }
    Ok(())
  }

  pub fn add_random(&mut self) -> Result<usize, Error> {
    let sequence = self.generator.create_random(
      self.channel,
      length_in_beats(self.length_ticks),
      self.probability,
      self.quantize_ticks,
      self.note,
    )?;
    self.add(sequence)
  }

  pub fn add_pattern(&mut self, id: &str) -> Result<Vec<usize>, Error> {
    let pattern = self
      .bank
      .get(id)
      .ok_or_else(|| DrummerError::UnknownPattern { id: id.to_string() })?;
    if self.pattern_notes.is_empty() {
      return Err(DrummerError::NoPatternNotes.into());
    }
    let params = PatternParams {
      channel: self.channel,
      length_ticks: self.length_ticks,
      quantize_ticks: self.quantize_ticks,
      probability: self.probability,
    };
    let sequences = self
      .generator
      .create_pattern(pattern, &params, &self.pattern_notes)?;

    let mut indexes = Vec::with_capacity(sequences.len());
    for sequence in sequences {
      indexes.push(self.add(sequence)?);
    }
    Ok(indexes)
  }

  fn add(&mut self, sequence: Sequence) -> Result<usize, Error> {
    let description = describe(&sequence);
    let index = self.sequencer.add_sequence(sequence)?;
    info!("[{}] {}", index, description);
    Ok(index)
  }

  /// Applies a console command, writing feedback to `out`. Returns true when
  /// the command asks to exit.
  pub fn handle<W: Write>(&mut self, command: Command, out: &mut W) -> Result<bool, Error> {
    match command {
      Command::StartStop => {
        if self.sequencer.is_running() {
          self.sequencer.stop();
          writeln!(out, "->stop")?;
        } else {
          self.sequencer.start();
          writeln!(out, "->start")?;
        }
      }
      Command::PauseContinue => {
        if self.sequencer.is_running() {
          self.sequencer.stop();
          writeln!(out, "->pause")?;
        } else {
          self.sequencer.resume();
          writeln!(out, "->continue")?;
        }
      }
      Command::Tempo(delta) => match &self.tempo {
        Some(clock) => {
          let bpm = i32::from(clock.tempo().get_value()) + i32::from(delta);
          clock.set_bpm(bpm.max(1) as u16);
          writeln!(out, "bpm = {}", clock.tempo().get_value())?;
        }
        None => writeln!(out, "Can't change tempo, following an external clock")?,
      },
      Command::AddSequence => {
        let index = self.add_random()?;
        writeln!(out, "{}", self.describe_at(index))?;
      }
      Command::AddPattern(id) => {
        for index in self.add_pattern(&id)? {
          writeln!(out, "{}", self.describe_at(index))?;
        }
      }
      Command::PrintSequences => {
        writeln!(out, " --- sequences ---")?;
        let lines = self.sequencer.with_sequences(|list| {
          list
            .iter()
            .enumerate()
            .map(|(index, sequence)| row(index, sequence))
            .collect::<Vec<String>>()
        });
        for line in lines {
          writeln!(out, "{}", line)?;
        }
      }
      Command::PrintState => {
        writeln!(out, " --- state ---")?;
        writeln!(out, "c[han]        = {}", self.channel.index() + 1)?;
        writeln!(
          out,
          "l[en]         = {} = {} beats",
          self.length_ticks,
          self.length_ticks / TICKS_PER_BEAT as usize
        )?;
        writeln!(out, "q[uant]       = {}", self.quantize_ticks)?;
        writeln!(out, "n[ote]        = {}", self.note)?;
        writeln!(out, "p[robability] = 1 / {}", 1.0 / self.probability)?;
        if let Some(clock) = &self.tempo {
          writeln!(out, "bpm           = {}", clock.tempo().get_value())?;
        }
        writeln!(
          out,
          "running = {}, ticks = {}, live notes = {}",
          self.sequencer.is_running(),
          self.sequencer.tick_count(),
          self.sequencer.live_note_count()
        )?;
      }
      Command::PrintPatternNotes => writeln!(out, "patternNotes = {:?}", self.pattern_notes)?,
      Command::Help => writeln!(out, "{}", HELP)?,
      Command::Exit => return Ok(true),
      Command::Channel(channel) => self.channel = Channel::new(channel)?,
      Command::LengthTicks(ticks) => {
        self.length_ticks = ticks;
        writeln!(out, "len = {} = {} beats", ticks, ticks / TICKS_PER_BEAT as usize)?;
      }
      Command::LengthBeats(beats) => {
        self.length_ticks = beats as usize * TICKS_PER_BEAT as usize;
        writeln!(out, "len = {} = {} beats", self.length_ticks, beats)?;
      }
      Command::Quantize(ticks) => self.quantize_ticks = ticks,
      Command::Note(note) => self.note = note,
      Command::Probability(one_in) => self.probability = 1.0 / f64::from(one_in),
      Command::PatternNotes(descriptor) => {
        self.pattern_notes = parse_notes_descriptor(&descriptor)?;
        writeln!(out, "patternNotes = {:?}", self.pattern_notes)?;
      }
      Command::Remove(descriptor) => {
        let count = self.sequencer.sequence_count();
        for index in parse_indexes(&descriptor, count).into_iter().rev() {
          self.sequencer.remove_sequence(index)?;
        }
      }
      Command::Mute(descriptor) => self.set_enabled(&descriptor, false)?,
      Command::Unmute(descriptor) => self.set_enabled(&descriptor, true)?,
      Command::Solo(descriptor) => {
        self.sequencer.with_sequences(|list| {
          let soloed = parse_indexes(&descriptor, list.len());
          for index in 0..list.len() {
            if let Some(sequence) = list.get_mut(index) {
              sequence.set_enabled(soloed.contains(&index));
            }
          }
        });
      }
    }
    Ok(false)
  }

  fn set_enabled(&self, descriptor: &str, enabled: bool) -> Result<(), Error> {
    let count = self.sequencer.sequence_count();
    for index in parse_indexes(descriptor, count) {
      self.sequencer.set_enabled(index, enabled)?;
    }
    Ok(())
  }

  fn describe_at(&self, index: usize) -> String {
    self.sequencer.with_sequences(|list| {
      list
        .get(index)
        .map(|sequence| row(index, sequence))
        .unwrap_or_default()
    })
  }
}

pub fn describe(sequence: &Sequence) -> String {
  let info = sequence
    .info_entries()
    .map(|(key, value)| format!("{}={}", key, value))
    .collect::<Vec<String>>()
    .join(" ");
  format!(
    "ch={} len={} notes={} {}",
    sequence.channel(),
    sequence.length(),
    sequence.note_count(),
    info
  )
}

fn row(index: usize, sequence: &Sequence) -> String {
  let enabled = if sequence.is_enabled() { "e" } else { "-" };
  format!("{:3} {} {}", index, enabled, describe(sequence))
}

#[cfg(test)]
mod test {

  use super::*;

  use tickseq_core::clock::Clock;
  use tickseq_core::midi::Message;
  use tickseq_core::output::ChannelSink;
  use tickseq_core::time::Tempo;

  fn config() -> DrummerConfig {
    DrummerConfig {
      probability: 1.0,
      length_beats: 1,
      quantize_ticks: 12,
      note: 36,
      seed: Some(5),
      pattern_notes: vec![36, 38],
      ..DrummerConfig::default()
    }
  }

  fn sequencer() -> (Sequencer, Arc<InternalClock>) {
    let clock = Arc::new(InternalClock::new(Tempo::new(120)).unwrap());
    let (tx, _rx) = crossbeam_channel::unbounded::<Message>();
    let sequencer = Sequencer::new(clock.clone(), Box::new(ChannelSink::new(tx)));
    (sequencer, clock)
  }

  fn run(drummer: &mut Drummer, line: &str) -> bool {
    let mut out = Vec::new();
    drummer
      .handle(Command::parse(line).unwrap(), &mut out)
      .unwrap()
  }

  #[test]
  pub fn loads_configured_sequences() {
    let (sequencer, clock) = sequencer();
    let config = DrummerConfig {
      random_sequences: 2,
      pattern: Some("2".to_string()),
      ..config()
    };
    let mut drummer = Drummer::new(&sequencer, &config, None).unwrap();
    drummer.load(&config).unwrap();

    let pattern_len = PatternBank::default().get("2").unwrap().sequences.len();
    assert_eq!(sequencer.sequence_count(), 2 + pattern_len);
    clock.dispose();
  }

  #[test]
  pub fn add_mute_solo_and_remove() {
    let (sequencer, clock) = sequencer();
    let mut drummer = Drummer::new(&sequencer, &config(), None).unwrap();

    for _ in 0..4 {
      assert!(!run(&mut drummer, "a"));
    }
    assert_eq!(sequencer.sequence_count(), 4);
    let enabled = |sequencer: &Sequencer| {
      sequencer.with_sequences(|list| list.iter().map(Sequence::is_enabled).collect::<Vec<_>>())
    };

    run(&mut drummer, "m 0, 2-3");
    assert_eq!(enabled(&sequencer), vec![false, true, false, false]);

    run(&mut drummer, "u 3");
    assert_eq!(enabled(&sequencer), vec![false, true, false, true]);

    run(&mut drummer, "o 0");
    assert_eq!(enabled(&sequencer), vec![true, false, false, false]);

    run(&mut drummer, "d 1-2");
    assert_eq!(enabled(&sequencer), vec![true, false]);

    assert!(run(&mut drummer, "x"));
    clock.dispose();
  }

  #[test]
  pub fn settings_shape_new_sequences() {
    let (sequencer, clock) = sequencer();
    let mut drummer = Drummer::new(&sequencer, &config(), None).unwrap();

    run(&mut drummer, "c 3");
    run(&mut drummer, "lb 2");
    run(&mut drummer, "q 6");
    run(&mut drummer, "n 42");
    run(&mut drummer, "p 1");
    run(&mut drummer, "a");

    sequencer.with_sequences(|list| {
      let sequence = list.get(0).unwrap();
      assert_eq!(sequence.channel().index(), 2);
      assert_eq!(sequence.length(), 48);
      assert_eq!(sequence.note_count(), 8);
      assert_eq!(sequence.info("n"), Some("42"));
    });
    clock.dispose();
  }

  #[test]
  pub fn pattern_needs_notes() {
    let (sequencer, clock) = sequencer();
    let config = DrummerConfig {
      pattern_notes: Vec::new(),
      ..config()
    };
    let mut drummer = Drummer::new(&sequencer, &config, None).unwrap();
    let mut out = Vec::new();
    assert!(drummer
      .handle(Command::AddPattern("1".to_string()), &mut out)
      .is_err());

    run(&mut drummer, "ns circuit");
    run(&mut drummer, "1");
    assert!(sequencer.sequence_count() > 0);
    clock.dispose();
  }

  #[test]
  pub fn tempo_only_with_internal_clock() {
    let (sequencer, clock) = sequencer();
    let mut drummer = Drummer::new(&sequencer, &config(), Some(clock.clone())).unwrap();
    run(&mut drummer, "+");
    run(&mut drummer, "+");
    run(&mut drummer, "-");
    assert_eq!(clock.tempo().get_value(), 121);

    let mut external = Drummer::new(&sequencer, &config(), None).unwrap();
    let mut out = Vec::new();
    external.handle(Command::Tempo(1), &mut out).unwrap();
    assert!(String::from_utf8(out).unwrap().contains("external"));
    assert_eq!(clock.tempo().get_value(), 121);
    clock.dispose();
  }

  #[test]
  pub fn start_stop_and_pause() {
    let (sequencer, clock) = sequencer();
    let mut drummer = Drummer::new(&sequencer, &config(), None).unwrap();
    run(&mut drummer, "s");
    assert!(sequencer.is_running());
    run(&mut drummer, "S");
    assert!(!sequencer.is_running());
    run(&mut drummer, "S");
    assert!(sequencer.is_running());
    run(&mut drummer, "s");
    assert!(!sequencer.is_running());
    clock.dispose();
  }
}
