use std::collections::BTreeSet;

use failure::Fail;

use tickseq_core::config::MAX_LENGTH_TICKS;
use tickseq_core::time::TICKS_PER_BEAT;

pub const HELP: &str = "\
 s       start/stop (start rewinds every sequence)
 S       pause/continue
 + -     tempo up/down by one BPM
 a       add a random sequence
 1 2     add the sequences of a pattern
 r       print sequences
 t       print state
 j       print pattern notes
 h       help
 x       exit
 c N     channel (1-16)
 lc N    length in ticks
 lb N    length in beats
 q N     quantization in ticks (1-24)
 n N     note (0-127)
 p N     probability 1/N (1-1000)
 ns D    pattern notes, e.g. volcabeats,60,62
 d I     delete sequences, e.g. 0,2-4
 m I     mute sequences
 u I     unmute sequences
 o I     solo sequences";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
  StartStop,
  PauseContinue,
  Tempo(i16),
  AddSequence,
  AddPattern(String),
  PrintSequences,
  PrintState,
  PrintPatternNotes,
  Help,
  Exit,
  Channel(u8),
  LengthTicks(usize),
  LengthBeats(u32),
  Quantize(u32),
  Note(u8),
  Probability(u32),
  PatternNotes(String),
  Remove(String),
  Mute(String),
  Unmute(String),
  Solo(String),
}

#[derive(Debug, Fail, PartialEq)]
pub enum CommandError {
  #[fail(display = "Unrecognised command: {}", line)]
  Unknown { line: String },

  #[fail(display = "Invalid {}: {}, the range is {}", what, value, range)]
  OutOfRange {
    what: &'static str,
    value: String,
    range: &'static str,
  },
}

fn number<T>(
  what: &'static str,
  value: &str,
  range: &'static str,
  valid: fn(&T) -> bool,
) -> Result<T, CommandError>
where
  T: std::str::FromStr,
{
  value
    .parse::<T>()
    .ok()
    .filter(valid)
    .ok_or_else(|| CommandError::OutOfRange {
      what,
      value: value.to_string(),
      range,
    })
}

impl Command {
  pub fn parse(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    let mut parts = line.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or("");
    let argument = parts.next().map(str::trim).unwrap_or("");

    if argument.is_empty() {
      return match name {
        "s" => Ok(Command::StartStop),
        "S" => Ok(Command::PauseContinue),
        "+" | "=" => Ok(Command::Tempo(1)),
        "-" | "_" => Ok(Command::Tempo(-1)),
        "a" => Ok(Command::AddSequence),
        "r" => Ok(Command::PrintSequences),
        "t" => Ok(Command::PrintState),
        "j" => Ok(Command::PrintPatternNotes),
        "h" | "?" => Ok(Command::Help),
        "x" | "q" | "quit" | "exit" => Ok(Command::Exit),
        id if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) => {
          Ok(Command::AddPattern(id.to_string()))
        }
        _ => Err(CommandError::Unknown {
          line: line.to_string(),
        }),
      };
    }

    match name {
      "c" => number::<u8>("channel", argument, "1-16", |c: &u8| *c >= 1 && *c <= 16)
        .map(|channel| Command::Channel(channel - 1)),
      "lc" => number::<usize>("length", argument, "1-100000 ticks", |l: &usize| {
        *l >= 1 && *l <= MAX_LENGTH_TICKS
      })
      .map(Command::LengthTicks),
      "lb" => number::<u32>("length", argument, "1-4166 beats", |l: &u32| {
        *l >= 1 && *l <= (MAX_LENGTH_TICKS / TICKS_PER_BEAT as usize) as u32
      })
      .map(Command::LengthBeats),
      "q" => number::<u32>("quantization", argument, "1-24", |q: &u32| {
        *q >= 1 && *q <= TICKS_PER_BEAT
      })
      .map(Command::Quantize),
      "n" => number::<u8>("note", argument, "0-127", |n: &u8| *n <= 127).map(Command::Note),
      "p" => number::<u32>("probability", argument, "1-1000", |p: &u32| {
        *p >= 1 && *p <= 1000
      })
      .map(Command::Probability),
      "ns" => Ok(Command::PatternNotes(argument.to_string())),
      "d" => Ok(Command::Remove(argument.to_string())),
      "m" => Ok(Command::Mute(argument.to_string())),
      "u" => Ok(Command::Unmute(argument.to_string())),
      "o" => Ok(Command::Solo(argument.to_string())),
      _ => Err(CommandError::Unknown {
        line: line.to_string(),
      }),
    }
  }
}

/// Parses sequence indexes such as `"0, 2-4"`. Malformed fields and indexes
/// outside `[0, count)` are left out.
pub fn parse_indexes(descriptor: &str, count: usize) -> Vec<usize> {
  let mut indexes = BTreeSet::new();
  for field in descriptor.split(',').map(str::trim) {
    if let Ok(index) = field.parse::<usize>() {
      indexes.insert(index);
      continue;
    }
    let bounds: Vec<&str> = field.split('-').map(str::trim).collect();
    if bounds.len() != 2 {
      continue;
    }
    if let (Ok(first), Ok(last)) = (bounds[0].parse::<usize>(), bounds[1].parse::<usize>()) {
      indexes.extend(first..=last.min(count));
    }
  }
  indexes.into_iter().filter(|index| *index < count).collect()
}

#[cfg(test)]
mod test {

  use super::*;

  #[test]
  pub fn single_key_commands() {
    assert_eq!(Command::parse("s"), Ok(Command::StartStop));
    assert_eq!(Command::parse("S"), Ok(Command::PauseContinue));
    assert_eq!(Command::parse(" + "), Ok(Command::Tempo(1)));
    assert_eq!(Command::parse("_"), Ok(Command::Tempo(-1)));
    assert_eq!(Command::parse("2"), Ok(Command::AddPattern("2".to_string())));
    assert_eq!(Command::parse("x"), Ok(Command::Exit));
    assert!(Command::parse("").is_err());
    assert!(Command::parse("z").is_err());
  }

  #[test]
  pub fn value_commands() {
    assert_eq!(Command::parse("c 10"), Ok(Command::Channel(9)));
    assert_eq!(Command::parse("lb 4"), Ok(Command::LengthBeats(4)));
    assert_eq!(Command::parse("lc 96"), Ok(Command::LengthTicks(96)));
    assert_eq!(Command::parse("q 6"), Ok(Command::Quantize(6)));
    assert_eq!(Command::parse("n 36"), Ok(Command::Note(36)));
    assert_eq!(Command::parse("p 4"), Ok(Command::Probability(4)));
    assert_eq!(
      Command::parse("ns volcabeats, 60"),
      Ok(Command::PatternNotes("volcabeats, 60".to_string()))
    );
    assert_eq!(Command::parse("o 1-2"), Ok(Command::Solo("1-2".to_string())));
  }

  #[test]
  pub fn value_ranges() {
    let lines = [
      "c 0", "c 17", "q 0", "q 25", "n 128", "p 0", "lc 0", "lc 100001", "lb 5000", "c x",
    ];
    for line in lines.iter() {
      match Command::parse(line) {
        Err(CommandError::OutOfRange { .. }) => {}
        other => panic!("{}: {:?}", line, other),
      }
    }
  }

  #[test]
  pub fn index_descriptors() {
    assert_eq!(parse_indexes("0, 2-4", 10), vec![0, 2, 3, 4]);
    assert_eq!(parse_indexes("3-1, 7, x, 1-2-3", 10), vec![7]);
    assert_eq!(parse_indexes("1-20, 30", 4), vec![1, 2, 3]);
    assert!(parse_indexes("", 4).is_empty());
  }
}
