pub mod note_sets;
pub mod pattern;

pub use self::note_sets::{parse_notes_descriptor, NoteSet, NotesError};
pub use self::pattern::{Pattern, PatternBank, PatternSequence};

use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::midi::types::{check_u7, Channel, ValidationError, U7};
use crate::sequencing::{Sequence, SequenceNote};
use crate::time::ticks;

pub const GENERATED_VELOCITY: U7 = 80;
pub const GENERATED_DURATION: u32 = 4;

/// Base parameters a pattern scales for each of its sequences.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternParams {
  pub channel: Channel,
  pub length_ticks: usize,
  pub quantize_ticks: u32,
  pub probability: f64,
}

pub struct SequenceGenerator {
  rng: StdRng,
}

impl SequenceGenerator {
  pub fn new() -> SequenceGenerator {
    SequenceGenerator {
      rng: StdRng::from_entropy(),
    }
  }

  pub fn with_seed(seed: u64) -> SequenceGenerator {
    SequenceGenerator {
      rng: StdRng::seed_from_u64(seed),
    }
  }

  pub fn set_seed(&mut self, seed: u64) {
    self.rng = StdRng::seed_from_u64(seed);
  }

  /// Creates a sequence of `length_beats` beats where every `quantize_ticks`
  /// slot holds `key` with the given probability.
  pub fn create_random(
    &mut self,
    channel: Channel,
    length_beats: u32,
    probability: f64,
    quantize_ticks: u32,
    key: u8,
  ) -> Result<Sequence, ValidationError> {
    if length_beats == 0 {
      return Err(ValidationError::EmptySequence);
    }
    if !(probability > 0.0 && probability <= 1.0) {
      return Err(ValidationError::Probability(probability));
    }
    if quantize_ticks == 0 {
      return Err(ValidationError::Quantization);
    }
    let note = SequenceNote::new(key, GENERATED_VELOCITY, GENERATED_DURATION)?;

    let mut sequence = Sequence::with_beats(channel, length_beats);
    for slot in (0..sequence.length()).step_by(quantize_ticks as usize) {
      if self.rng.gen::<f64>() < probability {
        sequence.add_note(slot, note)?;
      }
    }
    sequence.set_info("q", quantize_ticks);
    sequence.set_info("n", key);
    Ok(sequence)
  }

  /// Creates one sequence per entry of the pattern, assigning notes from a
  /// shuffled copy of `notes` in round robin.
  pub fn create_pattern(
    &mut self,
    pattern: &Pattern,
    params: &PatternParams,
    notes: &[U7],
  ) -> Result<Vec<Sequence>, ValidationError> {
    if notes.is_empty() {
      return Err(ValidationError::EmptyNoteSet);
    }
    for key in notes {
      check_u7(*key, ValidationError::Note)?;
    }

    let mut notes = notes.to_vec();
    notes.shuffle(&mut self.rng);

    let mut sequences = Vec::with_capacity(pattern.sequences.len());
    for (index, entry) in pattern.sequences.iter().enumerate() {
      let length_ticks = ((params.length_ticks as f64 * entry.length_factor) as usize).max(1);
      let length_beats = length_in_beats(length_ticks);
      let probability = (params.probability * entry.probability_factor)
        .max(0.0)
        .min(1.0);
      let quantize_ticks = ((params.quantize_ticks as f64 * entry.quantize_factor) as u32).max(1);
      let key = notes[index % notes.len()];

      debug!(
        "Pattern {} sequence {}: {} beats, p={}, q={}, note {}",
        pattern.id, index, length_beats, probability, quantize_ticks, key
      );
      let mut sequence =
        self.create_random(params.channel, length_beats, probability, quantize_ticks, key)?;
      sequence.set_info("p", &pattern.id);
      sequences.push(sequence);
    }
    Ok(sequences)
  }
}

impl Default for SequenceGenerator {
  fn default() -> SequenceGenerator {
    SequenceGenerator::new()
  }
}

/// Length in whole beats of a sequence of `length_ticks`, at least one.
pub fn length_in_beats(length_ticks: usize) -> u32 {
  ticks::ticks_to_beats(length_ticks).max(1)
}
