use std::sync::{Arc, Mutex, MutexGuard};

use failure::Fail;
use log::{debug, info, trace, warn};

use crate::clock::{Clock, ListenerId};
use crate::output::{NoteSink, SinkError};
use crate::sequencing::live_notes::{LiveNote, LiveNotes};
use crate::sequencing::sequence::Sequence;

#[derive(Debug, Fail, Clone, PartialEq)]
pub enum SequencerError {
  #[fail(display = "Sequences must have at least one slot")]
  EmptySequence,

  #[fail(display = "Sequence index {} out of range, there are {}", index, len)]
  IndexOutOfRange { index: usize, len: usize },

  #[fail(display = "Failed to send an event: {}", _0)]
  Sink(#[fail(cause)] SinkError),
}

impl From<SinkError> for SequencerError {
  fn from(err: SinkError) -> Self {
    SequencerError::Sink(err)
  }
}

struct State {
  running: bool,
  tick_count: u64,
  sequences: Vec<Sequence>,
  live_notes: LiveNotes,
  expired: Vec<LiveNote>,
  sink: Box<dyn NoteSink>,
}

impl State {
  fn tick(&mut self) -> Result<(), SequencerError> {
    if !self.running {
      return Ok(());
    }

    let mut first_error: Option<SinkError> = None;
    let mut record = |result: Result<(), SinkError>| {
      if let Err(err) = result {
        if first_error.is_none() {
          first_error = Some(err);
        } else {
          warn!("Dropped event: {}", err);
        }
      }
    };

    self.live_notes.expire_into(&mut self.expired);
    for note in self.expired.drain(..) {
      trace!("{} off {}/{}", self.tick_count, note.channel, note.key);
      record(self.sink.send_note_off(note.channel.index(), note.key, 0));
    }

    for sequence in self.sequences.iter().filter(|seq| seq.is_enabled()) {
      let channel = sequence.channel();
      for note in sequence.current_notes() {
        trace!("{} on {}/{}", self.tick_count, channel, note.key());
        record(
          self
            .sink
            .send_note_on(channel.index(), note.key(), note.velocity()),
        );
        self
          .live_notes
          .insert(LiveNote::new(note.key(), channel, note.duration()));
      }
    }

    for sequence in self.sequences.iter_mut() {
      sequence.advance();
    }
    self.tick_count += 1;

    match first_error {
      Some(err) => Err(SequencerError::Sink(err)),
      None => Ok(()),
    }
  }

  fn release_live_notes(&mut self) -> Result<usize, SequencerError> {
    let mut count = 0;
    let mut first_error = None;
    for note in self.live_notes.drain() {
      count += 1;
      if let Err(err) = self.sink.send_note_off(note.channel.index(), note.key, 0) {
        first_error.get_or_insert(err);
      }
    }
    match first_error {
      Some(err) => Err(SequencerError::Sink(err)),
      None => Ok(count),
    }
  }
}

/// The sequences owned by a sequencer, borrowed under its lock.
pub struct SequenceList<'a> {
  sequences: &'a mut Vec<Sequence>,
  tick_count: u64,
}

impl<'a> SequenceList<'a> {
  pub fn len(&self) -> usize {
    self.sequences.len()
  }

  pub fn is_empty(&self) -> bool {
    self.sequences.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<&Sequence> {
    self.sequences.get(index)
  }

  pub fn get_mut(&mut self, index: usize) -> Option<&mut Sequence> {
    self.sequences.get_mut(index)
  }

  pub fn iter(&self) -> impl Iterator<Item = &Sequence> + '_ {
    self.sequences.iter()
  }

  /// Appends a sequence, aligning its cursor with the ones already playing.
  /// Returns its index.
  pub fn push(&mut self, mut sequence: Sequence) -> Result<usize, SequencerError> {
    if sequence.length() == 0 {
      return Err(SequencerError::EmptySequence);
    }
    sequence.align_to(self.tick_count);
    debug!(
      "Adding sequence on channel {} with length {} at position {}",
      sequence.channel(),
      sequence.length(),
      sequence.position()
    );
    self.sequences.push(sequence);
    Ok(self.sequences.len() - 1)
  }

  pub fn remove(&mut self, index: usize) -> Result<Sequence, SequencerError> {
    self.check_index(index)?;
    debug!("Removing sequence {}", index);
    Ok(self.sequences.remove(index))
  }

  pub fn set_enabled(&mut self, index: usize, enabled: bool) -> Result<(), SequencerError> {
    self.check_index(index)?;
    self.sequences[index].set_enabled(enabled);
    Ok(())
  }

  /// Enables the sequence at `index` and disables all the others.
  pub fn solo(&mut self, index: usize) -> Result<(), SequencerError> {
    self.check_index(index)?;
    for (i, sequence) in self.sequences.iter_mut().enumerate() {
      sequence.set_enabled(i == index);
    }
    Ok(())
  }

  fn check_index(&self, index: usize) -> Result<(), SequencerError> {
    if index < self.sequences.len() {
      Ok(())
    } else {
      Err(SequencerError::IndexOutOfRange {
        index,
        len: self.sequences.len(),
      })
    }
  }
}

fn lock(state: &Mutex<State>) -> MutexGuard<State> {
  state
    .lock()
    .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Plays a list of sequences following the ticks of a clock.
///
/// Each tick first switches off the notes whose duration has elapsed, then
/// switches on the notes under every enabled sequence cursor, and finally
/// advances all cursors. Ticks and control operations share one lock, so a
/// control call never observes a half processed tick.
pub struct Sequencer {
  state: Arc<Mutex<State>>,
  clock: Arc<dyn Clock>,
  listener: ListenerId,
}

impl Sequencer {
  pub fn new(clock: Arc<dyn Clock>, sink: Box<dyn NoteSink>) -> Sequencer {
    let state = Arc::new(Mutex::new(State {
      running: false,
      tick_count: 0,
      sequences: Vec::new(),
      live_notes: LiveNotes::new(),
      expired: Vec::new(),
      sink,
    }));
    let listener = Self::subscribe(&clock, &state);
    Sequencer {
      state,
      clock,
      listener,
    }
  }

  fn subscribe(clock: &Arc<dyn Clock>, state: &Arc<Mutex<State>>) -> ListenerId {
    let state = state.clone();
    clock.subscribe(Box::new(move || {
      lock(&state).tick().map_err(failure::Error::from)
    }))
  }

  /// Moves the subscription to another clock.
  pub fn set_clock(&mut self, clock: Arc<dyn Clock>) {
    self.clock.unsubscribe(self.listener);
    self.listener = Self::subscribe(&clock, &self.state);
    self.clock = clock;
  }

  pub fn clock(&self) -> &Arc<dyn Clock> {
    &self.clock
  }

  /// Rewinds every sequence and starts playing.
  pub fn start(&self) {
    let mut state = lock(&self.state);
    for sequence in state.sequences.iter_mut() {
      sequence.align_to(0);
    }
    state.running = true;
    info!("Sequencer started");
  }

  /// Pauses playback keeping the cursors where they are.
  pub fn stop(&self) {
    lock(&self.state).running = false;
    info!("Sequencer stopped");
  }

  pub fn resume(&self) {
    lock(&self.state).running = true;
    info!("Sequencer resumed");
  }

  pub fn is_running(&self) -> bool {
    lock(&self.state).running
  }

  /// Processes one clock tick. Called by the clock subscription; exposed for
  /// hosts that drive the sequencer from their own timing source.
  ///
  /// A sink failure doesn't interrupt the tick: every due note is still
  /// switched off, registered and advanced, and the first failure is returned.
  pub fn tick(&self) -> Result<(), SequencerError> {
    lock(&self.state).tick()
  }

  pub fn tick_count(&self) -> u64 {
    lock(&self.state).tick_count
  }

  pub fn live_note_count(&self) -> usize {
    lock(&self.state).live_notes.len()
  }

  pub fn sequence_count(&self) -> usize {
    lock(&self.state).sequences.len()
  }

  /// Runs `f` with the sequence list while holding the sequencer lock.
  pub fn with_sequences<F, R>(&self, f: F) -> R
  where
    F: FnOnce(&mut SequenceList) -> R,
  {
    let mut state = lock(&self.state);
    let tick_count = state.tick_count;
    let mut list = SequenceList {
      sequences: &mut state.sequences,
      tick_count,
    };
    f(&mut list)
  }

  pub fn add_sequence(&self, sequence: Sequence) -> Result<usize, SequencerError> {
    self.with_sequences(|list| list.push(sequence))
  }

  pub fn remove_sequence(&self, index: usize) -> Result<Sequence, SequencerError> {
    self.with_sequences(|list| list.remove(index))
  }

  pub fn set_enabled(&self, index: usize, enabled: bool) -> Result<(), SequencerError> {
    self.with_sequences(|list| list.set_enabled(index, enabled))
  }

  pub fn solo(&self, index: usize) -> Result<(), SequencerError> {
    self.with_sequences(|list| list.solo(index))
  }

  /// Sends an off event for every sounding note and forgets them. Returns
  /// how many notes were released.
  pub fn release_live_notes(&self) -> Result<usize, SequencerError> {
    let released = lock(&self.state).release_live_notes()?;
    if released > 0 {
      debug!("Released {} live notes", released);
    }
    Ok(released)
  }
}

impl Drop for Sequencer {
  fn drop(&mut self) {
    self.clock.unsubscribe(self.listener);
  }
}

#[cfg(test)]
mod test {

  use super::*;
  use crate::clock::manual::ManualClock;
  use crate::midi::{Channel, Message};
  use crate::output::test::RecordingSink;
  use crate::sequencing::note::SequenceNote;

  fn on(channel: u8, key: u8, velocity: u8) -> Message {
    Message::NoteOn {
      channel,
      key,
      velocity,
    }
  }

  fn off(channel: u8, key: u8) -> Message {
    Message::NoteOff {
      channel,
      key,
      velocity: 0,
    }
  }

  fn sequence(length: usize, slots: &[(usize, u8, u32)]) -> Sequence {
    let mut seq = Sequence::new(Channel::PERCUSSION, length);
    for (slot, key, duration) in slots {
      seq
        .add_note(*slot, SequenceNote::new(*key, 80, *duration).unwrap())
        .unwrap();
    }
    seq
  }

  fn running_sequencer() -> (Arc<ManualClock>, Sequencer, RecordingSink) {
    let clock = Arc::new(ManualClock::new());
    let sink = RecordingSink::default();
    let sequencer = Sequencer::new(clock.clone(), Box::new(sink.clone()));
    clock.start().unwrap();
    sequencer.start();
    (clock, sequencer, sink)
  }

  /// Events emitted on each of `ticks` consecutive ticks.
  fn run(clock: &ManualClock, sink: &RecordingSink, ticks: usize) -> Vec<Vec<Message>> {
    (0..ticks)
      .map(|_| {
        clock.tick();
        sink.take()
      })
      .collect()
  }

  #[test]
  pub fn note_off_after_duration() {
    let (clock, sequencer, sink) = running_sequencer();
    sequencer
      .add_sequence(sequence(4, &[(0, 36, 2)]))
      .unwrap();

    let events = run(&clock, &sink, 8);
    assert_eq!(
      events,
      vec![
        vec![on(9, 36, 80)],
        vec![],
        vec![off(9, 36)],
        vec![],
        vec![on(9, 36, 80)],
        vec![],
        vec![off(9, 36)],
        vec![],
      ]
    );
  }

  #[test]
  pub fn single_tick_note_ends_on_next_tick() {
    let (clock, sequencer, sink) = running_sequencer();
    sequencer
      .add_sequence(sequence(4, &[(0, 36, 1)]))
      .unwrap();

    let events = run(&clock, &sink, 8);
    assert_eq!(
      events,
      vec![
        vec![on(9, 36, 80)],
        vec![off(9, 36)],
        vec![],
        vec![],
        vec![on(9, 36, 80)],
        vec![off(9, 36)],
        vec![],
        vec![],
      ]
    );
  }

  #[test]
  pub fn off_precedes_on_in_the_same_tick() {
    let (clock, sequencer, sink) = running_sequencer();
    sequencer
      .add_sequence(sequence(2, &[(0, 36, 2)]))
      .unwrap();

    let events = run(&clock, &sink, 3);
    assert_eq!(events[2], vec![off(9, 36), on(9, 36, 80)]);
    assert_eq!(sequencer.live_note_count(), 1);
  }

  #[test]
  pub fn off_timing_for_every_duration() {
    for duration in 1..=6u32 {
      let (clock, sequencer, sink) = running_sequencer();
      sequencer
        .add_sequence(sequence(16, &[(3, 40, duration)]))
        .unwrap();

      let events = run(&clock, &sink, 16);
      let on_tick = events
        .iter()
        .position(|tick| tick.contains(&on(9, 40, 80)))
        .unwrap();
      let off_tick = events
        .iter()
        .position(|tick| tick.contains(&off(9, 40)))
        .unwrap();
      assert_eq!(on_tick, 3);
      assert_eq!(off_tick, on_tick + duration as usize);
    }
  }

  #[test]
  pub fn ticks_ignored_while_stopped() {
    let (clock, sequencer, sink) = running_sequencer();
    sequencer
      .add_sequence(sequence(4, &[(0, 36, 1)]))
      .unwrap();

    sequencer.stop();
    assert!(!sequencer.is_running());
    clock.ticks(3);
    assert_eq!(sequencer.tick_count(), 0);
    assert!(sink.take().is_empty());
    assert_eq!(
      sequencer.with_sequences(|list| list.get(0).map(Sequence::position)),
      Some(0)
    );

    sequencer.resume();
    clock.tick();
    assert_eq!(sink.take(), vec![on(9, 36, 80)]);
    assert_eq!(sequencer.tick_count(), 1);
  }

  #[test]
  pub fn disabled_sequences_still_advance() {
    let (clock, sequencer, sink) = running_sequencer();
    sequencer
      .add_sequence(sequence(3, &[(0, 36, 1)]))
      .unwrap();
    sequencer
      .add_sequence(sequence(3, &[(0, 38, 1)]))
      .unwrap();
    sequencer.set_enabled(0, false).unwrap();

    let events = run(&clock, &sink, 4);
    assert_eq!(events[0], vec![on(9, 38, 80)]);
    assert_eq!(events[3], vec![on(9, 38, 80)]);

    let positions: Vec<usize> =
      sequencer.with_sequences(|list| list.iter().map(Sequence::position).collect());
    assert_eq!(positions, vec![1, 1]);

    sequencer.set_enabled(0, true).unwrap();
    clock.ticks(3);
    assert_eq!(sink.take(), vec![off(9, 38), on(9, 36, 80), on(9, 38, 80)]);
  }

  #[test]
  pub fn added_sequences_are_phase_aligned() {
    let (clock, sequencer, _sink) = running_sequencer();
    sequencer.add_sequence(sequence(4, &[])).unwrap();
    clock.ticks(7);

    let index = sequencer.add_sequence(sequence(4, &[])).unwrap();
    assert_eq!(index, 1);

    let positions: Vec<usize> =
      sequencer.with_sequences(|list| list.iter().map(Sequence::position).collect());
    assert_eq!(positions, vec![3, 3]);

    sequencer.add_sequence(sequence(5, &[])).unwrap();
    let position = sequencer.with_sequences(|list| list.get(2).map(Sequence::position));
    assert_eq!(position, Some(7 % 5));
  }

  #[test]
  pub fn start_rewinds_positions() {
    let (clock, sequencer, _sink) = running_sequencer();
    sequencer.add_sequence(sequence(4, &[])).unwrap();
    clock.ticks(3);
    sequencer.stop();
    sequencer.start();
    let position = sequencer.with_sequences(|list| list.get(0).map(Sequence::position));
    assert_eq!(position, Some(0));
    assert_eq!(sequencer.tick_count(), 3);
  }

  #[test]
  pub fn control_errors() {
    let (_clock, sequencer, _sink) = running_sequencer();
    assert_eq!(
      sequencer.add_sequence(sequence(0, &[])),
      Err(SequencerError::EmptySequence)
    );
    assert_eq!(sequencer.sequence_count(), 0);
    assert_eq!(
      sequencer.set_enabled(0, true),
      Err(SequencerError::IndexOutOfRange { index: 0, len: 0 })
    );
    assert!(sequencer.remove_sequence(1).is_err());
  }

  #[test]
  pub fn solo_and_remove() {
    let (clock, sequencer, sink) = running_sequencer();
    for key in &[36, 38, 42] {
      sequencer
        .add_sequence(sequence(2, &[(0, *key, 1)]))
        .unwrap();
    }
    sequencer.solo(1).unwrap();
    clock.tick();
    assert_eq!(sink.take(), vec![on(9, 38, 80)]);

    let removed = sequencer.remove_sequence(1).unwrap();
    assert_eq!(removed.slot(0)[0].key(), 38);
    assert_eq!(sequencer.sequence_count(), 2);

    // The removed sequence's live note still gets its off.
    clock.tick();
    assert_eq!(sink.take(), vec![off(9, 38)]);
  }

  #[test]
  pub fn release_live_notes_sends_offs() {
    let (clock, sequencer, sink) = running_sequencer();
    sequencer
      .add_sequence(sequence(8, &[(0, 36, 6), (0, 42, 3)]))
      .unwrap();
    clock.tick();
    sink.take();

    sequencer.stop();
    assert_eq!(sequencer.release_live_notes(), Ok(2));
    assert_eq!(sink.take(), vec![off(9, 42), off(9, 36)]);
    assert_eq!(sequencer.live_note_count(), 0);
  }

  #[test]
  pub fn no_ticks_after_clock_dispose() {
    let (clock, sequencer, sink) = running_sequencer();
    sequencer
      .add_sequence(sequence(1, &[(0, 36, 1)]))
      .unwrap();
    clock.tick();
    clock.dispose();
    clock.ticks(4);
    assert_eq!(sink.take(), vec![on(9, 36, 80)]);
    assert_eq!(sequencer.tick_count(), 1);
  }

  #[test]
  pub fn switch_clock() {
    let (old_clock, mut sequencer, sink) = running_sequencer();
    sequencer
      .add_sequence(sequence(1, &[(0, 36, 1)]))
      .unwrap();

    let new_clock = Arc::new(ManualClock::new());
    new_clock.start().unwrap();
    sequencer.set_clock(new_clock.clone());

    old_clock.tick();
    assert!(sink.take().is_empty());
    new_clock.tick();
    assert_eq!(sink.take(), vec![on(9, 36, 80)]);
  }

  #[test]
  pub fn drop_unsubscribes() {
    let (clock, sequencer, sink) = running_sequencer();
    sequencer
      .add_sequence(sequence(1, &[(0, 36, 1)]))
      .unwrap();
    drop(sequencer);
    clock.tick();
    assert!(sink.take().is_empty());
  }

  struct FailingSink;

  impl NoteSink for FailingSink {
    fn send(&mut self, _message: Message) -> Result<(), SinkError> {
      Err(SinkError::Disconnected)
    }
  }

  #[test]
  pub fn sink_failure_keeps_state_consistent() {
    let clock = Arc::new(ManualClock::new());
    let sequencer = Sequencer::new(clock.clone(), Box::new(FailingSink));
    sequencer.start();
    sequencer
      .add_sequence(sequence(2, &[(0, 36, 1)]))
      .unwrap();

    assert_eq!(
      sequencer.tick(),
      Err(SequencerError::Sink(SinkError::Disconnected))
    );
    assert_eq!(sequencer.tick_count(), 1);
    assert_eq!(sequencer.live_note_count(), 1);

    assert!(sequencer.tick().is_err());
    assert_eq!(sequencer.live_note_count(), 0);
    assert_eq!(
      sequencer.with_sequences(|list| list.get(0).map(Sequence::position)),
      Some(0)
    );
  }
}
