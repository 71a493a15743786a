use std::collections::VecDeque;

use crate::midi::types::{Channel, U7};

/// A note that has been switched on and is waiting for its off event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveNote {
  pub key: U7,
  pub channel: Channel,
  pub ticks_remaining: u32,
}

impl LiveNote {
  pub fn new(key: U7, channel: Channel, ticks_remaining: u32) -> LiveNote {
    LiveNote {
      key,
      channel,
      ticks_remaining,
    }
  }
}

/// Sounding notes kept in ascending order of ticks remaining, so the ones due
/// on the next tick always sit at the front.
#[derive(Debug, Default)]
pub struct LiveNotes {
  notes: VecDeque<LiveNote>,
}

impl LiveNotes {
  pub fn new() -> LiveNotes {
    LiveNotes {
      notes: VecDeque::new(),
    }
  }

  pub fn len(&self) -> usize {
    self.notes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.notes.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &LiveNote> + '_ {
    self.notes.iter()
  }

  /// Inserts keeping the order. Scans from the back and places the note
  /// right after the last entry that expires no later than it, so notes with
  /// equal durations keep their insertion order.
  pub fn insert(&mut self, note: LiveNote) {
    let index = self
      .notes
      .iter()
      .rposition(|live| live.ticks_remaining <= note.ticks_remaining)
      .map(|index| index + 1)
      .unwrap_or(0);
    self.notes.insert(index, note);
  }

  /// Moves the notes due on this tick into `expired` and counts down the
  /// remaining ones. Only the due prefix is inspected before the countdown.
  pub fn expire_into(&mut self, expired: &mut Vec<LiveNote>) {
    while let Some(front) = self.notes.front() {
      if front.ticks_remaining > 1 {
        break;
      }
      if let Some(note) = self.notes.pop_front() {
        expired.push(note);
      }
    }
    for note in self.notes.iter_mut() {
      note.ticks_remaining -= 1;
    }
  }

  /// Removes every live note, in expiry order.
  pub fn drain(&mut self) -> impl Iterator<Item = LiveNote> + '_ {
    self.notes.drain(..)
  }

  pub fn is_sorted(&self) -> bool {
    self
      .notes
      .iter()
      .zip(self.notes.iter().skip(1))
      .all(|(a, b)| a.ticks_remaining <= b.ticks_remaining)
  }
}
