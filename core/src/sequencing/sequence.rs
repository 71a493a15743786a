use std::collections::BTreeMap;

use crate::midi::types::{Channel, ValidationError};
use crate::sequencing::note::SequenceNote;
use crate::time::ticks;

/// A looping grid of `length` tick slots on a single channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
  channel: Channel,
  length: usize,
  slots: BTreeMap<usize, Vec<SequenceNote>>,
  position: usize,
  enabled: bool,
  info: BTreeMap<String, String>,
}

impl Sequence {
  pub fn new(channel: Channel, length: usize) -> Sequence {
    Sequence {
      channel,
      length,
      slots: BTreeMap::new(),
      position: 0,
      enabled: true,
      info: BTreeMap::new(),
    }
  }

  pub fn with_beats(channel: Channel, beats: u32) -> Sequence {
    Sequence::new(channel, ticks::beats_to_ticks(beats))
  }

  pub fn channel(&self) -> Channel {
    self.channel
  }

  pub fn length(&self) -> usize {
    self.length
  }

  /// Appends a note to the slot, creating it if it was empty.
  pub fn add_note(&mut self, slot: usize, note: SequenceNote) -> Result<(), ValidationError> {
    self.check_slot(slot)?;
    self.slots.entry(slot).or_insert_with(Vec::new).push(note);
    Ok(())
  }

  pub fn slot(&self, slot: usize) -> &[SequenceNote] {
    self.slots.get(&slot).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Indices of the slots holding at least one note, in ascending order.
  pub fn used_slots(&self) -> impl Iterator<Item = usize> + '_ {
    self
      .slots
      .iter()
      .filter(|(_, notes)| !notes.is_empty())
      .map(|(slot, _)| *slot)
  }

  pub fn note_count(&self) -> usize {
    self.slots.values().map(Vec::len).sum()
  }

  pub fn clear_slot(&mut self, slot: usize) {
    self.slots.remove(&slot);
  }

  pub fn is_enabled(&self) -> bool {
    self.enabled
  }

  pub fn set_enabled(&mut self, enabled: bool) {
    self.enabled = enabled;
  }

  pub fn position(&self) -> usize {
    self.position
  }

  pub fn set_position(&mut self, position: usize) -> Result<(), ValidationError> {
    self.check_slot(position)?;
    self.position = position;
    Ok(())
  }

  /// Notes under the cursor.
  pub fn current_notes(&self) -> &[SequenceNote] {
    self.slot(self.position)
  }

  pub(crate) fn advance(&mut self) {
    if self.length > 0 {
      self.position = (self.position + 1) % self.length;
    }
  }

  /// Moves the cursor to the slot a sequence started at tick zero would be
  /// reading at `tick_count`.
  pub(crate) fn align_to(&mut self, tick_count: u64) {
    if self.length > 0 {
      self.position = (tick_count % self.length as u64) as usize;
    }
  }

  pub fn info(&self, key: &str) -> Option<&str> {
    self.info.get(key).map(String::as_str)
  }

  pub fn set_info<K, V>(&mut self, key: K, value: V)
  where
    K: Into<String>,
    V: ToString,
  {
    self.info.insert(key.into(), value.to_string());
  }

  pub fn info_entries(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
    self
      .info
      .iter()
      .map(|(key, value)| (key.as_str(), value.as_str()))
  }

  fn check_slot(&self, slot: usize) -> Result<(), ValidationError> {
    if slot < self.length {
      Ok(())
    } else {
      Err(ValidationError::Slot {
        slot,
        length: self.length,
      })
    }
  }
}
