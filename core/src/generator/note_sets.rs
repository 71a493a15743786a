use std::collections::BTreeSet;

use failure::Fail;

use crate::midi::types::{MAX_U7, U7};

pub const PERCUSSION: &str = "percussion";
pub const AKAI_XR20: &str = "akaixr20";
pub const NORD_DRUM_2: &str = "norddrum2";
pub const VOLCA_BEATS: &str = "volcabeats";
pub const CIRCUIT: &str = "circuit";

/// General MIDI percussion key map, from Acoustic Bass Drum to Open Triangle.
pub const GM_PERCUSSION_FIRST: U7 = 35;
pub const GM_PERCUSSION_LAST: U7 = 81;

const AKAI_XR20_PADS: [U7; 12] = [36, 38, 37, 42, 44, 46, 48, 47, 41, 49, 51, 53];
const NORD_DRUM_2_CHANNELS: [U7; 6] = [60, 62, 64, 65, 67, 69];
const VOLCA_BEATS_PARTS: [U7; 10] = [36, 38, 43, 50, 42, 46, 39, 75, 67, 49];
const CIRCUIT_DRUMS: [U7; 4] = [60, 62, 64, 65];

#[derive(Debug, Fail, PartialEq)]
pub enum NotesError {
  #[fail(display = "Unknown note set: {}", name)]
  UnknownSet { name: String },

  #[fail(display = "Note out of range [0, 127]: {}", value)]
  Note { value: String },

  #[fail(display = "No notes in {:?}", descriptor)]
  Empty { descriptor: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoteSet {
  pub name: String,
  pub notes: Vec<U7>,
}

impl NoteSet {
  fn new(name: &str, notes: &[U7]) -> NoteSet {
    NoteSet {
      name: name.to_string(),
      notes: notes.to_vec(),
    }
  }

  pub fn percussion() -> NoteSet {
    NoteSet {
      name: PERCUSSION.to_string(),
      notes: (GM_PERCUSSION_FIRST..=GM_PERCUSSION_LAST).collect(),
    }
  }

  /// The built in sets: General MIDI percussion and the drum maps of a few
  /// hardware machines.
  pub fn defaults() -> Vec<NoteSet> {
    vec![
      NoteSet::new(AKAI_XR20, &AKAI_XR20_PADS),
      NoteSet::new(NORD_DRUM_2, &NORD_DRUM_2_CHANNELS),
      NoteSet::new(VOLCA_BEATS, &VOLCA_BEATS_PARTS),
      NoteSet::new(CIRCUIT, &CIRCUIT_DRUMS),
      NoteSet::percussion(),
    ]
  }

  /// Case insensitive lookup among the built in sets.
  pub fn by_name(name: &str) -> Option<NoteSet> {
    let name = name.trim().to_lowercase();
    NoteSet::defaults()
      .into_iter()
      .find(|set| set.name == name)
  }
}

/// Parses a comma separated mix of note numbers and set names, such as
/// `"volcabeats, 60, 62"`, into a sorted list without duplicates.
pub fn parse_notes_descriptor(descriptor: &str) -> Result<Vec<U7>, NotesError> {
  let mut notes = BTreeSet::new();
  for field in descriptor.split(',').map(str::trim).filter(|f| !f.is_empty()) {
    if field.chars().all(|c| c.is_ascii_digit()) {
      match field.parse::<u16>() {
        Ok(note) if note <= u16::from(MAX_U7) => {
          notes.insert(note as U7);
        }
        _ => {
          return Err(NotesError::Note {
            value: field.to_string(),
          })
        }
      }
    } else {
      let set = NoteSet::by_name(field).ok_or_else(|| NotesError::UnknownSet {
        name: field.to_string(),
      })?;
      notes.extend(set.notes);
    }
  }

  if notes.is_empty() {
    return Err(NotesError::Empty {
      descriptor: descriptor.to_string(),
    });
  }
  Ok(notes.into_iter().collect())
}
