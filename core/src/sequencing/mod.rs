pub mod live_notes;
pub mod note;
pub mod sequence;
pub mod sequencer;

pub use self::live_notes::{LiveNote, LiveNotes};
pub use self::note::SequenceNote;
pub use self::sequence::Sequence;
pub use self::sequencer::{SequenceList, Sequencer, SequencerError};
