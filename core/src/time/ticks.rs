/// Resolution of the MIDI timing clock.
pub const TICKS_PER_BEAT: u32 = 24;

pub fn beats_to_ticks(beats: u32) -> usize {
  beats as usize * TICKS_PER_BEAT as usize
}

/// Whole beats contained in `ticks`, rounding down.
pub fn ticks_to_beats(ticks: usize) -> u32 {
  (ticks / TICKS_PER_BEAT as usize) as u32
}
