pub mod tempo;
pub mod ticks;

pub use self::tempo::Tempo;
pub use self::ticks::TICKS_PER_BEAT;
