pub mod decoder;
pub mod encoder;
pub mod input;
pub mod messages;
pub mod types;

pub use self::decoder::Decoder;
pub use self::encoder::Encoder;
pub use self::input::{input_queue, InputHandle, InputRecord};
pub use self::messages::{Message, ALL_NOTES_OFF};
pub use self::types::{Channel, ValidationError, U14, U4, U7};
