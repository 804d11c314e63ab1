// MIDI module - Standard MIDI File encoding and decoding of note lists

pub mod decoder;
pub mod encoder;
pub mod event;

pub use decoder::{DecodedSequence, decode};
pub use encoder::{DEFAULT_VELOCITY, MidiEncoder, encode_timeline};
pub use event::{MidiEvent, MidiEventTimed, TICKS_PER_BEAT};
