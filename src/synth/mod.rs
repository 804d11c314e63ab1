// Synth module - Oscillators and envelopes for offline rendering

pub mod envelope;
pub mod oscillator;

pub use envelope::AdsrParams;
pub use oscillator::{Oscillator, SimpleOscillator, WaveformType, midi_to_frequency};
