// Audio module - Offline rendering and the playback clock

pub mod export;
pub mod timing;

pub use export::{ExportSettings, SynthRenderer};
pub use timing::{AudioClock, WavClip};
