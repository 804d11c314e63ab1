// Sequencer module
// Notes, the editable timeline, generation variations and playback transport

pub mod note;
pub mod timeline;
pub mod transport;
pub mod variation;

pub use note::Note;
pub use timeline::{SortedNotes, Tempo, TimeSignature, Timeline};
pub use transport::{
    FrameDriver, FrameOutcome, PlaybackClock, PlaybackSynchronizer, SharedAudioSource,
    SharedPlaybackState, TransportState,
};
pub use variation::{Variation, VariationIndex, VariationStore};
