// Lyrical - Note-sequence engine: timeline editing, MIDI encoding, generated
// variations, saved sequences and cursor-synchronized playback

pub mod audio;
pub mod collaborator;
pub mod config;
pub mod error;
pub mod messaging;
pub mod midi;
pub mod sequencer;
pub mod session;
pub mod storage;
pub mod synth;

// Re-export commonly used types for convenience
pub use audio::{AudioClock, SynthRenderer, WavClip};
pub use collaborator::{
    AudioRenderer, FileSource, GenerationRequest, GenerationResponse, GenerationService,
    RetryPolicy, SequenceRepository,
};
pub use config::EngineConfig;
pub use error::{CollaboratorError, EngineError, EngineResult};
pub use messaging::{Notification, NotificationCategory, create_notification_channel};
pub use midi::{MidiEncoder, decode, encode_timeline};
pub use sequencer::{
    FrameDriver, FrameOutcome, Note, PlaybackSynchronizer, Tempo, Timeline, TransportState,
    Variation, VariationStore,
};
pub use session::{Collaborators, GenerationOutcome, SessionController};
pub use storage::{LocalSequenceStore, PersistedSequence};
