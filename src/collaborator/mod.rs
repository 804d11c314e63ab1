// Collaborator contracts
//
// The engine reaches the generation service, the audio renderer and sequence
// storage only through these traits. Transports attach credentials on their
// own; an authentication failure comes back as `CollaboratorError::Unauthorized`.

pub mod retry;
pub mod types;

use crate::error::CollaboratorError;
use crate::sequencer::note::Note;
use crate::sequencer::timeline::Tempo;
use crate::storage::PersistedSequence;

pub use retry::RetryPolicy;
pub use types::{
    GenerationRequest, GenerationResponse, PersistReceipt, SequenceMetadata, SequenceUpload,
    ValidatedGeneration, VariationPayload,
};

/// Produces melody variations from a seed
pub trait GenerationService: Send {
    fn generate_variations(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, CollaboratorError>;
}

/// Turns notes into playable audio
pub trait AudioRenderer: Send {
    /// WAV bytes for the notes at the given tempo
    fn render_audio(&self, notes: &[Note], tempo: Tempo) -> Result<Vec<u8>, CollaboratorError>;
}

/// Stores saved sequences per user
pub trait SequenceRepository: Send {
    fn persist(
        &self,
        user_id: &str,
        upload: &SequenceUpload,
    ) -> Result<PersistReceipt, CollaboratorError>;

    fn list(&self, user_id: &str) -> Result<Vec<PersistedSequence>, CollaboratorError>;

    /// Returns false when the sequence does not exist for this user
    fn delete(&self, user_id: &str, sequence_id: &str) -> Result<bool, CollaboratorError>;
}

/// Fetches generated artifacts by path
pub trait FileSource: Send {
    fn download_file(&self, path: &str) -> Result<Vec<u8>, CollaboratorError>;
}
