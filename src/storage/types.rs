// Saved sequence records

use crate::collaborator::SequenceMetadata;
use crate::error::{CollaboratorError, EngineError, EngineResult};
use crate::sequencer::note::Note;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One saved sequence as the repository lists it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSequence {
    pub sequence_id: String,
    pub user_id: String,
    pub file_path: String,
    /// JSON text of the shape `{"notes": [...]}`
    pub metadata: String,
    pub created_at: DateTime<Utc>,
}

impl PersistedSequence {
    /// Parse and check the notes held in the metadata
    pub fn notes(&self) -> EngineResult<Vec<Note>> {
        let metadata: SequenceMetadata = serde_json::from_str(&self.metadata).map_err(|e| {
            EngineError::Collaborator(CollaboratorError::InvalidResponse(format!(
                "metadata of sequence {}: {}",
                self.sequence_id, e
            )))
        })?;

        for (i, note) in metadata.notes.iter().enumerate() {
            note.validate().map_err(|e| {
                EngineError::InvalidNote(format!(
                    "sequence {} note {}: {}",
                    self.sequence_id, i, e
                ))
            })?;
        }
        Ok(metadata.notes)
    }

    /// Number of notes in the metadata, 0 when it cannot be read
    pub fn note_count(&self) -> usize {
        self.notes().map(|notes| notes.len()).unwrap_or(0)
    }
}
