// Wire types exchanged with the collaborators

use crate::error::CollaboratorError;
use crate::sequencer::note::Note;
use crate::sequencer::variation::{Variation, VariationIndex};
use serde::{Deserialize, Serialize};

/// Body sent to the generation service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Seed melody, insertion order
    pub notes: Vec<Note>,
    /// Beats per minute
    pub tempo: f64,
    /// Beats to generate after the seed
    pub length: u32,
    /// How many variations to produce
    pub variations: u32,
}

/// One variation as the service sends it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariationPayload {
    #[serde(alias = "index")]
    pub variation: VariationIndex,
    #[serde(default)]
    pub notes: Vec<Note>,
}

/// Service answer; every field may be missing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub variations: Vec<VariationPayload>,
    #[serde(default)]
    pub variation_files: Vec<String>,
    #[serde(default)]
    pub output_midi_path: Option<String>,
}

/// A response that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedGeneration {
    pub variations: Vec<Variation>,
    pub variation_files: Vec<String>,
    pub message: Option<String>,
}

impl GenerationResponse {
    /// Parse a JSON body
    pub fn from_json(body: &str) -> Result<Self, CollaboratorError> {
        Ok(serde_json::from_str(body)?)
    }

    /// Check every note before anything reaches the variation store
    pub fn validate(self) -> Result<ValidatedGeneration, CollaboratorError> {
        let mut variations = Vec::with_capacity(self.variations.len());
        for payload in self.variations {
            for (i, note) in payload.notes.iter().enumerate() {
                note.validate().map_err(|e| {
                    CollaboratorError::InvalidResponse(format!(
                        "variation {} note {}: {}",
                        payload.variation, i, e
                    ))
                })?;
            }
            variations.push(Variation::new(payload.variation, payload.notes));
        }

        Ok(ValidatedGeneration {
            variations,
            variation_files: self.variation_files,
            message: self.message,
        })
    }
}

/// What the repository receives when a sequence is saved
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceUpload {
    pub notes: Vec<Note>,
    /// Encoded MIDI file
    pub midi: Vec<u8>,
}

/// Repository acknowledgement of a save
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistReceipt {
    pub sequence_id: String,
    pub file_name: String,
}

/// Metadata stored next to a sequence: `{"notes": [...]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceMetadata {
    #[serde(default)]
    pub notes: Vec<Note>,
}
