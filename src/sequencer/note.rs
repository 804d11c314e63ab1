// Note representation for the sequencer
// A note is a pitch held between two positions measured in beats

use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// Highest MIDI note number
pub const MAX_PITCH: u8 = 127;

/// A timed pitch on the timeline
///
/// Times are in beats, not seconds: the tempo only comes into play when the
/// note is encoded or rendered. The serialized shape (`pitch`, `start_time`,
/// `end_time`) is the one exchanged with the generation service and stored in
/// sequence metadata.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// MIDI note number (0-127, where 60 = C4)
    pub pitch: u8,

    /// Start position in beats
    pub start_time: f64,

    /// End position in beats (strictly after start_time)
    pub end_time: f64,
}

impl Note {
    /// Creates a note without checking it; `validate` or a Timeline
    /// mutation rejects malformed values
    pub fn new(pitch: u8, start_time: f64, end_time: f64) -> Self {
        Self {
            pitch,
            start_time,
            end_time,
        }
    }

    /// Check pitch range and time ordering
    pub fn validate(&self) -> EngineResult<()> {
        if self.pitch > MAX_PITCH {
            return Err(EngineError::InvalidNote(format!(
                "pitch {} exceeds MIDI range (0-127)",
                self.pitch
            )));
        }

        if !self.start_time.is_finite() || !self.end_time.is_finite() {
            return Err(EngineError::InvalidNote(
                "note times must be finite".to_string(),
            ));
        }

        if self.start_time < 0.0 {
            return Err(EngineError::InvalidNote(format!(
                "start time {} is negative",
                self.start_time
            )));
        }

        if self.end_time <= self.start_time {
            return Err(EngineError::InvalidNote(format!(
                "end time {} must be after start time {}",
                self.end_time, self.start_time
            )));
        }

        Ok(())
    }

    /// Length of the note in beats
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Copy of this note moved to a new span, pitch unchanged
    pub fn with_span(&self, start_time: f64, end_time: f64) -> Self {
        Self::new(self.pitch, start_time, end_time)
    }

    /// Get the note name (e.g., "C4", "A#5")
    pub fn note_name(&self) -> String {
        const NOTE_NAMES: [&str; 12] = [
            "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
        ];

        let octave = (self.pitch / 12) as i32 - 1;
        let note_index = (self.pitch % 12) as usize;

        format!("{}{}", NOTE_NAMES[note_index], octave)
    }
}
