// MIDI events derived from a note list
// Ticks are absolute here; the encoder turns them into deltas

use crate::error::{EngineError, EngineResult};
use crate::sequencer::note::Note;
use midly::MidiMessage;

/// Fixed resolution of every file this engine writes
pub const TICKS_PER_BEAT: u16 = 480;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
}

impl MidiEvent {
    /// Read a channel message, keeping only note on/off
    ///
    /// A note-on with velocity 0 is a note-off.
    pub fn from_message(message: &MidiMessage) -> Option<Self> {
        match *message {
            MidiMessage::NoteOn { key, vel } => {
                let note = key.as_int();
                let velocity = vel.as_int();
                if velocity == 0 {
                    Some(MidiEvent::NoteOff { note })
                } else {
                    Some(MidiEvent::NoteOn { note, velocity })
                }
            }
            MidiMessage::NoteOff { key, .. } => Some(MidiEvent::NoteOff { note: key.as_int() }),
            _ => None,
        }
    }

    /// Rank used to order events that share a tick: offs first
    fn priority(&self) -> u8 {
        match self {
            MidiEvent::NoteOff { .. } => 0,
            MidiEvent::NoteOn { .. } => 1,
        }
    }
}

/// Event at an absolute tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEventTimed {
    pub event: MidiEvent,
    pub tick: u64,
}

/// Largest absolute tick a scheduled event may sit at
pub const MAX_TICK: u64 = 1 << 53;

/// Convert a position in beats to an absolute tick
///
/// None when the position is not finite or lies beyond `MAX_TICK`.
pub fn beats_to_ticks(beats: f64) -> Option<u64> {
    let ticks = (beats * TICKS_PER_BEAT as f64).round().max(0.0);
    if ticks.is_finite() && ticks <= MAX_TICK as f64 {
        Some(ticks as u64)
    } else {
        None
    }
}

/// Convert an absolute tick back to beats
pub fn ticks_to_beats(tick: u64, ticks_per_beat: u16) -> f64 {
    tick as f64 / ticks_per_beat.max(1) as f64
}

/// Velocity written for every note, from a fraction of full scale
pub fn velocity_from_fraction(fraction: f64) -> u8 {
    (fraction.clamp(0.0, 1.0) * 127.0).round().max(1.0) as u8
}

/// Lay out note-on/note-off pairs for notes already in time order
///
/// Each note ends at least one tick after it starts. At equal ticks note-offs
/// come before note-ons, otherwise the input order is kept. A note too far
/// out to be given a tick is an `Encoding` error.
pub fn schedule_notes<'a, I>(notes: I, velocity: u8) -> EngineResult<Vec<MidiEventTimed>>
where
    I: IntoIterator<Item = &'a Note>,
{
    let mut events = Vec::new();
    for note in notes {
        let out_of_range = || {
            EngineError::Encoding(format!(
                "note at beats {}..{} lies beyond the last MIDI tick",
                note.start_time, note.end_time
            ))
        };
        let start = beats_to_ticks(note.start_time).ok_or_else(out_of_range)?;
        let end = beats_to_ticks(note.end_time)
            .ok_or_else(out_of_range)?
            .max(start.saturating_add(1));
        events.push(MidiEventTimed {
            event: MidiEvent::NoteOn {
                note: note.pitch,
                velocity,
            },
            tick: start,
        });
        events.push(MidiEventTimed {
            event: MidiEvent::NoteOff { note: note.pitch },
            tick: end,
        });
    }

    // Stable, so ties within a rank keep the sorted-note order
    events.sort_by_key(|e| (e.tick, e.event.priority()));
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::num::u7;

    #[test]
    fn test_note_on_from_message() {
        let message = MidiMessage::NoteOn {
            key: u7::new(60),
            vel: u7::new(100),
        };

        assert_eq!(
            MidiEvent::from_message(&message),
            Some(MidiEvent::NoteOn {
                note: 60,
                velocity: 100
            })
        );
    }

    #[test]
    fn test_note_off_velocity_zero() {
        let message = MidiMessage::NoteOn {
            key: u7::new(64),
            vel: u7::new(0),
        };
        assert_eq!(
            MidiEvent::from_message(&message),
            Some(MidiEvent::NoteOff { note: 64 })
        );
    }

    #[test]
    fn test_other_messages_ignored() {
        let message = MidiMessage::Controller {
            controller: u7::new(7),
            value: u7::new(127),
        };
        assert_eq!(MidiEvent::from_message(&message), None);
    }

    #[test]
    fn test_tick_conversion() {
        assert_eq!(beats_to_ticks(0.0), Some(0));
        assert_eq!(beats_to_ticks(1.0), Some(480));
        assert_eq!(beats_to_ticks(0.5), Some(240));
        assert_eq!(beats_to_ticks(1e17), None);
        assert_eq!(beats_to_ticks(f64::INFINITY), None);
        assert_eq!(ticks_to_beats(720, TICKS_PER_BEAT), 1.5);
    }

    #[test]
    fn test_velocity_from_fraction() {
        assert_eq!(velocity_from_fraction(0.8), 102);
        assert_eq!(velocity_from_fraction(1.0), 127);
        assert_eq!(velocity_from_fraction(0.0), 1);
    }

    #[test]
    fn test_offs_before_ons_at_same_tick() {
        let notes = [Note::new(60, 0.0, 1.0), Note::new(62, 1.0, 2.0)];
        let events = schedule_notes(notes.iter(), 102).unwrap();

        assert_eq!(events.len(), 4);
        assert_eq!(events[1].tick, 480);
        assert_eq!(events[1].event, MidiEvent::NoteOff { note: 60 });
        assert_eq!(events[2].tick, 480);
        assert!(matches!(events[2].event, MidiEvent::NoteOn { note: 62, .. }));
    }

    #[test]
    fn test_tiny_note_lasts_one_tick() {
        let notes = [Note::new(60, 0.0, 0.0001)];
        let events = schedule_notes(notes.iter(), 102).unwrap();

        assert_eq!(events[0].tick, 0);
        assert_eq!(events[1].tick, 1);
    }

    #[test]
    fn test_far_note_is_encoding_error() {
        let notes = [Note::new(60, 1e17, 2e17)];
        let result = schedule_notes(notes.iter(), 102);
        assert!(matches!(result, Err(EngineError::Encoding(_))));
    }
}
