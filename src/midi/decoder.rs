// MIDI decoder - Standard MIDI File back to a note list
// Reads the files the encoder writes and the variation files the generation
// service hands out

use crate::error::{EngineError, EngineResult};
use crate::midi::event::{MidiEvent, ticks_to_beats};
use crate::sequencer::note::Note;
use crate::sequencer::timeline::Tempo;
use midly::{MetaMessage, Smf, Timing, TrackEventKind};
use std::collections::{HashMap, VecDeque};

/// What a MIDI file holds, in engine terms
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedSequence {
    /// First tempo found, 120 when the file has none
    pub tempo_bpm: f64,
    pub ticks_per_beat: u16,
    /// Notes ordered by start time
    pub notes: Vec<Note>,
}

impl DecodedSequence {
    /// Tempo as an engine value, if it is in the accepted range
    pub fn tempo(&self) -> EngineResult<Tempo> {
        Tempo::new(self.tempo_bpm)
    }
}

/// Parse SMF bytes into notes and tempo
///
/// Note-ons are paired with note-offs per channel and key, first in first
/// out. Notes left open at the end of a track are dropped.
pub fn decode(bytes: &[u8]) -> EngineResult<DecodedSequence> {
    let smf = Smf::parse(bytes).map_err(|e| EngineError::Encoding(e.to_string()))?;

    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(ticks) => ticks.as_int(),
        Timing::Timecode(..) => {
            return Err(EngineError::Encoding(
                "timecode-based files are not supported".to_string(),
            ));
        }
    };
    if ticks_per_beat == 0 {
        return Err(EngineError::Encoding(
            "file declares zero ticks per beat".to_string(),
        ));
    }

    let mut tempo_bpm: Option<f64> = None;
    // (tick, insertion) ordering key, note
    let mut notes: Vec<((u64, usize), Note)> = Vec::new();

    for track in &smf.tracks {
        let mut tick: u64 = 0;
        let mut open: HashMap<(u8, u8), VecDeque<u64>> = HashMap::new();

        for event in track {
            tick += event.delta.as_int() as u64;
            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(micros)) => {
                    let micros = micros.as_int();
                    if tempo_bpm.is_none() && micros > 0 {
                        tempo_bpm = Some(60_000_000.0 / micros as f64);
                    }
                }
                TrackEventKind::Midi { channel, message } => {
                    let key_of = |note: u8| (channel.as_int(), note);
                    match MidiEvent::from_message(&message) {
                        Some(MidiEvent::NoteOn { note, .. }) => {
                            open.entry(key_of(note)).or_default().push_back(tick);
                        }
                        Some(MidiEvent::NoteOff { note }) => {
                            if let Some(start) =
                                open.get_mut(&key_of(note)).and_then(|q| q.pop_front())
                            {
                                let decoded = Note::new(
                                    note,
                                    ticks_to_beats(start, ticks_per_beat),
                                    ticks_to_beats(tick, ticks_per_beat),
                                );
                                // Zero-length pairs cannot be represented
                                if decoded.validate().is_ok() {
                                    notes.push(((start, notes.len()), decoded));
                                }
                            }
                        }
                        None => {}
                    }
                }
                _ => {}
            }
        }

        let dangling: usize = open.values().map(VecDeque::len).sum();
        if dangling > 0 {
            log::debug!("Dropped {} unterminated notes while decoding", dangling);
        }
    }

    notes.sort_by_key(|(key, _)| *key);

    Ok(DecodedSequence {
        tempo_bpm: tempo_bpm.unwrap_or(120.0),
        ticks_per_beat,
        notes: notes.into_iter().map(|(_, note)| note).collect(),
    })
}
