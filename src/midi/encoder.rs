// MIDI encoder - Timeline to Standard MIDI File
//
// Output is a single-track (format 0) file at a fixed 480 ticks per beat:
// tempo and 4/4 time signature first, then one note-on/note-off pair per note
// on channel 0, then end-of-track. The same notes and tempo always give the
// same bytes.

use crate::error::{EngineError, EngineResult};
use crate::midi::event::{MidiEvent, TICKS_PER_BEAT, schedule_notes, velocity_from_fraction};
use crate::sequencer::note::Note;
use crate::sequencer::timeline::{Tempo, TimeSignature, Timeline};
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};

/// Largest delta a track event can carry
const MAX_DELTA: u64 = 0x0FFF_FFFF;

/// Largest value of the tempo meta field
const MAX_TEMPO_MICROS: u32 = 0x00FF_FFFF;

/// Default velocity, as a fraction of full scale
pub const DEFAULT_VELOCITY: f64 = 0.8;

/// Writes note lists as SMF bytes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MidiEncoder {
    velocity: u8,
    time_signature: TimeSignature,
}

impl MidiEncoder {
    /// Encoder writing every note at `velocity` (fraction of 127)
    pub fn new(velocity: f64) -> Self {
        Self {
            velocity: velocity_from_fraction(velocity),
            time_signature: TimeSignature::four_four(),
        }
    }

    /// Velocity byte written on every note-on
    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    /// Encode a timeline
    pub fn encode_timeline(&self, timeline: &Timeline, tempo: Tempo) -> EngineResult<Vec<u8>> {
        let sorted = timeline.to_sorted();
        self.encode_sorted(sorted.iter(), tempo)
    }

    /// Encode a note list given in any order
    ///
    /// Notes are checked first; a list that could not live in a Timeline is
    /// rejected.
    pub fn encode(&self, notes: &[Note], tempo: Tempo) -> EngineResult<Vec<u8>> {
        let timeline = Timeline::from_notes(notes.to_vec())?;
        self.encode_timeline(&timeline, tempo)
    }

    fn encode_sorted<'a, I>(&self, notes: I, tempo: Tempo) -> EngineResult<Vec<u8>>
    where
        I: IntoIterator<Item = &'a Note>,
    {
        let micros = tempo.micros_per_beat();
        if micros > MAX_TEMPO_MICROS {
            return Err(EngineError::Encoding(format!(
                "tempo of {} µs per beat does not fit a tempo event",
                micros
            )));
        }

        let mut track: Track<'static> = Vec::new();
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(micros))),
        });
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::TimeSignature(
                self.time_signature.numerator,
                self.time_signature.denominator_exponent(),
                24, // MIDI clocks per metronome click
                8,  // 32nd notes per quarter
            )),
        });

        let channel = u4::new(0);
        let mut last_tick: u64 = 0;
        for timed in schedule_notes(notes, self.velocity)? {
            let delta = timed.tick - last_tick;
            if delta > MAX_DELTA {
                return Err(EngineError::Encoding(format!(
                    "gap of {} ticks exceeds the largest MIDI delta",
                    delta
                )));
            }
            last_tick = timed.tick;

            let message = match timed.event {
                MidiEvent::NoteOn { note, velocity } => MidiMessage::NoteOn {
                    key: u7::new(note),
                    vel: u7::new(velocity),
                },
                MidiEvent::NoteOff { note } => MidiMessage::NoteOff {
                    key: u7::new(note),
                    vel: u7::new(0),
                },
            };
            track.push(TrackEvent {
                delta: u28::new(delta as u32),
                kind: TrackEventKind::Midi { channel, message },
            });
        }

        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });

        let mut smf = Smf::new(Header::new(
            Format::SingleTrack,
            Timing::Metrical(u15::new(TICKS_PER_BEAT)),
        ));
        smf.tracks.push(track);

        let mut buffer = Vec::new();
        smf.write_std(&mut buffer)
            .map_err(|e| EngineError::Encoding(e.to_string()))?;
        Ok(buffer)
    }
}

impl Default for MidiEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_VELOCITY)
    }
}

/// Encode a timeline with the default encoder settings
pub fn encode_timeline(timeline: &Timeline, tempo: Tempo) -> EngineResult<Vec<u8>> {
    MidiEncoder::default().encode_timeline(timeline, tempo)
}
