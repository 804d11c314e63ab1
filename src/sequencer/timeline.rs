// Timeline - The insertion-ordered note list being edited and played
// Also holds the musical context (tempo, time signature) used to encode and render it

use crate::error::{EngineError, EngineResult};
use crate::sequencer::note::Note;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Time signature (numerator/denominator)
/// Only written into exported files; the sequence itself is counted in beats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,   // Beats per bar
    pub denominator: u8, // Note value (4 = quarter note)
}

impl TimeSignature {
    /// Common 4/4 time signature
    pub fn four_four() -> Self {
        Self {
            numerator: 4,
            denominator: 4,
        }
    }

    /// Denominator as a power of two, the form MIDI stores it in
    pub fn denominator_exponent(&self) -> u8 {
        self.denominator.max(1).trailing_zeros() as u8
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::four_four()
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Tempo in BPM (Beats Per Minute)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Tempo {
    bpm: f64,
}

impl Tempo {
    pub const MIN_BPM: f64 = 20.0;
    pub const MAX_BPM: f64 = 999.0;

    /// Creates a new tempo
    /// BPM must be in range [20.0, 999.0]
    pub fn new(bpm: f64) -> EngineResult<Self> {
        if !(Self::MIN_BPM..=Self::MAX_BPM).contains(&bpm) {
            return Err(EngineError::InvalidSetting(format!(
                "BPM must be between {} and {}, got {}",
                Self::MIN_BPM,
                Self::MAX_BPM,
                bpm
            )));
        }
        Ok(Self { bpm })
    }

    /// Get BPM value
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Duration of one beat in seconds
    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Microseconds per quarter note, as stored in a MIDI tempo event
    pub fn micros_per_beat(&self) -> u32 {
        (60_000_000.0 / self.bpm).round() as u32
    }

    /// Convert a position in beats to seconds
    pub fn beats_to_seconds(&self, beats: f64) -> f64 {
        beats * self.beat_duration_seconds()
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self { bpm: 120.0 }
    }
}

impl TryFrom<f64> for Tempo {
    type Error = EngineError;

    fn try_from(bpm: f64) -> Result<Self, Self::Error> {
        Tempo::new(bpm)
    }
}

impl From<Tempo> for f64 {
    fn from(tempo: Tempo) -> Self {
        tempo.bpm
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} BPM", self.bpm)
    }
}

/// The active note list
///
/// Storage order is insertion order. Notes may overlap (chords). Every
/// mutation goes through a validating method, so a Timeline never holds a
/// note that fails `Note::validate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Timeline {
    notes: Vec<Note>,
}

impl Timeline {
    /// Create an empty timeline
    pub fn new() -> Self {
        Self { notes: Vec::new() }
    }

    /// Build a timeline from a list, rejecting it whole if any note is invalid
    pub fn from_notes(notes: Vec<Note>) -> EngineResult<Self> {
        let mut timeline = Self::new();
        timeline.replace_all(notes)?;
        Ok(timeline)
    }

    /// Get all notes in insertion order
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Get a note by insertion index
    pub fn get(&self, index: usize) -> Option<&Note> {
        self.notes.get(index)
    }

    /// Get the number of notes
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// Check if the timeline is empty
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Append a note at the end of the insertion order
    ///
    /// Returns the index the note was stored at.
    pub fn append(&mut self, note: Note) -> EngineResult<usize> {
        note.validate()?;
        self.notes.push(note);
        Ok(self.notes.len() - 1)
    }

    /// Append a note the way live keyboard input does
    ///
    /// The new note starts where the last inserted note ends (0 when empty)
    /// and lasts `duration` beats.
    pub fn append_from_input(&mut self, pitch: u8, duration: f64) -> EngineResult<Note> {
        let start_time = self.last_end_time();
        let note = Note::new(pitch, start_time, start_time + duration);
        self.append(note)?;
        Ok(note)
    }

    /// Remove the note at an insertion index
    ///
    /// Other notes keep their times.
    pub fn remove_at(&mut self, index: usize) -> EngineResult<Note> {
        if index >= self.notes.len() {
            return Err(EngineError::IndexOutOfRange {
                index,
                len: self.notes.len(),
            });
        }
        Ok(self.notes.remove(index))
    }

    /// Swap in a whole new note list
    ///
    /// Every note is validated before anything changes; on error the current
    /// notes are kept as they were.
    pub fn replace_all(&mut self, notes: Vec<Note>) -> EngineResult<()> {
        for (index, note) in notes.iter().enumerate() {
            note.validate().map_err(|e| match e {
                EngineError::InvalidNote(reason) => {
                    EngineError::InvalidNote(format!("note {}: {}", index, reason))
                }
                other => other,
            })?;
        }
        self.notes = notes;
        Ok(())
    }

    /// Clear all notes
    pub fn clear(&mut self) {
        self.notes.clear();
    }

    /// End time of the most recently inserted note (0 when empty)
    pub fn last_end_time(&self) -> f64 {
        self.notes.last().map(|n| n.end_time).unwrap_or(0.0)
    }

    /// Latest end time over all notes, in beats
    pub fn duration_beats(&self) -> f64 {
        self.notes.iter().map(|n| n.end_time).fold(0.0, f64::max)
    }

    /// Notes ordered by start time, ties kept in insertion order
    pub fn to_sorted(&self) -> SortedNotes<'_> {
        let mut order: Vec<usize> = (0..self.notes.len()).collect();
        // sort_by is stable, so equal starts keep insertion order
        order.sort_by(|&a, &b| {
            self.notes[a]
                .start_time
                .total_cmp(&self.notes[b].start_time)
        });
        SortedNotes {
            notes: &self.notes,
            order,
        }
    }

    /// Lay notes out on a uniform grid: note i spans beats i..i+1
    ///
    /// Pitches and list order are kept; the original timings are dropped.
    pub fn uniform_grid(notes: &[Note]) -> Vec<Note> {
        notes
            .iter()
            .enumerate()
            .map(|(i, note)| note.with_span(i as f64, i as f64 + 1.0))
            .collect()
    }
}

/// Time-ordered view over a Timeline
///
/// Iterating does not copy notes, and the view can be walked any number of
/// times.
#[derive(Debug, Clone)]
pub struct SortedNotes<'a> {
    notes: &'a [Note],
    order: Vec<usize>,
}

impl<'a> SortedNotes<'a> {
    /// Walk the notes in time order
    pub fn iter(&self) -> SortedIter<'_, 'a> {
        SortedIter {
            notes: self.notes,
            order: self.order.iter(),
        }
    }

    /// Insertion indices in time order
    pub fn indices(&self) -> &[usize] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Copy the notes out in time order
    pub fn to_vec(&self) -> Vec<Note> {
        self.iter().copied().collect()
    }
}

impl<'s, 'a> IntoIterator for &'s SortedNotes<'a> {
    type Item = &'a Note;
    type IntoIter = SortedIter<'s, 'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator returned by `SortedNotes::iter`
#[derive(Debug, Clone)]
pub struct SortedIter<'s, 'a> {
    notes: &'a [Note],
    order: std::slice::Iter<'s, usize>,
}

impl<'s, 'a> Iterator for SortedIter<'s, 'a> {
    type Item = &'a Note;

    fn next(&mut self) -> Option<Self::Item> {
        self.order.next().map(|&i| &self.notes[i])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.order.size_hint()
    }
}

impl ExactSizeIterator for SortedIter<'_, '_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tempo() {
        let tempo = Tempo::new(120.0).unwrap();
        assert_eq!(tempo.bpm(), 120.0);
        assert_eq!(tempo.beat_duration_seconds(), 0.5);
        assert_eq!(tempo.micros_per_beat(), 500_000);
        assert_eq!(tempo.beats_to_seconds(3.0), 1.5);
        assert_eq!(Tempo::default(), tempo);
    }

    #[test]
    fn test_tempo_out_of_range() {
        assert!(Tempo::new(10.0).is_err());
        assert!(Tempo::new(1000.0).is_err());
        assert!(Tempo::new(f64::NAN).is_err());
    }

    #[test]
    fn test_time_signature() {
        let ts = TimeSignature::four_four();
        assert_eq!(ts.to_string(), "4/4");
        assert_eq!(ts.denominator_exponent(), 2);
    }

    #[test]
    fn test_append_keeps_insertion_order() {
        let mut timeline = Timeline::new();
        timeline.append(Note::new(64, 2.0, 3.0)).unwrap();
        timeline.append(Note::new(60, 0.0, 1.0)).unwrap();

        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.notes()[0].pitch, 64);
        assert_eq!(timeline.notes()[1].pitch, 60);
    }

    #[test]
    fn test_append_rejects_invalid_note() {
        let mut timeline = Timeline::new();
        let result = timeline.append(Note::new(60, 1.0, 1.0));

        assert!(matches!(result, Err(EngineError::InvalidNote(_))));
        assert!(timeline.is_empty());
    }

    #[test]
    fn test_append_from_input_chains_notes() {
        let mut timeline = Timeline::new();

        let first = timeline.append_from_input(60, 1.0).unwrap();
        assert_eq!((first.start_time, first.end_time), (0.0, 1.0));

        let second = timeline.append_from_input(62, 1.0).unwrap();
        assert_eq!((second.start_time, second.end_time), (1.0, 2.0));

        // Follows the last inserted note, not the latest one in time
        timeline.append(Note::new(64, 10.0, 10.5)).unwrap();
        timeline.append(Note::new(65, 0.0, 0.5)).unwrap();
        let chained = timeline.append_from_input(67, 1.0).unwrap();
        assert_eq!((chained.start_time, chained.end_time), (0.5, 1.5));
    }

    #[test]
    fn test_remove_at() {
        let mut timeline = Timeline::new();
        timeline.append(Note::new(60, 0.0, 1.0)).unwrap();
        timeline.append(Note::new(62, 1.0, 2.0)).unwrap();
        timeline.append(Note::new(64, 2.0, 3.0)).unwrap();

        let removed = timeline.remove_at(1).unwrap();
        assert_eq!(removed.pitch, 62);

        // Later notes keep their times
        assert_eq!(timeline.notes()[1], Note::new(64, 2.0, 3.0));

        assert_eq!(
            timeline.remove_at(5),
            Err(EngineError::IndexOutOfRange { index: 5, len: 2 })
        );
    }

    #[test]
    fn test_replace_all_is_atomic() {
        let mut timeline = Timeline::new();
        timeline.append(Note::new(60, 0.0, 1.0)).unwrap();
        let before = timeline.clone();

        let result = timeline.replace_all(vec![
            Note::new(62, 0.0, 1.0),
            Note::new(200, 1.0, 2.0),
            Note::new(64, 2.0, 3.0),
        ]);

        assert!(matches!(result, Err(EngineError::InvalidNote(_))));
        assert_eq!(timeline, before);

        timeline
            .replace_all(vec![Note::new(62, 0.0, 1.0), Note::new(64, 1.0, 2.0)])
            .unwrap();
        assert_eq!(timeline.len(), 2);
    }

    #[test]
    fn test_to_sorted_is_stable_and_restartable() {
        let mut timeline = Timeline::new();
        timeline.append(Note::new(67, 2.0, 3.0)).unwrap();
        timeline.append(Note::new(60, 0.0, 1.0)).unwrap();
        timeline.append(Note::new(64, 0.0, 1.0)).unwrap(); // chord with 60

        let sorted = timeline.to_sorted();
        let pitches: Vec<u8> = sorted.iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![60, 64, 67]);
        assert_eq!(sorted.indices(), &[1, 2, 0]);

        // Walking it again yields the same order
        let again: Vec<u8> = (&sorted).into_iter().map(|n| n.pitch).collect();
        assert_eq!(again, pitches);

        // Storage order is untouched
        assert_eq!(timeline.notes()[0].pitch, 67);
    }

    #[test]
    fn test_duration_beats() {
        let mut timeline = Timeline::new();
        assert_eq!(timeline.duration_beats(), 0.0);

        timeline.append(Note::new(60, 0.0, 4.0)).unwrap();
        timeline.append(Note::new(62, 1.0, 2.0)).unwrap();
        assert_eq!(timeline.duration_beats(), 4.0);
        assert_eq!(timeline.last_end_time(), 2.0);
    }

    #[test]
    fn test_uniform_grid() {
        let notes = vec![Note::new(60, 5.0, 7.0), Note::new(62, 0.25, 0.5)];
        let grid = Timeline::uniform_grid(&notes);

        assert_eq!(grid[0], Note::new(60, 0.0, 1.0));
        assert_eq!(grid[1], Note::new(62, 1.0, 2.0));
    }
}
