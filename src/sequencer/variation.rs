// Variation store - Results of the latest generation request
// Variations are keyed by the index the service gave them

use crate::error::{EngineError, EngineResult};
use crate::sequencer::note::Note;
use std::collections::BTreeMap;

/// Identifier the generation service assigns to a variation
pub type VariationIndex = u32;

/// One alternative note sequence returned for a request
#[derive(Debug, Clone, PartialEq)]
pub struct Variation {
    pub index: VariationIndex,
    pub notes: Vec<Note>,
}

impl Variation {
    pub fn new(index: VariationIndex, notes: Vec<Note>) -> Self {
        Self { index, notes }
    }
}

/// Holds the variations of one generation request
///
/// A load replaces everything: nothing carries over between requests.
#[derive(Debug, Clone, Default)]
pub struct VariationStore {
    variations: BTreeMap<VariationIndex, Variation>,
    generated_files: Vec<String>,
}

impl VariationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the store with a new batch
    ///
    /// Indices are taken as given, gaps included. If the batch repeats an
    /// index, the later record wins.
    pub fn load(&mut self, variations: Vec<Variation>) {
        self.variations = variations.into_iter().map(|v| (v.index, v)).collect();
        self.generated_files.clear();
    }

    /// Record the artifact paths produced alongside the current batch
    pub fn attach_files(&mut self, files: Vec<String>) {
        self.generated_files = files;
    }

    /// Notes of a variation, with the service's timings untouched
    pub fn select(&self, index: VariationIndex) -> EngineResult<Vec<Note>> {
        self.variations
            .get(&index)
            .map(|v| v.notes.clone())
            .ok_or_else(|| EngineError::NotFound(format!("variation {}", index)))
    }

    /// Get a variation by index
    pub fn get(&self, index: VariationIndex) -> Option<&Variation> {
        self.variations.get(&index)
    }

    /// Known indices, ascending
    pub fn indices(&self) -> Vec<VariationIndex> {
        self.variations.keys().copied().collect()
    }

    /// All variations, ascending by index
    pub fn iter(&self) -> impl Iterator<Item = &Variation> {
        self.variations.values()
    }

    pub fn len(&self) -> usize {
        self.variations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variations.is_empty()
    }

    /// Paths of the files generated with the current batch
    pub fn generated_files(&self) -> &[String] {
        &self.generated_files
    }

    /// Whether there is anything to download for the current batch
    pub fn is_download_available(&self) -> bool {
        !self.generated_files.is_empty()
    }

    /// Drop the current batch
    pub fn clear(&mut self) {
        self.variations.clear();
        self.generated_files.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_batch() -> Vec<Variation> {
        vec![
            Variation::new(0, vec![Note::new(60, 0.0, 1.0)]),
            Variation::new(1, vec![Note::new(60, 5.0, 7.0), Note::new(62, 7.0, 7.5)]),
        ]
    }

    #[test]
    fn test_select_returns_notes_verbatim() {
        let mut store = VariationStore::new();
        store.load(sample_batch());

        let notes = store.select(1).unwrap();
        assert_eq!(notes, vec![Note::new(60, 5.0, 7.0), Note::new(62, 7.0, 7.5)]);
    }

    #[test]
    fn test_select_missing_index() {
        let mut store = VariationStore::new();
        store.load(sample_batch());

        let err = store.select(5).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn test_indices_are_not_renumbered() {
        let mut store = VariationStore::new();
        store.load(vec![
            Variation::new(7, vec![]),
            Variation::new(3, vec![Note::new(60, 0.0, 1.0)]),
        ]);

        assert_eq!(store.indices(), vec![3, 7]);
        assert!(store.select(0).is_err());
        assert!(store.select(7).unwrap().is_empty());
    }

    #[test]
    fn test_load_replaces_previous_batch() {
        let mut store = VariationStore::new();
        store.load(sample_batch());
        store.attach_files(vec!["/tmp/output_variation_0.mid".to_string()]);
        assert!(store.is_download_available());

        store.load(vec![Variation::new(4, vec![])]);
        assert_eq!(store.len(), 1);
        assert!(store.get(0).is_none());
        assert!(!store.is_download_available());
    }

    #[test]
    fn test_duplicate_index_later_wins() {
        let mut store = VariationStore::new();
        store.load(vec![
            Variation::new(2, vec![Note::new(60, 0.0, 1.0)]),
            Variation::new(2, vec![Note::new(72, 0.0, 1.0)]),
        ]);

        assert_eq!(store.len(), 1);
        assert_eq!(store.select(2).unwrap()[0].pitch, 72);
    }
}
