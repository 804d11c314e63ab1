// Sequence session controller
//
// Owns the active timeline and drives everything around it: keyboard input,
// generation requests, variation selection, saved sequences and playback.
// Failures never escape as panics and never touch the timeline; each one is
// recorded as the session's last message and pushed as a notification.

use crate::audio::timing::WavClip;
use crate::collaborator::{
    AudioRenderer, FileSource, GenerationRequest, GenerationResponse, GenerationService,
    PersistReceipt, RetryPolicy, SequenceRepository, SequenceUpload,
};
use crate::config::EngineConfig;
use crate::error::{CollaboratorError, EngineError, EngineResult};
use crate::messaging::{Notification, NotificationCategory, NotificationProducer};
use crate::midi::MidiEncoder;
use crate::sequencer::note::Note;
use crate::sequencer::timeline::{Tempo, Timeline};
use crate::sequencer::transport::{
    FrameOutcome, PlaybackClock, PlaybackSynchronizer, SharedAudioSource, SharedPlaybackState,
    TransportState,
};
use crate::sequencer::variation::{VariationIndex, VariationStore};
use crate::storage::PersistedSequence;
use ringbuf::traits::Producer;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// The services a session talks to
pub struct Collaborators {
    pub generator: Box<dyn GenerationService>,
    pub renderer: Box<dyn AudioRenderer>,
    pub repository: Box<dyn SequenceRepository>,
    pub files: Box<dyn FileSource>,
}

/// A generation request that has been issued but not yet resolved
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationTicket {
    pub generation: u64,
    pub request: GenerationRequest,
}

/// What became of a generation response
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    /// The store now holds these variation indices
    Applied { variations: Vec<VariationIndex> },
    /// A newer request was issued; the response was dropped untouched
    Stale,
    /// The request failed; store and timeline are unchanged
    Failed(EngineError),
}

/// A generated file fetched from the file source
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedFile {
    pub path: String,
    pub bytes: Vec<u8>,
}

/// Result of downloading every generated file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadReport {
    pub downloaded: Vec<DownloadedFile>,
    pub failed: Vec<(String, EngineError)>,
}

type Sleeper = Box<dyn Fn(Duration) + Send>;

pub struct SessionController {
    config: EngineConfig,
    timeline: Timeline,
    timeline_version: u64,
    tempo: Tempo,
    variation_count: u32,
    variations: VariationStore,
    generation: u64,
    pending_generation: Option<u64>,
    saved: Vec<PersistedSequence>,
    playback: PlaybackSynchronizer,
    services: Collaborators,
    notifications: Option<NotificationProducer>,
    last_message: Option<String>,
    encoder: MidiEncoder,
    retry: RetryPolicy,
    sleeper: Sleeper,
}

impl SessionController {
    /// Create a session with an empty timeline
    pub fn new(config: EngineConfig, services: Collaborators) -> EngineResult<Self> {
        config.validate()?;

        Ok(Self {
            timeline: Timeline::new(),
            timeline_version: 0,
            tempo: config.tempo()?,
            variation_count: config.variation_count,
            variations: VariationStore::new(),
            generation: 0,
            pending_generation: None,
            saved: Vec::new(),
            playback: PlaybackSynchronizer::new(config.frame_driver(), config.cursor_scale),
            services,
            notifications: None,
            last_message: None,
            encoder: MidiEncoder::new(config.velocity),
            retry: config.retry_policy(),
            sleeper: Box::new(std::thread::sleep),
            config,
        })
    }

    /// Push notifications into this channel from now on
    pub fn with_notifications(mut self, producer: NotificationProducer) -> Self {
        self.notifications = Some(producer);
        self
    }

    /// Replace the wait used between retries
    pub fn with_sleeper<F>(mut self, sleeper: F) -> Self
    where
        F: Fn(Duration) + Send + 'static,
    {
        self.sleeper = Box::new(sleeper);
        self
    }

    // --- State access ---

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Bumped by every timeline mutation
    pub fn timeline_version(&self) -> u64 {
        self.timeline_version
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    pub fn variation_count(&self) -> u32 {
        self.variation_count
    }

    pub fn variations(&self) -> &VariationStore {
        &self.variations
    }

    /// Current value of the generation counter
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_generating(&self) -> bool {
        self.pending_generation.is_some()
    }

    pub fn saved_sequences(&self) -> &[PersistedSequence] {
        &self.saved
    }

    /// Latest human-readable outcome
    pub fn last_message(&self) -> Option<&str> {
        self.last_message.as_deref()
    }

    // --- Editing ---

    /// Enter a note from the keyboard
    ///
    /// It starts where the last entered note ends and lasts the configured
    /// note duration.
    pub fn play_key(&mut self, pitch: u8) -> EngineResult<Note> {
        match self
            .timeline
            .append_from_input(pitch, self.config.note_duration_beats)
        {
            Ok(note) => {
                self.timeline_version += 1;
                log::debug!("Key {} entered at beat {}", note.note_name(), note.start_time);
                Ok(note)
            }
            Err(e) => Err(self.report(NotificationCategory::Editing, e)),
        }
    }

    /// Append an arbitrary note
    pub fn add_note(&mut self, note: Note) -> EngineResult<usize> {
        match self.timeline.append(note) {
            Ok(index) => {
                self.timeline_version += 1;
                Ok(index)
            }
            Err(e) => Err(self.report(NotificationCategory::Editing, e)),
        }
    }

    /// Remove the note at an insertion index
    pub fn delete_note(&mut self, index: usize) -> EngineResult<Note> {
        match self.timeline.remove_at(index) {
            Ok(note) => {
                self.timeline_version += 1;
                Ok(note)
            }
            Err(e) => Err(self.report(NotificationCategory::Editing, e)),
        }
    }

    pub fn clear_timeline(&mut self) {
        self.timeline.clear();
        self.timeline_version += 1;
    }

    pub fn set_tempo(&mut self, bpm: f64) -> EngineResult<()> {
        match Tempo::new(bpm) {
            Ok(tempo) => {
                self.tempo = tempo;
                Ok(())
            }
            Err(e) => Err(self.report(NotificationCategory::Editing, e)),
        }
    }

    /// Number of variations to ask for; at least one
    pub fn set_variation_count(&mut self, count: u32) -> EngineResult<()> {
        if count == 0 {
            let err = EngineError::InvalidSetting(
                "variation count must be at least 1".to_string(),
            );
            return Err(self.report(NotificationCategory::Generation, err));
        }
        self.variation_count = count;
        Ok(())
    }

    // --- Generation ---

    /// Issue a new request, superseding any request still in flight
    pub fn begin_generation(&mut self) -> GenerationTicket {
        self.generation += 1;
        self.pending_generation = Some(self.generation);

        GenerationTicket {
            generation: self.generation,
            request: GenerationRequest {
                notes: self.timeline.notes().to_vec(),
                tempo: self.tempo.bpm(),
                length: self.config.generation_length,
                variations: self.variation_count,
            },
        }
    }

    /// Apply the response of the request issued as `generation`
    ///
    /// A response for anything but the latest request is discarded without
    /// touching any state.
    pub fn complete_generation(
        &mut self,
        generation: u64,
        result: Result<GenerationResponse, CollaboratorError>,
    ) -> GenerationOutcome {
        if generation != self.generation {
            log::debug!(
                "Discarding generation {} response, latest is {}",
                generation,
                self.generation
            );
            return GenerationOutcome::Stale;
        }
        self.pending_generation = None;

        let validated = match result.and_then(GenerationResponse::validate) {
            Ok(validated) => validated,
            Err(e) => {
                let err = self.report(NotificationCategory::Generation, e.into());
                return GenerationOutcome::Failed(err);
            }
        };

        self.variations.load(validated.variations);
        self.variations.attach_files(validated.variation_files);
        let indices = self.variations.indices();

        let message = validated
            .message
            .unwrap_or_else(|| format!("Generated {} variations", indices.len()));
        log::info!("Generation {}: {}", generation, message);
        self.inform(NotificationCategory::Generation, message);

        GenerationOutcome::Applied {
            variations: indices,
        }
    }

    /// Ask the generation service for variations and wait for the answer
    pub fn request_variations(&mut self) -> EngineResult<Vec<VariationIndex>> {
        let ticket = self.begin_generation();
        let result = self
            .services
            .generator
            .generate_variations(&ticket.request);

        match self.complete_generation(ticket.generation, result) {
            GenerationOutcome::Applied { variations } => Ok(variations),
            GenerationOutcome::Failed(err) => Err(err),
            // The counter cannot move while this call holds the session
            GenerationOutcome::Stale => Ok(Vec::new()),
        }
    }

    /// Load a variation into the timeline, timings as generated
    pub fn select_variation(&mut self, index: VariationIndex) -> EngineResult<()> {
        let notes = match self.variations.select(index) {
            Ok(notes) => notes,
            Err(e) => return Err(self.report(NotificationCategory::Generation, e)),
        };
        if let Err(e) = self.timeline.replace_all(notes) {
            return Err(self.report(NotificationCategory::Generation, e));
        }

        self.timeline_version += 1;
        self.inform(
            NotificationCategory::Generation,
            format!("Variation {} loaded", index),
        );
        Ok(())
    }

    /// Fetch every file generated with the current variations
    ///
    /// A file that fails is reported and skipped; the rest still download.
    pub fn download_generated_files(&mut self) -> DownloadReport {
        let mut report = DownloadReport::default();
        let paths = self.variations.generated_files().to_vec();

        for path in paths {
            let files = &self.services.files;
            let sleeper = &self.sleeper;
            let fetched = self.retry.run(|| files.download_file(&path), |d| sleeper(d));
            match fetched {
                Ok(bytes) => report.downloaded.push(DownloadedFile { path, bytes }),
                Err(e) => {
                    let err = EngineError::from(e);
                    log::warn!("Download of {} failed: {}", path, err);
                    self.notify(Notification::warning(
                        NotificationCategory::Storage,
                        format!("Could not download {}: {}", path, err),
                    ));
                    report.failed.push((path, err));
                }
            }
        }

        let message = if report.failed.is_empty() {
            format!("Downloaded {} files", report.downloaded.len())
        } else {
            format!(
                "Downloaded {} files, {} failed",
                report.downloaded.len(),
                report.failed.len()
            )
        };
        self.last_message = Some(message);
        report
    }

    // --- MIDI and storage ---

    /// Encode the timeline as a MIDI file at the session tempo
    pub fn export_midi(&mut self) -> EngineResult<Vec<u8>> {
        self.encoder
            .encode_timeline(&self.timeline, self.tempo)
            .map_err(|e| self.report(NotificationCategory::Storage, e))
    }

    /// Encode and persist the timeline, then refresh the saved list
    pub fn save_sequence(&mut self) -> EngineResult<PersistReceipt> {
        let midi = self.export_midi()?;
        let upload = SequenceUpload {
            notes: self.timeline.notes().to_vec(),
            midi,
        };

        let receipt = match self.services.repository.persist(&self.config.user_id, &upload) {
            Ok(receipt) => receipt,
            Err(e) => return Err(self.report(NotificationCategory::Storage, e.into())),
        };

        // A failed refresh is reported on its own; the save itself stands
        if let Err(e) = self.refresh_saved_sequences() {
            log::debug!("Saved list not refreshed after save: {}", e);
        }

        log::info!("Saved sequence {}", receipt.sequence_id);
        self.inform(
            NotificationCategory::Storage,
            format!("Sequence saved: {}", receipt.file_name),
        );
        Ok(receipt)
    }

    /// Reload the list of saved sequences; returns how many there are
    pub fn refresh_saved_sequences(&mut self) -> EngineResult<usize> {
        let repository = &self.services.repository;
        let user_id = &self.config.user_id;
        let sleeper = &self.sleeper;
        let listed = self
            .retry
            .run(|| repository.list(user_id), |d| sleeper(d));

        match listed {
            Ok(sequences) => {
                self.saved = sequences;
                Ok(self.saved.len())
            }
            Err(e) => Err(self.report(NotificationCategory::Storage, e.into())),
        }
    }

    /// Load a saved sequence into the timeline as a uniform grid
    ///
    /// Note i of the saved list occupies beats i..i+1, whatever its stored
    /// timing was.
    pub fn insert_saved_sequence(&mut self, sequence_id: &str) -> EngineResult<()> {
        let Some(sequence) = self.saved.iter().find(|s| s.sequence_id == sequence_id) else {
            let err = EngineError::NotFound(format!("sequence {}", sequence_id));
            return Err(self.report(NotificationCategory::Storage, err));
        };

        let grid = sequence
            .notes()
            .map(|notes| Timeline::uniform_grid(&notes))
            .and_then(|grid| self.timeline.replace_all(grid));
        if let Err(e) = grid {
            return Err(self.report(NotificationCategory::Storage, e));
        }

        self.timeline_version += 1;
        self.inform(
            NotificationCategory::Storage,
            format!("Sequence {} loaded", sequence_id),
        );
        Ok(())
    }

    /// Delete a saved sequence
    pub fn delete_saved_sequence(&mut self, sequence_id: &str) -> EngineResult<()> {
        let deleted = match self
            .services
            .repository
            .delete(&self.config.user_id, sequence_id)
        {
            Ok(deleted) => deleted,
            Err(e) => return Err(self.report(NotificationCategory::Storage, e.into())),
        };

        if !deleted {
            let err = EngineError::NotFound(format!("sequence {}", sequence_id));
            return Err(self.report(NotificationCategory::Storage, err));
        }

        self.saved.retain(|s| s.sequence_id != sequence_id);
        self.inform(
            NotificationCategory::Storage,
            "Sequence deleted successfully".to_string(),
        );
        Ok(())
    }

    // --- Playback ---

    /// Render the timeline and play it from the start
    pub fn play_rendered(&mut self) -> EngineResult<()> {
        if self.timeline.is_empty() {
            let err = EngineError::Playback("Nothing to play: the timeline is empty".to_string());
            return Err(self.report(NotificationCategory::Playback, err));
        }

        let sorted = self.timeline.to_sorted().to_vec();
        let source = self
            .services
            .renderer
            .render_audio(&sorted, self.tempo)
            .map_err(EngineError::from)
            .and_then(WavClip::from_wav_bytes);
        let clip = match source {
            Ok(clip) => clip,
            Err(e) => return Err(self.report(NotificationCategory::Playback, e)),
        };

        let source: SharedAudioSource = Arc::new(Mutex::new(clip));
        self.play_source(source)
    }

    /// Play an already prepared audio source
    pub fn play_source(&mut self, source: SharedAudioSource) -> EngineResult<()> {
        self.playback
            .play(source)
            .map_err(|e| self.report(NotificationCategory::Playback, e))
    }

    pub fn pause_playback(&mut self) {
        self.playback.pause();
    }

    /// Continue after a pause
    pub fn resume_playback(&mut self) -> EngineResult<()> {
        self.playback
            .start()
            .map_err(|e| self.report(NotificationCategory::Playback, e))
    }

    pub fn stop_playback(&mut self) {
        self.playback.stop();
    }

    pub fn restart_playback(&mut self) -> EngineResult<()> {
        self.playback
            .restart()
            .map_err(|e| self.report(NotificationCategory::Playback, e))
    }

    /// Advance the cursor by one frame (manual driver)
    pub fn frame(&mut self) -> FrameOutcome {
        self.playback.frame()
    }

    pub fn playback_state(&self) -> TransportState {
        self.playback.state()
    }

    pub fn playback_clock(&self) -> PlaybackClock {
        self.playback.clock()
    }

    /// Cursor state for another thread to read
    pub fn playback_shared(&self) -> Arc<SharedPlaybackState> {
        self.playback.shared_state()
    }

    // --- Messages ---

    /// Record a failure and hand it back for returning
    fn report(&mut self, category: NotificationCategory, error: EngineError) -> EngineError {
        log::warn!("{:?}: {}", category, error);
        self.last_message = Some(error.to_string());
        self.notify(Notification::from_error(category, &error));
        error
    }

    fn inform(&mut self, category: NotificationCategory, message: String) {
        self.notify(Notification::info(category, message.clone()));
        self.last_message = Some(message);
    }

    fn notify(&mut self, notification: Notification) {
        if let Some(tx) = self.notifications.as_mut()
            && tx.try_push(notification).is_err()
        {
            log::debug!("Notification channel full, dropping message");
        }
    }
}
