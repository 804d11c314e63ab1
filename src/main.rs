// Lyrical demo - Runs a session end to end on the local collaborators
// Run with: cargo run

use lyrical::collaborator::{GenerationRequest, GenerationResponse, GenerationService};
use lyrical::messaging::NotificationConsumer;
use lyrical::{
    CollaboratorError, Collaborators, EngineConfig, LocalSequenceStore, SessionController,
    SynthRenderer, create_notification_channel,
};
use ringbuf::traits::Consumer;
use std::thread;
use std::time::Duration;

/// Stands in for the remote melody generator, which this binary does not reach
struct UnconfiguredGenerator;

impl GenerationService for UnconfiguredGenerator {
    fn generate_variations(
        &self,
        _request: &GenerationRequest,
    ) -> Result<GenerationResponse, CollaboratorError> {
        Err(CollaboratorError::Transport(
            "generation service not configured".to_string(),
        ))
    }
}

fn drain(notifications: &mut NotificationConsumer) {
    while let Some(notification) = notifications.try_pop() {
        println!(
            "   [{:?}/{:?}] {}",
            notification.category, notification.level, notification.message
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== Lyrical ===");

    let config = match EngineConfig::default_path() {
        Some(path) => EngineConfig::load_or_default(path)?,
        None => EngineConfig::default(),
    };
    let storage_root = config.storage_root()?;
    println!("Storage: {}", storage_root.display());

    let services = Collaborators {
        generator: Box::new(UnconfiguredGenerator),
        renderer: Box::new(SynthRenderer::default()),
        repository: Box::new(LocalSequenceStore::open(&storage_root)?),
        files: Box::new(LocalSequenceStore::open(&storage_root)?),
    };
    let (notification_tx, mut notification_rx) =
        create_notification_channel(config.notification_capacity);
    let mut session =
        SessionController::new(config, services)?.with_notifications(notification_tx);

    // C major arpeggio from the keyboard
    for pitch in [60, 64, 67, 72] {
        let note = session.play_key(pitch)?;
        println!(
            "Key {} -> beats {}..{}",
            note.note_name(),
            note.start_time,
            note.end_time
        );
    }

    let midi = session.export_midi()?;
    let midi_path = std::env::temp_dir().join("lyrical_demo.mid");
    std::fs::write(&midi_path, &midi)?;
    println!("\nExported {} bytes of MIDI to {}", midi.len(), midi_path.display());

    println!("\nRequesting variations...");
    if session.request_variations().is_err() {
        println!("   {}", session.last_message().unwrap_or("generation failed"));
    }

    println!("\nSaving...");
    let receipt = session.save_sequence()?;
    println!("   {}", session.last_message().unwrap_or_default());
    println!("   {} saved sequences", session.saved_sequences().len());
    for sequence in session.saved_sequences() {
        println!(
            "   - {} ({} notes, {})",
            sequence.sequence_id,
            sequence.note_count(),
            sequence.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    session.insert_saved_sequence(&receipt.sequence_id)?;
    println!(
        "Re-inserted {} notes on a uniform grid",
        session.timeline().len()
    );

    println!("\nPlaying...");
    session.play_rendered()?;
    let cursor = session.playback_shared();
    while cursor.is_running() {
        println!("   cursor at {:>6.1}", cursor.position());
        thread::sleep(Duration::from_millis(250));
    }
    session.stop_playback();
    println!("Playback finished");

    println!("\nNotifications:");
    drain(&mut notification_rx);

    session.delete_saved_sequence(&receipt.sequence_id)?;
    println!("\n{}", session.last_message().unwrap_or_default());

    Ok(())
}
