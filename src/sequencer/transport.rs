// Transport - Playback control and cursor synchronization
// Follows an audio clock frame by frame and publishes the cursor position

use crate::audio::timing::AudioClock;
use crate::error::{EngineError, EngineResult};
use crossbeam_channel::{Sender, select};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Audio source shared between the host and the frame loop
pub type SharedAudioSource = Arc<Mutex<dyn AudioClock>>;

/// Cursor units per second of audio
pub const DEFAULT_CURSOR_SCALE: f64 = 50.0;

/// Token meaning "no frame loop may publish"
const NO_TOKEN: u64 = 0;

/// Transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Idle,
    Playing,
    Paused,
}

impl TransportState {
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing)
    }

    /// Check if transport is idle or paused
    pub fn is_stopped(&self) -> bool {
        matches!(self, TransportState::Idle | TransportState::Paused)
    }
}

/// Snapshot of the cursor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackClock {
    /// Cursor position, in cursor units
    pub position: f64,
    pub running: bool,
}

/// Shared playback state
/// Thread-safe via atomics, read by the UI and written by the frame loop
#[derive(Debug, Default)]
pub struct SharedPlaybackState {
    position_bits: AtomicU64,
    running: AtomicBool,
    active_token: AtomicU64,
}

impl SharedPlaybackState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Current cursor position
    pub fn position(&self) -> f64 {
        f64::from_bits(self.position_bits.load(Ordering::Acquire))
    }

    fn set_position(&self, position: f64) {
        self.position_bits
            .store(position.to_bits(), Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    /// Token of the loop currently allowed to publish
    pub fn active_token(&self) -> u64 {
        self.active_token.load(Ordering::Acquire)
    }

    fn set_active_token(&self, token: u64) {
        self.active_token.store(token, Ordering::Release);
    }

    pub fn snapshot(&self) -> PlaybackClock {
        PlaybackClock {
            position: self.position(),
            running: self.is_running(),
        }
    }
}

/// How frames get scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDriver {
    /// The host calls `PlaybackSynchronizer::frame` once per UI frame
    Manual,
    /// A background thread runs a frame at every interval
    Ticker(Duration),
}

/// Result of one frame step
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// Position published, keep going
    Continue(f64),
    /// Position published, the clock is paused or ended
    Finished(f64),
    /// This loop is no longer the active one; nothing published
    Stale,
}

fn lock_clock(clock: &SharedAudioSource) -> MutexGuard<'_, dyn AudioClock + 'static> {
    clock.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One frame: read the clock and publish the cursor
///
/// The token check happens under the clock lock, the same lock `stop` holds
/// while it invalidates the token, so a frame never publishes after a stop.
pub fn run_frame(
    clock: &SharedAudioSource,
    shared: &SharedPlaybackState,
    token: u64,
    scale: f64,
) -> FrameOutcome {
    let clock = lock_clock(clock);
    if token == NO_TOKEN || shared.active_token() != token {
        return FrameOutcome::Stale;
    }

    // Checked before reading the time so a finishing frame publishes the end
    let finished = clock.is_paused() || clock.is_ended();
    let position = clock.current_time() * scale;
    shared.set_position(position);

    if finished {
        shared.set_running(false);
        FrameOutcome::Finished(position)
    } else {
        FrameOutcome::Continue(position)
    }
}

struct ActiveSource {
    clock: SharedAudioSource,
    token: u64,
}

/// Background loop woken by a ticker
struct FrameLoop {
    halt_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl FrameLoop {
    fn spawn(
        clock: SharedAudioSource,
        shared: Arc<SharedPlaybackState>,
        token: u64,
        scale: f64,
        interval: Duration,
    ) -> EngineResult<Self> {
        let (halt_tx, halt_rx) = crossbeam_channel::bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("playback-frames".to_string())
            .spawn(move || {
                let ticker = crossbeam_channel::tick(interval);
                log::debug!("Frame loop {} started", token);
                loop {
                    let keep_going = select! {
                        recv(ticker) -> _ => matches!(
                            run_frame(&clock, &shared, token, scale),
                            FrameOutcome::Continue(_)
                        ),
                        recv(halt_rx) -> _ => false,
                    };
                    if !keep_going {
                        break;
                    }
                }
                log::debug!("Frame loop {} ended", token);
            })
            .map_err(|e| EngineError::Playback(format!("Could not start frame loop: {}", e)))?;

        Ok(Self {
            halt_tx,
            handle: Some(handle),
        })
    }

    /// Ask the loop to end and wait for it
    ///
    /// Must not be called while holding the clock lock.
    fn halt(mut self) {
        let _ = self.halt_tx.try_send(());
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::warn!("Frame loop panicked");
        }
    }
}

/// Keeps the visual cursor in step with the audio clock
///
/// At most one frame loop exists at a time. Every start hands out a fresh
/// token; stop and pause withdraw it, which silences any frame still queued.
pub struct PlaybackSynchronizer {
    shared: Arc<SharedPlaybackState>,
    source: Option<ActiveSource>,
    state: TransportState,
    scale: f64,
    driver: FrameDriver,
    frame_loop: Option<FrameLoop>,
    next_token: u64,
}

impl PlaybackSynchronizer {
    pub fn new(driver: FrameDriver, scale: f64) -> Self {
        Self {
            shared: SharedPlaybackState::new(),
            source: None,
            state: TransportState::Idle,
            scale,
            driver,
            frame_loop: None,
            next_token: NO_TOKEN + 1,
        }
    }

    /// Shared state (for the UI thread)
    pub fn shared_state(&self) -> Arc<SharedPlaybackState> {
        Arc::clone(&self.shared)
    }

    /// Current state
    ///
    /// A loop that finished on its own reads as Idle.
    pub fn state(&self) -> TransportState {
        if self.state == TransportState::Playing && !self.shared.is_running() {
            TransportState::Idle
        } else {
            self.state
        }
    }

    /// Cursor snapshot
    pub fn clock(&self) -> PlaybackClock {
        self.shared.snapshot()
    }

    /// Current cursor position
    pub fn position(&self) -> f64 {
        self.shared.position()
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn driver(&self) -> FrameDriver {
        self.driver
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Stop whatever plays, then play a new source from its start
    pub fn play(&mut self, source: SharedAudioSource) -> EngineResult<()> {
        self.load(source);
        self.start()
    }

    /// Stop whatever plays and install a new source without starting it
    pub fn load(&mut self, source: SharedAudioSource) {
        self.stop();
        self.source = Some(ActiveSource {
            clock: source,
            token: NO_TOKEN,
        });
    }

    /// Start or resume the installed source
    pub fn start(&mut self) -> EngineResult<()> {
        self.halt_loop();

        let token = self.next_token;
        self.next_token += 1;

        let Some(active) = self.source.as_mut() else {
            return Err(EngineError::Playback("No audio loaded".to_string()));
        };

        {
            let mut clock = lock_clock(&active.clock);
            clock.play()?;
            self.shared.set_active_token(token);
            self.shared.set_running(true);
        }
        active.token = token;
        self.state = TransportState::Playing;

        if let FrameDriver::Ticker(interval) = self.driver {
            let frame_loop = FrameLoop::spawn(
                Arc::clone(&active.clock),
                Arc::clone(&self.shared),
                token,
                self.scale,
                interval,
            );
            match frame_loop {
                Ok(frame_loop) => self.frame_loop = Some(frame_loop),
                Err(e) => {
                    self.stop();
                    return Err(e);
                }
            }
        }

        log::debug!("Playback started with token {}", token);
        Ok(())
    }

    /// Pause audio and keep the cursor where it is
    pub fn pause(&mut self) {
        if self.state != TransportState::Playing {
            return;
        }

        if let Some(active) = &self.source {
            let mut clock = lock_clock(&active.clock);
            self.shared.set_active_token(NO_TOKEN);
            clock.pause();
            self.shared.set_position(clock.current_time() * self.scale);
            self.shared.set_running(false);
        }
        self.halt_loop();
        self.state = TransportState::Paused;
    }

    /// Stop audio and bring the cursor back to zero
    ///
    /// Safe from any state, including before anything was played.
    pub fn stop(&mut self) {
        match &self.source {
            Some(active) => {
                let mut clock = lock_clock(&active.clock);
                self.shared.set_active_token(NO_TOKEN);
                clock.pause();
                clock.seek(0.0);
                self.shared.set_position(0.0);
                self.shared.set_running(false);
            }
            None => {
                self.shared.set_active_token(NO_TOKEN);
                self.shared.set_position(0.0);
                self.shared.set_running(false);
            }
        }
        self.halt_loop();
        self.state = TransportState::Idle;
    }

    /// Stop, then play the same source again from zero
    pub fn restart(&mut self) -> EngineResult<()> {
        self.stop();
        self.start()
    }

    /// Run one frame for the manual driver
    pub fn frame(&mut self) -> FrameOutcome {
        let Some(active) = &self.source else {
            return FrameOutcome::Stale;
        };

        let outcome = run_frame(&active.clock, &self.shared, active.token, self.scale);
        if let FrameOutcome::Finished(_) = outcome {
            self.shared.set_active_token(NO_TOKEN);
            self.state = TransportState::Idle;
        }
        outcome
    }

    fn halt_loop(&mut self) {
        if let Some(frame_loop) = self.frame_loop.take() {
            frame_loop.halt();
        }
    }
}

impl Default for PlaybackSynchronizer {
    fn default() -> Self {
        Self::new(FrameDriver::Manual, DEFAULT_CURSOR_SCALE)
    }
}

impl Drop for PlaybackSynchronizer {
    fn drop(&mut self) {
        self.halt_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Clock advanced by hand
    #[derive(Default)]
    struct StepClock {
        time: f64,
        duration: f64,
        paused: bool,
    }

    impl StepClock {
        fn shared(duration: f64) -> (Arc<Mutex<StepClock>>, SharedAudioSource) {
            let clock = Arc::new(Mutex::new(StepClock {
                time: 0.0,
                duration,
                paused: true,
            }));
            let source: SharedAudioSource = clock.clone();
            (clock, source)
        }
    }

    impl AudioClock for StepClock {
        fn play(&mut self) -> EngineResult<()> {
            self.paused = false;
            Ok(())
        }
        fn pause(&mut self) {
            self.paused = true;
        }
        fn seek(&mut self, seconds: f64) {
            self.time = seconds;
        }
        fn current_time(&self) -> f64 {
            self.time
        }
        fn is_paused(&self) -> bool {
            self.paused
        }
        fn is_ended(&self) -> bool {
            self.time >= self.duration
        }
        fn duration(&self) -> f64 {
            self.duration
        }
    }

    #[test]
    fn test_transport_state() {
        assert!(TransportState::Playing.is_playing());
        assert!(TransportState::Idle.is_stopped());
        assert!(TransportState::Paused.is_stopped());
        assert_eq!(TransportState::default(), TransportState::Idle);
    }

    #[test]
    fn test_stop_from_idle() {
        let mut sync = PlaybackSynchronizer::default();
        sync.stop();

        assert_eq!(sync.state(), TransportState::Idle);
        assert_eq!(sync.position(), 0.0);
        assert!(!sync.clock().running);
    }

    #[test]
    fn test_start_without_source() {
        let mut sync = PlaybackSynchronizer::default();
        assert!(matches!(sync.start(), Err(EngineError::Playback(_))));
    }

    #[test]
    fn test_frames_follow_clock() {
        let (clock, source) = StepClock::shared(4.0);
        let mut sync = PlaybackSynchronizer::default();
        sync.play(source).unwrap();
        assert_eq!(sync.state(), TransportState::Playing);

        clock.lock().unwrap().time = 1.5;
        assert_eq!(sync.frame(), FrameOutcome::Continue(75.0));
        assert_eq!(sync.position(), 75.0);

        clock.lock().unwrap().time = 4.0;
        assert_eq!(sync.frame(), FrameOutcome::Finished(200.0));
        assert_eq!(sync.state(), TransportState::Idle);
    }

    #[test]
    fn test_frame_after_stop_is_stale() {
        let (clock, source) = StepClock::shared(4.0);
        let mut sync = PlaybackSynchronizer::default();
        sync.play(source).unwrap();
        clock.lock().unwrap().time = 1.0;
        sync.frame();

        sync.stop();
        assert_eq!(sync.position(), 0.0);
        assert_eq!(clock.lock().unwrap().time, 0.0);
        assert!(clock.lock().unwrap().paused);

        clock.lock().unwrap().time = 2.0;
        assert_eq!(sync.frame(), FrameOutcome::Stale);
        assert_eq!(sync.position(), 0.0);
    }

    #[test]
    fn test_old_token_cannot_publish() {
        let (clock, source) = StepClock::shared(4.0);
        let mut sync = PlaybackSynchronizer::default();
        sync.play(source.clone()).unwrap();
        let old_token = sync.shared.active_token();

        sync.restart().unwrap();
        clock.lock().unwrap().time = 3.0;

        let outcome = run_frame(&source, &sync.shared, old_token, 50.0);
        assert_eq!(outcome, FrameOutcome::Stale);
        assert_eq!(sync.position(), 0.0);
    }

    #[test]
    fn test_pause_keeps_position() {
        let (clock, source) = StepClock::shared(4.0);
        let mut sync = PlaybackSynchronizer::default();
        sync.play(source).unwrap();
        clock.lock().unwrap().time = 2.0;

        sync.pause();
        assert_eq!(sync.state(), TransportState::Paused);
        assert_eq!(sync.position(), 100.0);
        assert_eq!(sync.frame(), FrameOutcome::Stale);

        sync.start().unwrap();
        assert_eq!(sync.state(), TransportState::Playing);
        assert_eq!(sync.frame(), FrameOutcome::Continue(100.0));
    }
}
