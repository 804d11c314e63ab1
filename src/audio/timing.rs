// Audio clock - Where a playing clip currently is
// The playback synchronizer reads this every frame to move the cursor

use crate::error::{EngineError, EngineResult};
use std::io::Cursor;
use std::time::Instant;

/// A playable audio source that reports its own position
///
/// Implementations are driven from the host thread and read from the frame
/// loop, behind a mutex.
pub trait AudioClock: Send {
    /// Start or resume output
    fn play(&mut self) -> EngineResult<()>;

    /// Stop output, keeping the position
    fn pause(&mut self);

    /// Move the position, in seconds
    fn seek(&mut self, seconds: f64);

    /// Position in seconds since the start of the clip
    fn current_time(&self) -> f64;

    fn is_paused(&self) -> bool;

    /// Whether the clip has played through to its end
    fn is_ended(&self) -> bool;

    /// Length of the clip in seconds
    fn duration(&self) -> f64;
}

/// Rendered WAV clip timed against the wall clock
///
/// Nothing is sent to a device; the clip only keeps time as if it were
/// playing, which is what the cursor needs.
#[derive(Debug, Clone)]
pub struct WavClip {
    bytes: Vec<u8>,
    sample_rate: u32,
    duration: f64,
    /// Position at the last pause or seek
    offset: f64,
    started_at: Option<Instant>,
}

impl WavClip {
    /// Read the header of WAV bytes to find the clip length
    pub fn from_wav_bytes(bytes: Vec<u8>) -> EngineResult<Self> {
        let (spec, frames) = {
            let reader = hound::WavReader::new(Cursor::new(bytes.as_slice()))
                .map_err(|e| EngineError::Playback(format!("Unreadable audio: {}", e)))?;
            (reader.spec(), reader.duration())
        };
        if spec.sample_rate == 0 {
            return Err(EngineError::Playback(
                "Audio declares a zero sample rate".to_string(),
            ));
        }
        let duration = frames as f64 / spec.sample_rate as f64;

        Ok(Self {
            sample_rate: spec.sample_rate,
            bytes,
            duration,
            offset: 0.0,
            started_at: None,
        })
    }

    /// The WAV data this clip was built from
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl AudioClock for WavClip {
    fn play(&mut self) -> EngineResult<()> {
        if self.started_at.is_none() {
            if self.is_ended() {
                self.offset = 0.0;
            }
            self.started_at = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.offset = self.current_time();
        self.started_at = None;
    }

    fn seek(&mut self, seconds: f64) {
        self.offset = seconds.clamp(0.0, self.duration);
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }

    fn current_time(&self) -> f64 {
        let elapsed = self
            .started_at
            .map(|start| start.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        (self.offset + elapsed).min(self.duration)
    }

    fn is_paused(&self) -> bool {
        self.started_at.is_none()
    }

    fn is_ended(&self) -> bool {
        self.current_time() >= self.duration
    }

    fn duration(&self) -> f64 {
        self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silent_wav(seconds: f64, sample_rate: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            let frames = (seconds * sample_rate as f64) as usize;
            for _ in 0..frames {
                writer.write_sample(0i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_clip_duration() {
        let clip = WavClip::from_wav_bytes(silent_wav(0.5, 8000)).unwrap();
        assert!((clip.duration() - 0.5).abs() < 1e-9);
        assert_eq!(clip.sample_rate(), 8000);
        assert!(clip.is_paused());
        assert_eq!(clip.current_time(), 0.0);
    }

    #[test]
    fn test_seek_and_pause_keep_position() {
        let mut clip = WavClip::from_wav_bytes(silent_wav(2.0, 8000)).unwrap();
        clip.seek(1.25);
        assert_eq!(clip.current_time(), 1.25);

        clip.play().unwrap();
        assert!(!clip.is_paused());
        clip.pause();
        assert!(clip.current_time() >= 1.25);

        clip.seek(10.0);
        assert_eq!(clip.current_time(), 2.0);
        assert!(clip.is_ended());
    }

    #[test]
    fn test_play_after_end_starts_over() {
        let mut clip = WavClip::from_wav_bytes(silent_wav(1.0, 8000)).unwrap();
        clip.seek(1.0);
        assert!(clip.is_ended());

        clip.play().unwrap();
        assert!(clip.current_time() < 1.0);
    }

    #[test]
    fn test_rejects_non_wav_bytes() {
        let result = WavClip::from_wav_bytes(b"MThd".to_vec());
        assert!(matches!(result, Err(EngineError::Playback(_))));
    }
}
