// Audio Export - Offline rendering of a note list to WAV
//
// Unlike a real-time callback this renders as fast as possible: each note is
// synthesized straight into a mix buffer, then the buffer is soft-clipped and
// written out as 16-bit PCM.

use crate::collaborator::AudioRenderer;
use crate::error::CollaboratorError;
use crate::sequencer::note::Note;
use crate::sequencer::timeline::Tempo;
use crate::synth::{AdsrParams, Oscillator, SimpleOscillator, WaveformType};
use hound::{WavSpec, WavWriter};
use std::io::Cursor;

/// Audio export settings
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    /// Sample rate (Hz)
    pub sample_rate: u32,
    pub waveform: WaveformType,
    pub envelope: AdsrParams,
    /// Per-note amplitude before clipping
    pub gain: f32,
    /// Longest clip this renderer will produce, in seconds
    pub max_seconds: f64,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            waveform: WaveformType::Triangle,
            envelope: AdsrParams::default(),
            gain: 0.3,
            max_seconds: 600.0,
        }
    }
}

/// Renders notes with a simple oscillator voice per note
#[derive(Debug, Clone, Default)]
pub struct SynthRenderer {
    settings: ExportSettings,
}

impl SynthRenderer {
    pub fn new(settings: ExportSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Mono mix of the notes, soft-clipped to [-1, 1]
    ///
    /// The buffer runs until the last release has faded out. A clip longer
    /// than `max_seconds` is refused before anything is allocated.
    pub fn render_samples(&self, notes: &[Note], tempo: Tempo) -> Result<Vec<f32>, CollaboratorError> {
        let sample_rate = self.settings.sample_rate as f32;
        let envelope = self.settings.envelope;

        let total_seconds = notes
            .iter()
            .map(|n| tempo.beats_to_seconds(n.end_time) as f32 + envelope.release)
            .fold(0.0_f32, f32::max);
        if total_seconds as f64 > self.settings.max_seconds {
            return Err(CollaboratorError::Rejected(format!(
                "clip of {:.1}s exceeds the {:.1}s render limit",
                total_seconds, self.settings.max_seconds
            )));
        }
        let mut mix = vec![0.0_f32; (total_seconds * sample_rate).ceil() as usize];

        for note in notes {
            let start = (tempo.beats_to_seconds(note.start_time) as f32 * sample_rate).round() as usize;
            let held = tempo.beats_to_seconds(note.duration()) as f32;
            let length = (envelope.sounding_time(held) * sample_rate).ceil() as usize;

            let mut osc =
                SimpleOscillator::for_pitch(self.settings.waveform, sample_rate, note.pitch);
            for (k, slot) in mix.iter_mut().skip(start).take(length).enumerate() {
                let t = k as f32 / sample_rate;
                *slot += osc.next_sample() * envelope.amplitude(t, held) * self.settings.gain;
            }
        }

        for sample in &mut mix {
            *sample = sample.tanh();
        }
        Ok(mix)
    }

    /// Render the notes to WAV bytes (mono, 16-bit)
    pub fn render_wav(&self, notes: &[Note], tempo: Tempo) -> Result<Vec<u8>, CollaboratorError> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: self.settings.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let samples = self.render_samples(notes, tempo)?;
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec)
                .map_err(|e| CollaboratorError::Storage(format!("Failed to start WAV: {}", e)))?;
            for sample in samples {
                writer
                    .write_sample((sample * i16::MAX as f32) as i16)
                    .map_err(|e| {
                        CollaboratorError::Storage(format!("Failed to write sample: {}", e))
                    })?;
            }
            writer
                .finalize()
                .map_err(|e| CollaboratorError::Storage(format!("Failed to finalize WAV: {}", e)))?;
        }

        log::debug!(
            "Rendered {} notes to {} bytes of audio",
            notes.len(),
            cursor.get_ref().len()
        );
        Ok(cursor.into_inner())
    }
}

impl AudioRenderer for SynthRenderer {
    fn render_audio(&self, notes: &[Note], tempo: Tempo) -> Result<Vec<u8>, CollaboratorError> {
        self.render_wav(notes, tempo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::timing::{AudioClock, WavClip};

    #[test]
    fn test_export_settings_default() {
        let settings = ExportSettings::default();
        assert_eq!(settings.sample_rate, 44100);
        assert_eq!(settings.waveform, WaveformType::Triangle);
    }

    #[test]
    fn test_render_length_includes_release() {
        let renderer = SynthRenderer::default();
        // One beat at 120 BPM = 0.5s, plus 0.2s release
        let samples = renderer
            .render_samples(&[Note::new(60, 0.0, 1.0)], Tempo::default())
            .unwrap();

        assert_eq!(samples.len(), (0.7_f32 * 44100.0).ceil() as usize);
        assert!(samples.iter().all(|s| (-1.0..=1.0).contains(s)));
        assert!(samples.iter().any(|s| s.abs() > 0.01));
    }

    #[test]
    fn test_empty_notes_render_empty_clip() {
        let renderer = SynthRenderer::default();
        assert!(renderer.render_samples(&[], Tempo::default()).unwrap().is_empty());

        let wav = renderer.render_wav(&[], Tempo::default()).unwrap();
        let clip = WavClip::from_wav_bytes(wav).unwrap();
        assert_eq!(clip.duration(), 0.0);
    }

    #[test]
    fn test_wav_duration_matches_tempo() {
        let renderer = SynthRenderer::new(ExportSettings {
            sample_rate: 8000,
            ..ExportSettings::default()
        });
        let notes = [Note::new(60, 0.0, 1.0), Note::new(64, 1.0, 2.0)];
        let wav = renderer.render_audio(&notes, Tempo::new(60.0).unwrap()).unwrap();

        let clip = WavClip::from_wav_bytes(wav).unwrap();
        assert!((clip.duration() - 2.2).abs() < 0.001);
    }

    #[test]
    fn test_far_note_is_refused() {
        let renderer = SynthRenderer::default();
        let notes = [Note::new(60, 1.0e5, 1.0e5 + 1.0)];

        let result = renderer.render_samples(&notes, Tempo::default());
        assert!(matches!(result, Err(CollaboratorError::Rejected(_))));
        assert!(matches!(
            renderer.render_audio(&notes, Tempo::default()),
            Err(CollaboratorError::Rejected(_))
        ));
    }

    #[test]
    fn test_render_limit_is_configurable() {
        let renderer = SynthRenderer::new(ExportSettings {
            sample_rate: 8000,
            max_seconds: 1.0,
            ..ExportSettings::default()
        });

        // 1.5 beats at 120 BPM = 0.75s, plus 0.2s release
        assert!(renderer.render_samples(&[Note::new(60, 0.0, 1.5)], Tempo::default()).is_ok());
        assert!(renderer.render_samples(&[Note::new(60, 0.0, 2.0)], Tempo::default()).is_err());
    }
}
