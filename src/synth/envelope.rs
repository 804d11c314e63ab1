// ADSR envelope
//
// The offline renderer knows every note's length up front, so the envelope is
// evaluated directly from the time since the note started rather than stepped
// sample by sample.

/// ADSR Envelope parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdsrParams {
    /// Attack time in seconds (0.001 to 5.0)
    pub attack: f32,
    /// Decay time in seconds (0.001 to 5.0)
    pub decay: f32,
    /// Sustain level (0.0 to 1.0)
    pub sustain: f32,
    /// Release time in seconds (0.001 to 5.0)
    pub release: f32,
}

impl AdsrParams {
    /// Create ADSR parameters with validation
    pub fn new(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self {
            attack: attack.clamp(0.001, 5.0),
            decay: decay.clamp(0.001, 5.0),
            sustain: sustain.clamp(0.0, 1.0),
            release: release.clamp(0.001, 5.0),
        }
    }

    /// Level while the key is held, `elapsed` seconds after note-on
    fn held_level(&self, elapsed: f32) -> f32 {
        if elapsed < self.attack {
            elapsed / self.attack
        } else if elapsed < self.attack + self.decay {
            let progress = (elapsed - self.attack) / self.decay;
            1.0 - progress * (1.0 - self.sustain)
        } else {
            self.sustain
        }
    }

    /// Amplitude `elapsed` seconds after note-on for a key held `held` seconds
    ///
    /// The release starts from wherever the envelope was at note-off, so short
    /// notes that never reach sustain fade out without a click.
    pub fn amplitude(&self, elapsed: f32, held: f32) -> f32 {
        if elapsed < 0.0 {
            return 0.0;
        }
        if elapsed < held {
            return self.held_level(elapsed);
        }

        let since_release = elapsed - held;
        if since_release >= self.release {
            return 0.0;
        }
        self.held_level(held) * (1.0 - since_release / self.release)
    }

    /// Total sounding time of a note held `held` seconds, release included
    pub fn sounding_time(&self, held: f32) -> f32 {
        held.max(0.0) + self.release
    }
}

impl Default for AdsrParams {
    fn default() -> Self {
        Self {
            attack: 0.01, // 10ms attack
            decay: 0.1,   // 100ms decay
            sustain: 0.7, // 70% sustain level
            release: 0.2, // 200ms release
        }
    }
}
