//! Synthesizer: patch ownership and voice management.
//!
//! A `Synthesizer` owns the active [`Patch`] plus a shared output bus, and
//! spawns one [`Voice`] per triggered note. Patch replacement is wholesale:
//! each voice is built from the `Rc<Patch>` snapshot taken at trigger time,
//! so editing or importing a patch never disturbs notes already sounding.

use std::rc::Rc;

use tracing::warn;

use crate::patch::Patch;
use crate::provider::{AudioNode, AudioProvider, NodeHandle};

pub mod drums;
pub mod envelope;
pub mod voice;

pub use drums::DrumMachine;
pub use envelope::AdsrEnvelope;
pub use voice::{Voice, VoiceState};

struct VoiceSlot {
    /// Held-note key for the live keyboard path; sequencer notes are None.
    freq_key: Option<u64>,
    voice: Voice,
}

pub struct Synthesizer {
    provider: Rc<dyn AudioProvider>,
    patch: Rc<Patch>,
    output: NodeHandle,
    voices: Vec<VoiceSlot>,
}

impl Synthesizer {
    /// Create a synthesizer with the stock patch. The output bus starts
    /// unconnected; call [`connect`](Self::connect) to wire it somewhere.
    pub fn new(provider: Rc<dyn AudioProvider>) -> Self {
        Self::with_patch(provider, Patch::default_voice())
    }

    pub fn with_patch(provider: Rc<dyn AudioProvider>, patch: Patch) -> Self {
        let output = provider.create_gain();
        Self {
            provider,
            patch: Rc::new(patch),
            output,
            voices: Vec::new(),
        }
    }

    /// Connect the output bus to `target` (another node or the destination).
    pub fn connect(&self, target: &dyn AudioNode) {
        self.output.connect(target);
    }

    pub fn output(&self) -> &NodeHandle {
        &self.output
    }

    pub fn set_volume(&self, volume: f64) {
        if let Some(gain) = self.output.param("gain") {
            gain.set_value(volume);
        }
    }

    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    /// Replace the patch wholesale. Voices already built keep their snapshot.
    pub fn set_patch(&mut self, patch: Patch) {
        self.patch = Rc::new(patch);
    }

    /// Import a patch from its JSON wire form.
    ///
    /// Structural problems (duplicate ids, dangling connections) are logged
    /// but do not reject the import; voice building skips them per
    /// connection.
    pub fn import_patch(&mut self, json: &str) -> serde_json::Result<()> {
        let patch = Patch::from_json(json)?;
        if let Err(problems) = patch.validate() {
            for problem in problems {
                warn!(%problem, "imported patch has structural problems");
            }
        }
        self.set_patch(patch);
        Ok(())
    }

    pub fn export_patch(&self) -> serde_json::Result<String> {
        self.patch.to_json()
    }

    /// Sequencer path: build a voice from the current patch snapshot and
    /// schedule the whole note (trigger plus release) atomically.
    pub fn schedule_note(&mut self, frequency: f64, time: f64, duration: f64, velocity: f64) {
        self.reap();
        let patch = Rc::clone(&self.patch);
        let mut voice = Voice::build(self.provider.as_ref(), &patch, frequency, &self.output);
        voice.schedule_fixed_duration(time, duration, velocity);
        self.voices.push(VoiceSlot {
            freq_key: None,
            voice,
        });
    }

    /// Live keyboard path: start a note now and hold it until
    /// [`note_off`](Self::note_off). Retriggering a pitch that is still
    /// held cuts the old voice immediately instead of layering.
    pub fn note_on(&mut self, frequency: f64, velocity: f64) {
        self.reap();
        let now = self.provider.now();
        let key = frequency.to_bits();

        for slot in &mut self.voices {
            if slot.freq_key == Some(key) && slot.voice.state() == VoiceState::Sounding {
                slot.voice.stop_now(now);
            }
        }

        let patch = Rc::clone(&self.patch);
        let mut voice = Voice::build(self.provider.as_ref(), &patch, frequency, &self.output);
        voice.trigger(now, velocity);
        self.voices.push(VoiceSlot {
            freq_key: Some(key),
            voice,
        });
    }

    /// Release the held voice for `frequency`, if any.
    pub fn note_off(&mut self, frequency: f64) {
        let now = self.provider.now();
        let key = frequency.to_bits();
        for slot in &mut self.voices {
            if slot.freq_key == Some(key) && slot.voice.state() == VoiceState::Sounding {
                slot.voice.release(now);
            }
        }
    }

    /// Panic: cut every voice immediately, no release tails.
    pub fn all_notes_off(&mut self) {
        let now = self.provider.now();
        for slot in &mut self.voices {
            slot.voice.stop_now(now);
        }
        self.reap();
    }

    pub fn active_voices(&self) -> usize {
        self.voices
            .iter()
            .filter(|s| !matches!(s.voice.state(), VoiceState::Disposed))
            .count()
    }

    /// Drop voices whose release tails have fully passed, disconnecting
    /// their provider nodes. Nodes are never reused.
    fn reap(&mut self) {
        let now = self.provider.now();
        for slot in &mut self.voices {
            if slot.voice.is_finished(now) && slot.voice.state() != VoiceState::Disposed {
                slot.voice.dispose();
            }
        }
        self.voices
            .retain(|s| !matches!(s.voice.state(), VoiceState::Disposed));
    }
}
