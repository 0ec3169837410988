//! Fixed four-piece drum machine.
//!
//! Each instrument is a private, effect-less [`Synthesizer`] with a small
//! hand-written patch, mixed through a master gain into a bus compressor.
//! Rhythm patterns address instruments by name; an unknown name is a no-op
//! rather than an error so pattern data can never stall the transport.

use std::rc::Rc;

use crate::patch::{Connection, NodeKind, NodeSpec, Patch};
use crate::provider::{AudioNode, AudioProvider, NodeHandle};
use crate::synth::Synthesizer;

/// The instrument names rhythm patterns can address.
pub const INSTRUMENTS: [&str; 4] = ["Kick", "Snare", "HiHat", "OpenHat"];

struct Instrument {
    name: &'static str,
    /// Fixed trigger pitch; drum voices are tuned by their patch, not the
    /// lattice.
    pitch_hz: f64,
    synth: Synthesizer,
}

pub struct DrumMachine {
    provider: Rc<dyn AudioProvider>,
    master: NodeHandle,
    compressor: NodeHandle,
    instruments: Vec<Instrument>,
}

impl DrumMachine {
    pub fn new(provider: Rc<dyn AudioProvider>) -> Self {
        let master = provider.create_gain();
        if let Some(gain) = master.param("gain") {
            gain.set_value(0.8);
        }

        // Gentle glue compression on the drum bus
        let compressor = provider.create_compressor();
        if let Some(threshold) = compressor.param("threshold") {
            threshold.set_value(-18.0);
        }
        if let Some(ratio) = compressor.param("ratio") {
            ratio.set_value(4.0);
        }
        master.connect(compressor.as_ref());

        let mut machine = Self {
            provider,
            master,
            compressor,
            instruments: Vec::new(),
        };
        machine.add_instrument("Kick", 80.0, 1.5, kick_patch());
        machine.add_instrument("Snare", 200.0, 0.8, snare_patch());
        machine.add_instrument("HiHat", 1_000.0, 0.6, hat_patch(5_000.0, 0.05, 0.05));
        machine.add_instrument("OpenHat", 1_000.0, 0.6, hat_patch(4_000.0, 0.3, 0.1));
        machine
    }

    fn add_instrument(&mut self, name: &'static str, pitch_hz: f64, volume: f64, patch: Patch) {
        let synth = Synthesizer::with_patch(Rc::clone(&self.provider), patch);
        synth.set_volume(volume);
        synth.connect(self.master.as_ref());
        self.instruments.push(Instrument {
            name,
            pitch_hz,
            synth,
        });
    }

    /// Connect the drum bus output to `target`.
    pub fn connect(&self, target: &dyn AudioNode) {
        self.compressor.connect(target);
    }

    pub fn set_volume(&self, volume: f64) {
        if let Some(gain) = self.master.param("gain") {
            gain.set_value(volume);
        }
    }

    /// Schedule one hit of `instrument` at `time`. Unknown names do nothing.
    pub fn trigger(&mut self, instrument: &str, time: f64, velocity: f64) {
        let Some(inst) = self.instruments.iter_mut().find(|i| i.name == instrument) else {
            return;
        };
        // Every drum patch has a zero-sustain envelope, so a fixed window
        // comfortably covers the hit.
        inst.synth.schedule_note(inst.pitch_hz, time, 0.5, velocity);
    }

    /// Cut every instrument immediately.
    pub fn all_notes_off(&mut self) {
        for inst in &mut self.instruments {
            inst.synth.all_notes_off();
        }
    }
}

fn kick_patch() -> Patch {
    Patch::new(
        vec![
            NodeSpec::new("vco", NodeKind::Oscillator)
                .param("type", "triangle")
                .freq_track(true),
            NodeSpec::new("vcf", NodeKind::BiquadFilter)
                .param("type", "lowpass")
                .param("frequency", 100.0)
                .param("q", 0.0),
            NodeSpec::new("vca", NodeKind::Gain).param("gain", 0.0),
            NodeSpec::new("env", NodeKind::Adsr)
                .param("attack", 0.01)
                .param("decay", 0.2)
                .param("sustain", 0.0)
                .param("release", 0.1),
        ],
        drum_connections(),
    )
}

fn snare_patch() -> Patch {
    Patch::new(
        vec![
            NodeSpec::new("vco", NodeKind::Noise).param("type", "white"),
            NodeSpec::new("vcf", NodeKind::BiquadFilter)
                .param("type", "bandpass")
                .param("frequency", 1_000.0)
                .param("q", 2.0),
            NodeSpec::new("vca", NodeKind::Gain).param("gain", 0.0),
            NodeSpec::new("env", NodeKind::Adsr)
                .param("attack", 0.01)
                .param("decay", 0.15)
                .param("sustain", 0.0)
                .param("release", 0.1),
        ],
        drum_connections(),
    )
}

fn hat_patch(cutoff_hz: f64, decay: f64, release: f64) -> Patch {
    Patch::new(
        vec![
            NodeSpec::new("vco", NodeKind::Noise).param("type", "white"),
            NodeSpec::new("vcf", NodeKind::BiquadFilter)
                .param("type", "highpass")
                .param("frequency", cutoff_hz)
                .param("q", 0.0),
            NodeSpec::new("vca", NodeKind::Gain).param("gain", 0.0),
            NodeSpec::new("env", NodeKind::Adsr)
                .param("attack", 0.02)
                .param("decay", decay)
                .param("sustain", 0.0)
                .param("release", release),
        ],
        drum_connections(),
    )
}

fn drum_connections() -> Vec<Connection> {
    vec![
        Connection::new("vco", "vcf"),
        Connection::new("vcf", "vca"),
        Connection::new("vca", "out"),
        Connection::new("env", "vca.gain"),
    ]
}
