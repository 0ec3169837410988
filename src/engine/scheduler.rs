//! Lookahead playback scheduler.
//!
//! The transport is a cooperative polling loop, not a thread: a host timer
//! with ~25 ms resolution calls [`Sequencer::tick`] while playing, and each
//! tick schedules every step falling inside the next ~100 ms window against
//! the provider's clock. Already-scheduled automation runs sample-accurately
//! inside the provider no matter how much the host timer jitters; stopping
//! the transport only stops *future* scheduling, notes already dispatched
//! ring out naturally.
//!
//! Time grid: one step is a 1/32 note (`60 / bpm / 8` seconds). Rhythm
//! patterns are 1/16 grids, so only even steps land on pattern slots.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::provider::AudioProvider;
use crate::sequencing::{BlockContent, RhythmPattern, Track, TrackKind};
use crate::tuning::frequency;

/// How far ahead of the provider clock each tick schedules.
pub const SCHEDULE_AHEAD_SECS: f64 = 0.1;
/// Suggested host timer interval for calling [`Sequencer::tick`].
pub const TIMER_INTERVAL_MS: f64 = 25.0;
/// Velocity used for sequenced melodic notes.
pub const DEFAULT_VELOCITY: f64 = 0.8;

/// Steps per beat at 1/32 resolution.
const STEPS_PER_BEAT: f64 = 8.0;

/// The top-level transport: owns the tracks, the shared rhythm patterns,
/// and the musical clock.
pub struct Sequencer {
    provider: Rc<dyn AudioProvider>,
    tracks: Vec<Track>,
    patterns: HashMap<String, RhythmPattern>,
    bpm: f64,
    /// 0.0 (straight) to 1.0 (full swing).
    swing: f64,
    root_hz: f64,
    total_steps: usize,
    playing: bool,
    current_step: usize,
    next_event_time: f64,
    playhead: Option<Box<dyn FnMut(usize)>>,
}

impl Sequencer {
    pub fn new(provider: Rc<dyn AudioProvider>) -> Self {
        Self {
            provider,
            tracks: Vec::new(),
            patterns: HashMap::new(),
            bpm: 120.0,
            swing: 0.0,
            root_hz: 261.63, // C4
            total_steps: 128,
            playing: false,
            current_step: 0,
            next_event_time: 0.0,
            playhead: None,
        }
    }

    pub fn add_track(&mut self, track: Track) -> usize {
        self.tracks.push(track);
        self.tracks.len() - 1
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn track_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.tracks.get_mut(index)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Register a pattern under its own id, replacing any previous one.
    pub fn add_pattern(&mut self, pattern: RhythmPattern) {
        self.patterns.insert(pattern.id.clone(), pattern);
    }

    pub fn pattern(&self, id: &str) -> Option<&RhythmPattern> {
        self.patterns.get(id)
    }

    pub fn set_bpm(&mut self, bpm: f64) {
        self.bpm = bpm.max(1.0);
    }

    pub fn set_swing(&mut self, swing: f64) {
        self.swing = swing.clamp(0.0, 1.0);
    }

    pub fn set_root_hz(&mut self, root_hz: f64) {
        self.root_hz = root_hz;
    }

    pub fn set_total_steps(&mut self, total_steps: usize) {
        self.total_steps = total_steps.max(1);
    }

    /// Playhead notification, fired once per scheduled step.
    pub fn on_playhead(&mut self, callback: impl FnMut(usize) + 'static) {
        self.playhead = Some(Box::new(callback));
    }

    /// Seconds per 1/32-note step.
    pub fn step_duration(&self) -> f64 {
        60.0 / self.bpm / STEPS_PER_BEAT
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Arm the transport from step 0. The first step lands a beat of
    /// lookahead after "now" so the provider always has headroom.
    pub fn start(&mut self) {
        if self.playing {
            return;
        }
        self.playing = true;
        self.current_step = 0;
        self.next_event_time = self.provider.now() + SCHEDULE_AHEAD_SECS;
    }

    /// Stop scheduling. Notes already handed to the provider finish
    /// naturally; nothing is retroactively cancelled.
    pub fn stop(&mut self) {
        self.playing = false;
    }

    /// Stop and silence everything immediately. Session teardown path.
    pub fn shutdown(&mut self) {
        self.stop();
        for track in &mut self.tracks {
            track.all_notes_off();
        }
    }

    /// One wake of the polling loop: schedule every step due inside the
    /// lookahead window. Safe to call at any rate; does nothing while
    /// stopped.
    pub fn tick(&mut self) {
        if !self.playing {
            return;
        }
        while self.next_event_time < self.provider.now() + SCHEDULE_AHEAD_SECS {
            let (step, time) = (self.current_step, self.next_event_time);
            self.schedule_step(step, time);
            self.advance();
        }
    }

    fn advance(&mut self) {
        self.next_event_time += self.step_duration();
        self.current_step = (self.current_step + 1) % self.total_steps;
    }

    /// Swing delays the off-beat 1/16 position (`step % 4 == 2`) by up to
    /// two thirds of a 1/16 note.
    fn swung_time(&self, step: usize, time: f64) -> f64 {
        if step % 4 == 2 {
            time + self.step_duration() * 2.0 * self.swing * 0.33
        } else {
            time
        }
    }

    /// Schedule everything that sounds at `step` onto the provider clock
    /// around `time`.
    pub fn schedule_step(&mut self, step: usize, time: f64) {
        let time = self.swung_time(step, time);
        let step_duration = self.step_duration();
        let root_hz = self.root_hz;
        let any_solo = self.tracks.iter().any(|t| t.solo);

        let Self {
            tracks, patterns, ..
        } = self;

        for track in tracks.iter_mut() {
            if !track.audible(any_solo) {
                continue;
            }
            match track.kind() {
                TrackKind::Melodic => {
                    schedule_melodic(track, step, time, step_duration, root_hz);
                }
                TrackKind::Rhythmic => {
                    schedule_rhythmic(track, patterns, step, time);
                }
            }
        }

        if let Some(callback) = self.playhead.as_mut() {
            callback(step);
        }
    }
}

/// Collect and schedule the melodic notes due at `step`.
fn schedule_melodic(track: &mut Track, step: usize, time: f64, step_duration: f64, root_hz: f64) {
    // (frequency, start time, duration)
    let mut due: Vec<(f64, f64, f64)> = Vec::new();

    for block in track.blocks_starting_at(step) {
        let Some(notes) = block.notes() else { continue };

        match track.arpeggiator {
            Some(arp) => {
                for note in arp.expand(notes, block.length) {
                    due.push((
                        frequency(root_hz, note.coord),
                        time + note.offset_steps as f64 * step_duration,
                        note.length_steps as f64 * step_duration,
                    ));
                }
            }
            None => {
                let duration = block.length as f64 * step_duration;
                for &coord in notes {
                    due.push((frequency(root_hz, coord), time, duration));
                }
            }
        }
    }

    if due.is_empty() {
        return;
    }
    let Some(synth) = track.synth_mut() else {
        return;
    };
    for (freq, start, duration) in due {
        synth.schedule_note(freq, start, duration, DEFAULT_VELOCITY);
    }
}

/// Trigger the drum hits due at `step` from the pattern the covering block
/// references.
fn schedule_rhythmic(
    track: &mut Track,
    patterns: &HashMap<String, RhythmPattern>,
    step: usize,
    time: f64,
) {
    let mut hits: Vec<(String, f64)> = Vec::new();

    if let Some(block) = track.block_covering(step) {
        if let BlockContent::Pattern(pattern_id) = &block.content {
            match patterns.get(pattern_id.as_str()) {
                Some(pattern) if pattern.step_count > 0 => {
                    // Patterns loop at 1/16 resolution inside the 1/32 grid:
                    // only even local steps land on a pattern slot.
                    let local = (step - block.start_step) % (pattern.step_count * 2);
                    if local % 2 == 0 {
                        let pattern_step = local / 2;
                        for (instrument, row) in &pattern.events {
                            if let Some(&velocity) = row.get(&pattern_step) {
                                hits.push((instrument.clone(), velocity));
                            }
                        }
                    }
                }
                Some(_) => {}
                None => debug!(%pattern_id, "block references unknown pattern, skipping"),
            }
        }
    }

    if hits.is_empty() {
        return;
    }
    let Some(drums) = track.drums_mut() else {
        return;
    };
    for (instrument, velocity) in hits {
        drums.trigger(&instrument, time, velocity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::fake::{FakeProvider, ProviderEvent};
    use crate::sequencing::{Arpeggiator, Block};
    use crate::tuning::{LatticeAxis, LatticeCoord};
    use approx::assert_relative_eq;
    use std::cell::RefCell;

    fn fixture() -> (Rc<FakeProvider>, Sequencer) {
        let provider = Rc::new(FakeProvider::new());
        let seq = Sequencer::new(provider.clone() as Rc<dyn AudioProvider>);
        (provider, seq)
    }

    fn melodic_track_with_block(
        provider: &Rc<FakeProvider>,
        start_step: usize,
        length: usize,
        notes: Vec<LatticeCoord>,
    ) -> Track {
        let mut track = Track::melodic(provider.clone() as Rc<dyn AudioProvider>, "lead");
        track.blocks.push(Block::with_notes(start_step, length, notes));
        track
    }

    #[test]
    fn step_counter_wraps_at_total_steps() {
        let (_provider, mut seq) = fixture();
        seq.set_total_steps(128);
        assert_eq!(seq.current_step(), 0);
        for _ in 0..128 {
            seq.advance();
        }
        assert_eq!(seq.current_step(), 0);
    }

    #[test]
    fn tick_schedules_every_step_in_the_window() {
        let (provider, mut seq) = fixture();
        seq.set_bpm(150.0); // step duration = 0.05 s
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        seq.on_playhead(move |step| sink.borrow_mut().push(step));

        seq.start();
        seq.tick(); // window empty: first step is exactly at now + lookahead
        assert!(seen.borrow().is_empty());

        provider.advance(0.2);
        seq.tick(); // steps due at 0.10, 0.15, 0.20, 0.25
        assert_eq!(*seen.borrow(), vec![0, 1, 2, 3]);

        // A jittery double wake schedules nothing extra
        seq.tick();
        assert_eq!(seen.borrow().len(), 4);
    }

    #[test]
    fn tick_is_inert_while_stopped() {
        let (provider, mut seq) = fixture();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        seq.on_playhead(move |step| sink.borrow_mut().push(step));

        provider.advance(1.0);
        seq.tick();
        assert!(seen.borrow().is_empty());

        seq.start();
        provider.advance(0.1);
        seq.tick();
        assert!(!seen.borrow().is_empty());

        let scheduled = seen.borrow().len();
        seq.stop();
        provider.advance(1.0);
        seq.tick();
        assert_eq!(seen.borrow().len(), scheduled);
    }

    #[test]
    fn no_swing_leaves_times_untouched() {
        let (_provider, mut seq) = fixture();
        seq.set_swing(0.0);
        for step in 0..16 {
            assert_eq!(seq.swung_time(step, 3.0), 3.0);
        }
    }

    #[test]
    fn full_swing_delays_offbeat_sixteenths() {
        let (_provider, mut seq) = fixture();
        seq.set_swing(1.0);
        let delay = seq.step_duration() * 2.0 * 0.33;

        for step in 0..16 {
            let expected = if step % 4 == 2 { 3.0 + delay } else { 3.0 };
            assert_relative_eq!(seq.swung_time(step, 3.0), expected);
        }
    }

    #[test]
    fn melodic_block_triggers_at_its_start_step_only() {
        let (provider, mut seq) = fixture();
        let track = melodic_track_with_block(&provider, 4, 8, vec![LatticeCoord::ORIGIN]);
        seq.add_track(track);

        seq.schedule_step(3, 1.0);
        assert!(provider.start_times().is_empty());

        seq.schedule_step(4, 1.0);
        // The stock patch has two tracked oscillators
        assert_eq!(provider.start_times(), vec![1.0, 1.0]);

        // Steps inside the block but past its start do not retrigger
        provider.clear_events();
        seq.schedule_step(5, 1.0625);
        assert!(provider.start_times().is_empty());
    }

    #[test]
    fn melodic_notes_resolve_through_the_lattice() {
        let (provider, mut seq) = fixture();
        seq.set_root_hz(261.63);
        let fifth = LatticeCoord::on_axis(1, 0, LatticeAxis::Third);
        let track = melodic_track_with_block(&provider, 0, 4, vec![fifth]);
        seq.add_track(track);

        seq.schedule_step(0, 0.5);

        // Both tracked oscillators get the resolved pitch; the filter's
        // cutoff writes to `frequency` too, so count only the pitch writes.
        let pitch_writes = provider
            .events()
            .iter()
            .filter(|e| {
                matches!(e, ProviderEvent::ValueSet { param, value }
                    if param.name == "frequency" && (*value - 261.63 * 1.5).abs() < 1e-9)
            })
            .count();
        assert_eq!(pitch_writes, 2);
    }

    #[test]
    fn arpeggiated_block_staggers_starts_and_durations() {
        let (provider, mut seq) = fixture();
        seq.set_bpm(120.0); // step duration 0.0625
        let notes = vec![
            LatticeCoord::on_axis(0, 0, LatticeAxis::Third),
            LatticeCoord::on_axis(1, 0, LatticeAxis::Third),
            LatticeCoord::on_axis(2, 0, LatticeAxis::Third),
        ];
        let mut track = melodic_track_with_block(&provider, 0, 4, notes);
        track.arpeggiator = Some(Arpeggiator {
            division: 1,
            octaves: 1,
        });
        seq.add_track(track);

        seq.schedule_step(0, 2.0);

        let step = seq.step_duration();
        let mut starts = provider.start_times();
        starts.dedup(); // two sources per voice share the start time
        assert_eq!(starts.len(), 3);
        assert_relative_eq!(starts[0], 2.0);
        assert_relative_eq!(starts[1], 2.0 + step);
        assert_relative_eq!(starts[2], 2.0 + 2.0 * step);
    }

    #[test]
    fn rhythmic_block_plays_covering_pattern_on_even_steps() {
        let (provider, mut seq) = fixture();
        seq.add_pattern(RhythmPattern::basic_rock());
        let mut track = Track::rhythmic(provider.clone() as Rc<dyn AudioProvider>, "drums");
        track.blocks.push(Block::rhythmic(0, 64, "basic-rock"));
        seq.add_track(track);
        provider.clear_events();

        // Pattern step 0: Kick + HiHat
        seq.schedule_step(0, 1.0);
        assert_eq!(provider.start_times(), vec![1.0, 1.0]);

        // Odd 1/32 steps fall between pattern slots
        provider.clear_events();
        seq.schedule_step(1, 1.1);
        assert!(provider.start_times().is_empty());

        // Pattern step 4 (sequencer step 8): Snare + HiHat
        provider.clear_events();
        seq.schedule_step(8, 1.5);
        assert_eq!(provider.start_times().len(), 2);
    }

    #[test]
    fn rhythmic_pattern_loops_independently_of_block_length() {
        let (provider, mut seq) = fixture();
        seq.add_pattern(RhythmPattern::basic_rock());
        let mut track = Track::rhythmic(provider.clone() as Rc<dyn AudioProvider>, "drums");
        track.blocks.push(Block::rhythmic(0, 128, "basic-rock"));
        seq.add_track(track);
        provider.clear_events();

        // 16-slot pattern wraps every 32 sequencer steps
        seq.schedule_step(32, 4.0);
        assert_eq!(provider.start_times().len(), 2); // Kick + HiHat again
    }

    #[test]
    fn unknown_pattern_id_is_silent() {
        let (provider, mut seq) = fixture();
        let mut track = Track::rhythmic(provider.clone() as Rc<dyn AudioProvider>, "drums");
        track.blocks.push(Block::rhythmic(0, 32, "no-such-pattern"));
        seq.add_track(track);
        provider.clear_events();

        seq.schedule_step(0, 1.0);
        assert!(provider.start_times().is_empty());
    }

    #[test]
    fn mute_and_solo_filter_tracks() {
        let (provider, mut seq) = fixture();
        let lead = melodic_track_with_block(&provider, 0, 4, vec![LatticeCoord::ORIGIN]);
        let pad = melodic_track_with_block(&provider, 0, 4, vec![LatticeCoord::ORIGIN]);
        let lead_idx = seq.add_track(lead);
        let pad_idx = seq.add_track(pad);
        provider.clear_events();

        seq.schedule_step(0, 1.0);
        assert_eq!(provider.start_times().len(), 4); // both tracks, two vcos each

        seq.track_mut(pad_idx).unwrap().mute = true;
        provider.clear_events();
        seq.schedule_step(0, 2.0);
        assert_eq!(provider.start_times().len(), 2);

        seq.track_mut(pad_idx).unwrap().mute = false;
        seq.track_mut(lead_idx).unwrap().solo = true;
        provider.clear_events();
        seq.schedule_step(0, 3.0);
        assert_eq!(provider.start_times().len(), 2); // solo wins over the pad
    }

    #[test]
    fn start_resets_and_anchors_ahead_of_now() {
        let (provider, mut seq) = fixture();
        provider.advance(5.0);
        seq.start();
        assert!(seq.is_playing());
        assert_eq!(seq.current_step(), 0);
        assert_relative_eq!(seq.next_event_time, 5.0 + SCHEDULE_AHEAD_SECS);
    }

    #[test]
    fn empty_steps_are_noops_but_still_report_playhead() {
        let (provider, mut seq) = fixture();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        seq.on_playhead(move |step| sink.borrow_mut().push(step));

        seq.schedule_step(42, 1.0);
        assert_eq!(*seen.borrow(), vec![42]);
        assert!(provider.start_times().is_empty());
    }
}
