//! Recording fake provider.
//!
//! Implements the full [`AudioProvider`] capability set without making any
//! sound: every call is appended to a shared event log and the clock only
//! moves when a test advances it. This is how the scheduler, voices, and
//! envelopes are tested — feed a fake clock, tick, and assert on the exact
//! automation the host would have received.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use super::{AudioNode, AudioParam, AudioProvider, NodeHandle, NodeId, ParamHandle, ParamRef};

/// One recorded provider call.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    Created { node: NodeId, kind: &'static str },
    Connected { from: NodeId, to: NodeId },
    ConnectedParam { from: NodeId, to: ParamRef },
    Disconnected { node: NodeId },
    Started { node: NodeId, time: f64 },
    Stopped { node: NodeId, time: f64 },
    AttributeSet { node: NodeId, name: String, value: String },
    ValueSet { param: ParamRef, value: f64 },
    SetValueAtTime { param: ParamRef, value: f64, time: f64 },
    LinearRamp { param: ParamRef, value: f64, time: f64 },
    ExponentialRamp { param: ParamRef, value: f64, time: f64 },
    CancelScheduled { param: ParamRef, time: f64 },
}

#[derive(Default)]
struct Log {
    events: Vec<ProviderEvent>,
}

/// A fake host audio engine with a manually advanced clock.
pub struct FakeProvider {
    time: Cell<f64>,
    next_id: Cell<u64>,
    log: Rc<RefCell<Log>>,
    destination: RefCell<Option<NodeHandle>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            time: Cell::new(0.0),
            next_id: Cell::new(0),
            log: Rc::new(RefCell::new(Log::default())),
            destination: RefCell::new(None),
        }
    }

    /// Move the clock forward by `secs`.
    pub fn advance(&self, secs: f64) {
        self.time.set(self.time.get() + secs);
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<ProviderEvent> {
        self.log.borrow().events.clone()
    }

    /// Drop all recorded events (keeps the clock and existing nodes).
    pub fn clear_events(&self) {
        self.log.borrow_mut().events.clear();
    }

    /// All `start` times recorded, in call order.
    pub fn start_times(&self) -> Vec<f64> {
        self.log
            .borrow()
            .events
            .iter()
            .filter_map(|e| match e {
                ProviderEvent::Started { time, .. } => Some(*time),
                _ => None,
            })
            .collect()
    }

    /// Automation events targeting the parameter `name` on any node.
    pub fn automation_for(&self, name: &str) -> Vec<ProviderEvent> {
        self.log
            .borrow()
            .events
            .iter()
            .filter(|e| {
                matches!(e,
                    ProviderEvent::SetValueAtTime { param, .. }
                    | ProviderEvent::LinearRamp { param, .. }
                    | ProviderEvent::ExponentialRamp { param, .. }
                    | ProviderEvent::CancelScheduled { param, .. }
                        if param.name == name)
            })
            .cloned()
            .collect()
    }

    fn create(&self, kind: &'static str, params: &[(&'static str, f64)]) -> NodeHandle {
        let id = NodeId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let node = FakeNode {
            id,
            kind,
            log: Rc::clone(&self.log),
            params: params
                .iter()
                .map(|&(name, default)| {
                    let param: ParamHandle = Rc::new(FakeParam {
                        node: id,
                        name,
                        value: Cell::new(default),
                        log: Rc::clone(&self.log),
                    });
                    (name, param)
                })
                .collect(),
        };
        self.log
            .borrow_mut()
            .events
            .push(ProviderEvent::Created { node: id, kind });
        Rc::new(node)
    }
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioProvider for FakeProvider {
    fn now(&self) -> f64 {
        self.time.get()
    }

    fn create_oscillator(&self) -> NodeHandle {
        self.create("oscillator", &[("frequency", 440.0), ("detune", 0.0)])
    }

    fn create_noise(&self) -> NodeHandle {
        self.create("noise", &[])
    }

    fn create_constant(&self) -> NodeHandle {
        self.create("constant", &[("offset", 1.0)])
    }

    fn create_biquad_filter(&self) -> NodeHandle {
        self.create(
            "biquad_filter",
            &[("frequency", 350.0), ("q", 1.0), ("detune", 0.0), ("gain", 0.0)],
        )
    }

    fn create_comb_filter(&self) -> NodeHandle {
        self.create("comb_filter", &[("frequency", 440.0), ("q", 0.0)])
    }

    fn create_gain(&self) -> NodeHandle {
        self.create("gain", &[("gain", 1.0)])
    }

    fn create_delay(&self, _max_delay_secs: f64) -> NodeHandle {
        self.create("delay", &[("delayTime", 0.0)])
    }

    fn create_convolver(&self) -> NodeHandle {
        self.create("convolver", &[])
    }

    fn create_compressor(&self) -> NodeHandle {
        self.create(
            "compressor",
            &[
                ("threshold", -24.0),
                ("knee", 30.0),
                ("ratio", 12.0),
                ("attack", 0.003),
                ("release", 0.25),
            ],
        )
    }

    fn create_analyser(&self) -> NodeHandle {
        self.create("analyser", &[])
    }

    fn destination(&self) -> NodeHandle {
        if let Some(dest) = self.destination.borrow().as_ref() {
            return Rc::clone(dest);
        }
        let dest = self.create("destination", &[]);
        *self.destination.borrow_mut() = Some(Rc::clone(&dest));
        dest
    }
}

struct FakeNode {
    id: NodeId,
    kind: &'static str,
    log: Rc<RefCell<Log>>,
    params: HashMap<&'static str, ParamHandle>,
}

impl FakeNode {
    fn record(&self, event: ProviderEvent) {
        self.log.borrow_mut().events.push(event);
    }
}

impl AudioNode for FakeNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn connect(&self, target: &dyn AudioNode) {
        self.record(ProviderEvent::Connected {
            from: self.id,
            to: target.id(),
        });
    }

    fn connect_param(&self, target: &dyn AudioParam) {
        self.record(ProviderEvent::ConnectedParam {
            from: self.id,
            to: target.param_ref(),
        });
    }

    fn disconnect(&self) {
        self.record(ProviderEvent::Disconnected { node: self.id });
    }

    fn param(&self, name: &str) -> Option<ParamHandle> {
        self.params.get(name).map(Rc::clone)
    }

    fn set_attribute(&self, name: &str, value: &str) {
        self.record(ProviderEvent::AttributeSet {
            node: self.id,
            name: name.to_owned(),
            value: value.to_owned(),
        });
    }

    fn start(&self, time: f64) {
        self.record(ProviderEvent::Started {
            node: self.id,
            time,
        });
    }

    fn stop(&self, time: f64) {
        self.record(ProviderEvent::Stopped {
            node: self.id,
            time,
        });
    }
}

struct FakeParam {
    node: NodeId,
    name: &'static str,
    value: Cell<f64>,
    log: Rc<RefCell<Log>>,
}

impl FakeParam {
    fn record(&self, event: ProviderEvent) {
        self.log.borrow_mut().events.push(event);
    }
}

impl AudioParam for FakeParam {
    fn param_ref(&self) -> ParamRef {
        ParamRef {
            node: self.node,
            name: self.name.to_owned(),
        }
    }

    fn value(&self) -> f64 {
        self.value.get()
    }

    fn set_value(&self, value: f64) {
        self.value.set(value);
        self.record(ProviderEvent::ValueSet {
            param: self.param_ref(),
            value,
        });
    }

    fn set_value_at_time(&self, value: f64, time: f64) {
        self.value.set(value);
        self.record(ProviderEvent::SetValueAtTime {
            param: self.param_ref(),
            value,
            time,
        });
    }

    fn linear_ramp_to_value_at_time(&self, value: f64, time: f64) {
        self.value.set(value);
        self.record(ProviderEvent::LinearRamp {
            param: self.param_ref(),
            value,
            time,
        });
    }

    fn exponential_ramp_to_value_at_time(&self, value: f64, time: f64) {
        self.value.set(value);
        self.record(ProviderEvent::ExponentialRamp {
            param: self.param_ref(),
            value,
            time,
        });
    }

    fn cancel_scheduled_values(&self, time: f64) {
        self.record(ProviderEvent::CancelScheduled {
            param: self.param_ref(),
            time,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_only_moves_when_advanced() {
        let provider = FakeProvider::new();
        assert_eq!(provider.now(), 0.0);
        provider.advance(0.025);
        provider.advance(0.025);
        assert_eq!(provider.now(), 0.05);
    }

    #[test]
    fn destination_is_a_singleton() {
        let provider = FakeProvider::new();
        let a = provider.destination();
        let b = provider.destination();
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn records_connection_topology() {
        let provider = FakeProvider::new();
        let osc = provider.create_oscillator();
        let gain = provider.create_gain();
        osc.connect(gain.as_ref());
        osc.connect_param(gain.param("gain").unwrap().as_ref());

        let events = provider.events();
        assert!(events.contains(&ProviderEvent::Connected {
            from: osc.id(),
            to: gain.id()
        }));
        assert!(events.iter().any(|e| matches!(
            e,
            ProviderEvent::ConnectedParam { from, to } if *from == osc.id() && to.name == "gain"
        )));
    }

    #[test]
    fn params_remember_their_last_value() {
        let provider = FakeProvider::new();
        let gain = provider.create_gain();
        let param = gain.param("gain").unwrap();
        assert_eq!(param.value(), 1.0);
        param.set_value_at_time(0.25, 1.0);
        assert_eq!(param.value(), 0.25);
    }
}
