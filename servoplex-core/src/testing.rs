//! Host test bench
//!
//! Simulates the overflow timer in tick time: each overflow happens
//! `256 - counter` ticks after the previous one, where `counter` is the
//! value the handler last preloaded. Outputs record every level change
//! with its tick timestamp.

use heapless::Vec;
use servoplex_hal::{OutputBank, OverflowTimer, PinId};

use crate::pulse::BLOCK_TICKS;

/// Number of pins the mock output bank knows about
const PIN_COUNT: usize = 128;

/// Mock 8-bit overflow timer
#[derive(Debug, Default)]
pub(crate) struct MockTimer {
    pub counter: u8,
    pub tick_ns: Option<u32>,
    pub interrupt_enabled: bool,
    pub configure_calls: u8,
}

impl OverflowTimer for MockTimer {
    fn configure(&mut self, tick_ns: u32) {
        self.tick_ns = Some(tick_ns);
        self.configure_calls += 1;
    }

    fn set_counter(&mut self, value: u8) {
        self.counter = value;
    }

    fn counter(&self) -> u8 {
        self.counter
    }

    fn enable_overflow_interrupt(&mut self) {
        self.interrupt_enabled = true;
    }

    fn disable_overflow_interrupt(&mut self) {
        self.interrupt_enabled = false;
    }
}

/// Recorded level change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Edge {
    pub at: u64,
    pub pin: PinId,
    pub high: bool,
}

/// Mock output bank recording timestamped edges
pub(crate) struct MockOutputs {
    pub now: u64,
    pub outputs: [bool; PIN_COUNT],
    pub levels: [bool; PIN_COUNT],
    pub edges: Vec<Edge, 256>,
}

impl MockOutputs {
    pub fn new() -> Self {
        Self {
            now: 0,
            outputs: [false; PIN_COUNT],
            levels: [false; PIN_COUNT],
            edges: Vec::new(),
        }
    }

    pub fn is_output(&self, pin: PinId) -> bool {
        self.outputs[usize::from(pin)]
    }

    pub fn is_high(&self, pin: PinId) -> bool {
        self.levels[usize::from(pin)]
    }

    fn drive(&mut self, pin: PinId, high: bool) {
        self.levels[usize::from(pin)] = high;
        self.edges
            .push(Edge {
                at: self.now,
                pin,
                high,
            })
            .expect("edge log full");
    }
}

impl OutputBank for MockOutputs {
    fn set_output(&mut self, pin: PinId) {
        self.outputs[usize::from(pin)] = true;
    }

    fn set_high(&mut self, pin: PinId) {
        self.drive(pin, true);
    }

    fn set_low(&mut self, pin: PinId) {
        self.drive(pin, false);
    }
}

/// Simulated timer plus outputs, advanced one overflow at a time
pub(crate) struct Bench {
    pub timer: MockTimer,
    pub outputs: MockOutputs,
    pub now: u64,
}

impl Bench {
    pub fn new() -> Self {
        Self {
            timer: MockTimer::default(),
            outputs: MockOutputs::new(),
            now: 0,
        }
    }

    /// Advance to the next overflow and run `handler` as the interrupt
    pub fn overflow<R>(&mut self, handler: impl FnOnce(&mut MockTimer, &mut MockOutputs) -> R) -> R {
        self.now += u64::from(BLOCK_TICKS - u32::from(self.timer.counter));
        self.timer.counter = 0;
        self.outputs.now = self.now;
        handler(&mut self.timer, &mut self.outputs)
    }

    /// Keep overflowing until `ticks` have elapsed
    pub fn run_for(
        &mut self,
        ticks: u64,
        mut handler: impl FnMut(&mut MockTimer, &mut MockOutputs),
    ) {
        let end = self.now + ticks;
        while self.now < end {
            self.overflow(&mut handler);
        }
    }

    /// Edges recorded for one pin, in time order
    pub fn edges(&self, pin: PinId) -> impl Iterator<Item = &Edge> + '_ {
        self.outputs.edges.iter().filter(move |e| e.pin == pin)
    }

    /// High pulses of one pin as `(rise, fall)` tick pairs
    pub fn pulses(&self, pin: PinId) -> Vec<(u64, u64), 32> {
        let mut pulses = Vec::new();
        let mut rise = None;
        for edge in self.edges(pin) {
            match (edge.high, rise) {
                (true, None) => rise = Some(edge.at),
                (false, Some(start)) => {
                    pulses.push((start, edge.at)).expect("pulse log full");
                    rise = None;
                }
                _ => {}
            }
        }
        pulses
    }
}
