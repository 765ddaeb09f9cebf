//! GPIO output abstractions
//!
//! The scheduler drives servo pins by number from interrupt context, so
//! the main abstraction is a bank of outputs addressed by [`PinId`]. A
//! per-pin [`OutputPin`] trait is provided as well, and any fixed array of
//! output pins is usable as a bank.

/// Pin identifier as used by the servo API
pub type PinId = u8;

/// Highest pin number a servo channel can bind (7-bit pin field)
pub const MAX_PIN_ID: PinId = 127;

/// Digital output level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    /// Logic 0
    Low,
    /// Logic 1
    High,
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// Digital output pin
///
/// Implementations should handle the actual hardware register manipulation
/// for the specific chip.
pub trait OutputPin {
    /// Set the pin high (logic 1)
    fn set_high(&mut self);

    /// Set the pin low (logic 0)
    fn set_low(&mut self);

    /// Set the pin to a specific level
    fn set_level(&mut self, level: Level) {
        match level {
            Level::High => self.set_high(),
            Level::Low => self.set_low(),
        }
    }

    /// Check if the pin is currently set high
    fn is_set_high(&self) -> bool;
}

/// Bank of digital outputs addressed by pin number
///
/// Calls for pins the bank does not own must be ignored; the scheduler
/// never checks a return value from interrupt context.
pub trait OutputBank {
    /// Configure `pin` as a push-pull output
    fn set_output(&mut self, pin: PinId);

    /// Drive `pin` high
    fn set_high(&mut self, pin: PinId);

    /// Drive `pin` low
    fn set_low(&mut self, pin: PinId);

    /// Drive `pin` to a specific level
    fn set_level(&mut self, pin: PinId, level: Level) {
        match level {
            Level::High => self.set_high(pin),
            Level::Low => self.set_low(pin),
        }
    }
}

// A fixed array of pins is a bank indexed by position. Pins are assumed to
// be outputs already, so `set_output` has nothing to do.
impl<P: OutputPin, const M: usize> OutputBank for [P; M] {
    fn set_output(&mut self, _pin: PinId) {}

    fn set_high(&mut self, pin: PinId) {
        if let Some(p) = self.get_mut(usize::from(pin)) {
            p.set_high();
        }
    }

    fn set_low(&mut self, pin: PinId) {
        if let Some(p) = self.get_mut(usize::from(pin)) {
            p.set_low();
        }
    }
}
