//! Overflow timer abstraction
//!
//! The scheduler needs an 8-bit up-counter that raises an interrupt each
//! time it wraps from [`COUNTER_TOP`] back to zero, and that can be
//! preloaded so the next wrap comes early. Nothing else about the
//! peripheral is assumed.

/// Duration of one counter step in nanoseconds (0.5µs)
pub const TICK_NANOS: u32 = 500;

/// Last counter value before the wrap
pub const COUNTER_TOP: u8 = 255;

/// Free-running 8-bit counter with an overflow interrupt
///
/// After [`configure`](OverflowTimer::configure) the counter increments
/// once per `tick_ns` and overflows after `COUNTER_TOP`, invoking the
/// overflow handler registered by the application.
pub trait OverflowTimer {
    /// Put the timer in normal counting mode with an 8-bit wrap
    ///
    /// The prescaler must be chosen so that one count lasts `tick_ns`
    /// nanoseconds.
    fn configure(&mut self, tick_ns: u32);

    /// Load the counter
    ///
    /// The next overflow happens `COUNTER_TOP + 1 - value` counts later.
    fn set_counter(&mut self, value: u8);

    /// Current counter value
    fn counter(&self) -> u8;

    /// Enable the overflow interrupt
    fn enable_overflow_interrupt(&mut self);

    /// Disable the overflow interrupt
    fn disable_overflow_interrupt(&mut self);
}
