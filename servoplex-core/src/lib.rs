//! Board-agnostic servo pulse scheduler
//!
//! Generates standard 500-2000µs servo pulses on up to four channels from
//! a single 8-bit overflow timer. The application never refreshes pulses
//! itself; it only writes pulse widths.
//!
//! - Pulse encoding (microseconds to tick blocks and a sub-block remainder)
//! - Channel table with a reserved frame sync slot
//! - Overflow interrupt state machine that drives the pins
//! - Channel registration and the [`Servo`] handle
//! - Timing configuration and validation
//!
//! # Example
//!
//! ```ignore
//! static SERVOS: StaticCell<ServoTimer> = StaticCell::new();
//! let servos = SERVOS.init(ServoTimer::new());
//!
//! let mut pan = servos.servo();
//! pan.attach(2, &mut timer, &mut outputs)?;
//! pan.write_microseconds(1200);
//!
//! // From the timer overflow interrupt:
//! servos.on_overflow(&mut timer, &mut outputs);
//! ```

#![no_std]
#![deny(unsafe_code)]

pub mod channel;
pub mod config;
pub mod pulse;
pub mod scheduler;
pub mod servo;

#[cfg(test)]
mod testing;

pub use channel::{ChannelId, ChannelTable, PinBinding};
pub use config::{ConfigError, TimingConfig, MAX_CHANNELS};
pub use pulse::{decode, encode, EncodedPulse};
pub use scheduler::{Scheduler, Transition};
pub use servo::{AttachError, Servo, ServoTimer};
