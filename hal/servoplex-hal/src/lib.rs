//! Servoplex Hardware Abstraction Layer
//!
//! This crate defines the two hardware collaborators the pulse scheduler
//! consumes. Chip-specific HALs (RP2040, ...) implement them so the same
//! scheduler runs unchanged on different hardware, and host tests can
//! substitute mocks.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  servoplex-core (scheduler, servo API)  │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  servoplex-hal (this crate - traits)    │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ servoplex-hal-│       │  host mocks   │
//! │    rp2040     │       │   (tests)     │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`timer::OverflowTimer`] - 8-bit counter with an overflow interrupt
//! - [`gpio::OutputBank`] - Digital outputs addressed by pin number
//! - [`gpio::OutputPin`] - A single digital output

#![no_std]
#![deny(unsafe_code)]

pub mod gpio;
pub mod timer;

// Re-export key traits at crate root for convenience
pub use gpio::{Level, OutputBank, OutputPin, PinId, MAX_PIN_ID};
pub use timer::{OverflowTimer, COUNTER_TOP, TICK_NANOS};
