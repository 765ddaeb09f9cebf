//! RP2040-specific HAL for the servo pulse multiplexer
//!
//! This crate provides RP2040 implementations of the `servoplex-hal`
//! traits:
//!
//! - A PWM slice run as a free-running 8-bit overflow counter
//!   ([`pwm::PwmOverflowTimer`])
//! - GPIO outputs addressed by pin number ([`gpio::GpioOutputs`])
//! - Taking pins by number from the peripherals ([`take_pin!`])

#![no_std]

pub mod gpio;
pub mod pins;
pub mod pwm;

pub use gpio::GpioOutputs;
pub use pins::PinError;
pub use pwm::PwmOverflowTimer;

// Re-export shared traits from servoplex-hal for convenience
pub use servoplex_hal::{OutputBank, OverflowTimer};
