//! GPIO output bank
//!
//! Holds the pins the firmware hands over for servo use and turns them
//! into push-pull outputs when the scheduler asks for them by number.

use embassy_rp::gpio::{AnyPin, Level, Output};
use embassy_rp::Peri;
use servoplex_hal::{OutputBank, PinId};

use crate::pins::{check_pin, PinError, GPIO_COUNT};

/// Output bank over RP2040 GPIO, addressed by pin number
///
/// Pins must be [`provide`](GpioOutputs::provide)d before a servo can be
/// attached to them. Requests for pins that were never provided are
/// ignored.
pub struct GpioOutputs {
    /// Provided but not yet configured
    idle: [Option<Peri<'static, AnyPin>>; GPIO_COUNT],
    /// Configured as outputs
    outputs: [Option<Output<'static>>; GPIO_COUNT],
}

impl Default for GpioOutputs {
    fn default() -> Self {
        Self::new()
    }
}

impl GpioOutputs {
    /// Create an empty bank
    pub fn new() -> Self {
        Self {
            idle: [const { None }; GPIO_COUNT],
            outputs: [const { None }; GPIO_COUNT],
        }
    }

    /// Hand a pin to the bank
    ///
    /// `pin_num` must match the peripheral, e.g. via
    /// [`take_pin!`](crate::take_pin).
    pub fn provide(&mut self, pin_num: u8, pin: Peri<'static, AnyPin>) -> Result<(), PinError> {
        let index = check_pin(pin_num)?;
        if self.idle[index].is_some() || self.outputs[index].is_some() {
            return Err(PinError::AlreadyTaken);
        }
        self.idle[index] = Some(pin);
        Ok(())
    }

    /// Check if a pin has been configured as an output
    pub fn is_output(&self, pin_num: u8) -> bool {
        check_pin(pin_num).is_ok_and(|index| self.outputs[index].is_some())
    }

    fn output(&mut self, pin: PinId) -> Option<&mut Output<'static>> {
        let index = check_pin(pin).ok()?;
        self.outputs[index].as_mut()
    }
}

impl OutputBank for GpioOutputs {
    fn set_output(&mut self, pin: PinId) {
        let Ok(index) = check_pin(pin) else {
            return;
        };
        if let Some(idle) = self.idle[index].take() {
            self.outputs[index] = Some(Output::new(idle, Level::Low));
        }
    }

    fn set_high(&mut self, pin: PinId) {
        if let Some(output) = self.output(pin) {
            output.set_high();
        }
    }

    fn set_low(&mut self, pin: PinId) {
        if let Some(output) = self.output(pin) {
            output.set_low();
        }
    }
}
