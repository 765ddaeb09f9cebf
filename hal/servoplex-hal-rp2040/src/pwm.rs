//! PWM slice as an 8-bit overflow timer
//!
//! RP2040 has no 8-bit timer, but a PWM slice with `TOP = 255` counts
//! 0..=255 and raises `PWM_IRQ_WRAP` when it wraps, which is exactly the
//! counter the scheduler needs. The slice drives no pins.
//!
//! The clock divider is an 8.4 fixed-point value. At the default 125MHz
//! system clock, 0.5µs ticks need a divider of 62.5, which is exact.

use embassy_rp::clocks::clk_sys_freq;
use embassy_rp::pac;
use embassy_rp::pwm::{Config, Pwm, Slice};
use embassy_rp::Peri;
use fixed::FixedU16;
use servoplex_hal::{OverflowTimer, COUNTER_TOP};

/// Largest 8.4 divider value (255 + 15/16)
const MAX_DIVIDER_BITS: u32 = 0x0FFF;

/// Smallest divider (1.0); the hardware treats 0 as 256
const MIN_DIVIDER_BITS: u32 = 0x0010;

/// Calculate the 8.4 fixed-point divider for a tick period
///
/// divider = clk_sys * tick / 1e9, times 16 for the fractional bits.
/// Clamped to the hardware range.
pub fn divider_bits(clk_sys_hz: u32, tick_ns: u32) -> u16 {
    let bits = u64::from(clk_sys_hz) * u64::from(tick_ns) * 16 / 1_000_000_000;
    let bits = bits.clamp(u64::from(MIN_DIVIDER_BITS), u64::from(MAX_DIVIDER_BITS));
    bits as u16
}

/// PWM slice used as a free-running overflow counter
pub struct PwmOverflowTimer<'d> {
    pwm: Pwm<'d>,
    /// Slice number, for the interrupt enable register
    slice: usize,
    config: Config,
}

impl<'d> PwmOverflowTimer<'d> {
    /// Take a PWM slice; the counter stays stopped until configured
    ///
    /// `slice_num` must match the peripheral (`PWM_SLICE3` is 3).
    pub fn new<T: Slice>(slice: Peri<'d, T>, slice_num: usize) -> Self {
        let mut config = Config::default();
        config.enable = false;
        config.top = u16::from(COUNTER_TOP);

        Self {
            pwm: Pwm::new_free(slice, config.clone()),
            slice: slice_num,
            config,
        }
    }

    /// Acknowledge the wrap interrupt
    ///
    /// Call first thing in the `PWM_IRQ_WRAP` handler.
    pub fn clear_overflow(&mut self) {
        self.pwm.clear_wrapped();
    }

    /// Check if this slice has a pending wrap
    pub fn overflowed(&mut self) -> bool {
        self.pwm.wrapped()
    }

    fn set_interrupt(&mut self, enabled: bool) {
        pac::PWM.inte().modify(|w| w.set_ch(self.slice, enabled));
    }
}

impl OverflowTimer for PwmOverflowTimer<'_> {
    fn configure(&mut self, tick_ns: u32) {
        self.config.divider = FixedU16::from_bits(divider_bits(clk_sys_freq(), tick_ns));
        self.config.top = u16::from(COUNTER_TOP);
        self.config.phase_correct = false;
        self.config.enable = true;
        self.pwm.set_config(&self.config);
    }

    fn set_counter(&mut self, value: u8) {
        self.pwm.set_counter(u16::from(value));
    }

    fn counter(&self) -> u8 {
        // TOP is 255, so the counter never exceeds u8
        self.pwm.counter() as u8
    }

    fn enable_overflow_interrupt(&mut self) {
        self.clear_overflow();
        self.set_interrupt(true);
    }

    fn disable_overflow_interrupt(&mut self) {
        self.set_interrupt(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divider_default_clock() {
        // 125MHz * 0.5µs = 62.5 = 0x3E.8
        assert_eq!(divider_bits(125_000_000, 500), 1000);
    }

    #[test]
    fn test_divider_clamped() {
        assert_eq!(divider_bits(125_000_000, 1), MIN_DIVIDER_BITS as u16);
        assert_eq!(divider_bits(125_000_000, 1_000_000), MAX_DIVIDER_BITS as u16);
    }
}
