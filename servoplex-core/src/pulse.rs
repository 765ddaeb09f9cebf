//! Pulse width encoding
//!
//! The overflow timer counts 0.5µs ticks and wraps every 256 counts, so
//! one full counter cycle (a tick block) lasts 128µs. A pulse is timed as
//! a number of whole blocks followed by one short cycle that starts from a
//! preloaded counter value, the remainder.
//!
//! ```text
//!   width ──► clamp ──► - delay adjust ──► blocks = w / 128
//!                                           remainder = 255 - 2 * (w % 128)
//! ```
//!
//! Loading `remainder` makes the counter overflow `256 - remainder` ticks
//! later, i.e. after `2 * (w % 128) + 1` half-microsecond ticks.

use crate::config::{TimingConfig, MAX_TICK_BLOCKS, TICK_BLOCK_US};

/// Counter ticks in one tick block
pub const BLOCK_TICKS: u32 = 256;

/// Encoded pulse width: whole tick blocks plus a counter preload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EncodedPulse {
    /// Number of full 128µs counter cycles
    pub blocks: u8,
    /// Counter value loaded for the final partial cycle
    pub remainder: u8,
}

impl EncodedPulse {
    /// Encode a raw duration, without clamping or overhead adjustment
    ///
    /// Durations beyond what the scheduler can count saturate at
    /// [`MAX_TICK_BLOCKS`] blocks.
    pub const fn from_micros(us: u32) -> Self {
        let block = TICK_BLOCK_US as u32;
        let max_blocks = MAX_TICK_BLOCKS as u32;

        let (blocks, leftover) = if us / block > max_blocks {
            (max_blocks, block - 1)
        } else {
            (us / block, us % block)
        };

        Self {
            blocks: blocks as u8,
            remainder: (u8::MAX as u32 - 2 * leftover) as u8,
        }
    }

    /// Duration this pulse encodes, in microseconds
    ///
    /// Inverse of [`from_micros`](Self::from_micros) for in-range values.
    pub const fn as_micros(self) -> u32 {
        let leftover = (u8::MAX - self.remainder) as u32 / 2;
        self.blocks as u32 * TICK_BLOCK_US as u32 + leftover
    }

    /// Exact number of counter ticks the scheduler spends on this pulse
    pub const fn duration_ticks(self) -> u32 {
        self.blocks as u32 * BLOCK_TICKS + (BLOCK_TICKS - self.remainder as u32)
    }
}

/// Encode a requested pulse width for a servo channel
///
/// Out-of-range widths are clamped, never rejected. The configured delay
/// adjustment is subtracted to compensate for the time spent toggling the
/// pin.
pub const fn encode(config: &TimingConfig, width_us: u16) -> EncodedPulse {
    let adjusted = config.clamp(width_us).saturating_sub(config.delay_adjust_us);
    EncodedPulse::from_micros(adjusted as u32)
}

/// Reconstruct the pulse width a channel was written with
///
/// Lossy to the encoder's granularity for values that were clamped.
pub fn decode(config: &TimingConfig, pulse: EncodedPulse) -> u16 {
    let us = pulse.as_micros() + u32::from(config.delay_adjust_us);
    u16::try_from(us).unwrap_or(u16::MAX)
}

/// Encode the sync delay that pads a frame of `channels` default pulses
/// out to the configured frame period
pub const fn sync_pulse(config: &TimingConfig, channels: usize) -> EncodedPulse {
    EncodedPulse::from_micros(config.sync_delay_us(channels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        DEFAULT_PULSE_WIDTH_US, FRAME_PERIOD_US, MAX_CHANNELS, MAX_PULSE_WIDTH_US,
        MIN_PULSE_WIDTH_US,
    };
    use proptest::prelude::*;

    const CONFIG: TimingConfig = TimingConfig::DEFAULT;

    #[test]
    fn test_encode_default_width() {
        // 1500 - 8 = 1492 = 11 * 128 + 84
        let pulse = encode(&CONFIG, 1500);
        assert_eq!(pulse.blocks, 11);
        assert_eq!(pulse.remainder, 255 - 2 * 84);
        assert_eq!(pulse.duration_ticks(), 11 * 256 + 169);
    }

    #[test]
    fn test_encode_bounds() {
        // 492 = 3 * 128 + 108
        assert_eq!(
            encode(&CONFIG, MIN_PULSE_WIDTH_US),
            EncodedPulse {
                blocks: 3,
                remainder: 39
            }
        );
        // 1992 = 15 * 128 + 72
        assert_eq!(
            encode(&CONFIG, MAX_PULSE_WIDTH_US),
            EncodedPulse {
                blocks: 15,
                remainder: 111
            }
        );
    }

    #[test]
    fn test_exact_block_multiple() {
        // 1032 - 8 = 1024 = 8 blocks, final cycle lasts a single tick
        let pulse = encode(&CONFIG, 1032);
        assert_eq!(pulse.blocks, 8);
        assert_eq!(pulse.remainder, 255);
        assert_eq!(pulse.duration_ticks(), 8 * 256 + 1);
        assert_eq!(decode(&CONFIG, pulse), 1032);
    }

    #[test]
    fn test_sync_pulse() {
        // 12750 - 4 * 1500 = 6750 = 52 * 128 + 94
        let sync = sync_pulse(&CONFIG, MAX_CHANNELS);
        assert_eq!(sync.blocks, 52);
        assert_eq!(sync.remainder, 255 - 2 * 94);
        assert_eq!(sync.as_micros(), 6750);
    }

    #[test]
    fn test_from_micros_saturates() {
        let pulse = EncodedPulse::from_micros(u32::MAX);
        assert_eq!(u16::from(pulse.blocks), MAX_TICK_BLOCKS);
        assert_eq!(pulse.remainder, 1);
    }

    #[test]
    fn test_frame_adds_up_to_period() {
        let channel = decode(&CONFIG, encode(&CONFIG, DEFAULT_PULSE_WIDTH_US));
        let sync = sync_pulse(&CONFIG, MAX_CHANNELS).as_micros();
        assert_eq!(
            u32::from(channel) * MAX_CHANNELS as u32 + sync,
            u32::from(FRAME_PERIOD_US)
        );
    }

    proptest! {
        #[test]
        fn prop_round_trip_in_range(width in MIN_PULSE_WIDTH_US..=MAX_PULSE_WIDTH_US) {
            let pulse = encode(&CONFIG, width);
            prop_assert_eq!(decode(&CONFIG, pulse), width);
        }

        #[test]
        fn prop_ticks_match_width(width in MIN_PULSE_WIDTH_US..=MAX_PULSE_WIDTH_US) {
            // Two ticks per microsecond, plus the single tick of the final cycle
            let ticks = encode(&CONFIG, width).duration_ticks();
            prop_assert_eq!(ticks, 2 * u32::from(width - CONFIG.delay_adjust_us) + 1);
        }

        #[test]
        fn prop_clamps_below_minimum(width in 0..MIN_PULSE_WIDTH_US) {
            prop_assert_eq!(encode(&CONFIG, width), encode(&CONFIG, MIN_PULSE_WIDTH_US));
        }

        #[test]
        fn prop_clamps_above_maximum(width in (MAX_PULSE_WIDTH_US + 1)..=u16::MAX) {
            prop_assert_eq!(encode(&CONFIG, width), encode(&CONFIG, MAX_PULSE_WIDTH_US));
        }
    }
}
