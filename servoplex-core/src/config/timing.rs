//! Pulse timing configuration
//!
//! The defaults reproduce the classic hobby-servo contract: 500-2000µs
//! pulses, 1500µs at rest, one frame every 12.75ms.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum number of servo channels
pub const MAX_CHANNELS: usize = 4;

/// Shortest pulse sent to a servo (µs)
pub const MIN_PULSE_WIDTH_US: u16 = 500;

/// Longest pulse sent to a servo (µs)
pub const MAX_PULSE_WIDTH_US: u16 = 2000;

/// Pulse width of a channel that was never written (µs)
pub const DEFAULT_PULSE_WIDTH_US: u16 = 1500;

/// Total frame duration, all channels plus the sync delay (µs)
pub const FRAME_PERIOD_US: u16 = 12_750;

/// Measured cost of raising and lowering a pin, subtracted from every pulse (µs)
pub const DELAY_ADJUST_US: u16 = 8;

/// Duration of one full counter cycle (µs)
///
/// 256 counts at 0.5µs each.
pub const TICK_BLOCK_US: u16 = 128;

/// Largest block count the 8-bit iteration counter can time
///
/// The scheduler must count to `blocks + 1`, so 255 blocks would wrap.
pub const MAX_TICK_BLOCKS: u16 = 254;

/// Errors found while validating a [`TimingConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Channel count is zero or does not fit the 8-bit cursor
    InvalidChannelCount,
    /// Minimum pulse width is above the maximum
    InvertedBounds,
    /// Default pulse width lies outside the bounds
    DefaultOutOfBounds,
    /// Minimum pulse is shorter than one tick block after the delay adjustment
    PulseTooShort,
    /// Maximum pulse needs more tick blocks than the scheduler can count
    PulseTooLong,
    /// Frame period cannot hold every channel at its default width plus a sync block
    FrameTooShort,
    /// Sync delay needs more tick blocks than the scheduler can count
    FrameTooLong,
}

/// Pulse timing configuration
///
/// All values are microseconds. Use [`TimingConfig::validate`] before
/// handing a custom configuration to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimingConfig {
    /// Shortest accepted pulse; shorter requests are clamped up
    pub min_pulse_us: u16,
    /// Longest accepted pulse; longer requests are clamped down
    pub max_pulse_us: u16,
    /// Width every channel starts with
    pub default_pulse_us: u16,
    /// Target frame period
    pub frame_period_us: u16,
    /// Per-pulse processing overhead
    pub delay_adjust_us: u16,
}

impl TimingConfig {
    /// Standard hobby-servo timing
    pub const DEFAULT: Self = Self {
        min_pulse_us: MIN_PULSE_WIDTH_US,
        max_pulse_us: MAX_PULSE_WIDTH_US,
        default_pulse_us: DEFAULT_PULSE_WIDTH_US,
        frame_period_us: FRAME_PERIOD_US,
        delay_adjust_us: DELAY_ADJUST_US,
    };

    /// Clamp a requested width into `[min_pulse_us, max_pulse_us]`
    pub const fn clamp(&self, width_us: u16) -> u16 {
        if width_us < self.min_pulse_us {
            self.min_pulse_us
        } else if width_us > self.max_pulse_us {
            self.max_pulse_us
        } else {
            width_us
        }
    }

    /// Time left for the sync slot when every channel runs at its default width
    pub const fn sync_delay_us(&self, channels: usize) -> u32 {
        let busy = channels as u32 * self.default_pulse_us as u32;
        (self.frame_period_us as u32).saturating_sub(busy)
    }

    /// Check that the scheduler can time this configuration for `channels` channels
    pub fn validate(&self, channels: usize) -> Result<(), ConfigError> {
        if channels == 0 || channels > usize::from(u8::MAX) - 1 {
            return Err(ConfigError::InvalidChannelCount);
        }
        if self.min_pulse_us > self.max_pulse_us {
            return Err(ConfigError::InvertedBounds);
        }
        if self.default_pulse_us < self.min_pulse_us || self.default_pulse_us > self.max_pulse_us {
            return Err(ConfigError::DefaultOutOfBounds);
        }
        if self.min_pulse_us.saturating_sub(self.delay_adjust_us) < TICK_BLOCK_US {
            return Err(ConfigError::PulseTooShort);
        }
        if (self.max_pulse_us - self.delay_adjust_us) / TICK_BLOCK_US > MAX_TICK_BLOCKS {
            return Err(ConfigError::PulseTooLong);
        }

        let sync_us = self.sync_delay_us(channels);
        let busy = channels as u32 * u32::from(self.default_pulse_us);
        if u32::from(self.frame_period_us) < busy + u32::from(TICK_BLOCK_US) {
            return Err(ConfigError::FrameTooShort);
        }
        if sync_us / u32::from(TICK_BLOCK_US) > u32::from(MAX_TICK_BLOCKS) {
            return Err(ConfigError::FrameTooLong);
        }

        Ok(())
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
