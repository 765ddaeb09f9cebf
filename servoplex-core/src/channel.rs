//! Channel table
//!
//! One slot per servo channel plus the frame sync entry. The sync entry
//! lives outside the slot array and has no pin field at all, so it cannot
//! be bound to a pin. Servo channels are numbered from 1 through
//! [`ChannelId`]; cursor value 0 always means the sync entry.
//!
//! # Shared access
//!
//! Slots are written from the main context (`attach`, `detach`,
//! `write_microseconds`) and read from the overflow interrupt. Every field
//! is its own atomic with a single writer, and no lock is taken on either
//! side: the interrupt must never wait.
//!
//! A pulse update stores `blocks` and `remainder` separately. If the
//! interrupt fires between the two stores it times that channel with the
//! new block count and the old remainder. The error lasts one frame at
//! most and corrects itself on the next pass.

use core::num::NonZeroU8;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use servoplex_hal::PinId;

use crate::pulse::EncodedPulse;

/// Servo channel number, 1 through the channel count
///
/// Zero is reserved for the frame sync slot and cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelId(NonZeroU8);

impl ChannelId {
    /// Channel number for `number`, or `None` for the reserved zero
    pub(crate) const fn new(number: u8) -> Option<Self> {
        match NonZeroU8::new(number) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }

    /// Channel number as seen by the application (1-based)
    pub const fn get(self) -> u8 {
        self.0.get()
    }

    /// Position in the slot array
    const fn slot_index(self) -> usize {
        self.0.get() as usize - 1
    }
}

/// Pin binding of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinBinding {
    /// Bound pin number
    pub pin: PinId,
    /// Pin is only driven while this is set
    pub active: bool,
}

/// Timing and pin state of one servo channel
pub struct ChannelSlot {
    pin: AtomicU8,
    active: AtomicBool,
    blocks: AtomicU8,
    remainder: AtomicU8,
}

impl ChannelSlot {
    /// Unbound slot timed with `pulse`
    pub fn new(pulse: EncodedPulse) -> Self {
        Self {
            pin: AtomicU8::new(0),
            active: AtomicBool::new(false),
            blocks: AtomicU8::new(pulse.blocks),
            remainder: AtomicU8::new(pulse.remainder),
        }
    }

    /// Current encoded pulse (may be torn, see the module docs)
    pub fn pulse(&self) -> EncodedPulse {
        EncodedPulse {
            blocks: self.blocks.load(Ordering::Relaxed),
            remainder: self.remainder.load(Ordering::Relaxed),
        }
    }

    /// Store a new encoded pulse
    pub fn store_pulse(&self, pulse: EncodedPulse) {
        self.blocks.store(pulse.blocks, Ordering::Relaxed);
        self.remainder.store(pulse.remainder, Ordering::Relaxed);
    }

    /// Current pin binding
    pub fn binding(&self) -> PinBinding {
        let active = self.active.load(Ordering::Acquire);
        PinBinding {
            pin: self.pin.load(Ordering::Relaxed),
            active,
        }
    }

    /// Pin to drive, if the binding is active
    pub fn active_pin(&self) -> Option<PinId> {
        let binding = self.binding();
        binding.active.then_some(binding.pin)
    }

    /// Bind `pin` and start driving it
    pub fn bind(&self, pin: PinId) {
        self.active.store(false, Ordering::Release);
        self.pin.store(pin, Ordering::Relaxed);
        self.active.store(true, Ordering::Release);
    }

    /// Stop driving the pin; the pin number is kept
    pub fn unbind(&self) {
        self.active.store(false, Ordering::Release);
    }
}

/// Sync entry followed by `N` servo channel slots
pub struct ChannelTable<const N: usize> {
    sync: EncodedPulse,
    slots: [ChannelSlot; N],
}

impl<const N: usize> ChannelTable<N> {
    /// Table with the sync delay fixed and every channel at `default`
    pub fn new(sync: EncodedPulse, default: EncodedPulse) -> Self {
        Self {
            sync,
            slots: core::array::from_fn(|_| ChannelSlot::new(default)),
        }
    }

    /// Number of servo channels (the sync entry excluded)
    pub const fn channel_count(&self) -> usize {
        N
    }

    /// Encoded sync delay
    pub fn sync(&self) -> EncodedPulse {
        self.sync
    }

    /// Slot of a servo channel
    pub fn slot(&self, id: ChannelId) -> Option<&ChannelSlot> {
        self.slots.get(id.slot_index())
    }

    /// Pulse and pin to drive for a cursor position (0 = sync)
    ///
    /// Returns `None` past the last channel.
    pub fn timing(&self, cursor: u8) -> Option<(EncodedPulse, Option<PinId>)> {
        match ChannelId::new(cursor) {
            None => Some((self.sync, None)),
            Some(id) => self
                .slot(id)
                .map(|slot| (slot.pulse(), slot.active_pin())),
        }
    }

    /// Total ticks of one frame with the current pulse widths
    pub fn frame_ticks(&self) -> u32 {
        self.slots
            .iter()
            .map(|slot| slot.pulse().duration_ticks())
            .sum::<u32>()
            + self.sync.duration_ticks()
    }
}
