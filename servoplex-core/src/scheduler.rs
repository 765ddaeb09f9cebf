//! Overflow interrupt state machine
//!
//! Called once per timer overflow. The cursor walks the channel table
//! (0 = sync, then channels 1..=N) and the iteration counter counts
//! overflows spent on the current entry:
//!
//! ```text
//!   iterations <  blocks   wait
//!   iterations == blocks   preload counter with remainder
//!   iterations >  blocks   end pulse, advance cursor, start next pulse
//! ```
//!
//! Every entry is visited each frame whether or not a pin is bound, so the
//! frame period never depends on the number of attached servos.
//!
//! The handler is wait-free: a fixed number of atomic loads and stores,
//! at most one counter write and two pin writes per call.

use core::sync::atomic::{AtomicU8, Ordering};

use servoplex_hal::{OutputBank, OverflowTimer};

use crate::channel::ChannelTable;

/// What a call to [`Scheduler::on_overflow`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transition {
    /// Still counting whole blocks
    Waiting,
    /// Last block done; counter preloaded for the partial cycle
    Remainder {
        /// Entry being timed
        cursor: u8,
        /// Value loaded into the counter
        remainder: u8,
    },
    /// Entry finished; moved to the next one (`to == 0` starts a new frame)
    Advanced {
        /// Entry that ended
        from: u8,
        /// Entry that started
        to: u8,
    },
}

/// Cursor and iteration counter of the pulse state machine
///
/// Both fields are written only from the overflow interrupt.
#[derive(Debug)]
pub struct Scheduler {
    cursor: AtomicU8,
    iterations: AtomicU8,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// State machine positioned at the start of a frame
    pub const fn new() -> Self {
        Self {
            cursor: AtomicU8::new(0),
            iterations: AtomicU8::new(0),
        }
    }

    /// Entry currently being timed (0 = sync)
    pub fn cursor(&self) -> u8 {
        self.cursor.load(Ordering::Relaxed)
    }

    /// Overflows counted for the current entry
    pub fn iterations(&self) -> u8 {
        self.iterations.load(Ordering::Relaxed)
    }

    /// Handle one timer overflow
    ///
    /// Must only be called from the overflow interrupt (or whatever stands
    /// in for it). Never blocks.
    pub fn on_overflow<const N: usize, T, O>(
        &self,
        table: &ChannelTable<N>,
        timer: &mut T,
        outputs: &mut O,
    ) -> Transition
    where
        T: OverflowTimer + ?Sized,
        O: OutputBank + ?Sized,
    {
        let cursor = self.cursor.load(Ordering::Relaxed);
        let iterations = self.iterations.load(Ordering::Relaxed).wrapping_add(1);
        self.iterations.store(iterations, Ordering::Relaxed);

        // A cursor outside the table restarts the frame.
        let Some((pulse, pin)) = table.timing(cursor) else {
            return self.advance(cursor, 0, timer);
        };

        if iterations == pulse.blocks {
            timer.set_counter(pulse.remainder);
            Transition::Remainder {
                cursor,
                remainder: pulse.remainder,
            }
        } else if iterations > pulse.blocks {
            if let Some(pin) = pin {
                outputs.set_low(pin);
            }

            let next = cursor.wrapping_add(1);
            if usize::from(next) > N {
                return self.advance(cursor, 0, timer);
            }

            let transition = self.advance(cursor, next, timer);
            if let Some((_, Some(pin))) = table.timing(next) {
                outputs.set_high(pin);
            }
            transition
        } else {
            Transition::Waiting
        }
    }

    fn advance<T>(&self, from: u8, to: u8, timer: &mut T) -> Transition
    where
        T: OverflowTimer + ?Sized,
    {
        self.cursor.store(to, Ordering::Relaxed);
        self.iterations.store(0, Ordering::Relaxed);
        timer.set_counter(0);
        Transition::Advanced { from, to }
    }
}
