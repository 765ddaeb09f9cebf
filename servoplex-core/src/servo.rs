//! Channel registration and the servo handle
//!
//! [`ServoTimer`] is the one scheduler context of the program: the channel
//! table, the interrupt state machine and the registration counters. It is
//! created once at startup, placed somewhere with a `'static` address, and
//! shared between the application (through [`Servo`] handles) and the
//! timer overflow interrupt (through [`ServoTimer::on_overflow`]).
//!
//! Handles get their channel number when they are created, in creation
//! order. Once every channel is taken, further handles are inert: all of
//! their operations are no-ops and reads return 0.

use portable_atomic::{AtomicBool, AtomicU8, Ordering};
use servoplex_hal::{OutputBank, OverflowTimer, PinId, MAX_PIN_ID, TICK_NANOS};

use crate::channel::{ChannelId, ChannelSlot, ChannelTable};
use crate::config::{ConfigError, TimingConfig, MAX_CHANNELS};
use crate::pulse::{decode, encode, sync_pulse};
use crate::scheduler::{Scheduler, Transition};

/// Errors that can occur when attaching a servo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AttachError {
    /// Every channel was already taken when this handle was created
    ChannelsExhausted,
    /// Pin number above [`MAX_PIN_ID`]
    InvalidPin,
}

/// Scheduler context for `N` servo channels
pub struct ServoTimer<const N: usize = MAX_CHANNELS> {
    config: TimingConfig,
    table: ChannelTable<N>,
    scheduler: Scheduler,
    /// Handles created so far, saturating at `N`
    created: AtomicU8,
    /// Timer configured and overflow interrupt enabled
    started: AtomicBool,
}

impl<const N: usize> Default for ServoTimer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ServoTimer<N> {
    const DEFAULT_TIMING_FITS: () = assert!(
        N >= 1 && N <= MAX_CHANNELS,
        "standard timing fits 1..=MAX_CHANNELS channels, use with_config"
    );

    /// Context with the standard timing
    pub fn new() -> Self {
        let () = Self::DEFAULT_TIMING_FITS;
        Self::build(TimingConfig::DEFAULT)
    }

    /// Context with custom timing
    pub fn with_config(config: TimingConfig) -> Result<Self, ConfigError> {
        config.validate(N)?;
        Ok(Self::build(config))
    }

    fn build(config: TimingConfig) -> Self {
        Self {
            config,
            table: ChannelTable::new(
                sync_pulse(&config, N),
                encode(&config, config.default_pulse_us),
            ),
            scheduler: Scheduler::new(),
            created: AtomicU8::new(0),
            started: AtomicBool::new(false),
        }
    }

    /// Timing this context was built with
    pub fn config(&self) -> &TimingConfig {
        &self.config
    }

    /// Channel table shared with the interrupt
    pub fn table(&self) -> &ChannelTable<N> {
        &self.table
    }

    /// Interrupt state machine
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Number of channels handed out so far
    pub fn created(&self) -> u8 {
        self.created.load(Ordering::Acquire)
    }

    /// Check if the timer has been started by a first `attach`
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Create a servo handle bound to the next free channel
    ///
    /// After `N` handles every new handle is inert.
    pub fn servo(&self) -> Servo<'_, N> {
        let channel = self
            .created
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (usize::from(n) < N).then_some(n + 1)
            })
            .ok()
            .and_then(|previous| ChannelId::new(previous + 1));

        Servo {
            timer: self,
            channel,
        }
    }

    /// Timer overflow interrupt entry point
    ///
    /// Wait-free; see [`Scheduler::on_overflow`].
    pub fn on_overflow<T, O>(&self, timer: &mut T, outputs: &mut O) -> Transition
    where
        T: OverflowTimer + ?Sized,
        O: OutputBank + ?Sized,
    {
        self.scheduler.on_overflow(&self.table, timer, outputs)
    }

    /// Configure the timer and enable its overflow interrupt, once
    fn start<T: OverflowTimer + ?Sized>(&self, timer: &mut T) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }
        timer.disable_overflow_interrupt();
        timer.configure(TICK_NANOS);
        timer.set_counter(0);
        timer.enable_overflow_interrupt();
    }
}

/// Handle to one servo channel
///
/// Obtained from [`ServoTimer::servo`]. The channel number is fixed for
/// the life of the handle and never reused, even after
/// [`detach`](Servo::detach).
pub struct Servo<'a, const N: usize = MAX_CHANNELS> {
    timer: &'a ServoTimer<N>,
    channel: Option<ChannelId>,
}

impl<const N: usize> Servo<'_, N> {
    /// Assigned channel, `None` for an inert handle
    pub fn channel(&self) -> Option<ChannelId> {
        self.channel
    }

    /// Assigned channel number, 0 for an inert handle
    pub fn index(&self) -> u8 {
        self.channel.map_or(0, ChannelId::get)
    }

    fn slot(&self) -> Option<&ChannelSlot> {
        self.channel.and_then(|id| self.timer.table.slot(id))
    }

    /// Bind this channel to `pin` and start pulsing it
    ///
    /// The first attach of any handle starts the timer. Attaching an
    /// attached handle moves it to the new pin; the old pin keeps its
    /// last level.
    pub fn attach<T, O>(
        &mut self,
        pin: PinId,
        timer: &mut T,
        outputs: &mut O,
    ) -> Result<ChannelId, AttachError>
    where
        T: OverflowTimer + ?Sized,
        O: OutputBank + ?Sized,
    {
        self.timer.start(timer);

        let id = self.channel.ok_or(AttachError::ChannelsExhausted)?;
        let slot = self.slot().ok_or(AttachError::ChannelsExhausted)?;
        if pin > MAX_PIN_ID {
            return Err(AttachError::InvalidPin);
        }

        outputs.set_output(pin);
        slot.bind(pin);
        Ok(id)
    }

    /// Stop driving the pin
    ///
    /// The pin is left at whatever level it had. The channel keeps its
    /// time slot in every frame.
    pub fn detach(&mut self) {
        if let Some(slot) = self.slot() {
            slot.unbind();
        }
    }

    /// Check if the channel is bound to a pin
    pub fn attached(&self) -> bool {
        self.slot().is_some_and(|slot| slot.binding().active)
    }

    /// Set the pulse width, clamped to the configured bounds
    ///
    /// Takes effect the next time the channel's slot starts. Widths written
    /// while detached are kept for the next attach.
    pub fn write_microseconds(&mut self, width_us: u16) {
        if let Some(slot) = self.slot() {
            slot.store_pulse(encode(&self.timer.config, width_us));
        }
    }

    /// Current pulse width, reconstructed from the encoded value
    ///
    /// Returns 0 for an inert handle.
    pub fn read_microseconds(&self) -> u16 {
        self.slot()
            .map_or(0, |slot| decode(&self.timer.config, slot.pulse()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_PULSE_WIDTH_US, DELAY_ADJUST_US, FRAME_PERIOD_US};
    use crate::testing::{Bench, MockOutputs, MockTimer};

    #[test]
    fn test_channels_assigned_in_order() {
        let servos: ServoTimer = ServoTimer::new();
        let handles = [servos.servo(), servos.servo(), servos.servo(), servos.servo()];

        for (n, handle) in handles.iter().enumerate() {
            assert_eq!(handle.index() as usize, n + 1);
        }
        assert_eq!(servos.created(), 4);
    }

    #[test]
    fn test_exhausted_handles_are_inert() {
        let servos: ServoTimer = ServoTimer::new();
        let _taken = [servos.servo(), servos.servo(), servos.servo(), servos.servo()];
        let mut extra = servos.servo();
        let mut another = servos.servo();
        let mut bench = Bench::new();

        assert_eq!(extra.index(), 0);
        assert_eq!(another.channel(), None);
        assert_eq!(servos.created(), 4);

        assert_eq!(
            extra.attach(3, &mut bench.timer, &mut bench.outputs),
            Err(AttachError::ChannelsExhausted)
        );
        assert!(!extra.attached());
        assert!(!bench.outputs.is_output(3));

        extra.write_microseconds(1000);
        assert_eq!(extra.read_microseconds(), 0);
        another.detach();
        assert!(!another.attached());
    }

    #[test]
    fn test_first_attach_starts_timer_once() {
        let servos: ServoTimer = ServoTimer::new();
        let mut a = servos.servo();
        let mut b = servos.servo();
        let mut bench = Bench::new();

        assert!(!servos.is_started());
        assert_eq!(a.attach(2, &mut bench.timer, &mut bench.outputs).map(ChannelId::get), Ok(1));
        assert!(servos.is_started());
        assert_eq!(bench.timer.tick_ns, Some(TICK_NANOS));
        assert!(bench.timer.interrupt_enabled);

        assert_eq!(b.attach(3, &mut bench.timer, &mut bench.outputs).map(ChannelId::get), Ok(2));
        assert_eq!(bench.timer.configure_calls, 1);
    }

    #[test]
    fn test_inert_attach_still_starts_timer() {
        let servos: ServoTimer<1> = ServoTimer::new();
        let _first = servos.servo();
        let mut inert = servos.servo();
        let mut timer = MockTimer::default();
        let mut outputs = MockOutputs::new();

        assert!(inert.attach(4, &mut timer, &mut outputs).is_err());
        assert!(servos.is_started());
    }

    #[test]
    fn test_attach_configures_pin() {
        let servos: ServoTimer = ServoTimer::new();
        let mut servo = servos.servo();
        let mut bench = Bench::new();

        assert!(!servo.attached());
        servo.attach(9, &mut bench.timer, &mut bench.outputs).unwrap();
        assert!(servo.attached());
        assert!(bench.outputs.is_output(9));
    }

    #[test]
    fn test_attach_rejects_invalid_pin() {
        let servos: ServoTimer = ServoTimer::new();
        let mut servo = servos.servo();
        let mut bench = Bench::new();

        assert_eq!(
            servo.attach(MAX_PIN_ID + 1, &mut bench.timer, &mut bench.outputs),
            Err(AttachError::InvalidPin)
        );
        assert!(!servo.attached());
        assert_eq!(servo.index(), 1);
    }

    #[test]
    fn test_detach_is_idempotent() {
        let servos: ServoTimer = ServoTimer::new();
        let mut never = servos.servo();
        let mut servo = servos.servo();
        let mut bench = Bench::new();

        never.detach();
        assert!(!never.attached());

        servo.attach(4, &mut bench.timer, &mut bench.outputs).unwrap();
        servo.detach();
        servo.detach();
        assert!(!servo.attached());
        assert!(bench.outputs.edges.is_empty());
        // Channel number survives detach
        assert_eq!(servo.index(), 2);
    }

    #[test]
    fn test_write_read_round_trip() {
        let servos: ServoTimer = ServoTimer::new();
        let mut servo = servos.servo();

        assert_eq!(servo.read_microseconds(), DEFAULT_PULSE_WIDTH_US);
        for width in [500, 777, 1032, 1500, 1999, 2000] {
            servo.write_microseconds(width);
            assert_eq!(servo.read_microseconds(), width);
        }
    }

    #[test]
    fn test_write_clamps() {
        let servos: ServoTimer = ServoTimer::new();
        let mut servo = servos.servo();

        servo.write_microseconds(100);
        assert_eq!(servo.read_microseconds(), 500);
        servo.write_microseconds(3000);
        assert_eq!(servo.read_microseconds(), 2000);
    }

    #[test]
    fn test_write_before_attach_survives_start() {
        let servos: ServoTimer = ServoTimer::new();
        let mut servo = servos.servo();
        let mut bench = Bench::new();

        servo.write_microseconds(800);
        servo.attach(2, &mut bench.timer, &mut bench.outputs).unwrap();
        assert_eq!(servo.read_microseconds(), 800);
    }

    #[test]
    fn test_custom_config() {
        let config = TimingConfig {
            frame_period_us: 20_000,
            max_pulse_us: 2500,
            ..TimingConfig::DEFAULT
        };
        let servos: ServoTimer<2> = ServoTimer::with_config(config).unwrap();
        let mut servo = servos.servo();
        servo.write_microseconds(2400);
        assert_eq!(servo.read_microseconds(), 2400);
        assert_eq!(servos.table().sync().as_micros(), 20_000 - 2 * 1500);

        let bad = TimingConfig {
            frame_period_us: 1000,
            ..TimingConfig::DEFAULT
        };
        assert_eq!(
            ServoTimer::<4>::with_config(bad).err(),
            Some(ConfigError::FrameTooShort)
        );
    }

    #[test]
    fn test_three_servos_end_to_end() {
        let servos: ServoTimer = ServoTimer::new();
        let mut bench = Bench::new();
        let pins = [2, 3, 4];
        let mut handles = [servos.servo(), servos.servo(), servos.servo()];
        let _unused = servos.servo();

        for (servo, pin) in handles.iter_mut().zip(pins) {
            servo.attach(pin, &mut bench.timer, &mut bench.outputs).unwrap();
        }

        let frame = u64::from(servos.table().frame_ticks());
        bench.run_for(3 * frame, |t, o| {
            servos.on_overflow(t, o);
        });

        let pulses = pins.map(|pin| bench.pulses(pin));
        for channel in &pulses {
            assert_eq!(channel.len(), 3);
            for (rise, fall) in channel {
                // Two ticks per µs; the pin toggling overhead is not simulated
                let high_us_x2 = fall - rise + 2 * u64::from(DELAY_ADJUST_US);
                assert!(high_us_x2.abs_diff(2 * u64::from(DEFAULT_PULSE_WIDTH_US)) <= 1);
            }
        }

        for frame_index in 0..3 {
            // Index order, disjoint windows
            let windows = pulses.each_ref().map(|p| p[frame_index]);
            assert!(windows[0].1 <= windows[1].0);
            assert!(windows[1].1 <= windows[2].0);

            if frame_index > 0 {
                let period = windows[0].0 - pulses[0][frame_index - 1].0;
                assert_eq!(period, frame);
                // Four channels lose the toggle overhead; five entries gain a final tick
                let period_us_x2 = period + 2 * 4 * u64::from(DELAY_ADJUST_US);
                assert!(period_us_x2.abs_diff(2 * u64::from(FRAME_PERIOD_US)) <= 5);
            }
        }

        // Every pin low after its last pulse, no stray edges on other pins
        assert!(pins.iter().all(|&pin| !bench.outputs.is_high(pin)));
        assert!(bench.outputs.edges.iter().all(|e| pins.contains(&e.pin)));
    }

    #[test]
    fn test_frame_period_independent_of_attached_count() {
        let frame_with = |attached: usize| {
            let servos: ServoTimer = ServoTimer::new();
            let mut bench = Bench::new();
            for pin in 0..attached {
                let mut servo = servos.servo();
                servo.attach(pin as u8 + 10, &mut bench.timer, &mut bench.outputs).unwrap();
            }
            for _ in 0..=MAX_CHANNELS {
                loop {
                    let t = bench.overflow(|t, o| servos.on_overflow(t, o));
                    if let Transition::Advanced { .. } = t {
                        break;
                    }
                }
            }
            bench.now
        };

        let baseline = frame_with(0);
        for attached in 1..=MAX_CHANNELS {
            assert_eq!(frame_with(attached), baseline);
        }
    }
}
