//! Servoplex - Servo Pulse Multiplexer Firmware
//!
//! Drives up to four hobby servos from a single PWM slice used as an 8-bit
//! overflow timer. Servo pins and pulse timing come from servos.toml,
//! validated and baked in at build time.
//!
//! The overflow interrupt owns the timer and the output pins. The main task
//! only touches them inside a critical section (to attach), and otherwise
//! writes pulse widths lock-free through its [`Servo`] handles.

#![no_std]
#![no_main]

use core::cell::RefCell;

use critical_section::Mutex;
use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::interrupt;
use embassy_time::{Duration, Ticker};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use servoplex_core::{Servo, ServoTimer};
use servoplex_hal_rp2040::{GpioOutputs, PwmOverflowTimer};

#[macro_use]
mod servo_config {
    include!(concat!(env!("OUT_DIR"), "/servo_config.rs"));
}

use servo_config::{SERVO_NAMES, SERVO_PINS, TIMING};

/// Sweep step per update, in microseconds
const SWEEP_STEP_US: u16 = 10;

/// Update interval for the sweep
const SWEEP_INTERVAL: Duration = Duration::from_millis(20);

/// Everything the overflow interrupt needs
struct IsrContext {
    servos: &'static ServoTimer,
    timer: PwmOverflowTimer<'static>,
    outputs: GpioOutputs,
}

// Scheduler context (must live forever, shared with the interrupt)
static SERVOS: StaticCell<ServoTimer> = StaticCell::new();

static ISR_CONTEXT: Mutex<RefCell<Option<IsrContext>>> = Mutex::new(RefCell::new(None));

#[interrupt]
fn PWM_IRQ_WRAP() {
    critical_section::with(|cs| {
        if let Some(ctx) = ISR_CONTEXT.borrow_ref_mut(cs).as_mut() {
            ctx.timer.clear_overflow();
            ctx.servos.on_overflow(&mut ctx.timer, &mut ctx.outputs);
        }
    });
}

/// Main entry point
#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    info!("Servoplex firmware starting...");

    let p = embassy_rp::init(Default::default());

    let servos: &'static ServoTimer = match ServoTimer::with_config(TIMING) {
        Ok(servos) => SERVOS.init(servos),
        Err(e) => {
            error!("Invalid servo timing {:?}, using defaults", e);
            SERVOS.init(ServoTimer::new())
        }
    };
    info!(
        "Timing: {}-{}us, frame {}us",
        servos.config().min_pulse_us,
        servos.config().max_pulse_us,
        servos.config().frame_period_us
    );

    let timer = PwmOverflowTimer::new(p.PWM_SLICE0, 0);
    let mut outputs = GpioOutputs::new();
    provide_servo_pins!(p, outputs);

    critical_section::with(|cs| {
        ISR_CONTEXT.borrow_ref_mut(cs).replace(IsrContext {
            servos,
            timer,
            outputs,
        });
    });

    // SAFETY: the handler only touches state behind ISR_CONTEXT
    unsafe { cortex_m::peripheral::NVIC::unmask(interrupt::PWM_IRQ_WRAP) };

    // Handles take channels in creation order, matching servos.toml order
    let mut handles: [Servo<'static>; SERVO_PINS.len()] = core::array::from_fn(|_| servos.servo());

    for ((servo, &pin), name) in handles.iter_mut().zip(SERVO_PINS.iter()).zip(SERVO_NAMES) {
        let result = critical_section::with(|cs| {
            let mut ctx = ISR_CONTEXT.borrow_ref_mut(cs);
            let ctx = ctx.as_mut()?;
            Some(servo.attach(pin, &mut ctx.timer, &mut ctx.outputs))
        });

        match result {
            Some(Ok(channel)) => info!("Servo '{}' on GPIO{} -> channel {}", name, pin, channel.get()),
            Some(Err(e)) => warn!("Servo '{}' on GPIO{} not attached: {:?}", name, pin, e),
            None => error!("Interrupt context missing"),
        }
    }

    let spare = servos.servo();
    if spare.channel().is_none() {
        info!("All channels in use, further handles are inert");
    }

    info!("Sweeping {} servo(s)", handles.len());
    run_sweep(&mut handles, TIMING.min_pulse_us, TIMING.max_pulse_us).await
}

/// Sweep every servo between the bounds, each one phase-shifted
async fn run_sweep(handles: &mut [Servo<'static>], min_us: u16, max_us: u16) -> ! {
    let span = u32::from(max_us - min_us).max(1);
    let period = 2 * span;
    let mut ticker = Ticker::every(SWEEP_INTERVAL);
    let mut phase: u32 = 0;

    loop {
        for (i, servo) in handles.iter_mut().enumerate() {
            let shifted = (phase + span / 2 * i as u32) % period;
            // Fold 0..2*span into a triangle wave
            let width = if shifted > span { period - shifted } else { shifted };
            servo.write_microseconds(min_us + width as u16);
        }

        phase = (phase + u32::from(SWEEP_STEP_US)) % period;
        if phase < u32::from(SWEEP_STEP_US) {
            if let Some(first) = handles.first() {
                debug!("Sweep done, channel {} at {}us", first.index(), first.read_microseconds());
            }
        }

        ticker.next().await;
    }
}
