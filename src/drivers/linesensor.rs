//! RC-discharge acquisition for the reflectance sensor array.
//!
//! Each channel is a capacitor charged by driving its line high and then
//! released to input; the time it takes to read low again grows with how
//! little light the surface reflects. All channels share one free-running
//! 16-bit counter, so their timings are directly comparable.
//!
//! - [`LineSensor::prepare_next_cycle`] drives the lines high (charging)
//! - [`LineSensor::start`] releases them and stamps the counter baseline
//! - [`LineSensor::on_edge_event`] runs at interrupt priority on any falling
//!   edge and latches the delta of every line that already reads low
//! - [`LineSensor::read_latest`] copies the latched timings out and re-arms
//!
//! State touched by the edge handler is atomic: a channel's timing is stored
//! before its `captured` flag is released, and readers acquire the flag
//! before loading the timing.

use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU8, Ordering};

use crate::error::LineSensorError;
use crate::state::{NUM_SENSOR, SENTINEL};

/// Largest timing a real measurement may report; keeps [`SENTINEL`] unique.
pub const MAX_TIMING: u16 = SENTINEL - 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineMode {
    Input,
    Output,
}

/// Board access needed by the acquisition driver.
///
/// Methods take `&self` because the edge handler and the periodic task both
/// reach the hardware; implementations must make each call atomic with
/// respect to the other context (single register writes or a critical section).
pub trait LineSensorHal {
    fn is_valid_pin(&self, pin: u8) -> bool;
    fn set_pin_mode(&self, pin: u8, mode: LineMode);
    fn write_pin(&self, pin: u8, high: bool);
    /// `true` when the input reads high.
    fn read_pin(&self, pin: u8) -> bool;
    fn read_counter(&self) -> u16;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Idle = 0,
    Charging = 1,
    Measuring = 2,
}

impl Phase {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Phase::Charging,
            2 => Phase::Measuring,
            _ => Phase::Idle,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Charging => "charging",
            Phase::Measuring => "measuring",
        }
    }
}

/// Channel index to board pin mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineSensorConfig {
    pub pins: [u8; NUM_SENSOR],
}

struct Channel {
    baseline: AtomicU16,
    timing: AtomicU16,
    captured: AtomicBool,
}

impl Channel {
    const fn new() -> Self {
        Self {
            baseline: AtomicU16::new(0),
            timing: AtomicU16::new(SENTINEL),
            captured: AtomicBool::new(false),
        }
    }

    fn rearm(&self, counter: u16) {
        self.captured.store(false, Ordering::Release);
        self.timing.store(SENTINEL, Ordering::Relaxed);
        self.baseline.store(counter, Ordering::Relaxed);
    }
}

pub struct LineSensor<H: LineSensorHal> {
    hal: H,
    pins: [u8; NUM_SENSOR],
    channels: [Channel; NUM_SENSOR],
    phase: AtomicU8,
}

impl<H: LineSensorHal> LineSensor<H> {
    /// Validate the pin map and leave every line as a released input.
    pub fn new(hal: H, config: LineSensorConfig) -> Result<Self, LineSensorError> {
        for (i, &pin) in config.pins.iter().enumerate() {
            if !hal.is_valid_pin(pin) {
                return Err(LineSensorError::InvalidPin { pin });
            }
            if config.pins[..i].contains(&pin) {
                return Err(LineSensorError::DuplicatePin { pin });
            }
        }

        let sensor = Self {
            hal,
            pins: config.pins,
            channels: [const { Channel::new() }; NUM_SENSOR],
            phase: AtomicU8::new(Phase::Idle as u8),
        };
        for &pin in sensor.pins.iter() {
            sensor.hal.set_pin_mode(pin, LineMode::Input);
        }
        log_info!("line sensor: {} channels ready", NUM_SENSOR as u32);
        Ok(sensor)
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    #[cfg(test)]
    pub(crate) fn hal(&self) -> &H {
        &self.hal
    }

    /// Release the charged lines and start timing their discharge.
    pub fn start(&self) {
        // Baselines and flags must be in place before the handler may latch.
        let now = self.hal.read_counter();
        for ch in self.channels.iter() {
            ch.rearm(now);
        }
        self.phase.store(Phase::Measuring as u8, Ordering::Release);
        for &pin in self.pins.iter() {
            self.hal.set_pin_mode(pin, LineMode::Input);
        }
    }

    /// Edge interrupt body. Bounded O(N), no blocking, no floating point.
    pub fn on_edge_event(&self) {
        if self.phase() != Phase::Measuring {
            return;
        }
        for (ch, &pin) in self.channels.iter().zip(self.pins.iter()) {
            if ch.captured.load(Ordering::Acquire) {
                continue;
            }
            if !self.hal.read_pin(pin) {
                let now = self.hal.read_counter();
                let delta = now.wrapping_sub(ch.baseline.load(Ordering::Relaxed));
                ch.timing.store(delta.min(MAX_TIMING), Ordering::Relaxed);
                ch.captured.store(true, Ordering::Release);
            }
        }
    }

    /// Drive every line high to charge the sensing capacitors ("blank").
    pub fn prepare_next_cycle(&self) {
        self.phase.store(Phase::Charging as u8, Ordering::Release);
        let now = self.hal.read_counter();
        for (ch, &pin) in self.channels.iter().zip(self.pins.iter()) {
            ch.rearm(now);
            self.hal.set_pin_mode(pin, LineMode::Output);
            self.hal.write_pin(pin, true);
        }
    }

    /// Copy out the latched timings ([`SENTINEL`] where nothing was captured)
    /// and re-arm the next charge phase.
    pub fn read_latest(&self, out: &mut [u16; NUM_SENSOR]) {
        let phase = self.phase();
        if phase != Phase::Measuring {
            log_debug!("line sensor: readout while {}", phase.as_str());
        }
        for (slot, ch) in out.iter_mut().zip(self.channels.iter()) {
            *slot = if ch.captured.load(Ordering::Acquire) {
                ch.timing.load(Ordering::Relaxed)
            } else {
                SENTINEL
            };
        }
        self.prepare_next_cycle();
    }
}
