#![no_std]
#![no_main]

//! # Line sensor capture
//!
//! Runs the acquisition cycle with auto-ranging calibration for one minute
//! and streams the raw timings over USB CDC-ACM as CSV. Sweep the array
//! across the line and the background while it runs. The footer gives the
//! per-channel spread and the bounds to enter on the main firmware console.
//!
//! ## Usage
//! ```sh
//! cargo flash --release --bin calibrate --chip STM32F405RG
//! cat /dev/ttyACM0 > line_capture.csv
//! ```
//!
//! ## CSV format
//! `ts_ms,raw0,raw1,raw2,raw3,raw4,raw5,min,max,position,track`
//!
//! `65535` in a raw column means the line never discharged in that cycle.

#[path = "../board.rs"]
mod board;
#[path = "../tasks/edge_task.rs"]
mod edge_task;
#[path = "../usb.rs"]
mod usb;

use core::fmt::Write;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_stm32::exti::{Channel as _, ExtiInput};
use embassy_stm32::gpio::{Input, Level, Output, Pin, Pull, Speed};
use embassy_stm32::interrupt;
use embassy_stm32::interrupt::{InterruptExt, Priority};
use embassy_time::{Duration, Instant, Ticker, Timer};
use micromath::F32Ext;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use linefollower_rust::drivers::linesensor::{LineSensor, LineSensorConfig};
use linefollower_rust::drivers::processor::SensorProcessor;
use linefollower_rust::state::{CalibrationMode, LineSensorSettings, NUM_SENSOR, SENTINEL};

use crate::board::{Board, LineSensorBoard, LINE_PINS};
use crate::usb::UsbSender;

pub type Sensor = LineSensor<LineSensorBoard>;

// ── Parameters ────────────────────────────────────────────────────────────────

const CAPTURE_DURATION_MS: u64 = 60_000;

/// Same A/B period as the flight firmware.
const SENSOR_PERIOD_MS: u64 = 1;

/// One CSV line every N frames (frames arrive at 500 Hz).
const CSV_DECIMATION: u32 = 10;

const SETTINGS: LineSensorSettings = LineSensorSettings {
    calibration_mode: CalibrationMode::Enabled,
    ..LineSensorSettings::DEFAULT
};

// ── Edge executor ─────────────────────────────────────────────────────────────
static EXECUTOR_EDGE: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn UART5() {
    EXECUTOR_EDGE.on_interrupt()
}

static SENSOR: StaticCell<Sensor> = StaticCell::new();

/// Running mean and variance of one channel (Welford).
#[derive(Clone, Copy, Default)]
struct ChannelStats {
    n: u32,
    mean: f32,
    m2: f32,
    missed: u32,
}

impl ChannelStats {
    fn push(&mut self, raw: u16) {
        if raw == SENTINEL {
            self.missed += 1;
            return;
        }
        let x = raw as f32;
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f32;
        self.m2 += delta * (x - self.mean);
    }

    fn std_dev(&self) -> f32 {
        if self.n < 2 {
            return 0.0;
        }
        (self.m2 / (self.n - 1) as f32).sqrt()
    }
}

async fn write_line(usb_tx: &mut UsbSender, bytes: &[u8]) {
    if !usb_tx.dtr() {
        return;
    }
    for chunk in bytes.chunks(usb::PACKET_SIZE as usize) {
        let _ = usb_tx.write_packet(chunk).await;
    }
}

// ── Main ──────────────────────────────────────────────────────────────────────
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let board = Board::init();
    let p = board.p;

    // USB CDC, output only
    let (usb_dev, mut usb_tx, _usb_rx) = usb::init(p.USB_OTG_FS, p.PA12, p.PA11);
    spawner.spawn(usb::usb_task(usb_dev)).unwrap();

    // LED (PC13)
    let mut led = Output::new(p.PC13, Level::High, Speed::Low);

    let lines = [
        ExtiInput::new(Input::new(p.PC0.degrade(), Pull::None), p.EXTI0.degrade()),
        ExtiInput::new(Input::new(p.PC1.degrade(), Pull::None), p.EXTI1.degrade()),
        ExtiInput::new(Input::new(p.PC2.degrade(), Pull::None), p.EXTI2.degrade()),
        ExtiInput::new(Input::new(p.PC3.degrade(), Pull::None), p.EXTI3.degrade()),
        ExtiInput::new(Input::new(p.PC4.degrade(), Pull::None), p.EXTI4.degrade()),
        ExtiInput::new(Input::new(p.PC5.degrade(), Pull::None), p.EXTI5.degrade()),
    ];
    let sensor: &'static Sensor = SENSOR.init(
        LineSensor::new(LineSensorBoard::new(), LineSensorConfig { pins: LINE_PINS }).unwrap(),
    );
    sensor.prepare_next_cycle();

    interrupt::UART5.set_priority(Priority::P6);
    let edge_spawner = EXECUTOR_EDGE.start(interrupt::UART5);
    edge_spawner.spawn(edge_task::edge_task(sensor, lines)).unwrap();

    // ── Wait for the host (max 30 s, then start anyway) ───────────────────────
    for _ in 0..300u32 {
        led.toggle();
        Timer::after(Duration::from_millis(100)).await;
        if usb_tx.dtr() { break; }
    }
    led.set_high();
    Timer::after(Duration::from_millis(200)).await;

    let hdr = b"# Line sensor capture, auto-ranging calibration\r\n\
                # ts_ms,raw0,raw1,raw2,raw3,raw4,raw5,min,max,position,track\r\n";
    write_line(&mut usb_tx, hdr).await;

    // ── Capture loop ──────────────────────────────────────────────────────────
    let mut processor = SensorProcessor::new();
    let mut stats = [ChannelStats::default(); NUM_SENSOR];
    let start = Instant::now();
    let mut ticker = Ticker::every(Duration::from_millis(SENSOR_PERIOD_MS));
    let mut frames: u32 = 0;

    loop {
        ticker.next().await;

        let elapsed_ms = start.elapsed().as_millis();
        if elapsed_ms >= CAPTURE_DURATION_MS { break; }

        let Some(out) = processor.step(sensor, &SETTINGS) else {
            continue;
        };
        let frame = out.frame;
        for (s, &raw) in stats.iter_mut().zip(frame.raw.iter()) {
            s.push(raw);
        }
        frames += 1;

        if frames % CSV_DECIMATION == 0 {
            let r = &frame.raw;
            let mut line = heapless::String::<128>::new();
            let _ = write!(line,
                "{},{},{},{},{},{},{},{:.0},{:.0},{:.3},{}\r\n",
                elapsed_ms,
                r[0], r[1], r[2], r[3], r[4], r[5],
                frame.bounds.min, frame.bounds.max,
                frame.position, frame.track.as_str(),
            );
            write_line(&mut usb_tx, line.as_bytes()).await;
        }

        // LED 1 Hz
        if frames % 500 == 0 { led.toggle(); }
    }

    // ── Footer ────────────────────────────────────────────────────────────────
    for (i, s) in stats.iter().enumerate() {
        let mut msg = heapless::String::<96>::new();
        let _ = write!(msg,
            "# ch{}: mean={:.1} std={:.1} n={} missed={}\r\n",
            i, s.mean, s.std_dev(), s.n, s.missed
        );
        write_line(&mut usb_tx, msg.as_bytes()).await;
    }
    let bounds = processor.bounds();
    let mut msg = heapless::String::<96>::new();
    let _ = write!(msg,
        "# {} frames\r\n# set min {:.0}\r\n# set max {:.0}\r\n",
        frames, bounds.min, bounds.max
    );
    write_line(&mut usb_tx, msg.as_bytes()).await;
    defmt::info!("capture done: {} frames", frames);

    // Fast blink: session over
    loop {
        led.toggle();
        Timer::after(Duration::from_millis(50)).await;
    }
}
