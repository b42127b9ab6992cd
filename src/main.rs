#![no_std]
#![no_main]

mod board;
mod tasks;
mod usb;

use core::sync::atomic::AtomicU32;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_stm32::exti::{Channel as _, ExtiInput};
use embassy_stm32::gpio::{Input, Level, Output, Pin, Pull, Speed};
use embassy_stm32::interrupt;
use embassy_stm32::interrupt::{InterruptExt, Priority};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Timer};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use linefollower_rust::bus::{
    CommandChannel, FrameChannel, FrameTapChannel, SettingsStore, StatusChannel,
};
use linefollower_rust::drivers::linesensor::{LineSensor, LineSensorConfig};
use linefollower_rust::state::ControlSettings;

use crate::board::{Board, LineSensorBoard, LINE_PINS};
use crate::tasks::console_task::Reply;

pub type Sensor = LineSensor<LineSensorBoard>;

// ── Actuation sink ────────────────────────────────────────────────────────────
//  Desired yaw rate as f32 bits, read by the rate loop. Zero outside Run.
pub static RATE_DESIRED_YAW: AtomicU32 = AtomicU32::new(0);

// ── Shared settings and inter-task channels ───────────────────────────────────
pub static SETTINGS: SettingsStore = SettingsStore::new(ControlSettings::DEFAULT);
pub static COMMANDS: CommandChannel = Channel::new();
pub static FRAMES: FrameChannel = Channel::new();
pub static STATUS: StatusChannel = Channel::new();
pub static FRAME_TAP: FrameTapChannel = Channel::new();
pub static REPLIES: Channel<CriticalSectionRawMutex, Reply, 4> = Channel::new();

// ── Edge executor ─────────────────────────────────────────────────────────────
//  UART5 is unused on this board; its vector drives the edge executor so the
//  capture handler preempts the thread-mode tasks.
static EXECUTOR_EDGE: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn UART5() {
    EXECUTOR_EDGE.on_interrupt()
}

static SENSOR: StaticCell<Sensor> = StaticCell::new();

// ── Main ──────────────────────────────────────────────────────────────────────
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // 1. Board init (168 MHz PLL)
    let board = Board::init();
    let p = board.p;

    // 2. USB console (CDC-ACM)
    let (usb_dev, usb_tx, usb_rx) = usb::init(p.USB_OTG_FS, p.PA12, p.PA11);
    spawner.spawn(usb::usb_task(usb_dev)).unwrap();

    // 3. Sensor array on PC0..PC5, edge capture on EXTI0..5
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
    // Charge before the first release.
    sensor.prepare_next_cycle();

    interrupt::UART5.set_priority(Priority::P6);
    let edge_spawner = EXECUTOR_EDGE.start(interrupt::UART5);
    edge_spawner
        .spawn(tasks::edge_task::edge_task(sensor, lines))
        .unwrap();

    // 4. Heartbeat LED (PC13)
    let mut led = Output::new(p.PC13, Level::High, Speed::Low);

    // 5. Periodic tasks
    spawner
        .spawn(tasks::sensor_task::sensor_task(sensor))
        .unwrap();
    spawner
        .spawn(tasks::follower_task::follower_task())
        .unwrap();
    spawner
        .spawn(tasks::telemetry_task::telemetry_task(usb_tx))
        .unwrap();
    spawner
        .spawn(tasks::console_task::console_task(usb_rx))
        .unwrap();

    defmt::info!("line follower up");

    // 6. Main task: LED heartbeat @ 1 Hz
    loop {
        led.toggle();
        Timer::after(Duration::from_millis(500)).await;
    }
}
