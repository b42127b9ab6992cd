use core::fmt::Write;

use embassy_executor::task;

use linefollower_rust::drivers::console::{ConsoleParser, ConsoleRequest, Setting};
use linefollower_rust::error::ConsoleError;
use linefollower_rust::state::ControlSettings;

use crate::usb::{UsbReceiver, PACKET_SIZE};
use crate::{COMMANDS, REPLIES, SETTINGS};

/// One console output line, written out by the telemetry task.
pub type Reply = heapless::String<128>;

#[task]
pub async fn console_task(mut rx: UsbReceiver) {
    let mut parser = ConsoleParser::new();
    let mut buf = [0u8; PACKET_SIZE as usize];

    loop {
        rx.wait_connection().await;
        defmt::info!("console connected");

        while let Ok(n) = rx.read_packet(&mut buf).await {
            parser.push_bytes(&buf[..n], handle);
        }
        defmt::info!("console disconnected");
    }
}

fn handle(request: Result<ConsoleRequest, ConsoleError>) {
    match request {
        Ok(ConsoleRequest::Command(command)) => {
            if COMMANDS.try_send(command).is_err() {
                defmt::warn!("command queue full, {} dropped", command.as_str());
                reply(format_args!("error: busy\r\n"));
            } else {
                reply(format_args!("ok {}\r\n", command.as_str()));
            }
        }
        Ok(ConsoleRequest::Show) => show(&SETTINGS.get()),
        Ok(ConsoleRequest::Set(setting)) => set(setting),
        Err(e) => {
            defmt::warn!("console: {}", e.as_str());
            reply(format_args!("error: {}\r\n", e));
        }
    }
}

fn set(setting: Setting) {
    let res = SETTINGS.try_update(|s| {
        setting.apply(s);
        s.validate()
    });
    match res {
        Ok(_) => reply(format_args!("ok\r\n")),
        Err(e) => {
            defmt::error!("settings rejected: {}", e.as_str());
            reply(format_args!("error: {}\r\n", e));
        }
    }
}

fn show(s: &ControlSettings) {
    let pid = &s.follower.pid;
    reply(format_args!(
        "kp={:.3} ki={:.3} kd={:.3} ilimit={:.3} delay={:.2}\r\n",
        pid.kp, pid.ki, pid.kd, pid.i_limit, s.follower.start_delay_s
    ));
    let sensor = &s.sensor;
    reply(format_args!(
        "mode={} min={:.1} max={:.1} warn={:.2} lost={:.2} range={:.3} offset={:.3}\r\n",
        sensor.calibration_mode.as_str(),
        sensor.min,
        sensor.max,
        sensor.warning_threshold,
        sensor.lost_threshold,
        sensor.range,
        sensor.offset
    ));
}

fn reply(args: core::fmt::Arguments) {
    let mut line = Reply::new();
    let _ = line.write_fmt(args);
    // Host not reading: drop rather than stall the console.
    let _ = REPLIES.try_send(line);
}
