use embassy_executor::task;
use embassy_time::{Duration, Ticker};

use linefollower_rust::bus::{send_latest, Watcher};
use linefollower_rust::drivers::processor::SensorProcessor;

use crate::{Sensor, FRAMES, FRAME_TAP, SETTINGS};

/// One A or B step per tick; a frame every other tick.
const SENSOR_PERIOD_MS: u64 = 1;

#[task]
pub async fn sensor_task(sensor: &'static Sensor) {
    let mut processor = SensorProcessor::new();
    let mut watcher = Watcher::new();
    let mut settings = SETTINGS.get().sensor;
    let mut dropped: u32 = 0;

    let mut ticker = Ticker::every(Duration::from_millis(SENSOR_PERIOD_MS));

    loop {
        ticker.next().await;

        if let Some(s) = watcher.changed(&SETTINGS) {
            settings = s.sensor;
            defmt::debug!(
                "sensor settings: mode={} min={} max={}",
                settings.calibration_mode.as_str(),
                settings.min,
                settings.max
            );
        }

        let Some(out) = processor.step(sensor, &settings) else {
            continue;
        };

        if let Some(bounds) = out.save {
            // Persist the frozen bounds so Manual mode can restore them.
            let res = SETTINGS.try_update(|s| {
                s.sensor.min = bounds.min;
                s.sensor.max = bounds.max;
                s.validate()
            });
            if let Err(e) = res {
                defmt::error!("calibration not saved: {}", e.as_str());
            }
        }

        if FRAMES.try_send(out.frame).is_err() {
            dropped = dropped.wrapping_add(1);
            if dropped % 1000 == 1 {
                defmt::warn!("frame queue full, {} dropped", dropped);
            }
        }
        send_latest(&FRAME_TAP, out.frame);
    }
}
