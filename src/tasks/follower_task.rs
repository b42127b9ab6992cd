use core::sync::atomic::Ordering;

use embassy_executor::task;
use embassy_time::{with_timeout, Duration, Instant};

use linefollower_rust::bus::{send_latest, Watcher};
use linefollower_rust::drivers::follower::LineFollower;

use crate::{COMMANDS, FRAMES, RATE_DESIRED_YAW, SETTINGS, STATUS};

/// Longest wait for a frame before publishing status anyway.
const FRAME_WAIT_MS: u64 = 4;

#[task]
pub async fn follower_task() {
    let mut follower = LineFollower::new(&SETTINGS.get().follower);
    let mut watcher = Watcher::new();

    loop {
        let frame = with_timeout(Duration::from_millis(FRAME_WAIT_MS), FRAMES.receive())
            .await
            .ok();

        if let Some(s) = watcher.changed(&SETTINGS) {
            follower.configure(&s.follower);
        }

        let now = Instant::now();
        while let Ok(command) = COMMANDS.try_receive() {
            defmt::info!("command: {}", command.as_str());
            follower.command(command, now);
        }

        let out = follower.step(now, frame.as_ref());
        let yaw = out.rate_yaw.unwrap_or(0.0);
        RATE_DESIRED_YAW.store(yaw.to_bits(), Ordering::Relaxed);

        send_latest(&STATUS, out.status);
    }
}
