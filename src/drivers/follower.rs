//! Line follower arm/disarm state machine and yaw-rate loop.

use embassy_time::{Duration, Instant};

use crate::drivers::filter::DeltaTime;
use crate::drivers::pid::Pid;
use crate::state::{
    ControlCommand, ControlStatus, FollowerStatus, LineFollowerSettings, SensorFrame,
};

/// Frame interval the dT estimator is seeded with (s).
pub const UPDATE_EXPECTED: f32 = 1.0 / 500.0;
pub const UPDATE_MIN: f32 = 1.0e-6;
pub const UPDATE_MAX: f32 = 1.0;
pub const UPDATE_ALPHA: f32 = 1.0e-2;

/// One iteration's result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FollowerOutput {
    pub status: ControlStatus,
    /// Yaw rate to hand to the rate loop; only set while running.
    pub rate_yaw: Option<f32>,
}

pub struct LineFollower {
    status: FollowerStatus,
    arming_since: Instant,
    start_delay: Duration,
    pid: Pid,
    delta: DeltaTime,
    yaw_rate: f32,
    throttle: f32,
    dt: f32,
}

impl LineFollower {
    pub fn new(settings: &LineFollowerSettings) -> Self {
        Self {
            status: FollowerStatus::Idle,
            arming_since: Instant::from_ticks(0),
            start_delay: start_delay(settings),
            pid: Pid::from_gains(&settings.pid),
            delta: DeltaTime::new(UPDATE_EXPECTED, UPDATE_MIN, UPDATE_MAX, UPDATE_ALPHA),
            yaw_rate: 0.0,
            throttle: 0.0,
            dt: UPDATE_EXPECTED,
        }
    }

    /// Apply a new settings snapshot as a whole.
    pub fn configure(&mut self, settings: &LineFollowerSettings) {
        self.pid.configure(&settings.pid);
        self.start_delay = start_delay(settings);
        log_info!(
            "follower: kp={} ki={} kd={} delay={}s",
            settings.pid.kp,
            settings.pid.ki,
            settings.pid.kd,
            settings.start_delay_s
        );
    }

    pub fn command(&mut self, command: ControlCommand, now: Instant) {
        match command {
            ControlCommand::Idle | ControlCommand::Stop => self.set_status(FollowerStatus::Idle),
            // Handled by the sensor calibration mode.
            ControlCommand::Calibrate => {}
            ControlCommand::Run => {
                if self.status != FollowerStatus::Run {
                    self.arming_since = now;
                    self.set_status(FollowerStatus::Arming);
                }
            }
        }
    }

    /// One controller iteration, with or without a fresh frame.
    pub fn step(&mut self, now: Instant, frame: Option<&SensorFrame>) -> FollowerOutput {
        if self.status == FollowerStatus::Arming
            && now.checked_duration_since(self.arming_since).unwrap_or(Duration::from_ticks(0))
                >= self.start_delay
        {
            // Start the loop from a clean integrator and derivative, and never
            // forward a yaw rate left over from an earlier run.
            self.pid.reset();
            self.yaw_rate = 0.0;
            self.set_status(FollowerStatus::Run);
        }

        if let Some(frame) = frame {
            self.dt = self.delta.update(now);
            if self.status == FollowerStatus::Run {
                self.yaw_rate = self.pid.apply(-frame.position, self.dt);
            }
        }

        FollowerOutput {
            status: ControlStatus {
                status: self.status,
                yaw_rate: self.yaw_rate,
                throttle: self.throttle,
                dt: self.dt,
            },
            rate_yaw: (self.status == FollowerStatus::Run).then_some(self.yaw_rate),
        }
    }

    fn set_status(&mut self, status: FollowerStatus) {
        if self.status != status {
            log_info!("follower: {} -> {}", self.status.as_str(), status.as_str());
        }
        self.status = status;
    }
}

fn start_delay(settings: &LineFollowerSettings) -> Duration {
    Duration::from_micros((settings.start_delay_s * 1.0e6) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{PidGains, TrackStatus};

    fn settings(delay: f32) -> LineFollowerSettings {
        LineFollowerSettings {
            pid: PidGains { kp: 2.0, ki: 0.0, kd: 0.0, i_limit: 1.0 },
            start_delay_s: delay,
        }
    }

    fn frame(position: f32) -> SensorFrame {
        SensorFrame {
            position,
            track: TrackStatus::Ok,
            ..SensorFrame::default()
        }
    }

    fn ms(t: u64) -> Instant {
        Instant::from_millis(t)
    }

    #[test]
    fn test_starts_idle() {
        let mut lf = LineFollower::new(&settings(0.5));
        let out = lf.step(ms(0), None);
        assert_eq!(out.status.status, FollowerStatus::Idle);
        assert_eq!(out.rate_yaw, None);
    }

    #[test]
    fn test_arming_delay() {
        let mut lf = LineFollower::new(&settings(0.5));
        lf.command(ControlCommand::Run, ms(1000));

        for t in (1000..1500).step_by(4) {
            assert_eq!(lf.step(ms(t), None).status.status, FollowerStatus::Arming);
        }
        assert_eq!(lf.step(ms(1500), None).status.status, FollowerStatus::Run);
    }

    #[test]
    fn test_stop_always_idles() {
        let mut lf = LineFollower::new(&settings(0.5));

        lf.command(ControlCommand::Run, ms(0));
        lf.step(ms(100), None);
        lf.command(ControlCommand::Stop, ms(100));
        assert_eq!(lf.step(ms(104), None).status.status, FollowerStatus::Idle);
        // A cancelled arming delay must not complete later.
        assert_eq!(lf.step(ms(2000), None).status.status, FollowerStatus::Idle);

        lf.command(ControlCommand::Run, ms(3000));
        assert_eq!(lf.step(ms(3600), None).status.status, FollowerStatus::Run);
        lf.command(ControlCommand::Stop, ms(3604));
        assert_eq!(lf.step(ms(3608), None).status.status, FollowerStatus::Idle);
    }

    #[test]
    fn test_idle_command_idles() {
        let mut lf = LineFollower::new(&settings(0.0));
        lf.command(ControlCommand::Run, ms(0));
        assert_eq!(lf.step(ms(0), None).status.status, FollowerStatus::Run);
        lf.command(ControlCommand::Idle, ms(4));
        assert_eq!(lf.step(ms(8), None).status.status, FollowerStatus::Idle);
    }

    #[test]
    fn test_calibrate_leaves_state_alone() {
        let mut lf = LineFollower::new(&settings(0.5));
        lf.command(ControlCommand::Run, ms(0));
        lf.command(ControlCommand::Calibrate, ms(10));
        assert_eq!(lf.step(ms(20), None).status.status, FollowerStatus::Arming);
    }

    #[test]
    fn test_run_while_running_does_not_rearm() {
        let mut lf = LineFollower::new(&settings(0.5));
        lf.command(ControlCommand::Run, ms(0));
        lf.step(ms(500), None);
        lf.command(ControlCommand::Run, ms(600));
        assert_eq!(lf.step(ms(604), None).status.status, FollowerStatus::Run);
    }

    #[test]
    fn test_yaw_rate_only_in_run() {
        let mut lf = LineFollower::new(&settings(0.5));

        let out = lf.step(ms(0), Some(&frame(0.25)));
        assert_eq!(out.rate_yaw, None);
        assert_eq!(out.status.yaw_rate, 0.0);

        lf.command(ControlCommand::Run, ms(4));
        let out = lf.step(ms(504), Some(&frame(0.25)));
        assert_eq!(out.status.status, FollowerStatus::Run);
        // kp * -position
        assert_eq!(out.rate_yaw, Some(-0.5));
        assert_eq!(out.status.throttle, 0.0);
    }

    #[test]
    fn test_status_published_without_frame() {
        let mut lf = LineFollower::new(&settings(0.0));
        lf.command(ControlCommand::Run, ms(0));
        lf.step(ms(0), Some(&frame(-0.5)));

        // No new frame: last yaw rate keeps being forwarded.
        let out = lf.step(ms(4), None);
        assert_eq!(out.rate_yaw, Some(1.0));
        assert_eq!(out.status.yaw_rate, 1.0);
    }

    #[test]
    fn test_configure_swaps_gains() {
        let mut lf = LineFollower::new(&settings(0.0));
        lf.command(ControlCommand::Run, ms(0));
        lf.step(ms(0), None);

        lf.configure(&LineFollowerSettings {
            pid: PidGains { kp: 4.0, ki: 0.0, kd: 0.0, i_limit: 1.0 },
            start_delay_s: 0.0,
        });
        let out = lf.step(ms(2), Some(&frame(0.5)));
        assert_eq!(out.rate_yaw, Some(-2.0));
    }

    #[test]
    fn test_dt_reported_from_frames() {
        let mut lf = LineFollower::new(&settings(0.5));
        let first = lf.step(ms(0), Some(&frame(0.0)));
        assert_eq!(first.status.dt, UPDATE_EXPECTED);

        let mut t = 0;
        let mut out = first;
        for _ in 0..1000 {
            t += 4;
            out = lf.step(ms(t), Some(&frame(0.0)));
        }
        assert!((out.status.dt - 0.004).abs() < 1.0e-4);
    }

    #[test]
    fn test_rerun_does_not_forward_previous_yaw() {
        let mut lf = LineFollower::new(&settings(0.0));
        lf.command(ControlCommand::Run, ms(0));
        let out = lf.step(ms(0), Some(&frame(-2.5)));
        assert_eq!(out.rate_yaw, Some(5.0));

        lf.command(ControlCommand::Stop, ms(4));
        lf.step(ms(4), None);

        lf.command(ControlCommand::Run, ms(60_000));
        let out = lf.step(ms(60_000), None);
        assert_eq!(out.status.status, FollowerStatus::Run);
        assert_eq!(out.rate_yaw, Some(0.0));
        assert_eq!(out.status.yaw_rate, 0.0);
    }

    #[test]
    fn test_run_while_arming_restarts_delay() {
        let mut lf = LineFollower::new(&settings(0.5));
        lf.command(ControlCommand::Run, ms(0));
        assert_eq!(lf.step(ms(300), None).status.status, FollowerStatus::Arming);

        lf.command(ControlCommand::Run, ms(300));
        // The first request would have completed here.
        assert_eq!(lf.step(ms(500), None).status.status, FollowerStatus::Arming);
        assert_eq!(lf.step(ms(796), None).status.status, FollowerStatus::Arming);
        assert_eq!(lf.step(ms(800), None).status.status, FollowerStatus::Run);
    }
}
