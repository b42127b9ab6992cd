use crate::state::PidGains;

/// PID filter on an error signal.
///
/// The integral term is accumulated in output units (`ki * err * dt`) and
/// held within `±i_limit`. The derivative acts on the error, and `dt` is
/// always supplied by the caller.
pub struct Pid {
    kp: f32,
    ki: f32,
    kd: f32,
    integral: f32,
    integral_limit: f32,
    last_error: f32,
}

impl Pid {
    pub fn new(kp: f32, ki: f32, kd: f32, integral_limit: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            integral: 0.0,
            integral_limit: integral_limit.max(0.0),
            last_error: 0.0,
        }
    }

    pub fn from_gains(gains: &PidGains) -> Self {
        Self::new(gains.kp, gains.ki, gains.kd, gains.i_limit)
    }

    /// Swap gains in place. Accumulated state is kept, only re-clamped to the
    /// new limit.
    pub fn configure(&mut self, gains: &PidGains) {
        self.kp = gains.kp;
        self.ki = gains.ki;
        self.kd = gains.kd;
        self.integral_limit = gains.i_limit.max(0.0);
        self.integral = self
            .integral
            .clamp(-self.integral_limit, self.integral_limit);
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = 0.0;
    }

    #[cfg(test)]
    fn integral(&self) -> f32 {
        self.integral
    }

    pub fn apply(&mut self, error: f32, dt: f32) -> f32 {
        self.integral += self.ki * error * dt;
        self.integral = self
            .integral
            .clamp(-self.integral_limit, self.integral_limit);

        let derivative = if dt > 0.0 {
            self.kd * (error - self.last_error) / dt
        } else {
            0.0
        };
        self.last_error = error;

        self.kp * error + self.integral + derivative
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proportional_only() {
        let mut pid = Pid::new(2.0, 0.0, 0.0, 1.0);
        assert_eq!(pid.apply(0.25, 0.01), 0.5);
        assert_eq!(pid.apply(-0.5, 0.01), -1.0);
    }

    #[test]
    fn test_integral_is_clamped() {
        let mut pid = Pid::new(0.0, 10.0, 0.0, 0.5);
        for _ in 0..100 {
            pid.apply(1.0, 0.1);
        }
        assert_eq!(pid.integral(), 0.5);
        assert_eq!(pid.apply(1.0, 0.1), 0.5);

        for _ in 0..100 {
            pid.apply(-1.0, 0.1);
        }
        assert_eq!(pid.integral(), -0.5);
    }

    #[test]
    fn test_derivative_on_error() {
        let mut pid = Pid::new(0.0, 0.0, 0.1, 1.0);
        assert_eq!(pid.apply(0.0, 0.01), 0.0);
        let out = pid.apply(0.5, 0.01);
        assert!((out - 5.0).abs() < 1.0e-4);
        // No division when dt collapses.
        assert_eq!(pid.apply(1.0, 0.0), 0.0);
    }

    #[test]
    fn test_configure_reclamps_integral() {
        let mut pid = Pid::new(0.0, 1.0, 0.0, 2.0);
        for _ in 0..50 {
            pid.apply(1.0, 0.1);
        }
        assert_eq!(pid.integral(), 2.0);

        pid.configure(&PidGains { kp: 0.0, ki: 1.0, kd: 0.0, i_limit: 0.5 });
        assert_eq!(pid.integral(), 0.5);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut pid = Pid::new(0.0, 1.0, 1.0, 5.0);
        pid.apply(1.0, 0.1);
        pid.reset();
        assert_eq!(pid.integral(), 0.0);
        // Fresh derivative history: no kick from the previous error.
        assert_eq!(pid.apply(0.0, 0.1), 0.0);
    }
}
