use embassy_time::Instant;

pub struct LowPassFilter {
    alpha: f32,
    last_output: f32,
    initialized: bool,
}

impl LowPassFilter {
    #[cfg(test)]
    fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            last_output: 0.0,
            initialized: false,
        }
    }

    /// Start from `initial` instead of the first sample.
    pub fn with_initial(alpha: f32, initial: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            last_output: initial,
            initialized: true,
        }
    }

    pub fn filter(&mut self, input: f32) -> f32 {
        if !self.initialized {
            self.last_output = input;
            self.initialized = true;
        } else {
            self.last_output = self.alpha * input + (1.0 - self.alpha) * self.last_output;
        }
        self.last_output
    }

    pub fn output(&self) -> f32 {
        self.last_output
    }
}

/// Smoothed loop interval in seconds.
///
/// Every call to [`update`](Self::update) measures the time since the
/// previous call, bounds it to `[min, max]` and folds it into a first-order
/// average seeded with the expected interval.
pub struct DeltaTime {
    min: f32,
    max: f32,
    average: LowPassFilter,
    last: Option<Instant>,
}

impl DeltaTime {
    pub fn new(expected: f32, min: f32, max: f32, alpha: f32) -> Self {
        Self {
            min,
            max,
            average: LowPassFilter::with_initial(alpha, expected),
            last: None,
        }
    }

    /// First call only records the reference time and returns the expected
    /// interval.
    pub fn update(&mut self, now: Instant) -> f32 {
        let Some(last) = self.last.replace(now) else {
            return self.average.output();
        };
        let elapsed = now.checked_duration_since(last).map_or(0, |d| d.as_micros());
        let measured = (elapsed as f32 * 1.0e-6).clamp(self.min, self.max);
        self.average.filter(measured)
    }

    #[cfg(test)]
    fn average(&self) -> f32 {
        self.average.output()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowpass_starts_at_first_sample() {
        let mut lpf = LowPassFilter::new(0.5);
        assert_eq!(lpf.filter(4.0), 4.0);
        assert_eq!(lpf.filter(0.0), 2.0);
    }

    #[test]
    fn test_delta_time_seeded_with_expected() {
        let mut dt = DeltaTime::new(0.002, 1.0e-6, 1.0, 0.01);
        assert_eq!(dt.update(Instant::from_millis(100)), 0.002);
    }

    #[test]
    fn test_delta_time_tracks_interval() {
        let mut dt = DeltaTime::new(0.002, 1.0e-6, 1.0, 0.5);
        let mut t = 0;
        dt.update(Instant::from_millis(t));
        for _ in 0..40 {
            t += 4;
            dt.update(Instant::from_millis(t));
        }
        assert!((dt.average() - 0.004).abs() < 1.0e-5);
    }

    #[test]
    fn test_delta_time_bounds_outliers() {
        let mut dt = DeltaTime::new(0.002, 1.0e-6, 1.0, 1.0);
        dt.update(Instant::from_secs(0));
        assert_eq!(dt.update(Instant::from_secs(30)), 1.0);
        assert_eq!(dt.update(Instant::from_secs(30)), 1.0e-6);
    }
}
