//! Calibration bounds, normalization and the centroid reduction.

use crate::state::{
    CalibrationBounds, CalibrationMode, LineSensorSettings, TrackStatus, NUM_SENSOR, SENTINEL,
};

/// Per-cycle shrink of the auto-ranging bounds.
const MAX_DECAY: f32 = 0.999;
const MIN_GROWTH: f32 = 1.001;

/// Sensor-index centroid of a line exactly under the array midpoint.
const CENTER_INDEX: f32 = (NUM_SENSOR as f32 - 1.0) / 2.0;

pub struct Calibration {
    running_max: f32,
    running_min: f32,
    saved: bool,
}

impl Calibration {
    pub fn new() -> Self {
        Self {
            running_max: 1.0,
            running_min: SENTINEL as f32,
            saved: false,
        }
    }

    pub fn bounds(&self) -> CalibrationBounds {
        CalibrationBounds {
            min: self.running_min,
            max: self.running_max,
        }
    }

    /// Run one calibration step for the configured mode.
    ///
    /// Returns the bounds to persist the first time `Done` is seen after any
    /// other mode.
    pub fn update(
        &mut self,
        raw: &[u16; NUM_SENSOR],
        settings: &LineSensorSettings,
    ) -> Option<CalibrationBounds> {
        match settings.calibration_mode {
            CalibrationMode::Enabled => {
                self.saved = false;
                for &value in raw.iter().filter(|&&v| v != SENTINEL) {
                    let value = value as f32;
                    self.running_max = self.running_max.max(value);
                    self.running_min = self.running_min.min(value);
                }
                self.running_max *= MAX_DECAY;
                self.running_min *= MIN_GROWTH;
                None
            }
            CalibrationMode::Manual => {
                self.saved = false;
                self.running_max = settings.max;
                self.running_min = settings.min;
                None
            }
            CalibrationMode::Done => {
                if self.saved {
                    return None;
                }
                self.saved = true;
                let bounds = self.bounds();
                log_info!(
                    "calibration done: min={} max={}",
                    bounds.min,
                    bounds.max
                );
                Some(bounds)
            }
        }
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of reducing one raw sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reduction {
    pub normalized: [f32; NUM_SENSOR],
    pub energy: f32,
    /// `None` when the math is degenerate (empty range, no energy).
    pub position: Option<f32>,
    pub track: TrackStatus,
}

/// Normalize `raw` against `bounds` and compute position and track status.
///
/// Sentinel channels read as `bounds.max`. An empty or inverted range, or a
/// zero/non-finite energy sum, yields `NoTrack` with no position rather than
/// letting NaN or infinity through.
pub fn reduce(
    raw: &[u16; NUM_SENSOR],
    bounds: CalibrationBounds,
    settings: &LineSensorSettings,
) -> Reduction {
    let span = bounds.max - bounds.min;
    if !(span > 0.0) || !span.is_finite() {
        log_debug!("line sensor: empty calibration range");
        return Reduction {
            normalized: [0.0; NUM_SENSOR],
            energy: 0.0,
            position: None,
            track: TrackStatus::NoTrack,
        };
    }

    let inv_range = 1.0 / span;
    let mut normalized = [0.0f32; NUM_SENSOR];
    let mut n1 = 0.0f32;
    let mut n2 = 0.0f32;
    for (i, (out, &value)) in normalized.iter_mut().zip(raw.iter()).enumerate() {
        let value = if value == SENTINEL {
            bounds.max
        } else {
            value as f32
        };
        let val = (value - bounds.min) * inv_range;
        *out = val;
        n1 += val * i as f32;
        n2 += val;
    }

    let track = TrackStatus::classify(n2, settings.warning_threshold, settings.lost_threshold);
    if !(n2 > 0.0) || !n2.is_finite() {
        log_debug!("line sensor: no energy on the array");
        return Reduction {
            normalized,
            energy: n2,
            position: None,
            track: TrackStatus::NoTrack,
        };
    }

    let position = (n1 / n2 - CENTER_INDEX) * settings.range + settings.offset;
    Reduction {
        normalized,
        energy: n2,
        position: position.is_finite().then_some(position),
        track,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1.0e-5
    }

    fn manual(min: f32, max: f32) -> LineSensorSettings {
        LineSensorSettings {
            calibration_mode: CalibrationMode::Manual,
            min,
            max,
            ..LineSensorSettings::DEFAULT
        }
    }

    fn with_mode(mode: CalibrationMode) -> LineSensorSettings {
        LineSensorSettings {
            calibration_mode: mode,
            ..LineSensorSettings::DEFAULT
        }
    }

    #[test]
    fn test_manual_bounds_normalize_to_half() {
        let settings = manual(100.0, 900.0);
        let mut cal = Calibration::new();
        cal.update(&[500; NUM_SENSOR], &settings);

        let r = reduce(&[500; NUM_SENSOR], cal.bounds(), &settings);
        for v in r.normalized.iter() {
            assert!(approx(*v, 0.5));
        }
    }

    #[test]
    fn test_enabled_tracks_and_decays() {
        let settings = with_mode(CalibrationMode::Enabled);
        let mut cal = Calibration::new();
        cal.update(&[200, 300, 800, 400, SENTINEL, 250], &settings);

        let b = cal.bounds();
        assert!((b.max - 800.0 * 0.999).abs() < 1.0e-3);
        assert!((b.min - 200.0 * 1.001).abs() < 1.0e-3);
    }

    #[test]
    fn test_enabled_ignores_sentinel_for_bounds() {
        let settings = with_mode(CalibrationMode::Enabled);
        let mut cal = Calibration::new();
        cal.update(&[SENTINEL; NUM_SENSOR], &settings);

        // Nothing seen yet: range stays inverted, reduction must not yield a position.
        let b = cal.bounds();
        assert!(b.max < b.min);
        let r = reduce(&[SENTINEL; NUM_SENSOR], b, &settings);
        assert_eq!(r.position, None);
        assert_eq!(r.track, TrackStatus::NoTrack);
    }

    #[test]
    fn test_bounds_tighten_over_cycles() {
        let settings = with_mode(CalibrationMode::Enabled);
        let mut cal = Calibration::new();
        cal.update(&[100, 900, 100, 900, 100, 900], &settings);
        let first = cal.bounds();
        for _ in 0..100 {
            cal.update(&[500; NUM_SENSOR], &settings);
        }
        let later = cal.bounds();
        assert!(later.max < first.max);
        assert!(later.min > first.min);
    }

    #[test]
    fn test_done_saves_once_per_entry() {
        let mut cal = Calibration::new();
        let enabled = with_mode(CalibrationMode::Enabled);
        let done = with_mode(CalibrationMode::Done);
        let raw = [100, 900, 300, 300, 300, 300];

        cal.update(&raw, &enabled);
        let saved = cal.update(&raw, &done);
        assert_eq!(saved, Some(cal.bounds()));
        assert_eq!(cal.update(&raw, &done), None);
        assert_eq!(cal.update(&raw, &done), None);

        // Re-entering Done after another Enabled pass saves again.
        cal.update(&raw, &enabled);
        assert!(cal.update(&raw, &done).is_some());
    }

    #[test]
    fn test_done_freezes_bounds() {
        let mut cal = Calibration::new();
        cal.update(&[100, 900, 300, 300, 300, 300], &with_mode(CalibrationMode::Enabled));
        let frozen = cal.bounds();

        let done = with_mode(CalibrationMode::Done);
        cal.update(&[10, 5000, 10, 10, 10, 10], &done);
        cal.update(&[10, 5000, 10, 10, 10, 10], &done);
        assert_eq!(cal.bounds(), frozen);
    }

    #[test]
    fn test_centered_line_has_zero_position() {
        let settings = LineSensorSettings {
            range: 1.0,
            offset: 0.0,
            ..manual(0.0, 100.0)
        };
        // Symmetric weights around index 2.5.
        let raw = [0, 0, 100, 100, 0, 0];
        let r = reduce(&raw, CalibrationBounds { min: 0.0, max: 100.0 }, &settings);
        assert!(approx(r.position.unwrap(), 0.0));
    }

    #[test]
    fn test_position_scale_and_offset() {
        let settings = LineSensorSettings {
            range: 2.0,
            offset: 0.5,
            ..manual(0.0, 100.0)
        };
        // All weight on the last channel: centroid 5, (5 - 2.5) * 2 + 0.5.
        let raw = [0, 0, 0, 0, 0, 100];
        let r = reduce(&raw, CalibrationBounds { min: 0.0, max: 100.0 }, &settings);
        assert!(approx(r.position.unwrap(), 5.5));
    }

    #[test]
    fn test_track_classification_bands() {
        let settings = LineSensorSettings {
            warning_threshold: 2.0,
            lost_threshold: 0.5,
            ..LineSensorSettings::DEFAULT
        };
        let bounds = CalibrationBounds { min: 0.0, max: 10.0 };

        // energy 2.1
        let r = reduce(&[3, 3, 3, 4, 4, 4], bounds, &settings);
        assert!(approx(r.energy, 2.1));
        assert_eq!(r.track, TrackStatus::Ok);

        // energy 1.0
        let r = reduce(&[0, 0, 5, 5, 0, 0], bounds, &settings);
        assert_eq!(r.track, TrackStatus::Warning);

        // energy 0.3
        let r = reduce(&[0, 0, 3, 0, 0, 0], bounds, &settings);
        assert_eq!(r.track, TrackStatus::NoTrack);
        assert!(r.position.is_some());
    }

    #[test]
    fn test_zero_range_is_no_track() {
        let settings = manual(400.0, 400.0);
        let r = reduce(&[400; NUM_SENSOR], CalibrationBounds { min: 400.0, max: 400.0 }, &settings);
        assert_eq!(r.position, None);
        assert_eq!(r.track, TrackStatus::NoTrack);
        assert!(r.normalized.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_zero_energy_is_no_track() {
        let settings = manual(100.0, 900.0);
        let r = reduce(&[100; NUM_SENSOR], CalibrationBounds { min: 100.0, max: 900.0 }, &settings);
        assert_eq!(r.energy, 0.0);
        assert_eq!(r.position, None);
        assert_eq!(r.track, TrackStatus::NoTrack);
    }

    #[test]
    fn test_sentinel_reads_as_brightest() {
        let settings = manual(100.0, 900.0);
        let r = reduce(
            &[SENTINEL, 100, 100, 100, 100, 100],
            CalibrationBounds { min: 100.0, max: 900.0 },
            &settings,
        );
        assert!(approx(r.normalized[0], 1.0));
    }
}
