//! Shared state types for inter-task communication via Embassy channels.
//!
//! All types are `Copy` to minimise overhead when sent through channels.

use crate::error::SettingsError;

/// Number of reflectance channels on the array.
pub const NUM_SENSOR: usize = 6;

/// Raw reading of a channel that never discharged before readout.
pub const SENTINEL: u16 = 0xFFFF;

// ── Line sensor ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum TrackStatus {
    Ok,
    Warning,
    NoTrack,
}

impl TrackStatus {
    /// Classify the total normalized energy of a frame.
    ///
    /// The Ok check runs first, so the bands only make sense while
    /// `warning > lost` (enforced by [`LineSensorSettings::validate`]).
    pub fn classify(energy: f32, warning: f32, lost: f32) -> Self {
        if energy > warning {
            Self::Ok
        } else if energy > lost {
            Self::Warning
        } else {
            Self::NoTrack
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warning => "WARN",
            Self::NoTrack => "NOTRACK",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum CalibrationMode {
    /// Auto-ranging from live readings.
    Enabled,
    /// Bounds come verbatim from the settings.
    Manual,
    /// Bounds frozen, saved back to the settings once.
    Done,
}

impl CalibrationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Manual => "manual",
            Self::Done => "done",
        }
    }
}

/// Calibration bounds in raw counter ticks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationBounds {
    pub min: f32,
    pub max: f32,
}

/// One processed sample of the whole array.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensorFrame {
    pub raw: [u16; NUM_SENSOR],
    pub normalized: [f32; NUM_SENSOR],
    pub position: f32,
    pub track: TrackStatus,
    pub bounds: CalibrationBounds,
}

impl Default for SensorFrame {
    fn default() -> Self {
        Self {
            raw: [SENTINEL; NUM_SENSOR],
            normalized: [0.0; NUM_SENSOR],
            position: 0.0,
            track: TrackStatus::NoTrack,
            bounds: CalibrationBounds { min: 0.0, max: 0.0 },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineSensorSettings {
    pub calibration_mode: CalibrationMode,
    pub min: f32,
    pub max: f32,
    /// Energy above which the track is Ok.
    pub warning_threshold: f32,
    /// Energy above which the track is at least Warning.
    pub lost_threshold: f32,
    pub range: f32,
    pub offset: f32,
}

impl LineSensorSettings {
    pub const DEFAULT: Self = Self {
        calibration_mode: CalibrationMode::Enabled,
        min: 0.0,
        max: 1000.0,
        warning_threshold: 2.0,
        lost_threshold: 0.5,
        range: 1.0,
        offset: 0.0,
    };

    pub fn validate(&self) -> Result<(), SettingsError> {
        let values = [
            self.min,
            self.max,
            self.warning_threshold,
            self.lost_threshold,
            self.range,
            self.offset,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(SettingsError::NotFinite);
        }
        if self.warning_threshold <= self.lost_threshold {
            return Err(SettingsError::ThresholdOrder);
        }
        if self.max <= self.min {
            return Err(SettingsError::EmptyCalibrationRange);
        }
        Ok(())
    }
}

impl Default for LineSensorSettings {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ── Line follower ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    pub i_limit: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineFollowerSettings {
    pub pid: PidGains,
    pub start_delay_s: f32,
}

impl LineFollowerSettings {
    pub const DEFAULT: Self = Self {
        pid: PidGains {
            kp: 1.0,
            ki: 0.0,
            kd: 0.0,
            i_limit: 1.0,
        },
        start_delay_s: 3.0,
    };

    pub fn validate(&self) -> Result<(), SettingsError> {
        let p = &self.pid;
        let values = [p.kp, p.ki, p.kd, p.i_limit, self.start_delay_s];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(SettingsError::NotFinite);
        }
        if p.i_limit < 0.0 {
            return Err(SettingsError::NegativeIntegralLimit);
        }
        if self.start_delay_s < 0.0 {
            return Err(SettingsError::NegativeStartDelay);
        }
        Ok(())
    }
}

impl Default for LineFollowerSettings {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Complete persisted configuration of the subsystem.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControlSettings {
    pub follower: LineFollowerSettings,
    pub sensor: LineSensorSettings,
}

impl ControlSettings {
    pub const DEFAULT: Self = Self {
        follower: LineFollowerSettings::DEFAULT,
        sensor: LineSensorSettings::DEFAULT,
    };

    pub fn validate(&self) -> Result<(), SettingsError> {
        self.follower.validate()?;
        self.sensor.validate()
    }
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Operator request; every delivery is one transition request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum ControlCommand {
    Idle,
    Calibrate,
    Run,
    Stop,
}

impl ControlCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Calibrate => "calibrate",
            Self::Run => "run",
            Self::Stop => "stop",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum FollowerStatus {
    #[default]
    Idle,
    Arming,
    Run,
}

impl FollowerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Arming => "ARMING",
            Self::Run => "RUN",
        }
    }
}

/// Published once per controller iteration.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ControlStatus {
    pub status: FollowerStatus,
    pub yaw_rate: f32,
    pub throttle: f32,
    pub dt: f32,
}
