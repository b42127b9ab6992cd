//! Error types for line sensor configuration, settings and console input.

use core::fmt;

/// Fatal configuration errors of the acquisition driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum LineSensorError {
    /// Two channels are mapped to the same pin
    DuplicatePin { pin: u8 },
    /// Pin is not available on this board
    InvalidPin { pin: u8 },
}

impl fmt::Display for LineSensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineSensorError::DuplicatePin { pin } => {
                write!(f, "line sensor pin {} assigned twice", pin)
            }
            LineSensorError::InvalidPin { pin } => {
                write!(f, "line sensor pin {} not available", pin)
            }
        }
    }
}

/// Rejected settings snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum SettingsError {
    NotFinite,
    /// Warning threshold must be above the lost threshold
    ThresholdOrder,
    /// Calibration max must be above min
    EmptyCalibrationRange,
    NegativeIntegralLimit,
    NegativeStartDelay,
}

impl SettingsError {
    pub fn as_str(self) -> &'static str {
        match self {
            SettingsError::NotFinite => "value is not finite",
            SettingsError::ThresholdOrder => "warn threshold must exceed lost threshold",
            SettingsError::EmptyCalibrationRange => "calibration max must exceed min",
            SettingsError::NegativeIntegralLimit => "integral limit must not be negative",
            SettingsError::NegativeStartDelay => "start delay must not be negative",
        }
    }
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Malformed console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum ConsoleError {
    UnknownCommand,
    UnknownKey,
    InvalidValue,
    LineTooLong,
}

impl ConsoleError {
    pub fn as_str(self) -> &'static str {
        match self {
            ConsoleError::UnknownCommand => "unknown command",
            ConsoleError::UnknownKey => "unknown setting",
            ConsoleError::InvalidValue => "invalid value",
            ConsoleError::LineTooLong => "line too long",
        }
    }
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
