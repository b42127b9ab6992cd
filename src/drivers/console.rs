//! Line-oriented text console carried over USB CDC.
//!
//! ```text
//! idle | cal | calibrate | run | stop
//! get
//! set <kp|ki|kd|ilimit|delay|warn|lost|range|offset|min|max> <value>
//! set mode <enabled|manual|done>
//! ```

use crate::error::ConsoleError;
use crate::state::{CalibrationMode, ControlCommand, ControlSettings};

pub const MAX_LINE: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Setting {
    Kp(f32),
    Ki(f32),
    Kd(f32),
    ILimit(f32),
    StartDelay(f32),
    WarningThreshold(f32),
    LostThreshold(f32),
    Range(f32),
    Offset(f32),
    Min(f32),
    Max(f32),
    Mode(CalibrationMode),
}

impl Setting {
    fn parse(key: &str, value: &str) -> Result<Self, ConsoleError> {
        if key == "mode" {
            let mode = match value {
                "enabled" => CalibrationMode::Enabled,
                "manual" => CalibrationMode::Manual,
                "done" => CalibrationMode::Done,
                _ => return Err(ConsoleError::InvalidValue),
            };
            return Ok(Setting::Mode(mode));
        }

        let ctor: fn(f32) -> Setting = match key {
            "kp" => Setting::Kp,
            "ki" => Setting::Ki,
            "kd" => Setting::Kd,
            "ilimit" => Setting::ILimit,
            "delay" => Setting::StartDelay,
            "warn" => Setting::WarningThreshold,
            "lost" => Setting::LostThreshold,
            "range" => Setting::Range,
            "offset" => Setting::Offset,
            "min" => Setting::Min,
            "max" => Setting::Max,
            _ => return Err(ConsoleError::UnknownKey),
        };
        let v: f32 = value.parse().map_err(|_| ConsoleError::InvalidValue)?;
        if !v.is_finite() {
            return Err(ConsoleError::InvalidValue);
        }
        Ok(ctor(v))
    }

    /// Write this setting into `settings`.
    pub fn apply(self, settings: &mut ControlSettings) {
        let pid = &mut settings.follower.pid;
        let sensor = &mut settings.sensor;
        match self {
            Setting::Kp(v) => pid.kp = v,
            Setting::Ki(v) => pid.ki = v,
            Setting::Kd(v) => pid.kd = v,
            Setting::ILimit(v) => pid.i_limit = v,
            Setting::StartDelay(v) => settings.follower.start_delay_s = v,
            Setting::WarningThreshold(v) => sensor.warning_threshold = v,
            Setting::LostThreshold(v) => sensor.lost_threshold = v,
            Setting::Range(v) => sensor.range = v,
            Setting::Offset(v) => sensor.offset = v,
            Setting::Min(v) => sensor.min = v,
            Setting::Max(v) => sensor.max = v,
            Setting::Mode(m) => sensor.calibration_mode = m,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConsoleRequest {
    Command(ControlCommand),
    Show,
    Set(Setting),
}

pub fn parse_line(line: &str) -> Result<ConsoleRequest, ConsoleError> {
    let mut words = line.split_ascii_whitespace();
    let head = words.next().ok_or(ConsoleError::UnknownCommand)?;
    let request = match head {
        "idle" => ConsoleRequest::Command(ControlCommand::Idle),
        "cal" | "calibrate" => ConsoleRequest::Command(ControlCommand::Calibrate),
        "run" => ConsoleRequest::Command(ControlCommand::Run),
        "stop" => ConsoleRequest::Command(ControlCommand::Stop),
        "get" => ConsoleRequest::Show,
        "set" => {
            let key = words.next().ok_or(ConsoleError::UnknownKey)?;
            let value = words.next().ok_or(ConsoleError::InvalidValue)?;
            ConsoleRequest::Set(Setting::parse(key, value)?)
        }
        _ => return Err(ConsoleError::UnknownCommand),
    };
    if words.next().is_some() {
        return Err(ConsoleError::InvalidValue);
    }
    Ok(request)
}

/// Byte-at-a-time line assembler.
pub struct ConsoleParser {
    buffer: heapless::Vec<u8, MAX_LINE>,
    overflow: bool,
}

impl ConsoleParser {
    pub fn new() -> Self {
        Self {
            buffer: heapless::Vec::new(),
            overflow: false,
        }
    }

    /// Feed one byte; yields a result when a non-empty line completes.
    pub fn push_byte(&mut self, b: u8) -> Option<Result<ConsoleRequest, ConsoleError>> {
        if b != b'\r' && b != b'\n' {
            if self.buffer.push(b).is_err() {
                self.overflow = true;
            }
            return None;
        }

        if self.overflow {
            self.overflow = false;
            self.buffer.clear();
            return Some(Err(ConsoleError::LineTooLong));
        }
        if self.buffer.is_empty() {
            return None;
        }

        let res = match core::str::from_utf8(&self.buffer) {
            Ok(line) => parse_line(line.trim()),
            Err(_) => Err(ConsoleError::UnknownCommand),
        };
        self.buffer.clear();
        Some(res)
    }

    /// Feed a USB packet; calls `f` for every completed line.
    pub fn push_bytes<F>(&mut self, data: &[u8], mut f: F)
    where
        F: FnMut(Result<ConsoleRequest, ConsoleError>),
    {
        for &b in data {
            if let Some(res) = self.push_byte(b) {
                f(res);
            }
        }
    }
}

impl Default for ConsoleParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(parser: &mut ConsoleParser, data: &[u8]) -> Vec<Result<ConsoleRequest, ConsoleError>> {
        let mut out = Vec::new();
        parser.push_bytes(data, |r| out.push(r));
        out
    }

    #[test]
    fn test_commands() {
        let mut p = ConsoleParser::new();
        let out = collect(&mut p, b"run\r\nstop\ncal\r\nidle\n");
        assert_eq!(
            out,
            vec![
                Ok(ConsoleRequest::Command(ControlCommand::Run)),
                Ok(ConsoleRequest::Command(ControlCommand::Stop)),
                Ok(ConsoleRequest::Command(ControlCommand::Calibrate)),
                Ok(ConsoleRequest::Command(ControlCommand::Idle)),
            ]
        );
    }

    #[test]
    fn test_line_split_across_packets() {
        let mut p = ConsoleParser::new();
        assert!(collect(&mut p, b"set k").is_empty());
        let out = collect(&mut p, b"p 1.5\n");
        assert_eq!(out, vec![Ok(ConsoleRequest::Set(Setting::Kp(1.5)))]);
    }

    #[test]
    fn test_set_mode_and_apply() {
        let req = parse_line("set mode manual").unwrap();
        let mut settings = ControlSettings::DEFAULT;
        match req {
            ConsoleRequest::Set(s) => s.apply(&mut settings),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(settings.sensor.calibration_mode, CalibrationMode::Manual);

        Setting::StartDelay(0.5).apply(&mut settings);
        assert_eq!(settings.follower.start_delay_s, 0.5);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(parse_line("jump"), Err(ConsoleError::UnknownCommand));
        assert_eq!(parse_line("set foo 1"), Err(ConsoleError::UnknownKey));
        assert_eq!(parse_line("set kp abc"), Err(ConsoleError::InvalidValue));
        assert_eq!(parse_line("set kp inf"), Err(ConsoleError::InvalidValue));
        assert_eq!(parse_line("set mode fast"), Err(ConsoleError::InvalidValue));
        assert_eq!(parse_line("run now"), Err(ConsoleError::InvalidValue));
    }

    #[test]
    fn test_overlong_line_is_dropped() {
        let mut p = ConsoleParser::new();
        let long = [b'x'; MAX_LINE + 10];
        let out = collect(&mut p, &long);
        assert!(out.is_empty());
        let out = collect(&mut p, b"\nrun\n");
        assert_eq!(
            out,
            vec![
                Err(ConsoleError::LineTooLong),
                Ok(ConsoleRequest::Command(ControlCommand::Run)),
            ]
        );
    }
}
