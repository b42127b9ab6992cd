//! Periodic sensor processing: drives the acquisition cycle, calibrates and
//! reduces each sample to a [`SensorFrame`].

use crate::drivers::calibration::{reduce, Calibration};
use crate::drivers::linesensor::{LineSensor, LineSensorHal};
use crate::state::{CalibrationBounds, LineSensorSettings, SensorFrame, NUM_SENSOR, SENTINEL};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    /// Release the charged lines.
    Start,
    /// Read out, calibrate and reduce.
    Read,
}

/// Output of a read step.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProcessorOutput {
    pub frame: SensorFrame,
    /// Bounds to write back to the settings (Done mode, once).
    pub save: Option<CalibrationBounds>,
}

pub struct SensorProcessor {
    step: Step,
    calibration: Calibration,
    last_position: f32,
}

impl SensorProcessor {
    pub fn new() -> Self {
        Self {
            step: Step::Start,
            calibration: Calibration::new(),
            last_position: 0.0,
        }
    }

    pub fn bounds(&self) -> CalibrationBounds {
        self.calibration.bounds()
    }

    /// One period of the A/B micro-cycle. Returns a frame every second call.
    pub fn step<H: LineSensorHal>(
        &mut self,
        sensor: &LineSensor<H>,
        settings: &LineSensorSettings,
    ) -> Option<ProcessorOutput> {
        match self.step {
            Step::Start => {
                sensor.start();
                self.step = Step::Read;
                None
            }
            Step::Read => {
                let mut raw = [SENTINEL; NUM_SENSOR];
                sensor.read_latest(&mut raw);
                self.step = Step::Start;
                Some(self.process(raw, settings))
            }
        }
    }

    /// Calibrate and reduce one raw sample.
    ///
    /// Degenerate samples hold the last good position and report `NoTrack`.
    pub fn process(
        &mut self,
        raw: [u16; NUM_SENSOR],
        settings: &LineSensorSettings,
    ) -> ProcessorOutput {
        let save = self.calibration.update(&raw, settings);
        let bounds = self.calibration.bounds();
        let reduction = reduce(&raw, bounds, settings);

        if let Some(position) = reduction.position {
            self.last_position = position;
        }

        ProcessorOutput {
            frame: SensorFrame {
                raw,
                normalized: reduction.normalized,
                position: self.last_position,
                track: reduction.track,
                bounds,
            },
            save,
        }
    }
}

impl Default for SensorProcessor {
    fn default() -> Self {
        Self::new()
    }
}
