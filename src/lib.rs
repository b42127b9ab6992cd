#![cfg_attr(not(test), no_std)]

//! Line follower core: reflectance sensor acquisition, calibration and the
//! yaw-rate control loop.
//!
//! Everything in this library is chip independent so it can be exercised on
//! the host. The firmware binaries provide the STM32 implementation of
//! [`drivers::linesensor::LineSensorHal`] and run the periodic tasks.

#[macro_use]
pub mod logging;

pub mod bus;
pub mod drivers;
pub mod error;
pub mod state;
