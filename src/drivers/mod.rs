pub mod linesensor;

pub mod calibration;
pub mod console;
pub mod filter;
pub mod follower;
pub mod pid;
pub mod processor;
