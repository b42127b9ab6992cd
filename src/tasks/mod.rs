pub mod console_task;
pub mod edge_task;
pub mod follower_task;
pub mod sensor_task;
pub mod telemetry_task;
