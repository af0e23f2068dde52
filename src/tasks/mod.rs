//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Maintenance: sweeps expired cache rows and persists stats on a fixed interval

mod maintenance;

pub use maintenance::spawn_maintenance_task;
