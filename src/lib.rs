//! Relay between the HUB frame producer and the AR 3D Modeler.
//!
//! Each cycle waits for the HUB's ready byte, pulls the frame out of shared
//! memory, runs the tracker and pushes a pose and timing report to the
//! Modeler.

pub mod config;
pub mod console;
pub mod core;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod ipc;
pub mod observability;
pub mod resilience;
pub mod shm;
pub mod tracking;

pub use error::{BridgeError, Result};
pub use observability::init_tracing;
