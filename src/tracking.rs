//! Tracking stage contract.
//!
//! The pose estimator itself lives outside this crate. Implementations must
//! return within the cycle budget.

use anyhow::Result;

use crate::core::{FrameImage, Pose, TrackingResult};

pub trait Tracker: Send {
    /// Estimate the camera pose for one frame.
    ///
    /// `Ok(None)` means tracking has not converged yet. That is a normal
    /// state, not an error.
    fn track(&mut self, frame: &FrameImage, frame_index: u64) -> Result<Option<TrackingResult>>;
}

/// Stand-in that derives a pose from the frame index until a real estimator
/// is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderTracker;

impl PlaceholderTracker {
    pub fn new() -> Self {
        Self
    }
}

impl Tracker for PlaceholderTracker {
    fn track(&mut self, _frame: &FrameImage, frame_index: u64) -> Result<Option<TrackingResult>> {
        let n = i32::try_from(frame_index).unwrap_or(i32::MAX - 2);
        let position = [n, n.saturating_add(2), n.saturating_sub(5)];
        let orientation = position.map(|v| v as f32);

        Ok(Some(TrackingResult {
            pose: Pose::new(position, orientation),
            point_count: 0,
        }))
    }
}
