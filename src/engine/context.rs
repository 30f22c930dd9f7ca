use std::time::Duration;

use super::CycleState;
use crate::core::TrackingResult;
use crate::ipc::HubSignal;

/// Everything one cycle produces, handed from stage to stage by value.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleContext {
    /// Iteration number this cycle runs as
    pub index: u64,
    pub signal: Option<HubSignal>,
    pub ingested: bool,
    pub signal_time: Duration,
    /// Whether a held frame went through the tracker
    pub tracked: bool,
    /// `None` when nothing was tracked or tracking has not converged
    pub tracking: Option<TrackingResult>,
    pub tracking_time: Duration,
}

impl CycleContext {
    pub fn new(index: u64) -> Self {
        Self {
            index,
            signal: None,
            ingested: false,
            signal_time: Duration::ZERO,
            tracked: false,
            tracking: None,
            tracking_time: Duration::ZERO,
        }
    }
}

/// Result of one main loop iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Exit was requested; the body did not run
    Parked,

    /// A report reached the sink
    Completed {
        signal: HubSignal,
        ingested: bool,
        tracked: bool,
    },

    /// A stage failed and the rest of the cycle was skipped
    Abandoned { failed_in: CycleState, error: String },
}

impl CycleOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn is_abandoned(&self) -> bool {
        matches!(self, Self::Abandoned { .. })
    }
}
