use serde::{Deserialize, Serialize};

/// Where the main loop is within the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CycleState {
    #[default]
    Idle,
    WaitSignal,
    Ingest,
    Track,
    BuildReport,
    Send,
}

impl CycleState {
    /// Check if transition from current state to target state is valid
    pub fn can_transition_to(&self, target: &CycleState) -> bool {
        use CycleState::*;

        matches!(
            (self, target),
            (Idle, WaitSignal) |

            // Ingest only runs when the producer reported a new frame
            (WaitSignal, Ingest) |
            (WaitSignal, Track) |
            (Ingest, Track) |

            (Track, BuildReport) |
            (BuildReport, Send) |

            // Completion, or abandoning a cycle from any stage
            (WaitSignal, Idle) |
            (Ingest, Idle) |
            (Track, Idle) |
            (BuildReport, Idle) |
            (Send, Idle)
        )
    }

    /// Get human-readable state name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::WaitSignal => "WAIT_SIGNAL",
            Self::Ingest => "INGEST",
            Self::Track => "TRACK",
            Self::BuildReport => "BUILD_REPORT",
            Self::Send => "SEND",
        }
    }
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
