use std::time::Duration;

/// What the main loop does after an abandoned cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryPolicy {
    /// Go straight back to waiting for the next signal
    #[default]
    Immediate,

    /// Sleep before the next attempt
    Pause(Duration),
}

impl RecoveryPolicy {
    /// `0` means immediate retry.
    pub fn from_pause_ms(pause_ms: u64) -> Self {
        if pause_ms == 0 {
            Self::Immediate
        } else {
            Self::Pause(Duration::from_millis(pause_ms))
        }
    }

    pub async fn after_failure(&self) {
        if let Self::Pause(pause) = self {
            tokio::time::sleep(*pause).await;
        }
    }
}
