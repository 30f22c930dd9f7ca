//! In-process doubles for the channels and the frame buffer.
//!
//! Every double is `Clone` and shares its state, so a test can keep one copy
//! for assertions after handing the other to the main loop.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::notifier::ReportSink;
use super::signal::{HubSignal, SignalChannel, SignalSession};
use super::wait::WaitPolicy;
use crate::core::ReportPayload;
use crate::error::{BridgeError, Result};
use crate::shm::FrameSource;

/// One scripted producer interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalStep {
    /// Producer connects and sends this byte
    Byte(u8),

    /// Producer connects and hangs up without a byte
    Closed,

    /// Binding the endpoint fails
    BindFailure,

    /// Producer connects but the read fails
    ReadFailure,
}

/// Signal channel that replays a script. An exhausted script fails to bind.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSignal {
    steps: Arc<Mutex<VecDeque<SignalStep>>>,
    accepted: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl ScriptedSignal {
    pub fn new(steps: impl IntoIterator<Item = SignalStep>) -> Self {
        Self {
            steps: Arc::new(Mutex::new(steps.into_iter().collect())),
            ..Self::default()
        }
    }

    /// Sessions handed out so far
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Sessions released so far, gracefully or by drop
    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalChannel for ScriptedSignal {
    async fn accept(&mut self, _policy: &WaitPolicy) -> Result<Box<dyn SignalSession>> {
        let step = self
            .steps
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();

        match step {
            None => Err(BridgeError::Bind {
                channel: "scripted".to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "script exhausted"),
            }),
            Some(SignalStep::BindFailure) => Err(BridgeError::Bind {
                channel: "scripted".to_string(),
                source: io::Error::new(io::ErrorKind::AddrInUse, "scripted bind failure"),
            }),
            Some(step) => {
                self.accepted.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(ScriptedSession {
                    step,
                    released: Arc::clone(&self.released),
                }))
            }
        }
    }
}

struct ScriptedSession {
    step: SignalStep,
    released: Arc<AtomicUsize>,
}

#[async_trait]
impl SignalSession for ScriptedSession {
    async fn read_signal(&mut self, _policy: &WaitPolicy) -> Result<HubSignal> {
        match self.step {
            SignalStep::Byte(byte) => Ok(HubSignal::from_byte(Some(byte))),
            SignalStep::Closed => Ok(HubSignal::from_byte(None)),
            _ => Err(BridgeError::io(
                "reading HUB signal",
                io::Error::new(io::ErrorKind::ConnectionReset, "scripted read failure"),
            )),
        }
    }

    async fn release(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Frame source returning a fixed payload and counting reads.
#[derive(Debug, Clone, Default)]
pub struct StaticFrameSource {
    payload: Arc<Mutex<Vec<u8>>>,
    reads: Arc<AtomicUsize>,
}

impl StaticFrameSource {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: Arc::new(Mutex::new(payload.into())),
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_payload(&self, payload: impl Into<Vec<u8>>) {
        *self
            .payload
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = payload.into();
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl FrameSource for StaticFrameSource {
    fn read_content(&mut self) -> Result<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .payload
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }
}

/// Sink that keeps every delivered payload, or refuses like an absent peer.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    delivered: Arc<Mutex<Vec<ReportPayload>>>,
    attempts: Arc<AtomicUsize>,
    refusing: Arc<AtomicBool>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_refusing(&self, refusing: bool) {
        self.refusing.store(refusing, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Remove and return everything delivered so far.
    pub fn take_delivered(&self) -> Vec<ReportPayload> {
        std::mem::take(
            &mut *self
                .delivered
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }
}

#[async_trait]
impl ReportSink for RecordingSink {
    async fn send(&mut self, payload: ReportPayload, _policy: &WaitPolicy) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.refusing.load(Ordering::SeqCst) {
            return Err(BridgeError::Connect {
                channel: "recording".to_string(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "peer absent"),
            });
        }

        self.delivered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(payload);
        Ok(())
    }
}
