use async_trait::async_trait;
use tokio::io::AsyncReadExt;

use super::endpoint::{close_server, ChannelAddr, Listener, ServerConn};
use super::wait::{cancellable, WaitPolicy};
use crate::error::{BridgeError, Result};

/// Control byte received from the HUB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubSignal {
    /// A complete frame sits in the shared buffer
    FrameReady,

    /// Anything else, including a peer that closed without sending
    NoFrame(Option<u8>),
}

impl HubSignal {
    pub const READY_BYTE: u8 = b'y';

    pub fn from_byte(byte: Option<u8>) -> Self {
        match byte {
            Some(Self::READY_BYTE) => Self::FrameReady,
            other => Self::NoFrame(other),
        }
    }

    pub fn is_frame_ready(&self) -> bool {
        matches!(self, Self::FrameReady)
    }
}

/// Producer-facing rendezvous. Every call to `accept` binds a fresh endpoint.
#[async_trait]
pub trait SignalChannel: Send {
    /// Bind a new endpoint and wait for the producer to connect
    async fn accept(&mut self, policy: &WaitPolicy) -> Result<Box<dyn SignalSession>>;
}

/// One accepted producer connection.
///
/// Dropping a session releases the endpoint as well; `release` does it
/// gracefully.
#[async_trait]
pub trait SignalSession: Send {
    /// Read exactly one control byte
    async fn read_signal(&mut self, policy: &WaitPolicy) -> Result<HubSignal>;

    /// Flush pending bytes, disconnect and release the endpoint
    async fn release(self: Box<Self>) -> Result<()>;
}

/// Server side of the HUB notifier channel.
#[derive(Debug, Clone)]
pub struct HubSignalChannel {
    addr: ChannelAddr,
}

impl HubSignalChannel {
    pub fn new(addr: ChannelAddr) -> Self {
        Self { addr }
    }
}

#[async_trait]
impl SignalChannel for HubSignalChannel {
    async fn accept(&mut self, policy: &WaitPolicy) -> Result<Box<dyn SignalSession>> {
        let mut listener = Listener::bind(&self.addr).await.map_err(|source| BridgeError::Bind {
            channel: self.addr.name().to_string(),
            source,
        })?;

        let conn = cancellable("waiting for HUB connection", policy, listener.accept()).await?;
        tracing::trace!(channel = self.addr.name(), "HUB connected");

        Ok(Box::new(HubSession {
            conn,
            _listener: listener,
        }))
    }
}

/// Accepted connection plus the endpoint it came from, released together.
struct HubSession {
    conn: ServerConn,
    _listener: Listener,
}

#[async_trait]
impl SignalSession for HubSession {
    async fn read_signal(&mut self, policy: &WaitPolicy) -> Result<HubSignal> {
        let mut byte = [0u8; 1];
        let read = cancellable("reading HUB signal", policy, self.conn.read(&mut byte)).await?;
        Ok(HubSignal::from_byte((read == 1).then_some(byte[0])))
    }

    async fn release(self: Box<Self>) -> Result<()> {
        let mut session = *self;
        close_server(&mut session.conn)
            .await
            .map_err(|e| BridgeError::io("releasing HUB channel", e))
    }
}
