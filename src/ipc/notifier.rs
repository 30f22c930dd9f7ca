use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::endpoint::{close_client, connect, ChannelAddr};
use super::wait::{cancellable, WaitPolicy};
use crate::core::ReportPayload;
use crate::error::{BridgeError, Result};

/// Consumer-facing sender.
#[async_trait]
pub trait ReportSink: Send {
    /// Deliver one payload. Ownership moves to the sink.
    async fn send(&mut self, payload: ReportPayload, policy: &WaitPolicy) -> Result<()>;
}

/// Client side of the Modeler notifier channel.
///
/// Connects, writes the whole payload in one call and disconnects on every
/// send.
#[derive(Debug, Clone)]
pub struct ModelerNotifier {
    addr: ChannelAddr,
}

impl ModelerNotifier {
    pub fn new(addr: ChannelAddr) -> Self {
        Self { addr }
    }
}

#[async_trait]
impl ReportSink for ModelerNotifier {
    async fn send(&mut self, payload: ReportPayload, policy: &WaitPolicy) -> Result<()> {
        let bytes = payload.to_wire_bytes()?;
        drop(payload);

        let mut conn = cancellable("connecting to Modeler", policy, connect(&self.addr))
            .await
            .map_err(|e| match e {
                BridgeError::Io { source, .. } => BridgeError::Connect {
                    channel: self.addr.name().to_string(),
                    source,
                },
                other => other,
            })?;

        cancellable("writing report", policy, conn.write_all(&bytes)).await?;
        cancellable("disconnecting from Modeler", policy, close_client(&mut conn)).await?;

        tracing::trace!(channel = self.addr.name(), bytes = bytes.len(), "report sent");
        Ok(())
    }
}
