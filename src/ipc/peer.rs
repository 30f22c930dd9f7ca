//! The far ends of both channels: what the HUB and the Modeler run.
//!
//! Used by the loopback demo and the integration tests.

use std::io;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use super::endpoint::{connect, ChannelAddr, Listener};

/// Producer end of the signal channel.
#[derive(Debug, Clone)]
pub struct HubPeer {
    addr: ChannelAddr,
    retry_interval: Duration,
}

impl HubPeer {
    pub fn new(addr: ChannelAddr) -> Self {
        Self {
            addr,
            retry_interval: Duration::from_millis(5),
        }
    }

    /// Send one control byte and wait until the core releases the connection.
    ///
    /// The core binds a fresh endpoint every cycle, so connecting is retried
    /// until `patience` runs out.
    pub async fn signal(&self, byte: u8, patience: Duration) -> Result<()> {
        let deadline = Instant::now() + patience;
        let mut conn = loop {
            match connect(&self.addr).await {
                Ok(conn) => break conn,
                Err(_) if Instant::now() < deadline => {
                    tokio::time::sleep(self.retry_interval).await;
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("HUB could not reach channel '{}'", self.addr.name())
                    })
                }
            }
        };

        conn.write_all(&[byte]).await.context("Failed to send signal byte")?;
        conn.flush().await?;

        read_until_released(&mut conn)
            .await
            .context("Failed waiting for release")?;
        Ok(())
    }
}

/// Consumer end of the report channel. Keeps one listener for its lifetime.
#[derive(Debug)]
pub struct ModelerPeer {
    listener: Listener,
}

impl ModelerPeer {
    pub async fn bind(addr: &ChannelAddr) -> Result<Self> {
        let listener = Listener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind Modeler channel '{}'", addr.name()))?;
        Ok(Self { listener })
    }

    /// Accept one sender and return its payload, one character per byte.
    pub async fn receive(&mut self) -> Result<String> {
        let mut conn = self.listener.accept().await.context("Failed to accept sender")?;
        let bytes = read_until_released(&mut conn).await?;
        Ok(bytes.into_iter().map(char::from).collect())
    }
}

async fn read_until_released<S>(conn: &mut S) -> io::Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut bytes = Vec::new();
    match conn.read_to_end(&mut bytes).await {
        Ok(_) => Ok(bytes),
        // Named pipes report the peer's disconnect as a broken pipe.
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(bytes),
        Err(e) => Err(e),
    }
}
