//! Platform endpoints behind the named signal channels.
//!
//! Unix domain sockets under the runtime directory on Unix, named pipes on
//! Windows.

use std::io;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncWrite, AsyncWriteExt};

pub(crate) use sys::{close_server, connect, Listener, ServerConn};

/// Where a named channel lives on this platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelAddr {
    name: String,
    dir: PathBuf,
}

impl ChannelAddr {
    pub fn new(name: impl Into<String>, dir: impl AsRef<Path>) -> Self {
        Self {
            name: name.into(),
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn socket_path(&self) -> PathBuf {
        self.dir.join(format!("{}.sock", self.name))
    }

    pub fn pipe_name(&self) -> String {
        format!(r"\\.\pipe\{}", self.name)
    }
}

/// Flush and half-close the client side.
pub(crate) async fn close_client<S>(conn: &mut S) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    conn.flush().await?;
    match conn.shutdown().await {
        Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
        other => other,
    }
}

#[cfg(unix)]
mod sys {
    use super::ChannelAddr;
    use std::io;
    use std::path::PathBuf;
    use tokio::net::{UnixListener, UnixStream};

    pub type ServerConn = UnixStream;
    pub type ClientConn = UnixStream;

    /// Bound socket that unlinks its path when dropped.
    #[derive(Debug)]
    pub struct Listener {
        inner: UnixListener,
        path: PathBuf,
    }

    impl Listener {
        pub async fn bind(addr: &ChannelAddr) -> io::Result<Self> {
            let path = addr.socket_path();
            let inner = match UnixListener::bind(&path) {
                Ok(listener) => listener,
                Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                    // A live owner answers; a stale file left by a crash does not.
                    if UnixStream::connect(&path).await.is_ok() {
                        return Err(e);
                    }
                    std::fs::remove_file(&path)?;
                    UnixListener::bind(&path)?
                }
                Err(e) => return Err(e),
            };
            Ok(Self { inner, path })
        }

        pub async fn accept(&mut self) -> io::Result<ServerConn> {
            let (stream, _) = self.inner.accept().await?;
            Ok(stream)
        }
    }

    impl Drop for Listener {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    pub async fn connect(addr: &ChannelAddr) -> io::Result<ClientConn> {
        UnixStream::connect(addr.socket_path()).await
    }

    pub async fn close_server(conn: &mut ServerConn) -> io::Result<()> {
        super::close_client(conn).await
    }
}

#[cfg(windows)]
mod sys {
    use super::ChannelAddr;
    use std::io;
    use tokio::io::AsyncWriteExt;
    use tokio::net::windows::named_pipe::{
        ClientOptions, NamedPipeClient, NamedPipeServer, ServerOptions,
    };

    pub type ServerConn = NamedPipeServer;
    pub type ClientConn = NamedPipeClient;

    /// Pipe name plus the next server instance waiting for a client.
    #[derive(Debug)]
    pub struct Listener {
        name: String,
        pending: Option<NamedPipeServer>,
    }

    impl Listener {
        pub async fn bind(addr: &ChannelAddr) -> io::Result<Self> {
            let name = addr.pipe_name();
            let first = ServerOptions::new()
                .first_pipe_instance(true)
                .create(&name)?;
            Ok(Self {
                name,
                pending: Some(first),
            })
        }

        pub async fn accept(&mut self) -> io::Result<ServerConn> {
            let server = match self.pending.take() {
                Some(server) => server,
                None => ServerOptions::new().create(&self.name)?,
            };
            server.connect().await?;
            Ok(server)
        }
    }

    pub async fn connect(addr: &ChannelAddr) -> io::Result<ClientConn> {
        ClientOptions::new().open(addr.pipe_name())
    }

    pub async fn close_server(conn: &mut ServerConn) -> io::Result<()> {
        conn.flush().await?;
        conn.disconnect()
    }
}
