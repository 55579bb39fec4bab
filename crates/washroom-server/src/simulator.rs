//! Simulated peer.
//!
//! Speaks the peer side of the protocol over any transport: answers
//! `sysinfo` from a [`Telemetry`] source, runs shell text through a
//! responder, and stores or serves files under a root directory. Used to
//! exercise the console end to end without a real remote host.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info};

use washroom_core::{Result, Telemetry, WashroomError};
use washroom_protocol::{Channel, Directive, DownloadReply};

/// Produces the reply to one line of shell text
pub type ShellResponder = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Peer-side protocol handler
#[derive(Clone)]
pub struct Simulator {
    telemetry: Arc<dyn Telemetry>,
    shell: ShellResponder,
    root: PathBuf,
}

impl Simulator {
    /// Create a simulator whose shell echoes its input
    pub fn new(telemetry: Arc<dyn Telemetry>, root: impl Into<PathBuf>) -> Self {
        Self {
            telemetry,
            shell: Arc::new(|line: &str| format!("{}\n", line)),
            root: root.into(),
        }
    }

    /// Replace the shell responder
    pub fn with_shell(mut self, shell: ShellResponder) -> Self {
        self.shell = shell;
        self
    }

    /// Serve directives until the console sends a top-level `exit` or the
    /// connection drops. Returns the directives seen, in order.
    pub async fn serve<T>(&self, mut channel: Channel<T>) -> Result<Vec<Directive>>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let mut seen = Vec::new();
        let mut in_shell = false;

        loop {
            let message = match channel.receive().await {
                Ok(message) => message,
                Err(WashroomError::PeerClosed) => {
                    debug!("Console closed the connection");
                    break;
                }
                Err(e) => return Err(e),
            };
            let directive = Directive::parse(&message)?;
            seen.push(directive.clone());

            match directive {
                Directive::Shell => in_shell = true,
                Directive::Exit if in_shell => in_shell = false,
                Directive::Exit => {
                    info!("Session ended by console");
                    channel.close().await;
                    break;
                }
                Directive::Command(text) if in_shell => {
                    channel.send((self.shell)(&text)).await?;
                }
                Directive::Command(text) => {
                    debug!(text = %text, "Ignoring text outside the shell");
                }
                Directive::Sysinfo => {
                    channel.send(self.telemetry.collect()).await?;
                }
                Directive::Upload { name, size } => {
                    let content = channel.receive().await?;
                    if content.len() as u64 != size {
                        debug!(file = %name, size, received = content.len(), "Upload size differs");
                    }
                    let path = self.resolve(&name)?;
                    tokio::fs::write(&path, &content)
                        .await
                        .map_err(|source| WashroomError::File { path, source })?;
                }
                Directive::Download { name } => self.send_file(&mut channel, &name).await?,
            }
        }

        Ok(seen)
    }

    async fn send_file<T>(&self, channel: &mut Channel<T>, name: &str) -> Result<()>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let content = match self.resolve(name) {
            Ok(path) => tokio::fs::read(&path).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        match content {
            Ok(content) => {
                let reply = DownloadReply::File {
                    name: name.to_string(),
                    size: content.len() as u64,
                };
                channel.send(reply.encode()).await?;
                channel.send(content).await
            }
            Err(reason) => channel.send(DownloadReply::Refused(reason).encode()).await,
        }
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        Path::new(name)
            .file_name()
            .map(|base| self.root.join(base))
            .ok_or_else(|| WashroomError::invalid_command(format!("{:?} has no file name", name)))
    }
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}
