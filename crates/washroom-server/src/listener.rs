//! Connection acceptor.
//!
//! Accepts peer connections in a background task and registers each one.
//! Accepting never blocks on the console: a new peer only takes the registry
//! lock long enough to be inserted.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use washroom_core::{PeerAddress, Result, WashroomError};
use washroom_protocol::{BoxedTransport, Channel, ChannelConfig};

use crate::registry::PeerRegistry;

/// Pause after a failed accept before trying again
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Bound listening socket, ready to be spawned
pub struct Listener {
    listener: TcpListener,
    local_addr: SocketAddr,
    registry: PeerRegistry,
    channel_config: ChannelConfig,
}

impl Listener {
    /// Bind the listening socket
    pub async fn bind(
        addr: SocketAddr,
        registry: PeerRegistry,
        channel_config: ChannelConfig,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| WashroomError::Setup { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| WashroomError::Setup { addr, source })?;

        info!(address = %local_addr, "Listening for peers");

        Ok(Self {
            listener,
            local_addr,
            registry,
            channel_config,
        })
    }

    /// Address the socket is actually bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Start accepting in a background task
    pub fn spawn(self) -> ListenerHandle {
        let active = Arc::new(AtomicBool::new(true));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let local_addr = self.local_addr;

        let task = tokio::spawn(self.run(Arc::clone(&active), shutdown_rx));

        ListenerHandle {
            active,
            shutdown_tx,
            local_addr,
            task,
        }
    }

    async fn run(self, active: Arc<AtomicBool>, mut shutdown_rx: broadcast::Receiver<()>) {
        while active.load(Ordering::SeqCst) {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!("Acceptor received shutdown");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!(peer = %addr, error = %e, "Could not disable Nagle");
                        }
                        let channel = Channel::new(
                            Box::new(stream) as BoxedTransport,
                            self.channel_config.clone(),
                        );
                        self.registry.register(channel, PeerAddress::from(addr));
                    }
                    Err(e) => {
                        if !active.load(Ordering::SeqCst) {
                            break;
                        }
                        warn!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    }
                },
            }
        }

        info!(address = %self.local_addr, "Acceptor stopped");
    }
}

/// Handle to a running acceptor
pub struct ListenerHandle {
    active: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// Address the acceptor is listening on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Check if the acceptor is still accepting
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst) && !self.task.is_finished()
    }

    /// Stop accepting and wait for the acceptor to exit.
    ///
    /// The listening socket is closed once this returns.
    pub async fn stop(self) {
        self.active.store(false, Ordering::SeqCst);
        // The receiver is gone if the task already exited
        let _ = self.shutdown_tx.send(());

        if let Err(e) = self.task.await {
            error!(error = %e, "Acceptor task failed");
        }
    }
}
