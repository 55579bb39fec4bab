//! Operator console.
//!
//! Reads one command per line and drives at most one selected peer at a
//! time. Every peer I/O failure goes through [`Console::teardown`], which
//! evicts the peer and returns the operator to the top-level prompt; only a
//! failure of the operator's own terminal ends the loop with an error.

use std::io::Write;
use std::path::{Path, PathBuf};

use colored::Colorize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::{debug, info, warn};

use washroom_core::{FaultKind, PeerId, Result, WashroomError};
use washroom_protocol::Directive;

use crate::commands::{Command, HELP, SUMMARY};
use crate::registry::{Peer, PeerRegistry};
use crate::table::Table;
use crate::transfer;

/// Prompt label when no peer is selected
const DEFAULT_PROMPT_LABEL: &str = "WSR";

/// Console settings
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Print prompts before each read
    pub interactive: bool,
    /// Colorize prompts and table headers
    pub color: bool,
    /// Directory downloads are written to
    pub download_dir: PathBuf,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            interactive: false,
            color: false,
            download_dir: PathBuf::from("."),
        }
    }
}

/// Which peer I/O-bound commands target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    NoSelection,
    Selected { id: PeerId, host: String },
}

/// Whether the loop continues after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Why the console loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    /// Operator input reached end of file
    EndOfInput,
    /// Operator issued `exit`
    Operator,
}

/// Interactive command loop
pub struct Console<R, W> {
    registry: PeerRegistry,
    config: ConsoleConfig,
    input: Lines<R>,
    output: W,
    state: SessionState,
}

impl<R, W> Console<R, W>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    /// Create a console reading commands from `input`
    pub fn new(registry: PeerRegistry, config: ConsoleConfig, input: R, output: W) -> Self {
        Self {
            registry,
            config,
            input: input.lines(),
            output,
            state: SessionState::NoSelection,
        }
    }

    /// Current selection state
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Currently selected peer, if any
    pub fn selected(&self) -> Option<PeerId> {
        match &self.state {
            SessionState::Selected { id, .. } => Some(*id),
            SessionState::NoSelection => None,
        }
    }

    /// Output sink
    pub fn output(&self) -> &W {
        &self.output
    }

    /// Consume the console, returning its output sink
    pub fn into_output(self) -> W {
        self.output
    }

    /// Run until end of input or `exit`
    pub async fn run(&mut self) -> Result<ConsoleExit> {
        loop {
            let prompt = self.prompt();
            let Some(line) = self.read_line(&prompt).await? else {
                info!("Operator input closed");
                return Ok(ConsoleExit::EndOfInput);
            };
            if self.handle_line(&line).await? == Flow::Exit {
                info!("Operator exit");
                return Ok(ConsoleExit::Operator);
            }
        }
    }

    /// Parse and execute one line of operator input
    pub async fn handle_line(&mut self, line: &str) -> Result<Flow> {
        let outcome = match Command::parse(line) {
            Ok(None) => return Ok(Flow::Continue),
            Ok(Some(command)) => {
                debug!(?command, "Dispatching command");
                self.execute(command).await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(flow) => Ok(flow),
            Err(e) => {
                self.recover(e).await?;
                Ok(Flow::Continue)
            }
        }
    }

    async fn execute(&mut self, command: Command) -> Result<Flow> {
        if command.requires_selection() && self.selected().is_none() {
            return Err(WashroomError::NoSelection);
        }

        match command {
            Command::List => self.list()?,
            Command::Select(id) => self.select(id)?,
            Command::Alias { id, name } => self.alias(id, &name)?,
            Command::Shell => self.shell().await?,
            Command::Download(name) => self.download(&name).await?,
            Command::Upload(path) => self.upload(&path).await?,
            Command::Sysinfo => self.sysinfo().await?,
            Command::Help => self.write_raw(HELP.as_bytes())?,
            Command::Unknown(word) => {
                debug!(command = %word, "Unknown command");
                self.write_line(SUMMARY)?;
            }
            Command::Exit => {
                self.exit().await;
                return Ok(Flow::Exit);
            }
        }
        Ok(Flow::Continue)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Failure handling
    // ─────────────────────────────────────────────────────────────────────────

    async fn recover(&mut self, err: WashroomError) -> Result<()> {
        if err.kind() == FaultKind::Console {
            return Err(err);
        }
        match self.selected() {
            Some(id) if err.is_peer_fault() => self.teardown(id, &err).await,
            _ => self.diagnostic(&err),
        }
    }

    /// Evict a failed peer and drop the selection if it pointed there
    async fn teardown(&mut self, id: PeerId, err: &WashroomError) -> Result<()> {
        self.registry.unregister(id).await;
        if self.selected() == Some(id) {
            self.state = SessionState::NoSelection;
        }
        warn!(peer_id = %id, kind = %err.kind(), error = %err, "Peer torn down");
        self.write_line(&format!("[!] peer {} disconnected: {}", id, err))
    }

    fn diagnostic(&mut self, err: &WashroomError) -> Result<()> {
        debug!(kind = %err.kind(), error = %err, "Command failed");
        self.write_line(&format!("[!] {}", err))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────────

    fn list(&mut self) -> Result<()> {
        let peers = self.registry.snapshot();
        if peers.is_empty() {
            return self.write_line("[*] no active sessions");
        }

        let mut table = Table::new(["ID", "NAME", "IP Address", "PORT", "CONNECTED"]);
        for peer in &peers {
            table.add_row([
                peer.id.to_string(),
                peer.alias.clone(),
                peer.address.host.clone(),
                peer.address.port.to_string(),
                peer.connected_at.format("%H:%M:%S").to_string(),
            ]);
        }
        table.sort_by_column(1);

        let rendered = table.render(self.config.color);
        self.write_raw(rendered.as_bytes())
    }

    fn select(&mut self, id: PeerId) -> Result<()> {
        let peer = self.registry.lookup(id)?;
        let host = peer.info.address.host.clone();
        self.state = SessionState::Selected { id, host };
        info!(peer_id = %id, "Peer selected");
        self.write_line(&format!("[*] selected peer {} ({})", id, peer.info.address))
    }

    fn alias(&mut self, id: PeerId, name: &str) -> Result<()> {
        self.registry.rename(id, name)?;
        self.write_line(&format!("[*] peer {} is now known as {}", id, name))
    }

    /// Owned copy of the selected peer
    fn active_peer(&mut self) -> Result<(PeerId, Peer)> {
        let id = self.selected().ok_or(WashroomError::NoSelection)?;
        match self.registry.lookup(id) {
            Ok(peer) => Ok((id, peer)),
            Err(e) => {
                // Evicted since it was selected
                self.state = SessionState::NoSelection;
                Err(e)
            }
        }
    }

    async fn sysinfo(&mut self) -> Result<()> {
        let (_, peer) = self.active_peer()?;
        let reply = {
            let mut channel = peer.link.acquire().await?;
            channel.request(Directive::Sysinfo.encode()).await?
        };
        self.write_reply(&reply)
    }

    async fn shell(&mut self) -> Result<()> {
        let (id, peer) = self.active_peer()?;
        let prompt = self.paint(format!("[shell@{}]# ", peer.info.address.host));
        let mut channel = peer.link.acquire().await?;

        channel.send(Directive::Shell.encode()).await?;
        info!(peer_id = %id, "Shell opened");

        loop {
            let Some(line) = self.read_line(&prompt).await? else {
                channel.send(Directive::Exit.encode()).await?;
                break;
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed == "exit" {
                channel.send(Directive::Exit.encode()).await?;
                break;
            }

            // Sent as typed; only the line terminator was stripped
            let reply = channel.request(Directive::Command(line).encode()).await?;
            self.write_reply(&reply)?;
        }

        info!(peer_id = %id, "Shell closed");
        Ok(())
    }

    async fn upload(&mut self, path: &Path) -> Result<()> {
        let (_, peer) = self.active_peer()?;
        let sent = {
            let mut channel = peer.link.acquire().await?;
            transfer::upload(&mut *channel, path).await?
        };
        self.write_line(&format!("[*] uploaded {} ({} bytes)", path.display(), sent))
    }

    async fn download(&mut self, name: &str) -> Result<()> {
        let (_, peer) = self.active_peer()?;
        let (dest, size) = {
            let mut channel = peer.link.acquire().await?;
            transfer::download(&mut *channel, name, &self.config.download_dir).await?
        };
        self.write_line(&format!("[*] downloaded {} ({} bytes)", dest.display(), size))
    }

    /// Best-effort goodbye to the selected peer
    async fn exit(&mut self) {
        let Some(id) = self.selected() else {
            return;
        };
        let Ok(peer) = self.registry.lookup(id) else {
            return;
        };
        let delivered = match peer.link.acquire().await {
            Ok(mut channel) => channel.send(Directive::Exit.encode()).await,
            Err(e) => Err(e),
        };
        if let Err(e) = delivered {
            warn!(peer_id = %id, error = %e, "Exit directive not delivered");
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Terminal I/O
    // ─────────────────────────────────────────────────────────────────────────

    fn prompt(&self) -> String {
        let label = match &self.state {
            SessionState::Selected { host, .. } => host.as_str(),
            SessionState::NoSelection => DEFAULT_PROMPT_LABEL,
        };
        self.paint(format!("[{}]# ", label))
    }

    fn paint(&self, text: String) -> String {
        if self.config.color {
            text.green().bold().to_string()
        } else {
            text
        }
    }

    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        if self.config.interactive {
            self.output
                .write_all(prompt.as_bytes())
                .and_then(|_| self.output.flush())
                .map_err(WashroomError::Console)?;
        }
        self.input.next_line().await.map_err(WashroomError::Console)
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.output, "{}", line).map_err(WashroomError::Console)
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.output
            .write_all(bytes)
            .and_then(|_| self.output.flush())
            .map_err(WashroomError::Console)
    }

    /// Print a peer reply verbatim, keeping the next prompt on its own line
    fn write_reply(&mut self, reply: &[u8]) -> Result<()> {
        self.write_raw(reply)?;
        if !reply.is_empty() && !reply.ends_with(b"\n") {
            self.write_raw(b"\n")?;
        }
        Ok(())
    }
}
