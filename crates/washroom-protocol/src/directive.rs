//! Directive and reply messages exchanged with peers.
//!
//! Directives are plain text carried as the payload of one logical message.
//! File transfers add a metadata message followed by a content message.

use bytes::Bytes;

use washroom_core::{Result, WashroomError};

/// Request sent from the console to a peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Enter the remote shell submode
    Shell,
    /// Leave the shell submode, or end the session at top level
    Exit,
    /// Request host telemetry
    Sysinfo,
    /// Announce an upload; the content follows as the next message
    Upload { name: String, size: u64 },
    /// Request a file; the peer answers with a [`DownloadReply`]
    Download { name: String },
    /// Free text forwarded while in the shell submode
    Command(String),
}

impl Directive {
    /// Encode the directive as a message payload
    pub fn encode(&self) -> Bytes {
        match self {
            Directive::Shell => Bytes::from_static(b"shell"),
            Directive::Exit => Bytes::from_static(b"exit"),
            Directive::Sysinfo => Bytes::from_static(b"sysinfo"),
            Directive::Upload { name, size } => Bytes::from(format!("UPLOAD {} {}\n", name, size)),
            Directive::Download { name } => Bytes::from(format!("DOWNLOAD {}\n", name)),
            Directive::Command(text) => Bytes::from(text.clone()),
        }
    }

    /// Parse a message payload received by a peer
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(payload)
            .map_err(|_| WashroomError::MalformedReply("directive is not UTF-8".into()))?;

        if let Some(rest) = text.strip_prefix("UPLOAD ") {
            let (name, size) = split_name_size(rest)?;
            return Ok(Directive::Upload { name, size });
        }
        if let Some(rest) = text.strip_prefix("DOWNLOAD ") {
            let name = rest.strip_suffix('\n').unwrap_or(rest);
            if name.is_empty() {
                return Err(WashroomError::MalformedReply("DOWNLOAD without a name".into()));
            }
            return Ok(Directive::Download {
                name: name.to_string(),
            });
        }

        Ok(match text {
            "shell" => Directive::Shell,
            "exit" => Directive::Exit,
            "sysinfo" => Directive::Sysinfo,
            other => Directive::Command(other.to_string()),
        })
    }
}

/// Metadata answer to a [`Directive::Download`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadReply {
    /// File found; `size` content bytes follow as the next message
    File { name: String, size: u64 },
    /// File unavailable; nothing follows
    Refused(String),
}

impl DownloadReply {
    /// Encode the reply as a message payload
    pub fn encode(&self) -> Bytes {
        match self {
            DownloadReply::File { name, size } => Bytes::from(format!("FILE {} {}\n", name, size)),
            DownloadReply::Refused(reason) => Bytes::from(format!("ERROR {}\n", reason)),
        }
    }

    /// Parse a reply received by the console
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(payload)
            .map_err(|_| WashroomError::MalformedReply("download reply is not UTF-8".into()))?;

        if let Some(rest) = text.strip_prefix("FILE ") {
            let (name, size) = split_name_size(rest)?;
            return Ok(DownloadReply::File { name, size });
        }
        if let Some(rest) = text.strip_prefix("ERROR") {
            let reason = rest.trim();
            let reason = if reason.is_empty() { "unspecified" } else { reason };
            return Ok(DownloadReply::Refused(reason.to_string()));
        }

        Err(WashroomError::MalformedReply(format!(
            "unexpected download reply {:?}",
            text.chars().take(32).collect::<String>()
        )))
    }
}

/// Split `"<name> <size>\n"`; the name may itself contain spaces
fn split_name_size(rest: &str) -> Result<(String, u64)> {
    let line = rest.strip_suffix('\n').unwrap_or(rest);
    let (name, size) = line
        .rsplit_once(' ')
        .ok_or_else(|| WashroomError::MalformedReply(format!("missing size in {:?}", line)))?;
    if name.is_empty() {
        return Err(WashroomError::MalformedReply("missing file name".into()));
    }
    let size = size
        .parse::<u64>()
        .map_err(|_| WashroomError::MalformedReply(format!("invalid size {:?}", size)))?;
    Ok((name.to_string(), size))
}
