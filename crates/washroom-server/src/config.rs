//! Server configuration and command-line arguments.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use washroom_core::{Result, WashroomError};
use washroom_protocol::ChannelConfig;

use crate::console::ConsoleConfig;

/// Washroom - console-operated session server
#[derive(Parser, Debug)]
#[command(name = "washroom")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// IP address to bind to
    #[arg(short, long, default_value = "127.0.0.1")]
    pub ip: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value = "5555")]
    pub port: u16,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Maximum payload bytes per outbound frame
    #[arg(long, default_value = "4096")]
    pub chunk_size: usize,

    /// Seconds to wait for a complete reply before dropping the peer
    #[arg(long, default_value = "30")]
    pub read_timeout: u64,

    /// Seconds to wait for the peer to accept one write before dropping it
    #[arg(long, default_value = "30")]
    pub write_timeout: u64,

    /// Maximum size in bytes of one reassembled reply
    #[arg(long, default_value = "67108864")]
    pub max_message: usize,

    /// Directory downloaded files are written to
    #[arg(long, default_value = ".")]
    pub download_dir: PathBuf,
}

impl Args {
    /// Build the server configuration, validating every limit
    pub fn into_config(self, interactive: bool, color: bool) -> Result<ServerConfig> {
        let channel = ChannelConfig::default()
            .with_max_chunk_len(self.chunk_size)
            .with_read_timeout(Duration::from_secs(self.read_timeout))
            .with_write_timeout(Duration::from_secs(self.write_timeout))
            .with_max_message_len(self.max_message);
        channel.validate()?;

        if self.download_dir.exists() && !self.download_dir.is_dir() {
            return Err(WashroomError::Config(format!(
                "download directory {} is not a directory",
                self.download_dir.display()
            )));
        }

        Ok(ServerConfig {
            bind: SocketAddr::new(self.ip, self.port),
            channel,
            console: ConsoleConfig {
                interactive,
                color,
                download_dir: self.download_dir,
            },
        })
    }
}

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to
    pub bind: SocketAddr,
    /// Limits applied to every peer channel
    pub channel: ChannelConfig,
    /// Operator console settings
    pub console: ConsoleConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args() {
        let args = Args::try_parse_from(["washroom"]).unwrap();
        let config = args.into_config(false, false).unwrap();

        assert_eq!(config.bind, "127.0.0.1:5555".parse::<SocketAddr>().unwrap());
        assert_eq!(config.channel.max_chunk_len, 4096);
        assert_eq!(config.channel.read_timeout, Duration::from_secs(30));
        assert_eq!(config.channel.write_timeout, Duration::from_secs(30));
        assert_eq!(config.console.download_dir, PathBuf::from("."));
        assert!(!config.console.interactive);
    }

    #[test]
    fn test_short_flags() {
        let args = Args::try_parse_from(["washroom", "-i", "0.0.0.0", "-p", "6000", "-v"]).unwrap();
        assert!(args.verbose);
        let config = args.into_config(true, true).unwrap();
        assert_eq!(config.bind.port(), 6000);
        assert!(config.bind.ip().is_unspecified());
        assert!(config.console.color);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Args::try_parse_from(["washroom", "-p", "70000"]).is_err());
        assert!(Args::try_parse_from(["washroom", "-i", "not-an-ip"]).is_err());

        let args = Args::try_parse_from(["washroom", "--chunk-size", "0"]).unwrap();
        assert!(matches!(args.into_config(false, false), Err(WashroomError::Config(_))));

        let args = Args::try_parse_from(["washroom", "--read-timeout", "0"]).unwrap();
        assert!(matches!(args.into_config(false, false), Err(WashroomError::Config(_))));

        let args = Args::try_parse_from(["washroom", "--write-timeout", "0"]).unwrap();
        assert!(matches!(args.into_config(false, false), Err(WashroomError::Config(_))));
    }
}
