//! Host telemetry collaborator.
//!
//! Peers answer a `sysinfo` directive with an opaque text blob. The server
//! never parses it; it only relays it to the operator.

use std::fs;

use tracing::debug;

/// Source of the text returned for a `sysinfo` request
pub trait Telemetry: Send + Sync {
    /// Collect a human-readable description of the host
    fn collect(&self) -> String;
}

/// Fixed telemetry text, for simulated peers
#[derive(Debug, Clone)]
pub struct StaticTelemetry(pub String);

impl StaticTelemetry {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}

impl Telemetry for StaticTelemetry {
    fn collect(&self) -> String {
        self.0.clone()
    }
}

/// Telemetry read from the local host's procfs and os-release files
#[derive(Debug, Clone, Default)]
pub struct HostTelemetry;

impl Telemetry for HostTelemetry {
    fn collect(&self) -> String {
        format!(
            "OS: {}\nMEM: {}\nHostname: {}\nuptime: {}\n",
            os_name().unwrap_or_else(|| "unknown".to_string()),
            memory().unwrap_or_else(|| "unknown".to_string()),
            hostname().unwrap_or_else(|| "unknown".to_string()),
            uptime().unwrap_or_else(|| "unknown".to_string()),
        )
    }
}

fn read(path: &str) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) => {
            debug!(path, error = %e, "telemetry source unavailable");
            None
        }
    }
}

fn os_name() -> Option<String> {
    let release = read("/etc/os-release")?;
    parse_os_release(&release)
}

fn parse_os_release(release: &str) -> Option<String> {
    release
        .lines()
        .find_map(|line| line.strip_prefix("PRETTY_NAME="))
        .map(|value| value.trim_matches('"').to_string())
}

fn hostname() -> Option<String> {
    read("/proc/sys/kernel/hostname").map(|h| h.trim().to_string())
}

fn memory() -> Option<String> {
    let meminfo = read("/proc/meminfo")?;
    parse_meminfo(&meminfo)
}

fn parse_meminfo(meminfo: &str) -> Option<String> {
    let field = |name: &str| -> Option<u64> {
        meminfo
            .lines()
            .find_map(|line| line.strip_prefix(name))
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|kb| kb.parse().ok())
    };
    let total = field("MemTotal:")?;
    let available = field("MemAvailable:")?;
    Some(format!(
        "{} MiB used / {} MiB total",
        total.saturating_sub(available) / 1024,
        total / 1024
    ))
}

fn uptime() -> Option<String> {
    let text = read("/proc/uptime")?;
    format_uptime(&text)
}

fn format_uptime(text: &str) -> Option<String> {
    let seconds = text.split_whitespace().next()?.parse::<f64>().ok()? as u64;
    Some(format!(
        "{}H:{}M:{}S",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    ))
}
