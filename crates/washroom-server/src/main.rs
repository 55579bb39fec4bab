//! Washroom session server
//!
//! Accepts peer connections in the background and hands the terminal to the
//! operator console. Exits 0 when the operator leaves, non-zero when the
//! listener cannot be set up.

use std::io::IsTerminal;

use clap::Parser;
use colored::Colorize;
use tokio::io::BufReader;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use washroom_server::{Args, Console, Listener, PeerRegistry};

fn print_banner(color: bool) {
    let banner = format!(
        r#"
 ██╗    ██╗███████╗██████╗
 ██║    ██║██╔════╝██╔══██╗
 ██║ █╗ ██║███████╗██████╔╝
 ██║███╗██║╚════██║██╔══██╗
 ╚███╔███╔╝███████║██║  ██║
  ╚══╝╚══╝ ╚══════╝╚═╝  ╚═╝

    Washroom session server v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
    if color {
        println!("{}", banner.cyan());
    } else {
        println!("{}", banner);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup logging; stdout belongs to the console
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let interactive = std::io::stdin().is_terminal();
    let color = std::io::stdout().is_terminal();
    let config = args.into_config(interactive, color)?;

    print_banner(color);

    info!("Starting washroom");
    info!("  Bind address: {}", config.bind);
    info!("  Chunk size: {} bytes", config.channel.max_chunk_len);
    info!("  Read timeout: {:?}", config.channel.read_timeout);
    info!("  Write timeout: {:?}", config.channel.write_timeout);
    info!("  Download directory: {}", config.console.download_dir.display());

    let registry = PeerRegistry::new();
    let listener = Listener::bind(config.bind, registry.clone(), config.channel.clone()).await?;
    let acceptor = listener.spawn();

    let mut console = Console::new(
        registry.clone(),
        config.console,
        BufReader::new(tokio::io::stdin()),
        std::io::stdout(),
    );
    let outcome = console.run().await;

    acceptor.stop().await;
    let closed = registry.close_all().await;
    info!(closed, "Washroom stopped");

    let exit = outcome?;
    info!(reason = ?exit, "Console finished");
    Ok(())
}
