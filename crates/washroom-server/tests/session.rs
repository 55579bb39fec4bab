//! End-to-end console sessions against simulated peers over TCP.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use washroom_core::{PeerId, Result, StaticTelemetry};
use washroom_protocol::{Channel, ChannelConfig, Directive};
use washroom_server::{
    Console, ConsoleConfig, ConsoleExit, Listener, ListenerHandle, PeerRegistry, SessionState,
    Simulator,
};

fn channel_config() -> ChannelConfig {
    ChannelConfig::default().with_read_timeout(Duration::from_secs(5))
}

async fn start() -> (PeerRegistry, ListenerHandle) {
    let registry = PeerRegistry::new();
    let listener = Listener::bind(
        "127.0.0.1:0".parse().unwrap(),
        registry.clone(),
        channel_config(),
    )
    .await
    .unwrap();
    (registry, listener.spawn())
}

async fn connect_simulated(addr: SocketAddr, root: &Path) -> JoinHandle<Result<Vec<Directive>>> {
    let stream = TcpStream::connect(addr).await.unwrap();
    let simulator = Simulator::new(Arc::new(StaticTelemetry::new("OS: Test\n")), root);
    tokio::spawn(async move { simulator.serve(Channel::new(stream, channel_config())).await })
}

async fn wait_for_peers(registry: &PeerRegistry, count: usize) {
    for _ in 0..500 {
        if registry.len() == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {} peers, found {}", count, registry.len());
}

fn console_for(
    registry: &PeerRegistry,
    script: &'static str,
    download_dir: &Path,
) -> Console<BufReader<&'static [u8]>, Vec<u8>> {
    let config = ConsoleConfig {
        download_dir: download_dir.to_path_buf(),
        ..ConsoleConfig::default()
    };
    Console::new(registry.clone(), config, BufReader::new(script.as_bytes()), Vec::new())
}

#[tokio::test]
async fn test_list_select_sysinfo_exit() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, acceptor) = start().await;
    let peer = connect_simulated(acceptor.local_addr(), dir.path()).await;
    wait_for_peers(&registry, 1).await;

    let mut console = console_for(&registry, "list\nselect 0\nsysinfo\nexit\n", dir.path());
    let exit = console.run().await.unwrap();
    assert_eq!(exit, ConsoleExit::Operator);
    assert_eq!(console.selected(), Some(PeerId::new(0)));

    let output = String::from_utf8(console.into_output()).unwrap();
    let row = output
        .lines()
        .find(|line| line.contains("127.0.0.1"))
        .expect("list shows the peer");
    assert_eq!(row.split_whitespace().next(), Some("0"));
    assert!(row.contains("none"));
    assert!(output.contains("OS: Test\n"));

    let seen = peer.await.unwrap().unwrap();
    assert_eq!(seen, vec![Directive::Sysinfo, Directive::Exit]);

    acceptor.stop().await;
    registry.close_all().await;
}

#[tokio::test]
async fn test_peer_disconnect_tears_down_one_peer() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, acceptor) = start().await;

    // First peer hangs up right away
    let quitter = TcpStream::connect(acceptor.local_addr()).await.unwrap();
    wait_for_peers(&registry, 1).await;
    let _steady = connect_simulated(acceptor.local_addr(), dir.path()).await;
    wait_for_peers(&registry, 2).await;
    drop(quitter);

    let mut console = console_for(&registry, "select 0\nsysinfo\nselect 1\nsysinfo\n", dir.path());
    assert_eq!(console.run().await.unwrap(), ConsoleExit::EndOfInput);

    let output = String::from_utf8(console.output().clone()).unwrap();
    assert!(output.contains("[!] peer 0 disconnected"));
    assert!(output.contains("OS: Test\n"));
    assert_eq!(
        console.state(),
        &SessionState::Selected {
            id: PeerId::new(1),
            host: "127.0.0.1".into()
        }
    );
    assert_eq!(registry.len(), 1);

    acceptor.stop().await;
    registry.close_all().await;
}

#[tokio::test]
async fn test_upload_then_download() {
    let local = tempfile::tempdir().unwrap();
    let remote = tempfile::tempdir().unwrap();
    let downloads = tempfile::tempdir().unwrap();

    let content: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    let source = local.path().join("payload.bin");
    std::fs::write(&source, &content).unwrap();

    let (registry, acceptor) = start().await;
    let _peer = connect_simulated(acceptor.local_addr(), remote.path()).await;
    wait_for_peers(&registry, 1).await;

    let mut console = console_for(&registry, "", downloads.path());
    console.handle_line("select 0").await.unwrap();
    console
        .handle_line(&format!("up {}", source.display()))
        .await
        .unwrap();
    console.handle_line("sysinfo").await.unwrap();
    assert_eq!(std::fs::read(remote.path().join("payload.bin")).unwrap(), content);

    console.handle_line("dl payload.bin").await.unwrap();
    assert_eq!(std::fs::read(downloads.path().join("payload.bin")).unwrap(), content);

    console.handle_line("dl missing.bin").await.unwrap();
    let output = String::from_utf8(console.output().clone()).unwrap();
    assert!(output.contains("[*] uploaded"));
    assert!(output.contains("[*] downloaded"));
    assert!(output.lines().any(|l| l.starts_with("[!] peer refused")));
    assert!(!downloads.path().join("missing.bin").exists());

    // Refusal is not a peer fault
    assert_eq!(console.selected(), Some(PeerId::new(0)));
    assert_eq!(registry.len(), 1);

    acceptor.stop().await;
    registry.close_all().await;
}

#[tokio::test]
async fn test_ids_increase_across_reconnects() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, acceptor) = start().await;

    let first = TcpStream::connect(acceptor.local_addr()).await.unwrap();
    wait_for_peers(&registry, 1).await;
    assert!(registry.unregister(PeerId::new(0)).await);
    drop(first);

    let _second = connect_simulated(acceptor.local_addr(), dir.path()).await;
    wait_for_peers(&registry, 1).await;
    assert_eq!(registry.snapshot()[0].id, PeerId::new(1));

    acceptor.stop().await;
    registry.close_all().await;
}
