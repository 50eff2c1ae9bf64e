//! Connect to a host by racing every address it resolves to.
//!
//! Usage: cargo run --example connect_host -- <host> <port> [timeout_ms]

use racenet::socket::connect_to_host;
use racenet::sync::CancelSignal;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1);
    let (Some(host), Some(port)) = (args.next(), args.next()) else {
        eprintln!("usage: connect_host <host> <port> [timeout_ms]");
        std::process::exit(2);
    };
    let timeout = args
        .next()
        .and_then(|ms| ms.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(10));

    let cancel = CancelSignal::new();
    let _timer = cancel.fire_after(timeout);

    match connect_to_host(&host, &port, &cancel).await {
        Ok(mut conn) => {
            println!("Connected to {host}:{port} via {:?}", conn.peer_addr());
            let _ = conn.shutdown().await;
        }
        Err(e) if e.is_cancelled() => {
            eprintln!("Gave up on {host}:{port} after {timeout:?}");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed to connect to {host}:{port}: {e} ({})", e.as_i32());
            std::process::exit(1);
        }
    }
}
