//! Resolves and dials each `host:port` argument through one shared pool.
//!
//! ```text
//! RUST_LOG=fastdial=debug cargo run --example resolve -- example.com:80 example.com:443
//! ```

use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), fastdial::Error> {
    env_logger::init();

    let mut hostports: Vec<String> = std::env::args().skip(1).collect();
    if hostports.is_empty() {
        hostports.push("www.example.com:80".into());
    }

    let pool = fastdial::Pool::builder()
        .randomize(false)
        .timeout(Duration::from_secs(10))
        .build()?;
    let dialer = fastdial::Dialer::with_pool(pool.clone());

    for hostport in &hostports {
        match pool.get(hostport).await {
            Ok(addr) => println!(
                "{hostport} -> {addr} ({} cached)",
                pool.cache().count(hostport)
            ),
            Err(err) => eprintln!("{hostport}: {err}"),
        }

        let stream = dialer.dial(hostport).await?;
        if let Ok(peer) = stream.peer_addr() {
            println!("{hostport}: connected to {peer}");
        }
    }

    Ok(())
}
