//! LLSR node daemon.
//!
//! Bridges the MAC core to the outside world: a UDP socket stands in for
//! the shared radio medium (one datagram per frame, sent to every
//! configured peer), two UDP ports accept application payloads (with and
//! without ARQ), a periodic timer drives the control tick, and on the sink
//! the external management server is polled from the tick.
//!
//! Everything runs on one task, so the MAC's single-lock contract holds by
//! construction: handlers never overlap and none of them suspends.

mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use llsr_mac::{Mac, MacConfig};
use llsr_mgmt::ManagerServer;
use tokio::net::UdpSocket;

use config::Config;

#[derive(Parser, Debug)]
#[command(name = "llsrd", about = "LLSR sensor-network node daemon")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Node address; overrides the config file. Address 0 is the sink.
    #[arg(long)]
    addr: Option<u8>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => {
            let addr = args.addr.context("either --config or --addr is required")?;
            toml::from_str(&format!("[node]\naddr = {addr}\n")).context("default config")?
        }
    };
    if let Some(addr) = args.addr {
        config.node.addr = addr;
    }

    run(config).await
}

async fn run(config: Config) -> anyhow::Result<()> {
    let mac_config: MacConfig = config.mac_config();
    let addr = mac_config.addr;
    let mut mac = Mac::new(mac_config);

    if let Some(endpoint) = config.manager_endpoint()? {
        log::info!("llsrd({addr}): management server on {endpoint:?}");
        mac.attach_manager(ManagerServer::bind(&endpoint).context("binding manager socket")?);
    }

    let radio = UdpSocket::bind(&config.radio.listen)
        .await
        .with_context(|| format!("binding radio socket {}", config.radio.listen))?;
    let app = UdpSocket::bind(&config.app.listen)
        .await
        .with_context(|| format!("binding app socket {}", config.app.listen))?;
    let app_arq = UdpSocket::bind(&config.app.listen_arq)
        .await
        .with_context(|| format!("binding app arq socket {}", config.app.listen_arq))?;

    let mut peers: Vec<SocketAddr> = Vec::new();
    for peer in &config.radio.peers {
        peers.push(peer.parse().with_context(|| format!("bad radio peer {peer}"))?);
    }
    log::info!(
        "llsrd({addr}): radio on {} with {} peer(s), tick every {}s",
        config.radio.listen,
        peers.len(),
        config.app.tick_interval
    );

    let mut tick = tokio::time::interval(Duration::from_secs_f64(config.app.tick_interval));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let mut radio_buf = [0u8; 2048];
    let mut app_buf = [0u8; 2048];
    let mut app_arq_buf = [0u8; 2048];

    loop {
        tokio::select! {
            _ = tick.tick() => {
                mac.handle_tick(Instant::now());
            }
            received = radio.recv_from(&mut radio_buf) => {
                match received {
                    Ok((len, _)) => mac.handle_radio(Instant::now(), &radio_buf[..len]),
                    Err(err) => log::warn!("llsrd({addr}): radio recv failed: {err}"),
                }
            }
            received = app.recv_from(&mut app_buf) => {
                match received {
                    Ok((len, _)) => mac.handle_app(Instant::now(), &app_buf[..len]),
                    Err(err) => log::warn!("llsrd({addr}): app recv failed: {err}"),
                }
            }
            received = app_arq.recv_from(&mut app_arq_buf) => {
                match received {
                    Ok((len, _)) => mac.handle_app_arq(Instant::now(), &app_arq_buf[..len]),
                    Err(err) => log::warn!("llsrd({addr}): app arq recv failed: {err}"),
                }
            }
        }

        // flush staged frames to every peer on the shared medium
        while let Some(frame) = mac.pop_radio() {
            for peer in &peers {
                if let Err(err) = radio.send_to(&frame, *peer).await {
                    log::warn!("llsrd({addr}): send to {peer} failed: {err}");
                }
            }
        }
        while let Some(payload) = mac.pop_app() {
            log::info!("llsrd({addr}): delivered {} byte(s): {payload:?}", payload.len());
        }
    }
}
