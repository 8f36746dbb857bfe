//! HDLC-style link tool.
//!
//! Sends a file to a peer over TCP with stop-and-wait ARQ, or listens for one
//! incoming transfer and writes what it receives.

use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use hdlc_session::{
    accept_tcp, connect_tcp, listen_tcp, FaultyTransport, Receiver, Sender, Transport,
};
use hdlc_wire::Chunker;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod logging;

use config::{AppConfig, CliOverrides};
use logging::LinkLogFormatter;

/// Stop-and-wait file transfer over TCP
#[derive(Parser, Debug)]
#[command(name = "hdlc-link", version, about = "HDLC-style stop-and-wait file transfer")]
struct Args {
    #[command(subcommand)]
    mode: Mode,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Configuration file path (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Largest payload per frame in bytes
    #[arg(long, global = true)]
    max_chunk_size: Option<usize>,

    /// Time to wait for an acknowledgment, e.g. 3s or 500ms
    #[arg(long, global = true)]
    ack_timeout: Option<humantime::Duration>,

    /// Retransmissions allowed per frame
    #[arg(long, global = true)]
    max_retries: Option<u32>,

    /// Probability of dropping an outbound frame (testing)
    #[arg(long, global = true)]
    loss_rate: Option<f64>,

    /// Probability of flipping one bit in an outbound frame (testing)
    #[arg(long, global = true)]
    bit_error_rate: Option<f64>,

    /// Seed for fault injection
    #[arg(long, global = true)]
    seed: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Connect to a receiver and send a file
    Send {
        /// Receiver host name or address
        host: String,
        /// Receiver port
        port: u16,
        /// File to send
        file: PathBuf,
        /// Send each line as its own chunks, without line terminators
        #[arg(long)]
        by_line: bool,
    },
    /// Wait for one sender and receive its file
    Receive {
        /// Port to listen on
        port: u16,
        /// Address to bind
        #[arg(long, default_value = "0.0.0.0")]
        bind: IpAddr,
        /// Write the received data here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            max_chunk_size: self.max_chunk_size,
            ack_timeout: self.ack_timeout.map(Into::into),
            max_retries: self.max_retries,
            loss_rate: self.loss_rate,
            bit_error_rate: self.bit_error_rate,
            seed: self.seed,
        }
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!(
            "warn,hdlc_link={level},hdlc_session={level},hdlc_wire={level}",
            level = args.log_level
        ))
    })?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .event_format(LinkLogFormatter::new("hdlc"))
        .init();

    info!("Starting hdlc-link v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(args.config.as_deref(), &args.overrides())?;

    match args.mode {
        Mode::Send {
            host,
            port,
            file,
            by_line,
        } => send(&config, &host, port, file, by_line).await,
        Mode::Receive { port, bind, output } => {
            receive(&config, SocketAddr::new(bind, port), output).await
        }
    }
}

async fn send(
    config: &AppConfig,
    host: &str,
    port: u16,
    file: PathBuf,
    by_line: bool,
) -> anyhow::Result<()> {
    let data = tokio::fs::read(&file)
        .await
        .with_context(|| format!("failed to read {:?}", file))?;
    let data = Bytes::from(data);

    let chunker = Chunker::new(config.link.max_chunk_size);
    let chunks = if by_line {
        chunker.chunk_lines(data)
    } else {
        chunker.chunk(data)
    };

    let addr = tokio::net::lookup_host((host, port))
        .await
        .with_context(|| format!("failed to resolve {}:{}", host, port))?
        .next()
        .with_context(|| format!("no address for {}:{}", host, port))?;

    component_info!("link", "Connecting to {} ({}:{})", addr, host, port);
    let transport = connect_tcp(addr)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;
    component_info!("link", "Connected to {}", addr);

    let sender = Sender::new(with_faults(config, transport), config.link.clone())?;
    match sender.send_all(chunks).await {
        Ok(report) => {
            component_info!(
                "sender",
                "Sent {} chunks ({} bytes) in {} frames: {} retransmissions, {} rejects, {} timeouts",
                report.chunks,
                report.bytes,
                report.frames_sent,
                report.retransmissions,
                report.rejects,
                report.timeouts
            );
            Ok(())
        }
        Err(e) => {
            component_error!("sender", "Transfer to {} failed: {}", addr, e);
            Err(e.into())
        }
    }
}

async fn receive(
    config: &AppConfig,
    addr: SocketAddr,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let listener = listen_tcp(addr)
        .await
        .with_context(|| format!("failed to listen on {}", addr))?;
    component_info!("link", "Waiting for a connection on {}", listener.local_addr()?);

    let (transport, peer) = accept_tcp(&listener).await?;
    component_info!("link", "Connection established with {}", peer);

    let receiver = Receiver::new(with_faults(config, transport), config.link.clone())?;
    let transfer = receiver.run().await?;

    if !transfer.ended {
        component_warn!("receiver", "Peer closed the connection before End");
    }
    component_info!(
        "receiver",
        "Received {} chunks ({} bytes): {} rejects, {} duplicates",
        transfer.chunks.len(),
        transfer.data.len(),
        transfer.rejects,
        transfer.duplicates
    );

    match output {
        Some(path) => tokio::fs::write(&path, &transfer.data)
            .await
            .with_context(|| format!("failed to write {:?}", path))?,
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(&transfer.data).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

/// Wrap a transport in the configured fault model; zero rates pass through
fn with_faults<T: Transport>(config: &AppConfig, transport: T) -> FaultyTransport<T> {
    if config.faults.loss_rate > 0.0 || config.faults.bit_error_rate > 0.0 {
        component_warn!(
            "link",
            "Fault injection enabled: loss_rate={}, bit_error_rate={}, seed={}",
            config.faults.loss_rate,
            config.faults.bit_error_rate,
            config.faults.seed
        );
    }
    FaultyTransport::new(transport, &config.faults)
}
