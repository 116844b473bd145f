//! Strand Server Application
//!
//! Owns the LED strand, renders queued animations at the frame rate and
//! accepts commands or raw frames over TCP.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use strand_server::{
    channel::handoff,
    config::{AppConfig, ListenerMode},
    network::{Ingest, StrandListener},
    scheduler::all_off,
    AnimationSpec, Command, FrameScheduler, MemoryStrand, RawFrame, SpiStrand, Strand,
};

#[derive(Parser, Debug)]
#[command(
    name = "strand-server",
    about = "Drive an LED strand from network commands",
    version
)]
struct Cli {
    #[arg(
        long,
        value_name = "PATH",
        env = "STRAND_CONFIG",
        help = "TOML config file (defaults to the per-user config directory)"
    )]
    config: Option<PathBuf>,

    #[arg(long, help = "Turns all LED pixels off and exits")]
    off: bool,

    #[arg(long, help = "Listen on a TCP port for remote commands")]
    tcp: bool,

    #[arg(long, value_name = "PORT", help = "TCP port for remote commands [default: 9123]")]
    port: Option<u16>,

    #[arg(long, value_name = "ADDR", help = "Address to bind the TCP listener on")]
    bind: Option<String>,

    #[arg(long, help = "Enable the HTTP interface (not supported, ignored)")]
    http: bool,

    #[arg(long = "http-port", value_name = "PORT", help = "HTTP interface port (ignored)")]
    http_port: Option<u16>,

    #[arg(long, help = "Accept raw LED frames over TCP. Also requires --tcp")]
    raw: bool,

    #[arg(long, value_name = "COUNT", help = "Number of LED pixels in the strand [default: 25]")]
    pixels: Option<usize>,

    #[arg(long, value_name = "DEVICE", help = "SPI device to use [default: /dev/spidev0.0]")]
    spi: Option<String>,

    #[arg(long = "frame-rate", value_name = "FPS", help = "Render ticks per second [default: 24]")]
    frame_rate: Option<u32>,

    #[arg(long = "dry-run", help = "Render into memory instead of the SPI device")]
    dry_run: bool,
}

impl Cli {
    /// Command-line flags win over the config file
    fn apply(&self, config: &mut AppConfig) {
        config.off |= self.off;
        config.dry_run |= self.dry_run;
        config.listener.enabled |= self.tcp;
        config.listener.raw |= self.raw;
        config.http.enabled |= self.http;

        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(port) = self.http_port {
            config.http.port = port;
        }
        if let Some(pixels) = self.pixels {
            config.strand.pixels = pixels;
        }
        if let Some(spi) = &self.spi {
            config.strand.spi_device = spi.clone();
        }
        if let Some(frame_rate) = self.frame_rate {
            config.scheduler.frame_rate = frame_rate;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    if let Err(e) = start(&cli).await {
        tracing::error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

async fn start(cli: &Cli) -> Result<()> {
    // Load config, then let flags override it
    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;
    config.warn_inert();

    if config.dry_run {
        tracing::info!("Dry run: rendering {} pixels into memory", config.strand.pixels);
        run(MemoryStrand::new(config.strand.pixels), &config).await
    } else {
        let strand = SpiStrand::open(config.strand.pixels, &config.strand.spi_device)
            .with_context(|| format!("Failed to open strand on {}", config.strand.spi_device))?;
        run(strand, &config).await
    }
}

async fn run<S: Strand + 'static>(mut strand: S, config: &AppConfig) -> Result<()> {
    // One-shot blackout never enters the loop
    if config.off {
        all_off(&mut strand).context("Failed to turn strand off")?;
        tracing::info!("All {} pixels off", strand.len());
        return Ok(());
    }

    tracing::info!("strand-server starting up");

    let (command_tx, command_rx) = handoff::<Command>();
    let (raw_tx, raw_rx) = handoff::<RawFrame>();

    match config.listener.mode() {
        Some(mode) => {
            let addr = config.listener.socket_addr()?;
            let listener = StrandListener::bind(addr)
                .with_context(|| format!("Failed to start listener on {addr}"))?;

            let ingest = match mode {
                ListenerMode::Command => Ingest::Commands(command_tx),
                ListenerMode::Raw => Ingest::Raw {
                    frames: raw_tx,
                    pixel_count: config.strand.pixels,
                },
            };
            tokio::spawn(listener.run(ingest));
        }
        None => tracing::info!("No listener enabled; rendering only"),
    }

    FrameScheduler::<_, AnimationSpec>::new(strand, &config.scheduler)
        .run(command_rx, raw_rx)
        .await;

    Ok(())
}
