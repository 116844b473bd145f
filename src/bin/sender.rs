//! Strand Sender Application
//!
//! Sends commands or raw frames to a running strand server.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use strand_server::{
    constants::{DEFAULT_COMMAND_PORT, DEFAULT_PIXEL_COUNT},
    network::{CommandClient, RawClient},
    AnimationSpec, Command, Pixel,
};

#[derive(Parser, Debug)]
#[command(name = "strand-sender", about = "Send commands to a strand server", version)]
struct Cli {
    #[arg(
        long,
        value_name = "HOST:PORT",
        default_value_t = format!("127.0.0.1:{DEFAULT_COMMAND_PORT}"),
        help = "Server address"
    )]
    addr: String,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Remove all animations and turn every pixel off
    Clear,
    /// Set pixels from index 0 onward
    Set {
        #[arg(required = true, value_name = "RRGGBB")]
        colors: Vec<Pixel>,
    },
    /// Queue a solid fill
    Fill {
        #[arg(value_name = "RRGGBB")]
        color: Pixel,
    },
    /// Queue a blinking fill
    Blink {
        #[arg(value_name = "RRGGBB")]
        color: Pixel,
        #[arg(long, default_value_t = 1000)]
        period_ms: u32,
    },
    /// Queue a single lit pixel stepping along the strand
    Chase {
        #[arg(value_name = "RRGGBB")]
        color: Pixel,
        #[arg(long, default_value_t = 100)]
        period_ms: u32,
    },
    /// Stream solid raw frames (server must run with --raw)
    Raw {
        #[arg(value_name = "RRGGBB")]
        color: Pixel,
        #[arg(long, default_value_t = DEFAULT_PIXEL_COUNT)]
        pixels: usize,
        #[arg(long, default_value_t = 1)]
        count: u32,
        #[arg(long, default_value_t = 40)]
        interval_ms: u64,
    },
}

impl Action {
    /// Command-protocol equivalent, if this action uses that protocol
    fn to_command(&self) -> Option<Command> {
        let command = match self {
            Self::Clear => Command::Clear,
            Self::Set { colors } => Command::SetPixels(colors.clone()),
            Self::Fill { color } => Command::QueueAnimations(vec![AnimationSpec::Fill {
                color: *color,
            }]),
            Self::Blink { color, period_ms } => {
                Command::QueueAnimations(vec![AnimationSpec::Blink {
                    color: *color,
                    period_ms: *period_ms,
                }])
            }
            Self::Chase { color, period_ms } => {
                Command::QueueAnimations(vec![AnimationSpec::Chase {
                    color: *color,
                    period_ms: *period_ms,
                }])
            }
            Self::Raw { .. } => return None,
        };
        Some(command)
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

    if let Some(command) = cli.action.to_command() {
        let name = command.name();
        let mut client = CommandClient::connect(&cli.addr)
            .await
            .with_context(|| format!("Failed to connect to {}", cli.addr))?;
        client.send(command).await.context("Failed to send command")?;
        client.close().await?;
        tracing::info!("Sent {} to {}", name, cli.addr);
        return Ok(());
    }

    if let Action::Raw {
        color,
        pixels,
        count,
        interval_ms,
    } = cli.action
    {
        let mut client = RawClient::connect(&cli.addr, pixels)
            .await
            .with_context(|| format!("Failed to connect to {}", cli.addr))?;
        let frame = vec![color; pixels];
        let interval = Duration::from_millis(interval_ms);

        for i in 0..count {
            if i > 0 {
                tokio::time::sleep(interval).await;
            }
            client.send_frame(&frame).await.context("Failed to send frame")?;
        }
        client.close().await?;
        tracing::info!("Sent {} raw frame(s) of {} pixels to {}", count, pixels, cli.addr);
    }

    Ok(())
}
