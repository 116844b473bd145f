//! Network subsystem for command and raw frame ingestion

pub mod client;
pub mod command;
pub mod listener;
pub mod raw;

pub use client::{CommandClient, RawClient};
pub use command::serve_commands;
pub use listener::{Ingest, StrandListener};
pub use raw::serve_raw;

use crate::error::ProtocolError;

/// Why a connection handler stopped
#[derive(Debug)]
pub enum ConnectionEnd {
    /// Peer closed the stream
    Closed,
    /// Reading from the socket failed
    ReadError(std::io::Error),
    /// The command stream could not be decoded
    DecodeError(ProtocolError),
    /// The scheduler dropped its receiver
    SchedulerGone,
}

/// Per-connection counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Records handed to the scheduler
    pub forwarded: u64,
    /// Records dropped (malformed commands, wrong-sized raw reads)
    pub dropped: u64,
}

impl ConnectionEnd {
    /// Log the outcome at a level matching its severity
    pub fn log(&self, stats: &ConnectionStats) {
        match self {
            Self::Closed => tracing::debug!(
                forwarded = stats.forwarded,
                dropped = stats.dropped,
                "Connection closed by peer"
            ),
            Self::ReadError(e) => tracing::debug!(
                forwarded = stats.forwarded,
                dropped = stats.dropped,
                "Connection read failed: {}",
                e
            ),
            Self::DecodeError(e) => tracing::debug!(
                forwarded = stats.forwarded,
                dropped = stats.dropped,
                "Closing connection after undecodable input: {}",
                e
            ),
            Self::SchedulerGone => {
                tracing::warn!("Frame scheduler stopped; closing connection")
            }
        }
    }
}
