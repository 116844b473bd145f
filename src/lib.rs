//! # Strand Server
//!
//! Network-driven real-time compositor for addressable LED strands.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                              NETWORK SENDERS                             │
//! │     ┌────────────┐        ┌────────────┐        ┌────────────┐           │
//! │     │ Connection │        │ Connection │        │ Connection │   ...     │
//! │     └─────┬──────┘        └─────┬──────┘        └─────┬──────┘           │
//! └───────────┼─────────────────────┼─────────────────────┼──────────────────┘
//!             │ TCP                 │ TCP                 │ TCP
//!             ▼                     ▼                     ▼
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │        Listener (network::listener) - supervised accept loop             │
//! │  ┌───────────────────────┐              ┌───────────────────────┐        │
//! │  │ Command decode task   │      or      │ Raw frame read task   │        │
//! │  │ (network::command)    │              │ (network::raw)        │        │
//! │  └───────────┬───────────┘              └───────────┬───────────┘        │
//! └──────────────┼──────────────────────────────────────┼────────────────────┘
//!                │ Handoff (blocks until consumed)      │
//!                ▼                                      ▼
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                   Frame Scheduler (scheduler) - single owner             │
//! │                                                                          │
//! │   select! { command => interpreter, raw frame => strand, tick => render }│
//! │                                                                          │
//! │   ┌────────────────┐    ┌────────────────┐    ┌──────────────────────┐   │
//! │   │ AnimationList  │───▶│ render(t, s)   │───▶│ Strand::write (SPI)  │   │
//! │   └────────────────┘    └────────────────┘    └──────────────────────┘   │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod animation;
pub mod channel;
pub mod config;
pub mod error;
pub mod interpreter;
pub mod network;
pub mod protocol;
pub mod scheduler;
pub mod strand;

pub use animation::{Animation, AnimationSpec};
pub use error::{Error, Result};
pub use protocol::{Command, Pixel, RawFrame};
pub use scheduler::FrameScheduler;
pub use strand::{MemoryStrand, SpiStrand, Strand};

/// Application-wide constants
pub mod constants {
    /// Default TCP port for the command/raw listener
    pub const DEFAULT_COMMAND_PORT: u16 = 9123;

    /// Default HTTP port (accepted, never served)
    pub const DEFAULT_HTTP_PORT: u16 = 8080;

    /// Default number of pixels in the strand
    pub const DEFAULT_PIXEL_COUNT: usize = 25;

    /// Default SPI device the strand is attached to
    pub const DEFAULT_SPI_DEVICE: &str = "/dev/spidev0.0";

    /// Nominal render cadence in frames per second
    pub const DEFAULT_FRAME_RATE: u32 = 24;

    /// Upper bound accepted for the render cadence
    pub const MAX_FRAME_RATE: u32 = 1000;

    /// Bytes per pixel on the raw wire protocol (R, G, B)
    pub const BYTES_PER_PIXEL: usize = 3;

    /// Largest single serialized command record accepted from a connection
    pub const MAX_RECORD_BYTES: u64 = 1 << 20;

    /// Initial delay after a failed accept
    pub const ACCEPT_BACKOFF_INITIAL_MS: u64 = 50;

    /// Ceiling for the accept backoff
    pub const ACCEPT_BACKOFF_MAX_MS: u64 = 5_000;
}
