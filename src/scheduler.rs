//! Frame scheduler
//!
//! The event loop that owns the strand and the running animation list. It
//! merges three sources into one stream of effects:
//!
//! 1. decoded commands → [`apply_command`]
//! 2. raw frames → direct pixel writes
//! 3. ticks at the frame rate → render every animation, then flush
//!
//! There is no priority among ready sources. Ticks missed while the loop is
//! busy are skipped rather than queued, so a slow flush drops frames instead
//! of building a backlog.

use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;

use crate::animation::Animation;
use crate::channel::HandoffReceiver;
use crate::config::SchedulerConfig;
use crate::error::StrandError;
use crate::interpreter::apply_command;
use crate::protocol::{Command, Pixel, RawFrame};
use crate::strand::Strand;

/// How often the running loop reports its counters
const STATS_INTERVAL: Duration = Duration::from_secs(10);

/// Shortest frame period the tick source accepts
const MIN_FRAME_PERIOD: Duration = Duration::from_millis(1);

/// One input to the scheduler
#[derive(Debug)]
pub enum Event<A> {
    Command(Command<A>),
    Raw(RawFrame),
    Tick(DateTime<Utc>),
}

/// Scheduler counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub commands: u64,
    pub raw_frames: u64,
    pub raw_frames_rejected: u64,
    pub ticks: u64,
    pub flush_failures: u64,
}

/// Sole owner of the strand and the animation list
pub struct FrameScheduler<S, A> {
    strand: S,
    animations: Vec<A>,
    frame_period: Duration,
    stats: SchedulerStats,
}

impl<S: Strand, A: Animation> FrameScheduler<S, A> {
    /// Create a scheduler with an empty animation list
    pub fn new(strand: S, config: &SchedulerConfig) -> Self {
        Self::with_frame_period(strand, config.frame_period())
    }

    /// Create a scheduler with a custom frame period, clamped to at least 1 ms
    pub fn with_frame_period(strand: S, frame_period: Duration) -> Self {
        Self {
            strand,
            animations: Vec::new(),
            frame_period: frame_period.max(MIN_FRAME_PERIOD),
            stats: SchedulerStats::default(),
        }
    }

    /// Apply one decoded command
    pub fn dispatch(&mut self, command: Command<A>) {
        tracing::trace!(command = command.name(), "dispatching command");
        let animations = std::mem::take(&mut self.animations);
        self.animations = apply_command(&mut self.strand, command, animations);
        self.stats.commands += 1;
    }

    /// Copy a raw frame straight onto the strand
    ///
    /// Frames that do not cover the strand exactly are dropped.
    pub fn apply_raw(&mut self, frame: &RawFrame) {
        if frame.pixel_count() != self.strand.len() {
            tracing::warn!(
                "Dropping raw frame with {} pixels for a {}-pixel strand",
                frame.pixel_count(),
                self.strand.len()
            );
            self.stats.raw_frames_rejected += 1;
            return;
        }

        for (index, pixel) in frame.pixels().enumerate() {
            self.strand.set(index, pixel);
        }
        self.stats.raw_frames += 1;
    }

    /// Render every running animation for `now`, then flush
    pub fn tick(&mut self, now: DateTime<Utc>) {
        for animation in &mut self.animations {
            animation.render(now, &mut self.strand);
        }

        if let Err(e) = self.strand.write() {
            self.stats.flush_failures += 1;
            tracing::warn!("Failed to flush strand: {}", e);
        }
        self.stats.ticks += 1;
    }

    /// Route one event to its handler
    pub fn handle(&mut self, event: Event<A>) {
        match event {
            Event::Command(command) => self.dispatch(command),
            Event::Raw(frame) => self.apply_raw(&frame),
            Event::Tick(now) => self.tick(now),
        }
    }

    /// Run the event loop forever
    ///
    /// A closed input is simply no longer polled; the tick source keeps the
    /// loop alive.
    pub async fn run(
        mut self,
        mut commands: HandoffReceiver<Command<A>>,
        mut raw_frames: HandoffReceiver<RawFrame>,
    ) {
        let mut ticker = tokio::time::interval(self.frame_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut commands_open = true;
        let mut raw_open = true;
        let mut last_stats = Instant::now();

        tracing::info!(
            "Frame scheduler running: {} pixels, {:.1} ms/frame",
            self.strand.len(),
            self.frame_period.as_secs_f64() * 1000.0
        );

        loop {
            let event = tokio::select! {
                command = commands.recv(), if commands_open => match command {
                    Some(command) => Event::Command(command),
                    None => {
                        tracing::debug!("Command channel closed");
                        commands_open = false;
                        continue;
                    }
                },
                frame = raw_frames.recv(), if raw_open => match frame {
                    Some(frame) => Event::Raw(frame),
                    None => {
                        tracing::debug!("Raw channel closed");
                        raw_open = false;
                        continue;
                    }
                },
                _ = ticker.tick() => Event::Tick(Utc::now()),
            };
            self.handle(event);

            if last_stats.elapsed() >= STATS_INTERVAL {
                last_stats = Instant::now();
                tracing::debug!(
                    "Scheduler stats: {} ticks, {} commands, {} raw frames ({} rejected), {} flush failures, {} animations",
                    self.stats.ticks,
                    self.stats.commands,
                    self.stats.raw_frames,
                    self.stats.raw_frames_rejected,
                    self.stats.flush_failures,
                    self.animations.len()
                );
            }
        }
    }

    pub fn frame_period(&self) -> Duration {
        self.frame_period
    }

    pub fn strand(&self) -> &S {
        &self.strand
    }

    pub fn animations(&self) -> &[A] {
        &self.animations
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }
}

/// Black out the strand and flush once
pub fn all_off<S: Strand + ?Sized>(strand: &mut S) -> Result<(), StrandError> {
    strand.wipe(Pixel::BLACK);
    strand.write()
}
