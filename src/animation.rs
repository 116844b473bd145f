//! Animations rendered onto the strand on every tick
//!
//! The scheduler only knows the [`Animation`] trait. [`AnimationSpec`] is the
//! serializable set that can be queued over the command protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::Pixel;
use crate::strand::Strand;

pub trait Animation: Send {
    /// Update some subset of pixels for the frame at `at`
    fn render(&mut self, at: DateTime<Utc>, strand: &mut dyn Strand);
}

impl<T: Animation + ?Sized> Animation for Box<T> {
    fn render(&mut self, at: DateTime<Utc>, strand: &mut dyn Strand) {
        (**self).render(at, strand);
    }
}

/// Animations that can travel on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnimationSpec {
    /// Whole strand one color
    Fill { color: Pixel },
    /// Whole strand `color` for the first half of every period, black for the rest
    Blink { color: Pixel, period_ms: u32 },
    /// A single lit pixel advancing one index per period
    Chase { color: Pixel, period_ms: u32 },
}

/// Position of `at` within a repeating period, in milliseconds
fn phase_ms(at: DateTime<Utc>, period_ms: u32) -> (i64, i64) {
    let period = i64::from(period_ms.max(1));
    let millis = at.timestamp_millis();
    (millis.div_euclid(period), millis.rem_euclid(period))
}

impl Animation for AnimationSpec {
    fn render(&mut self, at: DateTime<Utc>, strand: &mut dyn Strand) {
        match *self {
            AnimationSpec::Fill { color } => strand.wipe(color),
            AnimationSpec::Blink { color, period_ms } => {
                let (_, phase) = phase_ms(at, period_ms);
                if phase < i64::from(period_ms.max(1)) / 2 {
                    strand.wipe(color);
                } else {
                    strand.wipe(Pixel::BLACK);
                }
            }
            AnimationSpec::Chase { color, period_ms } => {
                if strand.is_empty() {
                    return;
                }
                let (step, _) = phase_ms(at, period_ms);
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let lit = step.rem_euclid(strand.len() as i64) as usize;
                strand.wipe(Pixel::BLACK);
                strand.set(lit, color);
            }
        }
    }
}
