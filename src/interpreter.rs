//! Command interpreter
//!
//! Applies one decoded [`Command`] to the strand and the running animation
//! list. Only the frame scheduler calls this.

use crate::protocol::{Command, Pixel};
use crate::strand::Strand;

/// Apply `command`, returning the animation list that replaces `animations`
///
/// - `SetPixels` writes pixel `i` from element `i`; the list is unchanged.
/// - `Clear` blacks out the strand and returns an empty list.
/// - `QueueAnimations` appends in order; the strand is untouched.
pub fn apply_command<S, A>(strand: &mut S, command: Command<A>, mut animations: Vec<A>) -> Vec<A>
where
    S: Strand + ?Sized,
{
    match command {
        Command::SetPixels(pixels) => {
            for (index, pixel) in pixels.into_iter().enumerate() {
                strand.set(index, pixel);
            }
            animations
        }
        Command::Clear => {
            strand.wipe(Pixel::BLACK);
            Vec::new()
        }
        Command::QueueAnimations(queued) => {
            animations.extend(queued);
            animations
        }
    }
}
