//! Stall detection by position polling.
//!
//! The actuator has no limit switch feedback. A motor that has reached a
//! physical limit stops changing its reported position, so "unchanged for
//! `window`" is the only signal that a move is over.

use std::time::{Duration, Instant};

use shade_traits::PositionFeed;
use shade_traits::clock::Clock;

use crate::config::StallCfg;
use crate::error::StallTimeout;

/// Floor for the sleep between samples; a zero interval would spin.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Poll `source` every `cfg.poll_interval` until the position has held the
/// same value for at least `cfg.window`, and return that position.
///
/// - The window is measured from the first sample that showed the current value.
/// - An unknown sample (`None`) is a transient gap: it neither confirms nor
///   breaks a stall, and the time spent in the gap does not count toward the
///   window.
/// - Fails with [`StallTimeout`] once `timeout` has elapsed without a stall.
/// - Polls no faster than [`MIN_POLL_INTERVAL`].
pub fn wait_for_stall<P, C>(
    source: &mut P,
    cfg: &StallCfg,
    timeout: Duration,
    clock: &C,
) -> Result<u8, StallTimeout>
where
    P: PositionFeed + ?Sized,
    C: Clock + ?Sized,
{
    let poll = cfg.poll_interval.max(MIN_POLL_INTERVAL);
    let start = clock.now();
    let mut last_position: Option<u8> = None;
    // First time the current value was seen, shifted forward by any gaps.
    let mut stable_since: Option<Instant> = None;
    let mut gap_started: Option<Instant> = None;
    let mut samples: u32 = 0;

    loop {
        let now = clock.now();
        samples = samples.saturating_add(1);
        match source.current_position() {
            Some(pos) => {
                if let Some(gap) = gap_started.take()
                    && let Some(since) = stable_since.as_mut()
                {
                    *since += now.saturating_duration_since(gap);
                }
                if last_position == Some(pos) {
                    let since = *stable_since.get_or_insert(now);
                    let held = now.saturating_duration_since(since);
                    if held >= cfg.window {
                        tracing::debug!(
                            position = pos,
                            samples,
                            elapsed_ms = clock.ms_since(start),
                            "stall detected"
                        );
                        return Ok(pos);
                    }
                } else {
                    tracing::trace!(position = pos, previous = ?last_position, "position moving");
                    last_position = Some(pos);
                    stable_since = Some(now);
                }
            }
            None => {
                tracing::trace!("position unavailable");
                gap_started.get_or_insert(now);
            }
        }

        let elapsed = now.saturating_duration_since(start);
        if elapsed >= timeout {
            tracing::debug!(last_position = ?last_position, samples, "stall wait timed out");
            return Err(StallTimeout {
                last_position,
                elapsed,
            });
        }
        clock.sleep(poll);
    }
}
