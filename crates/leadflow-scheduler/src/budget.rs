//! Per-tick send budget.
//!
//! Spreads the remaining hourly capacity over the ticks left in the hour,
//! then thins it randomly so sends do not land on a fixed cadence.

use chrono::{NaiveDateTime, Timelike};
use leadflow_core::traits::RandomSource;

/// Hard cap on messages sent in a single tick, whatever the capacity.
pub const TICK_SEND_CEILING: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetInput {
    /// Pending messages in the queue.
    pub pending: usize,
    pub per_sender_cap: u32,
    pub senders: usize,
    /// Messages already sent this wall-clock hour across all senders.
    pub sent_this_hour: usize,
    pub tick_interval_minutes: u32,
    /// 0-100.
    pub send_probability: u8,
}

/// Ticks left before the hour boundary, counting the current one. Never below 1.
pub fn intervals_remaining(now: NaiveDateTime, tick_interval_minutes: u32) -> usize {
    let minutes_left = 60 - now.minute() as usize;
    let interval = tick_interval_minutes.max(1) as usize;
    minutes_left.div_ceil(interval).max(1)
}

/// How many messages this tick may send.
pub fn calculate_msgs_to_send(
    input: &BudgetInput,
    now: NaiveDateTime,
    rng: &mut dyn RandomSource,
) -> usize {
    let capacity = input.per_sender_cap as i64 * input.senders as i64;
    let remaining = capacity - input.sent_this_hour as i64;
    if remaining <= 0 {
        return 0;
    }

    let intervals = intervals_remaining(now, input.tick_interval_minutes);
    let base = remaining as usize / intervals;

    // Before the final tick of the hour, keep each slot only by chance.
    let count = if intervals > 1 {
        (0..base)
            .filter(|_| rng.chance(input.send_probability))
            .count()
    } else {
        base
    };

    count.min(input.pending).min(TICK_SEND_CEILING)
}
