//! Sender rotation.
//!
//! Per-sender counts are rebuilt from queue history on every tick. A sender
//! is eligible while under its hourly (and optional daily) cap, and the
//! sender used last is only picked again when it is the sole eligible one.

use chrono::{NaiveDateTime, Timelike};
use leadflow_core::config::DispatchConfig;
use leadflow_core::traits::RandomSource;
use leadflow_core::types::QueueEntry;

/// One configured outbound number and its usage in the current windows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderChannel {
    pub id: String,
    pub sent_this_hour: u32,
    pub sent_today: u32,
}

#[derive(Debug, Clone)]
pub struct SenderPool {
    channels: Vec<SenderChannel>,
    per_hour_cap: u32,
    per_day_cap: Option<u32>,
    last_used: Option<String>,
}

impl SenderPool {
    pub fn new(senders: &[String], per_hour_cap: u32, per_day_cap: Option<u32>) -> Self {
        let mut channels: Vec<SenderChannel> = Vec::with_capacity(senders.len());
        for id in senders {
            let id = id.trim();
            if id.is_empty() || channels.iter().any(|c| c.id == id) {
                continue;
            }
            channels.push(SenderChannel {
                id: id.to_string(),
                sent_this_hour: 0,
                sent_today: 0,
            });
        }
        Self {
            channels,
            per_hour_cap,
            per_day_cap,
            last_used: None,
        }
    }

    /// Rebuild counts and the last-used sender from queue history.
    pub fn from_history(config: &DispatchConfig, entries: &[QueueEntry], now: NaiveDateTime) -> Self {
        let mut pool = Self::new(
            &config.senders,
            config.max_per_sender_per_hour,
            config.max_per_sender_per_day,
        );
        let mut latest: Option<(NaiveDateTime, &str)> = None;

        for entry in entries {
            let Some(sent_at) = entry.sent_at else { continue };
            if entry.sender.is_empty() {
                continue;
            }
            if latest.is_none_or(|(t, _)| sent_at >= t) {
                latest = Some((sent_at, entry.sender.as_str()));
            }
            // Numbers no longer in the pool do not count against anyone.
            let Some(channel) = pool.channels.iter_mut().find(|c| c.id == entry.sender) else {
                continue;
            };
            if sent_at.date() == now.date() {
                channel.sent_today += 1;
                if sent_at.hour() == now.hour() {
                    channel.sent_this_hour += 1;
                }
            }
        }

        pool.last_used = latest.map(|(_, sender)| sender.to_string());
        pool
    }

    pub fn with_last_used(mut self, last_used: Option<&str>) -> Self {
        self.last_used = last_used.map(str::to_string);
        self
    }

    pub fn last_used(&self) -> Option<&str> {
        self.last_used.as_deref()
    }

    pub fn channels(&self) -> &[SenderChannel] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Total sent this hour by configured senders.
    pub fn sent_this_hour(&self) -> usize {
        self.channels.iter().map(|c| c.sent_this_hour as usize).sum()
    }

    /// Senders under every cap, in configured order.
    pub fn eligible(&self) -> Vec<&str> {
        self.channels
            .iter()
            .filter(|c| c.sent_this_hour < self.per_hour_cap)
            .filter(|c| self.per_day_cap.is_none_or(|cap| c.sent_today < cap))
            .map(|c| c.id.as_str())
            .collect()
    }

    /// Pick the next sender, or `None` when every sender is at capacity.
    pub fn choose(&self, rng: &mut dyn RandomSource) -> Option<String> {
        let eligible = self.eligible();
        if eligible.is_empty() {
            return None;
        }
        let fresh: Vec<&str> = eligible
            .iter()
            .copied()
            .filter(|id| Some(*id) != self.last_used())
            .collect();
        let candidates = if fresh.is_empty() { eligible } else { fresh };
        Some(candidates[rng.pick(candidates.len())].to_string())
    }

    pub fn record_send(&mut self, id: &str) {
        if let Some(channel) = self.channels.iter_mut().find(|c| c.id == id) {
            channel.sent_this_hour += 1;
            channel.sent_today += 1;
        }
        self.last_used = Some(id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use leadflow_core::traits::{FixedRandom, ThreadRandom};

    fn ts(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn config(senders: &[&str], per_hour: u32) -> DispatchConfig {
        DispatchConfig {
            senders: senders.iter().map(|s| s.to_string()).collect(),
            max_per_sender_per_hour: per_hour,
            ..Default::default()
        }
    }

    fn sent(sender: &str, at: NaiveDateTime) -> QueueEntry {
        QueueEntry {
            message: "hi".into(),
            recipient: "555".into(),
            sent_at: Some(at),
            sender: sender.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_from_history_counts_windows() {
        let now = ts(2, 10, 30);
        let entries = vec![
            sent("A", ts(2, 10, 5)),
            sent("A", ts(2, 9, 59)),
            sent("B", ts(1, 10, 10)),
            sent("C", ts(2, 10, 20)),
            QueueEntry::default(),
        ];
        let pool = SenderPool::from_history(&config(&["A", "B"], 4), &entries, now);
        let a = &pool.channels()[0];
        assert_eq!((a.sent_this_hour, a.sent_today), (1, 2));
        let b = &pool.channels()[1];
        assert_eq!((b.sent_this_hour, b.sent_today), (0, 0));
        assert_eq!(pool.sent_this_hour(), 1);
        // Last used is the most recent send overall, even from a retired number.
        assert_eq!(pool.last_used(), Some("C"));
    }

    #[test]
    fn test_no_history_means_no_last_used() {
        let pool = SenderPool::from_history(&config(&["A"], 1), &[], ts(2, 10, 0));
        assert_eq!(pool.last_used(), None);
    }

    #[test]
    fn test_never_repeats_last_sender_when_alternatives_exist() {
        let pool = SenderPool::new(
            &["A".to_string(), "B".to_string(), "C".to_string()],
            5,
            None,
        )
        .with_last_used(Some("B"));
        let mut rng = ThreadRandom;
        for _ in 0..100 {
            assert_ne!(pool.choose(&mut rng).as_deref(), Some("B"));
        }
    }

    #[test]
    fn test_reuses_last_sender_when_sole_eligible() {
        let mut pool = SenderPool::new(&["A".to_string(), "B".to_string()], 1, None)
            .with_last_used(Some("A"));
        pool.record_send("B");
        pool.last_used = Some("A".into());
        assert_eq!(pool.eligible(), vec!["A"]);
        assert_eq!(pool.choose(&mut FixedRandom::default()).as_deref(), Some("A"));
    }

    #[test]
    fn test_exhausted_pool_returns_none() {
        let mut pool = SenderPool::new(&["A".to_string()], 1, None);
        pool.record_send("A");
        assert!(pool.eligible().is_empty());
        assert_eq!(pool.choose(&mut FixedRandom::default()), None);
    }

    #[test]
    fn test_daily_cap() {
        let now = ts(2, 15, 0);
        let entries = vec![sent("A", ts(2, 9, 0)), sent("A", ts(2, 11, 0))];
        let mut cfg = config(&["A", "B"], 3);
        cfg.max_per_sender_per_day = Some(2);
        let pool = SenderPool::from_history(&cfg, &entries, now);
        assert_eq!(pool.eligible(), vec!["B"]);
    }

    #[test]
    fn test_duplicate_and_blank_senders_ignored() {
        let pool = SenderPool::new(
            &["A".to_string(), " A ".to_string(), "".to_string()],
            1,
            None,
        );
        assert_eq!(pool.len(), 1);
    }
}
