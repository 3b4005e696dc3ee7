//! Dispatch scheduler — one rate-limited batch of sends per tick.
//!
//! Nothing is cached between ticks: pending messages, per-sender counts and
//! the last sender used are rebuilt from the Message Queue every time. Each
//! successful send is written back before the next one starts, so a crash
//! leaves at most one message whose outcome is unknown.

use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use leadflow_core::config::DispatchConfig;
use leadflow_core::error::{LeadflowError, Result};
use leadflow_core::table::{self, SLOTS, leads, queue};
use leadflow_core::traits::{RandomSource, RecordStore, SmsSender, ThreadRandom};
use leadflow_core::types::QueueEntry;

use crate::budget::{BudgetInput, calculate_msgs_to_send};
use crate::rotation::SenderPool;

/// Wall-clock source for a tick.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Why a tick stopped sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    BudgetExhausted,
    NoEligibleSender,
    QueueEmpty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub pending: usize,
    pub budget: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped_rows: usize,
    pub stop: StopReason,
}

impl TickReport {
    fn new(pending: usize, budget: usize, skipped_rows: usize) -> Self {
        Self {
            pending,
            budget,
            sent: 0,
            failed: 0,
            skipped_rows,
            stop: StopReason::QueueEmpty,
        }
    }
}

/// Sort pending entries: highest priority first, then longest waiting,
/// then table order. Entries without a queued time go last within their priority.
pub fn order_pending(entries: &mut [&QueueEntry]) {
    entries.sort_by_key(|e| (Reverse(e.priority), e.queued_at.is_none(), e.queued_at, e.row));
}

pub struct DispatchScheduler {
    store: Arc<dyn RecordStore>,
    sender: Arc<dyn SmsSender>,
    config: DispatchConfig,
    rng: Box<dyn RandomSource>,
    clock: Clock,
}

impl DispatchScheduler {
    pub fn new(store: Arc<dyn RecordStore>, sender: Arc<dyn SmsSender>, config: DispatchConfig) -> Self {
        Self {
            store,
            sender,
            config,
            rng: Box::new(ThreadRandom),
            clock: Arc::new(|| Local::now().naive_local()),
        }
    }

    /// Replace the random source (tests use `FixedRandom`).
    pub fn with_random(mut self, rng: impl RandomSource + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> NaiveDateTime + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Run one tick: rebuild state, compute the budget, send in priority
    /// order with sender rotation, and persist every send as it happens.
    pub async fn tick(&mut self) -> Result<TickReport> {
        let now = (self.clock)();
        let mut queue_table = self.store.open(table::MESSAGE_QUEUE)?;
        // Both write-back columns must exist before anything is sent.
        let sent_col = queue_table.column_index(queue::DATE_TIME_SENT)?;
        let sender_col = queue_table.column_index(queue::SENDER_NUMBER)?;

        let mut entries = Vec::new();
        let mut skipped_rows = 0;
        for row in queue_table.read_all_rows()? {
            match QueueEntry::from_row(&row) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    tracing::warn!("⚠️ Skipping queue row {}: {e}", row.number);
                    skipped_rows += 1;
                }
            }
        }

        let mut pool = SenderPool::from_history(&self.config, &entries, now);
        let mut pending: Vec<&QueueEntry> = entries.iter().filter(|e| e.is_pending()).collect();
        order_pending(&mut pending);

        let budget = calculate_msgs_to_send(
            &BudgetInput {
                pending: pending.len(),
                per_sender_cap: self.config.max_per_sender_per_hour,
                senders: pool.len(),
                sent_this_hour: pool.sent_this_hour(),
                tick_interval_minutes: self.config.tick_interval_minutes,
                send_probability: self.config.send_probability,
            },
            now,
            self.rng.as_mut(),
        );
        tracing::info!(
            "📊 {} messages pending, {} sent this hour, sending up to {} this tick",
            pending.len(),
            pool.sent_this_hour(),
            budget
        );

        let mut report = TickReport::new(pending.len(), budget, skipped_rows);
        if pending.is_empty() {
            return Ok(report);
        }
        if budget == 0 {
            report.stop = StopReason::BudgetExhausted;
            return Ok(report);
        }

        for (index, entry) in pending.iter().enumerate() {
            if report.sent >= budget {
                report.stop = StopReason::BudgetExhausted;
                break;
            }
            let Some(sender_id) = pool.choose(self.rng.as_mut()) else {
                tracing::info!("🚦 Every sender is at its cap, stopping this tick");
                report.stop = StopReason::NoEligibleSender;
                break;
            };

            match self.sender.send(&sender_id, &entry.recipient, &entry.message).await {
                Ok(()) => {}
                // Timeouts included: the entry stays pending for a later tick.
                Err(e) => {
                    tracing::error!(
                        "❌ Send failed for queue row {} to {} from {sender_id}: {e}",
                        entry.row,
                        entry.recipient
                    );
                    report.failed += 1;
                    continue;
                }
            }

            // Timestamp first: an entry with a sent time is never resent.
            let sent_at = (self.clock)();
            queue_table.write_cell(entry.row, sent_col, &table::format_timestamp(sent_at))?;
            queue_table.write_cell(entry.row, sender_col, &sender_id)?;
            pool.record_send(&sender_id);
            report.sent += 1;
            tracing::info!(
                "📤 Sent \"{}\" to {} from {sender_id} (queue row {})",
                entry.message,
                entry.recipient,
                entry.row
            );

            if let Err(e) = self.stamp_lead(entry, sent_at) {
                tracing::warn!(
                    "⚠️ Sent queue row {} but could not stamp its lead: {e}",
                    entry.row
                );
            }

            let more_to_come = report.sent < budget && index + 1 < pending.len();
            if more_to_come {
                let delay = self
                    .rng
                    .between(self.config.min_send_delay_secs, self.config.max_send_delay_secs);
                if delay > 0 {
                    tracing::debug!("⏳ Waiting {delay}s before the next send");
                    tokio::time::sleep(Duration::from_secs(delay)).await;
                }
            }
        }

        tracing::info!(
            "✅ Tick done: {} sent, {} failed ({:?})",
            report.sent,
            report.failed,
            report.stop
        );
        Ok(report)
    }

    /// Write the per-slot sent time back to the originating lead.
    fn stamp_lead(&self, entry: &QueueEntry, sent_at: NaiveDateTime) -> Result<()> {
        let (Some(lead_row), Some(slot)) = (entry.lead_row, entry.slot) else {
            tracing::debug!("Queue row {} has no lead reference", entry.row);
            return Ok(());
        };
        if lead_row < table::FIRST_DATA_ROW || !(1..=SLOTS).contains(&slot) {
            return Err(LeadflowError::InvalidRow {
                row: entry.row,
                reason: format!("bad lead reference row {lead_row} slot {slot}"),
            });
        }
        let mut leads_table = self.store.open(table::LEADS)?;
        leads_table.write_named(lead_row, &leads::sent(slot), &table::format_timestamp(sent_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::NaiveDate;
    use leadflow_core::table::Row;
    use leadflow_core::traits::FixedRandom;
    use leadflow_store::MemoryStore;

    /// Records every send; recipients in `fail` get a permanent error,
    /// recipients in `time_out` a timeout.
    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, String, String)>>,
        fail: HashSet<String>,
        time_out: HashSet<String>,
    }

    impl RecordingSender {
        fn sent(&self) -> Vec<(String, String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SmsSender for RecordingSender {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, sender: &str, recipient: &str, body: &str) -> Result<()> {
            if self.time_out.contains(recipient) {
                return Err(LeadflowError::Timeout(format!("send to {recipient}")));
            }
            if self.fail.contains(recipient) {
                return Err(LeadflowError::Send(format!("rejected {recipient}")));
            }
            self.sent
                .lock()
                .unwrap()
                .push((sender.into(), recipient.into(), body.into()));
            Ok(())
        }
    }

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn config(senders: &[&str], per_hour: u32) -> DispatchConfig {
        DispatchConfig {
            senders: senders.iter().map(|s| s.to_string()).collect(),
            max_per_sender_per_hour: per_hour,
            send_probability: 100,
            min_send_delay_secs: 0,
            max_send_delay_secs: 0,
            ..Default::default()
        }
    }

    fn entry(message: &str, recipient: &str, queued: NaiveDateTime, priority: i64) -> QueueEntry {
        QueueEntry {
            message: message.into(),
            recipient: recipient.into(),
            queued_at: Some(queued),
            priority,
            ..Default::default()
        }
    }

    fn store(entries: &[QueueEntry]) -> MemoryStore {
        let store = MemoryStore::new();
        let headers = queue::headers();
        let rows = entries
            .iter()
            .enumerate()
            .map(|(i, e)| e.to_row(i + 2).to_values(&headers))
            .collect();
        store.put_table(table::MESSAGE_QUEUE, &headers, rows);
        store.put_table(table::LEADS, &leads::headers(), vec![]);
        store
    }

    fn queue_rows(store: &MemoryStore) -> Vec<Row> {
        store.open(table::MESSAGE_QUEUE).unwrap().read_all_rows().unwrap()
    }

    fn scheduler(
        store: &MemoryStore,
        sender: &Arc<RecordingSender>,
        config: DispatchConfig,
        now: NaiveDateTime,
    ) -> DispatchScheduler {
        let store: Arc<dyn RecordStore> = Arc::new(store.clone());
        let sender: Arc<dyn SmsSender> = sender.clone();
        DispatchScheduler::new(store, sender, config)
            .with_random(FixedRandom::default())
            .with_clock(move || now)
    }

    #[test]
    fn test_order_priority_then_age() {
        let t0 = at(9, 0);
        let t1 = at(9, 1);
        let t2 = at(9, 2);
        let a = QueueEntry { row: 2, ..entry("a", "1", t0, 3) };
        let b = QueueEntry { row: 3, ..entry("b", "2", t1, 1) };
        let c = QueueEntry { row: 4, ..entry("c", "3", t2, 3) };
        let mut pending = vec![&a, &b, &c];
        order_pending(&mut pending);
        let order: Vec<&str> = pending.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(order, vec!["a", "c", "b"]);
    }

    #[tokio::test]
    async fn test_sends_in_priority_order_and_persists() {
        let now = at(10, 55);
        let store = store(&[
            entry("low", "5550000001", at(9, 0), 1),
            entry("high", "5550000002", at(9, 30), 3),
        ]);
        let sender = Arc::new(RecordingSender::default());
        let mut scheduler = scheduler(&store, &sender, config(&["A", "B"], 4), now);

        let report = scheduler.tick().await.unwrap();
        assert_eq!(report.sent, 2);
        assert_eq!(report.stop, StopReason::QueueEmpty);

        let sent = sender.sent();
        assert_eq!(sent[0].2, "high");
        assert_eq!(sent[1].2, "low");
        // Rotation alternates between the two senders.
        assert_ne!(sent[0].0, sent[1].0);

        for row in queue_rows(&store) {
            assert_eq!(row.get(queue::DATE_TIME_SENT), "07/01/2024 10:55:00");
            assert!(!row.get(queue::SENDER_NUMBER).is_empty());
        }
    }

    #[tokio::test]
    async fn test_rotation_avoids_last_sender() {
        let now = at(10, 55);
        let mut previous = entry("old", "5559999999", at(8, 0), 0);
        previous.sent_at = Some(at(9, 10));
        previous.sender = "A".into();
        let store = store(&[previous, entry("new", "5550000001", at(9, 0), 0)]);
        let sender = Arc::new(RecordingSender::default());
        let mut scheduler = scheduler(&store, &sender, config(&["A", "B"], 1), now);

        let report = scheduler.tick().await.unwrap();
        assert_eq!(report.budget, 1);
        assert_eq!(sender.sent()[0].0, "B");
    }

    #[tokio::test]
    async fn test_zero_capacity_sends_nothing() {
        let now = at(10, 55);
        let mut a = entry("x", "1", at(9, 0), 0);
        a.sent_at = Some(at(10, 1));
        a.sender = "A".into();
        let store = store(&[a, entry("y", "2", at(9, 0), 0)]);
        let sender = Arc::new(RecordingSender::default());
        let mut scheduler = scheduler(&store, &sender, config(&["A"], 1), now);

        let report = scheduler.tick().await.unwrap();
        assert_eq!(report.budget, 0);
        assert_eq!(report.stop, StopReason::BudgetExhausted);
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_failed_send_is_left_pending() {
        let now = at(10, 55);
        let store = store(&[
            entry("bad", "5550000001", at(9, 0), 5),
            entry("good", "5550000002", at(9, 1), 0),
        ]);
        let sender = Arc::new(RecordingSender {
            fail: HashSet::from(["5550000001".to_string()]),
            ..Default::default()
        });
        let mut scheduler = scheduler(&store, &sender, config(&["A", "B"], 4), now);

        let report = scheduler.tick().await.unwrap();
        assert_eq!((report.sent, report.failed), (1, 1));
        let rows = queue_rows(&store);
        assert_eq!(rows[0].get(queue::DATE_TIME_SENT), "");
        assert!(!rows[1].get(queue::DATE_TIME_SENT).is_empty());
    }

    #[tokio::test]
    async fn test_timeout_fails_only_that_message() {
        let now = at(10, 55);
        let store = store(&[
            entry("slow", "5550000001", at(9, 0), 5),
            entry("next", "5550000002", at(9, 1), 0),
        ]);
        let sender = Arc::new(RecordingSender {
            time_out: HashSet::from(["5550000001".to_string()]),
            ..Default::default()
        });
        let mut scheduler = scheduler(&store, &sender, config(&["A", "B"], 4), now);

        let report = scheduler.tick().await.unwrap();
        assert_eq!((report.sent, report.failed), (1, 1));
        assert_eq!(report.stop, StopReason::QueueEmpty);
        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].2, "next");

        let rows = queue_rows(&store);
        assert_eq!(rows[0].get(queue::DATE_TIME_SENT), "");
        assert_eq!(rows[1].get(queue::DATE_TIME_SENT), "07/01/2024 10:55:00");
    }

    #[tokio::test]
    async fn test_budget_caps_sends() {
        let now = at(10, 55);
        let store = store(&[
            entry("1", "5550000001", at(9, 0), 0),
            entry("2", "5550000002", at(9, 1), 0),
            entry("3", "5550000003", at(9, 2), 0),
        ]);
        let sender = Arc::new(RecordingSender::default());
        let mut scheduler = scheduler(&store, &sender, config(&["A"], 2), now);

        let report = scheduler.tick().await.unwrap();
        assert_eq!(report.budget, 2);
        assert_eq!(report.sent, 2);
        assert_eq!(report.stop, StopReason::BudgetExhausted);
        // The sole sender is reused.
        assert!(sender.sent().iter().all(|(from, _, _)| from == "A"));
    }

    #[tokio::test]
    async fn test_daily_cap_stops_mid_tick() {
        let now = at(10, 55);
        let store = store(&[
            entry("1", "5550000001", at(9, 0), 0),
            entry("2", "5550000002", at(9, 1), 0),
        ]);
        let sender = Arc::new(RecordingSender::default());
        let mut cfg = config(&["A"], 4);
        cfg.max_per_sender_per_day = Some(1);
        let mut scheduler = scheduler(&store, &sender, cfg, now);

        let report = scheduler.tick().await.unwrap();
        assert_eq!(report.budget, 2);
        assert_eq!(report.sent, 1);
        assert_eq!(report.stop, StopReason::NoEligibleSender);
    }

    #[tokio::test]
    async fn test_stamps_originating_lead_slot() {
        let now = at(10, 55);
        let mut queued = entry("hi", "5550000001", at(9, 0), 0);
        queued.lead_row = Some(2);
        queued.slot = Some(2);
        let store = store(&[queued]);
        let headers = leads::headers();
        let mut lead = Row::from_values(2, &headers, &[]);
        lead.set(leads::TARGET_STREET, "1 Elm St");
        store.put_table(table::LEADS, &headers, vec![lead.to_values(&headers)]);

        let sender = Arc::new(RecordingSender::default());
        scheduler(&store, &sender, config(&["A"], 4), now)
            .tick()
            .await
            .unwrap();

        let leads_rows = store.open(table::LEADS).unwrap().read_all_rows().unwrap();
        assert_eq!(leads_rows[0].get(&leads::sent(2)), "07/01/2024 10:55:00");
        assert_eq!(leads_rows[0].get(&leads::sent(1)), "");
    }

    #[tokio::test]
    async fn test_bad_lead_reference_does_not_abort() {
        let now = at(10, 55);
        let mut first = entry("a", "5550000001", at(9, 0), 1);
        first.lead_row = Some(2);
        first.slot = Some(7);
        let store = store(&[first, entry("b", "5550000002", at(9, 1), 0)]);
        let sender = Arc::new(RecordingSender::default());
        let report = scheduler(&store, &sender, config(&["A", "B"], 4), now)
            .tick()
            .await
            .unwrap();
        assert_eq!(report.sent, 2);
    }

    #[tokio::test]
    async fn test_malformed_row_is_skipped() {
        let now = at(10, 55);
        let store = store(&[entry("ok", "5550000001", at(9, 0), 0)]);
        let mut queue_table = store.open(table::MESSAGE_QUEUE).unwrap();
        queue_table.write_named(3, queue::MESSAGE, "broken").unwrap();
        queue_table.write_named(3, queue::RECIPIENT, "5550000002").unwrap();
        queue_table.write_named(3, queue::DATE_TIME_SENT, "last tuesday").unwrap();

        let sender = Arc::new(RecordingSender::default());
        let report = scheduler(&store, &sender, config(&["A"], 4), now)
            .tick()
            .await
            .unwrap();
        assert_eq!(report.skipped_rows, 1);
        assert_eq!(report.sent, 1);
        assert_eq!(queue_rows(&store)[1].get(queue::DATE_TIME_SENT), "last tuesday");
    }
}
