//! Queue builder — turns leads with phone numbers into Message Queue entries.
//!
//! Slot 1 is queued as soon as it has a phone number. Slot N>1 waits until
//! slot N-1 has actually been sent and `delay_between_messages` days have
//! passed since then.

use chrono::{Duration, NaiveDateTime};
use leadflow_core::config::LeadflowConfig;
use leadflow_core::error::{LeadflowError, Result};
use leadflow_core::table::{self, Row, SLOTS, leads, templates};
use leadflow_core::traits::{RandomSource, RecordStore};
use leadflow_core::types::{Lead, QueueEntry};

const STREET_PLACEHOLDER: &str = "{TargetStreet}";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueReport {
    pub leads_scanned: usize,
    pub queued: usize,
    pub skipped_rows: usize,
}

/// Whether `slot` of `lead` should be queued at `now`.
pub fn slot_is_queueable(lead: &Lead, slot: usize, delay_days: u32, now: NaiveDateTime) -> bool {
    if lead.queued(slot).is_some() || lead.phone(slot).is_empty() {
        return false;
    }
    if slot == 1 {
        return true;
    }
    match lead.sent(slot - 1) {
        Some(previous) => now - previous >= Duration::days(delay_days as i64),
        None => false,
    }
}

/// Fill a template for a lead.
pub fn render_message(template: &str, lead: &Lead) -> String {
    template.replace(STREET_PLACEHOLDER, &lead.target.street)
}

/// Queue every due slot. Appends the new entries to the Message Queue
/// first, then stamps the queued slots on the Leads table.
pub fn build_queue(
    store: &dyn RecordStore,
    config: &LeadflowConfig,
    rng: &mut dyn RandomSource,
    now: NaiveDateTime,
) -> Result<QueueReport> {
    let message_templates = load_templates(store)?;
    let mut queue_table = store.open(table::MESSAGE_QUEUE)?;

    let mut leads_table = store.open(table::LEADS)?;
    let mut rows = leads_table.read_all_rows()?;
    let mut report = QueueReport::default();
    let mut entries: Vec<QueueEntry> = Vec::new();
    let mut changed: Vec<usize> = Vec::new();
    let stamp = table::format_timestamp(now);

    for (index, row) in rows.iter_mut().enumerate() {
        let lead = match Lead::from_row(row) {
            Ok(lead) => lead,
            Err(e) => {
                tracing::warn!("⚠️ Skipping lead row {}: {e}", row.number);
                report.skipped_rows += 1;
                continue;
            }
        };
        report.leads_scanned += 1;
        if lead.target.street.is_empty() {
            continue;
        }

        let due: Vec<usize> = (1..=SLOTS)
            .filter(|&slot| slot_is_queueable(&lead, slot, config.queue.delay_between_messages, now))
            .collect();
        if due.is_empty() {
            continue;
        }
        let priority = config.type_priority(&lead.kind).unwrap_or_else(|| {
            tracing::warn!(
                "⚠️ Lead row {} has unmapped type '{}', using priority 0",
                lead.row,
                lead.kind
            );
            0
        });

        for slot in due {
            let template = &message_templates[rng.pick(message_templates.len())];
            entries.push(QueueEntry {
                message: render_message(template, &lead),
                recipient: lead.phone(slot).to_string(),
                queued_at: Some(now),
                priority,
                lead_row: Some(lead.row),
                slot: Some(slot),
                ..Default::default()
            });
            // Only the queued stamp changes; every other cell is written back as read.
            row.set(&leads::queued(slot), &stamp);
            tracing::debug!("📝 Queued slot {} for lead row {} ({})", slot, lead.row, lead.target);
        }
        changed.push(index);
    }

    if entries.is_empty() {
        tracing::info!("📭 No messages to queue ({} leads scanned)", report.leads_scanned);
        return Ok(report);
    }

    // Queue entries go in before the stamps that hide their slots from the next run.
    let start = queue_table.next_row()?;
    let queue_rows: Vec<Row> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| entry.to_row(start + i))
        .collect();
    queue_table.write_rows(&queue_rows, start)?;

    // One contiguous write covering every stamped lead.
    if let (Some(&first), Some(&last)) = (changed.first(), changed.last()) {
        let span: &[Row] = &rows[first..=last];
        leads_table.write_rows(span, span[0].number)?;
    }

    report.queued = entries.len();
    tracing::info!(
        "📬 Queued {} messages from {} leads",
        report.queued,
        changed.len()
    );
    Ok(report)
}

fn load_templates(store: &dyn RecordStore) -> Result<Vec<String>> {
    let table = store.open(table::MESSAGE_TEMPLATES)?;
    let message_templates: Vec<String> = table
        .read_all_rows()?
        .iter()
        .map(|row| row.get(templates::MESSAGE).trim().to_string())
        .filter(|m| !m.is_empty())
        .collect();
    if message_templates.is_empty() {
        return Err(LeadflowError::Config(format!(
            "'{}' has no templates",
            table::MESSAGE_TEMPLATES
        )));
    }
    Ok(message_templates)
}
