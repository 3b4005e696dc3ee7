//! Message Queue entries — one outbound message each.

use chrono::NaiveDateTime;

use crate::error::{LeadflowError, Result};
use crate::table::{self, Row, queue};

/// A queued (or already sent) outbound SMS.
///
/// Once `sent_at` is set the entry is never written again.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueEntry {
    pub row: usize,
    pub message: String,
    pub recipient: String,
    pub queued_at: Option<NaiveDateTime>,
    pub sent_at: Option<NaiveDateTime>,
    pub sender: String,
    /// Higher sends first.
    pub priority: i64,
    /// Originating Leads row and 1-based phone slot.
    pub lead_row: Option<usize>,
    pub slot: Option<usize>,
}

impl QueueEntry {
    pub fn from_row(row: &Row) -> Result<Self> {
        let invalid = |reason: String| LeadflowError::InvalidRow {
            row: row.number,
            reason,
        };
        let message = row.require(table::MESSAGE_QUEUE, queue::MESSAGE)?.trim();
        let recipient = row.require(table::MESSAGE_QUEUE, queue::RECIPIENT)?.trim();
        let sent_cell = row.require(table::MESSAGE_QUEUE, queue::DATE_TIME_SENT)?;
        let sender = row.require(table::MESSAGE_QUEUE, queue::SENDER_NUMBER)?.trim();

        let sent_at = table::parse_timestamp(sent_cell)
            .map_err(|e| invalid(format!("{}: {e}", queue::DATE_TIME_SENT)))?;
        let queued_at = table::parse_timestamp(row.get(queue::DATE_TIME_QUEUED))
            .map_err(|e| invalid(format!("{}: {e}", queue::DATE_TIME_QUEUED)))?;

        // Priority and back-references are absent on legacy rows.
        let priority = match row.get(queue::PRIORITY).trim() {
            "" => 0,
            p => p
                .parse()
                .map_err(|_| invalid(format!("bad priority '{p}'")))?,
        };
        let lead_row = parse_index(row.get(queue::LEAD_ROW)).map_err(invalid)?;
        let slot = parse_index(row.get(queue::SLOT)).map_err(invalid)?;

        Ok(Self {
            row: row.number,
            message: message.to_string(),
            recipient: recipient.to_string(),
            queued_at,
            sent_at,
            sender: sender.to_string(),
            priority,
            lead_row,
            slot,
        })
    }

    pub fn to_row(&self, number: usize) -> Row {
        let mut row = Row::new(number);
        row.set(queue::MESSAGE, &self.message);
        row.set(queue::RECIPIENT, &self.recipient);
        row.set(
            queue::DATE_TIME_QUEUED,
            self.queued_at.map(table::format_timestamp).unwrap_or_default(),
        );
        row.set(
            queue::DATE_TIME_SENT,
            self.sent_at.map(table::format_timestamp).unwrap_or_default(),
        );
        row.set(queue::SENDER_NUMBER, &self.sender);
        row.set(queue::PRIORITY, self.priority.to_string());
        row.set(
            queue::LEAD_ROW,
            self.lead_row.map(|r| r.to_string()).unwrap_or_default(),
        );
        row.set(
            queue::SLOT,
            self.slot.map(|s| s.to_string()).unwrap_or_default(),
        );
        row
    }

    /// Unsent, with something to send and someone to send it to.
    pub fn is_pending(&self) -> bool {
        self.sent_at.is_none() && !self.message.is_empty() && !self.recipient.is_empty()
    }
}

fn parse_index(value: &str) -> std::result::Result<Option<usize>, String> {
    match value.trim() {
        "" => Ok(None),
        v => v
            .parse()
            .map(Some)
            .map_err(|_| format!("bad row/slot reference '{v}'")),
    }
}
