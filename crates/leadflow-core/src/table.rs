//! Table names, canonical columns and the `Row` record shape.
//!
//! Tables are header-addressed: row 1 holds column names, data starts at row 2,
//! columns are 1-based. Every cell is text; an empty string means "unset".

use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::error::{LeadflowError, Result};

pub const LEADS: &str = "Leads Master";
pub const MESSAGE_QUEUE: &str = "Message Queue";
pub const MESSAGE_TEMPLATES: &str = "Message Templates";

/// Row number of the first data row (row 1 is the header).
pub const FIRST_DATA_ROW: usize = 2;

/// Local wall-clock timestamp format used in every timestamp cell.
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// Number of phone/message slots per lead.
pub const SLOTS: usize = 3;

pub mod leads {
    pub const TARGET_STREET: &str = "TargetStreet";
    pub const TARGET_CITY: &str = "TargetCity";
    pub const TARGET_STATE: &str = "TargetState";
    pub const TARGET_ZIP: &str = "TargetZip";
    pub const CONTACT_FIRST_NAME: &str = "ContactFirstName";
    pub const CONTACT_LAST_NAME: &str = "ContactLastName";
    pub const CONTACT_STREET: &str = "ContactStreet";
    pub const CONTACT_CITY: &str = "ContactCity";
    pub const CONTACT_STATE: &str = "ContactState";
    pub const CONTACT_ZIP: &str = "ContactZip";
    pub const SKIP_TRACE_SUCCESS: &str = "SkipTraceSuccess";
    pub const TYPE: &str = "Type";
    pub const SOURCE: &str = "Source";
    pub const DATE_TIME_ADDED: &str = "DateTimeAdded";

    pub fn phone(slot: usize) -> String {
        format!("ContactPhone{slot}")
    }

    pub fn queued(slot: usize) -> String {
        format!("SMS{slot}QueuedDateTime")
    }

    pub fn sent(slot: usize) -> String {
        format!("SMS{slot}SentDateTime")
    }

    /// Canonical header row for a fresh Leads table.
    pub fn headers() -> Vec<String> {
        let mut headers: Vec<String> = [
            TARGET_STREET,
            TARGET_CITY,
            TARGET_STATE,
            TARGET_ZIP,
            CONTACT_FIRST_NAME,
            CONTACT_LAST_NAME,
            CONTACT_STREET,
            CONTACT_CITY,
            CONTACT_STATE,
            CONTACT_ZIP,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        headers.extend((1..=super::SLOTS).map(phone));
        headers.extend(
            [SKIP_TRACE_SUCCESS, TYPE, SOURCE, DATE_TIME_ADDED]
                .iter()
                .map(|s| s.to_string()),
        );
        headers.extend((1..=super::SLOTS).map(queued));
        headers.extend((1..=super::SLOTS).map(sent));
        headers
    }
}

pub mod queue {
    pub const MESSAGE: &str = "Message";
    pub const RECIPIENT: &str = "Recipient";
    pub const DATE_TIME_QUEUED: &str = "DateTimeQueued";
    pub const DATE_TIME_SENT: &str = "DateTimeSent";
    pub const SENDER_NUMBER: &str = "SenderNumber";
    pub const PRIORITY: &str = "Priority";
    pub const LEAD_ROW: &str = "LeadRow";
    pub const SLOT: &str = "Slot";

    pub fn headers() -> Vec<String> {
        [
            MESSAGE,
            RECIPIENT,
            DATE_TIME_QUEUED,
            DATE_TIME_SENT,
            SENDER_NUMBER,
            PRIORITY,
            LEAD_ROW,
            SLOT,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

pub mod templates {
    pub const MESSAGE: &str = "Message";

    pub fn headers() -> Vec<String> {
        vec![MESSAGE.to_string()]
    }
}

pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a timestamp cell. Empty cells are `None`; garbage is an error.
pub fn parse_timestamp(value: &str) -> Result<Option<NaiveDateTime>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map(Some)
        .map_err(|_| LeadflowError::InvalidTimestamp(value.to_string()))
}

/// One data row of a table, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    /// 1-based row number in the table (header is row 1).
    pub number: usize,
    cells: HashMap<String, String>,
}

impl Row {
    pub fn new(number: usize) -> Self {
        Self {
            number,
            cells: HashMap::new(),
        }
    }

    /// Build a row from positional values. Short rows are padded with empty cells.
    pub fn from_values(number: usize, headers: &[String], values: &[String]) -> Self {
        let cells = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), values.get(i).cloned().unwrap_or_default()))
            .collect();
        Self { number, cells }
    }

    /// Cell value, or "" when the column is absent.
    pub fn get(&self, column: &str) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }

    /// Cell value, failing when the table has no such column.
    pub fn require(&self, table: &str, column: &str) -> Result<&str> {
        self.cells
            .get(column)
            .map(String::as_str)
            .ok_or_else(|| LeadflowError::missing_column(table, column))
    }

    pub fn has(&self, column: &str) -> bool {
        self.cells.contains_key(column)
    }

    pub fn set(&mut self, column: &str, value: impl Into<String>) {
        self.cells.insert(column.to_string(), value.into());
    }

    /// Positional values in header order, ready for a bulk write.
    pub fn to_values(&self, headers: &[String]) -> Vec<String> {
        headers.iter().map(|h| self.get(h).to_string()).collect()
    }
}
