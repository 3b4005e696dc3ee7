//! Lead records — one row of the Leads table.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::Address;
use crate::error::{LeadflowError, Result};
use crate::table::{self, Row, SLOTS, leads};

/// Outcome of skip-tracing a lead. Stored as `TRUE` / `FALSE` / empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SkipTraceFlag {
    #[default]
    Unset,
    Success,
    Failed,
}

impl SkipTraceFlag {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "TRUE" => Self::Success,
            "FALSE" => Self::Failed,
            _ => Self::Unset,
        }
    }

    pub fn as_cell(&self) -> &'static str {
        match self {
            Self::Unset => "",
            Self::Success => "TRUE",
            Self::Failed => "FALSE",
        }
    }
}

/// A newly observed lead, as produced by a scrape or import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLead {
    pub target: Address,
    /// Mailing address of the contact. Defaults to the target address.
    #[serde(default)]
    pub contact: Option<Address>,
    /// Classification code, resolved to a label/priority through config.
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub case_number: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Typed view of a Leads row. Slot arrays are indexed 0..SLOTS; the
/// accessors take 1-based slot numbers to match the column names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lead {
    pub row: usize,
    pub target: Address,
    pub contact: Address,
    pub first_name: String,
    pub last_name: String,
    pub phones: [String; SLOTS],
    pub skip_trace: SkipTraceFlag,
    pub kind: String,
    pub source: String,
    pub added_at: Option<NaiveDateTime>,
    pub queued_at: [Option<NaiveDateTime>; SLOTS],
    pub sent_at: [Option<NaiveDateTime>; SLOTS],
}

impl Lead {
    /// Read a lead from a Leads row. Missing columns and malformed
    /// timestamps are reported against the row number.
    pub fn from_row(row: &Row) -> Result<Self> {
        let get = |column: &str| -> Result<String> {
            row.require(table::LEADS, column).map(str::to_string)
        };
        let stamp = |column: &str| -> Result<Option<NaiveDateTime>> {
            let value = row.require(table::LEADS, column)?;
            table::parse_timestamp(value).map_err(|e| LeadflowError::InvalidRow {
                row: row.number,
                reason: format!("{column}: {e}"),
            })
        };

        let mut lead = Lead {
            row: row.number,
            target: Address::new(
                &get(leads::TARGET_STREET)?,
                &get(leads::TARGET_CITY)?,
                &get(leads::TARGET_STATE)?,
                &get(leads::TARGET_ZIP)?,
            ),
            contact: Address::new(
                &get(leads::CONTACT_STREET)?,
                &get(leads::CONTACT_CITY)?,
                &get(leads::CONTACT_STATE)?,
                &get(leads::CONTACT_ZIP)?,
            ),
            // Name columns are optional in older sheets.
            first_name: row.get(leads::CONTACT_FIRST_NAME).trim().to_string(),
            last_name: row.get(leads::CONTACT_LAST_NAME).trim().to_string(),
            skip_trace: SkipTraceFlag::parse(&get(leads::SKIP_TRACE_SUCCESS)?),
            kind: row.get(leads::TYPE).trim().to_string(),
            source: row.get(leads::SOURCE).to_string(),
            added_at: table::parse_timestamp(row.get(leads::DATE_TIME_ADDED)).unwrap_or(None),
            ..Default::default()
        };

        for slot in 1..=SLOTS {
            lead.phones[slot - 1] = get(&leads::phone(slot))?.trim().to_string();
            lead.queued_at[slot - 1] = stamp(&leads::queued(slot))?;
            lead.sent_at[slot - 1] = stamp(&leads::sent(slot))?;
        }
        Ok(lead)
    }

    /// Build the row for a freshly ingested lead.
    pub fn to_row(&self, number: usize) -> Row {
        let mut row = Row::new(number);
        self.write_to(&mut row);
        row
    }

    /// Copy every typed field into `row`, leaving unknown columns untouched.
    pub fn write_to(&self, row: &mut Row) {
        row.set(leads::TARGET_STREET, &self.target.street);
        row.set(leads::TARGET_CITY, &self.target.city);
        row.set(leads::TARGET_STATE, &self.target.state);
        row.set(leads::TARGET_ZIP, &self.target.zip);
        row.set(leads::CONTACT_STREET, &self.contact.street);
        row.set(leads::CONTACT_CITY, &self.contact.city);
        row.set(leads::CONTACT_STATE, &self.contact.state);
        row.set(leads::CONTACT_ZIP, &self.contact.zip);
        row.set(leads::CONTACT_FIRST_NAME, &self.first_name);
        row.set(leads::CONTACT_LAST_NAME, &self.last_name);
        row.set(leads::SKIP_TRACE_SUCCESS, self.skip_trace.as_cell());
        row.set(leads::TYPE, &self.kind);
        row.set(leads::SOURCE, &self.source);
        row.set(leads::DATE_TIME_ADDED, stamp_cell(self.added_at));
        for slot in 1..=SLOTS {
            row.set(&leads::phone(slot), &self.phones[slot - 1]);
            row.set(&leads::queued(slot), stamp_cell(self.queued_at[slot - 1]));
            row.set(&leads::sent(slot), stamp_cell(self.sent_at[slot - 1]));
        }
    }

    pub fn key(&self) -> String {
        self.target.normalized_key()
    }

    pub fn phone(&self, slot: usize) -> &str {
        &self.phones[slot - 1]
    }

    pub fn queued(&self, slot: usize) -> Option<NaiveDateTime> {
        self.queued_at[slot - 1]
    }

    pub fn sent(&self, slot: usize) -> Option<NaiveDateTime> {
        self.sent_at[slot - 1]
    }

    pub fn has_any_phone(&self) -> bool {
        self.phones.iter().any(|p| !p.is_empty())
    }

    /// Ready for skip-tracing: never traced, no phones, full contact address.
    pub fn needs_skip_trace(&self) -> bool {
        self.skip_trace == SkipTraceFlag::Unset && !self.has_any_phone() && self.contact.is_complete()
    }
}

fn stamp_cell(ts: Option<NaiveDateTime>) -> String {
    ts.map(table::format_timestamp).unwrap_or_default()
}
