//! Lead ingestion — appends newly observed leads, skipping known addresses.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use leadflow_core::config::LeadflowConfig;
use leadflow_core::error::Result;
use leadflow_core::table::{self, Row, leads};
use leadflow_core::traits::{LeadSource, RecordStore};
use leadflow_core::types::{Address, Lead, NewLead};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub fetched: usize,
    pub appended: usize,
    pub duplicates: usize,
    /// Dropped by case prefix or for having no street.
    pub ignored: usize,
}

/// Fetch a batch from `source` and append the leads not already present.
///
/// A source failure is returned before anything is written.
pub async fn ingest(
    store: &dyn RecordStore,
    source: &dyn LeadSource,
    config: &LeadflowConfig,
    now: NaiveDateTime,
) -> Result<IngestReport> {
    let batch = source.fetch().await.inspect_err(|e| {
        tracing::error!("❌ Lead source '{}' failed, nothing ingested: {e}", source.name());
    })?;
    tracing::info!("📥 Fetched {} leads from '{}'", batch.len(), source.name());
    append_new_leads(store, batch, config, now)
}

/// Append every lead whose normalized address is not yet in the Leads table.
/// One bulk write; none when nothing is new.
pub fn append_new_leads(
    store: &dyn RecordStore,
    batch: Vec<NewLead>,
    config: &LeadflowConfig,
    now: NaiveDateTime,
) -> Result<IngestReport> {
    let mut report = IngestReport {
        fetched: batch.len(),
        ..Default::default()
    };

    let mut leads_table = store.open(table::LEADS)?;
    let existing = leads_table.read_all_rows()?;
    let mut known: HashSet<String> = existing.iter().filter_map(existing_key).collect();

    let start = existing.len() + table::FIRST_DATA_ROW;
    let mut rows: Vec<Row> = Vec::new();

    for new_lead in batch {
        if is_ignored_case(&new_lead, &config.ingest.ignored_case_prefixes) {
            tracing::debug!("Ignoring case {:?} at {}", new_lead.case_number, new_lead.target);
            report.ignored += 1;
            continue;
        }
        if new_lead.target.street.is_empty() {
            tracing::warn!("⚠️ Lead without a street from source, skipped: {:?}", new_lead.target);
            report.ignored += 1;
            continue;
        }
        if !known.insert(new_lead.target.normalized_key()) {
            report.duplicates += 1;
            continue;
        }

        let lead = to_lead(new_lead, config, now);
        rows.push(lead.to_row(start + rows.len()));
    }

    leads_table.write_rows(&rows, start)?;
    report.appended = rows.len();
    tracing::info!(
        "🆕 Appended {} leads ({} duplicates, {} ignored)",
        report.appended,
        report.duplicates,
        report.ignored
    );
    Ok(report)
}

fn existing_key(row: &Row) -> Option<String> {
    let address = Address::new(
        row.get(leads::TARGET_STREET),
        row.get(leads::TARGET_CITY),
        row.get(leads::TARGET_STATE),
        row.get(leads::TARGET_ZIP),
    );
    (!address.street.is_empty()).then(|| address.normalized_key())
}

fn is_ignored_case(lead: &NewLead, prefixes: &[String]) -> bool {
    let Some(case) = lead.case_number.as_deref() else {
        return false;
    };
    let case = case.trim().to_ascii_uppercase();
    prefixes
        .iter()
        .any(|p| !p.is_empty() && case.starts_with(&p.to_ascii_uppercase()))
}

fn to_lead(new_lead: NewLead, config: &LeadflowConfig, now: NaiveDateTime) -> Lead {
    let contact = new_lead
        .contact
        .filter(|c| !c.street.is_empty())
        .unwrap_or_else(|| new_lead.target.clone());
    Lead {
        target: new_lead.target,
        contact,
        first_name: new_lead.first_name.unwrap_or_default().trim().to_string(),
        last_name: new_lead.last_name.unwrap_or_default().trim().to_string(),
        kind: config.type_label(&new_lead.kind),
        source: config.ingest.source_tag.clone(),
        added_at: Some(now),
        ..Default::default()
    }
}
