//! Enrichment gate — skip-traces leads that have no phone numbers yet.
//!
//! Every lead is written back as soon as its trace finishes, so a run cut
//! short by a quota error or a crash resumes where it stopped.

use leadflow_core::config::EnrichmentConfig;
use leadflow_core::error::Result;
use leadflow_core::table::{self, SLOTS, leads};
use leadflow_core::traits::{RecordStore, SkipTraceRequest, SkipTracer};
use leadflow_core::types::{Lead, SkipTraceFlag};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichReport {
    /// Leads eligible for tracing this run, before the batch cap.
    pub candidates: usize,
    pub traced: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// The batch stopped early on a transient collaborator error.
    pub aborted: bool,
    pub skipped_rows: usize,
}

pub async fn enrich(
    store: &dyn RecordStore,
    tracer: &dyn SkipTracer,
    config: &EnrichmentConfig,
) -> Result<EnrichReport> {
    let mut leads_table = store.open(table::LEADS)?;
    let mut report = EnrichReport::default();
    let mut pending: Vec<(Lead, table::Row)> = Vec::new();

    for row in leads_table.read_all_rows()? {
        match Lead::from_row(&row) {
            Ok(lead) if lead.needs_skip_trace() => pending.push((lead, row)),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("⚠️ Skipping lead row {}: {e}", row.number);
                report.skipped_rows += 1;
            }
        }
    }
    report.candidates = pending.len();

    for (lead, mut row) in pending.into_iter().take(config.batch_size) {
        let request = SkipTraceRequest::for_lead(&lead);
        report.traced += 1;

        // Only the phone slots and the flag are written; other cells go back as read.
        let flag = match tracer.skip_trace(&request).await {
            Ok(phones) if !phones.is_empty() => {
                for (slot, phone) in phones.iter().take(SLOTS).enumerate() {
                    row.set(&leads::phone(slot + 1), phone.as_str());
                }
                report.succeeded += 1;
                tracing::info!("📞 Row {}: found phones for {}", lead.row, lead.contact);
                SkipTraceFlag::Success
            }
            Ok(_) => {
                report.failed += 1;
                tracing::info!("🔍 Row {}: no mobile numbers for {}", lead.row, lead.contact);
                SkipTraceFlag::Failed
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(
                    "⏸️ {} unavailable at row {} ({e}), stopping enrichment until next run",
                    tracer.name(),
                    lead.row
                );
                report.traced -= 1;
                report.aborted = true;
                break;
            }
            Err(e) => {
                report.failed += 1;
                tracing::error!("❌ Row {}: skip-trace failed for {}: {e}", lead.row, lead.contact);
                SkipTraceFlag::Failed
            }
        };
        row.set(leads::SKIP_TRACE_SUCCESS, flag.as_cell());
        leads_table.write_rows(std::slice::from_ref(&row), row.number)?;
    }

    tracing::info!(
        "✅ Enrichment: {} traced, {} found, {} failed{}",
        report.traced,
        report.succeeded,
        report.failed,
        if report.aborted { " (stopped early)" } else { "" }
    );
    Ok(report)
}
