//! Lead source collaborator — a scrape or import producing new leads.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::NewLead;

#[async_trait]
pub trait LeadSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch the whole batch. Failure means nothing is ingested this run.
    async fn fetch(&self) -> Result<Vec<NewLead>>;
}
