//! Skip-trace collaborator — resolves a mailing address to phone numbers.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::types::Lead;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SkipTraceRequest {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl SkipTraceRequest {
    /// Request for a lead's contact address. The name is only sent when both parts are known.
    pub fn for_lead(lead: &Lead) -> Self {
        let has_name = !lead.first_name.is_empty() && !lead.last_name.is_empty();
        Self {
            street: lead.contact.street.clone(),
            city: lead.contact.city.clone(),
            state: lead.contact.state.clone(),
            zip: lead.contact.zip.clone(),
            first_name: has_name.then(|| lead.first_name.clone()),
            last_name: has_name.then(|| lead.last_name.clone()),
        }
    }
}

#[async_trait]
pub trait SkipTracer: Send + Sync {
    fn name(&self) -> &str;

    /// Mobile numbers of living persons at the address, best match first.
    /// Quota exhaustion must surface as `LeadflowError::RateLimited`.
    async fn skip_trace(&self, request: &SkipTraceRequest) -> Result<Vec<String>>;
}
