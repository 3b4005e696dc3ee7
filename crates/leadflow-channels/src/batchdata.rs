//! BatchData skip-trace client.
//!
//! Resolves a property address (plus owner name when known) to the mobile
//! numbers of living persons on record. Quota errors surface as
//! `RateLimited` so the enrichment batch can stop and resume next run.

use async_trait::async_trait;
use leadflow_core::config::EnrichmentConfig;
use leadflow_core::error::{LeadflowError, Result};
use leadflow_core::table::SLOTS;
use leadflow_core::traits::{SkipTraceRequest, SkipTracer};
use serde_json::Value;

use crate::transport_error;

pub struct BatchDataClient {
    config: EnrichmentConfig,
    client: reqwest::Client,
}

impl BatchDataClient {
    pub fn new(config: EnrichmentConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn request_body(request: &SkipTraceRequest) -> Value {
        let mut entry = serde_json::json!({
            "propertyAddress": {
                "city": request.city,
                "street": request.street,
                "state": request.state,
                "zip": request.zip,
            }
        });
        if let (Some(first), Some(last)) = (&request.first_name, &request.last_name) {
            entry["name"] = serde_json::json!({ "first": first, "last": last });
        }
        serde_json::json!({ "requests": [entry] })
    }
}

/// Mobile numbers of non-deceased persons, at most `SLOTS` in total.
pub fn parse_phone_numbers(response: &Value) -> Vec<String> {
    let persons = response["results"]["persons"]
        .as_array()
        .cloned()
        .unwrap_or_default();

    let mut numbers: Vec<String> = Vec::new();
    for person in &persons {
        if person["death"]["deceased"].as_bool().unwrap_or(false) {
            continue;
        }
        let phones = person["phoneNumbers"].as_array().cloned().unwrap_or_default();
        for phone in phones {
            if phone["type"].as_str() != Some("Mobile") {
                continue;
            }
            if let Some(number) = phone["number"].as_str()
                && !numbers.iter().any(|n| n == number)
            {
                numbers.push(number.to_string());
            }
        }
    }
    numbers.truncate(SLOTS);
    numbers
}

#[async_trait]
impl SkipTracer for BatchDataClient {
    fn name(&self) -> &str {
        "batchdata"
    }

    async fn skip_trace(&self, request: &SkipTraceRequest) -> Result<Vec<String>> {
        let url = format!("{}/property/skip-trace", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&Self::request_body(request))
            .timeout(std::time::Duration::from_secs(self.config.timeout_secs))
            .send()
            .await
            .map_err(|e| transport_error("BatchData request", e, LeadflowError::SkipTrace))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LeadflowError::RateLimited(format!("BatchData quota exhausted ({status})")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LeadflowError::SkipTrace(format!("BatchData API error {status}: {body}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| LeadflowError::SkipTrace(format!("Invalid BatchData response: {e}")))?;
        let numbers = parse_phone_numbers(&body);
        tracing::debug!(
            "🔎 BatchData returned {} mobile numbers for {}",
            numbers.len(),
            request.street
        );
        Ok(numbers)
    }
}
