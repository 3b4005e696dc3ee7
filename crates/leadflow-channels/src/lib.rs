//! # Leadflow Channels
//! Concrete implementations of the pipeline's external collaborators.

pub mod batchdata;
pub mod json_source;
pub mod sms_gateway;

pub use batchdata::BatchDataClient;
pub use json_source::JsonFileSource;
pub use sms_gateway::HttpSmsGateway;

use leadflow_core::error::LeadflowError;

/// Map a transport error, keeping timeouts distinguishable so callers can retry.
pub(crate) fn transport_error(
    what: &str,
    e: reqwest::Error,
    wrap: fn(String) -> LeadflowError,
) -> LeadflowError {
    if e.is_timeout() {
        LeadflowError::Timeout(format!("{what}: {e}"))
    } else {
        wrap(format!("{what} failed: {e}"))
    }
}
