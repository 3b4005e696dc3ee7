//! # Leadflow Core
//!
//! Shared foundation for the lead outreach pipeline: typed records, the
//! record store contract, collaborator traits, configuration and errors.
//!
//! ## Architecture
//! ```text
//! LeadSource ──► ingest ──► Leads ◄── enrich ◄── SkipTracer
//!                             │
//!                             ▼
//!            Templates ──► queue ──► Message Queue
//!                                        │
//!                                        ▼
//!                       dispatch ──► SmsSender (rotating senders)
//! ```

pub mod config;
pub mod error;
pub mod table;
pub mod traits;
pub mod types;

pub use config::LeadflowConfig;
pub use error::{LeadflowError, Result};
pub use table::Row;
pub use types::{Address, Lead, NewLead, QueueEntry, SkipTraceFlag};
