//! Typed records stored in the Leads and Message Queue tables.

mod address;
mod lead;
mod queue_entry;

pub use address::Address;
pub use lead::{Lead, NewLead, SkipTraceFlag};
pub use queue_entry::QueueEntry;
