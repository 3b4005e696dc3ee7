//! # Leadflow Scheduler
//!
//! The four pipeline stages, leaves first:
//! - `ingest` appends new leads, deduplicated by normalized address
//! - `enrich` skip-traces leads without phone numbers
//! - `queue` turns due phone slots into Message Queue entries
//! - `dispatch` sends a rate-limited, rotated batch each tick
//!
//! Every stage reads its state from the record store on entry and writes
//! results back before returning. No stage keeps state between runs.

pub mod budget;
pub mod dispatch;
pub mod enrich;
pub mod ingest;
pub mod queue;
pub mod rotation;

pub use budget::{BudgetInput, TICK_SEND_CEILING, calculate_msgs_to_send};
pub use dispatch::{DispatchScheduler, StopReason, TickReport};
pub use enrich::{EnrichReport, enrich};
pub use ingest::{IngestReport, ingest};
pub use queue::{QueueReport, build_queue};
pub use rotation::{SenderChannel, SenderPool};
