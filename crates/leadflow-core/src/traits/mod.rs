//! Collaborator traits — the seams between the pipeline and the outside world.

pub mod random;
pub mod sms;
pub mod skip_trace;
pub mod source;
pub mod store;

pub use random::{FixedRandom, RandomSource, ThreadRandom};
pub use sms::SmsSender;
pub use skip_trace::{SkipTraceRequest, SkipTracer};
pub use source::LeadSource;
pub use store::{RecordStore, RecordTable};
