//! Background services: the acquisition worker loop, outcome
//! reconciliation, and the in-process history ring.

mod history;
mod processor;
mod reconcile;

pub use history::{ProcessingHistory, HISTORY_CAPACITY};
pub use processor::{Processor, ProcessorConfig, ProcessorError};
pub use reconcile::{Outcome, Reconciler};
