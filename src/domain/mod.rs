//! Task identity and the record tracked for every submission.

pub mod record;

pub use record::{TaskId, TaskRecord};
pub(crate) use record::millis;
