//! Wire and value types shared by the store, scheduler and router.
//!
//! The router's JSON request/response shapes live in [`params`]; the
//! status state machine in [`task`].

pub mod params;
pub mod result;
pub mod task;

pub use params::*;
pub use result::*;
pub use task::*;
