//! Job storage
//!
//! The orchestration logic only sees the [`JobStore`] trait, so a durable
//! backend can replace the in-memory table without touching it.

mod memory;
mod traits;

pub use memory::InMemoryJobStore;
pub use traits::{job_update, JobStore, JobUpdate};
