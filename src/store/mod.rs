//! Session and completed-record storage.

pub mod memory;
pub mod traits;

pub use memory::{InMemoryRecordRepository, InMemorySessionStore};
pub use traits::{RecordRepository, SessionStore};
