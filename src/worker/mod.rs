mod scheduler;
mod store;

pub use scheduler::Worker;
pub use store::{MemoryScheduleStore, ScheduleStore, SqliteScheduleStore};
