mod repository;
mod schema;

pub use repository::{RecordOutcome, Repository};
