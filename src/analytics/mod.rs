pub mod aggregate;
pub mod models;
pub mod request_meta;

pub use aggregate::aggregate_visits;
pub use models::{CodeStats, CountEntry, VisitRecord};
