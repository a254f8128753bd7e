pub mod context;
pub mod query;
pub mod summary;
