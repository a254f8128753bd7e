pub mod route;
pub mod summaries;
