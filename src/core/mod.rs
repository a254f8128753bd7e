pub mod assembler;
pub mod builder;
pub mod catalog;
pub mod ddl;
pub mod dialect;
pub mod error;
pub mod matcher;
pub mod merger;
pub mod rewriter;
pub mod router;
