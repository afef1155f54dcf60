pub mod config;
pub mod filter;
pub mod query;
pub mod records;
pub mod sinks;
