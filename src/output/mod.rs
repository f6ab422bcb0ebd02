pub mod config;
pub mod presenter;
pub mod records;
pub mod types;
