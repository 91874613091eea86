pub mod asset;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod retry;
pub mod sweep;
