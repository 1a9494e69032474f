pub mod cancel;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod exec;
pub mod filter;
pub mod pipeline;
pub mod report;
pub mod split;
pub mod util;
pub mod version;
