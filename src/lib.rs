pub mod cli;
pub mod config;
pub mod engine;
pub mod formats;
pub mod pipeline;
pub mod report;
pub mod scratch;
pub mod server;
pub mod util;
