pub mod config;
pub mod env;
pub mod http;
pub mod progress_bars;
pub mod text;
