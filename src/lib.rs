pub mod build;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod runner;
pub mod util;
pub mod watch;
