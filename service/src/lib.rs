//! Process-level infrastructure shared by every binary: configuration and logging.

pub mod config;
pub mod logging;
