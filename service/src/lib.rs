//! Process-level concerns of the front door: command line and environment
//! configuration, and terminal logging.

pub mod config;
pub mod logging;
