//! Command-line front end for iosdbg.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod session;
pub mod styles;
