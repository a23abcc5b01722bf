//! CLI subcommands

pub mod auth;
pub mod backup;
pub mod clear;
pub mod config;
pub mod status;
pub mod sync;
