//! Colocation agent: per-node HTTP API and runtime hook wiring

pub mod api;
pub mod config;
