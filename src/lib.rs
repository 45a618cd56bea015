//! netsnap: tag-driven snapshots of network device state.
//!
//! Resolves a YAML list of host, command and credential blocks into a
//! per-device plan, runs it over eAPI or ssh, and writes a text report.

pub mod cli;
pub mod core;
pub mod logging;
pub mod report;
pub mod transport;
