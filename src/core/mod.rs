//! Core logic: types, merging, matching, parsing, planning, execution.

pub mod error;
pub mod executor;
pub mod matcher;
pub mod merge;
pub mod parser;
pub mod planner;
pub mod types;
