//! CLI support modules for the `pyvet` binary.

pub mod cli;
pub mod logger;
pub mod output;
