//! Subcommand implementations for the ccdn CLI

pub mod listen;
pub mod run;
pub mod send;
pub mod topology;
