//! CLI module for graph.

pub mod args;
pub mod commands;

pub use args::{Cli, Commands, ShellType};
