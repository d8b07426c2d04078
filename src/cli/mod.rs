//! CLI module for callpipe - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
