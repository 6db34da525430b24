//! CLI subcommands

pub mod gather;
pub mod plugins;
