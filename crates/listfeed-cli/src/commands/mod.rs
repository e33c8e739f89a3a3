//! Subcommand handlers

pub mod static_list;
pub mod timestamps;
