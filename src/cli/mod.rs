//! Command-line front end shared by the `aclc` binary.

pub mod args;
pub mod config;
