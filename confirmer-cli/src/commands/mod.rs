//! CLI command implementations.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (show, path, init)
//! - [`demo`] - Demonstration scenarios against a live coordinator

pub mod config;
pub mod demo;
