//! Teamspace Shared Types and Utilities
//!
//! This crate contains types, configuration, and database utilities shared
//! across the Teamspace core crates.

pub mod config;
pub mod db;
pub mod types;

pub use config::{Config, ConfigError};
pub use db::*;
pub use types::*;
