//! Configuration management for the broker: loading the TOML config file and
//! expanding `${NAME}` placeholders from the process environment.
//!
//! This module provides a unified interface to all configuration-related functionality,
//! including data types, environment substitution and loading utilities.

mod env;
mod loader;
mod types;

pub use env::*;
pub use loader::*;
pub use types::*;
