//! HTTP server setup.
//!
//! This file contains the public re-exports for the split `server` submodules
//! (`router`, `middleware`, `tls`).

pub mod middleware;
pub mod router;
pub mod tls;
