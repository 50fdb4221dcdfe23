//! Fitload Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging for the fitload workspace.
//!
//! # Overview
//!
//! This crate provides the functionality every fitload workspace member
//! relies on:
//!
//! - **Error Handling**: the [`FitError`] taxonomy and [`Result`] alias
//! - **Logging**: tracing-based logging with console/file output and
//!   daily rotation
//!
//! # Example
//!
//! ```no_run
//! use fitload_common::logging::{init_logging, LogConfig};
//! use fitload_common::Result;
//!
//! fn start() -> Result<()> {
//!     let config = LogConfig::default();
//!     init_logging(&config)?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{FitError, Result};
