//! Fitload Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Schema-aware transformation engine for decoded FIT activity frames.
//!
//! # Overview
//!
//! For every decoded message the engine produces two complementary output
//! shapes:
//!
//! - **full**: a lossless, order-preserving tree mirroring the source
//!   schema, for diagnostics and archival
//! - **flat**: a single-level mapping whose keys and values are safe and
//!   convenient for a document store
//!
//! Binary FIT decoding is an external collaborator behind the
//! [`decode::FrameSource`] trait; persistence sits behind the
//! [`sink::RecordSink`] trait. The [`pool`] module fans per-file
//! processing out across a bounded worker pool, with every worker owning
//! its own sink connection.

pub mod config;
pub mod decode;
pub mod identity;
pub mod message;
pub mod normalize;
pub mod pool;
pub mod processor;
pub mod schema;
pub mod sink;
pub mod transform;

// Re-export commonly used types
pub use config::{OutputMode, Settings};
pub use message::{Message, MessageKind, Record};
pub use transform::{project, Projection};
