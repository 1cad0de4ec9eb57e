//! Test doubles for pipscope.
//!
//! - `fixtures`: seeded 5-minute bar walks, full trading weeks, and raw-file
//!   writers that produce the vendor layout the pipeline reads.
//! - [`MockPublisher`]: a scriptable in-memory [`pipscope_core::Publisher`].

pub mod fixtures;
mod publisher;

pub use publisher::{DOWN_SYMBOL, FAIL_SYMBOL, MockPublisher, TRANSIENT_SYMBOL};
