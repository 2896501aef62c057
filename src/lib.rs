//! qbench - benchmark-execution harness for query-answering engines
//!
//! This library provides the execution and measurement core of the harness:
//! - per-run metrics collection: streaming result consumption, interval
//!   timing, order-independent content fingerprinting, and request
//!   instrumentation;
//! - the matrix driver that sequences (configuration × query × repetition)
//!   runs, applies the abort-on-error policy per cell, and persists one
//!   result file per (configuration, query) pair.
//!
//! The query engine itself is an external collaborator behind the
//! [`engine::Engine`] trait; [`replay`] ships a deterministic fixture-backed
//! implementation used by the binary and the end-to-end tests.

#![forbid(unsafe_code)]
#![allow(
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions
)]

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod fetch;
pub mod fingerprint;
pub mod matrix;
pub mod replay;
pub mod storage;

pub use error::{Error, Result};
