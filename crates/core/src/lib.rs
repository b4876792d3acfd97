//! Shared types for the ComfyUI serverless worker.
//!
//! Holds the inbound job contract, the per-artifact output records,
//! the job-level error taxonomy and the process-wide configuration.

pub mod config;
pub mod error;
pub mod types;
