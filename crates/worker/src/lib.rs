//! `comfyrun-worker` library crate.
//!
//! Runs one platform job against a local ComfyUI server: readiness,
//! submission, completion watch and artifact collection. The binary
//! entrypoint lives in `main.rs`.

pub mod collector;
pub mod response;
pub mod runner;
