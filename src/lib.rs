//! Clipshrink - asynchronous video compression service
//!
//! This library crate exposes the job core, configuration and HTTP surface
//! so they can be driven from the binary and from integration tests.

pub mod batch;
pub mod config;
pub mod jobs;
pub mod server;
