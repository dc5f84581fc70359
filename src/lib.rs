//! Core library for the `loadfleet` CLI.
//!
//! This crate provides the building blocks of an autoscaling-demo load
//! fleet: a resizable worker pool, the loader instance loop, the
//! store-coordinated concurrency ramp, and the live fleet aggregator. The
//! primary user-facing interface is the `loadfleet` command-line
//! application; library APIs may evolve as the CLI grows.
pub mod aggregator;
pub mod args;
pub mod config;
pub mod controller;
pub mod entry;
pub mod error;
pub mod http;
pub mod instance;
pub mod logger;
pub mod pool;
pub mod shutdown;
pub mod stats;
pub mod store;
