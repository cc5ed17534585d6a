#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Miner lifecycle control for Ember.
//!
//! This crate owns everything between argument parsing and the compute
//! engine:
//! - [`params::ProcessParameters`] - immutable post-parse configuration
//! - [`expert_state`] - the persisted expert/first-run/start-running flags
//! - [`bootstrap`] - the guided first-run configuration wizard
//! - [`control`] - shared pause/restart request state and cancellable waits
//! - [`input`] - the persistent keyboard listener
//! - [`benchmark`] - the synthetic-workload benchmark mode
//! - [`controller`] - the watchdog loop driving all of the above

pub mod banner;
pub mod benchmark;
pub mod bootstrap;
pub mod control;
pub mod controller;
pub mod expert_state;
pub mod input;
pub mod params;
pub mod prompt;

pub use control::ControlHandle;
pub use controller::run;
pub use params::{BenchmarkSpec, GpuVendor, ProcessParameters};
