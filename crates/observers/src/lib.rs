//! Reusable observers for Gauss-Seidel solves and full runs.
//!
//! This crate provides [`Observer`] implementations and capability traits that
//! work with both [`gauss_seidel::Event`] and the run-level [`mda_engine::Event`].
//!
//! # Modules
//!
//! - [`traits`]: capability traits for cross-solver observers
//!   ([`HasPass`], [`HasResidual`], [`CanStopEarly`])
//!
//! # Observers
//!
//! - [`TracingObserver`] forwards progress to `tracing`
//! - [`ResidualHistory`] records residual traces per group for reporting
//! - [`StallGuard`] stops a solve whose residual has stopped improving
//!
//! [`Observer`]: mda_core::Observer
//! [`gauss_seidel::Event`]: mda_solvers::gauss_seidel::Event
//! [`HasPass`]: traits::HasPass
//! [`HasResidual`]: traits::HasResidual
//! [`CanStopEarly`]: traits::CanStopEarly

mod history;
mod log;
mod stall;
pub mod traits;

pub use history::{PassRecord, ResidualHistory};
pub use log::TracingObserver;
pub use stall::StallGuard;
