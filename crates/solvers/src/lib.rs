//! Solvers for coupled discipline groups.
//!
//! - [`invoke`] runs a single discipline against a registry, enforcing its
//!   declared contract and an optional wall-clock timeout
//! - [`gauss_seidel`] drives a coupled group to a fixed point by repeated
//!   sequential passes with under-relaxation

pub mod gauss_seidel;
pub mod invoke;
