//! Core types for multidisciplinary design analysis.
//!
//! This crate defines what the solvers and the run engine build on:
//!
//! - [`Value`], [`Variable`] and [`Origin`]: named physical quantities and
//!   where their values came from
//! - [`Registry`]: the per-run store of variable values, with
//!   [`snapshot`](Registry::snapshot) and [`restore`](Registry::restore)
//! - [`Discipline`]: one physics computation with declared inputs and
//!   outputs, and [`FnDiscipline`] for closure-backed disciplines
//! - [`DependencyGraph`]: disciplines wired by variable flow, partitioned
//!   into [`CycleGroup`]s and ordered topologically
//! - [`Observer`] and [`CancelToken`]: monitoring and cooperative
//!   cancellation hooks shared by solvers

mod cancel;
pub mod discipline;
pub mod graph;
mod observer;
pub mod registry;
mod value;
mod variable;

pub use cancel::CancelToken;
pub use discipline::{Discipline, DisciplineError, FnDiscipline};
pub use graph::{BuildError, CycleGroup, DependencyGraph, GraphBuilder};
pub use observer::Observer;
pub use registry::{Registry, RegistryError, RegistrySnapshot};
pub use value::{Shape, Value, Values};
pub use variable::{Origin, Variable};
