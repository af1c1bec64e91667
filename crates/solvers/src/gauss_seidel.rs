//! Gauss-Seidel fixed-point iteration for coupled discipline groups.
//!
//! Members of a group are invoked one after another in registration order,
//! each seeing the freshest values written earlier in the same pass. Outputs
//! that feed back into the group are under-relaxed before being written:
//!
//! ```text
//! x_new = x_old + w * (x_computed - x_old)
//! ```
//!
//! A pass ends once every member has run. The group has converged when the
//! relative change of every variable it produces over the pass is below the
//! tolerance.
//!
//! # Example
//!
//! ```
//! use mda_core::{FnDiscipline, GraphBuilder, Value, Values, Variable, discipline::scalar};
//! use mda_solvers::gauss_seidel::{self, Config};
//!
//! // Wing area from MTOW and MTOW from wing area.
//! let graph = GraphBuilder::new()
//!     .discipline(
//!         FnDiscipline::builder("geometry")
//!             .input(Variable::scalar("mtow", "kg"))
//!             .output(Variable::scalar("area", "m**2"))
//!             .build(|inputs| {
//!                 let area = scalar(inputs, "mtow")? / 110.0;
//!                 Ok(Values::from([("area".to_string(), Value::from(area))]))
//!             }),
//!     )
//!     .discipline(
//!         FnDiscipline::builder("weight")
//!             .input(Variable::scalar("area", "m**2"))
//!             .output(Variable::scalar("mtow", "kg"))
//!             .build(|inputs| {
//!                 let mtow = 10.0 * scalar(inputs, "area")? + 960.0;
//!                 Ok(Values::from([("mtow".to_string(), Value::from(mtow))]))
//!             }),
//!     )
//!     .build()?;
//!
//! let mut registry = graph.registry();
//! let group = &graph.groups()[0];
//! let solution = gauss_seidel::solve_unobserved(&graph, group, &mut registry, &Config::default())?;
//!
//! assert!(solution.is_converged());
//! let mtow = registry.get("mtow")?.as_scalar().unwrap_or_default();
//! assert!((mtow - 1056.0).abs() < 1e-3);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod action;
mod config;
mod error;
mod event;
mod relaxation;
mod solution;

pub use action::Action;
pub use config::{Acceleration, Config, ConfigError};
pub use error::Error;
pub use event::Event;
pub use solution::{Solution, Status};

use indexmap::IndexMap;
use mda_core::{
    CancelToken, CycleGroup, DependencyGraph, Observer, Origin, Registry, RegistryError, Value,
};

use crate::invoke::invoke;

use relaxation::Relaxation;

/// Iterates a coupled group until it converges, diverges, or runs out of passes.
///
/// # Algorithm
///
/// 1. Seed coupling variables that have no value with `initial_guess`.
/// 2. For each pass:
///    - Record the current values of the group's outputs.
///    - Invoke every member in order, relaxing fed-back outputs.
///    - Compute the relative residual of every output. Outputs with no value
///      at the start of the pass are only checked for finiteness.
///    - Emit an [`Event`] to the observer.
///    - Stop as diverged on non-finite values, as converged when the largest
///      residual is below the tolerance, or as diverged when the largest
///      absolute change has grown for `divergence_patience` passes and
///      exceeds `divergence_threshold`.
///    - Update the relaxation factor.
/// 3. Report [`Status::MaxIterations`] if the pass budget runs out.
///
/// The registry is left with the values of the last pass, whatever the
/// status. Restoring an earlier state is the caller's concern.
///
/// # Observer
///
/// The observer receives an [`Event`] after each pass and may return
/// [`Action::StopEarly`] to stop iterating.
///
/// # Cancellation
///
/// `cancel` is checked before every discipline invocation. A cancelled solve
/// returns [`Status::Cancelled`] with the diagnostics of the last completed pass.
///
/// # Errors
///
/// Returns an error if the config is invalid, a discipline fails or times
/// out, or a discipline breaks its declared contract.
pub fn solve<Obs>(
    graph: &DependencyGraph,
    group: &CycleGroup,
    registry: &mut Registry,
    config: &Config,
    cancel: &CancelToken,
    mut observer: Obs,
) -> Result<Solution, Error>
where
    Obs: Observer<Event, Action>,
{
    config.validate()?;

    let coupling = coupling_variables(graph, group);
    seed_initial_guess(registry, &coupling, config.initial_guess)?;

    let mut relaxation = Relaxation::new(config);
    let mut guard = DivergenceGuard::new(config);
    let mut last = PassSummary::default();

    for iteration in 1..=config.max_iterations {
        let start = pass_start(registry, group.outputs());
        let factor = relaxation.factor();
        let mut updates = Vec::new();

        for &member in group.members() {
            if cancel.is_cancelled() {
                tracing::debug!(group = group.id(), iteration, "cancelled");
                return Ok(last.into_solution(Status::Cancelled, iteration - 1, factor));
            }

            let discipline = graph.discipline(member);
            let outputs = invoke(discipline, registry, config.unit_timeout)?;
            let origin = Origin::Discipline(discipline.name().to_string());

            for (name, computed) in outputs {
                let value = if coupling.contains(&name.as_str()) {
                    let current = registry.get(&name)?;
                    collect_updates(current, &computed, &mut updates);
                    current
                        .zip_map(&computed, |old, new| relaxation.apply(old, new))
                        .ok_or_else(|| RegistryError::TypeMismatch {
                            name: name.clone(),
                            expected: current.shape().to_string(),
                            found: computed.shape().to_string(),
                        })?
                } else {
                    computed
                };
                registry.set(&name, value, origin.clone())?;
            }
        }

        last = PassSummary::measure(&start, registry, config.epsilon)?;

        tracing::debug!(
            group = group.id(),
            iteration,
            max_residual = last.max_residual,
            worst = last.worst_variable.as_deref().unwrap_or("-"),
            relaxation = factor,
            "gauss-seidel pass"
        );

        let event = Event {
            group: group.id(),
            iteration,
            max_residual: last.max_residual,
            worst_variable: last.worst_variable.clone(),
            max_change: last.max_change,
            relaxation_factor: factor,
        };
        if let Some(Action::StopEarly) = observer.observe(&event) {
            return Ok(last.into_solution(Status::StoppedByObserver, iteration, factor));
        }

        if !last.finite {
            return Ok(last.into_solution(Status::Diverged, iteration, factor));
        }
        if last.max_residual < config.tolerance {
            return Ok(last.into_solution(Status::Converged, iteration, factor));
        }
        if guard.is_diverging(last.max_change) {
            return Ok(last.into_solution(Status::Diverged, iteration, factor));
        }

        relaxation.update(updates);
    }

    Ok(last.into_solution(
        Status::MaxIterations,
        config.max_iterations,
        relaxation.factor(),
    ))
}

/// Iterates a coupled group without observation or cancellation.
///
/// This is a convenience wrapper around [`solve`].
///
/// # Errors
///
/// Returns an error if the config is invalid or a discipline fails.
pub fn solve_unobserved(
    graph: &DependencyGraph,
    group: &CycleGroup,
    registry: &mut Registry,
    config: &Config,
) -> Result<Solution, Error> {
    solve(graph, group, registry, config, &CancelToken::new(), ())
}

/// Outputs of the group that some member also reads, in invocation order.
fn coupling_variables<'g>(graph: &'g DependencyGraph, group: &'g CycleGroup) -> Vec<&'g str> {
    group
        .outputs()
        .iter()
        .filter(|output| {
            group.members().iter().any(|&member| {
                graph
                    .discipline(member)
                    .declared_inputs()
                    .iter()
                    .any(|input| &input.name == *output)
            })
        })
        .map(String::as_str)
        .collect()
}

fn seed_initial_guess(
    registry: &mut Registry,
    coupling: &[&str],
    guess: f64,
) -> Result<(), RegistryError> {
    for &name in coupling {
        if registry.is_defined(name) {
            continue;
        }
        let shape = registry
            .variable(name)
            .map(|variable| variable.shape)
            .ok_or_else(|| RegistryError::UndefinedVariable {
                name: name.to_string(),
            })?;
        tracing::trace!(variable = name, guess, "seeding initial guess");
        registry.set(name, Value::filled(shape, guess), Origin::InitialGuess)?;
    }
    Ok(())
}

/// Values of `outputs` at the start of a pass, `None` where still undefined.
fn pass_start(registry: &Registry, outputs: &[String]) -> Vec<(String, Option<Value>)> {
    outputs
        .iter()
        .map(|name| (name.clone(), registry.get(name).ok().cloned()))
        .collect()
}

fn collect_updates(current: &Value, computed: &Value, updates: &mut Vec<f64>) {
    updates.extend(
        current
            .as_slice()
            .iter()
            .zip(computed.as_slice())
            .map(|(old, new)| new - old),
    );
}

/// Convergence measures of one completed pass.
#[derive(Debug, Clone)]
struct PassSummary {
    residuals: IndexMap<String, f64>,
    max_residual: f64,
    worst_variable: Option<String>,
    max_change: f64,
    finite: bool,
}

impl Default for PassSummary {
    fn default() -> Self {
        Self {
            residuals: IndexMap::new(),
            max_residual: f64::NAN,
            worst_variable: None,
            max_change: 0.0,
            finite: true,
        }
    }
}

impl PassSummary {
    fn measure(
        start: &[(String, Option<Value>)],
        registry: &Registry,
        epsilon: f64,
    ) -> Result<Self, RegistryError> {
        let mut summary = Self {
            max_residual: 0.0,
            ..Self::default()
        };

        for (name, old) in start {
            let new = registry.get(name)?;
            summary.finite &= new.is_finite();
            let Some(old) = old else {
                continue;
            };

            let mut residual: f64 = 0.0;
            for (old, new) in old.as_slice().iter().zip(new.as_slice()) {
                let change = (new - old).abs();
                residual = residual.max(change / old.abs().max(epsilon));
                summary.max_change = summary.max_change.max(change);
            }

            if summary.worst_variable.is_none() || residual > summary.max_residual {
                summary.max_residual = residual;
                summary.worst_variable = Some(name.clone());
            }
            summary.residuals.insert(name.clone(), residual);
        }

        Ok(summary)
    }

    fn into_solution(self, status: Status, iterations: usize, relaxation_factor: f64) -> Solution {
        Solution {
            status,
            iterations,
            residuals: self.residuals,
            max_residual: self.max_residual,
            worst_variable: self.worst_variable,
            relaxation_factor,
        }
    }
}

/// Flags passes whose absolute change keeps growing past a threshold.
#[derive(Debug)]
struct DivergenceGuard {
    threshold: f64,
    patience: usize,
    previous: Option<f64>,
    streak: usize,
}

impl DivergenceGuard {
    fn new(config: &Config) -> Self {
        Self {
            threshold: config.divergence_threshold,
            patience: config.divergence_patience,
            previous: None,
            streak: 0,
        }
    }

    fn is_diverging(&mut self, change: f64) -> bool {
        if let Some(previous) = self.previous {
            self.streak = if change > previous { self.streak + 1 } else { 0 };
        }
        self.previous = Some(change);
        self.streak >= self.patience && change > self.threshold
    }
}
