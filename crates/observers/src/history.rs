use indexmap::IndexMap;
use mda_core::Observer;
use serde::{Deserialize, Serialize};

use crate::traits::HasPass;

/// One recorded Gauss-Seidel pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassRecord {
    pub iteration: usize,
    pub max_residual: f64,
    pub worst_variable: Option<String>,
    pub relaxation_factor: f64,
}

/// An observer that records the residual trace of every coupled group.
///
/// Pass `&mut ResidualHistory` as the observer so the traces can be read
/// once the run is over. The history serializes with serde, which is how
/// traces reach external plotting and reporting tools.
///
/// # Example
///
/// ```
/// use mda_core::{CancelToken, FnDiscipline, GraphBuilder, Value, Values, Variable, discipline::scalar};
/// use mda_engine::{DesignPoint, RunConfig, RunController};
/// use mda_observers::ResidualHistory;
///
/// let graph = GraphBuilder::new()
///     .design_variable(Variable::scalar("payload", "kg"))
///     .discipline(
///         FnDiscipline::builder("geometry")
///             .input(Variable::scalar("mtow", "kg"))
///             .output(Variable::scalar("area", "m**2"))
///             .build(|inputs| {
///                 let area = scalar(inputs, "mtow")? / 110.0;
///                 Ok(Values::from([("area".to_string(), Value::from(area))]))
///             }),
///     )
///     .discipline(
///         FnDiscipline::builder("weight")
///             .input(Variable::scalar("area", "m**2"))
///             .input(Variable::scalar("payload", "kg"))
///             .output(Variable::scalar("mtow", "kg"))
///             .build(|inputs| {
///                 let mtow = 10.0 * scalar(inputs, "area")? + 600.0 + scalar(inputs, "payload")?;
///                 Ok(Values::from([("mtow".to_string(), Value::from(mtow))]))
///             }),
///     )
///     .build()?;
/// let controller = RunController::new(graph, RunConfig::default())?;
/// let design = DesignPoint::new().with("payload", 360.0);
///
/// let mut history = ResidualHistory::new();
/// let result = controller.run_observed(&design, &CancelToken::new(), &mut history)?;
///
/// assert!(result.is_converged());
/// for (group, trace) in history.iter() {
///     assert_eq!(trace.len(), result.group(group).unwrap().iterations);
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResidualHistory {
    traces: IndexMap<usize, Vec<PassRecord>>,
}

impl ResidualHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a single pass.
    pub fn record(&mut self, event: &mda_solvers::gauss_seidel::Event) {
        self.traces.entry(event.group).or_default().push(PassRecord {
            iteration: event.iteration,
            max_residual: event.max_residual,
            worst_variable: event.worst_variable.clone(),
            relaxation_factor: event.relaxation_factor,
        });
    }

    /// Recorded passes of `group`, oldest first.
    #[must_use]
    pub fn trace(&self, group: usize) -> &[PassRecord] {
        self.traces.get(&group).map_or(&[], Vec::as_slice)
    }

    /// `[iteration, max_residual]` points of `group`, ready for plotting.
    #[must_use]
    pub fn points(&self, group: usize) -> Vec<[f64; 2]> {
        self.trace(group)
            .iter()
            .map(|record| [record.iteration as f64, record.max_residual])
            .collect()
    }

    /// Groups with at least one pass, in the order they were first seen.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[PassRecord])> {
        self.traces
            .iter()
            .map(|(&group, trace)| (group, trace.as_slice()))
    }

    /// Total number of recorded passes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.traces.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn clear(&mut self) {
        self.traces.clear();
    }
}

impl<E, A> Observer<E, A> for ResidualHistory
where
    E: HasPass,
{
    fn observe(&mut self, event: &E) -> Option<A> {
        if let Some(pass) = event.pass() {
            self.record(pass);
        }
        None
    }
}

/// Allows `&mut ResidualHistory` to be passed to solvers that take an
/// observer by value, so the history can be read after the run.
impl<E, A> Observer<E, A> for &mut ResidualHistory
where
    E: HasPass,
{
    fn observe(&mut self, event: &E) -> Option<A> {
        (*self).observe(event)
    }
}
