use std::{sync::Arc, time::Instant};

use mda_core::{
    CancelToken, DependencyGraph, Discipline, GraphBuilder, Observer, Origin, Registry,
    RegistryError,
};

use crate::{
    Action, DesignPoint, Event, Failure, RunConfig, RunError, RunResult, RunStatus,
    driver::{self, Drive},
    report::overall_status,
};

/// Evaluates a prebuilt dependency graph at design points.
///
/// The graph is built once and reused; every run starts from a fresh
/// registry, so runs are independent unless warm-started.
///
/// # Examples
///
/// ```
/// use mda_core::{FnDiscipline, GraphBuilder, Value, Values, Variable, discipline::scalar};
/// use mda_engine::{DesignPoint, RunConfig, RunController};
///
/// let graph = GraphBuilder::new()
///     .design_variable(Variable::scalar("data:weight:payload", "kg"))
///     .discipline(
///         FnDiscipline::builder("weight:mtow")
///             .input(Variable::scalar("data:weight:payload", "kg"))
///             .input(Variable::scalar("data:weight:empty", "kg").with_default(650.0))
///             .output(Variable::scalar("data:weight:mtow", "kg"))
///             .build(|inputs| {
///                 let mtow = scalar(inputs, "data:weight:payload")? + scalar(inputs, "data:weight:empty")?;
///                 Ok(Values::from([("data:weight:mtow".to_string(), Value::from(mtow))]))
///             }),
///     )
///     .build()?;
///
/// let controller = RunController::new(graph, RunConfig::default())?;
/// let result = controller.run(&DesignPoint::new().with_unit("data:weight:payload", 350.0, "kg"))?;
///
/// assert!(result.is_converged());
/// assert_eq!(result.scalar("data:weight:mtow"), Some(1000.0));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct RunController {
    graph: DependencyGraph,
    config: RunConfig,
}

impl RunController {
    /// # Errors
    ///
    /// Returns [`RunError::InvalidConfig`] if the config does not validate.
    pub fn new(graph: DependencyGraph, config: RunConfig) -> Result<Self, RunError> {
        config.validate()?;
        Ok(Self { graph, config })
    }

    #[must_use]
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Sets or clears the result that seeds subsequent runs.
    ///
    /// An outer optimizer typically feeds each result back here so the next,
    /// slightly perturbed design point starts close to its fixed point.
    pub fn set_warm_start(&mut self, result: Option<RunResult>) {
        self.config.warm_start = result;
    }

    /// Runs one analysis at `design`.
    ///
    /// # Errors
    ///
    /// See [`run_observed`](Self::run_observed).
    pub fn run(&self, design: &DesignPoint) -> Result<RunResult, RunError> {
        self.run_observed(design, &CancelToken::new(), ())
    }

    /// Runs one analysis that stops cleanly once `cancel` is triggered.
    ///
    /// # Errors
    ///
    /// See [`run_observed`](Self::run_observed).
    pub fn run_with_cancel(
        &self,
        design: &DesignPoint,
        cancel: &CancelToken,
    ) -> Result<RunResult, RunError> {
        self.run_observed(design, cancel, ())
    }

    /// Runs one analysis, reporting progress to `observer`.
    ///
    /// The observer sees every Gauss-Seidel pass and every finished group.
    /// Returning [`Action::StopEarly`] ends the run as if it were cancelled.
    ///
    /// Cancelled runs and runs whose groups did not converge still return
    /// `Ok` with the status set accordingly, unless `strict` is enabled.
    ///
    /// # Errors
    ///
    /// - [`RunError::Seed`] if the design point or warm start cannot be
    ///   applied, or an external input is undefined. No discipline runs.
    /// - [`RunError::Failed`] if a discipline fails or times out.
    /// - [`RunError::NotConverged`] in strict mode when a group exceeds its
    ///   iteration budget or diverges.
    pub fn run_observed<Obs>(
        &self,
        design: &DesignPoint,
        cancel: &CancelToken,
        observer: Obs,
    ) -> Result<RunResult, RunError>
    where
        Obs: Observer<Event, Action>,
    {
        let started = Instant::now();
        let mut registry = self.seed(design)?;

        let drive = driver::drive(
            &self.graph,
            &mut registry,
            &self.config.convergence,
            self.config.parallel,
            cancel,
            observer,
        );
        let (result, error) = assemble(drive, &registry, started);

        tracing::info!(
            status = %result.status,
            iterations = result.total_iterations(),
            elapsed_ms = result.elapsed.as_millis(),
            "run finished"
        );

        match error {
            Some(source) => Err(RunError::Failed {
                result: Box::new(result),
                source,
            }),
            None if self.config.strict
                && matches!(
                    result.status,
                    RunStatus::MaxIterationsExceeded | RunStatus::Diverged
                ) =>
            {
                Err(RunError::NotConverged {
                    result: Box::new(result),
                })
            }
            None => Ok(result),
        }
    }

    /// Builds the starting registry: defaults, then warm start, then design point.
    fn seed(&self, design: &DesignPoint) -> Result<Registry, RegistryError> {
        let mut registry = self.graph.registry();

        if let Some(previous) = &self.config.warm_start {
            let seeded = registry.seed(&previous.registry, &Origin::WarmStart)?;
            tracing::debug!(seeded, "warm start applied");
        }

        design.apply(&mut registry)?;

        if let Some(missing) = self
            .graph
            .external_inputs()
            .iter()
            .find(|name| !registry.is_defined(name))
        {
            return Err(RegistryError::UndefinedVariable {
                name: missing.clone(),
            });
        }

        Ok(registry)
    }
}

fn assemble(
    drive: Drive,
    registry: &Registry,
    started: Instant,
) -> (RunResult, Option<mda_solvers::gauss_seidel::Error>) {
    let Drive {
        reports,
        failure,
        interrupted,
    } = drive;

    let mut status = overall_status(&reports);
    if interrupted {
        status = status.max(RunStatus::Cancelled);
    }

    let failed = reports
        .iter()
        .find(|report| report.status.run_status() == Some(RunStatus::Failed));
    let failure_report = match (failed, &failure) {
        (Some(report), Some(error)) => Some(Failure {
            group: report.id,
            discipline: error.discipline().map(ToString::to_string),
            message: error_chain(error),
        }),
        _ => None,
    };

    let message = match status {
        RunStatus::Converged => None,
        RunStatus::Failed => failure_report.as_ref().map(|failure| {
            format!("group {} failed: {}", failure.group, failure.message)
        }),
        RunStatus::Cancelled => Some(match reports.iter().find(|r| !r.status.is_terminal()) {
            Some(report) => format!("run cancelled at group {} ({})", report.id, report.members.join(", ")),
            None => "run cancelled".to_string(),
        }),
        RunStatus::MaxIterationsExceeded | RunStatus::Diverged => Some(
            reports
                .iter()
                .filter(|report| report.status.run_status() == Some(status))
                .map(|report| report.describe())
                .collect::<Vec<_>>()
                .join("; "),
        ),
    };

    let result = RunResult {
        status,
        registry: registry.snapshot(),
        groups: reports,
        message,
        failure: failure_report,
        elapsed: started.elapsed(),
    };
    (result, failure)
}

/// Formats an error with its chain of sources.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Evaluates a single discipline with every input taken from `design`.
///
/// Inputs without a declared default must be in the design point; the rest
/// fall back to their defaults. Handy for checking one discipline in isolation before wiring it
/// into a larger graph.
///
/// # Errors
///
/// Returns [`RunError::Build`] if the discipline's declarations conflict,
/// and otherwise the errors of [`RunController::run`].
pub fn run_system(
    discipline: impl Discipline + 'static,
    design: &DesignPoint,
) -> Result<RunResult, RunError> {
    let discipline: Arc<dyn Discipline> = Arc::new(discipline);
    let mut builder = GraphBuilder::new();
    for input in discipline.declared_inputs() {
        let produced = discipline
            .declared_outputs()
            .iter()
            .any(|output| output.name == input.name);
        if input.default.is_none() && !produced {
            builder = builder.design_variable(input.clone());
        }
    }
    let graph = builder.shared_discipline(discipline).build()?;
    RunController::new(graph, RunConfig::default())?.run(design)
}
