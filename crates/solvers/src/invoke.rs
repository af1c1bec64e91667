//! Invocation of a single discipline.
//!
//! A discipline only ever sees the variables it declares as inputs, and its
//! result is rejected unless it contains exactly the declared outputs with
//! their declared shapes. Invocation never writes to the registry; callers
//! decide how outputs are committed.

use std::{io, sync::Arc, thread, time::Duration};

use crossbeam_channel::RecvTimeoutError;
use mda_core::{Discipline, DisciplineError, Registry, RegistryError, Values};
use thiserror::Error;

/// Errors raised while invoking a discipline.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("input of '{discipline}' is unavailable")]
    Input {
        discipline: String,
        #[source]
        source: RegistryError,
    },

    #[error("discipline '{discipline}' failed")]
    Computation {
        discipline: String,
        #[source]
        source: DisciplineError,
    },

    #[error("discipline '{discipline}' timed out after {timeout:?}")]
    Timeout {
        discipline: String,
        timeout: Duration,
    },

    #[error("discipline '{discipline}' did not produce declared output '{variable}'")]
    MissingOutput {
        discipline: String,
        variable: String,
    },

    #[error("discipline '{discipline}' produced undeclared output '{variable}'")]
    UndeclaredOutput {
        discipline: String,
        variable: String,
    },

    #[error("output of '{discipline}' does not match its declaration")]
    InvalidOutput {
        discipline: String,
        #[source]
        source: RegistryError,
    },

    #[error("worker for '{discipline}' stopped without a result")]
    WorkerLost { discipline: String },

    #[error("failed to start worker for '{discipline}'")]
    Spawn {
        discipline: String,
        #[source]
        source: io::Error,
    },
}

impl InvokeError {
    /// Name of the discipline that failed.
    #[must_use]
    pub fn discipline(&self) -> &str {
        match self {
            Self::Input { discipline, .. }
            | Self::Computation { discipline, .. }
            | Self::Timeout { discipline, .. }
            | Self::MissingOutput { discipline, .. }
            | Self::UndeclaredOutput { discipline, .. }
            | Self::InvalidOutput { discipline, .. }
            | Self::WorkerLost { discipline }
            | Self::Spawn { discipline, .. } => discipline,
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Runs a discipline on its declared inputs read from `registry`.
///
/// With a `timeout`, the computation runs on a dedicated worker thread and
/// the call returns [`InvokeError::Timeout`] once the deadline passes. The
/// worker cannot be interrupted; it is detached and its late result dropped.
///
/// # Errors
///
/// Returns an [`InvokeError`] if an input is undefined, the discipline
/// fails or times out, or its outputs do not match its declaration.
pub fn invoke(
    discipline: &Arc<dyn Discipline>,
    registry: &Registry,
    timeout: Option<Duration>,
) -> Result<Values, InvokeError> {
    let name = discipline.name();
    let inputs = registry
        .values_of(discipline.declared_inputs().iter().map(|v| v.name.as_str()))
        .map_err(|source| InvokeError::Input {
            discipline: name.to_string(),
            source,
        })?;

    tracing::trace!(discipline = name, inputs = inputs.len(), "invoking discipline");

    let result = match timeout {
        None => discipline.compute(&inputs),
        Some(timeout) => compute_on_worker(Arc::clone(discipline), inputs, timeout)?,
    };
    let outputs = result.map_err(|source| InvokeError::Computation {
        discipline: name.to_string(),
        source,
    })?;

    check_outputs(discipline.as_ref(), registry, &outputs)?;
    Ok(outputs)
}

fn compute_on_worker(
    discipline: Arc<dyn Discipline>,
    inputs: Values,
    timeout: Duration,
) -> Result<Result<Values, DisciplineError>, InvokeError> {
    let name = discipline.name().to_string();
    let (sender, receiver) = crossbeam_channel::bounded(1);

    thread::Builder::new()
        .name(format!("discipline {name}"))
        .spawn(move || {
            // The receiver is gone if the call already timed out.
            let _ = sender.send(discipline.compute(&inputs));
        })
        .map_err(|source| InvokeError::Spawn {
            discipline: name.clone(),
            source,
        })?;

    match receiver.recv_timeout(timeout) {
        Ok(result) => Ok(result),
        Err(RecvTimeoutError::Timeout) => {
            tracing::warn!(discipline = %name, ?timeout, "discipline timed out");
            Err(InvokeError::Timeout {
                discipline: name,
                timeout,
            })
        }
        Err(RecvTimeoutError::Disconnected) => Err(InvokeError::WorkerLost { discipline: name }),
    }
}

/// Checks that `outputs` holds exactly the declared outputs, shaped as declared.
fn check_outputs(
    discipline: &dyn Discipline,
    registry: &Registry,
    outputs: &Values,
) -> Result<(), InvokeError> {
    let name = discipline.name();
    let declared = discipline.declared_outputs();

    for variable in declared {
        let value = outputs
            .get(&variable.name)
            .ok_or_else(|| InvokeError::MissingOutput {
                discipline: name.to_string(),
                variable: variable.name.clone(),
            })?;

        let expected = registry.variable(&variable.name).map_or(variable.shape, |v| v.shape);
        if value.shape() != expected {
            return Err(InvokeError::InvalidOutput {
                discipline: name.to_string(),
                source: RegistryError::TypeMismatch {
                    name: variable.name.clone(),
                    expected: expected.to_string(),
                    found: value.shape().to_string(),
                },
            });
        }
    }

    if let Some(extra) = outputs
        .keys()
        .find(|key| !declared.iter().any(|v| &v.name == *key))
    {
        return Err(InvokeError::UndeclaredOutput {
            discipline: name.to_string(),
            variable: extra.clone(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use mda_core::{FnDiscipline, Origin, Value, Variable, discipline::scalar};

    fn registry_for(discipline: &dyn Discipline) -> Registry {
        let mut registry = Registry::new();
        for variable in discipline
            .declared_inputs()
            .iter()
            .chain(discipline.declared_outputs())
        {
            registry.declare(variable.clone()).unwrap();
        }
        registry
    }

    fn doubler() -> Arc<dyn Discipline> {
        Arc::new(
            FnDiscipline::builder("double")
                .input(Variable::scalar("x", "m").with_default(2.0))
                .output(Variable::scalar("y", "m"))
                .build(|inputs| {
                    assert_eq!(inputs.len(), 1, "only declared inputs are visible");
                    let x = scalar(inputs, "x")?;
                    Ok(Values::from([("y".to_string(), Value::from(2.0 * x))]))
                }),
        )
    }

    #[test]
    fn passes_only_declared_inputs() {
        let discipline = doubler();
        let mut registry = registry_for(discipline.as_ref());
        registry.declare(Variable::scalar("unrelated", "s")).unwrap();
        registry.set("unrelated", 9.0, Origin::Design).unwrap();

        let outputs = invoke(&discipline, &registry, None).unwrap();

        assert_relative_eq!(outputs["y"].as_scalar().unwrap(), 4.0);
        // Invocation alone never writes to the registry.
        assert!(!registry.is_defined("y"));
    }

    #[test]
    fn undefined_input_is_reported() {
        let discipline = doubler();
        let mut registry = registry_for(discipline.as_ref());
        registry.unset("x").unwrap();

        let error = invoke(&discipline, &registry, None).unwrap_err();
        assert!(matches!(
            error,
            InvokeError::Input { source: RegistryError::UndefinedVariable { ref name }, .. } if name == "x"
        ));
        assert_eq!(error.discipline(), "double");
    }

    #[test]
    fn computation_failure_keeps_the_discipline_error() {
        let discipline: Arc<dyn Discipline> = Arc::new(
            FnDiscipline::builder("aero:polar")
                .output(Variable::scalar("cd0", ""))
                .build(|_| Err(DisciplineError::message("xfoil crashed"))),
        );
        let registry = registry_for(discipline.as_ref());

        let error = invoke(&discipline, &registry, None).unwrap_err();
        let InvokeError::Computation { discipline, source } = error else {
            panic!("expected a computation error");
        };
        assert_eq!(discipline, "aero:polar");
        assert_eq!(source.to_string(), "xfoil crashed");
    }

    #[test]
    fn missing_output_is_rejected() {
        let discipline: Arc<dyn Discipline> = Arc::new(
            FnDiscipline::builder("partial")
                .output(Variable::scalar("a", ""))
                .output(Variable::scalar("b", ""))
                .build(|_| Ok(Values::from([("a".to_string(), Value::from(1.0))]))),
        );
        let registry = registry_for(discipline.as_ref());

        let error = invoke(&discipline, &registry, None).unwrap_err();
        assert!(matches!(error, InvokeError::MissingOutput { ref variable, .. } if variable == "b"));
    }

    #[test]
    fn undeclared_output_is_rejected() {
        let discipline: Arc<dyn Discipline> = Arc::new(
            FnDiscipline::builder("chatty")
                .output(Variable::scalar("a", ""))
                .build(|_| {
                    Ok(Values::from([
                        ("a".to_string(), Value::from(1.0)),
                        ("debug".to_string(), Value::from(0.0)),
                    ]))
                }),
        );
        let registry = registry_for(discipline.as_ref());

        let error = invoke(&discipline, &registry, None).unwrap_err();
        assert!(
            matches!(error, InvokeError::UndeclaredOutput { ref variable, .. } if variable == "debug")
        );
    }

    #[test]
    fn wrong_output_shape_is_rejected() {
        let discipline: Arc<dyn Discipline> = Arc::new(
            FnDiscipline::builder("profile")
                .output(Variable::array("chords", "m", 3))
                .build(|_| Ok(Values::from([("chords".to_string(), Value::from([1.0, 2.0]))]))),
        );
        let registry = registry_for(discipline.as_ref());

        let error = invoke(&discipline, &registry, None).unwrap_err();
        assert!(matches!(error, InvokeError::InvalidOutput { .. }));
    }

    #[test]
    fn slow_discipline_times_out() {
        let discipline: Arc<dyn Discipline> = Arc::new(
            FnDiscipline::builder("slow")
                .output(Variable::scalar("a", ""))
                .build(|_| {
                    thread::sleep(Duration::from_millis(500));
                    Ok(Values::from([("a".to_string(), Value::from(1.0))]))
                }),
        );
        let registry = registry_for(discipline.as_ref());

        let error = invoke(&discipline, &registry, Some(Duration::from_millis(20))).unwrap_err();
        assert!(error.is_timeout());
        assert_eq!(error.discipline(), "slow");
    }

    #[test]
    fn fast_discipline_finishes_within_timeout() {
        let discipline = doubler();
        let registry = registry_for(discipline.as_ref());

        let outputs = invoke(&discipline, &registry, Some(Duration::from_secs(5))).unwrap();
        assert_relative_eq!(outputs["y"].as_scalar().unwrap(), 4.0);
    }

    #[test]
    fn panicking_worker_is_reported() {
        let discipline: Arc<dyn Discipline> = Arc::new(
            FnDiscipline::builder("broken")
                .output(Variable::scalar("a", ""))
                .build(|_| panic!("model bug")),
        );
        let registry = registry_for(discipline.as_ref());

        let error = invoke(&discipline, &registry, Some(Duration::from_secs(5))).unwrap_err();
        assert!(matches!(error, InvokeError::WorkerLost { .. }));
    }
}
