use std::{error::Error as StdError, fmt};

use thiserror::Error;

use crate::{
    value::{Value, Values},
    variable::Variable,
};

/// One physics computation with a declared variable contract.
///
/// A discipline is a pure function of its declared inputs: it receives exactly
/// the variables named by [`declared_inputs`](Discipline::declared_inputs) and
/// must return exactly the variables named by
/// [`declared_outputs`](Discipline::declared_outputs). Declarations are static;
/// they are read once when the dependency graph is built.
///
/// Disciplines may block (for instance on an external solver process), so the
/// trait requires `Send + Sync` to allow running them on worker threads.
pub trait Discipline: Send + Sync {
    /// Unique name of the discipline within a graph.
    fn name(&self) -> &str;

    /// Variables this discipline reads.
    fn declared_inputs(&self) -> &[Variable];

    /// Variables this discipline writes.
    fn declared_outputs(&self) -> &[Variable];

    /// Computes outputs from inputs.
    ///
    /// # Errors
    ///
    /// Returns a [`DisciplineError`] if the underlying model fails.
    fn compute(&self, inputs: &Values) -> Result<Values, DisciplineError>;
}

/// Errors raised by a discipline's computation.
#[derive(Debug, Error)]
pub enum DisciplineError {
    #[error("missing input '{name}'")]
    MissingInput { name: String },

    #[error("input '{name}' is not a scalar")]
    NotScalar { name: String },

    #[error("{0}")]
    Message(String),

    #[error("model failed")]
    Model(#[source] Box<dyn StdError + Send + Sync>),
}

impl DisciplineError {
    /// Wraps an error raised by the underlying physics model.
    pub fn model(error: impl StdError + Send + Sync + 'static) -> Self {
        Self::Model(Box::new(error))
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

/// Reads a value from a discipline's inputs.
///
/// # Errors
///
/// Returns [`DisciplineError::MissingInput`] if the input is absent.
pub fn input<'a>(inputs: &'a Values, name: &str) -> Result<&'a Value, DisciplineError> {
    inputs
        .get(name)
        .ok_or_else(|| DisciplineError::MissingInput {
            name: name.to_string(),
        })
}

/// Reads a scalar from a discipline's inputs.
///
/// # Errors
///
/// Returns an error if the input is absent or is an array.
pub fn scalar(inputs: &Values, name: &str) -> Result<f64, DisciplineError> {
    input(inputs, name)?
        .as_scalar()
        .ok_or_else(|| DisciplineError::NotScalar {
            name: name.to_string(),
        })
}

type ComputeFn = dyn Fn(&Values) -> Result<Values, DisciplineError> + Send + Sync;

/// A discipline backed by a closure.
///
/// # Examples
///
/// ```
/// use mda_core::{FnDiscipline, Value, Values, Variable, discipline::scalar};
///
/// let wing = FnDiscipline::builder("geometry:wing")
///     .input(Variable::scalar("data:weight:aircraft:MTOW", "kg"))
///     .input(Variable::scalar("data:geometry:wing:loading", "kg/m**2").with_default(110.0))
///     .output(Variable::scalar("data:geometry:wing:area", "m**2"))
///     .build(|inputs| {
///         let mtow = scalar(inputs, "data:weight:aircraft:MTOW")?;
///         let loading = scalar(inputs, "data:geometry:wing:loading")?;
///         Ok(Values::from([("data:geometry:wing:area".to_string(), Value::from(mtow / loading))]))
///     });
/// # let _ = wing;
/// ```
pub struct FnDiscipline {
    name: String,
    inputs: Vec<Variable>,
    outputs: Vec<Variable>,
    function: Box<ComputeFn>,
}

impl FnDiscipline {
    /// Starts building a closure-backed discipline.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> FnDisciplineBuilder {
        FnDisciplineBuilder {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

impl Discipline for FnDiscipline {
    fn name(&self) -> &str {
        &self.name
    }

    fn declared_inputs(&self) -> &[Variable] {
        &self.inputs
    }

    fn declared_outputs(&self) -> &[Variable] {
        &self.outputs
    }

    fn compute(&self, inputs: &Values) -> Result<Values, DisciplineError> {
        (self.function)(inputs)
    }
}

impl fmt::Debug for FnDiscipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnDiscipline")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

/// Builder for [`FnDiscipline`].
#[derive(Debug)]
#[must_use]
pub struct FnDisciplineBuilder {
    name: String,
    inputs: Vec<Variable>,
    outputs: Vec<Variable>,
}

impl FnDisciplineBuilder {
    pub fn input(mut self, variable: Variable) -> Self {
        self.inputs.push(variable);
        self
    }

    pub fn output(mut self, variable: Variable) -> Self {
        self.outputs.push(variable);
        self
    }

    /// Finishes the discipline with its compute function.
    pub fn build<F>(self, function: F) -> FnDiscipline
    where
        F: Fn(&Values) -> Result<Values, DisciplineError> + Send + Sync + 'static,
    {
        FnDiscipline {
            name: self.name,
            inputs: self.inputs,
            outputs: self.outputs,
            function: Box::new(function),
        }
    }
}
