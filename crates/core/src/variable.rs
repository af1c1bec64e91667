use serde::{Deserialize, Serialize};

use crate::value::{Shape, Value};

/// Declaration of a named physical quantity.
///
/// Disciplines declare the variables they read and write; the registry and
/// graph builder use these declarations to type-check values and wire
/// producers to consumers. Names follow the hierarchical convention
/// `data:<discipline>:<component>:<quantity>`, e.g. `data:geometry:wing:area`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub unit: Option<String>,
    pub shape: Shape,
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl Variable {
    /// Declares a scalar variable.
    ///
    /// An empty `unit` declares a dimensionless quantity.
    #[must_use]
    pub fn scalar(name: impl Into<String>, unit: &str) -> Self {
        Self::new(name, unit, Shape::Scalar)
    }

    /// Declares a fixed-length array variable.
    #[must_use]
    pub fn array(name: impl Into<String>, unit: &str, len: usize) -> Self {
        Self::new(name, unit, Shape::Array(len))
    }

    fn new(name: impl Into<String>, unit: &str, shape: Shape) -> Self {
        Self {
            name: name.into(),
            unit: (!unit.is_empty()).then(|| unit.to_string()),
            shape,
            default: None,
            description: String::new(),
        }
    }

    /// Sets the value used when nothing else provides one.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Returns `true` if `other` declares the same unit and shape.
    #[must_use]
    pub fn same_type(&self, other: &Variable) -> bool {
        self.unit == other.unit && self.shape == other.shape
    }

    /// Returns the unit for display, using `-` for dimensionless quantities.
    #[must_use]
    pub fn unit_label(&self) -> &str {
        self.unit.as_deref().unwrap_or("-")
    }
}

/// Records which party last wrote a variable's value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// The declared default value.
    Default,
    /// A caller-provided design variable.
    Design,
    /// A value carried over from a previous run.
    WarmStart,
    /// The solver's starting guess for an uninitialized coupling variable.
    InitialGuess,
    /// Output of the named discipline.
    Discipline(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders() {
        let area = Variable::scalar("data:geometry:wing:area", "m**2")
            .with_default(16.0)
            .with_description("Wing reference area");

        assert_eq!(area.unit.as_deref(), Some("m**2"));
        assert_eq!(area.shape, Shape::Scalar);
        assert_eq!(area.default, Some(Value::Scalar(16.0)));

        let taper = Variable::scalar("data:geometry:wing:taper_ratio", "");
        assert_eq!(taper.unit, None);
        assert_eq!(taper.unit_label(), "-");
    }

    #[test]
    fn same_type_ignores_defaults() {
        let a = Variable::array("data:mission:speeds", "m/s", 3);
        let b = Variable::array("data:mission:speeds", "m/s", 3).with_default([1.0, 2.0, 3.0]);
        let c = Variable::array("data:mission:speeds", "kn", 3);
        let d = Variable::array("data:mission:speeds", "m/s", 4);

        assert!(a.same_type(&b));
        assert!(!a.same_type(&c));
        assert!(!a.same_type(&d));
    }
}
