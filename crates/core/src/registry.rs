//! The shared store of variable values for one analysis run.
//!
//! A [`Registry`] holds every declared [`Variable`] together with its current
//! value and the [`Origin`] of that value. It is created per run (usually from
//! [`DependencyGraph::registry`](crate::graph::DependencyGraph::registry)) and
//! passed explicitly to whatever needs to read or write it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    value::{Value, Values},
    variable::{Origin, Variable},
};

/// Errors raised by registry access.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistryError {
    #[error("variable '{name}' is undefined")]
    UndefinedVariable { name: String },

    #[error("type mismatch for '{name}': expected {expected}, found {found}")]
    TypeMismatch {
        name: String,
        expected: String,
        found: String,
    },
}

impl RegistryError {
    fn undefined(name: &str) -> Self {
        Self::UndefinedVariable {
            name: name.to_string(),
        }
    }

    fn mismatch(name: &str, expected: impl ToString, found: impl ToString) -> Self {
        Self::TypeMismatch {
            name: name.to_string(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Slot {
    variable: Variable,
    value: Option<Value>,
    origin: Option<Origin>,
}

/// Declared variables with their current values and origins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registry {
    slots: IndexMap<String, Slot>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a variable.
    ///
    /// Redeclaring a variable with the same unit and shape is a no-op, except
    /// that a default is adopted if the variable has no value yet. A declared
    /// default becomes the initial value with origin [`Origin::Default`].
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::TypeMismatch`] if the variable is already
    /// declared with a different unit or shape, or if the default does not
    /// match the declared shape.
    pub fn declare(&mut self, variable: Variable) -> Result<(), RegistryError> {
        if let Some(default) = &variable.default {
            if default.shape() != variable.shape {
                return Err(RegistryError::mismatch(
                    &variable.name,
                    variable.shape,
                    default.shape(),
                ));
            }
        }

        if let Some(slot) = self.slots.get_mut(&variable.name) {
            if !slot.variable.same_type(&variable) {
                return Err(RegistryError::mismatch(
                    &variable.name,
                    describe(&slot.variable),
                    describe(&variable),
                ));
            }
            if slot.value.is_none() && variable.default.is_some() {
                slot.value.clone_from(&variable.default);
                slot.origin = Some(Origin::Default);
                slot.variable.default = variable.default;
            }
            return Ok(());
        }

        let value = variable.default.clone();
        let origin = value.as_ref().map(|_| Origin::Default);
        self.slots.insert(
            variable.name.clone(),
            Slot {
                variable,
                value,
                origin,
            },
        );
        Ok(())
    }

    /// Returns the current value of a variable.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UndefinedVariable`] if the variable is not
    /// declared or has no value yet.
    pub fn get(&self, name: &str) -> Result<&Value, RegistryError> {
        self.slots
            .get(name)
            .and_then(|slot| slot.value.as_ref())
            .ok_or_else(|| RegistryError::undefined(name))
    }

    /// Sets the value of a declared variable and records who wrote it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UndefinedVariable`] if the variable is not
    /// declared, or [`RegistryError::TypeMismatch`] if the value's shape
    /// differs from the declaration.
    pub fn set(
        &mut self,
        name: &str,
        value: impl Into<Value>,
        origin: Origin,
    ) -> Result<(), RegistryError> {
        let value = value.into();
        let slot = self
            .slots
            .get_mut(name)
            .ok_or_else(|| RegistryError::undefined(name))?;

        if value.shape() != slot.variable.shape {
            return Err(RegistryError::mismatch(
                name,
                slot.variable.shape,
                value.shape(),
            ));
        }

        slot.value = Some(value);
        slot.origin = Some(origin);
        Ok(())
    }

    /// Sets a value expressed in `unit`, rejecting it if the unit differs.
    ///
    /// No unit conversion is performed.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::TypeMismatch`] on a unit or shape mismatch and
    /// [`RegistryError::UndefinedVariable`] for undeclared variables.
    pub fn set_with_unit(
        &mut self,
        name: &str,
        value: impl Into<Value>,
        unit: Option<&str>,
        origin: Origin,
    ) -> Result<(), RegistryError> {
        let declared = self.unit(name)?;
        if declared != unit {
            return Err(RegistryError::mismatch(
                name,
                unit_label(declared),
                unit_label(unit),
            ));
        }
        self.set(name, value, origin)
    }

    /// Clears a variable's value, leaving its declaration in place.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UndefinedVariable`] if the variable is not declared.
    pub fn unset(&mut self, name: &str) -> Result<(), RegistryError> {
        let slot = self
            .slots
            .get_mut(name)
            .ok_or_else(|| RegistryError::undefined(name))?;
        slot.value = None;
        slot.origin = None;
        Ok(())
    }

    /// Returns the origin of a variable's current value, if it has one.
    #[must_use]
    pub fn origin(&self, name: &str) -> Option<&Origin> {
        self.slots.get(name).and_then(|slot| slot.origin.as_ref())
    }

    /// Returns the declared unit of a variable.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UndefinedVariable`] if the variable is not declared.
    pub fn unit(&self, name: &str) -> Result<Option<&str>, RegistryError> {
        self.variable(name)
            .map(|variable| variable.unit.as_deref())
            .ok_or_else(|| RegistryError::undefined(name))
    }

    /// Returns the declaration of a variable.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.slots.get(name).map(|slot| &slot.variable)
    }

    /// Returns `true` if the variable is declared.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Returns `true` if the variable is declared and has a value.
    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        self.get(name).is_ok()
    }

    /// Number of declared variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterates over declared variables and their values in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&Variable, Option<&Value>)> {
        self.slots
            .values()
            .map(|slot| (&slot.variable, slot.value.as_ref()))
    }

    /// Iterates over defined variables whose names start with `prefix`.
    ///
    /// # Examples
    ///
    /// ```
    /// use mda_core::{Registry, Variable};
    ///
    /// let mut registry = Registry::new();
    /// registry.declare(Variable::scalar("data:geometry:wing:area", "m**2").with_default(16.0)).unwrap();
    /// registry.declare(Variable::scalar("data:geometry:wing:span", "m").with_default(11.0)).unwrap();
    /// registry.declare(Variable::scalar("data:weight:aircraft:MTOW", "kg").with_default(1600.0)).unwrap();
    ///
    /// let wing: Vec<_> = registry.iter_prefix("data:geometry:wing:").map(|(name, _)| name).collect();
    /// assert_eq!(wing, vec!["data:geometry:wing:area", "data:geometry:wing:span"]);
    /// ```
    pub fn iter_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a Value)> {
        self.slots
            .iter()
            .filter(move |(name, _)| name.starts_with(prefix))
            .filter_map(|(name, slot)| slot.value.as_ref().map(|value| (name.as_str(), value)))
    }

    /// Collects the values of the named variables.
    ///
    /// Only the requested variables are exposed, which is how disciplines are
    /// kept from reading anything they did not declare.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UndefinedVariable`] for the first name with no value.
    pub fn values_of<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Values, RegistryError> {
        names
            .into_iter()
            .map(|name| Ok((name.to_string(), self.get(name)?.clone())))
            .collect()
    }

    /// Captures an immutable copy of every declared variable's state.
    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        let entries = self
            .slots
            .iter()
            .map(|(name, slot)| {
                let entry = SnapshotEntry {
                    value: slot.value.clone(),
                    unit: slot.variable.unit.clone(),
                    origin: slot.origin.clone(),
                };
                (name.clone(), entry)
            })
            .collect();
        RegistrySnapshot { entries }
    }

    /// Replaces the registry state with a snapshot.
    ///
    /// Declared variables absent from the snapshot become undefined. The
    /// snapshot is validated in full before anything is modified.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UndefinedVariable`] if the snapshot names a
    /// variable this registry does not declare, or
    /// [`RegistryError::TypeMismatch`] if a unit or shape disagrees.
    pub fn restore(&mut self, snapshot: &RegistrySnapshot) -> Result<(), RegistryError> {
        for (name, entry) in &snapshot.entries {
            let variable = self
                .variable(name)
                .ok_or_else(|| RegistryError::undefined(name))?;
            check_entry(variable, entry)?;
        }

        for (name, slot) in &mut self.slots {
            match snapshot.entries.get(name) {
                Some(entry) => {
                    slot.value.clone_from(&entry.value);
                    slot.origin.clone_from(&entry.origin);
                }
                None => {
                    slot.value = None;
                    slot.origin = None;
                }
            }
        }
        Ok(())
    }

    /// Seeds values from a snapshot taken on a possibly different registry.
    ///
    /// Entries for variables this registry does not declare, and entries with
    /// no value, are skipped. Seeded values are tagged with `origin`. Returns
    /// the number of variables seeded.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::TypeMismatch`] if a shared variable's unit or
    /// shape disagrees; nothing is modified in that case.
    pub fn seed(
        &mut self,
        snapshot: &RegistrySnapshot,
        origin: &Origin,
    ) -> Result<usize, RegistryError> {
        let mut seeded = Vec::new();
        for (name, entry) in &snapshot.entries {
            let (Some(variable), Some(value)) = (self.variable(name), entry.value.as_ref()) else {
                continue;
            };
            check_entry(variable, entry)?;
            seeded.push((name.as_str(), value));
        }

        let count = seeded.len();
        for (name, value) in seeded {
            let slot = &mut self.slots[name];
            slot.value = Some(value.clone());
            slot.origin = Some(origin.clone());
        }
        Ok(count)
    }

    /// Copies the named variables' state from another registry.
    ///
    /// Used to merge a private registry partition back into the shared one.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UndefinedVariable`] if either registry does
    /// not declare one of the names.
    pub fn merge_from<'a>(
        &mut self,
        other: &Registry,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), RegistryError> {
        for name in names {
            let source = other
                .slots
                .get(name)
                .ok_or_else(|| RegistryError::undefined(name))?;
            let target = self
                .slots
                .get_mut(name)
                .ok_or_else(|| RegistryError::undefined(name))?;
            target.value.clone_from(&source.value);
            target.origin.clone_from(&source.origin);
        }
        Ok(())
    }
}

/// An immutable copy of a registry's state.
///
/// Snapshots are plain data: they serialize with serde so callers can persist
/// them, and they round-trip through [`Registry::restore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    entries: IndexMap<String, SnapshotEntry>,
}

/// One variable's state inside a [`RegistrySnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub value: Option<Value>,
    pub unit: Option<String>,
    pub origin: Option<Origin>,
}

impl RegistrySnapshot {
    /// Returns the captured value of a variable.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.entries.get(name).and_then(|entry| entry.value.as_ref())
    }

    /// Returns the captured scalar value of a variable.
    #[must_use]
    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.value(name).and_then(Value::as_scalar)
    }

    /// Returns the captured origin of a variable.
    #[must_use]
    pub fn origin(&self, name: &str) -> Option<&Origin> {
        self.entries.get(name).and_then(|entry| entry.origin.as_ref())
    }

    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&SnapshotEntry> {
        self.entries.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SnapshotEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn check_entry(variable: &Variable, entry: &SnapshotEntry) -> Result<(), RegistryError> {
    if variable.unit != entry.unit {
        return Err(RegistryError::mismatch(
            &variable.name,
            variable.unit_label(),
            unit_label(entry.unit.as_deref()),
        ));
    }
    if let Some(value) = &entry.value {
        if value.shape() != variable.shape {
            return Err(RegistryError::mismatch(
                &variable.name,
                variable.shape,
                value.shape(),
            ));
        }
    }
    Ok(())
}

fn describe(variable: &Variable) -> String {
    format!("{} [{}]", variable.shape, variable.unit_label())
}

fn unit_label(unit: Option<&str>) -> &str {
    unit.unwrap_or("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn sizing_registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .declare(Variable::scalar("data:weight:aircraft:MTOW", "kg").with_default(1500.0))
            .unwrap();
        registry
            .declare(Variable::scalar("data:geometry:wing:area", "m**2"))
            .unwrap();
        registry
            .declare(Variable::array("data:aerodynamics:wing:CL", "", 3))
            .unwrap();
        registry
    }

    #[test]
    fn defaults_seed_values() {
        let registry = sizing_registry();

        assert_relative_eq!(
            registry.get("data:weight:aircraft:MTOW").unwrap().as_scalar().unwrap(),
            1500.0
        );
        assert_eq!(
            registry.origin("data:weight:aircraft:MTOW"),
            Some(&Origin::Default)
        );
        assert!(!registry.is_defined("data:geometry:wing:area"));
    }

    #[test]
    fn get_undefined_fails() {
        let registry = sizing_registry();

        assert!(matches!(
            registry.get("data:geometry:wing:area"),
            Err(RegistryError::UndefinedVariable { .. })
        ));
        assert!(matches!(
            registry.get("data:geometry:fuselage:length"),
            Err(RegistryError::UndefinedVariable { .. })
        ));
    }

    #[test]
    fn set_updates_origin() {
        let mut registry = sizing_registry();
        let origin = Origin::Discipline("geometry".into());

        registry
            .set("data:geometry:wing:area", 16.2, origin.clone())
            .unwrap();

        assert_eq!(registry.get("data:geometry:wing:area").unwrap(), &Value::Scalar(16.2));
        assert_eq!(registry.origin("data:geometry:wing:area"), Some(&origin));
    }

    #[test]
    fn set_rejects_shape_mismatch() {
        let mut registry = sizing_registry();

        let result = registry.set("data:aerodynamics:wing:CL", 0.5, Origin::Design);
        assert!(matches!(result, Err(RegistryError::TypeMismatch { .. })));

        let result = registry.set("data:aerodynamics:wing:CL", [0.1, 0.2], Origin::Design);
        assert!(matches!(result, Err(RegistryError::TypeMismatch { .. })));

        let result = registry.set("data:unknown", 1.0, Origin::Design);
        assert!(matches!(result, Err(RegistryError::UndefinedVariable { .. })));
    }

    #[test]
    fn set_with_unit_rejects_unit_mismatch() {
        let mut registry = sizing_registry();

        let result =
            registry.set_with_unit("data:weight:aircraft:MTOW", 3300.0, Some("lb"), Origin::Design);
        assert!(matches!(result, Err(RegistryError::TypeMismatch { .. })));

        registry
            .set_with_unit("data:weight:aircraft:MTOW", 1400.0, Some("kg"), Origin::Design)
            .unwrap();
        assert_eq!(registry.origin("data:weight:aircraft:MTOW"), Some(&Origin::Design));

        registry
            .set_with_unit("data:aerodynamics:wing:CL", [0.1, 0.2, 0.3], None, Origin::Design)
            .unwrap();
    }

    #[test]
    fn conflicting_declarations_fail() {
        let mut registry = sizing_registry();

        registry
            .declare(Variable::scalar("data:geometry:wing:area", "m**2").with_default(15.0))
            .unwrap();
        assert_eq!(registry.get("data:geometry:wing:area").unwrap(), &Value::Scalar(15.0));

        let result = registry.declare(Variable::scalar("data:geometry:wing:area", "ft**2"));
        assert!(matches!(result, Err(RegistryError::TypeMismatch { .. })));

        let result =
            registry.declare(Variable::array("data:geometry:wing:area", "m**2", 2));
        assert!(matches!(result, Err(RegistryError::TypeMismatch { .. })));

        let result = registry.declare(Variable::scalar("data:x", "m").with_default([1.0, 2.0]));
        assert!(matches!(result, Err(RegistryError::TypeMismatch { .. })));
    }

    #[test]
    fn snapshot_restore_round_trip() {
        let mut registry = sizing_registry();
        registry
            .set("data:geometry:wing:area", 16.2, Origin::Discipline("geometry".into()))
            .unwrap();
        let before = registry.clone();

        let snapshot = registry.snapshot();
        registry.restore(&snapshot).unwrap();
        assert_eq!(registry, before);

        registry
            .set("data:weight:aircraft:MTOW", 1700.0, Origin::Design)
            .unwrap();
        registry.unset("data:geometry:wing:area").unwrap();
        registry.restore(&snapshot).unwrap();
        assert_eq!(registry, before);
    }

    #[test]
    fn snapshot_survives_serialization() {
        let mut registry = sizing_registry();
        registry
            .set("data:aerodynamics:wing:CL", [0.2, 0.4, 0.6], Origin::Discipline("aero".into()))
            .unwrap();
        let before = registry.clone();

        let json = serde_json::to_string(&registry.snapshot()).unwrap();
        let snapshot: RegistrySnapshot = serde_json::from_str(&json).unwrap();

        registry.unset("data:aerodynamics:wing:CL").unwrap();
        registry.restore(&snapshot).unwrap();
        assert_eq!(registry, before);
    }

    #[test]
    fn restore_validates_before_mutating() {
        let mut registry = sizing_registry();
        let before = registry.clone();

        let mut other = Registry::new();
        other
            .declare(Variable::scalar("data:weight:aircraft:MTOW", "lb").with_default(3300.0))
            .unwrap();

        let result = registry.restore(&other.snapshot());
        assert!(matches!(result, Err(RegistryError::TypeMismatch { .. })));
        assert_eq!(registry, before);

        let mut unknown = Registry::new();
        unknown
            .declare(Variable::scalar("data:unknown", "").with_default(1.0))
            .unwrap();
        let result = registry.restore(&unknown.snapshot());
        assert!(matches!(result, Err(RegistryError::UndefinedVariable { .. })));
    }

    #[test]
    fn seed_skips_unknown_and_undefined() {
        let mut source = sizing_registry();
        source
            .declare(Variable::scalar("data:unknown", "").with_default(1.0))
            .unwrap();
        source
            .set("data:weight:aircraft:MTOW", 1620.0, Origin::Discipline("weight".into()))
            .unwrap();

        let mut registry = sizing_registry();
        let seeded = registry.seed(&source.snapshot(), &Origin::WarmStart).unwrap();

        assert_eq!(seeded, 1);
        assert_eq!(registry.get("data:weight:aircraft:MTOW").unwrap(), &Value::Scalar(1620.0));
        assert_eq!(registry.origin("data:weight:aircraft:MTOW"), Some(&Origin::WarmStart));
        assert!(!registry.is_defined("data:geometry:wing:area"));
    }

    #[test]
    fn values_of_exposes_only_requested() {
        let mut registry = sizing_registry();
        registry.set("data:geometry:wing:area", 16.0, Origin::Design).unwrap();

        let values = registry.values_of(["data:geometry:wing:area"]).unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values["data:geometry:wing:area"], Value::Scalar(16.0));

        let result = registry.values_of(["data:aerodynamics:wing:CL"]);
        assert!(matches!(result, Err(RegistryError::UndefinedVariable { .. })));
    }

    #[test]
    fn merge_copies_named_values() {
        let mut shared = sizing_registry();
        let mut partition = shared.clone();
        partition
            .set("data:geometry:wing:area", 14.0, Origin::Discipline("geometry".into()))
            .unwrap();
        partition
            .set("data:weight:aircraft:MTOW", 1.0, Origin::Design)
            .unwrap();

        shared.merge_from(&partition, ["data:geometry:wing:area"]).unwrap();

        assert_eq!(shared.get("data:geometry:wing:area").unwrap(), &Value::Scalar(14.0));
        assert_eq!(shared.get("data:weight:aircraft:MTOW").unwrap(), &Value::Scalar(1500.0));
    }
}
