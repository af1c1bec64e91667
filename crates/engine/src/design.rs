use indexmap::IndexMap;
use mda_core::{Origin, Registry, RegistryError, Value};
use serde::{Deserialize, Serialize};

/// Values supplied by the caller for one run, keyed by variable name.
///
/// Entries may carry the unit they are expressed in; it must match the
/// declared unit exactly. In TOML or JSON an entry is either a bare value or
/// a table with `value` and `unit`:
///
/// ```toml
/// "data:geometry:wing:aspect_ratio" = 7.98
/// "data:mission:sizing:cruise:altitude" = { value = 2438.4, unit = "m" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DesignPoint {
    values: IndexMap<String, DesignValue>,
}

/// One design-point entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Entry")]
pub struct DesignValue {
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Entry {
    Bare(Value),
    Full {
        value: Value,
        #[serde(default)]
        unit: Option<String>,
    },
}

impl From<Entry> for DesignValue {
    fn from(entry: Entry) -> Self {
        match entry {
            Entry::Bare(value) => Self { value, unit: None },
            Entry::Full { value, unit } => Self { value, unit },
        }
    }
}

impl DesignPoint {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value without a unit check.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value, None);
        self
    }

    /// Adds a value expressed in `unit`.
    #[must_use]
    pub fn with_unit(
        mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
        unit: impl Into<String>,
    ) -> Self {
        self.insert(name, value, Some(unit.into()));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>, unit: Option<String>) {
        self.values.insert(
            name.into(),
            DesignValue {
                value: value.into(),
                unit,
            },
        );
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DesignValue> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DesignValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Writes every entry into `registry` with origin [`Origin::Design`].
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UndefinedVariable`] for names the registry
    /// does not declare and [`RegistryError::TypeMismatch`] for unit or
    /// shape mismatches.
    pub(crate) fn apply(&self, registry: &mut Registry) -> Result<(), RegistryError> {
        for (name, entry) in &self.values {
            match &entry.unit {
                Some(unit) => registry.set_with_unit(
                    name,
                    entry.value.clone(),
                    Some(unit.as_str()),
                    Origin::Design,
                )?,
                None => registry.set(name, entry.value.clone(), Origin::Design)?,
            }
        }
        Ok(())
    }
}

impl<N: Into<String>, V: Into<Value>> FromIterator<(N, V)> for DesignPoint {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut design = Self::new();
        for (name, value) in iter {
            design.insert(name, value, None);
        }
        design
    }
}
