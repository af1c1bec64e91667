//! Dependency graph of disciplines.
//!
//! [`GraphBuilder`] turns a set of disciplines into an immutable
//! [`DependencyGraph`]: one node per discipline and one edge per variable
//! flowing from its producer to each consumer. Strongly connected components
//! become [`CycleGroup`]s, which are ordered topologically so that every
//! group runs after all the groups it reads from.

mod error;
mod group;

pub use error::BuildError;
pub use group::CycleGroup;

use std::{
    cmp::Reverse,
    collections::{BTreeSet, BinaryHeap},
    fmt,
    sync::Arc,
};

use indexmap::IndexMap;
use petgraph::{
    algo::tarjan_scc,
    graph::{DiGraph, NodeIndex},
    visit::EdgeRef,
};

use crate::{discipline::Discipline, registry::Registry, variable::Variable};

const DESIGN_WRITER: &str = "design variables";

/// Collects disciplines and design variables, then builds a [`DependencyGraph`].
#[derive(Default)]
#[must_use]
pub struct GraphBuilder {
    disciplines: Vec<Arc<dyn Discipline>>,
    design_variables: Vec<Variable>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a discipline.
    ///
    /// Registration order is significant: it numbers the cycle groups, breaks
    /// ties in the topological order, and fixes the invocation order inside
    /// coupled groups.
    pub fn discipline(self, discipline: impl Discipline + 'static) -> Self {
        self.shared_discipline(Arc::new(discipline))
    }

    /// Registers a discipline that is already shared.
    pub fn shared_discipline(mut self, discipline: Arc<dyn Discipline>) -> Self {
        self.disciplines.push(discipline);
        self
    }

    /// Declares a variable that the caller provides at run time.
    pub fn design_variable(mut self, variable: Variable) -> Self {
        self.design_variables.push(variable);
        self
    }

    /// Builds the dependency graph.
    ///
    /// # Algorithm
    ///
    /// 1. Merge every declaration into a registry, rejecting type conflicts.
    /// 2. Record the sole producer of each output.
    /// 3. Add an edge from producer to consumer for every bound input.
    /// 4. Partition disciplines into strongly connected components.
    /// 5. Order the components with Kahn's algorithm, taking the lowest
    ///    numbered ready group first.
    ///
    /// # Errors
    ///
    /// Returns a [`BuildError`] if two disciplines share a name or an output,
    /// if an input has no producer, default, or design value, or if two
    /// declarations of the same variable disagree on unit or shape.
    pub fn build(self) -> Result<DependencyGraph, BuildError> {
        let Self {
            disciplines,
            design_variables,
        } = self;

        let mut names = BTreeSet::new();
        for discipline in &disciplines {
            if !names.insert(discipline.name()) {
                return Err(BuildError::DuplicateDiscipline {
                    name: discipline.name().to_string(),
                });
            }
        }

        let declarations = declare_all(&disciplines, &design_variables)?;
        let producers = find_producers(&disciplines, &design_variables)?;

        let mut graph = DiGraph::new();
        for index in 0..disciplines.len() {
            graph.add_node(index);
        }

        let mut external_inputs = Vec::new();
        for (consumer, discipline) in disciplines.iter().enumerate() {
            for input in discipline.declared_inputs() {
                if let Some(&producer) = producers.get(&input.name) {
                    graph.add_edge(
                        NodeIndex::new(producer),
                        NodeIndex::new(consumer),
                        input.name.clone(),
                    );
                    continue;
                }

                let is_design = design_variables.iter().any(|v| v.name == input.name);
                if !is_design && !declarations.is_defined(&input.name) {
                    return Err(BuildError::UnboundInput {
                        variable: input.name.clone(),
                        discipline: discipline.name().to_string(),
                    });
                }
                if !external_inputs.contains(&input.name) {
                    external_inputs.push(input.name.clone());
                }
            }
        }

        let mut groups = find_groups(&graph, &disciplines);
        let order = topological_order(&graph, &mut groups);

        let level_count = groups.iter().map(|g| g.level + 1).max().unwrap_or(0);
        let mut levels = vec![Vec::new(); level_count];
        for &id in &order {
            levels[groups[id].level].push(id);
        }
        for level in &mut levels {
            level.sort_unstable();
        }

        Ok(DependencyGraph {
            disciplines,
            graph,
            declarations,
            producers,
            external_inputs,
            groups,
            order,
            levels,
        })
    }
}

/// An immutable dependency graph of disciplines.
///
/// Built once per set of disciplines with [`GraphBuilder`]; if the set
/// changes, build a new graph.
pub struct DependencyGraph {
    disciplines: Vec<Arc<dyn Discipline>>,
    graph: DiGraph<usize, String>,
    declarations: Registry,
    producers: IndexMap<String, usize>,
    external_inputs: Vec<String>,
    groups: Vec<CycleGroup>,
    order: Vec<usize>,
    levels: Vec<Vec<usize>>,
}

impl DependencyGraph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    /// Returns a fresh registry holding every declaration and default.
    #[must_use]
    pub fn registry(&self) -> Registry {
        self.declarations.clone()
    }

    /// Registered disciplines in registration order.
    #[must_use]
    pub fn disciplines(&self) -> &[Arc<dyn Discipline>] {
        &self.disciplines
    }

    /// Returns the discipline at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[must_use]
    pub fn discipline(&self, index: usize) -> &Arc<dyn Discipline> {
        &self.disciplines[index]
    }

    /// Cycle groups indexed by group number.
    #[must_use]
    pub fn groups(&self) -> &[CycleGroup] {
        &self.groups
    }

    /// Group numbers in execution order.
    #[must_use]
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Group numbers bucketed by topological level.
    ///
    /// Groups in the same level have no data dependency on each other.
    #[must_use]
    pub fn levels(&self) -> &[Vec<usize>] {
        &self.levels
    }

    /// Names of a group's members in invocation order.
    #[must_use]
    pub fn member_names(&self, group: &CycleGroup) -> Vec<&str> {
        group
            .members
            .iter()
            .map(|&index| self.disciplines[index].name())
            .collect()
    }

    /// Discipline names in execution order.
    pub fn execution_order(&self) -> impl Iterator<Item = &str> {
        self.order
            .iter()
            .flat_map(|&id| self.groups[id].members.iter())
            .map(|&index| self.disciplines[index].name())
    }

    /// Name of the discipline that produces `variable`, if any.
    #[must_use]
    pub fn producer(&self, variable: &str) -> Option<&str> {
        self.producers
            .get(variable)
            .map(|&index| self.disciplines[index].name())
    }

    /// Inputs that no discipline produces.
    ///
    /// These must come from declared defaults or from the design point.
    #[must_use]
    pub fn external_inputs(&self) -> &[String] {
        &self.external_inputs
    }

    /// Iterates over edges as `(producer, consumer, variable)` names.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.graph.edge_references().map(|edge| {
            (
                self.disciplines[self.graph[edge.source()]].name(),
                self.disciplines[self.graph[edge.target()]].name(),
                edge.weight().as_str(),
            )
        })
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

impl fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.disciplines.iter().map(|d| d.name()).collect();
        f.debug_struct("DependencyGraph")
            .field("disciplines", &names)
            .field("groups", &self.groups)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

fn declare_all(
    disciplines: &[Arc<dyn Discipline>],
    design_variables: &[Variable],
) -> Result<Registry, BuildError> {
    let mut registry = Registry::new();

    for variable in design_variables {
        registry
            .declare(variable.clone())
            .map_err(|source| BuildError::Declaration {
                discipline: DESIGN_WRITER.to_string(),
                source,
            })?;
    }

    for discipline in disciplines {
        let declared = discipline
            .declared_inputs()
            .iter()
            .chain(discipline.declared_outputs());
        for variable in declared {
            registry
                .declare(variable.clone())
                .map_err(|source| BuildError::Declaration {
                    discipline: discipline.name().to_string(),
                    source,
                })?;
        }
    }

    Ok(registry)
}

fn find_producers(
    disciplines: &[Arc<dyn Discipline>],
    design_variables: &[Variable],
) -> Result<IndexMap<String, usize>, BuildError> {
    let mut producers: IndexMap<String, usize> = IndexMap::new();

    for (index, discipline) in disciplines.iter().enumerate() {
        for output in discipline.declared_outputs() {
            if design_variables.iter().any(|v| v.name == output.name) {
                return Err(BuildError::MultipleWriters {
                    variable: output.name.clone(),
                    first: DESIGN_WRITER.to_string(),
                    second: discipline.name().to_string(),
                });
            }
            if let Some(&first) = producers.get(&output.name) {
                return Err(BuildError::MultipleWriters {
                    variable: output.name.clone(),
                    first: disciplines[first].name().to_string(),
                    second: discipline.name().to_string(),
                });
            }
            producers.insert(output.name.clone(), index);
        }
    }

    Ok(producers)
}

/// Partitions disciplines into strongly connected groups numbered by first member.
fn find_groups(
    graph: &DiGraph<usize, String>,
    disciplines: &[Arc<dyn Discipline>],
) -> Vec<CycleGroup> {
    let mut components: Vec<Vec<usize>> = tarjan_scc(graph)
        .into_iter()
        .map(|component| {
            let mut members: Vec<usize> = component.iter().map(|&node| graph[node]).collect();
            members.sort_unstable();
            members
        })
        .collect();
    components.sort_unstable_by_key(|members| members[0]);

    components
        .into_iter()
        .enumerate()
        .map(|(id, members)| {
            let coupled = members.len() > 1 || {
                let node = NodeIndex::new(members[0]);
                graph.contains_edge(node, node)
            };
            let outputs = members
                .iter()
                .flat_map(|&index| disciplines[index].declared_outputs())
                .map(|variable| variable.name.clone())
                .collect();
            CycleGroup {
                id,
                members,
                coupled,
                outputs,
                level: 0,
            }
        })
        .collect()
}

/// Orders groups topologically and assigns their levels.
///
/// The condensation of strongly connected components is acyclic, so every
/// group is emitted exactly once.
fn topological_order(graph: &DiGraph<usize, String>, groups: &mut [CycleGroup]) -> Vec<usize> {
    let mut group_of = vec![0; graph.node_count()];
    for group in groups.iter() {
        for &member in &group.members {
            group_of[member] = group.id;
        }
    }

    let mut successors = vec![BTreeSet::new(); groups.len()];
    for edge in graph.edge_references() {
        let from = group_of[graph[edge.source()]];
        let to = group_of[graph[edge.target()]];
        if from != to {
            successors[from].insert(to);
        }
    }

    let mut in_degree = vec![0usize; groups.len()];
    for targets in &successors {
        for &to in targets {
            in_degree[to] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &degree)| degree == 0)
        .map(|(id, _)| Reverse(id))
        .collect();

    let mut order = Vec::with_capacity(groups.len());
    while let Some(Reverse(id)) = ready.pop() {
        order.push(id);
        for &to in &successors[id] {
            groups[to].level = groups[to].level.max(groups[id].level + 1);
            in_degree[to] -= 1;
            if in_degree[to] == 0 {
                ready.push(Reverse(to));
            }
        }
    }

    order
}
