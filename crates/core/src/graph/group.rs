/// A strongly connected set of disciplines.
///
/// Members are stored in registration order, which is also the order the
/// solver invokes them within a pass. A group is *coupled* when it has more
/// than one member or its single member consumes one of its own outputs;
/// otherwise it is trivial and evaluated exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleGroup {
    pub(crate) id: usize,
    pub(crate) members: Vec<usize>,
    pub(crate) coupled: bool,
    pub(crate) outputs: Vec<String>,
    pub(crate) level: usize,
}

impl CycleGroup {
    /// Group number, assigned in order of each group's first registered member.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Indices of member disciplines in invocation order.
    #[must_use]
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    #[must_use]
    pub fn is_coupled(&self) -> bool {
        self.coupled
    }

    /// Variables produced by the members, in invocation order.
    #[must_use]
    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    /// Topological level: zero for groups with no upstream group.
    #[must_use]
    pub fn level(&self) -> usize {
        self.level
    }
}
