/// Event emitted by the Gauss-Seidel solver after each full pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Id of the group being solved.
    pub group: usize,

    /// Pass number, starting at 1.
    pub iteration: usize,

    /// Largest relative residual over the group's coupling variables.
    pub max_residual: f64,

    /// Variable with the largest relative residual.
    pub worst_variable: Option<String>,

    /// Largest absolute change of any coupling variable during the pass.
    pub max_change: f64,

    /// Relaxation factor applied during the pass.
    pub relaxation_factor: f64,
}
