/// Control actions supported by the Gauss-Seidel solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop iterating and return the state reached so far.
    StopEarly,
}
