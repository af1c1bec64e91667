use mda_solvers::gauss_seidel;

use crate::GroupReport;

pub use gauss_seidel::Action;

/// Progress reported to a run observer.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A coupled group finished a Gauss-Seidel pass.
    Pass(gauss_seidel::Event),

    /// A group reached a terminal state.
    GroupFinished(GroupReport),
}
