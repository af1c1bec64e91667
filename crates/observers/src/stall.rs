use indexmap::IndexMap;
use mda_core::Observer;

use crate::traits::{CanStopEarly, HasPass};

/// Stops a solve once a group's residual has not improved for a number of passes.
///
/// The convergence driver's divergence guard only catches residuals that
/// blow up; a loop that stalls on a plateau would otherwise burn the whole
/// iteration budget.
#[derive(Debug, Clone)]
pub struct StallGuard {
    patience: usize,
    best: IndexMap<usize, (f64, usize)>,
}

impl StallGuard {
    /// Creates a guard that allows `patience` passes without a new best residual.
    #[must_use]
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            best: IndexMap::new(),
        }
    }
}

impl<E, A> Observer<E, A> for StallGuard
where
    E: HasPass,
    A: CanStopEarly,
{
    fn observe(&mut self, event: &E) -> Option<A> {
        let pass = event.pass()?;
        let (best, since) = self.best.entry(pass.group).or_insert((f64::INFINITY, 0));

        if pass.max_residual < *best {
            *best = pass.max_residual;
            *since = 0;
            return None;
        }

        *since += 1;
        if *since >= self.patience {
            tracing::warn!(group = pass.group, iteration = pass.iteration, "residual stalled");
            return Some(A::stop_early());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use mda_solvers::gauss_seidel::{Action, Event};

    fn pass(group: usize, iteration: usize, max_residual: f64) -> Event {
        Event {
            group,
            iteration,
            max_residual,
            worst_variable: None,
            max_change: 0.0,
            relaxation_factor: 1.0,
        }
    }

    #[test]
    fn stops_after_patience_passes_without_progress() {
        let mut guard = StallGuard::new(2);
        let residuals = [1.0, 0.5, 0.6, 0.55, 0.7];

        let actions: Vec<Option<Action>> = residuals
            .iter()
            .enumerate()
            .map(|(i, &r)| guard.observe(&pass(0, i + 1, r)))
            .collect();

        assert_eq!(actions, [None, None, None, Some(Action::StopEarly), Some(Action::StopEarly)]);
    }

    #[test]
    fn tracks_groups_independently() {
        let mut guard = StallGuard::new(1);

        let first: Option<Action> = guard.observe(&pass(0, 1, 0.5));
        let other: Option<Action> = guard.observe(&pass(1, 1, 0.9));
        let stalled: Option<Action> = guard.observe(&pass(0, 2, 0.5));

        assert_eq!((first, other, stalled), (None, None, Some(Action::StopEarly)));
    }
}
