use mda_core::Observer;
use mda_engine::{Event as RunEvent, GroupStatus};
use mda_solvers::gauss_seidel;

/// An observer that forwards progress to `tracing`.
///
/// Passes are logged at `DEBUG`, finished groups at `INFO`, and groups that
/// end without converging at `WARN`. It never steers the solver.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver {
    passes: usize,
}

impl TracingObserver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of passes logged so far.
    #[must_use]
    pub fn passes(&self) -> usize {
        self.passes
    }

    fn pass(&mut self, event: &gauss_seidel::Event) {
        self.passes += 1;
        tracing::debug!(
            group = event.group,
            iteration = event.iteration,
            max_residual = event.max_residual,
            worst = event.worst_variable.as_deref().unwrap_or("-"),
            relaxation = event.relaxation_factor,
            "pass"
        );
    }
}

impl<A> Observer<gauss_seidel::Event, A> for TracingObserver {
    fn observe(&mut self, event: &gauss_seidel::Event) -> Option<A> {
        self.pass(event);
        None
    }
}

impl<A> Observer<RunEvent, A> for TracingObserver {
    fn observe(&mut self, event: &RunEvent) -> Option<A> {
        match event {
            RunEvent::Pass(pass) => self.pass(pass),
            RunEvent::GroupFinished(report) => match report.status {
                GroupStatus::Computed | GroupStatus::Converged => tracing::info!(
                    group = report.id,
                    members = %report.members.join(", "),
                    iterations = report.iterations,
                    "group {}",
                    report.status
                ),
                _ => tracing::warn!("{}", report.describe()),
            },
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_passes_without_steering() {
        let mut observer = TracingObserver::new();
        let event = gauss_seidel::Event {
            group: 0,
            iteration: 1,
            max_residual: 1.0,
            worst_variable: None,
            max_change: 1.0,
            relaxation_factor: 1.0,
        };

        let action: Option<gauss_seidel::Action> = observer.observe(&event);
        assert_eq!(action, None);
        let action: Option<gauss_seidel::Action> = observer.observe(&RunEvent::Pass(event));
        assert_eq!(action, None);
        assert_eq!(observer.passes(), 2);
    }
}
