//! Scheduling of cycle groups.
//!
//! Groups run strictly in topological order, so a group only starts once
//! every upstream group has reached a terminal state. In parallel mode the
//! groups of one topological level run concurrently, each on a private clone
//! of the registry; a group's outputs are merged back at the level barrier.
//!
//! The registry is snapshotted before each group. A group that fails or is
//! cancelled is rolled back to that snapshot, leaving the registry as the
//! last completed group left it.

use std::{panic, thread};

use mda_core::{CancelToken, CycleGroup, DependencyGraph, Observer, Origin, Registry};
use mda_solvers::{
    gauss_seidel::{self, Config},
    invoke::invoke,
};

use crate::{Action, Event, GroupReport, GroupStatus};

/// Reports of every group, in execution order, and the first failure.
#[derive(Debug)]
pub(crate) struct Drive {
    pub(crate) reports: Vec<GroupReport>,
    pub(crate) failure: Option<gauss_seidel::Error>,
    /// Set when the observer stopped the run between groups.
    pub(crate) interrupted: bool,
}

type Finished = (GroupReport, Option<gauss_seidel::Error>);

pub(crate) fn drive<Obs>(
    graph: &DependencyGraph,
    registry: &mut Registry,
    config: &Config,
    parallel: bool,
    cancel: &CancelToken,
    mut observer: Obs,
) -> Drive
where
    Obs: Observer<Event, Action>,
{
    let batches: Vec<&[usize]> = if parallel {
        graph.levels().iter().map(Vec::as_slice).collect()
    } else {
        graph.order().chunks(1).collect()
    };

    let mut reports: Vec<Option<GroupReport>> = vec![None; graph.groups().len()];
    let mut failure = None;
    let mut interrupted = false;

    for batch in batches {
        let (finished, stopped) = if let [id] = batch {
            let group = &graph.groups()[*id];
            let finished = run_group(graph, group, registry, config, cancel, |event: &gauss_seidel::Event| {
                observer.observe(&Event::Pass(event.clone()))
            });
            (vec![finished], false)
        } else {
            run_level(graph, batch, registry, config, cancel, &mut observer)
        };
        interrupted |= stopped;

        let mut halt = stopped;
        for (report, error) in finished {
            log_finished(&report);
            if let Some(Action::StopEarly) = observer.observe(&Event::GroupFinished(report.clone())) {
                interrupted = true;
                halt = true;
            }
            halt |= !report.status.is_terminal();
            if let Some(error) = error {
                failure.get_or_insert(error);
            }
            let id = report.id;
            reports[id] = Some(report);
        }

        if halt {
            break;
        }
    }

    let reports = graph
        .order()
        .iter()
        .map(|&id| {
            reports[id]
                .take()
                .unwrap_or_else(|| blank_report(graph, &graph.groups()[id]))
        })
        .collect();

    Drive {
        reports,
        failure,
        interrupted,
    }
}

/// Runs the groups of one topological level on scoped worker threads.
///
/// Solver events are buffered per worker and replayed to the observer in
/// group order once the level is done; a stop request therefore takes effect
/// at the next level.
fn run_level<Obs>(
    graph: &DependencyGraph,
    batch: &[usize],
    registry: &mut Registry,
    config: &Config,
    cancel: &CancelToken,
    observer: &mut Obs,
) -> (Vec<Finished>, bool)
where
    Obs: Observer<Event, Action>,
{
    let shared: &Registry = registry;
    let outcomes: Vec<_> = thread::scope(|scope| {
        let workers: Vec<_> = batch
            .iter()
            .map(|&id| {
                let group = &graph.groups()[id];
                let mut partition = shared.clone();
                scope.spawn(move || {
                    let mut events = Vec::new();
                    let finished = run_group(
                        graph,
                        group,
                        &mut partition,
                        config,
                        cancel,
                        |event: &gauss_seidel::Event| -> Option<Action> {
                            events.push(event.clone());
                            None
                        },
                    );
                    (group, finished, partition, events)
                })
            })
            .collect();

        workers
            .into_iter()
            .map(|worker| {
                worker
                    .join()
                    .unwrap_or_else(|payload| panic::resume_unwind(payload))
            })
            .collect()
    });

    let mut stopped = false;
    let finished = outcomes
        .into_iter()
        .map(|(group, (mut report, mut error), partition, events)| {
            for event in events {
                if let Some(Action::StopEarly) = observer.observe(&Event::Pass(event)) {
                    stopped = true;
                }
            }
            if report.status.is_terminal() {
                let outputs = group.outputs().iter().map(String::as_str);
                if let Err(merge) = registry.merge_from(&partition, outputs) {
                    report.status = GroupStatus::Failed;
                    error = Some(merge.into());
                }
            }
            (report, error)
        })
        .collect();

    (finished, stopped)
}

/// Runs one group, rolling the registry back unless it reaches a terminal state.
fn run_group<Obs>(
    graph: &DependencyGraph,
    group: &CycleGroup,
    registry: &mut Registry,
    config: &Config,
    cancel: &CancelToken,
    observer: Obs,
) -> Finished
where
    Obs: Observer<gauss_seidel::Event, Action>,
{
    let mut report = blank_report(graph, group);
    let snapshot = registry.snapshot();

    let result = if group.is_coupled() {
        gauss_seidel::solve(graph, group, registry, config, cancel, observer)
            .map(|solution| report.record(solution))
    } else {
        evaluate(graph, group, registry, config, cancel).map(|computed| {
            if computed {
                report.status = GroupStatus::Computed;
                report.iterations = 1;
            } else {
                report.status = GroupStatus::Cancelled;
            }
        })
    };

    let error = match result {
        Ok(()) if report.status.is_terminal() => return (report, None),
        Ok(()) => None,
        Err(error) => {
            report.status = GroupStatus::Failed;
            Some(error)
        }
    };

    if let Err(restore) = registry.restore(&snapshot) {
        report.status = GroupStatus::Failed;
        return (report, error.or(Some(restore.into())));
    }
    (report, error)
}

/// Invokes the members of a trivial group once; `false` if cancelled first.
fn evaluate(
    graph: &DependencyGraph,
    group: &CycleGroup,
    registry: &mut Registry,
    config: &Config,
    cancel: &CancelToken,
) -> Result<bool, gauss_seidel::Error> {
    for &member in group.members() {
        if cancel.is_cancelled() {
            return Ok(false);
        }
        let discipline = graph.discipline(member);
        let outputs = invoke(discipline, registry, config.unit_timeout)?;
        let origin = Origin::Discipline(discipline.name().to_string());
        for (name, value) in outputs {
            registry.set(&name, value, origin.clone())?;
        }
    }
    Ok(true)
}

fn blank_report(graph: &DependencyGraph, group: &CycleGroup) -> GroupReport {
    let members = graph
        .member_names(group)
        .into_iter()
        .map(ToString::to_string)
        .collect();
    GroupReport::pending(group.id(), members, group.is_coupled())
}

fn log_finished(report: &GroupReport) {
    match report.status {
        GroupStatus::Computed | GroupStatus::Converged => tracing::info!(
            group = report.id,
            status = %report.status,
            iterations = report.iterations,
            "group finished"
        ),
        GroupStatus::Failed => tracing::warn!(group = report.id, "group failed"),
        _ => tracing::warn!(
            group = report.id,
            status = %report.status,
            iterations = report.iterations,
            worst = report.worst_variable.as_deref().unwrap_or("-"),
            max_residual = report.max_residual.unwrap_or(f64::NAN),
            "group did not converge"
        ),
    }
}
