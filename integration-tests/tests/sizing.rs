use approx::assert_relative_eq;
use integration_tests::general_aviation::{names::*, sizing_builder, touring_mission};
use mda_core::{CancelToken, Origin, Value};
use mda_engine::{GroupStatus, RunConfig, RunController, RunStatus};
use mda_observers::{ResidualHistory, TracingObserver};

fn controller(config: RunConfig) -> RunController {
    RunController::new(sizing_builder().build().unwrap(), config).unwrap()
}

#[test]
fn touring_mission_converges() {
    let result = controller(RunConfig::default()).run(&touring_mission()).unwrap();

    assert_eq!(result.status, RunStatus::Converged);
    assert_relative_eq!(result.scalar(MTOW).unwrap(), 906.65, max_relative = 1e-4);
    assert_relative_eq!(result.scalar(WING_AREA).unwrap(), 8.242, max_relative = 1e-3);
    assert_relative_eq!(result.scalar(STALL_SPEED).unwrap(), 33.18, max_relative = 1e-3);

    // The converged masses add up.
    let mass = |name: &str| result.scalar(name).unwrap();
    let breakdown =
        mass(STRUCTURE_MASS) + mass(ENGINE_MASS) + 80.0 + mass(PAYLOAD) + mass(MISSION_FUEL);
    assert_relative_eq!(mass(MTOW), breakdown, max_relative = 1e-5);

    let Some(Value::Array(chords)) = result.value(WING_CHORDS) else {
        panic!("chords should be an array");
    };
    assert_eq!(chords.len(), 3);
    assert!(chords[0] > chords[2]);

    assert_eq!(
        result.registry.origin(MTOW),
        Some(&Origin::Discipline("weight:aircraft".into()))
    );
    assert_eq!(result.registry.origin(ASPECT_RATIO), Some(&Origin::Default));
    assert_eq!(result.registry.origin(PAYLOAD), Some(&Origin::Design));
}

#[test]
fn sizing_loop_is_one_coupled_group() {
    let graph = sizing_builder().build().unwrap();

    assert_eq!(graph.groups().len(), 3);
    assert_eq!(
        graph.execution_order().collect::<Vec<_>>(),
        [
            "environment:atmosphere",
            "geometry:wing",
            "aerodynamics:cruise",
            "propulsion:engine",
            "performance:mission",
            "weight:aircraft",
            "handling:stall",
        ]
    );
    assert_eq!(graph.producer(MTOW), Some("weight:aircraft"));
    assert!(graph.external_inputs().iter().any(|name| name == CD0));

    let result = controller(RunConfig::default()).run(&touring_mission()).unwrap();
    let statuses: Vec<_> = result.groups.iter().map(|group| group.status).collect();
    assert_eq!(
        statuses,
        [GroupStatus::Computed, GroupStatus::Converged, GroupStatus::Computed]
    );
    let coupled = &result.groups[1];
    assert_eq!(coupled.members.len(), 5);
    assert!(coupled.iterations > 3 && coupled.iterations < 30);
    assert!(coupled.max_residual.unwrap() < 1e-6);
    assert!(coupled.residuals.contains_key(MTOW));
    // Outputs nothing in the loop reads still count towards convergence.
    assert!(coupled.residuals[STRUCTURE_MASS] < 1e-6);
}

#[test]
fn warm_start_speeds_up_a_perturbed_mission() {
    let mut controller = controller(RunConfig::default());
    let baseline = controller.run(&touring_mission()).unwrap();
    let heavier = touring_mission().with_unit(PAYLOAD, 365.0, "kg");

    let cold = controller.run(&heavier).unwrap();
    controller.set_warm_start(Some(baseline));
    let warm = controller.run(&heavier).unwrap();

    assert!(warm.is_converged());
    assert!(
        warm.total_iterations() < cold.total_iterations(),
        "warm {} vs cold {}",
        warm.total_iterations(),
        cold.total_iterations()
    );
    assert_relative_eq!(
        warm.scalar(MTOW).unwrap(),
        cold.scalar(MTOW).unwrap(),
        max_relative = 1e-5
    );
}

#[test]
fn parallel_and_sequential_runs_agree() {
    let sequential = controller(RunConfig::default()).run(&touring_mission()).unwrap();
    let parallel = controller(RunConfig {
        parallel: true,
        ..RunConfig::default()
    })
    .run(&touring_mission())
    .unwrap();

    assert_eq!(sequential.registry, parallel.registry);
    assert_eq!(sequential.groups, parallel.groups);
}

#[test]
fn residual_history_follows_the_loop() {
    let controller = controller(RunConfig::default());
    let mut history = ResidualHistory::new();

    let result = controller
        .run_observed(&touring_mission(), &CancelToken::new(), &mut history)
        .unwrap();

    let trace = history.trace(1);
    assert_eq!(trace.len(), result.groups[1].iterations);
    assert_eq!(history.iter().count(), 1);
    let first = trace.first().unwrap().max_residual;
    let last = trace.last().unwrap().max_residual;
    assert!(last < 1e-6 && last < first);
    assert_eq!(history.points(1).len(), trace.len());
}

#[test]
fn tracing_observer_never_interferes() {
    let controller = controller(RunConfig::default());
    let reference = controller.run(&touring_mission()).unwrap();

    let observed = controller
        .run_observed(&touring_mission(), &CancelToken::new(), TracingObserver::new())
        .unwrap();

    assert_eq!(observed.registry, reference.registry);
}

#[test]
fn cancelled_before_start_runs_nothing() {
    let controller = controller(RunConfig::default());
    let cancel = CancelToken::new();
    cancel.cancel();

    let result = controller.run_with_cancel(&touring_mission(), &cancel).unwrap();

    assert_eq!(result.status, RunStatus::Cancelled);
    assert_eq!(result.groups[0].status, GroupStatus::Cancelled);
    assert!(result.groups[1..].iter().all(|group| group.status == GroupStatus::Pending));
    assert_eq!(result.value(DENSITY), None);
    assert_eq!(result.scalar(PAYLOAD), Some(360.0));
}
