//! Supervisor module tests.

mod runner_test;

/// Verify all public supervisor types are exported from the library.
#[test]
fn test_all_supervisor_types_exported() {
    use confd_sidecar::process::{ExitOutcome, LaunchSpec, ProcessRole, SignalKind};
    use confd_sidecar::supervisor::{
        resolve_exit_code, Action, Supervisor, SupervisorCore, SupervisorError, SupervisorEvent,
        SupervisorPhase, SupervisorStateMachine,
    };
    use confd_sidecar::watcher::{ChangeDebouncer, DEFAULT_SETTLE_WINDOW};

    let _ = Supervisor::new(LaunchSpec::new("confd"), LaunchSpec::new("nginx"));
    let _ = ChangeDebouncer::new(DEFAULT_SETTLE_WINDOW);
    let _ = SupervisorStateMachine::new();

    let core = SupervisorCore::new(DEFAULT_SETTLE_WINDOW, tokio::time::Instant::now());
    assert_eq!(core.phase(), SupervisorPhase::Settling);

    let _: fn(SupervisorError) -> i32 = |e| confd_sidecar::exit_code::for_supervisor_error(&e);
    let _ = SupervisorEvent::Exited {
        role: ProcessRole::Worker,
        outcome: ExitOutcome::Exited(0),
    };
    let _ = Action::Signal {
        role: ProcessRole::Worker,
        kind: SignalKind::Reload,
    };
    assert_eq!(resolve_exit_code(2, 0), 2);
}
