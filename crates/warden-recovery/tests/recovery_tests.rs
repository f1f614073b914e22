use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use warden_recovery::{
    ErrorBus, FallbackKind, GuardPhase, GuardView, RecoveryConfig, RecoveryError, RecoveryGuard,
    Remedy,
};
use warden_store::{Classification, DiagnosticStore, RecoveryAttempt};
use warden_test_utils::{
    bypass_at, generic_error, interference_error, memory_store, redacted_error, HostAction,
    RecordingHost,
};

const DELAY: Duration = Duration::from_millis(1_000);

fn config() -> RecoveryConfig {
    RecoveryConfig::new()
        .with_max_attempts(3)
        .with_retry_delay(DELAY)
        .with_rerender_attempts(2)
        .with_safe_path("/safe")
        .with_watchdog_deadline(Duration::from_secs(10))
}

fn mount(store: &Arc<DiagnosticStore>, host: &Arc<RecordingHost>, url: &str) -> RecoveryGuard {
    RecoveryGuard::mount("root", config(), store.clone(), bypass_at(store, url), host.clone())
        .unwrap()
}

async fn past_delay() {
    tokio::time::sleep(DELAY + Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn interference_rerenders_then_navigates_then_escalates() {
    let store = memory_store();
    let host = RecordingHost::new();
    let guard = mount(&store, &host, "/gallery");

    for attempt in 1..=2 {
        assert_eq!(guard.catch_error(interference_error()).unwrap(), GuardPhase::Recovering);
        assert_eq!(
            guard.view(),
            GuardView::Recovering {
                attempt,
                max_attempts: 3
            }
        );
        past_delay().await;
        assert_eq!(guard.phase(), GuardPhase::Idle);
    }
    assert_eq!(guard.catch_error(redacted_error()).unwrap(), GuardPhase::Recovering);
    past_delay().await;

    assert_eq!(
        host.actions(),
        vec![
            HostAction::Rerender("root".into()),
            HostAction::Rerender("root".into()),
            HostAction::Navigate("/safe".into()),
        ]
    );

    // navigation is a full load: fresh guard, same identity
    guard.unmount();
    let guard = mount(&store, &host, "/safe");
    assert_eq!(guard.attempt(), 3);

    assert_eq!(guard.catch_error(interference_error()).unwrap(), GuardPhase::Fallback);
    match guard.view() {
        GuardView::Fallback {
            kind,
            remedies,
            diagnostics,
            ..
        } => {
            assert_eq!(kind, FallbackKind::Escalated);
            assert_eq!(
                remedies,
                vec![Remedy::Reload, Remedy::ClearAndReload, Remedy::NavigateHome]
            );
            assert!(diagnostics.is_some());
        }
        other => panic!("expected fallback, got {other:?}"),
    }

    // no further automatic action
    host.clear();
    assert_eq!(guard.catch_error(interference_error()).unwrap(), GuardPhase::Fallback);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(host.actions().is_empty());
    assert_eq!(guard.suppressed_errors(), 1);

    // bypass is scoped to the route that failed, not the one escalation ran on
    let flag = store.bypass_flag();
    assert!(flag.covers("/gallery"));
    assert!(flag.covers("/gallery/42"));
    assert!(!flag.covers("/safe"));
    assert!(!flag.covers("/admin"));
    assert_eq!(store.load_attempt("root").unwrap().route, "/gallery");
}

#[tokio::test(start_paused = true)]
async fn escalation_never_bypasses_recovery_routes() {
    for route in ["/safe", "/"] {
        let store = memory_store();
        let host = RecordingHost::new();
        let guard = RecoveryGuard::mount(
            "root",
            config().with_max_attempts(0),
            store.clone(),
            bypass_at(&store, route),
            host.clone(),
        )
        .unwrap();

        assert_eq!(guard.catch_error(interference_error()).unwrap(), GuardPhase::Fallback);
        assert!(!store.bypass_flag().enabled, "route {route} was escalated");
    }
}

#[tokio::test(start_paused = true)]
async fn fresh_mount_resumes_persisted_attempt() {
    let store = memory_store();
    let host = RecordingHost::new();
    let mut record = RecoveryAttempt::open("root", Classification::Interference);
    record.attempt_number = 2;
    store.save_attempt(&record);

    let guard = mount(&store, &host, "/gallery");
    assert_eq!(guard.attempt(), 2);
    assert!(guard.watchdog_armed());

    guard.catch_error(interference_error()).unwrap();
    assert_eq!(guard.attempt(), 3);
    let persisted = store.load_attempt("root").unwrap();
    assert_eq!(persisted.attempt_number, 3);
    assert_eq!(persisted.incident_id, record.incident_id);

    past_delay().await;
    assert_eq!(host.actions(), vec![HostAction::Navigate("/safe".into())]);
}

#[tokio::test(start_paused = true)]
async fn generic_error_goes_straight_to_manual_retry() {
    let store = memory_store();
    let host = RecordingHost::new();
    let guard = mount(&store, &host, "/gallery");

    assert_eq!(guard.catch_error(generic_error()).unwrap(), GuardPhase::Fallback);
    assert_eq!(
        guard.view(),
        GuardView::Fallback {
            kind: FallbackKind::Generic,
            message: Some("TypeError: cannot read property 'x' of undefined".into()),
            remedies: vec![Remedy::Retry],
            diagnostics: None,
        }
    );
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(host.actions().is_empty());
    assert!(store.load_attempt("root").is_none());
    assert_eq!(store.error_counter("generic"), 1);

    assert_eq!(
        guard.apply_remedy(Remedy::Reload),
        Err(RecoveryError::RemedyUnavailable(Remedy::Reload))
    );
    guard.apply_remedy(Remedy::Retry).unwrap();
    assert_eq!(guard.phase(), GuardPhase::Idle);
    assert_eq!(host.actions(), vec![HostAction::Rerender("root".into())]);
}

#[tokio::test(start_paused = true)]
async fn errors_during_recovery_are_counted_and_dropped() {
    let store = memory_store();
    let host = RecordingHost::new();
    let guard = mount(&store, &host, "/gallery");

    guard.catch_error(interference_error()).unwrap();
    guard.catch_error(interference_error()).unwrap();
    guard.catch_error(generic_error()).unwrap();
    assert_eq!(guard.attempt(), 1);
    assert_eq!(guard.suppressed_errors(), 2);
    assert_eq!(store.error_counter("suppressed"), 2);

    past_delay().await;
    assert_eq!(host.rerenders(), 1);
}

#[tokio::test(start_paused = true)]
async fn unmount_cancels_pending_action_and_watchdog() {
    let store = memory_store();
    let host = RecordingHost::new();
    let guard = mount(&store, &host, "/gallery");

    guard.catch_error(interference_error()).unwrap();
    assert!(guard.watchdog_armed());
    guard.unmount();
    assert!(!guard.watchdog_armed());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(host.actions().is_empty());
    assert_eq!(
        guard.catch_error(interference_error()),
        Err(RecoveryError::NotMounted("root".into()))
    );
    // the incident survives for the next mount
    assert_eq!(store.load_attempt("root").unwrap().attempt_number, 1);
}

#[tokio::test(start_paused = true)]
async fn watchdog_shows_still_trying_without_counting_an_attempt() {
    let store = memory_store();
    let host = RecordingHost::new();
    let guard = RecoveryGuard::mount(
        "root",
        config().with_retry_delay(Duration::from_secs(30)),
        store.clone(),
        bypass_at(&store, "/gallery"),
        host.clone(),
    )
    .unwrap();
    assert!(!guard.watchdog_armed());

    guard.catch_error(interference_error()).unwrap();
    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(guard.view(), GuardView::StillTrying { attempt: 1 });
    assert_eq!(guard.attempt(), 1);

    tokio::time::sleep(Duration::from_secs(20)).await;
    guard.mark_ready();
    assert_eq!(guard.view(), GuardView::Children);
    assert!(store.load_attempt("root").is_none());
}

#[tokio::test(start_paused = true)]
async fn mark_ready_closes_incident() {
    let store = memory_store();
    let host = RecordingHost::new();
    let guard = mount(&store, &host, "/gallery");

    guard.catch_error(interference_error()).unwrap();
    past_delay().await;
    guard.mark_ready();
    assert!(guard.incident().is_none());
    assert!(store.load_attempt("root").is_none());

    // a later error opens a new incident from zero
    guard.catch_error(interference_error()).unwrap();
    assert_eq!(guard.attempt(), 1);
}

#[tokio::test(start_paused = true)]
async fn escalated_remedies_end_the_incident() {
    let store = memory_store();
    let host = RecordingHost::new();
    let guard = RecoveryGuard::mount(
        "root",
        config().with_max_attempts(0).with_auto_bypass(false),
        store.clone(),
        bypass_at(&store, "/gallery"),
        host.clone(),
    )
    .unwrap();

    assert_eq!(guard.catch_error(interference_error()).unwrap(), GuardPhase::Fallback);
    assert!(!store.bypass_flag().enabled);

    guard.apply_remedy(Remedy::NavigateHome).unwrap();
    assert_eq!(host.actions(), vec![HostAction::Navigate("/".into())]);
    assert!(store.load_attempt("root").is_none());
    assert_eq!(guard.phase(), GuardPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn nested_guards_keep_separate_incidents() {
    let store = memory_store();
    let host = RecordingHost::new();
    let outer = mount(&store, &host, "/gallery");
    let inner = RecoveryGuard::mount(
        "gallery-grid",
        config(),
        store.clone(),
        bypass_at(&store, "/gallery"),
        host.clone(),
    )
    .unwrap();

    inner.catch_error(interference_error()).unwrap();
    assert_eq!(inner.attempt(), 1);
    assert_eq!(outer.attempt(), 0);
    past_delay().await;
    assert_eq!(host.actions(), vec![HostAction::Rerender("gallery-grid".into())]);
}

#[tokio::test(start_paused = true)]
async fn listening_guard_receives_unhandled_errors() {
    let store = memory_store();
    let host = RecordingHost::new();
    let guard = mount(&store, &host, "/gallery");
    let bus = ErrorBus::default();
    guard.listen(&bus);

    assert_eq!(bus.publish(redacted_error()), 1);
    tokio::task::yield_now().await;
    assert_eq!(guard.phase(), GuardPhase::Recovering);

    guard.unmount();
    tokio::task::yield_now().await;
    assert_eq!(bus.listener_count(), 0);
}

proptest! {
    #[test]
    fn prop_attempts_never_exceed_ceiling(
        max in 0u32..5,
        events in proptest::collection::vec(any::<(bool, bool)>(), 1..30)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        runtime.block_on(async {
            let store = memory_store();
            let host = RecordingHost::new();
            let cfg = config().with_max_attempts(max);
            let mount = || {
                RecoveryGuard::mount("root", cfg.clone(), store.clone(), bypass_at(&store, "/"), host.clone())
                    .unwrap()
            };
            let mut guard = mount();
            for (interference, reload) in events {
                let error = if interference { interference_error() } else { generic_error() };
                let _ = guard.catch_error(error);
                past_delay().await;
                if reload {
                    guard.unmount();
                    guard = mount();
                }
                let automatic = host
                    .actions()
                    .iter()
                    .filter(|a| !matches!(a, HostAction::Reload))
                    .count();
                assert!(automatic as u32 <= max, "{automatic} automatic actions with ceiling {max}");
                assert!(guard.attempt() <= max);
            }
        });
    }
}
