use std::sync::Arc;
use std::time::Duration;

use crate::config::Thresholds;
use crate::feed::SubscriberFeed;
use crate::probe::ProbeClient;
use crate::registry::{RegistryError, TargetRegistry};
use crate::support::{addr, settle, test_config, ScriptedProbe};

fn registry_with(probe: Arc<dyn ProbeClient>, thresholds: Thresholds) -> Arc<TargetRegistry> {
    let feed = Arc::new(SubscriberFeed::new(64));
    Arc::new(TargetRegistry::new(probe, &test_config(1000, thresholds), feed))
}

fn quiet_registry() -> Arc<TargetRegistry> {
    registry_with(Arc::new(ScriptedProbe::replies(1)), Thresholds::default())
}

#[tokio::test(start_paused = true)]
async fn duplicate_addresses_are_rejected() {
    // Arrange
    let registry = quiet_registry();
    registry.create("core switch", addr("10.0.0.1"), false).expect("first create");

    // Act
    let outcome = registry.create("imposter", addr("10.0.0.1"), false);

    // Assert
    assert!(matches!(outcome, Err(RegistryError::DuplicateAddress(_))));
    assert_eq!(registry.len(), 1, "registry size must be unchanged");
    assert_eq!(registry.list()[0].name, "core switch");
}

#[tokio::test(start_paused = true)]
async fn empty_display_names_are_rejected() {
    let registry = quiet_registry();

    assert!(matches!(
        registry.create("", addr("10.0.0.1"), false),
        Err(RegistryError::EmptyName)
    ));
    assert!(registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn remove_unknown_address_is_an_error() {
    let registry = quiet_registry();

    let outcome = registry.remove(addr("10.0.0.9")).await;

    assert!(matches!(outcome, Err(RegistryError::UnknownAddress(_))));
}

#[tokio::test(start_paused = true)]
async fn rename_updates_the_listing() {
    let registry = quiet_registry();
    registry.create("old name", addr("10.0.0.1"), false).expect("create");

    registry.rename(addr("10.0.0.1"), "new name").expect("rename");

    assert_eq!(registry.list()[0].name, "new name");
}

#[tokio::test(start_paused = true)]
async fn re_address_to_a_taken_address_leaves_both_targets_untouched() {
    // Arrange
    let probe = Arc::new(ScriptedProbe::timeouts());
    let registry = registry_with(Arc::clone(&probe) as Arc<dyn ProbeClient>, Thresholds::default());
    registry.create("alpha", addr("10.0.0.1"), false).expect("create alpha");
    registry.create("beta", addr("10.0.0.2"), false).expect("create beta");
    tokio::time::sleep(Duration::from_millis(2100)).await;
    let alpha_failures = registry.find(addr("10.0.0.1")).expect("alpha").timeout_failures();
    assert!(alpha_failures > 0);

    // Act
    let outcome = registry.re_address(addr("10.0.0.1"), addr("10.0.0.2")).await;

    // Assert
    assert!(matches!(outcome, Err(RegistryError::DuplicateAddress(_))));
    let listed = registry.list();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].address, addr("10.0.0.1"));
    assert_eq!(listed[1].address, addr("10.0.0.2"));
    assert_eq!(
        registry.find(addr("10.0.0.1")).expect("alpha").timeout_failures(),
        alpha_failures,
        "a rejected re-address must not disturb counters"
    );
}

#[tokio::test(start_paused = true)]
async fn re_address_preserves_name_and_graph_flag_but_resets_counters() {
    // Arrange
    let probe = Arc::new(ScriptedProbe::timeouts());
    let registry = registry_with(Arc::clone(&probe) as Arc<dyn ProbeClient>, Thresholds::default());
    registry.create("alpha", addr("10.0.0.1"), true).expect("create");
    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert!(registry.find(addr("10.0.0.1")).expect("alpha").timeout_failures() > 0);

    // Act
    registry.re_address(addr("10.0.0.1"), addr("10.0.0.7")).await.expect("re-address");
    settle().await;

    // Assert
    let listed = registry.list();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].address, addr("10.0.0.7"));
    assert_eq!(listed[0].name, "alpha");
    assert!(!listed[0].show_graph, "graph visibility must carry over");
    let moved = registry.find(addr("10.0.0.7")).expect("moved");
    assert_eq!(moved.timeout_failures(), 0, "counters start fresh at the new address");
    assert!(registry.find(addr("10.0.0.1")).is_none());
}

#[tokio::test(start_paused = true)]
async fn pause_then_resume_resets_counters_and_log() {
    // Arrange: a target that has been failing.
    let probe = Arc::new(ScriptedProbe::timeouts());
    let registry = registry_with(Arc::clone(&probe) as Arc<dyn ProbeClient>, Thresholds::default());
    registry.create("flaky", addr("10.0.0.1"), false).expect("create");
    tokio::time::sleep(Duration::from_millis(3100)).await;
    let handle = registry.find(addr("10.0.0.1")).expect("handle");
    assert!(handle.timeout_failures() >= 3);

    // Act
    registry.pause(addr("10.0.0.1")).await.expect("pause");
    settle().await;

    // Assert
    assert!(handle.is_paused());
    assert_eq!(handle.timeout_failures(), 0);
    assert_eq!(handle.warning_failures(), 0);
    assert_eq!(handle.last_lines(10), vec!["Ping check paused".to_string()]);

    registry.resume(addr("10.0.0.1")).await.expect("resume");
    settle().await;
    assert!(!handle.is_paused());
    assert_eq!(handle.consecutive_ok(), 1, "resume restarts the success streak");
}

#[tokio::test(start_paused = true)]
async fn pause_all_and_resume_all_cover_every_target() {
    let registry = quiet_registry();
    registry.create("one", addr("10.0.0.1"), false).expect("create");
    registry.create("two", addr("10.0.0.2"), false).expect("create");

    registry.pause_all().await;
    settle().await;
    assert!(registry.handles().iter().all(|h| h.is_paused()));

    registry.resume_all().await;
    settle().await;
    assert!(registry.handles().iter().all(|h| !h.is_paused()));
}

#[tokio::test(start_paused = true)]
async fn snapshot_and_restore_round_trip() {
    // Arrange
    let thresholds = Thresholds {
        warning_ms: 150,
        timeout_ms: 900,
        sound_timeout_count: 7,
        chat_timeout_count: 4,
        notification_enabled: true,
        ..Thresholds::default()
    };
    let source = registry_with(Arc::new(ScriptedProbe::replies(1)), thresholds);
    source.create("alpha", addr("10.0.0.1"), false).expect("create");
    source.create("beta", addr("10.0.0.2"), true).expect("create");
    source.set_graph_height(140);

    // Act
    let snapshot = source.snapshot();
    let copy = quiet_registry();
    copy.restore(&snapshot).await;

    // Assert
    let listed = copy.list();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].name, "alpha");
    assert!(listed[0].show_graph);
    assert_eq!(listed[1].name, "beta");
    assert!(!listed[1].show_graph);
    let restored = copy.thresholds();
    assert_eq!(restored.warning_ms, 150);
    assert_eq!(restored.timeout_ms, 900);
    assert_eq!(restored.sound_timeout_count, 7);
    assert_eq!(restored.chat_timeout_count, 4);
    assert!(restored.notification_enabled);
    assert_eq!(copy.graph_height(), 140);
}

#[tokio::test(start_paused = true)]
async fn restore_clears_previous_targets_and_skips_bad_elements() {
    // Arrange
    let registry = quiet_registry();
    registry.create("stale", addr("10.0.0.200"), false).expect("create");

    let mut snapshot = quiet_registry().snapshot();
    snapshot.ping_elements = vec![
        crate::project::ProjectElement {
            address: "not-an-address".to_string(),
            name: "broken".to_string(),
            graph_hidden: false,
        },
        crate::project::ProjectElement {
            address: "10.0.0.5".to_string(),
            name: "kept".to_string(),
            graph_hidden: false,
        },
    ];

    // Act
    registry.restore(&snapshot).await;

    // Assert
    let listed = registry.list();
    assert_eq!(listed.len(), 1, "invalid elements are skipped, old targets are gone");
    assert_eq!(listed[0].name, "kept");
    assert_eq!(listed[0].address, addr("10.0.0.5"));
}
