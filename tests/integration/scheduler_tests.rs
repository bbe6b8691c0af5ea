//! Automatic check scheduling against the mock registry.

use std::time::Duration;

use crossbeam_channel::unbounded;

use ucm_updater::updater::{AutoCheckScheduler, UpdateEvent};

use super::fixture::{REGISTRY_ASSETS, RegistryFixture};

#[test]
fn scheduler_reports_available_update_after_startup_delay() {
    let fixture = RegistryFixture::new();
    let latest = fixture.mock_latest(&fixture.release_json("v0.0.3", REGISTRY_ASSETS));
    let coordinator = fixture.coordinator("0.0.2");

    let (tx, rx) = unbounded();
    let scheduler = AutoCheckScheduler::spawn(coordinator, Duration::from_millis(50), move |event| {
        let _ = tx.send(event);
    })
    .unwrap();

    let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    match event {
        UpdateEvent::UpdateAvailable(info) => assert_eq!(info.tag, "v0.0.3"),
        other => panic!("unexpected event {other:?}"),
    }
    scheduler.stop();
    latest.assert_hits(1);
}

#[test]
fn up_to_date_is_silent() {
    let fixture = RegistryFixture::new();
    let latest = fixture.mock_latest(&fixture.release_json("v0.0.2", REGISTRY_ASSETS));
    let coordinator = fixture.coordinator("0.0.2");

    let (tx, rx) = unbounded();
    let sink = move |event| {
        let _ = tx.send(event);
    };
    let scheduler =
        AutoCheckScheduler::spawn(coordinator.clone(), Duration::from_millis(20), sink).unwrap();

    assert!(rx.recv_timeout(Duration::from_millis(600)).is_err());
    assert!(coordinator.last_check().is_some());
    drop(scheduler);
    latest.assert_hits(1);
}
