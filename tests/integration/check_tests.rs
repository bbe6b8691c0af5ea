//! Update check behavior against the mock registry.

use std::time::Duration;

use httpmock::prelude::*;

use ucm_updater::UpdateError;
use ucm_updater::updater::{
    CheckTrigger, ClientOptions, GitHubClient, ReleaseRegistry, UpdateCheckResult,
};

use super::fixture::{LATEST_PATH, REGISTRY_ASSETS, RegistryFixture};

#[test]
fn newer_release_is_update_available() {
    let fixture = RegistryFixture::new();
    let latest = fixture.mock_latest(&fixture.release_json("v0.0.3", REGISTRY_ASSETS));
    let coordinator = fixture.coordinator("0.0.2");

    match coordinator.check_now() {
        UpdateCheckResult::UpdateAvailable(info) => {
            assert_eq!(info.version.to_string(), "0.0.3");
            assert_eq!(info.tag, "v0.0.3");
            assert_eq!(info.assets.len(), REGISTRY_ASSETS.len());
            assert!(info.published_at.is_some());
        }
        other => panic!("expected update, got {other:?}"),
    }
    latest.assert();
}

#[test]
fn same_version_is_up_to_date() {
    let fixture = RegistryFixture::new();
    fixture.mock_latest(&fixture.release_json("v0.0.2", REGISTRY_ASSETS));
    let coordinator = fixture.coordinator("0.0.2");

    assert!(matches!(coordinator.check_now(), UpdateCheckResult::UpToDate));
}

#[test]
fn older_remote_is_up_to_date() {
    let fixture = RegistryFixture::new();
    fixture.mock_latest(&fixture.release_json("v0.0.1", REGISTRY_ASSETS));
    let coordinator = fixture.coordinator("0.0.2");

    assert!(matches!(coordinator.check_now(), UpdateCheckResult::UpToDate));
}

#[test]
fn pre_release_suffix_is_ignored_for_comparison() {
    let fixture = RegistryFixture::new();
    fixture.mock_latest(&fixture.release_json("v1.2.0-beta.1", REGISTRY_ASSETS));
    let coordinator = fixture.coordinator("1.2.0");

    assert!(matches!(coordinator.check_now(), UpdateCheckResult::UpToDate));
}

#[test]
fn non_version_tag_is_malformed_version() {
    let fixture = RegistryFixture::new();
    fixture.mock_latest(&fixture.release_json("nightly", REGISTRY_ASSETS));
    let coordinator = fixture.coordinator("0.0.2");

    let result = coordinator.check_now();
    assert!(matches!(result.error(), Some(UpdateError::MalformedVersion(_))));
}

#[test]
fn malformed_current_version_fails_the_check() {
    let fixture = RegistryFixture::new();
    fixture.mock_latest(&fixture.release_json("v0.0.3", REGISTRY_ASSETS));
    let coordinator = fixture.coordinator("dev-build");

    let result = coordinator.check_now();
    assert!(matches!(result.error(), Some(UpdateError::MalformedVersion(_))));
}

#[test]
fn html_body_is_malformed_response() {
    let fixture = RegistryFixture::new();
    fixture.server.mock(|when, then| {
        when.method(GET).path(LATEST_PATH);
        then.status(200).body("<html>maintenance</html>");
    });
    let coordinator = fixture.coordinator("0.0.2");

    let result = coordinator.check_now();
    assert!(matches!(result.error(), Some(UpdateError::MalformedResponse(_))));
    assert_eq!(result.user_message(), "Unable to determine update status.");
}

#[test]
fn missing_assets_is_malformed_response() {
    let fixture = RegistryFixture::new();
    fixture.server.mock(|when, then| {
        when.method(GET).path(LATEST_PATH);
        then.status(200)
            .json_body(serde_json::json!({ "tag_name": "v0.0.3", "name": "x" }));
    });
    let coordinator = fixture.coordinator("0.0.2");

    assert!(matches!(
        coordinator.check_now().error(),
        Some(UpdateError::MalformedResponse(_))
    ));
}

#[test]
fn server_error_is_network_failure() {
    let fixture = RegistryFixture::new();
    fixture.server.mock(|when, then| {
        when.method(GET).path(LATEST_PATH);
        then.status(502);
    });
    let coordinator = fixture.coordinator("0.0.2");

    let result = coordinator.check_now();
    match result.error() {
        Some(UpdateError::Network(msg)) => assert!(msg.contains("502"), "{msg}"),
        other => panic!("expected network error, got {other:?}"),
    }
}

#[test]
fn slow_registry_times_out() {
    let fixture = RegistryFixture::new();
    fixture.server.mock(|when, then| {
        when.method(GET).path(LATEST_PATH);
        then.status(200).delay(Duration::from_secs(3)).body("{}");
    });
    let client = GitHubClient::new(
        "uci/cluster-manager",
        ClientOptions {
            api_base: fixture.server.base_url(),
            timeout: Duration::from_millis(300),
            download_timeout: Duration::from_millis(300),
            token: None,
        },
    )
    .unwrap();

    assert!(matches!(client.fetch_latest(), Err(UpdateError::Network(_))));
}

#[test]
fn token_is_sent_as_bearer_auth() {
    let fixture = RegistryFixture::new();
    let release = fixture.release_json("v0.0.3", REGISTRY_ASSETS);
    let authed = fixture.server.mock(|when, then| {
        when.method(GET)
            .path(LATEST_PATH)
            .header("authorization", "Bearer s3cret")
            .header("accept", "application/vnd.github+json");
        then.status(200).json_body(release);
    });
    let client = GitHubClient::new(
        "https://github.com/uci/cluster-manager.git",
        ClientOptions {
            api_base: fixture.server.base_url(),
            token: Some("s3cret".to_string()),
            ..ClientOptions::default()
        },
    )
    .unwrap();

    let info = client.fetch_latest().unwrap();
    assert_eq!(info.tag, "v0.0.3");
    authed.assert();
}

#[test]
fn concurrent_requests_share_one_registry_query() {
    let fixture = RegistryFixture::new();
    let release = fixture.release_json("v0.0.3", REGISTRY_ASSETS);
    let latest = fixture.server.mock(|when, then| {
        when.method(GET).path(LATEST_PATH);
        then.status(200)
            .delay(Duration::from_millis(400))
            .json_body(release);
    });
    let coordinator = fixture.coordinator("0.0.2");

    let first = coordinator.request_check(CheckTrigger::Manual).unwrap();
    let second = coordinator.request_check(CheckTrigger::Manual).unwrap();
    let third = coordinator.request_check(CheckTrigger::Automatic).unwrap();
    assert!(coordinator.is_checking());

    let results = [first.wait(), second.wait(), third.wait()];
    for result in &results {
        assert!(result.is_update_available());
    }
    assert_eq!(results[0].release(), results[1].release());
    latest.assert_hits(1);
}

#[test]
fn automatic_checks_are_throttled_but_manual_ones_are_not() {
    let fixture = RegistryFixture::new();
    let latest = fixture.mock_latest(&fixture.release_json("v0.0.2", REGISTRY_ASSETS));
    let coordinator = fixture.coordinator("0.0.2");

    assert!(coordinator.automatic_check_due());
    let _ = coordinator.request_check(CheckTrigger::Automatic).unwrap().wait();
    assert!(coordinator.last_check().is_some());
    assert!(!coordinator.automatic_check_due());
    assert!(coordinator.request_check(CheckTrigger::Automatic).is_none());

    let _ = coordinator.request_check(CheckTrigger::Manual).unwrap().wait();
    latest.assert_hits(2);
}

#[test]
fn failed_check_still_records_completion() {
    let fixture = RegistryFixture::new();
    fixture.server.mock(|when, then| {
        when.method(GET).path(LATEST_PATH);
        then.status(500);
    });
    let coordinator = fixture.coordinator("0.0.2");

    assert!(coordinator.check_now().error().is_some());
    assert!(coordinator.last_check().is_some());
    assert!(coordinator.request_check(CheckTrigger::Automatic).is_none());
}

#[test]
fn unreachable_registry_is_network_failure() {
    // Port 9 on localhost is not served by the mock.
    let client = GitHubClient::new(
        "uci/cluster-manager",
        ClientOptions {
            api_base: "http://127.0.0.1:9".to_string(),
            timeout: Duration::from_secs(2),
            download_timeout: Duration::from_secs(2),
            token: None,
        },
    )
    .unwrap();

    assert!(matches!(client.fetch_latest(), Err(UpdateError::Network(_))));
}
