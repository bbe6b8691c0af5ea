//! Asset download, verification and cleanup.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use httpmock::prelude::*;

use ucm_updater::UpdateError;
use ucm_updater::updater::{CancelToken, DownloadOptions, UpdateCheckResult};

use super::fixture::{RegistryFixture, sha256_hex};

const DEB: &str = "uci-clustermanager_0.0.3_amd64.deb";
const RPM: &str = "uci-clustermanager-0.0.3.x86_64.rpm";
const PAYLOAD: &[u8] = b"!<arch>\ndebian-binary   fake package payload\n";

fn options(fixture: &RegistryFixture) -> DownloadOptions {
    DownloadOptions::new().with_download_dir(fixture.download_root.path())
}

#[test]
fn downloads_platform_asset_and_verifies_checksum() {
    let fixture = RegistryFixture::new();
    let release = fixture.release_json("v0.0.3", &[RPM, DEB, "SHA256SUMS"]);
    fixture.mock_latest(&release);
    let deb = fixture.mock_asset(DEB, PAYLOAD);
    let rpm = fixture.mock_asset(RPM, b"rpm");
    let sums = format!("{}  {DEB}\n{}  {RPM}\n", sha256_hex(PAYLOAD), sha256_hex(b"rpm"));
    fixture.mock_asset("SHA256SUMS", sums.as_bytes());

    let coordinator = fixture.coordinator("0.0.2");
    let UpdateCheckResult::UpdateAvailable(info) = coordinator.check_now() else {
        panic!("expected an update");
    };

    let received = Arc::new(AtomicU64::new(0));
    let seen = Arc::clone(&received);
    let update = coordinator
        .download_update(
            &info,
            &options(&fixture).with_progress(move |p| seen.store(p.received, Ordering::SeqCst)),
        )
        .unwrap();

    assert_eq!(update.asset().name, DEB);
    assert!(update.checksum_verified());
    assert_eq!(update.sha256(), sha256_hex(PAYLOAD));
    assert_eq!(std::fs::read(update.path()).unwrap(), PAYLOAD);
    assert_eq!(received.load(Ordering::SeqCst), PAYLOAD.len() as u64);
    deb.assert_hits(1);
    rpm.assert_hits(0);

    let dir = update.path().parent().unwrap().to_path_buf();
    assert!(
        dir.file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("ucm-update-")
    );
    drop(update);
    assert!(!dir.exists());
    assert_eq!(fixture.leftover_entries(), 0);
}

#[test]
fn kept_download_survives_drop() {
    let fixture = RegistryFixture::new();
    let release = fixture.release_json("v0.0.3", &[DEB]);
    fixture.mock_latest(&release);
    fixture.mock_asset(DEB, PAYLOAD);

    let coordinator = fixture.coordinator("0.0.2");
    let info = coordinator.check_now().release().cloned().unwrap();
    let update = coordinator.download_update(&info, &options(&fixture)).unwrap();
    assert!(!update.checksum_verified());

    let path = update.keep();
    assert!(path.exists());
    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
}

#[test]
fn checksum_mismatch_fails_and_cleans_up() {
    let fixture = RegistryFixture::new();
    let release = fixture.release_json("v0.0.3", &[DEB, &format!("{DEB}.sha256")]);
    fixture.mock_latest(&release);
    fixture.mock_asset(DEB, PAYLOAD);
    fixture.mock_asset(&format!("{DEB}.sha256"), sha256_hex(b"something else").as_bytes());

    let coordinator = fixture.coordinator("0.0.2");
    let info = coordinator.check_now().release().cloned().unwrap();
    let err = coordinator.download_update(&info, &options(&fixture)).unwrap_err();

    match err {
        UpdateError::DownloadFailed(msg) => assert!(msg.contains("checksum mismatch"), "{msg}"),
        other => panic!("expected checksum failure, got {other:?}"),
    }
    assert_eq!(fixture.leftover_entries(), 0);
}

#[test]
fn checksum_can_be_skipped() {
    let fixture = RegistryFixture::new();
    let release = fixture.release_json("v0.0.3", &[DEB, "SHA256SUMS"]);
    fixture.mock_latest(&release);
    fixture.mock_asset(DEB, PAYLOAD);
    let sums = fixture.mock_asset("SHA256SUMS", b"not a checksum file");

    let coordinator = fixture.coordinator("0.0.2");
    let info = coordinator.check_now().release().cloned().unwrap();
    let update = coordinator
        .download_update(&info, &options(&fixture).with_verify_checksums(false))
        .unwrap();

    assert!(!update.checksum_verified());
    sums.assert_hits(0);
}

#[test]
fn no_matching_asset_makes_no_transfer() {
    let fixture = RegistryFixture::new();
    let release = fixture.release_json("v0.0.3", &["UCI-ClusterManager-0.0.3.dmg"]);
    fixture.mock_latest(&release);
    let dmg = fixture.mock_asset("UCI-ClusterManager-0.0.3.dmg", b"dmg");

    let coordinator = fixture.coordinator("0.0.2");
    let info = coordinator.check_now().release().cloned().unwrap();
    let err = coordinator.download_update(&info, &options(&fixture)).unwrap_err();

    assert!(matches!(err, UpdateError::NoMatchingAsset { .. }));
    dmg.assert_hits(0);
    assert_eq!(fixture.leftover_entries(), 0);
}

#[test]
fn missing_asset_is_download_failure() {
    let fixture = RegistryFixture::new();
    let release = fixture.release_json("v0.0.3", &[DEB]);
    fixture.mock_latest(&release);
    fixture.server.mock(|when, then| {
        when.method(GET).path(format!("/download/{DEB}"));
        then.status(404);
    });

    let coordinator = fixture.coordinator("0.0.2");
    let info = coordinator.check_now().release().cloned().unwrap();
    let err = coordinator.download_update(&info, &options(&fixture)).unwrap_err();

    assert!(matches!(err, UpdateError::DownloadFailed(_)));
    assert_eq!(fixture.leftover_entries(), 0);
}

#[test]
fn cancelled_download_leaves_nothing_behind() {
    let fixture = RegistryFixture::new();
    let release = fixture.release_json("v0.0.3", &[DEB]);
    fixture.mock_latest(&release);
    fixture.mock_asset(DEB, PAYLOAD);

    let coordinator = fixture.coordinator("0.0.2");
    let info = coordinator.check_now().release().cloned().unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = coordinator
        .download_update(&info, &options(&fixture).with_cancel(cancel))
        .unwrap_err();

    assert!(matches!(err, UpdateError::Cancelled));
    assert_eq!(fixture.leftover_entries(), 0);
}

#[test]
fn second_concurrent_download_is_rejected() {
    let fixture = RegistryFixture::new();
    let release = fixture.release_json("v0.0.3", &[DEB]);
    fixture.mock_latest(&release);
    fixture.server.mock(|when, then| {
        when.method(GET).path(format!("/download/{DEB}"));
        then.status(200).delay(Duration::from_millis(400)).body(PAYLOAD);
    });

    let coordinator = fixture.coordinator("0.0.2");
    let info = coordinator.check_now().release().cloned().unwrap();

    let first = coordinator
        .start_download(info.clone(), options(&fixture))
        .unwrap();
    match coordinator.start_download(info.clone(), options(&fixture)) {
        Err(UpdateError::DownloadFailed(msg)) => assert!(msg.contains("already in progress")),
        other => panic!("expected rejection, got {other:?}"),
    }

    let update = first.wait().unwrap();
    assert_eq!(update.asset().name, DEB);

    // The slot is free again once the first download finished.
    let again = coordinator.start_download(info, options(&fixture)).unwrap();
    assert!(again.wait().is_ok());
}
