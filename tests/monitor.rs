use assert_fs::prelude::*;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use predicates::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use nazr::limits::snapshot::load_snapshot;
use nazr::limits::{
    AppManager, BlockSignal, ControlChannel, Enforcer, LocalStore, ManualClock, MonitorService,
    MonitorSettings, PackageId, PreferenceStore, UsageLedger,
};

/// Restricted reader with a one-minute budget, usage recorded by the ledger
#[tokio::test(start_paused = true)]
async fn ledger_usage_triggers_block_and_unlock_exempts() {
    let temp = assert_fs::TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 11, 16, 10, 0, 0).unwrap(),
    ));
    let reader = PackageId::from("com.example.reader");

    let prefs = temp.child("preferences.json");
    let store = Arc::new(LocalStore::open(prefs.path(), None, clock.clone()).unwrap());
    let ledger =
        Arc::new(UsageLedger::open(temp.child("usage.json").path(), clock.clone()).unwrap());
    let signal = BlockSignal::new();
    let manager = AppManager::new(store.clone(), signal.clone());

    manager.activate(&reader).unwrap();
    manager.set_limit(&reader, "1", None).unwrap();
    manager.change_passcode(None, "2468", "2468").unwrap();

    let enforcer = Enforcer::new(
        store.clone(),
        ledger.clone(),
        clock.clone(),
        signal.clone(),
        MonitorSettings::default(),
    );
    let snapshot = temp.child("monitor.json");
    let (service, handle) = MonitorService::new(enforcer);
    let service = service.with_ledger(ledger).with_snapshot(snapshot.path());
    tokio::spawn(service.run());

    let mut blocked = signal.subscribe();

    handle.foreground_changed(Some(reader.clone())).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!signal.is_active());

    // Two minutes of reading pass before the next poll
    clock.advance(ChronoDuration::minutes(2));
    tokio::time::timeout(Duration::from_secs(10), blocked.wait_for(Option::is_some))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(signal.blocked_package(), Some(reader.clone()));

    tokio::time::sleep(Duration::from_millis(10)).await;
    snapshot.assert(predicate::str::contains("com.example.reader"));
    assert_eq!(
        load_snapshot(snapshot.path()).unwrap().unwrap().blocked,
        Some(reader.clone())
    );

    // The interstitial comes up, the user asks for five more minutes
    handle.foreground_changed(Some(PackageId::from("nazr"))).await.unwrap();
    assert!(manager.temporary_unlock(Some("1111"), 5).is_err());
    assert_eq!(manager.temporary_unlock(Some("2468"), 5).unwrap(), reader);
    assert!(store.is_temporarily_unblocked(&reader).unwrap());

    handle.foreground_changed(Some(reader.clone())).await.unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(!signal.is_active());

    // Once the exemption runs out the next foreground event blocks again
    clock.advance(ChronoDuration::minutes(6));
    handle.foreground_changed(Some(PackageId::from("org.other.app"))).await.unwrap();
    handle.foreground_changed(Some(reader.clone())).await.unwrap();
    tokio::time::timeout(Duration::from_secs(1), blocked.wait_for(Option::is_some))
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn unrestricted_apps_are_never_blocked() {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 11, 16, 10, 0, 0).unwrap(),
    ));
    let store = Arc::new(LocalStore::in_memory(clock.clone()));
    let ledger = Arc::new(UsageLedger::in_memory(clock.clone()));
    let signal = BlockSignal::new();

    store.save_limit(&PackageId::from("com.example.game"), 0).unwrap();

    let enforcer = Enforcer::new(
        store,
        ledger.clone(),
        clock.clone(),
        signal.clone(),
        MonitorSettings::default(),
    );
    let (service, handle) = MonitorService::new(enforcer);
    tokio::spawn(service.with_ledger(ledger).run());

    for _ in 0..5 {
        handle
            .foreground_changed(Some(PackageId::from("com.example.game")))
            .await
            .unwrap();
        clock.advance(ChronoDuration::minutes(30));
        tokio::time::sleep(Duration::from_secs(20)).await;
    }

    assert!(!signal.is_active());
}

/// A one-shot command in another process exempts the blocked app
#[tokio::test(start_paused = true)]
async fn unblock_from_second_store_handle_clears_running_block() {
    let temp = assert_fs::TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 11, 16, 10, 0, 0).unwrap(),
    ));
    let reader = PackageId::from("com.example.reader");
    let prefs = temp.child("preferences.json");
    let snapshot = temp.child("monitor.json");
    let control = temp.child("control.json");

    let store = Arc::new(LocalStore::open(prefs.path(), None, clock.clone()).unwrap());
    store.save_restricted_apps(&[reader.clone()].into()).unwrap();
    store.save_limit(&reader, 0).unwrap();

    let ledger = Arc::new(UsageLedger::in_memory(clock.clone()));
    let signal = BlockSignal::new();
    let enforcer = Enforcer::new(
        store,
        ledger.clone(),
        clock.clone(),
        signal.clone(),
        MonitorSettings::default(),
    );
    let (service, handle) = MonitorService::new(enforcer);
    let service = service
        .with_ledger(ledger)
        .with_snapshot(snapshot.path())
        .with_control(ControlChannel::new(control.path()));
    tokio::spawn(service.run());

    let mut blocked = signal.subscribe();
    handle.foreground_changed(Some(reader.clone())).await.unwrap();
    clock.advance(ChronoDuration::minutes(3));
    tokio::time::timeout(Duration::from_secs(10), blocked.wait_for(Option::is_some))
        .await
        .unwrap()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    // What `nazr unblock` builds: its own store handle, seeded from the snapshot
    let reported = load_snapshot(snapshot.path()).unwrap().unwrap().blocked;
    assert_eq!(reported, Some(reader.clone()));
    let other_store = Arc::new(LocalStore::open(prefs.path(), None, clock.clone()).unwrap());
    let cli = AppManager::new(other_store, BlockSignal::with_blocked(reported))
        .with_control(ControlChannel::new(control.path()));
    cli.grant_temporary_unblock(&reader, 15, None).unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!signal.is_active());
    assert_eq!(load_snapshot(snapshot.path()).unwrap().unwrap().blocked, None);
    control.assert(predicate::path::missing());
}
