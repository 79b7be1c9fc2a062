//! Device slot manager tests: idempotent activation, slot limits,
//! row reuse, validation touches and retention cleanup.

mod common;

use common::*;
use keygate::db::queries::ActivationOutcome;
use keygate::error::AppError;
use rusqlite::params;

#[test]
fn test_activate_creates_binding() {
    let mut conn = setup_test_db();
    let product = create_test_product(&conn, "App");
    let license = create_test_license(&conn, &product.id, 3, days_from_today(30));

    let info = test_device_info("a");
    let fp = fingerprint::device_fingerprint(&info);
    let outcome = queries::activate_device_atomic(
        &mut conn,
        &license,
        &fp,
        &serde_json::to_string(&info).unwrap(),
        info.hostname.as_deref(),
    )
    .unwrap();

    let device = match outcome {
        ActivationOutcome::Created(d) => d,
        other => panic!("expected Created, got {:?}", other),
    };
    assert_eq!(device.license_id, license.id);
    assert_eq!(device.device_fingerprint, fp);
    assert_eq!(device.status, DeviceStatus::Active);
    assert_eq!(device.device_name.as_deref(), Some("host-a"));
    assert_eq!(queries::count_active_devices(&conn, &license.id).unwrap(), 1);
}

#[test]
fn test_activate_idempotent_for_active_fingerprint() {
    let mut conn = setup_test_db();
    let product = create_test_product(&conn, "App");
    let license = create_test_license(&conn, &product.id, 1, days_from_today(30));

    let first = activate_test_device(&mut conn, &license, "a");
    // make any write to the row observable
    conn.execute(
        "UPDATE device_activations SET last_validated_at = 1000 WHERE id = ?1",
        params![first.id],
    )
    .unwrap();

    let info = test_device_info("a");
    let outcome = queries::activate_device_atomic(
        &mut conn,
        &license,
        &fingerprint::device_fingerprint(&info),
        &serde_json::to_string(&info).unwrap(),
        info.hostname.as_deref(),
    )
    .unwrap();

    match outcome {
        ActivationOutcome::Existing(device) => {
            assert_eq!(device.id, first.id);
            // repeat activation returns the row as-is; only validation
            // touches last_validated_at
            assert_eq!(device.last_validated_at, 1000);
        }
        other => panic!("expected Existing, got {:?}", other),
    }
    let stored = queries::get_device(&conn, &first.id).unwrap().unwrap();
    assert_eq!(stored.last_validated_at, 1000);
    // still one row, slot limit of 1 untouched
    assert_eq!(queries::count_active_devices(&conn, &license.id).unwrap(), 1);
}

#[test]
fn test_activate_respects_slot_limit() {
    let mut conn = setup_test_db();
    let product = create_test_product(&conn, "App");
    let license = create_test_license(&conn, &product.id, 1, days_from_today(30));

    activate_test_device(&mut conn, &license, "a");

    let info = test_device_info("b");
    let err = queries::activate_device_atomic(
        &mut conn,
        &license,
        &fingerprint::device_fingerprint(&info),
        &serde_json::to_string(&info).unwrap(),
        None,
    )
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

/// The limit check inside the activation transaction must use the
/// stored `max_devices`, not the value on the caller's license row,
/// which may predate a concurrent lowering.
#[test]
fn test_activation_enforces_stored_device_limit() {
    let mut conn = setup_test_db();
    let product = create_test_product(&conn, "App");
    let license = create_test_license(&conn, &product.id, 2, days_from_today(30));
    activate_test_device(&mut conn, &license, "a");

    // the limit shrinks after the caller loaded its license row
    conn.execute(
        "UPDATE licenses SET max_devices = 1 WHERE id = ?1",
        params![license.id],
    )
    .unwrap();

    let info = test_device_info("b");
    let err = queries::activate_device_atomic(
        &mut conn,
        &license,
        &fingerprint::device_fingerprint(&info),
        &serde_json::to_string(&info).unwrap(),
        None,
    )
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(queries::count_active_devices(&conn, &license.id).unwrap(), 1);
}

#[test]
fn test_deactivation_frees_slot_for_another_device() {
    let mut conn = setup_test_db();
    let product = create_test_product(&conn, "App");
    let license = create_test_license(&conn, &product.id, 1, days_from_today(30));

    let device_a = activate_test_device(&mut conn, &license, "a");
    queries::deactivate_device(&conn, &device_a.id).unwrap().unwrap();
    assert_eq!(queries::count_active_devices(&conn, &license.id).unwrap(), 0);

    // B takes the freed slot
    let device_b = activate_test_device(&mut conn, &license, "b");
    assert_ne!(device_a.id, device_b.id);

    // A cannot come back while B holds the only slot
    let info = test_device_info("a");
    let err = queries::activate_device_atomic(
        &mut conn,
        &license,
        &fingerprint::device_fingerprint(&info),
        &serde_json::to_string(&info).unwrap(),
        None,
    )
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[test]
fn test_activate_reuses_deactivated_row() {
    let mut conn = setup_test_db();
    let product = create_test_product(&conn, "App");
    let license = create_test_license(&conn, &product.id, 2, days_from_today(30));

    let device = activate_test_device(&mut conn, &license, "a");
    queries::deactivate_device(&conn, &device.id).unwrap().unwrap();

    let info = test_device_info("a");
    let outcome = queries::activate_device_atomic(
        &mut conn,
        &license,
        &fingerprint::device_fingerprint(&info),
        &serde_json::to_string(&info).unwrap(),
        info.hostname.as_deref(),
    )
    .unwrap();
    let reused = match outcome {
        ActivationOutcome::Reactivated(d) => d,
        other => panic!("expected Reactivated, got {:?}", other),
    };
    assert_eq!(reused.id, device.id);
    assert_eq!(reused.status, DeviceStatus::Active);
    assert!(reused.deactivated_at.is_none());

    // the fingerprint maps to exactly one row, never two
    let rows: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM device_activations
             WHERE license_id = ?1 AND device_fingerprint = ?2",
            params![license.id, device.device_fingerprint],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn test_validation_touches_timestamp_and_never_creates_rows() {
    let mut conn = setup_test_db();
    let product = create_test_product(&conn, "App");
    let license = create_test_license(&conn, &product.id, 3, days_from_today(30));

    // no binding yet: validation must not create one
    let fp = test_fingerprint("a");
    assert!(queries::touch_device_validation(&conn, &license.id, &fp)
        .unwrap()
        .is_none());
    assert!(queries::list_devices_for_license(&conn, &license.id)
        .unwrap()
        .is_empty());

    let device = activate_test_device(&mut conn, &license, "a");
    // push the stored timestamp into the past so the touch is observable
    conn.execute(
        "UPDATE device_activations SET last_validated_at = 1000 WHERE id = ?1",
        params![device.id],
    )
    .unwrap();

    let touched = queries::touch_device_validation(&conn, &license.id, &fp)
        .unwrap()
        .expect("active binding should validate");
    assert_eq!(touched.id, device.id);
    assert!(touched.last_validated_at > 1000);

    // deactivated bindings do not validate
    queries::deactivate_device(&conn, &device.id).unwrap().unwrap();
    assert!(queries::touch_device_validation(&conn, &license.id, &fp)
        .unwrap()
        .is_none());
}

#[test]
fn test_reactivate_respects_slot_limit() {
    let mut conn = setup_test_db();
    let product = create_test_product(&conn, "App");
    let license = create_test_license(&conn, &product.id, 1, days_from_today(30));

    let device_a = activate_test_device(&mut conn, &license, "a");
    queries::deactivate_device(&conn, &device_a.id).unwrap().unwrap();
    activate_test_device(&mut conn, &license, "b");

    let err = queries::reactivate_device_atomic(&mut conn, &device_a.id).unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[test]
fn test_reactivate_deactivated_device() {
    let mut conn = setup_test_db();
    let product = create_test_product(&conn, "App");
    let license = create_test_license(&conn, &product.id, 2, days_from_today(30));

    let device = activate_test_device(&mut conn, &license, "a");
    queries::deactivate_device(&conn, &device.id).unwrap().unwrap();

    let restored = queries::reactivate_device_atomic(&mut conn, &device.id).unwrap();
    assert_eq!(restored.id, device.id);
    assert_eq!(restored.status, DeviceStatus::Active);
    assert!(restored.deactivated_at.is_none());

    // a second reactivation is a conflict, not a no-op
    let err = queries::reactivate_device_atomic(&mut conn, &device.id).unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[test]
fn test_reactivate_missing_device_not_found() {
    let mut conn = setup_test_db();
    let err = queries::reactivate_device_atomic(&mut conn, "dev_missing").unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[test]
fn test_cleanup_removes_only_old_deactivated_rows() {
    let mut conn = setup_test_db();
    let product = create_test_product(&conn, "App");
    let license = create_test_license(&conn, &product.id, 5, days_from_today(30));

    let old = activate_test_device(&mut conn, &license, "old");
    let recent = activate_test_device(&mut conn, &license, "recent");
    let active = activate_test_device(&mut conn, &license, "active");

    queries::deactivate_device(&conn, &old.id).unwrap().unwrap();
    queries::deactivate_device(&conn, &recent.id).unwrap().unwrap();
    // age the first deactivation past the retention window
    conn.execute(
        "UPDATE device_activations SET deactivated_at = ?1 WHERE id = ?2",
        params![clock::now_ts() - 40 * 86400, old.id],
    )
    .unwrap();

    let removed = queries::cleanup_inactive_devices(&conn, clock::cutoff_ts(30)).unwrap();
    assert_eq!(removed, 1);
    assert!(queries::get_device(&conn, &old.id).unwrap().is_none());
    assert!(queries::get_device(&conn, &recent.id).unwrap().is_some());
    assert!(queries::get_device(&conn, &active.id).unwrap().is_some());
}

#[test]
fn test_delete_device_returns_removed_row() {
    let mut conn = setup_test_db();
    let product = create_test_product(&conn, "App");
    let license = create_test_license(&conn, &product.id, 2, days_from_today(30));

    let device = activate_test_device(&mut conn, &license, "a");
    let removed = queries::delete_device(&conn, &device.id).unwrap().unwrap();
    assert_eq!(removed.id, device.id);
    assert!(queries::get_device(&conn, &device.id).unwrap().is_none());
    assert!(queries::delete_device(&conn, &device.id).unwrap().is_none());
}

/// Many devices racing for two slots on a file-backed database must
/// end with exactly two active bindings.
#[test]
fn test_activate_device_atomic_concurrent() {
    use std::sync::{Arc, Barrier};
    use std::thread;

    let db_path = std::env::temp_dir().join(format!(
        "keygate_race_{}.db",
        uuid::Uuid::new_v4().simple()
    ));
    let db_path_str = db_path.to_str().unwrap().to_string();

    let license = {
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        init_db(&conn).unwrap();
        let product = create_test_product(&conn, "App");
        create_test_license(&conn, &product.id, 2, days_from_today(30))
    };

    const THREADS: usize = 6;
    let barrier = Arc::new(Barrier::new(THREADS));
    let mut handles = Vec::new();
    for i in 0..THREADS {
        let barrier = Arc::clone(&barrier);
        let license = license.clone();
        let db_path = db_path_str.clone();
        handles.push(thread::spawn(move || {
            let mut conn = rusqlite::Connection::open(&db_path).unwrap();
            conn.busy_timeout(std::time::Duration::from_secs(5)).unwrap();
            let info = test_device_info(&format!("racer-{}", i));
            let fp = fingerprint::device_fingerprint(&info);
            barrier.wait();
            queries::activate_device_atomic(
                &mut conn,
                &license,
                &fp,
                &serde_json::to_string(&info).unwrap(),
                None,
            )
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(_) => successes += 1,
            Err(AppError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error under contention: {:?}", other),
        }
    }
    assert_eq!(successes, 2, "exactly max_devices activations must win");

    let conn = rusqlite::Connection::open(&db_path).unwrap();
    let active: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM device_activations WHERE license_id = ?1 AND status = 'active'",
            params![license.id],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(active, 2);

    drop(conn);
    let _ = std::fs::remove_file(&db_path);
}
