mod common;
use common::{insert, points_every, seed_min_catalog, setup_db};

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use funding_history::resolution::Resolution;
use funding_history::rollup::policy::DEFAULT_POLICIES;
use funding_history::rollup::{RollupError, RollupManager, store};
use funding_history::scheduler::{Job, SchedulerConfig, run_once, spawn};

#[test]
fn run_once_refreshes_and_sweeps() {
    let (db, mut conn) = setup_db();
    let id = seed_min_catalog(&mut conn, 1)[0];
    let now = Utc::now();
    insert(&mut conn, &points_every(id, now - Duration::hours(2), now, Duration::minutes(1)));

    let manager = RollupManager::new();
    manager.install_defaults(&mut conn, now).unwrap();

    run_once(&manager, &db.path, Resolution::FiveMinutes, Job::Refresh).unwrap();
    run_once(&manager, &db.path, Resolution::FiveMinutes, Job::Retention).unwrap();

    let refresh = store::refresh_policy_rows(&mut conn).unwrap();
    let five = refresh.iter().find(|r| r.resolution == "5m").unwrap();
    assert!(five.last_run_at.is_some());
    assert!(five.last_error.is_none());

    let retention = store::retention_policy_rows(&mut conn).unwrap();
    assert!(retention.iter().find(|r| r.resolution == "5m").unwrap().last_run_at.is_some());
    assert!(retention.iter().find(|r| r.resolution == "1h").unwrap().last_run_at.is_none());
}

#[test]
fn run_once_without_policies_fails() {
    let (db, _conn) = setup_db();
    let manager = RollupManager::new();
    let err = run_once(&manager, &db.path, Resolution::OneHour, Job::Refresh).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RollupError>(),
        Some(RollupError::NoRefreshPolicy(Resolution::OneHour))
    ));
}

#[tokio::test]
async fn spawned_tasks_tick_and_shut_down() {
    let (db, mut conn) = setup_db();
    let id = seed_min_catalog(&mut conn, 1)[0];
    let now = Utc::now();
    insert(&mut conn, &points_every(id, now - Duration::hours(2), now, Duration::minutes(1)));

    let manager = Arc::new(RollupManager::new());
    manager.install_defaults(&mut conn, now).unwrap();
    assert!(
        store::refresh_policy_rows(&mut conn)
            .unwrap()
            .iter()
            .all(|r| r.last_run_at.is_none())
    );

    let handle = spawn(
        Arc::clone(&manager),
        SchedulerConfig {
            database_url: db.path.clone(),
            policies: DEFAULT_POLICIES.to_vec(),
            retention_sweep_interval: Duration::hours(1),
        },
    )
    .unwrap();
    assert_eq!(handle.task_count(), 6);

    // Intervals fire immediately on their first tick.
    let mut ticked = false;
    for _ in 0..100 {
        let refreshed = store::refresh_policy_rows(&mut conn).unwrap();
        let swept = store::retention_policy_rows(&mut conn).unwrap();
        if refreshed.iter().all(|r| r.last_run_at.is_some()) && swept.iter().all(|r| r.last_run_at.is_some()) {
            ticked = true;
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(50)).await;
    }
    handle.shutdown().await;
    assert!(ticked, "every task should have run its first tick");
}
