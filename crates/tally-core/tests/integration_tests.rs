use chrono::{Duration, NaiveDate, NaiveTime, Utc, Weekday};
use std::sync::Arc;
use tally_core::db::{establish_connection, DbPool};
use tally_core::error::CoreError;
use tally_core::models::*;
use tally_core::recurrence::{is_task_completed_for_date, is_task_scheduled_for_date};
use tally_core::repository::{
    CounterEntryRepository, CounterRepository, NotificationRepository, SqliteRepository,
    TaskRepository,
};
use tally_core::reset::{ResetEngine, ResetOutcome, ResetStore};
use tally_core::service::Tracker;
use tempfile::TempDir;
use uuid::Uuid;

const USER: &str = "user-1";

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// Helper function to create a test database
async fn setup_test_db() -> (Arc<SqliteRepository>, DbPool, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");

    let pool = establish_connection(&db_path.to_string_lossy())
        .await
        .expect("Failed to establish test database connection");

    (Arc::new(SqliteRepository::new(pool.clone())), pool, temp_dir)
}

async fn create_counter(
    repo: &SqliteRepository,
    name: &str,
    kind: CounterKind,
    goal: Option<u32>,
) -> Counter {
    repo.add_counter(
        USER,
        NewCounterData {
            name: name.to_string(),
            description: None,
            kind,
            start_date: d(2024, 1, 1),
            end_date: None,
            goal,
        },
    )
    .await
    .expect("Failed to create test counter")
}

/// Counter whose current period started on `last_reset`, holding `value`.
async fn stale_counter(
    repo: &SqliteRepository,
    kind: CounterKind,
    last_reset: NaiveDate,
    value: u32,
) -> Counter {
    let counter = create_counter(repo, "Glasses of water", kind, None).await;
    assert!(repo.commit_reset(counter.id, None, last_reset, 0).await.unwrap());
    for _ in 0..value {
        repo.increment_counter(counter.id).await.unwrap();
    }
    repo.find_counter_by_id(counter.id).await.unwrap().unwrap()
}

fn weekly_routine(title: &str, weekdays: Vec<Weekday>) -> NewTaskData {
    NewTaskData {
        title: title.to_string(),
        description: None,
        time: Some(NaiveTime::from_hms_opt(7, 30, 0).unwrap()),
        kind: NewTaskKind::Routine(NewRoutineData {
            weekdays,
            start_date: Some(d(2024, 1, 1)),
            ..Default::default()
        }),
        notifications: NotificationPrefs::default(),
    }
}

#[tokio::test]
async fn test_task_lifecycle() {
    let (repo, _pool, _temp_dir) = setup_test_db().await;

    let one_time = repo
        .add_task(
            USER,
            NewTaskData {
                title: "Renew passport".to_string(),
                description: Some("Bring two photos".to_string()),
                time: None,
                kind: NewTaskKind::OneTime { date: d(2024, 3, 6) },
                notifications: NotificationPrefs::default(),
            },
        )
        .await
        .unwrap();
    let routine = repo
        .add_task(USER, weekly_routine("Gym", vec![Weekday::Mon, Weekday::Wed]))
        .await
        .unwrap();

    let tasks = repo.find_tasks(USER).await.unwrap();
    assert_eq!(tasks.len(), 2);
    let loaded = tasks.iter().find(|t| t.id == routine.id).unwrap();
    assert_eq!(loaded.kind, routine.kind);
    assert_eq!(loaded.time, routine.time);
    assert!(is_task_scheduled_for_date(loaded, d(2024, 3, 6)));
    assert!(!is_task_scheduled_for_date(loaded, d(2024, 3, 7)));

    // Routine completion is per day
    let (_, result) = repo.toggle_task_completion(routine.id, d(2024, 3, 6)).await.unwrap();
    assert_eq!(result, CompletionResult::Completed);
    let reloaded = repo.find_task_by_id(routine.id).await.unwrap().unwrap();
    assert!(is_task_completed_for_date(&reloaded, d(2024, 3, 6)));
    assert!(!is_task_completed_for_date(&reloaded, d(2024, 3, 11)));

    let (_, result) = repo.toggle_task_completion(routine.id, d(2024, 3, 6)).await.unwrap();
    assert_eq!(result, CompletionResult::Reopened);

    // One-time completion is a flag
    let (task, _) = repo.toggle_task_completion(one_time.id, d(2030, 1, 1)).await.unwrap();
    assert!(is_task_completed_for_date(&task, d(2024, 3, 6)));

    // Excluding an occurrence hides it but keeps the series
    repo.exclude_occurrence(routine.id, d(2024, 3, 11)).await.unwrap();
    let reloaded = repo.find_task_by_id(routine.id).await.unwrap().unwrap();
    assert!(!is_task_scheduled_for_date(&reloaded, d(2024, 3, 11)));
    assert!(is_task_scheduled_for_date(&reloaded, d(2024, 3, 13)));
    assert!(matches!(
        repo.exclude_occurrence(one_time.id, d(2024, 3, 6)).await,
        Err(CoreError::InvalidInput(_))
    ));

    repo.delete_task(one_time.id).await.unwrap();
    assert!(matches!(
        repo.delete_task(one_time.id).await,
        Err(CoreError::NotFound(_))
    ));
    assert_eq!(repo.find_tasks(USER).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_short_id_lookup() {
    let (repo, _pool, _temp_dir) = setup_test_db().await;
    let task = repo
        .add_task(USER, weekly_routine("Read", vec![Weekday::Fri]))
        .await
        .unwrap();

    let prefix = &task.id.to_string()[..13];
    let found = repo.find_tasks_by_short_id_prefix(USER, prefix).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, task.id);

    let other_user = repo.find_tasks_by_short_id_prefix("someone-else", prefix).await.unwrap();
    assert!(other_user.is_empty());
}

#[tokio::test]
async fn test_invalid_routines_are_rejected() {
    let (repo, _pool, _temp_dir) = setup_test_db().await;

    let mut data = weekly_routine("Bills", vec![]);
    if let NewTaskKind::Routine(routine) = &mut data.kind {
        routine.month_day = Some(32);
    }
    assert!(matches!(repo.add_task(USER, data).await, Err(CoreError::InvalidInput(_))));

    let data = weekly_routine("   ", vec![Weekday::Mon]);
    assert!(matches!(repo.add_task(USER, data).await, Err(CoreError::InvalidInput(_))));
}

#[tokio::test]
async fn test_corrupt_rows_are_skipped() {
    let (repo, pool, _temp_dir) = setup_test_db().await;
    let good = create_counter(&repo, "Steps", CounterKind::Daily, None).await;

    sqlx::query(
        "INSERT INTO counters (id, user_id, name, counter_type, start_date, current_value, created_at, updated_at)
         VALUES ($1, $2, 'Broken', 'weekly', '2024-13-45', 3, $3, $3)",
    )
    .bind(Uuid::now_v7())
    .bind(USER)
    .bind(Utc::now())
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO tasks (id, user_id, title, task_type, date, created_at, updated_at)
         VALUES ($1, $2, 'Broken', 'onetime', 'next tuesday', $3, $3)",
    )
    .bind(Uuid::now_v7())
    .bind(USER)
    .bind(Utc::now())
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO tasks (id, user_id, title, task_type, date, notify_time_unit, created_at, updated_at)
         VALUES ($1, $2, 'Odd unit', 'onetime', '2024-03-11', 'seconds', $3, $3)",
    )
    .bind(Uuid::now_v7())
    .bind(USER)
    .bind(Utc::now())
    .execute(&pool)
    .await
    .unwrap();

    let counters = repo.find_counters(USER).await.unwrap();
    assert_eq!(counters.len(), 1);
    assert_eq!(counters[0].id, good.id);
    assert!(repo.find_tasks(USER).await.unwrap().is_empty());

    let readable = repo
        .add_task(USER, weekly_routine("Swim", vec![Weekday::Tue]))
        .await
        .unwrap();
    let tasks = repo.find_tasks(USER).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].id, readable.id);
}

#[tokio::test]
async fn test_decrement_never_goes_negative() {
    let (repo, _pool, _temp_dir) = setup_test_db().await;
    let counter = create_counter(&repo, "Coffee", CounterKind::Daily, None).await;

    let counter = repo.decrement_counter(counter.id).await.unwrap();
    assert_eq!(counter.current_value, 0);

    repo.increment_counter(counter.id).await.unwrap();
    let counter = repo.decrement_counter(counter.id).await.unwrap();
    let counter = repo.decrement_counter(counter.id).await.unwrap();
    assert_eq!(counter.current_value, 0);

    assert!(matches!(
        repo.increment_counter(Uuid::now_v7()).await,
        Err(CoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_daily_rollover_archives_yesterday() {
    let (repo, _pool, _temp_dir) = setup_test_db().await;
    let counter = stale_counter(&repo, CounterKind::Daily, d(2024, 3, 10), 5).await;
    let engine = ResetEngine::new(repo.clone());

    let outcome = engine.reset_counter(&counter, d(2024, 3, 11)).await.unwrap();
    assert!(matches!(outcome, ResetOutcome::Archived { reused: false, .. }));

    let after = repo.find_counter_by_id(counter.id).await.unwrap().unwrap();
    assert_eq!(after.current_value, 0);
    assert_eq!(after.last_reset_date, Some(d(2024, 3, 11)));

    let history = repo.find_entries_for_counter(counter.id, USER).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].date, d(2024, 3, 10));
    assert_eq!(history[0].value, 5);
    assert_eq!(history[0].source, EntrySource::Reset);

    // Later check the same day
    let summary = engine.run(&[after], d(2024, 3, 11)).await;
    assert_eq!(summary.counters_reset, 0);
    assert_eq!(repo.find_entries_for_counter(counter.id, USER).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_resets_archive_once() {
    let (repo, _pool, _temp_dir) = setup_test_db().await;
    let counter = stale_counter(&repo, CounterKind::Weekly, d(2024, 3, 4), 7).await;
    let first = ResetEngine::new(repo.clone());
    let second = ResetEngine::new(repo.clone());

    let today = d(2024, 3, 11);
    let (a, b) = tokio::join!(
        first.reset_counter(&counter, today),
        second.reset_counter(&counter, today)
    );
    let outcomes = [a.unwrap(), b.unwrap()];
    let archived = outcomes
        .iter()
        .filter(|o| matches!(o, ResetOutcome::Archived { .. }))
        .count();
    assert_eq!(archived, 1);

    let history = repo.find_entries_for_counter(counter.id, USER).await.unwrap();
    assert_eq!(history.len(), 1);
    let after = repo.find_counter_by_id(counter.id).await.unwrap().unwrap();
    assert_eq!(after.current_value, 0);
}

#[tokio::test]
async fn test_one_entry_per_counter_and_date() {
    let (repo, _pool, _temp_dir) = setup_test_db().await;
    let counter = stale_counter(&repo, CounterKind::Daily, d(2024, 3, 10), 2).await;

    repo.add_counter_entry(NewCounterEntry::manual_of(&counter, d(2024, 3, 10), Some("midday".into())))
        .await
        .unwrap();
    repo.increment_counter(counter.id).await.unwrap();
    let counter = repo.find_counter_by_id(counter.id).await.unwrap().unwrap();

    // A second snapshot the same day replaces the first
    let replaced = repo
        .add_counter_entry(NewCounterEntry::manual_of(&counter, d(2024, 3, 10), None))
        .await
        .unwrap();
    assert_eq!(replaced.value, 3);
    assert_eq!(replaced.note.as_deref(), Some("midday"));
    assert_eq!(repo.find_entries_for_counter(counter.id, USER).await.unwrap().len(), 1);

    // The period archive takes over the slot with the final value
    repo.increment_counter(counter.id).await.unwrap();
    let counter = repo.find_counter_by_id(counter.id).await.unwrap().unwrap();
    let engine = ResetEngine::new(repo.clone());
    let outcome = engine.reset_counter(&counter, d(2024, 3, 11)).await.unwrap();
    match outcome {
        ResetOutcome::Archived { entry, reused } => {
            assert!(!reused);
            assert_eq!(entry.value, 4);
            assert_eq!(entry.source, EntrySource::Reset);
        }
        other => panic!("expected archival, got {other:?}"),
    }

    let history = repo.find_entries_for_counter(counter.id, USER).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].note.as_deref(), Some("midday"));
    assert_eq!(repo.find_counter_by_id(counter.id).await.unwrap().unwrap().current_value, 0);

    // An archived day cannot be overwritten by a snapshot
    assert!(matches!(
        repo.add_counter_entry(NewCounterEntry::manual_of(&counter, d(2024, 3, 10), None)).await,
        Err(CoreError::Conflict(_))
    ));
}

#[tokio::test]
async fn test_tracker_snapshots_once_per_day() {
    let (repo, _pool, _temp_dir) = setup_test_db().await;
    let tracker = Tracker::new(repo.clone(), USER, chrono_tz::UTC);
    let counter = create_counter(&repo, "Pages", CounterKind::Daily, None).await;

    tracker.increment_counter(counter.id).await.unwrap();
    tracker.snapshot_counter(counter.id, None).await.unwrap();
    tracker.increment_counter(counter.id).await.unwrap();
    let latest = tracker.snapshot_counter(counter.id, Some("evening".into())).await.unwrap();

    let history = tracker.counter_history(counter.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, latest.id);
    assert_eq!(history[0].value, 2);
    assert_eq!(history[0].date, tracker.today());
}

#[tokio::test]
async fn test_edits_roll_stale_counter_into_today() {
    let (repo, _pool, _temp_dir) = setup_test_db().await;
    let tracker = Tracker::new(repo.clone(), USER, chrono_tz::UTC);
    let yesterday = tracker.today() - Duration::days(1);
    let water = stale_counter(&repo, CounterKind::Daily, yesterday, 5).await;
    let tea = stale_counter(&repo, CounterKind::Daily, yesterday, 3).await;

    let water = tracker.increment_counter(water.id).await.unwrap();
    assert_eq!(water.current_value, 1);
    assert_eq!(water.last_reset_date, Some(tracker.today()));
    let tea = tracker.decrement_counter(tea.id).await.unwrap();
    assert_eq!(tea.current_value, 0);

    let (counters, summary) = tracker.refresh_counters().await.unwrap();
    assert_eq!(summary.counters_reset, 0);
    let live = counters.iter().find(|c| c.id == water.id).unwrap();
    assert_eq!(live.current_value, 1);

    let history = tracker.counter_history(water.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].date, yesterday);
    assert_eq!(history[0].value, 5);
    assert_eq!(tracker.counter_history(tea.id).await.unwrap()[0].value, 3);
}

#[tokio::test]
async fn test_entries_in_range_and_purge() {
    let (repo, _pool, _temp_dir) = setup_test_db().await;
    let counter = create_counter(&repo, "Pages", CounterKind::Daily, None).await;
    for day in [1, 5, 9] {
        repo.add_counter_entry(NewCounterEntry::archive_of(&counter, d(2024, 3, day)))
            .await
            .unwrap();
    }
    assert!(matches!(
        repo.add_counter_entry(NewCounterEntry::archive_of(&counter, d(2024, 3, 5))).await,
        Err(CoreError::Conflict(_))
    ));

    let in_range = repo.find_entries_in_range(USER, d(2024, 3, 2), d(2024, 3, 9)).await.unwrap();
    let dates: Vec<_> = in_range.iter().map(|e| e.date).collect();
    assert_eq!(dates, vec![d(2024, 3, 9), d(2024, 3, 5)]);

    assert_eq!(repo.delete_entries_before(USER, d(2024, 3, 5)).await.unwrap(), 1);
    assert!(repo.find_entries_in_range(USER, d(2024, 3, 9), d(2024, 3, 2)).await.is_err());
}

#[tokio::test]
async fn test_notification_inbox() {
    let (repo, pool, _temp_dir) = setup_test_db().await;

    let first = repo
        .add_notification(USER, NewNotification::system("Welcome", "Hello"))
        .await
        .unwrap();
    repo.add_notification(USER, NewNotification::system("Tip", "Use counters"))
        .await
        .unwrap();
    assert_eq!(repo.count_unread_notifications(USER).await.unwrap(), 2);

    repo.mark_notification_read(first.id).await.unwrap();
    assert_eq!(repo.count_unread_notifications(USER).await.unwrap(), 1);
    assert_eq!(repo.mark_all_notifications_read(USER).await.unwrap(), 1);

    // Age the first one past the retention window
    sqlx::query("UPDATE notifications SET timestamp = $1 WHERE id = $2")
        .bind(Utc::now() - Duration::days(45))
        .bind(first.id)
        .execute(&pool)
        .await
        .unwrap();
    let removed = repo
        .delete_notifications_before(USER, Utc::now() - Duration::days(30))
        .await
        .unwrap();
    assert_eq!(removed, 1);

    assert_eq!(repo.delete_all_notifications(USER).await.unwrap(), 1);
    assert!(repo.find_notifications(USER).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_tracker_records_domain_notifications() {
    let (repo, _pool, _temp_dir) = setup_test_db().await;
    let tracker = Tracker::new(repo.clone(), USER, chrono_tz::UTC);

    let counter = tracker
        .add_counter(NewCounterData {
            name: "Push-ups".to_string(),
            description: None,
            kind: CounterKind::Daily,
            start_date: d(2024, 1, 1),
            end_date: None,
            goal: Some(2),
        })
        .await
        .unwrap();
    tracker.increment_counter(counter.id).await.unwrap();
    assert_eq!(tracker.unread_count().await.unwrap(), 0);
    tracker.increment_counter(counter.id).await.unwrap();
    tracker.increment_counter(counter.id).await.unwrap();

    let notifications = tracker.notifications().await.unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].title, "Goal reached!");
    assert_eq!(notifications[0].kind, NotificationKind::Counter);
    assert_eq!(notifications[0].related_id, Some(counter.id));

    let routine = tracker
        .add_task(weekly_routine("Stretch", vec![Weekday::Mon]))
        .await
        .unwrap();
    tracker.toggle_task_completion(routine.id, d(2024, 3, 11)).await.unwrap();
    assert_eq!(tracker.unread_count().await.unwrap(), 2);

    assert_eq!(tracker.delete_all_counters().await.unwrap(), 1);
    let latest = &tracker.notifications().await.unwrap()[0];
    assert_eq!(latest.kind, NotificationKind::System);

    let wiped = tracker.reset_all_data().await.unwrap();
    assert_eq!(wiped.tasks, 1);
    assert!(tracker.tasks().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_month_view_marks_activity() {
    let (repo, _pool, _temp_dir) = setup_test_db().await;
    let tracker = Tracker::new(repo, USER, chrono_tz::UTC);
    tracker
        .add_task(weekly_routine("Swim", vec![Weekday::Tue]))
        .await
        .unwrap();

    let month = tracker.month_view(d(2024, 3, 15)).await.unwrap();
    assert_eq!(month.len() % 7, 0);
    let tuesdays: Vec<_> = month
        .iter()
        .filter(|day| day.in_month && day.scheduled_tasks == 1)
        .map(|day| day.date)
        .collect();
    assert_eq!(
        tuesdays,
        vec![d(2024, 3, 5), d(2024, 3, 12), d(2024, 3, 19), d(2024, 3, 26)]
    );
}

#[tokio::test]
async fn test_history_outlives_deleted_counter() {
    let (repo, _pool, _temp_dir) = setup_test_db().await;
    let counter = stale_counter(&repo, CounterKind::Monthly, d(2024, 2, 1), 4).await;
    ResetEngine::new(repo.clone())
        .reset_counter(&counter, d(2024, 3, 1))
        .await
        .unwrap();

    repo.delete_counter(counter.id).await.unwrap();
    assert!(repo.find_counter_by_id(counter.id).await.unwrap().is_none());

    let history = repo.find_entries_for_counter(counter.id, USER).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].name, "Glasses of water");
    assert_eq!(history[0].value, 4);
}
