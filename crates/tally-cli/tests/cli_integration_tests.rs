/// CLI integration tests for tally
///
/// These run the binary as a black box against a throwaway database.
use predicates::prelude::*;

mod helpers;
use helpers::{assertions, CliTestHarness};

#[test]
fn test_cli_help_and_version() {
    let harness = CliTestHarness::new();

    harness
        .run_success(&["--help"])
        .stdout(predicate::str::contains("Tally"))
        .stdout(predicate::str::contains("counter"));

    harness
        .run_success(&["--version"])
        .stdout(predicate::str::contains("tally"));

    harness
        .run_failure(&["invalid-command"])
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_one_time_task_lifecycle() {
    let harness = CliTestHarness::new();

    harness
        .run_success(&["task", "list"])
        .stdout(predicate::str::contains("No tasks found"));

    let id = harness.create(&["task", "add", "Call the bank", "--at", "9:30"], "Task ID:");
    assert_eq!(id.len(), 8);

    harness
        .run_success(&["task", "list"])
        .stdout(assertions::has_task_table_headers())
        .stdout(predicate::str::contains("Call the bank"))
        .stdout(predicate::str::contains("09:30"));

    harness
        .run_success(&["task", "done", &id])
        .stdout(predicate::str::contains("Completed"));
    harness
        .run_success(&["task", "done", &id])
        .stdout(predicate::str::contains("Reopened"));

    harness
        .run_success(&["task", "delete", &id, "--force"])
        .stdout(predicate::str::contains("Deleted task 'Call the bank'"));
    harness
        .run_success(&["task", "list"])
        .stdout(predicate::str::contains("No tasks found"));
}

#[test]
fn test_routine_commands() {
    let harness = CliTestHarness::new();

    harness
        .run_success(&["task", "add", "Stretch", "--days", "daily", "--at", "7am"])
        .stdout(assertions::created_successfully())
        .stdout(predicate::str::contains("Created routine"));
    let stdout = harness.stdout_of(&["task", "add", "Review week", "--days", "sun"]);
    assert!(stdout.contains("Sun"), "schedule missing in:\n{stdout}");

    let id = harness.create(
        &["task", "add", "Water plants", "--every", "custom", "--interval", "3", "--unit", "days"],
        "Task ID:",
    );

    let upcoming = harness.stdout_of(&["task", "upcoming", &id, "-n", "3"]);
    assert!(upcoming.contains("Next occurrences of 'Water plants'"));
    assert_eq!(upcoming.lines().count(), 4);

    harness
        .run_success(&["task", "skip", &id])
        .stdout(predicate::str::contains("Skipped 'Water plants'"));

    // Skipped today, so it no longer shows up in the day view
    let today = harness.stdout_of(&["today"]);
    assert!(today.contains("Stretch"));
    assert!(!today.contains("Water plants"));
}

#[test]
fn test_skip_rejects_one_time_task() {
    let harness = CliTestHarness::new();
    let id = harness.create(&["task", "add", "Dentist", "--on", "2030-05-01"], "Task ID:");

    harness
        .run_failure(&["task", "skip", &id, "--date", "2030-05-01"])
        .stderr(predicate::str::contains("Only routine tasks"));
}

#[test]
fn test_invalid_task_input() {
    let harness = CliTestHarness::new();

    harness
        .run_failure(&["task", "add", "Bad time", "--at", "25:99"])
        .stderr(assertions::has_error());

    harness
        .run_failure(&["task", "add", "Bad date", "--on", "not-a-date-at-all"])
        .stderr(assertions::has_error());

    harness
        .run_failure(&["task", "add", "No interval", "--every", "custom"])
        .stderr(assertions::has_error());

    // --on cannot be combined with routine flags
    harness
        .run_failure(&["task", "add", "Mixed", "--on", "today", "--days", "mon"])
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_unknown_and_short_ids() {
    let harness = CliTestHarness::new();

    harness
        .run_failure(&["task", "done", "ffff"])
        .stderr(predicate::str::contains("No task found with ID prefix 'ffff'"));

    harness
        .run_failure(&["counter", "inc", "a"])
        .stderr(predicate::str::contains("at least 2 characters"));
}

#[test]
fn test_counter_lifecycle() {
    let harness = CliTestHarness::new();

    let id = harness.create(&["counter", "add", "Glasses of water", "--goal", "2"], "Counter ID:");

    harness
        .run_success(&["counter", "list"])
        .stdout(assertions::has_counter_table_headers())
        .stdout(predicate::str::contains("Glasses of water"))
        .stdout(predicate::str::contains("daily"));

    assert!(harness.stdout_of(&["counter", "inc", &id]).contains("Glasses of water: 1 / 2"));
    assert!(harness.stdout_of(&["counter", "inc", &id]).contains("Goal reached!"));
    let third = harness.stdout_of(&["counter", "inc", &id]);
    assert!(third.contains("3 / 2"));
    assert!(!third.contains("Goal reached!"));

    // Decrementing stops at zero
    for _ in 0..4 {
        harness.run_success(&["counter", "dec", &id]);
    }
    assert!(harness.stdout_of(&["counter", "dec", &id]).contains("0 / 2"));

    harness
        .run_success(&["counter", "history", &id])
        .stdout(predicate::str::contains("No history yet"));
    harness
        .run_success(&["counter", "snapshot", &id, "--note", "checkpoint"])
        .stdout(predicate::str::contains("Saved"));
    harness
        .run_success(&["counter", "history", &id])
        .stdout(predicate::str::contains("manual"))
        .stdout(predicate::str::contains("checkpoint"));

    harness
        .run_success(&["counter", "entries", "--from", "yesterday"])
        .stdout(predicate::str::contains("Glasses of water"));

    harness
        .run_success(&["counter", "clear", "--force"])
        .stdout(predicate::str::contains("Deleted 1 counter(s)"));
    harness
        .run_success(&["counter", "list"])
        .stdout(predicate::str::contains("No counters found"));
}

#[test]
fn test_counter_rejects_zero_goal() {
    let harness = CliTestHarness::new();
    harness
        .run_failure(&["counter", "add", "Pages", "--goal", "0"])
        .stderr(predicate::str::contains("Goal must be a positive number"));
}

#[test]
fn test_notification_inbox() {
    let harness = CliTestHarness::new();

    harness
        .run_success(&["notifications", "list"])
        .stdout(predicate::str::contains("No notifications"));

    let id = harness.create(&["counter", "add", "Push-ups", "--goal", "1"], "Counter ID:");
    harness.run_success(&["counter", "inc", &id]);

    harness
        .run_success(&["notifications", "list"])
        .stdout(predicate::str::contains("Goal reached!"))
        .stdout(predicate::str::contains("1 unread"));
    harness
        .run_success(&["today"])
        .stdout(predicate::str::contains("1 unread notification(s)"));

    harness
        .run_success(&["notifications", "read", "--all"])
        .stdout(predicate::str::contains("Marked 1 notification(s) as read"));
    harness
        .run_success(&["notifications", "list"])
        .stdout(predicate::str::contains("unread").not());

    harness
        .run_success(&["notifications", "clear", "--force"])
        .stdout(predicate::str::contains("Deleted 1 notification(s)"));
}

#[test]
fn test_day_and_month_views() {
    let harness = CliTestHarness::new();

    harness
        .run_success(&["today"])
        .stdout(predicate::str::contains("Today"))
        .stdout(predicate::str::contains("No tasks scheduled"));

    harness.run_success(&["task", "add", "Plan trip", "--on", "2030-05-14"]);
    harness
        .run_success(&["today", "--date", "2030-05-14"])
        .stdout(predicate::str::contains("Tuesday 2030-05-14"))
        .stdout(predicate::str::contains("Plan trip"))
        .stdout(predicate::str::contains("Completed: 0%"));

    harness
        .run_success(&["calendar", "--month", "2030-05-01"])
        .stdout(predicate::str::contains("May 2030"))
        .stdout(predicate::str::contains("Mon"))
        .stdout(predicate::str::contains("14 0/1"));
}

#[test]
fn test_reset_and_wipe() {
    let harness = CliTestHarness::new();

    harness.run_success(&["task", "add", "Read", "--days", "weekdays"]);
    harness.run_success(&["counter", "add", "Pages", "--kind", "weekly"]);

    harness
        .run_success(&["reset"])
        .stdout(predicate::str::contains("Checked 1 counter(s)"))
        .stdout(predicate::str::contains("0 reset, 0 initialized"));

    harness
        .run_success(&["wipe", "--force"])
        .stdout(predicate::str::contains("Deleted 1 task(s) and 1 counter(s)"));
    harness
        .run_success(&["task", "list"])
        .stdout(predicate::str::contains("No tasks found"));
}
