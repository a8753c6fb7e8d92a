use anyhow::Result;
use tally_core::repository::Repository;
use tally_core::service::Tracker;

use crate::cli::ForceFlag;
use crate::commands::confirm;
use crate::views::table::display_reset_summary;

/// Runs one reset pass; exits with an error when any counter failed.
pub async fn reset<R: Repository + ?Sized>(tracker: &Tracker<R>) -> Result<()> {
    let (_, summary) = tracker.refresh_counters().await?;
    display_reset_summary(&summary);
    if summary.has_errors() {
        anyhow::bail!("{} counter(s) could not be reset", summary.errors.len());
    }
    Ok(())
}

pub async fn wipe<R: Repository + ?Sized>(tracker: &Tracker<R>, flag: ForceFlag) -> Result<()> {
    if !confirm(
        "Delete ALL tasks and counters? This cannot be undone.",
        flag.force,
    ) {
        return Ok(());
    }
    let summary = tracker.reset_all_data().await?;
    println!(
        "Deleted {} task(s) and {} counter(s)",
        summary.tasks, summary.counters
    );
    Ok(())
}
