//! Period rollover for counters.
//!
//! A periodic counter accumulates inside a period (a day, a week, a month).
//! When the period of `today` differs from the period of `last_reset_date`
//! the counter is due: its value is archived as a [`CounterEntry`] dated
//! `last_reset_date`, then the live value drops by the archived amount and
//! `last_reset_date` moves to `today`.
//!
//! Archival is at-least-once with duplicate detection on
//! `(counter_id, date)`; the reset itself is a compare-and-set on
//! `last_reset_date`, so concurrent sessions converge on a single entry and a
//! single reset.

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::calendar;
use crate::error::CoreError;
use crate::models::{Counter, CounterEntry, CounterKind, NewCounterEntry};

/// Identifier of the reset cycle a date belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodKey {
    Day(NaiveDate),
    Week { year: i32, week: u32 },
    Month { year: i32, month: u32 },
}

/// Period of `date` for a counter of `kind`; `None` for cumulative counters.
pub fn period_key(kind: CounterKind, date: NaiveDate) -> Option<PeriodKey> {
    match kind {
        CounterKind::Daily => Some(PeriodKey::Day(date)),
        CounterKind::Weekly => {
            let (year, week) = calendar::week_of_year(date);
            Some(PeriodKey::Week { year, week })
        }
        CounterKind::Monthly => Some(PeriodKey::Month {
            year: date.year(),
            month: date.month(),
        }),
        CounterKind::Cumulative => None,
    }
}

/// Where a counter stands with respect to its reset cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetState {
    /// Inside the current period; nothing to do
    Accumulating,
    /// A new period began; the value accumulated since
    /// `previous_period_date` has not been archived yet
    DueForReset { previous_period_date: NaiveDate },
    /// No reset was ever recorded; the period starts today
    Uninitialized,
}

/// Classifies `counter` on `today` without touching storage.
pub fn evaluate(counter: &Counter, today: NaiveDate) -> ResetState {
    let Some(current) = period_key(counter.kind, today) else {
        return ResetState::Accumulating;
    };
    if counter.start_date.is_some_and(|start| today < start) {
        return ResetState::Accumulating;
    }
    let Some(last_reset) = counter.last_reset_date else {
        return ResetState::Uninitialized;
    };
    // Nothing accumulates after the end date, and a reset stamped in the
    // future (clock skew between sessions) is left alone.
    if counter.end_date.is_some_and(|end| last_reset > end) || last_reset > today {
        return ResetState::Accumulating;
    }
    if period_key(counter.kind, last_reset) == Some(current) {
        ResetState::Accumulating
    } else {
        ResetState::DueForReset {
            previous_period_date: last_reset,
        }
    }
}

/// Storage operations the reset engine relies on.
#[async_trait]
pub trait ResetStore: Send + Sync {
    /// Existing reset archive for `(counter_id, date)`, if any. Manual
    /// snapshots are ignored.
    async fn find_entry_for_date(
        &self,
        counter_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<CounterEntry>, CoreError>;

    /// Writes the single entry for `(counter_id, date)`. A manual snapshot
    /// already holding the slot is replaced; a reset archive is kept and
    /// `None` is returned.
    async fn upsert_entry(&self, entry: NewCounterEntry) -> Result<Option<CounterEntry>, CoreError>;

    /// Moves `last_reset_date` from `expected_last_reset` to `today` and
    /// subtracts `archived_value` (floored at zero) from the live value.
    /// Returns `false` when `last_reset_date` no longer matches.
    async fn commit_reset(
        &self,
        counter_id: Uuid,
        expected_last_reset: Option<NaiveDate>,
        today: NaiveDate,
        archived_value: u32,
    ) -> Result<bool, CoreError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResetOutcome {
    /// Still inside the current period
    UpToDate,
    /// First reset stamp written, nothing archived
    Initialized,
    /// Snapshot written (or found from an earlier attempt) and value reset
    Archived { entry: CounterEntry, reused: bool },
    /// Another session moved the counter to the new period first
    AlreadyReset,
}

/// Statistics collected during a reset pass
#[derive(Debug, Clone, Default)]
pub struct ResetSummary {
    /// Counters examined
    pub counters_checked: usize,
    /// Counters archived and reset by this pass
    pub counters_reset: usize,
    /// Counters stamped for the first time
    pub counters_initialized: usize,
    /// Counters another session had already reset
    pub already_reset: usize,
    /// Detailed error messages; the counters involved keep their stale value
    pub errors: Vec<String>,
    /// Time taken for the pass
    pub duration_ms: u64,
}

impl ResetSummary {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Archive-then-reset driver over a [`ResetStore`].
pub struct ResetEngine<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for ResetEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ResetStore + ?Sized> ResetEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Brings one counter into the period of `today`.
    ///
    /// # Behavior
    /// - Up-to-date counters are left untouched (safe to call on every refresh)
    /// - The snapshot is written before the reset; if the write fails the
    ///   error is returned and the counter keeps its value and reset date
    /// - An existing snapshot for the same period counts as confirmation
    pub async fn reset_counter(
        &self,
        counter: &Counter,
        today: NaiveDate,
    ) -> Result<ResetOutcome, CoreError> {
        match evaluate(counter, today) {
            ResetState::Accumulating => Ok(ResetOutcome::UpToDate),
            ResetState::Uninitialized => {
                let committed = self.store.commit_reset(counter.id, None, today, 0).await?;
                if committed {
                    debug!(counter_id = %counter.id, %today, "initialized reset date");
                    Ok(ResetOutcome::Initialized)
                } else {
                    Ok(ResetOutcome::AlreadyReset)
                }
            }
            ResetState::DueForReset {
                previous_period_date,
            } => self.archive_and_reset(counter, previous_period_date, today).await,
        }
    }

    async fn archive_and_reset(
        &self,
        counter: &Counter,
        previous_period_date: NaiveDate,
        today: NaiveDate,
    ) -> Result<ResetOutcome, CoreError> {
        let (entry, reused) = match self
            .store
            .find_entry_for_date(counter.id, previous_period_date)
            .await?
        {
            Some(existing) => (existing, true),
            None => {
                let snapshot = NewCounterEntry::archive_of(counter, previous_period_date);
                match self.store.upsert_entry(snapshot).await? {
                    Some(created) => (created, false),
                    // Lost a race with another writer between lookup and insert
                    None => {
                        let existing = self
                            .store
                            .find_entry_for_date(counter.id, previous_period_date)
                            .await?
                            .ok_or_else(|| {
                                CoreError::Conflict(format!(
                                    "entry for counter {} on {} vanished after a duplicate insert",
                                    counter.id, previous_period_date
                                ))
                            })?;
                        (existing, true)
                    }
                }
            }
        };

        if reused {
            debug!(
                counter_id = %counter.id,
                date = %previous_period_date,
                "snapshot already archived, finishing reset"
            );
        }

        let committed = self
            .store
            .commit_reset(counter.id, Some(previous_period_date), today, entry.value)
            .await?;

        if !committed {
            debug!(counter_id = %counter.id, "counter already reset by another session");
            return Ok(ResetOutcome::AlreadyReset);
        }

        info!(
            counter_id = %counter.id,
            name = %counter.name,
            archived_value = entry.value,
            period = %previous_period_date,
            "counter archived and reset"
        );
        Ok(ResetOutcome::Archived { entry, reused })
    }

    /// Runs [`Self::reset_counter`] over a batch.
    ///
    /// Failures are logged and collected in the summary; they never abort the
    /// pass, and the next pass retries them.
    pub async fn run(&self, counters: &[Counter], today: NaiveDate) -> ResetSummary {
        let started = Instant::now();
        let mut summary = ResetSummary::default();

        for counter in counters {
            summary.counters_checked += 1;
            match self.reset_counter(counter, today).await {
                Ok(ResetOutcome::UpToDate) => {}
                Ok(ResetOutcome::Initialized) => summary.counters_initialized += 1,
                Ok(ResetOutcome::Archived { .. }) => summary.counters_reset += 1,
                Ok(ResetOutcome::AlreadyReset) => summary.already_reset += 1,
                Err(e) => {
                    warn!(counter_id = %counter.id, error = %e, "counter reset failed, will retry");
                    summary
                        .errors
                        .push(format!("{} ({}): {}", counter.name, counter.id, e));
                }
            }
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        summary
    }
}
