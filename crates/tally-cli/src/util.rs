use anyhow::{anyhow, Result};
use tally_core::error::CoreError;
use tally_core::repository::Repository;
use uuid::Uuid;

/// Characters of an id shown in tables and accepted back as a prefix.
pub const SHORT_ID_LEN: usize = 8;

pub fn short_id(id: &Uuid) -> String {
    id.to_string()[..SHORT_ID_LEN].to_string()
}

fn check_prefix(short_id: &str) -> Result<()> {
    if short_id.len() < 2 {
        return Err(anyhow!(CoreError::InvalidInput(
            "Short ID must be at least 2 characters long.".to_string()
        )));
    }
    Ok(())
}

/// Picks the single match of a prefix lookup.
fn unique_match(what: &str, short_id: &str, matches: Vec<(Uuid, String)>) -> Result<Uuid> {
    match matches.as_slice() {
        [(id, _)] => Ok(*id),
        [] => Err(anyhow!(CoreError::NotFound(format!(
            "No {} found with ID prefix '{}'",
            what, short_id
        )))),
        _ => Err(anyhow!(CoreError::AmbiguousId(
            matches
                .into_iter()
                .map(|(id, label)| (id.to_string(), label))
                .collect()
        ))),
    }
}

pub async fn resolve_task_id<R: Repository + ?Sized>(
    repo: &R,
    user_id: &str,
    short_id: &str,
) -> Result<Uuid> {
    check_prefix(short_id)?;
    let tasks = repo.find_tasks_by_short_id_prefix(user_id, short_id).await?;
    unique_match(
        "task",
        short_id,
        tasks.into_iter().map(|t| (t.id, t.title)).collect(),
    )
}

pub async fn resolve_counter_id<R: Repository + ?Sized>(
    repo: &R,
    user_id: &str,
    short_id: &str,
) -> Result<Uuid> {
    check_prefix(short_id)?;
    let counters = repo
        .find_counters_by_short_id_prefix(user_id, short_id)
        .await?;
    unique_match(
        "counter",
        short_id,
        counters.into_iter().map(|c| (c.id, c.name)).collect(),
    )
}

pub async fn resolve_notification_id<R: Repository + ?Sized>(
    repo: &R,
    user_id: &str,
    short_id: &str,
) -> Result<Uuid> {
    check_prefix(short_id)?;
    let notifications = repo
        .find_notifications_by_short_id_prefix(user_id, short_id)
        .await?;
    unique_match(
        "notification",
        short_id,
        notifications.into_iter().map(|n| (n.id, n.title)).collect(),
    )
}
