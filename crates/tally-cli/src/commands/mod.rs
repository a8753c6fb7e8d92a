use dialoguer::Confirm;

pub mod counter;
pub mod maintenance;
pub mod notification;
pub mod task;
pub mod view;
pub mod watch;

/// Asks before a destructive action unless `force` is set.
pub fn confirm(prompt: &str, force: bool) -> bool {
    if force {
        return true;
    }
    let confirmed = Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .unwrap_or(false);
    if !confirmed {
        println!("Cancelled.");
    }
    confirmed
}
