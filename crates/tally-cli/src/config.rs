use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tally_core::notify::DEFAULT_ADVANCE_MINUTES;
use tally_core::service::DEFAULT_NOTIFICATION_RETENTION_DAYS;
use tally_core::timezone;

const CONFIG_FILE: &str = "tally.toml";
const ENV_PREFIX: &str = "TALLY_";

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    /// Owner of every record this CLI writes
    pub user_id: String,
    pub database_path: String,
    /// IANA name; "today" and midnight are computed in this zone
    pub timezone: String,
    /// Filter used when `RUST_LOG` is unset
    pub log_level: String,
    pub notifications: NotificationConfig,
    pub counters: CounterConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct NotificationConfig {
    /// Arm reminder timers in `tally watch`
    pub enabled: bool,
    pub default_advance_minutes: u32,
    pub retention_days: u32,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct CounterConfig {
    pub entry_retention_days: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_id: "local".to_string(),
            database_path: "tally.db".to_string(),
            timezone: detect_system_timezone(),
            log_level: "warn".to_string(),
            notifications: NotificationConfig::default(),
            counters: CounterConfig::default(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_advance_minutes: DEFAULT_ADVANCE_MINUTES,
            retention_days: DEFAULT_NOTIFICATION_RETENTION_DAYS,
        }
    }
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            entry_retention_days: 365,
        }
    }
}

impl Config {
    /// Defaults, then `tally.toml`, then `TALLY_*` variables. Nested keys use
    /// a double underscore, e.g. `TALLY_NOTIFICATIONS__ENABLED=false`.
    pub fn new() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// The configured zone, or UTC with a warning when the name is unknown.
    pub fn tz(&self) -> Tz {
        match timezone::parse_timezone(&self.timezone) {
            Ok(tz) => tz,
            Err(e) => {
                tracing::warn!(error = %e, suggestions = ?suggest_timezone(&self.timezone), "falling back to UTC");
                Tz::UTC
            }
        }
    }
}

/// Detects the system timezone, falling back to UTC if detection fails
pub fn detect_system_timezone() -> String {
    if let Ok(tz) = std::env::var("TZ") {
        if timezone::validate_timezone(&tz).is_ok() {
            return tz;
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Ok(tz) = std::fs::read_to_string("/etc/timezone") {
            let tz = tz.trim();
            if timezone::validate_timezone(tz).is_ok() {
                return tz.to_string();
            }
        }
    }

    if let Ok(local_tz) = iana_time_zone::get_timezone() {
        if timezone::validate_timezone(&local_tz).is_ok() {
            return local_tz;
        }
    }

    "UTC".to_string()
}

fn common_timezones() -> &'static [&'static str] {
    &[
        "UTC",
        "America/New_York",
        "America/Chicago",
        "America/Los_Angeles",
        "America/Sao_Paulo",
        "Europe/London",
        "Europe/Paris",
        "Europe/Berlin",
        "Europe/Rome",
        "Asia/Tokyo",
        "Asia/Kolkata",
        "Australia/Sydney",
    ]
}

/// Suggests similar timezone names when validation fails
pub fn suggest_timezone(invalid_tz: &str) -> Vec<String> {
    let lower_invalid = invalid_tz.to_lowercase();
    let mut suggestions: Vec<String> = common_timezones()
        .iter()
        .filter(|tz| {
            let lower_tz = tz.to_lowercase();
            lower_tz.contains(&lower_invalid)
                || lower_tz
                    .rsplit('/')
                    .next()
                    .is_some_and(|city| lower_invalid.contains(city))
        })
        .map(|tz| tz.to_string())
        .collect();

    if suggestions.is_empty() {
        suggestions.extend(common_timezones().iter().take(5).map(|s| s.to_string()));
    }
    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_without_sources() {
        Jail::expect_with(|_jail| {
            let config = Config::new()?;
            assert_eq!(config.user_id, "local");
            assert_eq!(config.database_path, "tally.db");
            assert!(config.notifications.enabled);
            assert_eq!(config.notifications.default_advance_minutes, 10);
            assert_eq!(config.notifications.retention_days, 30);
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env_precedence() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "tally.toml",
                r#"
                user_id = "ada"
                timezone = "Europe/Rome"

                [notifications]
                default_advance_minutes = 25
                "#,
            )?;
            jail.set_env("TALLY_USER_ID", "grace");
            jail.set_env("TALLY_NOTIFICATIONS__ENABLED", "false");

            let config = Config::new()?;
            assert_eq!(config.user_id, "grace");
            assert_eq!(config.tz(), chrono_tz::Europe::Rome);
            assert_eq!(config.notifications.default_advance_minutes, 25);
            assert!(!config.notifications.enabled);
            Ok(())
        });
    }

    #[test]
    fn test_unknown_timezone_falls_back_to_utc() {
        let config = Config {
            timezone: "Mars/Olympus".to_string(),
            ..Config::default()
        };
        assert_eq!(config.tz(), Tz::UTC);
    }

    #[test]
    fn test_suggest_timezone() {
        assert_eq!(suggest_timezone("paris"), vec!["Europe/Paris".to_string()]);
        assert_eq!(suggest_timezone("Europe/Tokyo"), vec!["Asia/Tokyo".to_string()]);
        assert_eq!(suggest_timezone("nowhere").len(), 5);
    }
}
