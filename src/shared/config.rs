//! Application configuration. API credentials, paths, schedule.

use chrono::Weekday;
use serde::Deserialize;

use crate::domain::DomainError;

pub const DEFAULT_API_BASE_URL: &str = "https://habitica.com";

/// Habitica rejects private messages much longer than this.
pub const MAX_MESSAGE_LENGTH: usize = 3000;

/// Refuse to split one reply into more private messages than this.
pub const MAX_MESSAGE_PARTS: usize = 3;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct AppConfig {
    /// Bot account user id. Read from HABOT_USER_ID.
    pub user_id: Option<String>,
    /// Bot account API token. Read from HABOT_API_TOKEN.
    pub api_token: Option<String>,
    /// Value for the x-client header. Defaults to "<user_id>-habot".
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// User allowed to run administrator commands. Read from HABOT_ADMIN_USER_ID.
    #[serde(default)]
    pub admin_user_id: Option<String>,
    /// Who gets the daily birthday reminder. Defaults to the administrator.
    #[serde(default)]
    pub birthday_recipient_id: Option<String>,

    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub questions_path: Option<String>,
    #[serde(default)]
    pub static_tasks_path: Option<String>,

    // ─────────────────────────────────────────────────────────────────────────
    // HTTP
    // ─────────────────────────────────────────────────────────────────────────
    /// Extra attempts after a 429 response (default 3).
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Sleep after a 429 without Retry-After, in seconds (default 60).
    #[serde(default)]
    pub retry_after_secs: Option<u64>,

    // ─────────────────────────────────────────────────────────────────────────
    // Habits ticked by the bot
    // ─────────────────────────────────────────────────────────────────────────
    #[serde(default)]
    pub pm_sent_habit: Option<String>,
    #[serde(default)]
    pub winner_picked_habit: Option<String>,

    // ─────────────────────────────────────────────────────────────────────────
    // Party management
    // ─────────────────────────────────────────────────────────────────────────
    #[serde(default)]
    pub inactivity_threshold_days: Option<u64>,
    /// Comma-separated login names never reported as inactive.
    #[serde(default)]
    pub allow_inactivity_from: Option<String>,

    #[serde(default)]
    pub challenge_name_prefix: Option<String>,
    #[serde(default)]
    pub challenge_summary: Option<String>,
    #[serde(default)]
    pub challenge_description: Option<String>,
    /// Weekday names, e.g. "Tue".
    #[serde(default)]
    pub challenge_creation_weekday: Option<String>,
    #[serde(default)]
    pub winner_award_weekday: Option<String>,
    /// The winner draw is seeded with the most recent date falling on this weekday.
    #[serde(default)]
    pub winner_seed_weekday: Option<String>,

    // ─────────────────────────────────────────────────────────────────────────
    // Watch mode
    // ─────────────────────────────────────────────────────────────────────────
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub max_consecutive_failures: Option<u32>,
}

/// Credentials the bot cannot start without.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user_id: String,
    pub api_token: String,
    pub client_id: String,
}

impl AppConfig {
    /// Environment (and .env), plus the file named by HABOT_CONFIG if set.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        Self::load_from(std::env::var("HABOT_CONFIG").ok().as_deref())
    }

    /// A named file that is missing or malformed is an error.
    pub fn load_from(file: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut c = config::Config::builder();
        c = c.add_source(config::Environment::with_prefix("HABOT"));
        if let Some(path) = file {
            c = c.add_source(config::File::with_name(path));
        }
        c.build()?.try_deserialize()
    }

    /// Bot credentials. Missing or empty values are a configuration error.
    pub fn credentials(&self) -> Result<Credentials, DomainError> {
        let user_id = non_empty(&self.user_id)
            .ok_or_else(|| DomainError::Config("Set HABOT_USER_ID (env or .env)".into()))?;
        let api_token = non_empty(&self.api_token)
            .ok_or_else(|| DomainError::Config("Set HABOT_API_TOKEN (env or .env)".into()))?;
        let client_id = non_empty(&self.client_id).unwrap_or_else(|| format!("{}-habot", user_id));
        Ok(Credentials {
            user_id,
            api_token,
            client_id,
        })
    }

    pub fn api_base_url_or_default(&self) -> String {
        non_empty(&self.api_base_url)
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
    }

    pub fn admin_user_id(&self) -> Option<String> {
        non_empty(&self.admin_user_id)
    }

    /// Birthday reminder recipient: explicit setting, else the administrator.
    pub fn birthday_recipient_id(&self) -> Option<String> {
        non_empty(&self.birthday_recipient_id).or_else(|| self.admin_user_id())
    }

    pub fn data_dir_or_default(&self) -> String {
        non_empty(&self.data_dir).unwrap_or_else(|| "./data".to_string())
    }

    pub fn questions_path_or_default(&self) -> String {
        non_empty(&self.questions_path)
            .unwrap_or_else(|| format!("{}/weekly_questions.json", self.data_dir_or_default()))
    }

    pub fn static_tasks_path_or_default(&self) -> String {
        non_empty(&self.static_tasks_path).unwrap_or_else(|| {
            format!(
                "{}/sharing_weekend_static_tasks.json",
                self.data_dir_or_default()
            )
        })
    }

    pub fn max_retries_or_default(&self) -> u32 {
        self.max_retries.unwrap_or(3)
    }

    pub fn retry_after_secs_or_default(&self) -> u64 {
        self.retry_after_secs.unwrap_or(60)
    }

    pub fn pm_sent_habit(&self) -> Option<String> {
        non_empty(&self.pm_sent_habit)
    }

    pub fn winner_picked_habit(&self) -> Option<String> {
        non_empty(&self.winner_picked_habit)
    }

    /// Days without login before a member counts as inactive. Defaults to 90.
    pub fn inactivity_threshold_days_or_default(&self) -> u64 {
        self.inactivity_threshold_days.unwrap_or(3 * 30)
    }

    /// Login names exempt from inactivity reports, without leading '@'.
    pub fn allow_inactivity_from(&self) -> Vec<String> {
        self.allow_inactivity_from
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().trim_start_matches('@').to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn challenge_name_prefix_or_default(&self) -> String {
        non_empty(&self.challenge_name_prefix).unwrap_or_else(|| "Sharing Weekend".to_string())
    }

    pub fn challenge_summary_or_default(&self) -> String {
        non_empty(&self.challenge_summary).unwrap_or_else(|| {
            "Share something about yourself with the party over the weekend!".to_string()
        })
    }

    pub fn challenge_description_or_default(&self) -> String {
        non_empty(&self.challenge_description).unwrap_or_else(|| {
            "Answer this week's question in the party chat. Everyone who completes all tasks \
             takes part in the winner draw."
                .to_string()
        })
    }

    pub fn challenge_creation_weekday_or_default(&self) -> Weekday {
        parse_weekday(&self.challenge_creation_weekday).unwrap_or(Weekday::Tue)
    }

    pub fn winner_award_weekday_or_default(&self) -> Weekday {
        parse_weekday(&self.winner_award_weekday).unwrap_or(Weekday::Tue)
    }

    pub fn winner_seed_weekday_or_default(&self) -> Weekday {
        parse_weekday(&self.winner_seed_weekday).unwrap_or(Weekday::Tue)
    }

    /// Watch-mode sleep between runs. Defaults to 60 seconds.
    pub fn poll_interval_secs_or_default(&self) -> u64 {
        self.poll_interval_secs.unwrap_or(60)
    }

    /// Watch mode stops after this many failing runs in a row. Defaults to 5.
    pub fn max_consecutive_failures_or_default(&self) -> u32 {
        self.max_consecutive_failures.unwrap_or(5)
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn parse_weekday(value: &Option<String>) -> Option<Weekday> {
    value.as_deref().and_then(|s| s.trim().parse().ok())
}
