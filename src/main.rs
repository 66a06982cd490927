//! Wiring & DI. Entry point: bootstrap adapters, inject into services, run.
//! No business logic here.
//!
//! Usage:
//!   habot                         one scheduled run
//!   habot watch                   repeat the run every poll interval
//!   habot send-pm <user-id> <text>
//!   habot birthday-reminder       send today's birthday reminder now

use dotenv::dotenv;
use habot::adapters::habitica::HabiticaClient;
use habot::adapters::persistence::{QuestionJson, SqliteRepo, load_static_tasks};
use habot::ports::{EventLog, HabiticaGateway, MemberRepo, MessageRepo, QuestionStore};
use habot::shared::config::AppConfig;
use habot::usecases::{
    AccountService, BirthdayService, CommandDispatcher, Handlers, InactiveMembers, InboxService,
    Messenger, NewsletterService, PartySync, QuestService, Schedule, ScheduledRun,
    SharingWeekendService, SharingWeekendSettings,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

enum Mode {
    RunOnce,
    Watch,
    SendPm { to: String, text: String },
    BirthdayReminder,
}

fn parse_args(args: &[String]) -> anyhow::Result<Mode> {
    match args.first().map(String::as_str) {
        None => Ok(Mode::RunOnce),
        Some("watch") => Ok(Mode::Watch),
        Some("birthday-reminder") => Ok(Mode::BirthdayReminder),
        Some("send-pm") => match args {
            [_, to, text @ ..] if !text.is_empty() => Ok(Mode::SendPm {
                to: to.clone(),
                text: text.join(" "),
            }),
            _ => anyhow::bail!("usage: habot send-pm <user-id> <text>"),
        },
        Some(other) => anyhow::bail!(
            "unknown subcommand `{}` (expected watch, send-pm or birthday-reminder)",
            other
        ),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mode = parse_args(&args)?;

    let cfg = AppConfig::load().map_err(|e| anyhow::anyhow!("configuration: {}", e))?;
    let credentials = cfg.credentials().map_err(|e| anyhow::anyhow!("{}", e))?;

    let data_path = PathBuf::from(cfg.data_dir_or_default());
    tokio::fs::create_dir_all(&data_path)
        .await
        .map_err(|e| anyhow::anyhow!("create data dir: {}", e))?;
    info!(path = %data_path.display(), "data directory");

    // --- Adapters ---
    let habitica: Arc<dyn HabiticaGateway> = Arc::new(HabiticaClient::new(
        cfg.api_base_url_or_default(),
        credentials,
        cfg.max_retries_or_default(),
        Duration::from_secs(cfg.retry_after_secs_or_default()),
    ));
    let sqlite_repo = Arc::new(
        SqliteRepo::connect(&data_path)
            .await
            .map_err(|e| anyhow::anyhow!("SQLite connect failed: {}", e))?,
    );
    let members: Arc<dyn MemberRepo> = Arc::clone(&sqlite_repo) as Arc<dyn MemberRepo>;
    let messages: Arc<dyn MessageRepo> = Arc::clone(&sqlite_repo) as Arc<dyn MessageRepo>;
    let events: Arc<dyn EventLog> = Arc::clone(&sqlite_repo) as Arc<dyn EventLog>;
    let questions: Arc<dyn QuestionStore> =
        Arc::new(QuestionJson::new(cfg.questions_path_or_default()));
    let static_tasks = load_static_tasks(cfg.static_tasks_path_or_default())
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let bot = habitica
        .get_user()
        .await
        .map_err(|e| anyhow::anyhow!("cannot reach Habitica as the bot: {}", e))?;
    info!(id = %bot.id, login = %bot.login_name, "authenticated");
    let admin_id = cfg.admin_user_id();
    if admin_id.is_none() {
        warn!("HABOT_ADMIN_USER_ID not set, administrator commands are disabled");
    }

    // --- Services ---
    let messenger = Arc::new(Messenger::new(Arc::clone(&habitica), cfg.pm_sent_habit()));
    let inbox = Arc::new(InboxService::new(
        Arc::clone(&habitica),
        Arc::clone(&messages),
        bot.id.clone(),
    ));
    let party_sync = Arc::new(PartySync::new(Arc::clone(&habitica), Arc::clone(&members)));
    let birthdays = Arc::new(BirthdayService::new(
        Arc::clone(&members),
        Arc::clone(&events),
        Arc::clone(&messenger),
    ));
    let quests = Arc::new(QuestService::new(
        Arc::clone(&habitica),
        Arc::clone(&members),
        Arc::clone(&messenger),
        bot.id.clone(),
    ));
    let sharing = Arc::new(SharingWeekendService::new(
        Arc::clone(&habitica),
        questions,
        Arc::clone(&events),
        SharingWeekendSettings {
            name_prefix: cfg.challenge_name_prefix_or_default(),
            summary: cfg.challenge_summary_or_default(),
            description: cfg.challenge_description_or_default(),
            static_tasks,
            seed_weekday: cfg.winner_seed_weekday_or_default(),
            winner_picked_habit: cfg.winner_picked_habit(),
        },
    ));
    let dispatcher = Arc::new(CommandDispatcher::new(
        Handlers {
            inbox: Arc::clone(&inbox),
            messenger: Arc::clone(&messenger),
            members: Arc::clone(&members),
            party_sync: Arc::clone(&party_sync),
            birthdays: Arc::clone(&birthdays),
            quests: Arc::clone(&quests),
            newsletter: Arc::new(NewsletterService::new(
                Arc::clone(&members),
                Arc::clone(&messenger),
                bot.id.clone(),
                admin_id.clone(),
            )),
            sharing: Arc::clone(&sharing),
            inactive: Arc::new(InactiveMembers::new(
                Arc::clone(&members),
                cfg.inactivity_threshold_days_or_default(),
                cfg.allow_inactivity_from(),
            )),
            account: Arc::new(AccountService::new(Arc::clone(&habitica))),
        },
        admin_id.clone(),
        cfg.birthday_recipient_id(),
    ));
    let run = ScheduledRun::new(
        inbox,
        dispatcher,
        Arc::clone(&party_sync),
        Arc::clone(&birthdays),
        quests,
        sharing,
        Arc::clone(&messenger),
        Schedule {
            challenge_creation: cfg.challenge_creation_weekday_or_default(),
            winner_award: cfg.winner_award_weekday_or_default(),
        },
        admin_id,
        cfg.birthday_recipient_id(),
    );

    // --- Run ---
    let today = chrono::Local::now().date_naive();
    match mode {
        Mode::RunOnce => {
            let report = run.run_once(today).await;
            if report.is_failure() {
                anyhow::bail!("run failed: {} steps failed", report.failed());
            }
        }
        Mode::Watch => {
            run.watch(
                Duration::from_secs(cfg.poll_interval_secs_or_default()),
                cfg.max_consecutive_failures_or_default(),
            )
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        }
        Mode::SendPm { to, text } => {
            messenger
                .send(&to, &text)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            info!(to = %to, "private message sent");
        }
        Mode::BirthdayReminder => {
            let Some(recipient) = cfg.birthday_recipient_id() else {
                anyhow::bail!("set HABOT_BIRTHDAY_RECIPIENT_ID or HABOT_ADMIN_USER_ID");
            };
            party_sync
                .sync()
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            let named = birthdays
                .send_reminders(&recipient, today)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            info!(named, "birthday reminder done");
        }
    }

    Ok(())
}
