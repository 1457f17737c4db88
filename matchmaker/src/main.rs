//! Command-line entry point
//!
//! Each subcommand runs one job and exits; scheduling is left to cron or a
//! similar runner.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgGroup, Parser, Subcommand};
use matchmaker::{
    Matchmaker, MatchmakerConfig, MatchmakerError, MatchmakerResult, RoundOptions,
    core::{ListedOrder, PoolOrder, ReconcileMode, ShuffledOrder},
    services::{SlackClient, SqliteStore},
};
use shared::{Job, MatchId, PlatformUserId, job_debug, job_info, job_warn, logging};

/// Pairs community members for coffee chats over Slack
#[derive(Parser)]
#[command(name = "matchmaker")]
#[command(about = "Pairs community members for recurring coffee chats")]
pub struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// SQLite database file (overrides MATCHMAKER_DATABASE)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Mirror the announcement channel's members into the database
    Sync,

    /// Run a pairing round and announce the new matches
    Pair {
        /// Keep the previous round's matches current
        #[arg(long)]
        keep_current: bool,

        /// Pair members in database order instead of shuffling
        #[arg(long)]
        ordered: bool,

        /// Do not sync members before pairing
        #[arg(long)]
        skip_sync: bool,
    },

    /// Recover group channel ids for matches that lost them
    Reconcile {
        /// strict or best-fit
        #[arg(long, default_value = "best-fit")]
        mode: ReconcileMode,
    },

    /// Remind unmet groups to confirm their chat
    Remind {
        /// Only matches at least this old (defaults to MATCHMAKER_REMINDER_DAYS)
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..))]
        older_than_days: Option<i64>,
    },

    /// Mark a match as met, or revert it
    #[command(group(ArgGroup::new("target").required(true).args(["match_id", "user"])))]
    Confirm {
        #[arg(long)]
        match_id: Option<i64>,

        /// Slack user id; confirms that user's current match
        #[arg(long)]
        user: Option<String>,

        #[arg(long)]
        revert: bool,
    },
}

impl Command {
    fn job(&self) -> Job {
        match self {
            Command::Sync => Job::Sync,
            Command::Pair { .. } => Job::Pair,
            Command::Reconcile { .. } => Job::Reconcile,
            Command::Remind { .. } => Job::Remind,
            Command::Confirm { .. } => Job::Confirm,
        }
    }
}

#[tokio::main]
async fn main() -> MatchmakerResult<()> {
    let args = Args::parse();

    let job = Job::init(args.command.job());
    logging::init_tracing(Some(&args.log_level));
    logging::log_startup(job, "matchmaker");

    let mut config = MatchmakerConfig::from_env()?;
    if let Some(database) = args.database {
        config.database = database;
    }
    job_debug!(job, "Database: {}", config.database.display());

    if let Err(e) = run(args.command, &config).await {
        logging::log_error(job, "Job failed", &e);
        return Err(e);
    }
    Ok(())
}

async fn run(command: Command, config: &MatchmakerConfig) -> MatchmakerResult<()> {
    let store = Arc::new(SqliteStore::open(&config.database)?);
    let slack = SlackClient::with_base_url(&config.bot_token, &config.api_base)?.with_retries(config.http_retries);

    let order: Box<dyn PoolOrder> = match &command {
        Command::Pair { ordered: true, .. } => Box::new(ListedOrder),
        _ => Box::new(ShuffledOrder),
    };
    let matchmaker =
        Matchmaker::new(store, slack.clone(), slack, order).with_system_identity(config.bot_user_id.clone());

    match command {
        Command::Sync => {
            let channel = config.require_channel()?;
            matchmaker.sync_members(channel).await?;
        }
        Command::Pair {
            keep_current,
            skip_sync,
            ..
        } => {
            match (&config.channel_id, skip_sync) {
                (Some(channel), false) => {
                    matchmaker.sync_members(channel).await?;
                }
                (None, false) => job_warn!(Job::current(), "SLACK_CHANNEL_ID not set, pairing without sync"),
                _ => {}
            }
            let options = RoundOptions {
                retire_current: !keep_current,
                summary_channel: config.channel_id.clone(),
            };
            let summary = matchmaker.run_pairing_round(&options).await?;
            for failed in &summary.report.failed {
                job_warn!(Job::current(), "Not saved: {} ({})", failed.members, failed.error);
            }
        }
        Command::Reconcile { mode } => {
            let summary = matchmaker.reconcile_channels(mode).await?;
            job_info!(
                Job::current(),
                "{} resolved, {} unresolved",
                summary.resolved.len(),
                summary.unresolved.len()
            );
        }
        Command::Remind { older_than_days } => {
            let older_than = reminder_age(older_than_days.unwrap_or(config.reminder_days))?;
            matchmaker.send_reminders(older_than).await?;
        }
        Command::Confirm {
            match_id,
            user,
            revert,
        } => {
            let record = match (match_id, user) {
                (Some(id), _) if revert => matchmaker.revert_meeting(MatchId(id)).await?,
                (Some(id), _) => matchmaker.confirm_meeting(MatchId(id)).await?,
                (None, Some(user)) => matchmaker.confirm_for_user(&PlatformUserId::new(user), !revert).await?,
                (None, None) => {
                    return Err(MatchmakerError::config("confirm", "pass --match-id or --user"));
                }
            };
            logging::log_success(
                Job::current(),
                &format!("Match {} is now {}", record.id, if record.met { "met" } else { "pending" }),
            );
        }
    }
    Ok(())
}

fn reminder_age(days: i64) -> MatchmakerResult<chrono::Duration> {
    chrono::Duration::try_days(days)
        .filter(|age| *age >= chrono::Duration::zero())
        .ok_or_else(|| MatchmakerError::config("reminder age", format!("{days} days is out of range")))
}
