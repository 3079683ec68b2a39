//! CLI arguments and validated application configuration.

use std::path::PathBuf;

use {
    anyhow::{Context, bail},
    chrono_tz::Tz,
    clap::Parser,
    secrecy::Secret,
};

use {
    recap_discord::ReconnectPolicy,
    recap_schedule::{EmptyWindowPolicy, TriggerSchedule},
};

#[derive(Parser, Debug)]
#[command(name = "recap", about = "Scheduled channel digests, delivered by DM")]
pub struct Cli {
    /// Bot token.
    #[arg(long, env = "RECAP_DISCORD_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Channel watched for messages.
    #[arg(long, env = "RECAP_SOURCE_CHANNEL_ID")]
    pub source_channel_id: Option<String>,

    /// User the digest is direct-messaged to.
    #[arg(long, env = "RECAP_RECIPIENT_ID")]
    pub recipient_id: Option<String>,

    /// Retention window in hours.
    #[arg(long, env = "RECAP_WINDOW_HOURS", default_value_t = 24)]
    pub window_hours: u32,

    /// Cron expression for the digest schedule (UTC).
    #[arg(long, env = "RECAP_CRON", conflicts_with_all = ["daily_hour", "once_in_secs"])]
    pub cron: Option<String>,

    /// Fire at this hour of day (UTC). Default schedule when nothing else
    /// is given: hour 9.
    #[arg(long, env = "RECAP_DAILY_HOUR", conflicts_with = "once_in_secs")]
    pub daily_hour: Option<u32>,

    /// Fire once after this many seconds, then disable. For manual
    /// verification without waiting for the recurring schedule.
    #[arg(long)]
    pub once_in_secs: Option<u64>,

    /// Send a "no activity" notice when the window is empty instead of
    /// skipping the digest.
    #[arg(long, default_value_t = false)]
    pub empty_notice: bool,

    /// Reconnect strategy: backoff or deferred.
    #[arg(long, env = "RECAP_RECONNECT", default_value = "backoff")]
    pub reconnect: String,

    /// Keep-alive interval in seconds, used by the deferred strategy.
    #[arg(long, env = "RECAP_KEEPALIVE_SECS", default_value_t = 300)]
    pub keepalive_secs: u64,

    /// Do not force-close the connection on a missed heartbeat ack.
    #[arg(long, default_value_t = false)]
    pub no_ack_timeout: bool,

    /// Timezone for time-of-day display in digests.
    #[arg(long, env = "RECAP_TIMEZONE", default_value = "UTC")]
    pub timezone: String,

    /// Buffer persistence file. Defaults to ~/.recap/events.json.
    #[arg(long, env = "RECAP_DATA_FILE")]
    pub data_file: Option<PathBuf>,

    /// Keep the retention buffer in memory only.
    #[arg(long, default_value_t = false)]
    pub no_persist: bool,

    /// Interval in seconds between status snapshots in the log.
    #[arg(long, default_value_t = 60)]
    pub status_interval_secs: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    pub json_logs: bool,
}

/// Validated configuration consumed by the core components. Missing required
/// values fail here, at startup, with a clear cause.
pub struct AppConfig {
    pub token: Secret<String>,
    pub source_channel_id: String,
    pub recipient_id: String,
    pub window_hours: u32,
    pub schedule: TriggerSchedule,
    pub empty_window: EmptyWindowPolicy,
    pub reconnect: ReconnectPolicy,
    pub keepalive_secs: u64,
    pub ack_timeout: bool,
    pub timezone: Tz,
    pub data_file: Option<PathBuf>,
    pub no_persist: bool,
    pub status_interval_secs: u64,
}

impl AppConfig {
    pub fn from_cli(cli: Cli) -> anyhow::Result<Self> {
        let token = required(cli.token, "bot token (--token / RECAP_DISCORD_TOKEN)")?;
        let source_channel_id = required(
            cli.source_channel_id,
            "source channel (--source-channel-id / RECAP_SOURCE_CHANNEL_ID)",
        )?;
        let recipient_id = required(
            cli.recipient_id,
            "digest recipient (--recipient-id / RECAP_RECIPIENT_ID)",
        )?;

        if cli.window_hours == 0 {
            bail!("retention window must be at least one hour");
        }

        let schedule = match (cli.cron, cli.daily_hour, cli.once_in_secs) {
            (Some(expr), _, _) => TriggerSchedule::Cron { expr },
            (None, Some(hour), _) => TriggerSchedule::Daily { hour },
            (None, None, Some(secs)) => TriggerSchedule::Once {
                delay_ms: secs * 1000,
            },
            (None, None, None) => TriggerSchedule::Daily { hour: 9 },
        };

        let timezone: Tz = cli
            .timezone
            .parse()
            .map_err(|_| anyhow::anyhow!("unknown timezone: {}", cli.timezone))?;

        let reconnect: ReconnectPolicy = cli
            .reconnect
            .parse()
            .context("bad --reconnect value")?;

        Ok(Self {
            token: Secret::new(token),
            source_channel_id,
            recipient_id,
            window_hours: cli.window_hours,
            schedule,
            empty_window: if cli.empty_notice {
                EmptyWindowPolicy::Notice
            } else {
                EmptyWindowPolicy::Skip
            },
            reconnect,
            keepalive_secs: cli.keepalive_secs,
            ack_timeout: !cli.no_ack_timeout,
            timezone,
            data_file: cli.data_file,
            no_persist: cli.no_persist,
            status_interval_secs: cli.status_interval_secs,
        })
    }

    pub fn window_ms(&self) -> u64 {
        u64::from(self.window_hours) * 60 * 60 * 1000
    }
}

fn required(value: Option<String>, what: &str) -> anyhow::Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => bail!("missing required configuration: {what}"),
    }
}
