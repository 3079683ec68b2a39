//! Wiring: buffer, gateway session, digest trigger, delivery sink.

use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use {anyhow::Context, tracing::info};

use {
    recap_buffer::{BufferHandle, FileStore, RetentionBuffer},
    recap_discord::{
        DirectMessageSink, GatewayConfig, GatewaySession, ReconnectPolicy, RestClient,
    },
    recap_schedule::{DigestConfig, DigestService},
};

use crate::{
    config::{AppConfig, Cli},
    status::Status,
};

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::from_cli(cli)?;

    let retention = RetentionBuffer::new(&config.source_channel_id, config.window_ms());
    let buffer = if config.no_persist {
        BufferHandle::new(retention)
    } else {
        let store = match &config.data_file {
            Some(path) => FileStore::new(path.clone()),
            None => FileStore::default_path().context("resolving buffer data file")?,
        };
        BufferHandle::with_store(retention, Arc::new(store))
    };
    let restored = buffer.hydrate(now_ms()).await.context("hydrating retention buffer")?;
    info!(restored, window_hours = config.window_hours, "retention buffer ready");

    let mut gateway_config = GatewayConfig::new(config.token.clone());
    gateway_config.reconnect = config.reconnect;
    gateway_config.ack_timeout = config.ack_timeout;
    let session = GatewaySession::new(gateway_config, buffer.clone());
    session.start().await.context("starting gateway session")?;

    let rest = RestClient::new(config.token.clone());
    let sink = Arc::new(DirectMessageSink::new(rest, config.recipient_id.clone()));
    let service = DigestService::new(buffer.clone(), sink, DigestConfig {
        schedule: config.schedule.clone(),
        empty_window: config.empty_window,
        timezone: config.timezone,
        enabled: true,
    });
    service.start().await.context("starting digest trigger")?;

    // The deferred strategy relies on this external tick to reconnect.
    let keepalive = (config.reconnect == ReconnectPolicy::Deferred).then(|| {
        let session = Arc::clone(&session);
        let every = Duration::from_secs(config.keepalive_secs.max(1));
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            tick.tick().await;
            loop {
                tick.tick().await;
                session.ensure_connected();
            }
        })
    });

    let status_task = {
        let session = Arc::clone(&session);
        let service = Arc::clone(&service);
        let buffer = buffer.clone();
        let every = Duration::from_secs(config.status_interval_secs.max(1));
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            tick.tick().await;
            loop {
                tick.tick().await;
                let status = Status::compose(
                    &session.status(),
                    &service.status().await,
                    buffer.len().await,
                );
                info!(
                    enabled = status.enabled,
                    connected = status.connected,
                    session_id = ?status.session_id,
                    messages_stored = status.messages_stored,
                    reconnect_attempts = status.reconnect_attempts,
                    "status"
                );
            }
        })
    };

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("shutting down");

    service.stop().await;
    session.stop().await;
    if let Some(handle) = keepalive {
        handle.abort();
    }
    status_task.abort();

    Ok(())
}
