use std::{sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;
use client_core::{
    config::{load_settings, prepare_database_url},
    ActiveMirror, CommandService, LocalCommandService, ResizeEffect, SyncOutcome,
};
use shared::domain::ActiveSnapshot;
use tokio::time::{self, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    database_url: Option<String>,
    /// Poll period in milliseconds.
    #[arg(long)]
    interval_ms: Option<u64>,
    /// Stop after this many polls instead of waiting for Ctrl-C.
    #[arg(long)]
    ticks: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(url) = args.database_url {
        settings.database_url = url;
    }
    if let Some(interval_ms) = args.interval_ms {
        settings.poll_interval_ms = interval_ms;
    }
    let database_url = prepare_database_url(&settings.database_url);

    let service: Arc<dyn CommandService> =
        Arc::new(LocalCommandService::open(&database_url).await?);
    let mirror = ActiveMirror::new(service);
    let resize = ResizeEffect::new(settings.observer_row_height);
    info!(
        database_url = %database_url,
        interval_ms = settings.poll_interval().as_millis() as u64,
        "sidebar observer started"
    );

    match args.ticks {
        Some(ticks) => run_ticks(&mirror, settings.poll_interval(), ticks, resize).await,
        None => run_until_interrupted(&mirror, settings.poll_interval(), resize).await?,
    }

    info!("sidebar observer stopped");
    Ok(())
}

async fn run_ticks(mirror: &ActiveMirror, period: Duration, ticks: u32, mut resize: ResizeEffect) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    for _ in 0..ticks {
        interval.tick().await;
        match mirror.tick().await {
            Ok(SyncOutcome::Adopted) => render(&mirror.current(), &mut resize),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "active snapshot poll failed"),
        }
    }
    mirror.dispose();
}

async fn run_until_interrupted(
    mirror: &Arc<ActiveMirror>,
    period: Duration,
    mut resize: ResizeEffect,
) -> Result<()> {
    let mut adopted = mirror.subscribe();
    let handle = mirror.spawn(period);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            changed = adopted.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = adopted.borrow_and_update().clone();
                render(&snapshot, &mut resize);
            }
            signal = &mut shutdown => {
                signal?;
                break;
            }
        }
    }

    handle.dispose();
    Ok(())
}

fn render(snapshot: &ActiveSnapshot, resize: &mut ResizeEffect) {
    let members: Vec<String> = snapshot
        .characters
        .iter()
        .map(|member| {
            let marker = if member.enabled { "" } else { " (off)" };
            format!("{} [{}]{marker}", member.name, member.icon_key())
        })
        .collect();
    info!(
        focus = snapshot.focus.0,
        members = %members.join(", "),
        "active characters"
    );

    if let Some(height) = resize.observe(snapshot) {
        info!(height, "observer resized");
    }
}
