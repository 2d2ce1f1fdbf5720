//! Command implementations

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use airq_core::{SamplingState, SessionBuilder, SessionConfig, Schedule};
use airq_vendors::{HttpConfig, WaqiClient};
use anyhow::{Context, Result};
use serde::Deserialize;

use super::RunArgs;

/// Contents of a configuration file
#[derive(Debug, Deserialize)]
pub struct FileConfig {
    /// Session settings
    #[serde(flatten)]
    pub session: SessionConfig,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// WAQI endpoint override
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Load a configuration file
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

/// Merge the optional config file with command line flags
pub fn resolve_config(args: &RunArgs) -> Result<FileConfig> {
    let mut file = match (&args.config, args.bounds) {
        (Some(path), _) => load_config(path)?,
        (None, Some(bounds)) => FileConfig {
            session: SessionConfig::new(bounds),
            http: HttpConfig::default(),
            base_url: None,
        },
        (None, None) => anyhow::bail!("either --config or --bounds is required"),
    };

    let session = &mut file.session;
    if let Some(bounds) = args.bounds {
        session.bounds = bounds;
    }
    if let Some(period) = args.period {
        session.period_minutes = period;
    }
    if let Some(rate) = args.rate {
        session.rate_per_minute = rate;
    }
    if let Some(pool_size) = args.pool_size {
        session.pool_size = pool_size;
    }
    if let Some(token) = &args.token {
        session.token = Some(token.clone());
    }
    if let Some(base_url) = &args.base_url {
        file.base_url = Some(base_url.clone());
    }

    Ok(file)
}

/// Run a sampling session
pub async fn run(args: RunArgs) -> Result<()> {
    let file = resolve_config(&args)?;

    let mut client = WaqiClient::new(&file.http).context("invalid http configuration")?;
    if let Some(base_url) = file.base_url {
        client = client.with_base_url(base_url)?;
    }
    let client = Arc::new(client);

    let session = SessionBuilder::from_config(file.session)
        .discovery(client.clone())
        .fetcher(client)
        .build()?;

    tracing::info!(
        bounds = %session.config().bounds,
        rounds = session.schedule().round_count(),
        interval_secs = session.schedule().interval().as_secs(),
        "Session configured"
    );

    let state = if args.background {
        run_background(&session, &args).await?
    } else {
        session.start_blocking().await?
    };

    match state {
        SamplingState::Done => match session.average_reading() {
            Some(average) => tracing::info!(average, "Sampling done"),
            None => tracing::info!("Sampling done; no stations in bounds"),
        },
        state => tracing::warn!(state = %state, "Sampling did not complete"),
    }

    println!("{}", serde_json::to_string_pretty(&session.snapshot())?);
    Ok(())
}

async fn run_background(
    session: &airq_core::SamplingSession,
    args: &RunArgs,
) -> Result<SamplingState> {
    session.start().await?;

    let started = tokio::time::Instant::now();
    let stop_after = args.stop_after.map(Duration::from_secs);
    let mut poll = tokio::time::interval(Duration::from_secs(args.poll_secs.max(1)));

    loop {
        poll.tick().await;
        let state = session.status();
        tracing::info!(
            state = %state,
            readings = session.readings().len(),
            elapsed_secs = started.elapsed().as_secs(),
            "Sampling status"
        );

        if session.is_settled() {
            return Ok(state);
        }
        if stop_after.is_some_and(|limit| started.elapsed() >= limit) {
            tracing::info!("Stopping session");
            return Ok(session.stop().await);
        }
    }
}

/// Validate a configuration file
pub fn validate(path: &Path) -> Result<()> {
    let file = load_config(path)?;
    file.session.validate()?;
    file.http.validate()?;
    let schedule = Schedule::from_config(&file.session)?;

    println!(
        "Configuration is valid: {} rounds every {}s over {} minute(s)",
        schedule.round_count(),
        schedule.interval().as_secs(),
        file.session.period_minutes
    );
    if file.session.token.is_none() {
        println!("note: no token in file; pass --token or set WAQI_TOKEN");
    }
    Ok(())
}
