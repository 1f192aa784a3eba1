//! Story clip worker binary.
//!
//! Usage: `sclip-worker <input> [options.json]`

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sclip_media::{check_program, FfmpegClipExecutor, FfprobeProbe};
use sclip_models::{IdempotencyKey, JobStatus, ProcessingOptions};
use sclip_worker::{
    spawn_sweeper, EvictionPolicy, InMemoryJobStore, JobStore, Orchestrator, TracingSink,
    WorkerConfig,
};

/// Upper bound on how long the binary waits for one job.
const MAX_WAIT: Duration = Duration::from_secs(6 * 3600);

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sclip_worker=info,sclip_media=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    match run().await {
        Ok(JobStatus::Done) => {}
        Ok(status) => {
            error!("Job finished with status {}", status);
            std::process::exit(1);
        }
        Err(e) => {
            error!("sclip-worker failed: {:#}", e);
            std::process::exit(2);
        }
    }
}

async fn run() -> anyhow::Result<JobStatus> {
    let mut args = std::env::args().skip(1);
    let Some(input) = args.next() else {
        bail!("usage: sclip-worker <input> [options.json]");
    };
    let options = match args.next() {
        Some(path) => {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading options from {}", path))?;
            serde_json::from_str::<ProcessingOptions>(&raw)
                .with_context(|| format!("parsing options from {}", path))?
        }
        None => ProcessingOptions::default(),
    };

    info!("Starting sclip-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    check_program(&config.ffmpeg_program).context("ffmpeg is required")?;
    tokio::fs::create_dir_all(&config.work_dir)
        .await
        .with_context(|| format!("creating work dir {}", config.work_dir.display()))?;

    let store: Arc<dyn JobStore> =
        Arc::new(InMemoryJobStore::new(EvictionPolicy::new(config.eviction_max_age)));
    let sweeper = spawn_sweeper(Arc::clone(&store), config.sweep_interval);

    let orchestrator = Orchestrator::new(
        &config,
        store,
        Arc::new(FfprobeProbe::new(config.ffprobe_program.clone())),
        Arc::new(FfmpegClipExecutor::new(config.executor_config())),
        Arc::new(TracingSink),
    );

    let key = IdempotencyKey::derive(&input, &options);
    let submitted = orchestrator.submit(key.clone(), &input, options).await?;
    info!(job_id = %submitted.id, "Job submitted");

    let view = tokio::select! {
        view = orchestrator.wait_for_terminal(&key, MAX_WAIT) => view?,
        _ = tokio::signal::ctrl_c() => {
            sweeper.abort();
            bail!("interrupted");
        }
    };
    sweeper.abort();

    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(view.status)
}
