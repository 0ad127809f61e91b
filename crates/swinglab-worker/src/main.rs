//! Swing analysis worker binary.
//!
//! Reads JSON commands from stdin, one per line, and answers on stdout.
//! Logs go to stderr.

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use swinglab_ml_client::{OpenRouterClient, OpenRouterConfig};
use swinglab_vision::{DetectorSet, FrameSourceFactory, ModelCache, VideoAnalyzer};
use swinglab_worker::{handle_line, Coach, JobExecutor, JobProcessor, JobQueue, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    info!("Starting swinglab-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let sources = frame_sources()?;
    let cache = ModelCache::shared(config.model_paths());
    let detectors = DetectorSet::from_cache(&cache);
    let analyzer = Arc::new(VideoAnalyzer::new(
        config.analyzer_config(),
        detectors,
        Arc::clone(&sources),
    ));

    let mut processor =
        JobProcessor::new(config.clone(), analyzer).context("Failed to create job processor")?;

    let llm = OpenRouterConfig::from_env();
    if llm.is_configured() {
        let client = OpenRouterClient::new(llm).context("Failed to create OpenRouter client")?;
        processor = processor.with_coach(Coach::new(
            Arc::new(client),
            sources,
            config.coaching_sample_rate,
            config.coaching_frames,
        ));
        info!("LLM coaching feedback enabled");
    }

    let (queue, receiver) = JobQueue::new(config.queue_capacity);
    let executor = JobExecutor::new(processor, queue.table(), receiver);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut stop = shutdown_rx.clone();
    let executor_handle = tokio::spawn(executor.run(shutdown_rx));

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown_tx.send_replace(true);
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let line = tokio::select! {
            _ = stop.changed() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("Command input closed");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read command input");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let reply = handle_line(&queue, &line);
        stdout.write_all(format!("{reply}\n").as_bytes()).await?;
        stdout.flush().await?;
    }

    // Closing the queue lets the executor drain what is already accepted.
    drop(queue);
    executor_handle.await??;

    info!("Worker shutdown complete");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("swinglab_worker=info".parse()?)
        .add_directive("swinglab_vision=info".parse()?)
        .add_directive("swinglab_sensor=info".parse()?)
        .add_directive("swinglab_ml_client=info".parse()?)
        .add_directive("ort=warn".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

#[cfg(feature = "opencv")]
fn frame_sources() -> anyhow::Result<Arc<dyn FrameSourceFactory>> {
    Ok(Arc::new(swinglab_vision::OpenCvFrameSourceFactory))
}

#[cfg(not(feature = "opencv"))]
fn frame_sources() -> anyhow::Result<Arc<dyn FrameSourceFactory>> {
    anyhow::bail!("built without the opencv feature, no video decoder available")
}
