use super::runtime::MemoryRuntime;
use crate::channels::{Transport, run_ingestion};
use crate::cron::CompactionScheduler;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const INGEST_QUEUE: usize = 256;

/// Ingest from `transport` and compact on schedule until ctrl-c or the
/// transport ends, then flush whatever is still buffered.
pub async fn run_daemon(runtime: MemoryRuntime, transport: Arc<dyn Transport>) -> Result<()> {
    let rehydrated = runtime
        .buffer
        .load_from_disk()
        .await
        .context("Failed to rehydrate today's raw memory")?;
    let channels = runtime.discover_channels().await;
    tracing::info!(
        transport = transport.name(),
        channels = channels.len(),
        rehydrated,
        session_id = runtime.buffer.session_id(),
        "memory daemon started"
    );

    let cancel = CancellationToken::new();
    let scheduler = CompactionScheduler::new(
        runtime.engine.clone(),
        runtime.directory.clone(),
        runtime.config.memory.compaction_schedule.clone(),
    );
    let scheduler_cancel = cancel.clone();
    let scheduler_task = tokio::spawn(async move { scheduler.run(scheduler_cancel).await });

    let (tx, rx) = mpsc::channel(INGEST_QUEUE);
    let listener = transport.clone();
    let transport_task = tokio::spawn(async move { listener.listen(tx).await });

    let recorder = runtime.recorder.clone();
    let directory = runtime.directory.clone();
    let mut ingest_task =
        tokio::spawn(async move { run_ingestion(rx, recorder, &directory).await });

    let ingest_done = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(error) = signal {
                tracing::warn!(error = %error, "failed to listen for ctrl-c");
            }
            tracing::info!("shutdown requested");
            transport_task.abort();
            None
        }
        ingested = &mut ingest_task => Some(ingested),
    };

    cancel.cancel();
    match scheduler_task.await {
        Ok(Err(error)) => tracing::warn!(error = %error, "compaction scheduler exited with error"),
        Err(error) => tracing::warn!(error = %error, "compaction scheduler task failed"),
        Ok(Ok(())) => {}
    }

    // The aborted transport dropped its sender, so ingestion drains what is
    // queued and ends.
    let ingested = match ingest_done {
        Some(ingested) => ingested,
        None => ingest_task.await,
    };
    match ingested {
        Ok(recorded) => tracing::info!(recorded, "ingestion finished"),
        Err(error) => tracing::warn!(error = %error, "ingestion task failed"),
    }
    match transport_task.await {
        Ok(Err(error)) => tracing::warn!(error = %error, "transport failed"),
        Err(error) if !error.is_cancelled() => {
            tracing::warn!(error = %error, "transport task failed");
        }
        _ => {}
    }

    let flushed = runtime
        .buffer
        .flush_all()
        .await
        .context("Failed to flush buffered messages on shutdown")?;
    tracing::info!(flushed, "memory daemon stopped");
    Ok(())
}
