use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::util::SubscriberInitExt;

use mail_verdict::config::AppConfig;
use mail_verdict::health::health_routes;
use mail_verdict::logging;
use mail_verdict::mail::{GmailSource, MessageSource, ResilientSource};
use mail_verdict::pipeline::Pipeline;
use mail_verdict::ratelimit::RateLimiter;
use mail_verdict::scheduler::{RunStats, spawn_scheduler};
use mail_verdict::store::LibSqlBackend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Config errors are reported before logging exists, so they go to stderr.
    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    let _log_guard = init_logging(config.log_file.as_deref())?;

    eprintln!("📬 Mail Verdict v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.database_path.display());
    eprintln!("   Pointer key: {}", config.pipeline.pointer_key);
    eprintln!("   Fetch mode: {}", config.pipeline.fetch_mode);

    // ── Database ─────────────────────────────────────────────────────────
    let db = Arc::new(
        LibSqlBackend::new_local(&config.database_path)
            .await
            .with_context(|| format!("opening database at {}", config.database_path.display()))?,
    );

    if let Some(path) = &config.entities_file {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading entities file {}", path.display()))?;
        let names: Vec<&str> = contents.lines().collect();
        let added = db.import_entities(config.start_row, &names).await?;
        eprintln!("   Entities: {added} imported from {}", path.display());
    }

    // ── Source ───────────────────────────────────────────────────────────
    let gmail = GmailSource::new(config.api_base.clone(), config.access_token.clone())?;
    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit.max_calls,
        config.rate_limit.window,
    ));
    let source: Arc<dyn MessageSource> = Arc::new(
        ResilientSource::new(Arc::new(gmail), config.retry.clone())
            .with_rate_limiter(limiter, config.rate_limit.acquire_timeout),
    );

    // ── Pipeline ─────────────────────────────────────────────────────────
    let pipeline = Arc::new(Pipeline::new(
        &config.pipeline,
        source,
        db.clone(),
        db.clone(),
        db,
    ));

    if !config.scheduler_enabled {
        let report = pipeline.run_cycle().await.context("pipeline cycle failed")?;
        eprintln!(
            "   Done: {} collected, {} approved, {} declined, {} review{}",
            report.collected,
            report.approved,
            report.declined,
            report.review,
            if report.has_more { " (more pending)" } else { "" }
        );
        return Ok(());
    }

    // ── Scheduler ────────────────────────────────────────────────────────
    let stats = RunStats::shared(config.scheduler_interval);
    let (scheduler, shutdown) =
        spawn_scheduler(Arc::clone(&pipeline), config.scheduler_interval, stats.clone());
    eprintln!(
        "   Scheduler: every {}s",
        config.scheduler_interval.as_secs()
    );

    if config.health_check_enabled {
        let port = config.health_check_port;
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
            .await
            .with_context(|| format!("binding health server port {port}"))?;
        eprintln!("   Health: http://0.0.0.0:{port}/health");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, health_routes(stats)).await {
                tracing::error!(error = %e, "Health server stopped");
            }
        });
    }

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("Shutdown requested");
    shutdown.store(true, Ordering::Relaxed);
    scheduler.abort();
    Ok(())
}

/// Console logging, plus a non-blocking file copy when `log_file` is set.
fn init_logging(log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let Some(path) = log_file else {
        logging::subscriber(logging::env_filter(), std::io::stdout, None).init();
        return Ok(None);
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .with_context(|| format!("LOG_FILE has no file name: {}", path.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
        dir, file_name,
    ));
    logging::subscriber(logging::env_filter(), std::io::stdout, Some(writer)).init();
    Ok(Some(guard))
}
