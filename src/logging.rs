//! Tracing subscriber assembly.

use tracing::Subscriber;
use tracing_appender::non_blocking::NonBlocking;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Filter from `RUST_LOG`, defaulting to `info`.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Console output on `console`, plus an uncolored copy of every event on
/// `file` when one is given. Both layers share `filter`.
pub fn subscriber<W>(
    filter: EnvFilter,
    console: W,
    file: Option<NonBlocking>,
) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let file_layer = file.map(|writer| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(writer)
    });

    Registry::default()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(console),
        )
        .with(file_layer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_reach_console_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let (console, console_guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir.path(), "console.log"));
        let (file, file_guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir.path(), "app.log"));

        let subscriber = subscriber(EnvFilter::new("info"), console, Some(file));
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(cycle = 3, "Cycle finished");
            tracing::debug!("below the filter");
        });
        drop(console_guard);
        drop(file_guard);

        for name in ["console.log", "app.log"] {
            let text = std::fs::read_to_string(dir.path().join(name)).unwrap();
            assert!(text.contains("Cycle finished"), "{name} missing event: {text:?}");
            assert!(!text.contains("below the filter"));
        }
    }

    #[test]
    fn console_only_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let (console, guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir.path(), "console.log"));

        let subscriber = subscriber(EnvFilter::new("info"), console, None);
        tracing::subscriber::with_default(subscriber, || tracing::warn!("Marker not advanced"));
        drop(guard);

        let text = std::fs::read_to_string(dir.path().join("console.log")).unwrap();
        assert!(text.contains("Marker not advanced"));
    }
}
