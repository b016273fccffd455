//! Integration tests for the global logging setup.
//!
//! The global subscriber can only be installed once per process, so the whole
//! lifecycle is exercised in a single test.

use async_trait::async_trait;
use bridge_traits::error::Result as SinkResult;
use bridge_traits::logger::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{init_logging, redact_url, strip_path, LogFormat, LoggingConfig};
use core_runtime::Error;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CollectingSink {
    entries: Mutex<Vec<LogEntry>>,
}

#[async_trait]
impl LoggerSink for CollectingSink {
    async fn log(&self, entry: LogEntry) -> SinkResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

#[test]
fn test_init_logging_once_and_forward_to_sink() {
    let sink = Arc::new(CollectingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Debug)
        .with_logger_sink(sink.clone());

    init_logging(config.clone()).expect("first initialization succeeds");

    tracing::info!(target: "core_sync::coordinator", roots = 2u64, "Scan started");
    tracing::debug!(target: "core_sync::coordinator", "Below sink minimum");
    tracing::info!(target: "hyper::proto", "Filtered dependency noise");

    {
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "Scan started");
        assert_eq!(entries[0].fields.get("roots"), Some(&"2".to_string()));
    }

    let err = init_logging(config).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_privacy_helpers() {
    assert_eq!(strip_path("/home/user/Music/Album/01 Song.flac"), "01 Song.flac");
    assert_eq!(strip_path(""), "");
    assert_eq!(
        redact_url("https://cdn.example.com/track.mp3?sig=secret&exp=1"),
        "https://cdn.example.com/track.mp3"
    );
}

#[test]
fn test_format_selection() {
    #[cfg(debug_assertions)]
    assert_eq!(LoggingConfig::default().format, LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LoggingConfig::default().format, LogFormat::Json);
}
