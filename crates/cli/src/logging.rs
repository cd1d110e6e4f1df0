// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing setup for the CLI
//!
//! Console logging honors `LOG_LEVEL` (or `DEBUG=1`); when `LOG_LEVEL=debug`
//! a non-blocking file layer also writes `~/.codemachine/logs/debug.log`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub fn init() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| {
        if std::env::var("DEBUG").is_ok_and(|v| v == "1" || v == "true") {
            "debug".to_string()
        } else {
            "warn".to_string()
        }
    });
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("warn"));

    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    if level == "debug" || level == "trace" {
        let log_dir = cm_adapters::env::codemachine_home().join("logs");
        if std::fs::create_dir_all(&log_dir).is_ok() {
            let appender = tracing_appender::rolling::never(&log_dir, "debug.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(file)
                .init();
            return Some(guard);
        }
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .init();
    None
}
