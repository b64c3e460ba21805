/*
 * Copyright 2024 Download Service Contributors
 */

use slog::{o, Drain, Logger};

/// Build the root logger for a named component. When `DOWNLOAD_LOG_TERM` is
/// set we use a human readable terminal drain (handy in a dev shell);
/// otherwise we emit bunyan-formatted JSON suitable for log aggregation, the
/// same split the teacher's tooling makes between interactive and service
/// use.
pub fn make_log(name: &str) -> Logger {
    if std::env::var_os("DOWNLOAD_LOG_TERM").is_some() {
        let decorator = slog_term::TermDecorator::new().build();
        let drain = slog_term::FullFormat::new(decorator).build().fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        Logger::root(drain, o!("component" => name.to_string()))
    } else {
        let drain = slog_bunyan::default(std::io::stdout()).fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        Logger::root(drain, o!("component" => name.to_string()))
    }
}
