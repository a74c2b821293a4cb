//! Tracing subscriber setup.

use crate::config::env_vars;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` controls filtering (default `nsext_core=info`); `NSEXT_LOG_JSON=true`
/// switches to JSON output for container environments. Calling this twice is
/// harmless: the second installation attempt is ignored.
pub fn init_logging() {
    let json_logging = std::env::var(env_vars::LOG_JSON)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new("nsext_core=info").add_directive(tracing::Level::WARN.into())
    });

    if json_logging {
        let _ = tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .compact()
            .try_init();
    }
}
