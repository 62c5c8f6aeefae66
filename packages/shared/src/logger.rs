//! Logging setup utilities for the room relay.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Crates whose events are enabled at the default level.
const RELAY_TARGETS: [&str; 3] = ["roomrelay_server", "roomrelay_shared", "tower_http"];

/// Build the default filter directive for the given binary and level.
///
/// The binary name is normalized the same way cargo normalizes crate names,
/// so `roomrelay-server` becomes the `roomrelay_server` target.
pub fn default_directive(binary_name: &str, default_log_level: &str) -> String {
    let binary_target = binary_name.replace('-', "_");
    let mut directives: Vec<String> = RELAY_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, default_log_level))
        .collect();
    if !RELAY_TARGETS.contains(&binary_target.as_str()) {
        directives.push(format!("{}={}", binary_target, default_log_level));
    }
    directives.join(",")
}

/// Initialize the tracing subscriber with the specified default log level.
///
/// The log level can be overridden using the `RUST_LOG` environment variable.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "roomrelay-server")
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn", "error")
///
/// # Examples
///
/// ```no_run
/// use roomrelay_shared::logger::setup_logger;
///
/// setup_logger("roomrelay-server", "info");
/// ```
pub fn setup_logger(binary_name: &str, default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive(binary_name, default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_includes_binary_target() {
        // テスト項目: バイナリ名がハイフン区切りでも target 名に正規化される
        // given (前提条件):
        let binary_name = "relay-admin";

        // when (操作):
        let directive = default_directive(binary_name, "debug");

        // then (期待する結果):
        assert!(directive.contains("roomrelay_server=debug"));
        assert!(directive.contains("relay_admin=debug"));
    }

    #[test]
    fn test_default_directive_does_not_duplicate_server_target() {
        // テスト項目: サーバーバイナリの target が重複しない
        // given (前提条件):
        let binary_name = "roomrelay-server";

        // when (操作):
        let directive = default_directive(binary_name, "info");

        // then (期待する結果):
        assert_eq!(directive.matches("roomrelay_server=info").count(), 1);
    }
}
