use std::sync::Once;

/// Filter used when neither the config nor `RUST_LOG` provide one.
///
/// wgpu's internals are chatty at info; keep them at warn.
pub const DEFAULT_FILTER: &str = "info,wgpu_core=warn,wgpu_hal=warn,naga=warn";

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "debug",
/// "penumbra_engine=trace,wgpu_core=warn").
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

static INIT: Once = Once::new();

/// Picks the effective filter: explicit config, then `RUST_LOG`, then the default.
fn resolve_filter(config: Option<&str>, env: Option<&str>) -> String {
    config
        .or(env)
        .filter(|f| !f.trim().is_empty())
        .unwrap_or(DEFAULT_FILTER)
        .to_string()
}

/// Initializes the global logger once. Later calls are ignored.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let env = std::env::var("RUST_LOG").ok();
        let filter = resolve_filter(config.env_filter.as_deref(), env.as_deref());

        env_logger::Builder::new()
            .parse_filters(&filter)
            .write_style(config.write_style)
            .format_timestamp_millis()
            .init();

        log::debug!("logging initialized ({filter})");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_filter_wins_over_env() {
        assert_eq!(resolve_filter(Some("debug"), Some("trace")), "debug");
        assert_eq!(resolve_filter(None, Some("trace")), "trace");
    }

    #[test]
    fn blank_filter_falls_back_to_default() {
        assert_eq!(resolve_filter(None, Some("  ")), DEFAULT_FILTER);
        assert_eq!(resolve_filter(None, None), DEFAULT_FILTER);
    }
}
