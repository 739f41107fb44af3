use std::sync::Once;

/// Filter used when neither the config nor `RUST_LOG` sets one. GPU backend
/// crates are noisy at info.
const DEFAULT_FILTER: &str = "info,wgpu_core=warn,wgpu_hal=warn,naga=warn";

/// Logger configuration.
///
/// `env_filter` uses `env_logger` syntax (e.g. "lumen_engine=trace" to see
/// per-frame stats). It wins over `RUST_LOG`.
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

/// Installs `env_logger` as the global logger. Later calls are ignored.
///
/// Call early in `main`, before the renderer or decode workers start.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = resolve_filter(config.env_filter, std::env::var("RUST_LOG").ok());
        env_logger::Builder::new()
            .parse_filters(&filter)
            .write_style(config.write_style)
            .init();
        log::debug!("logging initialized with filter {filter:?}");
    });
}

fn resolve_filter(explicit: Option<String>, env: Option<String>) -> String {
    explicit
        .or(env)
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_filter_wins_over_env() {
        let f = resolve_filter(Some("lumen_engine=trace".into()), Some("warn".into()));
        assert_eq!(f, "lumen_engine=trace");
    }

    #[test]
    fn env_filter_is_used_when_not_configured() {
        assert_eq!(resolve_filter(None, Some("debug".into())), "debug");
    }

    #[test]
    fn blank_or_missing_falls_back_to_default() {
        assert_eq!(resolve_filter(None, None), DEFAULT_FILTER);
        assert_eq!(resolve_filter(None, Some("  ".into())), DEFAULT_FILTER);
    }
}
