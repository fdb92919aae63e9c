use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// `RUST_LOG` wins unless `verbose` is set, which forces debug output.
pub fn filter_directive(verbose: bool, env: Option<&str>) -> String {
    match (verbose, env) {
        (true, _) => "debug".to_string(),
        (false, Some(directive)) if !directive.trim().is_empty() => directive.to_string(),
        _ => "info".to_string(),
    }
}

pub fn init_logging(verbose: bool) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    INIT.call_once(|| {
        let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
        let filter = EnvFilter::try_new(filter_directive(verbose, env.as_deref()))
            .unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    });
}
