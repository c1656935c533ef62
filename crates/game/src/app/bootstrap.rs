use std::path::PathBuf;
use std::str::FromStr;

use engine::{load_input_script, AppError, LoopConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const START_MAP_ENV_VAR: &str = "REACTOR_START_MAP";
const MAX_TICKS_ENV_VAR: &str = "REACTOR_MAX_TICKS";
const INPUT_SCRIPT_ENV_VAR: &str = "REACTOR_INPUT_SCRIPT";
const HEADLESS_ENV_VAR: &str = "REACTOR_HEADLESS";

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
}

pub(crate) fn build_app() -> Result<AppWiring, AppError> {
    init_tracing();
    info!("=== Reactor Startup ===");

    let defaults = LoopConfig::default();
    let input_script = match std::env::var_os(INPUT_SCRIPT_ENV_VAR) {
        Some(path) => load_input_script(&PathBuf::from(path))?,
        None => Vec::new(),
    };
    let config = LoopConfig {
        start_map: parse_env(START_MAP_ENV_VAR).unwrap_or(defaults.start_map),
        max_ticks: parse_env::<u64>(MAX_TICKS_ENV_VAR).filter(|ticks| *ticks > 0),
        realtime: !parse_flag(std::env::var(HEADLESS_ENV_VAR).ok().as_deref()),
        input_script,
        ..defaults
    };
    info!(
        start_map = config.start_map,
        max_ticks = ?config.max_ticks,
        realtime = config.realtime,
        "app_config"
    );

    Ok(AppWiring { config })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn parse_env<T: FromStr>(var: &'static str) -> Option<T> {
    let raw = std::env::var(var).ok()?;
    let parsed = parse_value(&raw);
    if parsed.is_none() {
        warn!(env_var = var, value = raw.as_str(), "invalid env var value; ignoring");
    }
    parsed
}

fn parse_value<T: FromStr>(raw: &str) -> Option<T> {
    raw.trim().parse().ok()
}

fn parse_flag(raw: Option<&str>) -> bool {
    raw.map(str::trim)
        .is_some_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}
