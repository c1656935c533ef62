use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::content::{load_content_database, ContentDatabase, ContentPipelineError};
use crate::script::{Diagnostic, Value};
use crate::{resolve_app_paths, StartupError};

use super::input::InputCollector;
use super::metrics::{MetricsAccumulator, TickSample};
use super::{MapScene, MetricsHandle, SceneStack, ScriptedInput};

pub const SLOW_FRAME_ENV_VAR: &str = "REACTOR_SLOW_FRAME_MS";

/// Tick limit for runs that neither pace themselves nor set one.
pub const DEFAULT_HEADLESS_MAX_TICKS: u64 = 36_000;

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    pub simulated_slow_frame_ms: u64,
    pub start_map: u32,
    pub max_ticks: Option<u64>,
    /// Paces ticks against the wall clock. When off, ticks run back to back.
    pub realtime: bool,
    pub input_script: Vec<ScriptedInput>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            simulated_slow_frame_ms: 0,
            start_map: 1,
            max_ticks: None,
            realtime: true,
            input_script: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("failed to load content database: {0}")]
    ContentPipeline(#[from] ContentPipelineError),
    #[error("start map {map_id} is not defined by the loaded content")]
    UnknownStartMap { map_id: u32 },
    #[error("failed to read input script {path}: {source}")]
    ReadInputScript {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse input script {path}: {source}")]
    ParseInputScript {
        path: PathBuf,
        #[source]
        source: serde_path_to_error::Error<serde_json::Error>,
    },
}

/// What a finished run leaves behind.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub ticks_run: u64,
    pub final_scene: Option<String>,
    pub final_variables: BTreeMap<u32, Value>,
    pub diagnostics: Vec<Diagnostic>,
    /// HUD of the last tick, as text lines.
    pub hud: Vec<String>,
}

pub fn run_app(config: LoopConfig) -> Result<RunSummary, AppError> {
    let metrics_handle = MetricsHandle::default();
    run_app_with_metrics(config, &metrics_handle)
}

pub fn run_app_with_metrics(
    config: LoopConfig,
    metrics_handle: &MetricsHandle,
) -> Result<RunSummary, AppError> {
    let app_paths = resolve_app_paths()?;
    info!(
        root = %app_paths.root.display(),
        base_content_dir = %app_paths.base_content_dir.display(),
        maps_dir = %app_paths.maps_dir.display(),
        "startup"
    );
    let content = load_content_database(&app_paths)?;
    run_with_content(config, Rc::new(content), metrics_handle)
}

/// Reads a JSON array of `{"tick": n, "type": ..., ...}` input entries.
pub fn load_input_script(path: &Path) -> Result<Vec<ScriptedInput>, AppError> {
    let text = fs::read_to_string(path).map_err(|source| AppError::ReadInputScript {
        path: path.to_path_buf(),
        source,
    })?;
    let mut deserializer = serde_json::Deserializer::from_str(&text);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|source| {
        AppError::ParseInputScript {
            path: path.to_path_buf(),
            source,
        }
    })
}

pub fn run_with_content(
    config: LoopConfig,
    content: Rc<ContentDatabase>,
    metrics_handle: &MetricsHandle,
) -> Result<RunSummary, AppError> {
    if content.map(config.start_map).is_none() {
        return Err(AppError::UnknownStartMap {
            map_id: config.start_map,
        });
    }

    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let slow_frame_delay = resolve_slow_frame_delay(config.simulated_slow_frame_ms);
    let max_ticks = config
        .max_ticks
        .or((!config.realtime).then_some(DEFAULT_HEADLESS_MAX_TICKS));
    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        slow_frame_delay_ms = slow_frame_delay.as_millis() as u64,
        realtime = config.realtime,
        max_ticks = ?max_ticks,
        scripted_inputs = config.input_script.len(),
        "loop_config"
    );

    let mut scenes = SceneStack::new(Some(content));
    scenes.push(Box::new(MapScene::new(config.start_map)));

    let mut script = config.input_script;
    script.sort_by_key(|entry| entry.tick);
    let mut script = script.into_iter().peekable();
    let mut input = InputCollector::default();

    let mut summary = RunSummary::default();
    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);

    'frames: loop {
        if slow_frame_delay > Duration::ZERO {
            thread::sleep(slow_frame_delay);
        }
        let now = Instant::now();
        let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
        last_frame_instant = now;

        let ticks_to_run = if config.realtime {
            accumulator =
                accumulator.saturating_add(clamp_frame_delta(raw_frame_dt, max_frame_delta));
            let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
            accumulator = step_plan.remaining_accumulator;
            if step_plan.dropped_backlog > Duration::ZERO {
                warn!(
                    dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                    max_ticks_per_frame, "sim_clamp_triggered"
                );
            }
            step_plan.ticks_to_run
        } else {
            max_ticks_per_frame
        };

        for _ in 0..ticks_to_run {
            if max_ticks.is_some_and(|limit| summary.ticks_run >= limit) {
                info!(reason = "max_ticks", "shutdown_requested");
                break 'frames;
            }
            while let Some(entry) = script.next_if(|entry| entry.tick <= summary.ticks_run) {
                input.push(entry.event);
            }
            let (events, snapshot) = input.drain_for_tick();
            if snapshot.quit_requested() {
                info!(reason = "quit_key", "shutdown_requested");
                break 'frames;
            }

            for event in &events {
                scenes.on_input(event);
            }
            scenes.update(&snapshot);
            let diagnostics = scenes.take_diagnostics();
            let (blocking, parallel) = scenes.interpreter_counts();
            metrics_accumulator.record_tick(TickSample {
                blocking,
                parallel,
                diagnostics: diagnostics.len(),
            });
            summary.diagnostics.extend(diagnostics);
            summary.ticks_run += 1;

            if scenes.is_empty() {
                info!(reason = "scene_stack_empty", "shutdown_requested");
                break 'frames;
            }
        }

        metrics_accumulator.record_frame(raw_frame_dt);
        if let Some(snapshot) = metrics_accumulator.maybe_snapshot(now) {
            metrics_handle.publish(snapshot);
            info!(
                tps = snapshot.tps,
                frame_time_ms = snapshot.frame_time_ms,
                blocking_interpreters = snapshot.blocking_interpreters,
                parallel_interpreters = snapshot.parallel_interpreters,
                diagnostics = snapshot.diagnostics,
                scene = ?scenes.top_name(),
                "loop_metrics"
            );
        }

        if config.realtime {
            let idle = compute_idle_sleep(accumulator, fixed_dt);
            if idle > Duration::ZERO {
                thread::sleep(idle);
            }
        }
    }

    summary.final_scene = scenes.top_name();
    summary.hud = scenes.draw_hud().lines().to_vec();
    scenes.pop_all();
    summary.final_variables = scenes.variables().clone();
    info!(
        ticks_run = summary.ticks_run,
        diagnostics = summary.diagnostics.len(),
        "shutdown"
    );
    Ok(summary)
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;

    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    if accumulator >= fixed_dt {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: Duration::ZERO,
            dropped_backlog: accumulator,
        }
    } else {
        StepPlan {
            ticks_to_run,
            remaining_accumulator: accumulator,
            dropped_backlog: Duration::ZERO,
        }
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}

/// Time left until the accumulator holds a full tick.
fn compute_idle_sleep(accumulator: Duration, fixed_dt: Duration) -> Duration {
    fixed_dt.saturating_sub(accumulator)
}

fn resolve_slow_frame_delay(config_slow_frame_ms: u64) -> Duration {
    match env::var(SLOW_FRAME_ENV_VAR) {
        Ok(value) => match value.parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                warn!(
                    env_var = SLOW_FRAME_ENV_VAR,
                    value = value.as_str(),
                    "invalid slow-frame env var value; falling back to config"
                );
                Duration::from_millis(config_slow_frame_ms)
            }
        },
        Err(env::VarError::NotPresent) => Duration::from_millis(config_slow_frame_ms),
        Err(err) => {
            warn!(
                env_var = SLOW_FRAME_ENV_VAR,
                error = %err,
                "unable to read slow-frame env var; falling back to config"
            );
            Duration::from_millis(config_slow_frame_ms)
        }
    }
}
