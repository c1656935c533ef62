use std::process::ExitCode;

use engine::run_app;
use tracing::{debug, error, info, warn};

use super::bootstrap::AppWiring;

pub(crate) fn run(app: AppWiring) -> ExitCode {
    let summary = match run_app(app.config) {
        Ok(summary) => summary,
        Err(err) => {
            error!(error = %err, "startup_failed");
            return ExitCode::FAILURE;
        }
    };

    info!(
        ticks_run = summary.ticks_run,
        final_scene = ?summary.final_scene,
        diagnostics = summary.diagnostics.len(),
        "run_summary"
    );
    for line in &summary.hud {
        info!(line = line.as_str(), "hud");
    }
    for diagnostic in &summary.diagnostics {
        warn!(diagnostic = %diagnostic, "command_diagnostic");
    }
    for (id, value) in &summary.final_variables {
        debug!(variable = id, value = %value, "final_variable");
    }

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::rc::Rc;

    use engine::{
        load_content_database, run_with_content, AppPaths, InputEvent, InputKey, LoopConfig,
        MetricsHandle, ScriptedInput, Value,
    };

    fn shipped_paths() -> AppPaths {
        AppPaths::from_root(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("..").join(".."))
    }

    fn tap(tick: u64, key: InputKey) -> [ScriptedInput; 2] {
        [
            ScriptedInput {
                tick,
                event: InputEvent::KeyPressed { key },
            },
            ScriptedInput {
                tick: tick + 1,
                event: InputEvent::KeyReleased { key },
            },
        ]
    }

    #[test]
    fn shipped_content_compiles() {
        let database = load_content_database(&shipped_paths()).expect("shipped content");
        assert!(database.map(1).is_some());
        assert!(database.map(2).is_some());
        assert!(database.common_reaction_count() > 0);
    }

    #[test]
    fn village_intro_runs_without_diagnostics() {
        let database = load_content_database(&shipped_paths()).expect("shipped content");
        let config = LoopConfig {
            realtime: false,
            max_ticks: Some(240),
            ..LoopConfig::default()
        };
        let summary = run_with_content(config, Rc::new(database), &MetricsHandle::default())
            .expect("run village");

        assert_eq!(summary.ticks_run, 240);
        assert!(summary.diagnostics.is_empty(), "{:?}", summary.diagnostics);
        assert_eq!(summary.final_variables.get(&1), Some(&Value::Number(1.0)));
    }

    #[test]
    fn talking_to_the_elder_records_the_answer() {
        let database = load_content_database(&shipped_paths()).expect("shipped content");
        let mut script = Vec::new();
        // Dismiss the intro line, then talk to the elder standing in front.
        script.extend(tap(2, InputKey::Action));
        script.extend(tap(10, InputKey::Action));
        script.extend(tap(20, InputKey::Action));
        script.extend(tap(30, InputKey::Action));
        let config = LoopConfig {
            realtime: false,
            max_ticks: Some(120),
            input_script: script,
            ..LoopConfig::default()
        };
        let summary = run_with_content(config, Rc::new(database), &MetricsHandle::default())
            .expect("run village");

        assert!(summary.diagnostics.is_empty(), "{:?}", summary.diagnostics);
        assert_eq!(summary.final_variables.get(&2), Some(&Value::Number(1.0)));
    }
}
