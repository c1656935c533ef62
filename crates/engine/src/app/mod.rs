mod hud;
mod input;
mod loop_runner;
mod map_scene;
mod metrics;
mod scene;
mod world;

pub use hud::HudFrame;
pub use input::{InputEvent, InputKey, InputSnapshot, ScriptedInput, KEY_REPEAT_TICKS};
pub use loop_runner::{
    load_input_script, run_app, run_app_with_metrics, run_with_content, AppError, LoopConfig,
    RunSummary, DEFAULT_HEADLESS_MAX_TICKS, SLOW_FRAME_ENV_VAR,
};
pub use map_scene::{MapScene, HERO_STEP_TICKS};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use scene::{Scene, SceneCommand, SceneStack};
pub use world::{
    EventHandler, MapObject, ObjectId, ObjectModel, ObjectStateDef, Orientation, SceneWorld,
    TilePos, TimeClock, HERO_ID,
};
