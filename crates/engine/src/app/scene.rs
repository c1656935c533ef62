use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::info;

use crate::content::ContentDatabase;
use crate::script::{Diagnostic, Value};

use super::{HudFrame, InputEvent, InputSnapshot, SceneWorld};

pub enum SceneCommand {
    None,
    Push(Box<dyn Scene>),
    Pop,
    Replace(Box<dyn Scene>),
}

pub trait Scene {
    fn name(&self) -> String;
    fn load(&mut self, world: &mut SceneWorld);
    fn update(&mut self, input: &InputSnapshot, world: &mut SceneWorld) -> SceneCommand;
    fn on_input(&mut self, _event: &InputEvent, _world: &mut SceneWorld) {}
    fn draw_hud(&self, _world: &SceneWorld, _hud: &mut HudFrame) {}
    /// Tears the scene down. Every reaction still running is force-finished.
    fn close(&mut self, world: &mut SceneWorld);
    /// Blocking and parallel interpreters currently alive.
    fn interpreter_counts(&self) -> (usize, usize) {
        (0, 0)
    }
    fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        Vec::new()
    }
}

struct SceneRuntime {
    scene: Box<dyn Scene>,
    world: SceneWorld,
}

/// Scenes layered on top of each other; only the top one runs. Variables
/// follow whichever scene is on top.
#[derive(Default)]
pub struct SceneStack {
    runtimes: Vec<SceneRuntime>,
    content: Option<Rc<ContentDatabase>>,
    carried_variables: BTreeMap<u32, Value>,
}

impl SceneStack {
    pub fn new(content: Option<Rc<ContentDatabase>>) -> Self {
        Self {
            runtimes: Vec::new(),
            content,
            carried_variables: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.runtimes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.runtimes.len()
    }

    pub fn top_name(&self) -> Option<String> {
        self.runtimes.last().map(|runtime| runtime.scene.name())
    }

    pub fn top_world(&self) -> Option<&SceneWorld> {
        self.runtimes.last().map(|runtime| &runtime.world)
    }

    pub fn push(&mut self, mut scene: Box<dyn Scene>) {
        let variables = match self.runtimes.last_mut() {
            Some(below) => below.world.take_variables(),
            None => std::mem::take(&mut self.carried_variables),
        };
        let mut world = SceneWorld::default();
        world.set_variables(variables);
        if let Some(content) = &self.content {
            world.set_content(Rc::clone(content));
        }
        scene.load(&mut world);
        world.apply_pending();
        info!(
            scene = %scene.name(),
            object_count = world.object_count(),
            depth = self.runtimes.len() + 1,
            "scene_loaded"
        );
        self.runtimes.push(SceneRuntime { scene, world });
    }

    pub fn pop(&mut self) -> bool {
        let Some(mut runtime) = self.runtimes.pop() else {
            return false;
        };
        runtime.scene.close(&mut runtime.world);
        info!(scene = %runtime.scene.name(), "scene_closed");
        let variables = runtime.world.take_variables();
        match self.runtimes.last_mut() {
            Some(top) => top.world.set_variables(variables),
            None => self.carried_variables = variables,
        }
        true
    }

    pub fn replace(&mut self, scene: Box<dyn Scene>) {
        self.pop();
        self.push(scene);
    }

    pub fn pop_all(&mut self) {
        while self.pop() {}
    }

    /// Ticks the top scene and applies the stack change it asks for.
    pub fn update(&mut self, input: &InputSnapshot) {
        let Some(runtime) = self.runtimes.last_mut() else {
            return;
        };
        let (scene, world) = (&mut runtime.scene, &mut runtime.world);
        match scene.update(input, world) {
            SceneCommand::None => {}
            SceneCommand::Push(next) => self.push(next),
            SceneCommand::Pop => {
                self.pop();
            }
            SceneCommand::Replace(next) => self.replace(next),
        }
    }

    pub fn on_input(&mut self, event: &InputEvent) {
        if let Some(runtime) = self.runtimes.last_mut() {
            runtime.scene.on_input(event, &mut runtime.world);
        }
    }

    pub fn draw_hud(&self) -> HudFrame {
        let mut hud = HudFrame::default();
        if let Some(runtime) = self.runtimes.last() {
            runtime.scene.draw_hud(&runtime.world, &mut hud);
        }
        hud
    }

    pub fn interpreter_counts(&self) -> (usize, usize) {
        self.runtimes
            .last()
            .map_or((0, 0), |runtime| runtime.scene.interpreter_counts())
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        self.runtimes
            .last_mut()
            .map_or_else(Vec::new, |runtime| runtime.scene.take_diagnostics())
    }

    /// Variables of the top scene, or the last ones seen once the stack is
    /// empty.
    pub fn variables(&self) -> &BTreeMap<u32, Value> {
        match self.runtimes.last() {
            Some(runtime) => runtime.world.variables(),
            None => &self.carried_variables,
        }
    }
}
