use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::app::{HudFrame, InputEvent, ObjectId, SceneWorld};

use super::context::{Diagnostic, SceneRequest, TickEffects, Trigger};
use super::events::send_event;
use super::interpreter::ReactionInterpreter;
use super::reaction::Reaction;

/// Owns every live interpreter of one scene: blocking reactions in trigger
/// order, then parallel commands.
#[derive(Debug, Default)]
pub struct SceneScheduler {
    blocking: Vec<ReactionInterpreter>,
    parallel: Vec<ReactionInterpreter>,
    blocking_hero: bool,
    diagnostics: Vec<Diagnostic>,
}

impl SceneScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts `reaction` for `trigger.object` unless it has no commands or is
    /// already running for that object. Unless `moving`, the object's own
    /// movement is held until the run finishes.
    pub fn add_reaction(
        &mut self,
        world: &mut SceneWorld,
        reaction: &Rc<Reaction>,
        trigger: Trigger,
        moving: bool,
    ) -> Option<&mut ReactionInterpreter> {
        if reaction.is_empty() {
            return None;
        }
        if self.is_running(trigger.object, reaction) {
            debug!(
                reaction = %reaction.name(),
                object = ?trigger.object,
                "reaction_rejected_duplicate"
            );
            return None;
        }

        let object = trigger.object;
        let mut interpreter =
            ReactionInterpreter::new(Rc::clone(reaction), trigger).with_moving(moving);
        if !moving {
            if let Some(target) = object.and_then(|id| world.object_mut(id)) {
                target.hold_pause();
                interpreter.mark_pause_held();
            }
        }
        debug!(
            reaction = %reaction.name(),
            object = ?object,
            moving,
            blocking_hero = reaction.blocking_hero(),
            "reaction_started"
        );
        self.blocking.push(interpreter);
        self.blocking.last_mut()
    }

    pub fn is_running(&self, object: Option<ObjectId>, reaction: &Rc<Reaction>) -> bool {
        self.blocking.iter().any(|interpreter| {
            interpreter.object() == object && Rc::ptr_eq(interpreter.reaction(), reaction)
        })
    }

    /// True when some run other than a movement route is bound to an object
    /// that is neither `object` nor `sender`.
    pub fn bound_elsewhere(&self, object: ObjectId, sender: Option<ObjectId>) -> bool {
        self.interpreters()
            .filter(|interpreter| !interpreter.is_moving_route())
            .any(|interpreter| {
                interpreter.object() != Some(object) && interpreter.object() != sender
            })
    }

    /// One scheduler tick. Returns the scene change a command asked for, if
    /// any; the rest of that pass is skipped.
    pub fn update(&mut self, world: &mut SceneWorld) -> Option<SceneRequest> {
        self.blocking_hero = self
            .blocking
            .iter()
            .any(|interpreter| interpreter.reaction().blocking_hero());

        let mut effects = TickEffects::default();
        self.update_blocking(world, &mut effects);
        if let Some(request) = effects.scene_request.take() {
            self.diagnostics.append(&mut effects.diagnostics);
            return Some(request);
        }
        self.commit(world, effects);

        let mut effects = TickEffects::default();
        self.update_parallel(world, &mut effects);
        let request = effects.scene_request.take();
        self.commit(world, effects);
        request
    }

    fn update_blocking(&mut self, world: &mut SceneWorld, effects: &mut TickEffects) {
        let total = self.blocking.len();
        let mut finished = Vec::new();
        for (index, interpreter) in self.blocking.iter_mut().enumerate() {
            interpreter.update(world, effects);
            if interpreter.is_finished() {
                interpreter.update_finish(world);
                finished.push(index);
            }
            if effects.scene_change_requested() {
                debug!(skipped = total - index - 1, "scheduler_pass_cut_by_scene_change");
                break;
            }
        }

        for index in finished.into_iter().rev() {
            let interpreter = self.blocking.remove(index);
            debug!(
                reaction = %interpreter.reaction().name(),
                object = ?interpreter.object(),
                "reaction_finished"
            );
        }
    }

    fn update_parallel(&mut self, world: &mut SceneWorld, effects: &mut TickEffects) {
        let mut moved_on = Vec::new();
        for (index, interpreter) in self.parallel.iter_mut().enumerate() {
            let before = interpreter.current_node();
            interpreter.update_command(world, effects);
            if interpreter.current_node() != before {
                interpreter.update_finish(world);
                moved_on.push(index);
            }
        }

        for index in moved_on.into_iter().rev() {
            let interpreter = self.parallel.remove(index);
            debug!(
                reaction = %interpreter.reaction().name(),
                object = ?interpreter.object(),
                "parallel_command_finished"
            );
        }
    }

    fn commit(&mut self, world: &mut SceneWorld, mut effects: TickEffects) {
        self.diagnostics.append(&mut effects.diagnostics);
        for fork in effects.forks {
            self.parallel.push(ReactionInterpreter::parallel_at(
                fork.reaction,
                fork.trigger,
                fork.node,
            ));
        }
        for request in &effects.events {
            let receivers = send_event(self, world, request);
            if receivers == 0 {
                debug!(event_id = request.event_id, target = ?request.target, "event_unhandled");
            }
        }
    }

    pub fn on_input(&mut self, event: &InputEvent) {
        for interpreter in self.blocking.iter_mut().chain(self.parallel.iter_mut()) {
            interpreter.on_input(event);
        }
    }

    pub fn draw_hud(&self, hud: &mut HudFrame) {
        for interpreter in self.interpreters() {
            interpreter.draw_hud(hud);
        }
    }

    /// Force-finishes every run so no object stays held once the scene is
    /// gone.
    pub fn close(&mut self, world: &mut SceneWorld) {
        let blocking = self.blocking.len();
        let parallel = self.parallel.len();
        for interpreter in self.blocking.iter_mut().chain(self.parallel.iter_mut()) {
            interpreter.force_finish(world);
        }
        self.blocking.clear();
        self.parallel.clear();
        self.blocking_hero = false;
        info!(blocking, parallel, "scheduler_closed");
    }

    /// Aggregate computed at the start of the last tick.
    pub fn blocking_hero(&self) -> bool {
        self.blocking_hero
    }

    pub fn blocking_count(&self) -> usize {
        self.blocking.len()
    }

    pub fn parallel_count(&self) -> usize {
        self.parallel.len()
    }

    pub fn is_idle(&self) -> bool {
        self.blocking.is_empty() && self.parallel.is_empty()
    }

    pub fn interpreters(&self) -> impl Iterator<Item = &ReactionInterpreter> {
        self.blocking.iter().chain(self.parallel.iter())
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

impl Drop for SceneScheduler {
    fn drop(&mut self) {
        let live = self.blocking.len() + self.parallel.len();
        if live > 0 {
            warn!(live, "scheduler_dropped_without_close");
        }
    }
}
