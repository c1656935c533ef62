use std::rc::Rc;

use tracing::{debug, error};

use crate::app::{HudFrame, InputEvent, ObjectId, SceneWorld};

use super::command::{CommandError, CommandState, Flow};
use super::context::{CommandContext, Diagnostic, ParallelFork, TickEffects, Trigger};
use super::node::{CommandTree, Cursor, NodeId, Phase};
use super::reaction::Reaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpreterStatus {
    Running,
    AwaitingAdvance,
    Finished,
    /// Stopped early by a command error.
    Failed,
}

/// Cursor over one reaction run. Each tick runs the current command once and
/// moves the cursor by whatever the command returned.
#[derive(Debug)]
pub struct ReactionInterpreter {
    reaction: Rc<Reaction>,
    trigger: Trigger,
    cursor: Option<Cursor>,
    state: Option<CommandState>,
    is_parallel: bool,
    moving: bool,
    holds_pause: bool,
    finish_applied: bool,
    failed: bool,
    depth: u8,
}

impl ReactionInterpreter {
    pub fn new(reaction: Rc<Reaction>, trigger: Trigger) -> Self {
        let cursor = reaction.tree().start();
        Self {
            reaction,
            trigger,
            cursor,
            state: None,
            is_parallel: false,
            moving: false,
            holds_pause: false,
            finish_applied: false,
            failed: false,
            depth: 0,
        }
    }

    /// Interpreter that runs a single parallel command starting at `node`.
    pub fn parallel_at(reaction: Rc<Reaction>, trigger: Trigger, node: NodeId) -> Self {
        Self {
            cursor: Some(Cursor::enter(node)),
            is_parallel: true,
            ..Self::new(reaction, trigger)
        }
    }

    pub(crate) fn nested(reaction: Rc<Reaction>, trigger: Trigger, depth: u8) -> Self {
        Self {
            depth,
            ..Self::new(reaction, trigger)
        }
    }

    pub fn with_moving(mut self, moving: bool) -> Self {
        self.moving = moving;
        self
    }

    pub fn reaction(&self) -> &Rc<Reaction> {
        &self.reaction
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    pub fn object(&self) -> Option<ObjectId> {
        self.trigger.object
    }

    pub fn is_parallel(&self) -> bool {
        self.is_parallel
    }

    pub fn is_moving_route(&self) -> bool {
        self.moving
    }

    pub fn holds_pause(&self) -> bool {
        self.holds_pause
    }

    pub(crate) fn mark_pause_held(&mut self) {
        self.holds_pause = true;
    }

    pub fn current_node(&self) -> Option<NodeId> {
        self.cursor.map(|cursor| cursor.node)
    }

    pub fn status(&self) -> InterpreterStatus {
        match (self.cursor, self.state.is_some()) {
            (None, _) if self.failed => InterpreterStatus::Failed,
            (None, _) => InterpreterStatus::Finished,
            (Some(_), true) => InterpreterStatus::AwaitingAdvance,
            (Some(_), false) => InterpreterStatus::Running,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.cursor.is_none()
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn update(&mut self, world: &mut SceneWorld, effects: &mut TickEffects) {
        if self.is_finished() {
            return;
        }
        self.update_command(world, effects);
    }

    /// Runs the command under the cursor once. A parallel command reached by a
    /// non-parallel run is handed to a new parallel interpreter and skipped.
    /// Movement routes run it in place so it stays under the route's pause rule.
    pub fn update_command(&mut self, world: &mut SceneWorld, effects: &mut TickEffects) {
        let Some(cursor) = self.cursor else {
            return;
        };
        let reaction = Rc::clone(&self.reaction);
        let tree = reaction.tree();
        let node = cursor.node;
        let command = tree.command(node);

        if command.parallel() && !self.is_parallel && !self.moving {
            debug!(
                reaction = %reaction.name(),
                command = command.kind_name(),
                node = %node,
                "parallel_command_forked"
            );
            effects.forks.push(ParallelFork {
                reaction: Rc::clone(&reaction),
                trigger: self.trigger.clone(),
                node,
            });
            self.apply_flow(tree, cursor, Flow::Advance(tree.skip_offset(node)), world, effects);
            return;
        }

        match self.run_update(tree, node, world, effects) {
            Ok(flow) => self.apply_flow(tree, cursor, flow, world, effects),
            Err(error) => self.fail(node, command.kind_name(), error, effects),
        }
    }

    fn run_update(
        &mut self,
        tree: &CommandTree,
        node: NodeId,
        world: &mut SceneWorld,
        effects: &mut TickEffects,
    ) -> Result<Flow, CommandError> {
        let command = tree.command(node);
        let mut ctx = CommandContext::new(world, effects, tree, node, &self.trigger)
            .with_route(self.moving)
            .with_depth(self.depth);
        let state = match self.state.take() {
            Some(state) => state,
            None => command.initialize_erased(&mut ctx)?,
        };
        let state = self.state.insert(state);
        command.update_erased(state, &mut ctx)
    }

    fn apply_flow(
        &mut self,
        tree: &CommandTree,
        mut cursor: Cursor,
        mut flow: Flow,
        world: &mut SceneWorld,
        effects: &mut TickEffects,
    ) {
        loop {
            match flow {
                Flow::End => {
                    self.finish_run();
                    return;
                }
                Flow::Stay | Flow::Advance(0) => {
                    if cursor.phase == Phase::Return {
                        self.state = None;
                        self.cursor = Some(Cursor::enter(cursor.node));
                    }
                    return;
                }
                Flow::Advance(steps) => {
                    self.state = None;
                    let Some(next) = tree.advance(cursor, steps) else {
                        self.finish_run();
                        return;
                    };
                    self.cursor = Some(next);
                    if next.phase == Phase::Enter {
                        return;
                    }

                    cursor = next;
                    let command = tree.command(next.node);
                    let mut ctx =
                        CommandContext::new(world, effects, tree, next.node, &self.trigger)
                            .with_route(self.moving)
                            .with_depth(self.depth);
                    match command.children_finished_erased(&mut ctx) {
                        Ok(resolved) => flow = resolved,
                        Err(error) => {
                            self.fail(next.node, command.kind_name(), error, effects);
                            return;
                        }
                    }
                }
            }
        }
    }

    fn fail(
        &mut self,
        node: NodeId,
        command: &'static str,
        error: CommandError,
        effects: &mut TickEffects,
    ) {
        self.failed = true;
        // The called run already reported its own error.
        if let CommandError::CalledReactionFailed { id } = error {
            debug!(
                reaction = %self.reaction.name(),
                object = ?self.trigger.object,
                common = id,
                "caller_stopped_by_common_reaction"
            );
            self.finish_run();
            return;
        }
        error!(
            reaction = %self.reaction.name(),
            object = ?self.trigger.object,
            command,
            node = %node,
            error = %error,
            "command_failed"
        );
        effects.diagnostics.push(Diagnostic {
            reaction: self.reaction.name().to_string(),
            object: self.trigger.object,
            node,
            command,
            error,
        });
        self.finish_run();
    }

    fn finish_run(&mut self) {
        self.cursor = None;
        self.state = None;
    }

    /// Once-only teardown: gives back the movement hold taken when the run
    /// started. Later calls do nothing.
    pub fn update_finish(&mut self, world: &mut SceneWorld) {
        if self.finish_applied {
            return;
        }
        self.finish_applied = true;
        if !self.holds_pause {
            return;
        }
        self.holds_pause = false;
        if let Some(object) = self.trigger.object.and_then(|id| world.object_mut(id)) {
            object.release_pause();
        }
    }

    /// Stops the run wherever it is and applies the teardown.
    pub fn force_finish(&mut self, world: &mut SceneWorld) {
        self.finish_run();
        self.update_finish(world);
    }

    pub fn on_input(&mut self, event: &InputEvent) {
        let (Some(cursor), Some(state)) = (self.cursor, self.state.as_mut()) else {
            return;
        };
        self.reaction
            .tree()
            .command(cursor.node)
            .input_erased(state, event);
    }

    pub fn draw_hud(&self, hud: &mut HudFrame) {
        let (Some(cursor), Some(state)) = (self.cursor, self.state.as_ref()) else {
            return;
        };
        self.reaction.tree().command(cursor.node).draw_erased(state, hud);
    }
}
