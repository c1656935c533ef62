use serde::Deserialize;

use crate::app::{ObjectId, Orientation, TilePos, HERO_ID};
use crate::script::command::{Command, CommandError, Flow};
use crate::script::context::{CommandContext, SceneRequest};

use super::ObjectRef;

/// Walks an object along a list of directions, one tile every
/// `frames_per_step` ticks. Without `wait_end` it runs beside the reaction.
#[derive(Debug)]
pub struct MoveObject {
    object: ObjectRef,
    steps: Vec<Orientation>,
    wait_end: bool,
    frames_per_step: u32,
}

impl MoveObject {
    pub fn new(
        object: ObjectRef,
        steps: Vec<Orientation>,
        wait_end: bool,
        frames_per_step: u32,
    ) -> Self {
        Self {
            object,
            steps,
            wait_end,
            frames_per_step: frames_per_step.max(1),
        }
    }
}

#[derive(Debug)]
pub struct MoveState {
    object: ObjectId,
    next_step: usize,
    cooldown: u32,
}

impl Command for MoveObject {
    type State = MoveState;

    fn kind(&self) -> &'static str {
        "move_object"
    }

    fn is_parallel(&self) -> bool {
        !self.wait_end
    }

    fn initialize(&self, ctx: &mut CommandContext<'_>) -> Result<MoveState, CommandError> {
        Ok(MoveState {
            object: self.object.resolve(ctx, self.kind())?,
            next_step: 0,
            cooldown: 0,
        })
    }

    fn update(
        &self,
        state: &mut MoveState,
        ctx: &mut CommandContext<'_>,
    ) -> Result<Flow, CommandError> {
        // A route freezes while its own object is busy with a reaction.
        if ctx.is_moving_route() && ctx.object(state.object)?.is_paused() {
            return Ok(Flow::Stay);
        }
        if state.cooldown > 0 {
            state.cooldown -= 1;
            if state.cooldown == 0 && state.next_step == self.steps.len() {
                return Ok(Flow::NEXT);
            }
            return Ok(Flow::Stay);
        }
        let Some(direction) = self.steps.get(state.next_step).copied() else {
            return Ok(Flow::NEXT);
        };

        let target = ctx.object(state.object)?.position.step(direction);
        let free = ctx.world().is_passable(target, state.object);
        let object = ctx.object_mut(state.object)?;
        object.orientation = direction;
        if free {
            object.position = target;
        }
        state.next_step += 1;
        state.cooldown = self.frames_per_step.saturating_sub(1);
        if state.next_step == self.steps.len() && state.cooldown == 0 {
            return Ok(Flow::NEXT);
        }
        Ok(Flow::Stay)
    }
}

/// Moves the hero. Another map is reached through a scene change request.
#[derive(Debug)]
pub struct Teleport {
    map_id: u32,
    position: TilePos,
    orientation: Option<Orientation>,
}

impl Teleport {
    pub fn new(map_id: u32, position: TilePos, orientation: Option<Orientation>) -> Self {
        Self {
            map_id,
            position,
            orientation,
        }
    }
}

impl Command for Teleport {
    type State = ();

    fn kind(&self) -> &'static str {
        "teleport"
    }

    fn initialize(&self, _ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        Ok(())
    }

    fn update(&self, _state: &mut (), ctx: &mut CommandContext<'_>) -> Result<Flow, CommandError> {
        if ctx.world().map_id() == Some(self.map_id) {
            let hero = ctx.world().hero_id().unwrap_or(HERO_ID);
            let hero = ctx.object_mut(hero)?;
            hero.position = self.position;
            if let Some(orientation) = self.orientation {
                hero.orientation = orientation;
            }
        } else {
            ctx.request_scene(SceneRequest::Teleport {
                map_id: self.map_id,
                position: self.position,
                orientation: self.orientation,
            });
        }
        Ok(Flow::NEXT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateOperation {
    #[default]
    Replace,
    Add,
    Remove,
}

#[derive(Debug)]
pub struct ChangeState {
    object: ObjectRef,
    state: u32,
    operation: StateOperation,
}

impl ChangeState {
    pub fn new(object: ObjectRef, state: u32, operation: StateOperation) -> Self {
        Self {
            object,
            state,
            operation,
        }
    }
}

impl Command for ChangeState {
    type State = ();

    fn kind(&self) -> &'static str {
        "change_state"
    }

    fn initialize(&self, _ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        Ok(())
    }

    fn update(&self, _state: &mut (), ctx: &mut CommandContext<'_>) -> Result<Flow, CommandError> {
        let id = self.object.resolve(ctx, self.kind())?;
        let object = ctx.object_mut(id)?;
        if self.operation != StateOperation::Remove && !object.model().has_state(self.state) {
            return Err(CommandError::MissingSystem {
                what: "state",
                id: self.state,
            });
        }
        match self.operation {
            StateOperation::Replace => object.set_states(vec![self.state]),
            StateOperation::Add => object.add_state(self.state),
            StateOperation::Remove => object.remove_state(self.state),
        }
        Ok(Flow::NEXT)
    }
}

#[derive(Debug)]
pub struct RemoveObject {
    object: ObjectRef,
}

impl RemoveObject {
    pub fn new(object: ObjectRef) -> Self {
        Self { object }
    }
}

impl Command for RemoveObject {
    type State = ();

    fn kind(&self) -> &'static str {
        "remove_object"
    }

    fn initialize(&self, _ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        Ok(())
    }

    fn update(&self, _state: &mut (), ctx: &mut CommandContext<'_>) -> Result<Flow, CommandError> {
        let id = self.object.resolve(ctx, self.kind())?;
        ctx.world_mut().remove_object(id);
        Ok(Flow::NEXT)
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::app::{MapObject, ObjectModel, ObjectStateDef, SceneWorld};
    use crate::script::testing::world_with_objects;
    use crate::script::{CommandTree, Reaction, ReactionInterpreter, TickEffects, Trigger};

    fn single(command: impl Command) -> Rc<Reaction> {
        let mut tree = CommandTree::new();
        let root = tree.root();
        tree.add(root, command);
        Rc::new(Reaction::new("objects", tree, false))
    }

    fn tick(interpreter: &mut ReactionInterpreter, world: &mut SceneWorld) -> TickEffects {
        let mut effects = TickEffects::default();
        interpreter.update(world, &mut effects);
        effects
    }

    #[test]
    fn move_steps_once_per_interval() {
        let mut world = world_with_objects(&[1]);
        let reaction = single(MoveObject::new(
            ObjectRef::This,
            vec![Orientation::Down, Orientation::Down],
            true,
            2,
        ));
        let mut interpreter = ReactionInterpreter::new(reaction, Trigger::for_object(ObjectId(1)));

        let positions: Vec<TilePos> = (0..4)
            .map(|_| {
                tick(&mut interpreter, &mut world);
                world.object(ObjectId(1)).expect("mover").position
            })
            .collect();
        assert_eq!(
            positions,
            vec![
                TilePos::new(0, 1),
                TilePos::new(0, 1),
                TilePos::new(0, 2),
                TilePos::new(0, 2)
            ]
        );
        assert!(interpreter.is_finished());
        assert_eq!(world.object(ObjectId(1)).expect("mover").orientation, Orientation::Down);
    }

    #[test]
    fn blocked_step_only_turns() {
        let mut world = world_with_objects(&[1, 2]);
        let reaction = single(MoveObject::new(ObjectRef::This, vec![Orientation::Right], true, 1));
        let mut interpreter = ReactionInterpreter::new(reaction, Trigger::for_object(ObjectId(1)));

        tick(&mut interpreter, &mut world);
        let mover = world.object(ObjectId(1)).expect("mover");
        assert_eq!(mover.position, TilePos::new(0, 0));
        assert_eq!(mover.orientation, Orientation::Right);
        assert!(interpreter.is_finished());
    }

    #[test]
    fn route_waits_while_its_object_is_paused() {
        let mut world = world_with_objects(&[1]);
        world.object_mut(ObjectId(1)).expect("guard").hold_pause();
        let reaction = single(MoveObject::new(ObjectRef::This, vec![Orientation::Left], true, 1));
        let mut interpreter =
            ReactionInterpreter::new(reaction, Trigger::for_object(ObjectId(1))).with_moving(true);

        tick(&mut interpreter, &mut world);
        tick(&mut interpreter, &mut world);
        assert_eq!(world.object(ObjectId(1)).expect("guard").position, TilePos::new(0, 0));

        world.object_mut(ObjectId(1)).expect("guard").release_pause();
        tick(&mut interpreter, &mut world);
        assert_eq!(world.object(ObjectId(1)).expect("guard").position, TilePos::new(-1, 0));
    }

    #[test]
    fn teleport_to_another_map_requests_a_scene_change() {
        let mut world = world_with_objects(&[0]);
        world.set_map_id(1);
        let reaction = single(Teleport::new(2, TilePos::new(4, 5), Some(Orientation::Up)));
        let mut interpreter = ReactionInterpreter::new(reaction, Trigger::for_object(ObjectId(0)));

        let effects = tick(&mut interpreter, &mut world);
        assert!(effects.scene_change_requested());
        assert_eq!(world.object(ObjectId(0)).expect("hero").position, TilePos::new(0, 0));
    }

    #[test]
    fn teleport_within_the_map_moves_the_hero() {
        let mut world = world_with_objects(&[0]);
        world.set_map_id(1);
        world.set_hero(ObjectId(0));
        let reaction = single(Teleport::new(1, TilePos::new(4, 5), Some(Orientation::Up)));
        let mut interpreter = ReactionInterpreter::new(reaction, Trigger::default());

        let effects = tick(&mut interpreter, &mut world);
        assert!(!effects.scene_change_requested());
        let hero = world.object(ObjectId(0)).expect("hero");
        assert_eq!(hero.position, TilePos::new(4, 5));
        assert_eq!(hero.orientation, Orientation::Up);
    }

    #[test]
    fn change_state_requires_a_known_state() {
        let mut world = SceneWorld::default();
        let model = Rc::new(ObjectModel {
            states: vec![ObjectStateDef::new(1), ObjectStateDef::new(2)],
            ..ObjectModel::default()
        });
        world.insert_object(MapObject::new(ObjectId(1), "door", TilePos::new(0, 0), model));

        let swap = single(ChangeState::new(ObjectRef::This, 2, StateOperation::Replace));
        let mut interpreter = ReactionInterpreter::new(swap, Trigger::for_object(ObjectId(1)));
        tick(&mut interpreter, &mut world);
        assert_eq!(world.object(ObjectId(1)).expect("door").states(), &[2]);

        let add = single(ChangeState::new(ObjectRef::This, 1, StateOperation::Add));
        let mut interpreter = ReactionInterpreter::new(add, Trigger::for_object(ObjectId(1)));
        tick(&mut interpreter, &mut world);
        assert_eq!(world.object(ObjectId(1)).expect("door").states(), &[2, 1]);

        let unknown = single(ChangeState::new(ObjectRef::This, 9, StateOperation::Add));
        let mut interpreter = ReactionInterpreter::new(unknown, Trigger::for_object(ObjectId(1)));
        let effects = tick(&mut interpreter, &mut world);
        assert_eq!(
            effects.diagnostics()[0].error,
            CommandError::MissingSystem { what: "state", id: 9 }
        );
    }

    #[test]
    fn removed_object_leaves_at_frame_end() {
        let mut world = world_with_objects(&[1, 2]);
        let reaction = single(RemoveObject::new(ObjectRef::Object(ObjectId(2))));
        let mut interpreter = ReactionInterpreter::new(reaction, Trigger::for_object(ObjectId(1)));

        tick(&mut interpreter, &mut world);
        assert!(world.object(ObjectId(2)).expect("still present").is_removed());
        world.end_frame();
        assert!(world.object(ObjectId(2)).is_none());
    }
}
