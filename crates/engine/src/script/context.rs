use std::fmt;
use std::rc::Rc;

use crate::app::{MapObject, ObjectId, Orientation, SceneWorld, TilePos};

use super::command::CommandError;
use super::node::{CommandTree, NodeId};
use super::reaction::Reaction;
use super::value::{Condition, DynamicValue, Value};

/// Who a reaction runs for and what it was started with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trigger {
    pub sender: Option<ObjectId>,
    pub object: Option<ObjectId>,
    pub state_id: Option<u32>,
    pub event_id: Option<u32>,
    pub parameters: Vec<Value>,
}

impl Trigger {
    pub fn for_object(object: ObjectId) -> Self {
        Self {
            object: Some(object),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTarget {
    All { exclude: Option<ObjectId> },
    Object(ObjectId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventRequest {
    pub sender: Option<ObjectId>,
    pub target: EventTarget,
    pub is_system: bool,
    pub event_id: u32,
    pub parameters: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SceneRequest {
    Teleport {
        map_id: u32,
        position: TilePos,
        orientation: Option<Orientation>,
    },
}

/// A command failure recorded for the author.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub reaction: String,
    pub object: Option<ObjectId>,
    pub node: NodeId,
    pub command: &'static str,
    pub error: CommandError,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.object {
            Some(object) => write!(
                f,
                "{} (reaction={}, object={}, command={} {})",
                self.error, self.reaction, object, self.command, self.node
            ),
            None => write!(
                f,
                "{} (reaction={}, command={} {})",
                self.error, self.reaction, self.command, self.node
            ),
        }
    }
}

/// Side effects queued by commands during a scheduler pass and applied by the
/// scheduler once the pass is over.
#[derive(Debug, Default)]
pub struct TickEffects {
    pub(crate) forks: Vec<ParallelFork>,
    pub(crate) events: Vec<EventRequest>,
    pub(crate) scene_request: Option<SceneRequest>,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl TickEffects {
    pub fn scene_change_requested(&self) -> bool {
        self.scene_request.is_some()
    }

    pub fn queued_events(&self) -> &[EventRequest] {
        &self.events
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

#[derive(Debug)]
pub(crate) struct ParallelFork {
    pub(crate) reaction: Rc<Reaction>,
    pub(crate) trigger: Trigger,
    pub(crate) node: NodeId,
}

/// Everything a command hook may touch while it runs.
pub struct CommandContext<'a> {
    world: &'a mut SceneWorld,
    effects: &'a mut TickEffects,
    tree: &'a CommandTree,
    node: NodeId,
    trigger: &'a Trigger,
    moving: bool,
    depth: u8,
}

impl<'a> CommandContext<'a> {
    pub fn new(
        world: &'a mut SceneWorld,
        effects: &'a mut TickEffects,
        tree: &'a CommandTree,
        node: NodeId,
        trigger: &'a Trigger,
    ) -> Self {
        Self {
            world,
            effects,
            tree,
            node,
            trigger,
            moving: false,
            depth: 0,
        }
    }

    pub(crate) fn with_route(mut self, moving: bool) -> Self {
        self.moving = moving;
        self
    }

    pub(crate) fn with_depth(mut self, depth: u8) -> Self {
        self.depth = depth;
        self
    }

    pub fn world(&self) -> &SceneWorld {
        &*self.world
    }

    pub fn world_mut(&mut self) -> &mut SceneWorld {
        &mut *self.world
    }

    pub fn parts(&mut self) -> (&mut SceneWorld, &mut TickEffects) {
        (&mut *self.world, &mut *self.effects)
    }

    pub fn tree(&self) -> &'a CommandTree {
        self.tree
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn trigger(&self) -> &'a Trigger {
        self.trigger
    }

    /// True when this run is the acting object's own movement route.
    pub fn is_moving_route(&self) -> bool {
        self.moving
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn acting_object(&self, kind: &'static str) -> Result<ObjectId, CommandError> {
        self.trigger
            .object
            .ok_or(CommandError::NoActingObject { kind })
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Result<&mut MapObject, CommandError> {
        self.world
            .object_mut(id)
            .ok_or(CommandError::MissingObject { id })
    }

    pub fn object(&self, id: ObjectId) -> Result<&MapObject, CommandError> {
        self.world.object(id).ok_or(CommandError::MissingObject { id })
    }

    pub fn resolve(&self, value: &DynamicValue) -> Result<Value, CommandError> {
        match value {
            DynamicValue::Constant(value) => Ok(value.clone()),
            DynamicValue::Variable { var } => Ok(self.world.variable(*var)),
            DynamicValue::Parameter { param } => self
                .trigger
                .parameters
                .get(*param)
                .cloned()
                .ok_or(CommandError::MissingParameter { index: *param }),
        }
    }

    pub fn evaluate(&self, condition: &Condition) -> Result<bool, CommandError> {
        let left = self.resolve(&condition.left)?;
        let right = self.resolve(&condition.right)?;
        condition.op.evaluate(&left, &right)
    }

    pub fn queue_event(&mut self, request: EventRequest) {
        self.effects.events.push(request);
    }

    /// The first request of a pass wins; the pass stops right after it.
    pub fn request_scene(&mut self, request: SceneRequest) {
        if self.effects.scene_request.is_none() {
            self.effects.scene_request = Some(request);
        }
    }
}
