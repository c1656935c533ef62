use std::any::Any;
use std::fmt;

use thiserror::Error;

use crate::app::{HudFrame, InputEvent, ObjectId};

use super::context::CommandContext;

/// What the interpreter does with its cursor after a command hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Stay on the current node. Returned from `update`, the command keeps its
    /// state and runs again next tick; returned from `on_children_finished`,
    /// the node is entered again with a fresh state.
    Stay,
    /// Move this many tree steps. `Advance(0)` behaves like `Stay`.
    Advance(usize),
    /// Stop the whole reaction.
    End,
}

impl Flow {
    pub const NEXT: Flow = Flow::Advance(1);
}

/// Data-integrity failures raised while running a command. They halt the
/// interpreter that hit them and nothing else.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("Impossible to get the object ID {id}. Please check if this ID exists in the software.")]
    MissingObject { id: ObjectId },
    #[error("Impossible to get the {what} ID {id}. Please check if this ID exists in the software.")]
    MissingSystem { what: &'static str, id: u32 },
    #[error("parameter {index} was not passed to this reaction")]
    MissingParameter { index: usize },
    #[error("command {kind} needs an object but the reaction is not bound to one")]
    NoActingObject { kind: &'static str },
    #[error("cannot compare {left} with {right}")]
    IncomparableValues { left: String, right: String },
    #[error("value {value} is not a number")]
    NotANumber { value: String },
    #[error("common reaction {id} nested deeper than {limit} calls")]
    CallDepthExceeded { id: u32, limit: u8 },
    #[error("common reaction {id} stopped on an error")]
    CalledReactionFailed { id: u32 },
    #[error("command {kind} was handed a state it did not create")]
    StateMismatch { kind: &'static str },
}

/// One kind of script command. `State` is created when the cursor lands on the
/// node and handed back to every later hook until the cursor moves on.
pub trait Command: fmt::Debug + 'static {
    type State: 'static;

    fn kind(&self) -> &'static str;

    /// Parallel commands run in their own interpreter so the reaction that
    /// reached them can move on.
    fn is_parallel(&self) -> bool {
        false
    }

    fn initialize(&self, ctx: &mut CommandContext<'_>) -> Result<Self::State, CommandError>;

    fn update(
        &self,
        state: &mut Self::State,
        ctx: &mut CommandContext<'_>,
    ) -> Result<Flow, CommandError>;

    /// Runs when the cursor comes back up after the last child finished.
    fn on_children_finished(&self, _ctx: &mut CommandContext<'_>) -> Result<Flow, CommandError> {
        Ok(Flow::NEXT)
    }

    fn on_input(&self, _state: &mut Self::State, _event: &InputEvent) {}

    fn draw_hud(&self, _state: &Self::State, _hud: &mut HudFrame) {}
}

/// Opaque per-run state owned by an interpreter.
pub struct CommandState(Box<dyn Any>);

impl CommandState {
    pub fn new<T: 'static>(value: T) -> Self {
        Self(Box::new(value))
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.0.downcast_mut()
    }
}

impl fmt::Debug for CommandState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CommandState(..)")
    }
}

/// Object-safe view of [`Command`] stored in the tree.
pub trait DynCommand: fmt::Debug {
    fn kind_name(&self) -> &'static str;
    fn parallel(&self) -> bool;
    fn initialize_erased(&self, ctx: &mut CommandContext<'_>) -> Result<CommandState, CommandError>;
    fn update_erased(
        &self,
        state: &mut CommandState,
        ctx: &mut CommandContext<'_>,
    ) -> Result<Flow, CommandError>;
    fn children_finished_erased(&self, ctx: &mut CommandContext<'_>) -> Result<Flow, CommandError>;
    fn input_erased(&self, state: &mut CommandState, event: &InputEvent);
    fn draw_erased(&self, state: &CommandState, hud: &mut HudFrame);
}

impl<C: Command> DynCommand for C {
    fn kind_name(&self) -> &'static str {
        self.kind()
    }

    fn parallel(&self) -> bool {
        self.is_parallel()
    }

    fn initialize_erased(
        &self,
        ctx: &mut CommandContext<'_>,
    ) -> Result<CommandState, CommandError> {
        self.initialize(ctx).map(CommandState::new)
    }

    fn update_erased(
        &self,
        state: &mut CommandState,
        ctx: &mut CommandContext<'_>,
    ) -> Result<Flow, CommandError> {
        let state = state
            .downcast_mut::<C::State>()
            .ok_or(CommandError::StateMismatch { kind: self.kind() })?;
        self.update(state, ctx)
    }

    fn children_finished_erased(&self, ctx: &mut CommandContext<'_>) -> Result<Flow, CommandError> {
        self.on_children_finished(ctx)
    }

    fn input_erased(&self, state: &mut CommandState, event: &InputEvent) {
        if let Some(state) = state.downcast_mut::<C::State>() {
            self.on_input(state, event);
        }
    }

    fn draw_erased(&self, state: &CommandState, hud: &mut HudFrame) {
        if let Some(state) = state.downcast_ref::<C::State>() {
            self.draw_hud(state, hud);
        }
    }
}
