use crate::app::{HudFrame, InputEvent};
use crate::script::command::{Command, CommandError, Flow};
use crate::script::context::{CommandContext, Trigger};
use crate::script::interpreter::ReactionInterpreter;
use crate::script::value::DynamicValue;

/// Deepest chain of common reactions calling each other.
pub const MAX_CALL_DEPTH: u8 = 8;

/// Runs a shared reaction to completion before moving on. The called
/// reaction sees the caller's object and sender but its own parameters.
#[derive(Debug)]
pub struct CallCommon {
    id: u32,
    parameters: Vec<DynamicValue>,
}

impl CallCommon {
    pub fn new(id: u32, parameters: Vec<DynamicValue>) -> Self {
        Self { id, parameters }
    }
}

#[derive(Debug)]
pub struct CallState {
    inner: ReactionInterpreter,
}

impl Command for CallCommon {
    type State = CallState;

    fn kind(&self) -> &'static str {
        "call_common"
    }

    fn initialize(&self, ctx: &mut CommandContext<'_>) -> Result<CallState, CommandError> {
        let depth = ctx.depth() + 1;
        if depth > MAX_CALL_DEPTH {
            return Err(CommandError::CallDepthExceeded {
                id: self.id,
                limit: MAX_CALL_DEPTH,
            });
        }
        let reaction = ctx
            .world()
            .common_reaction(self.id)
            .ok_or(CommandError::MissingSystem {
                what: "common reaction",
                id: self.id,
            })?;
        let parameters = self
            .parameters
            .iter()
            .map(|parameter| ctx.resolve(parameter))
            .collect::<Result<Vec<_>, _>>()?;
        let caller = ctx.trigger();
        let trigger = Trigger {
            sender: caller.sender,
            object: caller.object,
            state_id: caller.state_id,
            event_id: caller.event_id,
            parameters,
        };
        Ok(CallState {
            inner: ReactionInterpreter::nested(reaction, trigger, depth)
                .with_moving(ctx.is_moving_route()),
        })
    }

    fn update(
        &self,
        state: &mut CallState,
        ctx: &mut CommandContext<'_>,
    ) -> Result<Flow, CommandError> {
        let (world, effects) = ctx.parts();
        state.inner.update(world, effects);
        if state.inner.is_failed() {
            return Err(CommandError::CalledReactionFailed { id: self.id });
        }
        Ok(if state.inner.is_finished() {
            Flow::NEXT
        } else {
            Flow::Stay
        })
    }

    fn on_input(&self, state: &mut CallState, event: &InputEvent) {
        state.inner.on_input(event);
    }

    fn draw_hud(&self, state: &CallState, hud: &mut HudFrame) {
        state.inner.draw_hud(hud);
    }
}
