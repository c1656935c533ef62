use serde::Deserialize;

use crate::app::ObjectId;
use crate::script::command::{Command, CommandError, Flow};
use crate::script::context::{CommandContext, EventRequest, EventTarget};
use crate::script::value::{DynamicValue, Value};

use super::ObjectRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableOperation {
    #[default]
    Set,
    Add,
    Sub,
    Mul,
}

#[derive(Debug)]
pub struct SetVariable {
    variable: u32,
    operation: VariableOperation,
    value: DynamicValue,
}

impl SetVariable {
    pub fn new(variable: u32, operation: VariableOperation, value: DynamicValue) -> Self {
        Self {
            variable,
            operation,
            value,
        }
    }
}

impl Command for SetVariable {
    type State = ();

    fn kind(&self) -> &'static str {
        "set_variable"
    }

    fn initialize(&self, _ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        Ok(())
    }

    fn update(&self, _state: &mut (), ctx: &mut CommandContext<'_>) -> Result<Flow, CommandError> {
        let operand = ctx.resolve(&self.value)?;
        let result = match self.operation {
            VariableOperation::Set => operand,
            operation => {
                let current = ctx.world().variable(self.variable).number()?;
                let operand = operand.number()?;
                Value::Number(match operation {
                    VariableOperation::Add => current + operand,
                    VariableOperation::Sub => current - operand,
                    _ => current * operand,
                })
            }
        };
        ctx.world_mut().set_variable(self.variable, result);
        Ok(Flow::NEXT)
    }
}

/// Receivers of a `send_event` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventReceiver {
    All,
    /// Every object except the one sending.
    AllOthers,
    Object(ObjectId),
    Sender,
    Hero,
    This,
}

/// Queues an event; it is delivered once the current scheduler pass is over.
#[derive(Debug)]
pub struct SendEvent {
    to: EventReceiver,
    is_system: bool,
    event_id: u32,
    parameters: Vec<DynamicValue>,
}

impl SendEvent {
    pub fn new(
        to: EventReceiver,
        is_system: bool,
        event_id: u32,
        parameters: Vec<DynamicValue>,
    ) -> Self {
        Self {
            to,
            is_system,
            event_id,
            parameters,
        }
    }

    fn target(&self, ctx: &CommandContext<'_>) -> Result<EventTarget, CommandError> {
        let single = |object: ObjectRef| object.resolve(ctx, self.kind()).map(EventTarget::Object);
        match self.to {
            EventReceiver::All => Ok(EventTarget::All { exclude: None }),
            EventReceiver::AllOthers => Ok(EventTarget::All {
                exclude: ctx.trigger().object,
            }),
            EventReceiver::Object(id) => single(ObjectRef::Object(id)),
            EventReceiver::Sender => single(ObjectRef::Sender),
            EventReceiver::Hero => single(ObjectRef::Hero),
            EventReceiver::This => single(ObjectRef::This),
        }
    }
}

impl Command for SendEvent {
    type State = ();

    fn kind(&self) -> &'static str {
        "send_event"
    }

    fn initialize(&self, _ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        Ok(())
    }

    fn update(&self, _state: &mut (), ctx: &mut CommandContext<'_>) -> Result<Flow, CommandError> {
        let target = self.target(ctx)?;
        let parameters = self
            .parameters
            .iter()
            .map(|parameter| ctx.resolve(parameter))
            .collect::<Result<Vec<_>, _>>()?;
        let sender = ctx.trigger().object;
        ctx.queue_event(EventRequest {
            sender,
            target,
            is_system: self.is_system,
            event_id: self.event_id,
            parameters,
        });
        Ok(Flow::NEXT)
    }
}
