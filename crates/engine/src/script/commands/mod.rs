//! Built-in command kinds and the serialized form scripts use to name them.

mod call;
mod flow;
mod message;
mod objects;
mod variables;

use serde::Deserialize;

use crate::app::{ObjectId, Orientation, HERO_ID};

use super::command::{CommandError, DynCommand};
use super::context::CommandContext;
use super::value::{Condition, DynamicValue};

pub use call::{CallCommon, MAX_CALL_DEPTH};
pub use flow::{Break, Else, If, StopReaction, Wait, While};
pub use message::{Choice, DisplayChoice, ShowText};
pub use objects::{ChangeState, MoveObject, RemoveObject, StateOperation, Teleport};
pub use variables::{EventReceiver, SendEvent, SetVariable, VariableOperation};

/// Which object a command acts on, resolved against the running reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectRef {
    /// The object the reaction runs for.
    #[default]
    This,
    Hero,
    Sender,
    Object(ObjectId),
}

impl ObjectRef {
    pub fn resolve(
        self,
        ctx: &CommandContext<'_>,
        kind: &'static str,
    ) -> Result<ObjectId, CommandError> {
        let id = match self {
            ObjectRef::This => ctx.acting_object(kind)?,
            ObjectRef::Hero => ctx.world().hero_id().unwrap_or(HERO_ID),
            ObjectRef::Sender => ctx
                .trigger()
                .sender
                .ok_or(CommandError::NoActingObject { kind })?,
            ObjectRef::Object(id) => id,
        };
        ctx.object(id)?;
        Ok(id)
    }
}

fn default_true() -> bool {
    true
}

fn default_frames_per_step() -> u32 {
    4
}

/// One script command as written in content files.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandDef {
    Wait {
        ticks: DynamicValue,
    },
    ShowText {
        #[serde(default)]
        speaker: Option<String>,
        text: String,
    },
    DisplayChoice {
        choices: Vec<String>,
        #[serde(default)]
        cancel_index: Option<usize>,
    },
    Choice,
    If {
        condition: Condition,
    },
    Else,
    While {
        condition: Condition,
    },
    Break,
    StopReaction,
    SetVariable {
        variable: u32,
        #[serde(default)]
        operation: VariableOperation,
        value: DynamicValue,
    },
    SendEvent {
        to: EventReceiver,
        #[serde(default)]
        system: bool,
        event_id: u32,
        #[serde(default)]
        parameters: Vec<DynamicValue>,
    },
    MoveObject {
        #[serde(default)]
        object: ObjectRef,
        steps: Vec<Orientation>,
        #[serde(default = "default_true")]
        wait_end: bool,
        #[serde(default = "default_frames_per_step")]
        frames_per_step: u32,
    },
    Teleport {
        map_id: u32,
        x: i32,
        y: i32,
        #[serde(default)]
        orientation: Option<Orientation>,
    },
    ChangeState {
        #[serde(default)]
        object: ObjectRef,
        state: u32,
        #[serde(default)]
        operation: StateOperation,
    },
    RemoveObject {
        #[serde(default)]
        object: ObjectRef,
    },
    CallCommon {
        id: u32,
        #[serde(default)]
        parameters: Vec<DynamicValue>,
    },
}

impl CommandDef {
    pub fn kind(&self) -> &'static str {
        match self {
            CommandDef::Wait { .. } => "wait",
            CommandDef::ShowText { .. } => "show_text",
            CommandDef::DisplayChoice { .. } => "display_choice",
            CommandDef::Choice => "choice",
            CommandDef::If { .. } => "if",
            CommandDef::Else => "else",
            CommandDef::While { .. } => "while",
            CommandDef::Break => "break",
            CommandDef::StopReaction => "stop_reaction",
            CommandDef::SetVariable { .. } => "set_variable",
            CommandDef::SendEvent { .. } => "send_event",
            CommandDef::MoveObject { .. } => "move_object",
            CommandDef::Teleport { .. } => "teleport",
            CommandDef::ChangeState { .. } => "change_state",
            CommandDef::RemoveObject { .. } => "remove_object",
            CommandDef::CallCommon { .. } => "call_common",
        }
    }

    /// Turns the definition into a tree command. `followed_by_else` tells an
    /// `if` that its next sibling is an `else` branch.
    pub fn build(self, followed_by_else: bool) -> Box<dyn DynCommand> {
        match self {
            CommandDef::Wait { ticks } => Box::new(Wait::new(ticks)),
            CommandDef::ShowText { speaker, text } => Box::new(ShowText::new(speaker, text)),
            CommandDef::DisplayChoice {
                choices,
                cancel_index,
            } => Box::new(DisplayChoice::new(choices, cancel_index)),
            CommandDef::Choice => Box::new(Choice),
            CommandDef::If { condition } => Box::new(If::new(condition, followed_by_else)),
            CommandDef::Else => Box::new(Else),
            CommandDef::While { condition } => Box::new(While::new(condition)),
            CommandDef::Break => Box::new(Break),
            CommandDef::StopReaction => Box::new(StopReaction),
            CommandDef::SetVariable {
                variable,
                operation,
                value,
            } => Box::new(SetVariable::new(variable, operation, value)),
            CommandDef::SendEvent {
                to,
                system,
                event_id,
                parameters,
            } => Box::new(SendEvent::new(to, system, event_id, parameters)),
            CommandDef::MoveObject {
                object,
                steps,
                wait_end,
                frames_per_step,
            } => Box::new(MoveObject::new(object, steps, wait_end, frames_per_step)),
            CommandDef::Teleport {
                map_id,
                x,
                y,
                orientation,
            } => Box::new(Teleport::new(map_id, crate::app::TilePos::new(x, y), orientation)),
            CommandDef::ChangeState {
                object,
                state,
                operation,
            } => Box::new(ChangeState::new(object, state, operation)),
            CommandDef::RemoveObject { object } => Box::new(RemoveObject::new(object)),
            CommandDef::CallCommon { id, parameters } => Box::new(CallCommon::new(id, parameters)),
        }
    }
}
