//! Reaction scripts: the command tree, the per-run interpreter and the
//! scheduler that ticks every run of a scene.

mod command;
pub mod commands;
mod context;
mod events;
mod interpreter;
mod node;
mod reaction;
mod scheduler;
#[cfg(test)]
pub(crate) mod testing;
mod value;

pub use command::{Command, CommandError, CommandState, DynCommand, Flow};
pub use context::{
    CommandContext, Diagnostic, EventRequest, EventTarget, SceneRequest, TickEffects, Trigger,
};
pub use events::{receive_event, send_event, EVENT_ACTION, EVENT_TIME};
pub use interpreter::{InterpreterStatus, ReactionInterpreter};
pub use node::{Children, CommandTree, Cursor, NodeId, Phase};
pub use reaction::Reaction;
pub use scheduler::SceneScheduler;
pub use value::{Comparison, Condition, DynamicValue, Value};
