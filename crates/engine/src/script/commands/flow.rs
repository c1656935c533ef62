use crate::script::command::{Command, CommandError, Flow};
use crate::script::context::CommandContext;
use crate::script::value::{Condition, DynamicValue};

/// Holds the cursor for a number of ticks.
#[derive(Debug)]
pub struct Wait {
    ticks: DynamicValue,
}

impl Wait {
    pub fn new(ticks: DynamicValue) -> Self {
        Self { ticks }
    }
}

#[derive(Debug)]
pub struct WaitState {
    remaining: u32,
}

impl Command for Wait {
    type State = WaitState;

    fn kind(&self) -> &'static str {
        "wait"
    }

    fn initialize(&self, ctx: &mut CommandContext<'_>) -> Result<WaitState, CommandError> {
        let ticks = ctx.resolve(&self.ticks)?.number()?;
        Ok(WaitState {
            remaining: ticks.max(0.0).round() as u32,
        })
    }

    fn update(
        &self,
        state: &mut WaitState,
        _ctx: &mut CommandContext<'_>,
    ) -> Result<Flow, CommandError> {
        if state.remaining <= 1 {
            return Ok(Flow::NEXT);
        }
        state.remaining -= 1;
        Ok(Flow::Stay)
    }
}

/// Runs its children when the condition holds. Otherwise skips them, and
/// enters the children of an `else` sibling when there is one.
#[derive(Debug)]
pub struct If {
    condition: Condition,
    has_else: bool,
}

impl If {
    pub fn new(condition: Condition, has_else: bool) -> Self {
        Self {
            condition,
            has_else,
        }
    }
}

impl Command for If {
    type State = ();

    fn kind(&self) -> &'static str {
        "if"
    }

    fn initialize(&self, _ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        Ok(())
    }

    fn update(&self, _state: &mut (), ctx: &mut CommandContext<'_>) -> Result<Flow, CommandError> {
        if ctx.evaluate(&self.condition)? {
            return Ok(Flow::NEXT);
        }
        let skip = ctx.tree().skip_offset(ctx.node());
        Ok(Flow::Advance(skip + usize::from(self.has_else)))
    }
}

/// Only entered directly when the `if` before it took its branch, in which
/// case the whole alternative is skipped.
#[derive(Debug)]
pub struct Else;

impl Command for Else {
    type State = ();

    fn kind(&self) -> &'static str {
        "else"
    }

    fn initialize(&self, _ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        Ok(())
    }

    fn update(&self, _state: &mut (), ctx: &mut CommandContext<'_>) -> Result<Flow, CommandError> {
        Ok(Flow::Advance(ctx.tree().skip_offset(ctx.node())))
    }
}

#[derive(Debug)]
pub struct While {
    condition: Condition,
}

impl While {
    pub fn new(condition: Condition) -> Self {
        Self { condition }
    }
}

impl Command for While {
    type State = ();

    fn kind(&self) -> &'static str {
        "while"
    }

    fn initialize(&self, _ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        Ok(())
    }

    fn update(&self, _state: &mut (), ctx: &mut CommandContext<'_>) -> Result<Flow, CommandError> {
        if ctx.evaluate(&self.condition)? {
            Ok(Flow::NEXT)
        } else {
            Ok(Flow::Advance(ctx.tree().skip_offset(ctx.node())))
        }
    }

    // Back to the top; the condition is checked again next tick.
    fn on_children_finished(&self, _ctx: &mut CommandContext<'_>) -> Result<Flow, CommandError> {
        Ok(Flow::Stay)
    }
}

/// Leaves the innermost enclosing `while`.
#[derive(Debug)]
pub struct Break;

impl Command for Break {
    type State = ();

    fn kind(&self) -> &'static str {
        "break"
    }

    fn initialize(&self, _ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        Ok(())
    }

    fn update(&self, _state: &mut (), ctx: &mut CommandContext<'_>) -> Result<Flow, CommandError> {
        let tree = ctx.tree();
        let node = ctx.node();
        let exit = tree
            .ancestors(node)
            .find(|ancestor| tree.command(*ancestor).kind_name() == "while")
            .and_then(|ancestor| tree.offset_to_exit(node, ancestor));
        Ok(exit.map_or(Flow::NEXT, Flow::Advance))
    }
}

#[derive(Debug)]
pub struct StopReaction;

impl Command for StopReaction {
    type State = ();

    fn kind(&self) -> &'static str {
        "stop_reaction"
    }

    fn initialize(&self, _ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        Ok(())
    }

    fn update(&self, _state: &mut (), _ctx: &mut CommandContext<'_>) -> Result<Flow, CommandError> {
        Ok(Flow::End)
    }
}
