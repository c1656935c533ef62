use crate::app::{HudFrame, InputEvent, InputKey, SceneWorld};
use crate::script::command::{Command, CommandError, Flow};
use crate::script::context::CommandContext;

/// Replaces every `\v[n]` with the current value of variable `n`.
fn expand_variables(text: &str, world: &SceneWorld) -> String {
    let mut expanded = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("\\v[") {
        expanded.push_str(&rest[..start]);
        let after = &rest[start + 3..];
        let parsed = after
            .find(']')
            .and_then(|end| after[..end].parse::<u32>().ok().map(|id| (id, end)));
        match parsed {
            Some((id, end)) => {
                match world.variable(id) {
                    crate::script::Value::Text(text) => expanded.push_str(&text),
                    other => expanded.push_str(&other.to_string()),
                }
                rest = &after[end + 1..];
            }
            None => {
                expanded.push_str("\\v[");
                rest = after;
            }
        }
    }
    expanded.push_str(rest);
    expanded
}

/// A message box. Stays on screen until the player confirms.
#[derive(Debug)]
pub struct ShowText {
    speaker: Option<String>,
    text: String,
}

impl ShowText {
    pub fn new(speaker: Option<String>, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
        }
    }
}

#[derive(Debug)]
pub struct ShowTextState {
    line: String,
    confirmed: bool,
}

impl Command for ShowText {
    type State = ShowTextState;

    fn kind(&self) -> &'static str {
        "show_text"
    }

    fn initialize(&self, ctx: &mut CommandContext<'_>) -> Result<ShowTextState, CommandError> {
        let body = expand_variables(&self.text, ctx.world());
        let line = match &self.speaker {
            Some(speaker) => format!("{speaker}: {body}"),
            None => body,
        };
        Ok(ShowTextState {
            line,
            confirmed: false,
        })
    }

    fn update(
        &self,
        state: &mut ShowTextState,
        _ctx: &mut CommandContext<'_>,
    ) -> Result<Flow, CommandError> {
        Ok(if state.confirmed { Flow::NEXT } else { Flow::Stay })
    }

    fn on_input(&self, state: &mut ShowTextState, event: &InputEvent) {
        if matches!(event, InputEvent::KeyPressed { key: InputKey::Action }) {
            state.confirmed = true;
        }
    }

    fn draw_hud(&self, state: &ShowTextState, hud: &mut HudFrame) {
        hud.push_line(state.line.as_str());
    }
}

/// A menu whose entries are the `choice` children, in order.
#[derive(Debug)]
pub struct DisplayChoice {
    choices: Vec<String>,
    cancel_index: Option<usize>,
}

impl DisplayChoice {
    pub fn new(choices: Vec<String>, cancel_index: Option<usize>) -> Self {
        Self {
            choices,
            cancel_index,
        }
    }
}

#[derive(Debug)]
pub struct ChoiceState {
    selected: usize,
    picked: Option<usize>,
}

impl Command for DisplayChoice {
    type State = ChoiceState;

    fn kind(&self) -> &'static str {
        "display_choice"
    }

    fn initialize(&self, _ctx: &mut CommandContext<'_>) -> Result<ChoiceState, CommandError> {
        Ok(ChoiceState {
            selected: 0,
            picked: None,
        })
    }

    fn update(
        &self,
        state: &mut ChoiceState,
        ctx: &mut CommandContext<'_>,
    ) -> Result<Flow, CommandError> {
        let Some(picked) = state.picked else {
            return Ok(Flow::Stay);
        };
        let tree = ctx.tree();
        let node = ctx.node();
        let offset = tree
            .offset_to_child(node, picked)
            .unwrap_or_else(|| tree.skip_offset(node));
        Ok(Flow::Advance(offset))
    }

    fn on_input(&self, state: &mut ChoiceState, event: &InputEvent) {
        if self.choices.is_empty() || state.picked.is_some() {
            return;
        }
        let count = self.choices.len();
        match event {
            InputEvent::KeyPressedAndRepeat { key: InputKey::Up } => {
                state.selected = (state.selected + count - 1) % count;
            }
            InputEvent::KeyPressedAndRepeat { key: InputKey::Down } => {
                state.selected = (state.selected + 1) % count;
            }
            InputEvent::KeyPressed { key: InputKey::Action } => {
                state.picked = Some(state.selected);
            }
            InputEvent::KeyPressed { key: InputKey::Cancel } => {
                if let Some(index) = self.cancel_index {
                    state.picked = Some(index);
                }
            }
            _ => {}
        }
    }

    fn draw_hud(&self, state: &ChoiceState, hud: &mut HudFrame) {
        for (index, label) in self.choices.iter().enumerate() {
            let marker = if index == state.selected { ">" } else { " " };
            hud.push_line(format!("{marker} {label}"));
        }
    }
}

/// One branch of a `display_choice`. After it runs, control leaves the menu
/// past every other branch.
#[derive(Debug)]
pub struct Choice;

impl Command for Choice {
    type State = ();

    fn kind(&self) -> &'static str {
        "choice"
    }

    fn initialize(&self, _ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        Ok(())
    }

    fn update(&self, _state: &mut (), ctx: &mut CommandContext<'_>) -> Result<Flow, CommandError> {
        if ctx.tree().has_children(ctx.node()) {
            return Ok(Flow::NEXT);
        }
        Ok(Flow::Advance(ctx.tree().offset_to_parent_return(ctx.node())))
    }

    fn on_children_finished(&self, ctx: &mut CommandContext<'_>) -> Result<Flow, CommandError> {
        Ok(Flow::Advance(ctx.tree().offset_to_parent_return(ctx.node())))
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::script::testing::{Journal, Scripted};
    use crate::script::value::Value;
    use crate::script::{CommandTree, Reaction, ReactionInterpreter, TickEffects, Trigger};

    fn tick(interpreter: &mut ReactionInterpreter, world: &mut SceneWorld) {
        let mut effects = TickEffects::default();
        interpreter.update(world, &mut effects);
        assert!(effects.diagnostics().is_empty());
    }

    fn menu(journal: &Journal, cancel_index: Option<usize>) -> Rc<Reaction> {
        let mut tree = CommandTree::new();
        let root = tree.root();
        let labels = vec!["Yes".to_string(), "No".to_string(), "Later".to_string()];
        let menu = tree.add(root, DisplayChoice::new(labels, cancel_index));
        let yes = tree.add(menu, Choice);
        tree.add(yes, Scripted::next().labeled("yes-1").journal(journal));
        tree.add(yes, Scripted::next().labeled("yes-2").journal(journal));
        let no = tree.add(menu, Choice);
        tree.add(no, Scripted::next().labeled("no").journal(journal));
        tree.add(menu, Choice);
        tree.add(root, Scripted::next().labeled("after").journal(journal));
        Rc::new(Reaction::new("menu", tree, true))
    }

    fn updates(journal: &Journal) -> Vec<String> {
        journal
            .entries()
            .into_iter()
            .filter(|entry| entry.ends_with(":update"))
            .collect()
    }

    fn run(
        reaction: Rc<Reaction>,
        inputs: &[InputEvent],
        ticks: usize,
    ) -> (ReactionInterpreter, SceneWorld) {
        let mut world = SceneWorld::default();
        let mut interpreter = ReactionInterpreter::new(reaction, Trigger::default());
        tick(&mut interpreter, &mut world);
        for input in inputs {
            interpreter.on_input(input);
        }
        for _ in 0..ticks {
            tick(&mut interpreter, &mut world);
        }
        (interpreter, world)
    }

    #[test]
    fn text_waits_for_action_press() {
        let mut tree = CommandTree::new();
        let root = tree.root();
        tree.add(root, ShowText::new(Some("Elder".to_string()), "You have \\v[3] coins."));
        let reaction = Rc::new(Reaction::new("talk", tree, true));
        let mut world = SceneWorld::default();
        world.set_variable(3, Value::Number(12.0));
        let mut interpreter = ReactionInterpreter::new(reaction, Trigger::default());

        tick(&mut interpreter, &mut world);
        tick(&mut interpreter, &mut world);
        assert!(!interpreter.is_finished());

        let mut hud = HudFrame::default();
        interpreter.draw_hud(&mut hud);
        assert_eq!(hud.lines(), &["Elder: You have 12 coins.".to_string()]);

        interpreter.on_input(&InputEvent::KeyPressed { key: InputKey::Cancel });
        tick(&mut interpreter, &mut world);
        assert!(!interpreter.is_finished());

        interpreter.on_input(&InputEvent::KeyPressed { key: InputKey::Action });
        tick(&mut interpreter, &mut world);
        assert!(interpreter.is_finished());
    }

    #[test]
    fn variable_markers_expand_or_pass_through() {
        let mut world = SceneWorld::default();
        world.set_variable(1, Value::from("Ada"));
        assert_eq!(expand_variables("Hi \\v[1]!", &world), "Hi Ada!");
        assert_eq!(expand_variables("\\v[2] apples", &world), "0 apples");
        assert_eq!(expand_variables("broken \\v[x]", &world), "broken \\v[x]");
    }

    #[test]
    fn first_choice_runs_its_branch_then_leaves_the_menu() {
        let journal = Journal::default();
        let confirm = InputEvent::KeyPressed { key: InputKey::Action };
        let (interpreter, _) = run(menu(&journal, None), &[confirm], 6);
        assert!(interpreter.is_finished());
        assert_eq!(updates(&journal), vec!["yes-1:update", "yes-2:update", "after:update"]);
    }

    #[test]
    fn moving_down_selects_the_second_branch() {
        let journal = Journal::default();
        let inputs = [
            InputEvent::KeyPressedAndRepeat { key: InputKey::Down },
            InputEvent::KeyPressed { key: InputKey::Action },
        ];
        let (interpreter, _) = run(menu(&journal, None), &inputs, 6);
        assert!(interpreter.is_finished());
        assert_eq!(updates(&journal), vec!["no:update", "after:update"]);
    }

    #[test]
    fn empty_last_choice_and_wraparound() {
        let journal = Journal::default();
        let inputs = [
            InputEvent::KeyPressedAndRepeat { key: InputKey::Up },
            InputEvent::KeyPressed { key: InputKey::Action },
        ];
        let (interpreter, _) = run(menu(&journal, None), &inputs, 4);
        assert!(interpreter.is_finished());
        assert_eq!(updates(&journal), vec!["after:update"]);
    }

    #[test]
    fn cancel_picks_the_cancel_branch_when_configured() {
        let journal = Journal::default();
        let cancel = InputEvent::KeyPressed { key: InputKey::Cancel };
        let (interpreter, _) = run(menu(&journal, None), &[cancel.clone()], 3);
        assert!(!interpreter.is_finished());

        let journal = Journal::default();
        let (interpreter, _) = run(menu(&journal, Some(1)), &[cancel], 6);
        assert!(interpreter.is_finished());
        assert_eq!(updates(&journal), vec!["no:update", "after:update"]);
    }

    #[test]
    fn menu_marks_the_selected_entry() {
        let journal = Journal::default();
        let down = InputEvent::KeyPressedAndRepeat { key: InputKey::Down };
        let (interpreter, _) = run(menu(&journal, None), &[down], 1);
        let mut hud = HudFrame::default();
        interpreter.draw_hud(&mut hud);
        assert_eq!(
            hud.lines(),
            &["  Yes".to_string(), "> No".to_string(), "  Later".to_string()]
        );
    }
}
