use std::cell::RefCell;
use std::rc::Rc;

use crate::app::{HudFrame, InputEvent, MapObject, ObjectId, ObjectModel, SceneWorld, TilePos};

use super::command::{Command, CommandError, Flow};
use super::context::CommandContext;
use super::node::CommandTree;
use super::reaction::Reaction;

/// Shared log of hook calls, cloned into every command that should record.
#[derive(Debug, Clone, Default)]
pub(crate) struct Journal(Rc<RefCell<Vec<String>>>);

impl Journal {
    pub(crate) fn record(&self, entry: String) {
        self.0.borrow_mut().push(entry);
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

/// Command whose `update` replays a fixed list of flows, repeating the last
/// one once the list runs out.
#[derive(Debug)]
pub(crate) struct Scripted {
    label: &'static str,
    flows: Vec<Flow>,
    after_children: Flow,
    parallel: bool,
    failure: Option<CommandError>,
    journal: Option<Journal>,
}

impl Scripted {
    pub(crate) fn flows(flows: Vec<Flow>) -> Self {
        Self {
            label: "scripted",
            flows,
            after_children: Flow::NEXT,
            parallel: false,
            failure: None,
            journal: None,
        }
    }

    pub(crate) fn next() -> Self {
        Self::flows(vec![Flow::NEXT])
    }

    /// Stays for `ticks` updates, then advances.
    pub(crate) fn waits(ticks: usize) -> Self {
        let mut flows = vec![Flow::Stay; ticks];
        flows.push(Flow::NEXT);
        Self::flows(flows)
    }

    pub(crate) fn failing(error: CommandError) -> Self {
        Self {
            failure: Some(error),
            ..Self::next()
        }
    }

    pub(crate) fn labeled(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    pub(crate) fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    pub(crate) fn after_children(mut self, flow: Flow) -> Self {
        self.after_children = flow;
        self
    }

    pub(crate) fn journal(mut self, journal: &Journal) -> Self {
        self.journal = Some(journal.clone());
        self
    }

    fn note(&self, hook: &str) {
        if let Some(journal) = &self.journal {
            journal.record(format!("{}:{hook}", self.label));
        }
    }
}

impl Command for Scripted {
    type State = usize;

    fn kind(&self) -> &'static str {
        "scripted"
    }

    fn is_parallel(&self) -> bool {
        self.parallel
    }

    fn initialize(&self, _ctx: &mut CommandContext<'_>) -> Result<usize, CommandError> {
        self.note("init");
        Ok(0)
    }

    fn update(
        &self,
        state: &mut usize,
        _ctx: &mut CommandContext<'_>,
    ) -> Result<Flow, CommandError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        self.note("update");
        let flow = self
            .flows
            .get(*state)
            .or(self.flows.last())
            .copied()
            .unwrap_or(Flow::NEXT);
        *state += 1;
        Ok(flow)
    }

    fn on_children_finished(&self, _ctx: &mut CommandContext<'_>) -> Result<Flow, CommandError> {
        self.note("return");
        Ok(self.after_children)
    }

    fn on_input(&self, _state: &mut usize, _event: &InputEvent) {
        self.note("input");
    }

    fn draw_hud(&self, _state: &usize, hud: &mut HudFrame) {
        hud.push_line(self.label);
    }
}

/// Reaction whose top level is `commands` in order.
pub(crate) fn reaction_from(commands: Vec<Scripted>, blocking_hero: bool) -> Rc<Reaction> {
    let mut tree = CommandTree::new();
    let root = tree.root();
    for command in commands {
        tree.add(root, command);
    }
    Rc::new(Reaction::new("test", tree, blocking_hero))
}

pub(crate) fn world_with_objects(ids: &[u32]) -> SceneWorld {
    let mut world = SceneWorld::default();
    let model = Rc::new(ObjectModel::default());
    for (offset, id) in ids.iter().enumerate() {
        world.insert_object(MapObject::new(
            ObjectId(*id),
            format!("object {id}"),
            TilePos::new(offset as i32, 0),
            Rc::clone(&model),
        ));
    }
    world
}
