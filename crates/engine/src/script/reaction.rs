use super::node::CommandTree;

/// A compiled script. Immutable once built; interpreters share it through
/// `Rc` and keep their own cursor.
#[derive(Debug)]
pub struct Reaction {
    name: String,
    tree: CommandTree,
    blocking_hero: bool,
}

impl Reaction {
    pub fn new(name: impl Into<String>, tree: CommandTree, blocking_hero: bool) -> Self {
        Self {
            name: name.into(),
            tree,
            blocking_hero,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tree(&self) -> &CommandTree {
        &self.tree
    }

    /// Whether running this reaction takes control away from the hero.
    pub fn blocking_hero(&self) -> bool {
        self.blocking_hero
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}
