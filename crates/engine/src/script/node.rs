use std::fmt;

use super::command::{Command, CommandError, DynCommand, Flow};
use super::context::CommandContext;

/// Index of a node inside one [`CommandTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which side of a node the cursor sits on. `Return` means every child of the
/// node has run and control came back up to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Enter,
    Return,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub node: NodeId,
    pub phase: Phase,
}

impl Cursor {
    pub fn enter(node: NodeId) -> Self {
        Self {
            node,
            phase: Phase::Enter,
        }
    }

    pub fn back_to(node: NodeId) -> Self {
        Self {
            node,
            phase: Phase::Return,
        }
    }
}

#[derive(Debug)]
struct CommandNode {
    command: Box<dyn DynCommand>,
    parent: Option<NodeId>,
    next: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
}

#[derive(Debug)]
struct RootCommand;

impl Command for RootCommand {
    type State = ();

    fn kind(&self) -> &'static str {
        "root"
    }

    fn initialize(&self, _ctx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        Ok(())
    }

    fn update(&self, _state: &mut (), _ctx: &mut CommandContext<'_>) -> Result<Flow, CommandError> {
        Ok(Flow::NEXT)
    }
}

/// Arena holding a compiled script. Node 0 is the root; it carries no behaviour
/// and is never visited by an interpreter. Children are owned through the
/// first/last links, `parent` and `next` are plain indices back into the arena.
#[derive(Debug)]
pub struct CommandTree {
    nodes: Vec<CommandNode>,
}

impl Default for CommandTree {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![CommandNode {
                command: Box::new(RootCommand),
                parent: None,
                next: None,
                first_child: None,
                last_child: None,
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    /// Appends `command` as the last child of `parent`.
    pub fn add(&mut self, parent: NodeId, command: impl Command) -> NodeId {
        self.add_boxed(parent, Box::new(command))
    }

    pub fn add_boxed(&mut self, parent: NodeId, command: Box<dyn DynCommand>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(CommandNode {
            command,
            parent: Some(parent),
            next: None,
            first_child: None,
            last_child: None,
        });

        match self.nodes[parent.index()].last_child {
            Some(previous) => self.nodes[previous.index()].next = Some(id),
            None => self.nodes[parent.index()].first_child = Some(id),
        }
        self.nodes[parent.index()].last_child = Some(id);
        id
    }

    /// Number of command nodes, the root excluded.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[0].first_child.is_none()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node.index() < self.nodes.len()
    }

    pub fn is_root(&self, node: NodeId) -> bool {
        self.nodes[node.index()].parent.is_none()
    }

    pub fn command(&self, node: NodeId) -> &dyn DynCommand {
        self.nodes[node.index()].command.as_ref()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index()].parent
    }

    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index()].first_child
    }

    pub fn last_child(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index()].last_child
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index()].next
    }

    pub fn has_children(&self, node: NodeId) -> bool {
        self.nodes[node.index()].first_child.is_some()
    }

    pub fn children(&self, node: NodeId) -> Children<'_> {
        Children {
            tree: self,
            next: self.first_child(node),
        }
    }

    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(node), |id| self.parent(*id))
            .filter(|id| !self.is_root(*id))
    }

    /// Position of `node` among its parent's children.
    pub fn child_index(&self, node: NodeId) -> Option<usize> {
        let parent = self.parent(node)?;
        self.children(parent).position(|child| child == node)
    }

    /// The sibling if there is one, otherwise the parent unless the parent is
    /// the root. Never descends: walking back into a parent lets the caller
    /// treat it as the point where its children are done.
    pub fn get_next(&self, node: NodeId) -> Option<NodeId> {
        if let Some(next) = self.next_sibling(node) {
            return Some(next);
        }
        let parent = self.parent(node)?;
        if self.is_root(parent) {
            None
        } else {
            Some(parent)
        }
    }

    /// First position of a fresh run, `None` for an empty script.
    pub fn start(&self) -> Option<Cursor> {
        self.first_child(self.root()).map(Cursor::enter)
    }

    /// One tree step. Entering a node with children descends into the first
    /// child; everything else follows [`CommandTree::get_next`], landing on the
    /// parent's return side when the siblings run out.
    pub fn step(&self, cursor: Cursor) -> Option<Cursor> {
        if cursor.phase == Phase::Enter {
            if let Some(child) = self.first_child(cursor.node) {
                return Some(Cursor::enter(child));
            }
        }
        if let Some(next) = self.next_sibling(cursor.node) {
            return Some(Cursor::enter(next));
        }
        self.get_next(cursor.node).map(Cursor::back_to)
    }

    pub fn advance(&self, cursor: Cursor, steps: usize) -> Option<Cursor> {
        let mut current = cursor;
        for _ in 0..steps {
            current = self.step(current)?;
        }
        Some(current)
    }

    /// Steps needed to move from entering `node` to just past its subtree:
    /// one for a leaf, otherwise one per child entry, one for the return to
    /// `node`, and one more to leave it. A flat subtree of `w` nodes costs
    /// `w + 1`.
    pub fn skip_offset(&self, node: NodeId) -> usize {
        if !self.has_children(node) {
            return 1;
        }
        2 + self
            .children(node)
            .map(|child| self.skip_offset(child))
            .sum::<usize>()
    }

    /// Steps from entering `parent` to entering its `index`-th child.
    pub fn offset_to_child(&self, parent: NodeId, index: usize) -> Option<usize> {
        let mut offset = 1;
        for (position, child) in self.children(parent).enumerate() {
            if position == index {
                return Some(offset);
            }
            offset += self.skip_offset(child);
        }
        None
    }

    /// Steps from the return side of `node` (or from entering it when it is a
    /// leaf) up to the return side of its parent, passing over every later
    /// sibling.
    pub fn offset_to_parent_return(&self, node: NodeId) -> usize {
        1 + self.later_siblings_width(node)
    }

    /// Steps from entering `node` to just past `ancestor`, skipping whatever is
    /// left of every level in between.
    pub fn offset_to_exit(&self, node: NodeId, ancestor: NodeId) -> Option<usize> {
        let mut offset = self.skip_offset(node) + self.later_siblings_width(node);
        let mut current = self.parent(node)?;
        while current != ancestor {
            if self.is_root(current) {
                return None;
            }
            offset += self.offset_to_parent_return(current);
            current = self.parent(current)?;
        }
        Some(offset + 1)
    }

    fn later_siblings_width(&self, node: NodeId) -> usize {
        std::iter::successors(self.next_sibling(node), |id| self.next_sibling(*id))
            .map(|sibling| self.skip_offset(sibling))
            .sum()
    }
}

pub struct Children<'a> {
    tree: &'a CommandTree,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.tree.next_sibling(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::testing::Scripted;

    fn leaf(tree: &mut CommandTree, parent: NodeId) -> NodeId {
        tree.add(parent, Scripted::next())
    }

    // root
    // ├── a
    // │   ├── a1
    // │   └── a2
    // │       └── a2x
    // ├── b
    // └── c
    //     └── c1
    fn sample_tree() -> (CommandTree, Vec<NodeId>) {
        let mut tree = CommandTree::new();
        let root = tree.root();
        let a = leaf(&mut tree, root);
        let a1 = leaf(&mut tree, a);
        let a2 = leaf(&mut tree, a);
        let a2x = leaf(&mut tree, a2);
        let b = leaf(&mut tree, root);
        let c = leaf(&mut tree, root);
        let c1 = leaf(&mut tree, c);
        (tree, vec![a, a1, a2, a2x, b, c, c1])
    }

    #[test]
    fn add_links_children_in_order() {
        let (tree, ids) = sample_tree();
        let [a, a1, a2, _, b, c, _] = ids[..] else {
            panic!("sample tree shape");
        };

        assert_eq!(tree.len(), 7);
        assert!(tree.is_root(tree.root()));
        assert!(!tree.is_root(a));
        assert_eq!(tree.children(tree.root()).collect::<Vec<_>>(), vec![a, b, c]);
        assert_eq!(tree.children(a).collect::<Vec<_>>(), vec![a1, a2]);
        assert_eq!(tree.last_child(a), Some(a2));
        assert_eq!(tree.parent(a2), Some(a));
        assert_eq!(tree.child_index(c), Some(2));
    }

    #[test]
    fn get_next_returns_sibling_then_parent_then_none() {
        let (tree, ids) = sample_tree();
        let [a, a1, a2, a2x, b, c, c1] = ids[..] else {
            panic!("sample tree shape");
        };

        assert_eq!(tree.get_next(a1), Some(a2));
        assert_eq!(tree.get_next(a2x), Some(a2));
        assert_eq!(tree.get_next(a2), Some(a));
        assert_eq!(tree.get_next(a), Some(b));
        assert_eq!(tree.get_next(c1), Some(c));
        assert_eq!(tree.get_next(c), None);
    }

    #[test]
    fn get_next_exhausts_within_twice_node_count() {
        let (tree, ids) = sample_tree();
        let deepest = ids[3];
        let mut current = Some(deepest);
        let mut calls = 0;
        while let Some(node) = current {
            current = tree.get_next(node);
            calls += 1;
            assert!(calls <= 2 * tree.len(), "walk did not terminate");
        }
        assert_eq!(calls, 5);
    }

    #[test]
    fn step_walk_visits_every_node_and_each_return_once() {
        let (tree, ids) = sample_tree();
        let [a, a1, a2, a2x, b, c, c1] = ids[..] else {
            panic!("sample tree shape");
        };

        let mut visited = Vec::new();
        let mut cursor = tree.start();
        while let Some(current) = cursor {
            visited.push(current);
            cursor = tree.step(current);
        }

        assert_eq!(
            visited,
            vec![
                Cursor::enter(a),
                Cursor::enter(a1),
                Cursor::enter(a2),
                Cursor::enter(a2x),
                Cursor::back_to(a2),
                Cursor::back_to(a),
                Cursor::enter(b),
                Cursor::enter(c),
                Cursor::enter(c1),
                Cursor::back_to(c),
            ]
        );
    }

    #[test]
    fn skip_offset_of_flat_subtree_is_width_plus_one() {
        let mut tree = CommandTree::new();
        let root = tree.root();
        let conditional = leaf(&mut tree, root);
        for _ in 0..3 {
            leaf(&mut tree, conditional);
        }
        let after = leaf(&mut tree, root);

        // subtree spans the conditional plus its three children
        let width = 4;
        assert_eq!(tree.skip_offset(conditional), width + 1);
        assert_eq!(
            tree.advance(Cursor::enter(conditional), width + 1),
            Some(Cursor::enter(after))
        );
    }

    #[test]
    fn skip_offset_handles_nested_subtrees() {
        let (tree, ids) = sample_tree();
        let [a, _, _, _, b, c, _] = ids[..] else {
            panic!("sample tree shape");
        };

        assert_eq!(tree.skip_offset(a), 2 + 1 + 3);
        assert_eq!(tree.advance(Cursor::enter(a), tree.skip_offset(a)), Some(Cursor::enter(b)));
        assert_eq!(tree.advance(Cursor::enter(c), tree.skip_offset(c)), None);
    }

    #[test]
    fn offsets_to_children_and_back_to_parent() {
        let (tree, ids) = sample_tree();
        let [a, a1, a2, _, _, _, _] = ids[..] else {
            panic!("sample tree shape");
        };

        assert_eq!(tree.offset_to_child(a, 0), Some(1));
        assert_eq!(tree.offset_to_child(a, 1), Some(2));
        assert_eq!(tree.offset_to_child(a, 2), None);
        assert_eq!(tree.advance(Cursor::enter(a), 2), Some(Cursor::enter(a2)));

        let from_a1 = tree.offset_to_parent_return(a1);
        assert_eq!(tree.advance(Cursor::enter(a1), from_a1), Some(Cursor::back_to(a)));
        let from_a2 = tree.offset_to_parent_return(a2);
        assert_eq!(tree.advance(Cursor::back_to(a2), from_a2), Some(Cursor::back_to(a)));
    }

    #[test]
    fn offset_to_exit_lands_past_the_ancestor() {
        let (tree, ids) = sample_tree();
        let [a, _, _, a2x, b, _, _] = ids[..] else {
            panic!("sample tree shape");
        };

        let offset = tree.offset_to_exit(a2x, a).expect("a is an ancestor");
        assert_eq!(tree.advance(Cursor::enter(a2x), offset), Some(Cursor::enter(b)));
        assert_eq!(tree.offset_to_exit(a2x, b), None);
    }

    #[test]
    fn empty_tree_has_no_start() {
        let tree = CommandTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.start(), None);
        assert_eq!(tree.len(), 0);
    }
}
