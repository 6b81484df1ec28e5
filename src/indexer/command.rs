use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use crate::core::types::NodeRef;

/// Kind of pending change recorded for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Index,
    Reindex,
    Delete,
    CascadeReindex,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Index => "INDEX",
            Action::Reindex => "REINDEX",
            Action::Delete => "DELETE",
            Action::CascadeReindex => "CASCADEREINDEX",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command {
    pub action: Action,
    pub node: NodeRef,
}

impl Command {
    pub fn new(action: Action, node: NodeRef) -> Self {
        Command { action, node }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action.as_str(), self.node)
    }
}

/// Arrival-ordered commands of one delta
#[derive(Debug, Default)]
pub struct CommandQueue {
    commands: Vec<Command>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command; returns false when it repeats the previous one.
    pub fn push(&mut self, command: Command) -> bool {
        if self.commands.last() == Some(&command) {
            return false;
        }
        self.commands.push(command);
        true
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn drain(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }
}

/// What a flush regenerates for a node. Ordered by strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResolvedAction {
    Index,
    Reindex,
    CascadeReindex,
}

impl ResolvedAction {
    pub fn from_action(action: Action) -> Self {
        match action {
            Action::Index => ResolvedAction::Index,
            Action::Reindex => ResolvedAction::Reindex,
            Action::Delete | Action::CascadeReindex => ResolvedAction::CascadeReindex,
        }
    }

    /// The stronger of two actions wins.
    pub fn merge(self, other: ResolvedAction) -> ResolvedAction {
        self.max(other)
    }
}

/// Flattened commands of one flush
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushPlan {
    pub actions: BTreeMap<NodeRef, ResolvedAction>,
    /// Nodes with at least one DELETE command
    pub deleted: BTreeSet<NodeRef>,
}

impl FlushPlan {
    pub fn add(&mut self, node: NodeRef, action: ResolvedAction) {
        self.actions
            .entry(node)
            .and_modify(|current| *current = current.merge(action))
            .or_insert(action);
    }

    pub fn get(&self, node: &NodeRef) -> Option<ResolvedAction> {
        self.actions.get(node).copied()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Folds commands into one action per node.
///
/// A max-reduction, so the result does not depend on arrival order.
pub fn reduce<'a, I>(commands: I) -> FlushPlan
where
    I: IntoIterator<Item = &'a Command>,
{
    let mut plan = FlushPlan::default();
    for command in commands {
        if command.action == Action::Delete {
            plan.deleted.insert(command.node.clone());
        }
        plan.add(command.node.clone(), ResolvedAction::from_action(command.action));
    }
    plan
}
