//! The selected path.
//!
//! Parsing builds an ordered sequence of [`PathElement`]s from the
//! application root to the deepest visited element. Every element records
//! the raw-argument index that was next at the moment the element finished
//! consuming its own token, so callers can recover the exact residual
//! token list per element.

use crate::grammar::{Grammar, NodeId, NodeKind};
use crate::hooks::ElementKind;
use crate::schema::FieldId;
use serde::Serialize;

/// One element of the selected path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PathElement {
    /// The application root.
    App {
        /// The root node.
        node: NodeId,
        /// Raw index of the next unconsumed argument.
        next: usize,
    },
    /// A command that was descended into.
    Command {
        /// The command node.
        node: NodeId,
        /// Raw index of the next unconsumed argument.
        next: usize,
    },
    /// A branching argument whose key was bound.
    ArgumentBranch {
        /// The branch node.
        node: NodeId,
        /// Raw index of the next unconsumed argument.
        next: usize,
    },
    /// A positional argument that received a value.
    Positional {
        /// The bound field.
        field: FieldId,
        /// Raw index of the next unconsumed argument.
        next: usize,
    },
    /// A flag that was set on the command line.
    Flag {
        /// The set field.
        field: FieldId,
        /// Raw index of the next unconsumed argument.
        next: usize,
    },
}

impl PathElement {
    /// Raw index of the next unconsumed argument when this element was
    /// recorded.
    pub fn next_index(&self) -> usize {
        match self {
            PathElement::App { next, .. }
            | PathElement::Command { next, .. }
            | PathElement::ArgumentBranch { next, .. }
            | PathElement::Positional { next, .. }
            | PathElement::Flag { next, .. } => *next,
        }
    }

    /// The node this element refers to, if it is a node element.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            PathElement::App { node, .. }
            | PathElement::Command { node, .. }
            | PathElement::ArgumentBranch { node, .. } => Some(*node),
            _ => None,
        }
    }

    /// The field this element refers to, if it is a field element.
    pub fn field(&self) -> Option<FieldId> {
        match self {
            PathElement::Positional { field, .. } | PathElement::Flag { field, .. } => {
                Some(*field)
            }
            _ => None,
        }
    }

    /// The element kind observed by hooks.
    pub fn element_kind(&self, grammar: &Grammar) -> ElementKind {
        match self {
            PathElement::App { .. } => ElementKind::App,
            PathElement::Command { node, .. } => match grammar.node(*node).kind {
                NodeKind::ArgumentBranch => ElementKind::ArgumentBranch,
                _ => ElementKind::Command,
            },
            PathElement::ArgumentBranch { .. } => ElementKind::ArgumentBranch,
            PathElement::Positional { .. } => ElementKind::Positional,
            PathElement::Flag { .. } => ElementKind::Flag,
        }
    }

    /// Display name used by hooks and hook-error prefixes: the node name
    /// for commands, `<name>` for branches and positionals, the bare flag
    /// name for flags. The application root has no prefix display.
    pub fn display(&self, grammar: &Grammar) -> Option<String> {
        match self {
            PathElement::App { .. } => None,
            PathElement::Command { node, .. } | PathElement::ArgumentBranch { node, .. } => {
                Some(grammar.node(*node).display())
            }
            PathElement::Positional { field, .. } | PathElement::Flag { field, .. } => {
                Some(grammar.field(*field).display())
            }
        }
    }
}

/// The ordered selected path, root first.
pub type Path = Vec<PathElement>;
