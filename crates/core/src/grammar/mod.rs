//! The executable grammar.
//!
//! A [`Grammar`] is an arena of [`Node`]s (application root, commands,
//! branching arguments) plus the field specs, per-field decoders, hooks,
//! and resolvers attached at build time. Nodes reference each other by
//! [`NodeId`] index; the parent link is a back-index, so the tree has no
//! ownership cycles. A grammar is immutable once built and can be reused
//! across parses from one thread at a time.

pub mod builder;
/// Serialization helpers for compiled grammars.
pub mod dump;
pub(crate) mod interpolate;

use crate::context::Context;
use crate::decode::Decoder;
use crate::hooks::{BindingBus, HookSet};
use crate::parse;
use crate::resolve::Resolver;
use crate::schema::{FieldId, FieldSpec};
use argot_diagnostics::ParseError;
use serde::Serialize;
use std::sync::Arc;

/// Index of a node in the grammar's node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NodeId(pub usize);

/// The kind of a grammar node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    /// The application root.
    Application,
    /// A named subcommand.
    Command,
    /// A positional whose value opens a subtree of its own.
    ArgumentBranch,
}

/// Default-command behaviour of a child node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DefaultMode {
    /// Selected when no child matches; may not own positionals or
    /// subcommands.
    Fallback,
    /// Selected when no child matches and allowed to consume the pending
    /// token as its own argument or flag.
    WithArgs,
}

/// A point in the command tree.
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    /// This node's arena index.
    pub id: NodeId,
    /// Parent back-index; `None` for the application root.
    pub parent: Option<NodeId>,
    /// Node kind.
    pub kind: NodeKind,
    /// Display name. For branches this is the positional-style key name.
    pub name: String,
    /// Dotted source path, used in build errors.
    pub path: String,
    /// Help text.
    pub help: String,
    /// Child commands, in declaration order.
    pub children: Vec<NodeId>,
    /// Child branching arguments, in declaration order.
    pub branches: Vec<NodeId>,
    /// Positional schedule, in declaration order.
    pub positionals: Vec<FieldId>,
    /// Local flags, in declaration order.
    pub flags: Vec<FieldId>,
    /// For branches: the key positional bound before the subtree opens.
    pub branch_key: Option<FieldId>,
    /// Default child, if one is marked.
    pub default_child: Option<NodeId>,
    /// Mode of the default child.
    pub default_mode: Option<DefaultMode>,
    /// `true` for passthrough commands that capture all remaining tokens.
    pub passthrough: bool,
    /// For branches: the whole subtree may be skipped.
    pub optional: bool,
}

impl Node {
    /// The display used in selected-path rendering: plain name for
    /// commands, `<name>` for branches.
    pub fn display(&self) -> String {
        match self.kind {
            NodeKind::ArgumentBranch => format!("<{}>", self.name),
            _ => self.name.clone(),
        }
    }
}

/// A compiled, immutable grammar.
pub struct Grammar {
    pub(crate) nodes: Vec<Node>,
    pub(crate) fields: Vec<FieldSpec>,
    pub(crate) decoders: Vec<Arc<dyn Decoder>>,
    pub(crate) hooks: HookSet,
    pub(crate) resolvers: Vec<Box<dyn Resolver>>,
    pub(crate) base_bindings: BindingBus,
    pub(crate) hyphen_prefixed_values: bool,
}

impl Grammar {
    /// The application root node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Borrow a node by id.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Borrow a field spec by id.
    pub fn field(&self, id: FieldId) -> &FieldSpec {
        &self.fields[id.0]
    }

    /// All nodes, in arena order (root first).
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// All field specs, in arena order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// The scope chain from `node` up to the root, innermost first.
    pub(crate) fn scope_chain(&self, node: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            chain.push(id);
            cursor = self.node(id).parent;
        }
        chain
    }

    /// Flags visible from `node`, innermost scope first, declaration order
    /// within each scope.
    pub(crate) fn flags_in_scope(&self, node: NodeId) -> Vec<FieldId> {
        self.scope_chain(node)
            .into_iter()
            .flat_map(|id| self.node(id).flags.iter().copied())
            .collect()
    }

    /// Render a node the way build and parse errors refer to it
    /// (`one <command>`, `command [<args> ...] [flags]`).
    pub fn node_summary(&self, id: NodeId) -> String {
        let node = self.node(id);
        let mut out = node.name.clone();
        for field_id in &node.positionals {
            let field = self.field(*field_id);
            if field.cumulative() && field.optional {
                out.push_str(&format!(" [<{}> ...]", field.name));
            } else if field.optional {
                out.push_str(&format!(" [<{}>]", field.name));
            } else {
                out.push_str(&format!(" <{}>", field.name));
            }
        }
        if !node.children.is_empty() || !node.branches.is_empty() {
            out.push_str(" <command>");
        }
        if !node.flags.is_empty() {
            out.push_str(" [flags]");
        }
        out
    }

    /// Parse a token stream, failing fast on the first user error.
    pub fn parse<S: AsRef<str>>(&self, args: &[S]) -> Result<Context, ParseError> {
        parse::run(self, args, false)
    }

    /// Parse in trace mode: user errors are recorded in the returned
    /// [`Context`] alongside the partial path instead of aborting.
    pub fn trace<S: AsRef<str>>(&self, args: &[S]) -> Context {
        match parse::run(self, args, true) {
            Ok(ctx) => ctx,
            // Trace mode never reports through Err.
            Err(_) => unreachable!("trace mode records errors in the context"),
        }
    }
}
