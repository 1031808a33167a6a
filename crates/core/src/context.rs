//! The parse result.
//!
//! A [`Context`] records the selected path, the residual tokens at each
//! path element, every bound value with its provenance, the binding bus,
//! and — in trace mode — the recorded error. `run` dispatches the deepest
//! selected node's action with bus injection and fires `AfterRun` hooks
//! ascending back up the path.

use crate::decode::Value;
use crate::grammar::{Grammar, NodeId};
use crate::hooks::BindingBus;
use crate::parse::{Path, PathElement};
use crate::resolve;
use crate::schema::{FieldId, FieldSpec};
use argot_diagnostics::{BoxedError, Error, ParseError};
use std::any::Any;
use std::collections::HashMap;

/// Where a bound value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    /// Set on the command line.
    Parsed,
    /// Supplied by a resolver.
    Resolved,
    /// Filled from the field's default literal.
    Defaulted,
}

/// A bound value with its provenance.
#[derive(Debug, Clone)]
pub(crate) struct Binding {
    pub(crate) value: Value,
    pub(crate) origin: Origin,
}

/// Convert a bound [`Value`] into a caller type.
pub trait FromValue: Sized {
    /// Extract `Self` from a value, or `None` on a kind mismatch.
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_bool()
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_int()
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(n) => Some(*n),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromValue for Vec<String> {
    fn from_value(value: &Value) -> Option<Self> {
        value
            .as_list()?
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect()
    }
}

/// The result of one parse.
pub struct Context<'g> {
    grammar: &'g Grammar,
    args: Vec<String>,
    path: Path,
    bindings: HashMap<usize, Binding>,
    bus: BindingBus,
    error: Option<ParseError>,
}

impl<'g> std::fmt::Debug for Context<'g> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("args", &self.args)
            .field("path", &self.path)
            .field("bindings", &self.bindings)
            .field("error", &self.error)
            .finish()
    }
}

impl<'g> Context<'g> {
    pub(crate) fn new(
        grammar: &'g Grammar,
        args: Vec<String>,
        path: Path,
        bindings: HashMap<usize, Binding>,
        bus: BindingBus,
        error: Option<ParseError>,
    ) -> Self {
        Self {
            grammar,
            args,
            path,
            bindings,
            bus,
            error,
        }
    }

    /// The grammar this context was parsed against.
    pub fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    /// The selected path, root first.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The original argument list.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The error recorded in trace mode, if the parse failed.
    pub fn error(&self) -> Option<&ParseError> {
        self.error.as_ref()
    }

    /// The residual tokens from the point the `index`-th path element
    /// finished consuming its own token.
    pub fn remainder(&self, index: usize) -> &[String] {
        let next = self
            .path
            .get(index)
            .map(PathElement::next_index)
            .unwrap_or(self.args.len());
        &self.args[next.min(self.args.len())..]
    }

    /// The deepest selected node.
    pub fn selected(&self) -> NodeId {
        self.path
            .iter()
            .rev()
            .find_map(PathElement::node)
            .unwrap_or(self.grammar.root())
    }

    /// Render the selected command path (`user create <id> <first> <last>`).
    pub fn command(&self) -> String {
        let parts: Vec<String> = self
            .path
            .iter()
            .filter_map(|element| match element {
                PathElement::App { .. } | PathElement::Flag { .. } => None,
                PathElement::Command { node, .. } | PathElement::ArgumentBranch { node, .. } => {
                    Some(self.grammar.node(*node).display())
                }
                PathElement::Positional { field, .. } => {
                    Some(self.grammar.field(*field).display())
                }
            })
            .collect();
        parts.join(" ")
    }

    /// The bound value of a field, if any.
    pub fn value(&self, field: FieldId) -> Option<&Value> {
        self.bindings.get(&field.0).map(|b| &b.value)
    }

    /// Look up a bound value by field name within the selected scope and
    /// convert it.
    pub fn get<T: FromValue>(&self, name: &str) -> Option<T> {
        for field in resolve::reachable_fields(self.grammar, &self.path) {
            if self.grammar.field(field).name == name {
                if let Some(value) = self.value(field) {
                    return T::from_value(value);
                }
            }
        }
        None
    }

    /// All bound values in field-arena order, with their specs.
    pub fn bound(&self) -> Vec<(&'g FieldSpec, &Value)> {
        self.grammar
            .fields()
            .iter()
            .enumerate()
            .filter_map(|(i, spec)| self.bindings.get(&i).map(|b| (spec, &b.value)))
            .collect()
    }

    /// The binding bus for this parse+run cycle.
    pub fn bus(&self) -> &BindingBus {
        &self.bus
    }

    /// Add a run-time binding injectable into the action.
    pub fn bind<T: Any>(&mut self, value: T) {
        self.bus.insert(value);
    }

    /// Invoke the action of the deepest node in the path that has one,
    /// then fire `AfterRun` hooks ascending back up the path.
    ///
    /// Errors returned by the action pass through unchanged. A context
    /// with a recorded trace error refuses to run.
    pub fn run(&self) -> Result<(), BoxedError> {
        if let Some(err) = &self.error {
            return Err(Box::new(err.clone()));
        }
        let chain = self.grammar.scope_chain(self.selected());
        let action = chain
            .iter()
            .find_map(|node| self.grammar.hooks.actions.get(&node.0));
        let Some(action) = action else {
            return Err(Box::new(Error::NoCommandSelected));
        };
        action(self)?;
        for node in &chain {
            if let Some(hook) = self.grammar.hooks.after_run.get(&node.0) {
                hook(self)?;
            }
        }
        Ok(())
    }
}
