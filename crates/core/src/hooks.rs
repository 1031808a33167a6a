//! Hook phases, the binding bus, and callable types.
//!
//! Hooks and actions are plain closures that pull typed parameters out of a
//! [`BindingBus`] — a per-parse map keyed by type identity. A missing
//! binding fails at invocation time, which keeps the dependency-injection
//! contract of the pipeline without any reflection.

use crate::context::Context;
use crate::decode::Value;
use argot_diagnostics::BoxedError;
use serde::Serialize;
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::rc::Rc;

// ─── Phases ─────────────────────────────────────────────────────────────────

/// Lifecycle phase of the hook pipeline.
///
/// Phases are batched across the whole selected path: every element sees
/// `BeforeReset` before any element sees `BeforeResolve`, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    /// Before fields are reset to their zero values.
    BeforeReset,
    /// Before the resolver chain runs.
    BeforeResolve,
    /// Just before a value is stored into its field.
    BeforeApply,
    /// Just after; fires exactly once per field per parse.
    AfterApply,
}

/// The kind of path element a hook is observing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ElementKind {
    /// The application root.
    App,
    /// A command node.
    Command,
    /// A branching-argument node.
    ArgumentBranch,
    /// A positional argument.
    Positional,
    /// A flag.
    Flag,
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementKind::App => write!(f, "app"),
            ElementKind::Command => write!(f, "cmd"),
            ElementKind::ArgumentBranch | ElementKind::Positional => write!(f, "arg"),
            ElementKind::Flag => write!(f, "flag"),
        }
    }
}

// ─── Binding bus ────────────────────────────────────────────────────────────

/// Requested binding type was not present in the bus.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no binding of type {type_name}")]
pub struct MissingBinding {
    /// The Rust type name that was requested.
    pub type_name: &'static str,
}

/// A typed value map keyed by type identity, scoped to one parse+run cycle.
///
/// Values are stored behind `Rc` so the template bus registered at build
/// time can be cheaply cloned into each parse.
#[derive(Default, Clone)]
pub struct BindingBus {
    entries: HashMap<TypeId, Rc<dyn Any>>,
}

impl BindingBus {
    /// An empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any existing binding of the same type.
    pub fn insert<T: Any>(&mut self, value: T) {
        self.entries.insert(TypeId::of::<T>(), Rc::new(value));
    }

    /// Fetch a binding by type, or fail with [`MissingBinding`].
    pub fn get<T: Any>(&self) -> Result<&T, MissingBinding> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|rc| rc.downcast_ref::<T>())
            .ok_or(MissingBinding {
                type_name: type_name::<T>(),
            })
    }

    /// `true` when a binding of type `T` is present.
    pub fn contains<T: Any>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }
}

// ─── Callable types ─────────────────────────────────────────────────────────

/// What a hook sees: the observed element, the field's current value (for
/// flag/positional elements during apply phases), and the bus.
pub struct HookArgs<'a> {
    /// Kind of the observed element.
    pub kind: ElementKind,
    /// Display name of the element (command name, flag name...).
    pub name: &'a str,
    /// The field's staged value, when one exists at this phase.
    pub value: Option<&'a Value>,
    /// The parse's binding bus.
    pub bus: &'a BindingBus,
}

/// A hook or validator callable.
pub type HookFn = Box<dyn Fn(&HookArgs) -> Result<(), BoxedError>>;

/// A command action or `AfterRun` callable.
pub type ActionFn = Box<dyn Fn(&Context) -> Result<(), BoxedError>>;

/// All hooks, validators, and actions attached to a grammar.
#[derive(Default)]
pub(crate) struct HookSet {
    /// Global observers in registration order.
    pub(crate) observers: Vec<(Phase, HookFn)>,
    /// Per-field hooks keyed by (field, phase).
    pub(crate) field_hooks: HashMap<(usize, Phase), Vec<HookFn>>,
    /// Node-level `Validate` hooks.
    pub(crate) node_validators: HashMap<usize, Vec<HookFn>>,
    /// Field-level `Validate` hooks.
    pub(crate) field_validators: HashMap<usize, Vec<HookFn>>,
    /// Command actions.
    pub(crate) actions: HashMap<usize, ActionFn>,
    /// `AfterRun` hooks.
    pub(crate) after_run: HashMap<usize, ActionFn>,
}
