//! argot core library.
//!
//! Compiles a declarative grammar description ([`argot_schema::RecordDesc`])
//! into an executable [`Grammar`] and parses token streams against it. The
//! main entry points are [`GrammarBuilder`] for compilation, [`Grammar::parse`]
//! / [`Grammar::trace`] for parsing, and [`Context::run`] for dispatching the
//! selected command's action.

#![warn(missing_docs)]

/// Typed values, the decoder contract, and the decoder registry.
pub mod decode;
/// The executable grammar: node arena, builder, interpolation, JSON dump.
pub mod grammar;
/// Hook phases, the binding bus, and hook/action callable types.
pub mod hooks;
/// The parse state machine and the selected path.
pub mod parse;
/// Resolvers, defaults, and cross-field constraint checking.
pub mod resolve;
/// Canonical field metadata produced by the schema introspector.
pub mod schema;
/// The token scanner.
pub mod scan;

mod context;

// ── Convenience re-exports ──────────────────────────────────────────────────
// Flat imports for the most common entry points. The full module paths
// remain available for less common types.

pub use context::{Context, FromValue};
pub use decode::{Decoder, DecoderRegistry, Value};
pub use grammar::builder::GrammarBuilder;
pub use grammar::{DefaultMode, Grammar, Node, NodeId, NodeKind};
pub use hooks::{BindingBus, ElementKind, HookArgs, Phase};
pub use parse::{Path, PathElement};
pub use resolve::{EnvResolver, Resolver};
pub use schema::{FieldId, FieldSpec};

// Errors (re-exported from the diagnostics crate)
pub use argot_diagnostics::{BoxedError, BuildError, Error, ParseError};
