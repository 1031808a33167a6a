//! Serialization helpers for compiled grammars.

use crate::grammar::{Grammar, Node};
use crate::schema::FieldSpec;
use serde::Serialize;

/// A serializable view of a compiled grammar: the node arena plus the
/// field arena. Hooks, decoders, and resolvers are runtime-only and are
/// not part of the dump.
#[derive(Serialize)]
pub struct GrammarDump<'a> {
    /// All nodes, root first.
    pub nodes: &'a [Node],
    /// All field specs.
    pub fields: &'a [FieldSpec],
}

/// Serialize a grammar to pretty-printed JSON.
pub fn to_pretty_json(grammar: &Grammar) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&GrammarDump {
        nodes: grammar.nodes(),
        fields: grammar.fields(),
    })
}
