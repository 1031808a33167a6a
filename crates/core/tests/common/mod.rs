//! Shared helpers for argot-core integration tests.

use argot_core::{Grammar, GrammarBuilder};
use argot_schema::RecordDesc;

/// Build a grammar for an app named `test`, panicking on build errors.
pub fn build(desc: RecordDesc) -> Grammar {
    GrammarBuilder::new("test", desc)
        .build()
        .expect("grammar should build")
}

/// Build and expect a build error, returning its rendered message.
pub fn build_err(desc: RecordDesc) -> String {
    GrammarBuilder::new("test", desc)
        .build()
        .err()
        .expect("expected build error")
        .to_string()
}

/// Parse and expect a parse error, returning its rendered message.
pub fn parse_err(grammar: &Grammar, args: &[&str]) -> String {
    grammar
        .parse(args)
        .err()
        .expect("expected parse error")
        .to_string()
}
