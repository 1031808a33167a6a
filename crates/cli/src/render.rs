//! Output rendering for the argot CLI.

use argot_core::Context;
use serde_json::json;
use std::collections::BTreeMap;

/// Output mode selected with `--output`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-oriented terminal output.
    Pretty,
    /// Machine-readable JSON envelopes.
    Json,
}

impl OutputMode {
    pub fn from_context(ctx: &Context) -> Self {
        match ctx.get::<String>("output").as_deref() {
            Some("json") => OutputMode::Json,
            _ => OutputMode::Pretty,
        }
    }
}

/// The bound values of a context as a name → value map.
pub fn value_map(ctx: &Context) -> BTreeMap<String, serde_json::Value> {
    ctx.bound()
        .into_iter()
        .map(|(spec, value)| {
            let json = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
            (spec.name.clone(), json)
        })
        .collect()
}

/// Render a successful parse of the target grammar.
pub fn render_parse(mode: OutputMode, ctx: &Context) -> String {
    match mode {
        OutputMode::Json => json!({
            "ok": ctx.error().is_none(),
            "command": ctx.command(),
            "error": ctx.error().map(|e| e.to_string()),
            "values": value_map(ctx),
        })
        .to_string(),
        OutputMode::Pretty => {
            let mut out = String::new();
            let command = ctx.command();
            if command.is_empty() {
                out.push_str("selected: (root)\n");
            } else {
                out.push_str(&format!("selected: {command}\n"));
            }
            if let Some(err) = ctx.error() {
                out.push_str(&format!("error: {err}\n"));
            }
            for (name, value) in value_map(ctx) {
                out.push_str(&format!("  {name} = {value}\n"));
            }
            out
        }
    }
}

/// Render a grammar-level failure (build or parse) as one line or an
/// envelope.
pub fn render_failure(mode: OutputMode, stage: &str, message: &str) -> String {
    match mode {
        OutputMode::Json => json!({
            "ok": false,
            "stage": stage,
            "error": message,
        })
        .to_string(),
        OutputMode::Pretty => format!("{stage} error: {message}"),
    }
}
