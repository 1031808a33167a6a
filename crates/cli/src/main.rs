//! argot CLI — check, dump, and parse against declarative grammars.
//!
//! The binary's own argument grammar is built with argot-core itself: the
//! engine is both the library under the CLI and the parser of its argv.

mod render;

use std::path::Path;
use std::process;

use anyhow::Context as _;
use argot_core::grammar::dump::to_pretty_json;
use argot_core::{Grammar, GrammarBuilder};
use argot_schema::{FieldDesc, Passthrough, RecordDesc, ValueKind};

use crate::render::{OutputMode, render_failure, render_parse};

// ── CLI grammar ─────────────────────────────────────────────────────────

fn grammar_flag() -> FieldDesc {
    FieldDesc::flag("grammar", ValueKind::String)
        .required()
        .placeholder("FILE")
        .help("Grammar description JSON file.")
}

fn cli_grammar() -> anyhow::Result<Grammar> {
    let desc = RecordDesc::new()
        .field(
            FieldDesc::flag("output", ValueKind::String)
                .enum_values(["pretty", "json"])
                .default_value("pretty")
                .help("Output mode."),
        )
        .field(FieldDesc::command(
            "check",
            RecordDesc::new().field(grammar_flag()),
        ))
        .field(FieldDesc::command(
            "dump",
            RecordDesc::new().field(grammar_flag()),
        ))
        .field(FieldDesc::command(
            "parse",
            RecordDesc::new()
                .field(grammar_flag())
                .field(
                    FieldDesc::flag("trace", ValueKind::Bool)
                        .help("Record errors in the result instead of failing."),
                )
                .field(
                    FieldDesc::positional("args", ValueKind::List(Box::new(ValueKind::String)))
                        .optional()
                        .passthrough(Passthrough::All)
                        .help("Tokens to parse against the grammar."),
                ),
        ));
    GrammarBuilder::new("argot", desc)
        .build()
        .context("internal CLI grammar failed to build")
}

// ── Grammar loading ─────────────────────────────────────────────────────

fn load_grammar(path: &str) -> anyhow::Result<(String, RecordDesc)> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let desc: RecordDesc =
        serde_json::from_str(&text).with_context(|| format!("parsing {path}"))?;
    let name = Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "app".to_string());
    Ok((name, desc))
}

fn build_target(path: &str, mode: OutputMode) -> anyhow::Result<Result<Grammar, i32>> {
    let (name, desc) = load_grammar(path)?;
    match GrammarBuilder::new(&name, desc).build() {
        Ok(grammar) => Ok(Ok(grammar)),
        Err(err) => {
            println!("{}", render_failure(mode, "build", &err.to_string()));
            Ok(Err(1))
        }
    }
}

// ── Subcommands ─────────────────────────────────────────────────────────

fn cmd_check(path: &str, mode: OutputMode) -> anyhow::Result<i32> {
    let grammar = match build_target(path, mode)? {
        Ok(grammar) => grammar,
        Err(code) => return Ok(code),
    };
    match mode {
        OutputMode::Json => println!(
            "{}",
            serde_json::json!({
                "ok": true,
                "nodes": grammar.nodes().len(),
                "fields": grammar.fields().len(),
            })
        ),
        OutputMode::Pretty => println!(
            "grammar OK ({} nodes, {} fields)",
            grammar.nodes().len(),
            grammar.fields().len()
        ),
    }
    Ok(0)
}

fn cmd_dump(path: &str, mode: OutputMode) -> anyhow::Result<i32> {
    let grammar = match build_target(path, mode)? {
        Ok(grammar) => grammar,
        Err(code) => return Ok(code),
    };
    println!("{}", to_pretty_json(&grammar).context("serializing grammar")?);
    Ok(0)
}

fn cmd_parse(
    path: &str,
    mode: OutputMode,
    trace: bool,
    args: &[String],
) -> anyhow::Result<i32> {
    let grammar = match build_target(path, mode)? {
        Ok(grammar) => grammar,
        Err(code) => return Ok(code),
    };
    if trace {
        let ctx = grammar.trace(args);
        println!("{}", render_parse(mode, &ctx));
        return Ok(0);
    }
    match grammar.parse(args) {
        Ok(ctx) => {
            println!("{}", render_parse(mode, &ctx));
            Ok(0)
        }
        Err(err) => {
            println!("{}", render_failure(mode, "parse", &err.to_string()));
            Ok(1)
        }
    }
}

// ── Entry point ─────────────────────────────────────────────────────────

fn run(args: &[String]) -> anyhow::Result<i32> {
    let grammar = cli_grammar()?;
    let ctx = match grammar.parse(args) {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("argot: {err}");
            return Ok(2);
        }
    };
    let mode = OutputMode::from_context(&ctx);
    // Required by each subcommand's grammar, so present whenever a
    // subcommand was selected.
    let path = ctx.get::<String>("grammar").unwrap_or_default();
    let command = ctx.command();
    if command == "check" {
        cmd_check(&path, mode)
    } else if command == "dump" {
        cmd_dump(&path, mode)
    } else if command.starts_with("parse") {
        let target_args = ctx.get::<Vec<String>>("args").unwrap_or_default();
        let trace = ctx.get::<bool>("trace").unwrap_or(false);
        cmd_parse(&path, mode, trace, &target_args)
    } else {
        eprintln!("argot: expected one of \"check\", \"dump\", \"parse\"");
        Ok(2)
    }
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("argot: {err:#}");
            process::exit(1);
        }
    }
}
