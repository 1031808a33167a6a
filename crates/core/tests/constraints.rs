//! Tests for the constraint and resolver layer.
//!
//! Covers: defaults, the resolver chain, enum validation on parsed,
//! defaulted, and resolved values, xor/and groups, required aggregation,
//! and decode failures surfaced at resolution time.

mod common;

use common::{build, build_err, parse_err};
use argot_core::{EnvResolver, GrammarBuilder};
use argot_schema::{FieldDesc, RecordDesc, ValueKind};
use std::collections::BTreeMap;

fn env(pairs: &[(&str, &str)]) -> EnvResolver {
    let map: BTreeMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    EnvResolver::new(move |name| map.get(name).cloned())
}

// ─── Defaults and resolvers ─────────────────────────────────────────────────

#[test]
fn default_applies_when_absent() {
    let desc = RecordDesc::new()
        .field(FieldDesc::flag("flag", ValueKind::String))
        .field(FieldDesc::flag("flag-with-default", ValueKind::String).default_value("default"));
    let grammar = build(desc);
    let ctx = grammar.parse(&[] as &[&str]).unwrap();
    assert_eq!(ctx.get::<String>("flag"), None);
    assert_eq!(
        ctx.get::<String>("flag-with-default"),
        Some("default".to_string())
    );
}

#[test]
fn parsed_value_beats_default() {
    let desc =
        RecordDesc::new().field(FieldDesc::flag("flag", ValueKind::String).default_value("moo"));
    let grammar = build(desc);
    let ctx = grammar.parse(&["--flag=explicit"]).unwrap();
    assert_eq!(ctx.get::<String>("flag"), Some("explicit".to_string()));
}

#[test]
fn optional_positional_default() {
    let desc = RecordDesc::new()
        .field(FieldDesc::positional("arg", ValueKind::String).default_value("moo"));
    let grammar = build(desc);
    let ctx = grammar.parse(&[] as &[&str]).unwrap();
    assert_eq!(ctx.get::<String>("arg"), Some("moo".to_string()));
}

#[test]
fn default_value_may_be_a_lone_hyphen() {
    let desc =
        RecordDesc::new().field(FieldDesc::flag("flag", ValueKind::String).default_value("-"));
    let grammar = build(desc);
    let ctx = grammar.parse(&[] as &[&str]).unwrap();
    assert_eq!(ctx.get::<String>("flag"), Some("-".to_string()));
}

#[test]
fn invalid_default_fails_at_resolution() {
    let desc = RecordDesc::new().field(FieldDesc::flag("flag", ValueKind::Int).default_value("foo"));
    let grammar = build(desc);
    assert_eq!(
        parse_err(&grammar, &[]),
        "--flag: expected integer, got \"foo\""
    );
}

#[test]
fn env_resolver_fills_unset_fields() {
    let desc = RecordDesc::new().field(FieldDesc::flag("flag", ValueKind::String).env("FLAG"));
    let grammar = GrammarBuilder::new("test", desc)
        .resolver(env(&[("FLAG", "from-env")]))
        .build()
        .unwrap();
    let ctx = grammar.parse(&[] as &[&str]).unwrap();
    assert_eq!(ctx.get::<String>("flag"), Some("from-env".to_string()));
}

#[test]
fn resolver_beats_default_but_not_parse() {
    let desc = RecordDesc::new()
        .field(FieldDesc::flag("flag", ValueKind::String).env("FLAG").default_value("dflt"));
    let grammar = GrammarBuilder::new("test", desc)
        .resolver(env(&[("FLAG", "from-env")]))
        .build()
        .unwrap();

    let ctx = grammar.parse(&[] as &[&str]).unwrap();
    assert_eq!(ctx.get::<String>("flag"), Some("from-env".to_string()));

    let ctx = grammar.parse(&["--flag=cli"]).unwrap();
    assert_eq!(ctx.get::<String>("flag"), Some("cli".to_string()));
}

#[test]
fn env_names_resolve_in_declaration_order() {
    let desc = RecordDesc::new()
        .field(FieldDesc::flag("flag", ValueKind::String).env("FIRST").env("SECOND"));
    let grammar = GrammarBuilder::new("test", desc)
        .resolver(env(&[("SECOND", "second")]))
        .build()
        .unwrap();
    let ctx = grammar.parse(&[] as &[&str]).unwrap();
    assert_eq!(ctx.get::<String>("flag"), Some("second".to_string()));
}

// ─── Enum validation ────────────────────────────────────────────────────────

#[test]
fn enum_accepts_members() {
    let desc = RecordDesc::new()
        .field(FieldDesc::flag("level", ValueKind::String).enum_values(["debug", "info"]));
    let grammar = build(desc);
    let ctx = grammar.parse(&["--level=info"]).unwrap();
    assert_eq!(ctx.get::<String>("level"), Some("info".to_string()));
}

#[test]
fn enum_rejects_non_members_with_int_rendering() {
    let desc = RecordDesc::new().field(
        FieldDesc::flag("enum", ValueKind::Int)
            .enum_values(["1", "2", "3"])
            .default_value("1"),
    );
    let grammar = build(desc);
    assert_eq!(
        parse_err(&grammar, &["--enum=123"]),
        "--enum must be one of \"1\",\"2\",\"3\" but got \"123\""
    );
}

#[test]
fn enum_validates_defaults() {
    let desc = RecordDesc::new().field(
        FieldDesc::flag("level", ValueKind::String)
            .enum_values(["debug", "info"])
            .default_value("bogus"),
    );
    let grammar = build(desc);
    assert_eq!(
        parse_err(&grammar, &[]),
        "--level must be one of \"debug\",\"info\" but got \"bogus\""
    );
}

#[test]
fn enum_validates_resolved_values() {
    let desc = RecordDesc::new().field(
        FieldDesc::flag("level", ValueKind::String)
            .enum_values(["debug", "info"])
            .env("LEVEL"),
    );
    let grammar = GrammarBuilder::new("test", desc)
        .resolver(env(&[("LEVEL", "shout")]))
        .build()
        .unwrap();
    assert_eq!(
        parse_err(&grammar, &[]),
        "--level must be one of \"debug\",\"info\" but got \"shout\""
    );
}

#[test]
fn enum_validates_each_list_element() {
    let desc = RecordDesc::new().field(
        FieldDesc::flag("state", ValueKind::List(Box::new(ValueKind::String)))
            .enum_values(["a", "b", "c"])
            .default_value("a"),
    );
    let grammar = build(desc);

    let ctx = grammar.parse(&[] as &[&str]).unwrap();
    assert_eq!(ctx.get::<Vec<String>>("state"), Some(vec!["a".to_string()]));

    assert_eq!(
        parse_err(&grammar, &["--state=a,z"]),
        "--state must be one of \"a\",\"b\",\"c\" but got \"z\""
    );
}

#[test]
fn enum_on_positional_names_placeholder() {
    let desc = RecordDesc::new()
        .field(FieldDesc::positional("mode", ValueKind::String).enum_values(["on", "off"]));
    let grammar = build(desc);
    assert_eq!(
        parse_err(&grammar, &["sideways"]),
        "<mode> must be one of \"on\",\"off\" but got \"sideways\""
    );
}

// ─── Xor groups ─────────────────────────────────────────────────────────────

fn xor_trio() -> RecordDesc {
    RecordDesc::new()
        .field(FieldDesc::flag("hello", ValueKind::Bool).xor("another"))
        .field(FieldDesc::flag("one", ValueKind::Bool).xor("group"))
        .field(FieldDesc::flag("two", ValueKind::String).xor("group"))
}

#[test]
fn xor_conflict_names_both_flags() {
    let grammar = build(xor_trio());
    assert_eq!(
        parse_err(&grammar, &["--hello", "--one", "--two=hi"]),
        "--one and --two can't be used together"
    );
    assert!(grammar.parse(&["--one", "--hello"]).is_ok());
}

#[test]
fn xor_across_command_scopes() {
    let desc = RecordDesc::new()
        .field(FieldDesc::flag("one", ValueKind::Bool).xor("group"))
        .field(FieldDesc::command(
            "cmd",
            RecordDesc::new()
                .field(FieldDesc::flag("two", ValueKind::String).xor("group"))
                .field(FieldDesc::flag("three", ValueKind::Bool).xor("group")),
        ));
    let grammar = build(desc);
    assert!(grammar.parse(&["--one", "cmd"]).is_ok());
    assert_eq!(
        parse_err(&grammar, &["--two=hi", "cmd", "--three"]),
        "--two and --three can't be used together"
    );
}

#[test]
fn multi_xor_memberships() {
    let desc = RecordDesc::new()
        .field(FieldDesc::flag("hello", ValueKind::Bool).xor("one").xor("two"))
        .field(FieldDesc::flag("one", ValueKind::Bool).xor("one"))
        .field(FieldDesc::flag("two", ValueKind::String).xor("two"));
    let grammar = build(desc);
    assert_eq!(
        parse_err(&grammar, &["--hello", "--one"]),
        "--hello and --one can't be used together"
    );
    assert_eq!(
        parse_err(&grammar, &["--hello", "--two=foo"]),
        "--hello and --two can't be used together"
    );
}

// ─── And groups ─────────────────────────────────────────────────────────────

#[test]
fn and_group_is_all_or_none() {
    let desc = RecordDesc::new()
        .field(FieldDesc::flag("hello", ValueKind::Bool).and_group("another"))
        .field(FieldDesc::flag("one", ValueKind::Bool).and_group("group"))
        .field(FieldDesc::flag("two", ValueKind::String).and_group("group"));
    let grammar = build(desc);
    assert_eq!(
        parse_err(&grammar, &["--hello", "--one"]),
        "--one and --two must be used together"
    );
    assert!(grammar.parse(&["--one", "--two=hi", "--hello"]).is_ok());
    assert!(grammar.parse(&[] as &[&str]).is_ok());
}

#[test]
fn and_across_command_scopes() {
    let desc = RecordDesc::new()
        .field(FieldDesc::flag("one", ValueKind::Bool).and_group("group"))
        .field(FieldDesc::command(
            "cmd",
            RecordDesc::new()
                .field(FieldDesc::flag("two", ValueKind::String).and_group("group"))
                .field(FieldDesc::flag("three", ValueKind::String).and_group("group")),
        ));
    let grammar = build(desc);
    assert!(grammar
        .parse(&["--one", "cmd", "--two=hi", "--three=hello"])
        .is_ok());
    assert_eq!(
        parse_err(&grammar, &["--two=hi", "cmd"]),
        "--one and --two and --three must be used together"
    );
}

#[test]
fn multi_and_memberships() {
    let desc = RecordDesc::new()
        .field(FieldDesc::flag("hello", ValueKind::Bool).and_group("one").and_group("two"))
        .field(FieldDesc::flag("one", ValueKind::Bool).and_group("one"))
        .field(FieldDesc::flag("two", ValueKind::String).and_group("two"));
    let grammar = build(desc);
    assert_eq!(
        parse_err(&grammar, &["--hello"]),
        "--hello and --one must be used together, --hello and --two must be used together"
    );
    assert_eq!(
        parse_err(&grammar, &["--two=foo"]),
        "--hello and --two must be used together"
    );
}

#[test]
fn xor_and_violations_combine() {
    let desc = RecordDesc::new()
        .field(FieldDesc::flag("hello", ValueKind::Bool).xor("one").and_group("two"))
        .field(FieldDesc::flag("one", ValueKind::Bool).xor("one"))
        .field(FieldDesc::flag("two", ValueKind::String).and_group("two"));
    let grammar = build(desc);
    assert_eq!(
        parse_err(&grammar, &["--hello"]),
        "--hello and --two must be used together"
    );
    assert!(grammar.parse(&["--one"]).is_ok());
    assert_eq!(
        parse_err(&grammar, &["--hello", "--one"]),
        "--hello and --one can't be used together, --hello and --two must be used together"
    );
}

#[test]
fn overlapping_xor_and_rejected_at_build() {
    let desc = RecordDesc::new()
        .field(FieldDesc::flag("hello", ValueKind::Bool).xor("one").and_group("two"))
        .field(FieldDesc::flag("one", ValueKind::Bool).xor("one").and_group("two"))
        .field(FieldDesc::flag("two", ValueKind::String).xor("one").and_group("two"));
    assert_eq!(
        build_err(desc),
        "invalid xor and combination, one and two overlap with more than one: [hello one two]"
    );
}

#[test]
fn xorprefix_scopes_embedded_group_tags() {
    // Both embeds use group tag "pair"; the xorprefix keeps them disjoint.
    let pair = |prefix: &str| {
        FieldDesc::embed(
            "creds",
            RecordDesc::new()
                .field(FieldDesc::flag("user", ValueKind::String).xor("pair"))
                .field(FieldDesc::flag("token", ValueKind::String).xor("pair")),
        )
        .prefix(prefix)
        .xorprefix(prefix)
    };
    let desc = RecordDesc::new()
        .field(pair("src-"))
        .field(pair("dst-"));
    let grammar = build(desc);

    // Conflicts stay within one embed's group.
    assert_eq!(
        parse_err(&grammar, &["--src-user=u", "--src-token=t"]),
        "--src-user and --src-token can't be used together"
    );
    // Across embeds the groups are distinct.
    assert!(grammar.parse(&["--src-user=u", "--dst-token=t"]).is_ok());
}

// ─── Required aggregation ───────────────────────────────────────────────────

#[test]
fn required_flag_missing() {
    let desc = RecordDesc::new().field(FieldDesc::flag("flag", ValueKind::String).required());
    let grammar = build(desc);
    assert_eq!(parse_err(&grammar, &[]), "missing flags: --flag");
    assert!(grammar.parse(&["--flag=x"]).is_ok());
}

#[test]
fn required_satisfied_by_default() {
    let desc = RecordDesc::new()
        .field(FieldDesc::flag("flag", ValueKind::String).required().default_value("x"));
    let grammar = build(desc);
    assert!(grammar.parse(&[] as &[&str]).is_ok());
}

#[test]
fn xor_required_grouping() {
    let desc = RecordDesc::new()
        .field(FieldDesc::flag("one", ValueKind::Bool).xor("one").xor("two").required())
        .field(FieldDesc::flag("two", ValueKind::Bool).xor("one").required())
        .field(FieldDesc::flag("three", ValueKind::Bool).xor("two").required())
        .field(FieldDesc::flag("four", ValueKind::Bool).required());
    let grammar = build(desc);

    assert_eq!(parse_err(&grammar, &["--one"]), "missing flags: --four");
    assert_eq!(
        parse_err(&grammar, &["--two"]),
        "missing flags: --four, --one or --three"
    );
    assert_eq!(
        parse_err(&grammar, &[]),
        "missing flags: --four, --one or --three, --one or --two"
    );
}

#[test]
fn and_required_grouping() {
    let desc = RecordDesc::new()
        .field(FieldDesc::flag("one", ValueKind::Bool).and_group("one").and_group("two").required())
        .field(FieldDesc::flag("two", ValueKind::Bool).and_group("one").required())
        .field(FieldDesc::flag("three", ValueKind::Bool).and_group("two"))
        .field(FieldDesc::flag("four", ValueKind::Bool).required());
    let grammar = build(desc);

    assert_eq!(
        parse_err(&grammar, &["--one", "--two", "--three"]),
        "missing flags: --four"
    );
    assert_eq!(
        parse_err(&grammar, &["--four"]),
        "missing flags: --one and --three, --one and --two"
    );
    assert_eq!(
        parse_err(&grammar, &[]),
        "missing flags: --four, --one and --three, --one and --two"
    );
}

#[test]
fn xor_required_many() {
    let desc = RecordDesc::new()
        .field(FieldDesc::flag("one", ValueKind::Bool).xor("one").required())
        .field(FieldDesc::flag("two", ValueKind::Bool).xor("one").required())
        .field(FieldDesc::flag("three", ValueKind::Bool).xor("one").required());
    let grammar = build(desc);

    assert!(grammar.parse(&["--one"]).is_ok());
    assert!(grammar.parse(&["--three"]).is_ok());
    assert_eq!(
        parse_err(&grammar, &[]),
        "missing flags: --one or --two or --three"
    );
}

#[test]
fn and_required_many() {
    let desc = RecordDesc::new()
        .field(FieldDesc::flag("one", ValueKind::Bool).and_group("one").required())
        .field(FieldDesc::flag("two", ValueKind::Bool).and_group("one").required())
        .field(FieldDesc::flag("three", ValueKind::Bool).and_group("one").required());
    let grammar = build(desc);

    assert_eq!(
        parse_err(&grammar, &[]),
        "missing flags: --one and --two and --three"
    );
    assert_eq!(
        parse_err(&grammar, &["--three"]),
        "missing flags: --one and --two"
    );
}

#[test]
fn required_flags_of_unselected_commands_do_not_count() {
    let desc = RecordDesc::new()
        .field(FieldDesc::command(
            "one",
            RecordDesc::new().field(FieldDesc::flag("only-one", ValueKind::String).required()),
        ))
        .field(FieldDesc::command("two", RecordDesc::new()));
    let grammar = build(desc);
    assert!(grammar.parse(&["two"]).is_ok());
    assert_eq!(parse_err(&grammar, &["one"]), "missing flags: --only-one");
}
