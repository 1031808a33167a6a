//! Declarative grammar description for the argot engine.
//!
//! A CLI grammar starts life as a [`RecordDesc`]: an ordered list of fields,
//! each carrying a semantic type ([`ValueKind`]) and tag metadata
//! ([`TagSet`]). The description is plain data — build it in code with the
//! chainable constructors on [`FieldDesc`], or deserialize it from JSON the
//! way the argot CLI does. The engine's introspector and builder consume it
//! and enforce all structural rules; nothing here validates beyond shape.

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};

/// Current format version for serialized grammar descriptions.
pub const DESC_FORMAT_VERSION: &str = "0.4.0";

// ─── Semantic types ─────────────────────────────────────────────────────────

/// The semantic type of a field's value.
///
/// `Optional` is the pointer-to-T replacement: presence vs absence
/// distinguishes "unset" from "explicitly set" (including the empty
/// string). `Custom` names a caller-registered decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// A boolean switch.
    Bool,
    /// A free-form string.
    String,
    /// A 64-bit signed integer.
    Int,
    /// A 64-bit float.
    Float,
    /// A list of element values; cumulative across occurrences.
    List(Box<ValueKind>),
    /// A map from key values to entry values; cumulative across occurrences.
    Map(Box<ValueKind>, Box<ValueKind>),
    /// An optional value; presence is tracked separately from the value.
    Optional(Box<ValueKind>),
    /// A caller-registered decoder, looked up by key.
    Custom(String),
}

impl ValueKind {
    /// `true` for kinds that accumulate across multiple occurrences.
    pub fn is_cumulative(&self) -> bool {
        match self {
            ValueKind::List(_) | ValueKind::Map(_, _) => true,
            ValueKind::Optional(inner) => inner.is_cumulative(),
            _ => false,
        }
    }

    /// `true` when the underlying (unwrapped) kind is `Bool`.
    pub fn is_bool(&self) -> bool {
        match self {
            ValueKind::Bool => true,
            ValueKind::Optional(inner) => inner.is_bool(),
            _ => false,
        }
    }

    /// The kind with any `Optional` wrapper stripped.
    pub fn unwrapped(&self) -> &ValueKind {
        match self {
            ValueKind::Optional(inner) => inner.unwrapped(),
            other => other,
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueKind::Bool => write!(f, "bool"),
            ValueKind::String => write!(f, "string"),
            ValueKind::Int => write!(f, "int"),
            ValueKind::Float => write!(f, "float"),
            ValueKind::List(e) => write!(f, "list of {e}"),
            ValueKind::Map(k, v) => write!(f, "map of {k} to {v}"),
            ValueKind::Optional(inner) => write!(f, "optional {inner}"),
            ValueKind::Custom(key) => write!(f, "{key}"),
        }
    }
}

// ─── Field roles ────────────────────────────────────────────────────────────

/// How a field participates in the grammar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A named flag (`--name`). The default when no role tag is present.
    #[default]
    Flag,
    /// A subcommand; requires a nested record.
    Command,
    /// A positional argument. With a nested record attached this is a
    /// branching argument: the positional's value selects the subtree.
    Arg,
    /// Child fields are merged into the owning node.
    Embed,
    /// The field is excluded from the grammar entirely.
    Excluded,
}

// ─── Negation and passthrough modes ─────────────────────────────────────────

/// Negation behaviour of a boolean flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Negation {
    /// Not negatable.
    #[default]
    Off,
    /// Negated by `--no-<name>`.
    Default,
    /// Negated by a custom long name.
    Custom(String),
}

/// Passthrough mode of a list positional or a command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Passthrough {
    /// Tokens are validated normally.
    #[default]
    Off,
    /// Once the positional starts capturing, all further tokens are taken
    /// verbatim; unknown flags before that point are still errors.
    Partial,
    /// Unknown flags are also captured instead of rejected.
    All,
}

// ─── Tag metadata ───────────────────────────────────────────────────────────

/// The recognized per-field tag metadata.
///
/// This is the canonical tag set: each tag has exactly one typed spelling.
/// All fields default to "absent" so JSON descriptions stay terse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TagSet {
    /// The field's role; `Flag` when omitted.
    pub role: Role,
    /// Override for the kebab-cased name derived from the identifier.
    pub name: Option<String>,
    /// Help text. Subject to `${var}` interpolation.
    pub help: Option<String>,
    /// Value placeholder for help rendering.
    pub placeholder: Option<String>,
    /// Default literal for flags and positionals. On a command this marks
    /// the default command instead: `"withargs"` allows the default child
    /// to consume arguments; any other value is the plain fallback marker.
    pub default: Option<String>,
    /// The field must end up with a value.
    pub required: bool,
    /// The positional may be omitted.
    pub optional: bool,
    /// Hidden from help output (parsing is unaffected).
    pub hidden: bool,
    /// Single-letter short alias.
    pub short: Option<char>,
    /// Additional long aliases.
    pub aliases: Vec<String>,
    /// Environment variable names consulted by the env resolver, in order.
    pub env: Vec<String>,
    /// Allowed final values; empty means unconstrained.
    #[serde(rename = "enum")]
    pub enum_values: Vec<String>,
    /// Negation behaviour (boolean flags only).
    pub negatable: Negation,
    /// Passthrough mode (list positionals and commands).
    pub passthrough: Passthrough,
    /// List separator override: `"none"` disables splitting, otherwise the
    /// first character is the separator. Default `,`.
    pub sep: Option<String>,
    /// Map entry separator override, same discipline. Default `;`.
    pub mapsep: Option<String>,
    /// Grouping tag for help rendering.
    pub group: Option<String>,
    /// Xor group memberships: at most one member may be set.
    pub xor: Vec<String>,
    /// And group memberships: all members or none.
    pub and: Vec<String>,
    /// Decoder key override (`type` tag).
    #[serde(rename = "type")]
    pub decoder: Option<String>,
    /// Flag-name prefix applied to embedded child fields.
    pub prefix: Option<String>,
    /// Env-name prefix applied to embedded child fields.
    pub envprefix: Option<String>,
    /// Xor/and group-tag prefix applied to embedded child fields.
    pub xorprefix: Option<String>,
}

// ─── Field and record descriptions ──────────────────────────────────────────

/// One field of a record description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDesc {
    /// Source identifier; kebab-cased into the display name unless the
    /// `name` tag overrides it.
    pub ident: String,
    /// Semantic type of the field's value. Ignored for commands and embeds.
    #[serde(default = "default_kind")]
    pub kind: ValueKind,
    /// Nested record for commands, branching arguments, and embeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<RecordDesc>,
    /// Tag metadata.
    #[serde(default)]
    pub tags: TagSet,
}

fn default_kind() -> ValueKind {
    ValueKind::String
}

/// An ordered record of fields — a node of the grammar description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordDesc {
    /// The fields, in declaration order.
    pub fields: Vec<FieldDesc>,
}

impl RecordDesc {
    /// An empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field (builder style).
    pub fn field(mut self, field: FieldDesc) -> Self {
        self.fields.push(field);
        self
    }
}

impl FieldDesc {
    fn with_role(ident: &str, kind: ValueKind, role: Role) -> Self {
        Self {
            ident: ident.to_string(),
            kind,
            record: None,
            tags: TagSet {
                role,
                ..TagSet::default()
            },
        }
    }

    /// A flag field.
    pub fn flag(ident: &str, kind: ValueKind) -> Self {
        Self::with_role(ident, kind, Role::Flag)
    }

    /// A positional argument.
    pub fn positional(ident: &str, kind: ValueKind) -> Self {
        Self::with_role(ident, kind, Role::Arg)
    }

    /// A subcommand with its own record.
    pub fn command(ident: &str, record: RecordDesc) -> Self {
        let mut f = Self::with_role(ident, ValueKind::String, Role::Command);
        f.record = Some(record);
        f
    }

    /// A branching argument: a positional whose value selects `record`.
    ///
    /// The record must start with the positional key field.
    pub fn branch(ident: &str, record: RecordDesc) -> Self {
        let mut f = Self::with_role(ident, ValueKind::String, Role::Arg);
        f.record = Some(record);
        f
    }

    /// An embedded record whose fields merge into the owning node.
    pub fn embed(ident: &str, record: RecordDesc) -> Self {
        let mut f = Self::with_role(ident, ValueKind::String, Role::Embed);
        f.record = Some(record);
        f
    }

    /// An excluded field (the `-` tag).
    pub fn excluded(ident: &str) -> Self {
        Self::with_role(ident, ValueKind::String, Role::Excluded)
    }

    // ── Chainable tag setters ───────────────────────────────────────────

    /// Override the derived display name.
    pub fn name(mut self, name: &str) -> Self {
        self.tags.name = Some(name.to_string());
        self
    }

    /// Set help text.
    pub fn help(mut self, help: &str) -> Self {
        self.tags.help = Some(help.to_string());
        self
    }

    /// Set the value placeholder.
    pub fn placeholder(mut self, placeholder: &str) -> Self {
        self.tags.placeholder = Some(placeholder.to_string());
        self
    }

    /// Set the default literal (or default-command marker on a command).
    pub fn default_value(mut self, default: &str) -> Self {
        self.tags.default = Some(default.to_string());
        self
    }

    /// Mark the field required.
    pub fn required(mut self) -> Self {
        self.tags.required = true;
        self
    }

    /// Mark the positional optional.
    pub fn optional(mut self) -> Self {
        self.tags.optional = true;
        self
    }

    /// Hide the field from help output.
    pub fn hidden(mut self) -> Self {
        self.tags.hidden = true;
        self
    }

    /// Set the short alias.
    pub fn short(mut self, short: char) -> Self {
        self.tags.short = Some(short);
        self
    }

    /// Add a long alias.
    pub fn alias(mut self, alias: &str) -> Self {
        self.tags.aliases.push(alias.to_string());
        self
    }

    /// Add an environment variable name.
    pub fn env(mut self, var: &str) -> Self {
        self.tags.env.push(var.to_string());
        self
    }

    /// Set the allowed enum members.
    pub fn enum_values<I: IntoIterator<Item = S>, S: Into<String>>(mut self, values: I) -> Self {
        self.tags.enum_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Negate with `--no-<name>`.
    pub fn negatable(mut self) -> Self {
        self.tags.negatable = Negation::Default;
        self
    }

    /// Negate with a custom long name.
    pub fn negatable_as(mut self, name: &str) -> Self {
        self.tags.negatable = Negation::Custom(name.to_string());
        self
    }

    /// Set the passthrough mode.
    pub fn passthrough(mut self, mode: Passthrough) -> Self {
        self.tags.passthrough = mode;
        self
    }

    /// Override the list separator (`"none"` disables splitting).
    pub fn sep(mut self, sep: &str) -> Self {
        self.tags.sep = Some(sep.to_string());
        self
    }

    /// Override the map entry separator.
    pub fn mapsep(mut self, sep: &str) -> Self {
        self.tags.mapsep = Some(sep.to_string());
        self
    }

    /// Join an xor group.
    pub fn xor(mut self, tag: &str) -> Self {
        self.tags.xor.push(tag.to_string());
        self
    }

    /// Join an and group.
    pub fn and_group(mut self, tag: &str) -> Self {
        self.tags.and.push(tag.to_string());
        self
    }

    /// Override the decoder key.
    pub fn decoder(mut self, key: &str) -> Self {
        self.tags.decoder = Some(key.to_string());
        self
    }

    /// Prefix embedded child flag names.
    pub fn prefix(mut self, prefix: &str) -> Self {
        self.tags.prefix = Some(prefix.to_string());
        self
    }

    /// Prefix embedded child env names.
    pub fn envprefix(mut self, prefix: &str) -> Self {
        self.tags.envprefix = Some(prefix.to_string());
        self
    }

    /// Prefix embedded child xor/and group tags.
    pub fn xorprefix(mut self, prefix: &str) -> Self {
        self.tags.xorprefix = Some(prefix.to_string());
        self
    }
}

// ─── Name derivation ────────────────────────────────────────────────────────

/// Kebab-case a source identifier (`SomeFlagName` / `some_flag_name` →
/// `some-flag-name`).
pub fn kebab_case(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 4);
    let mut prev_lower = false;
    for ch in ident.chars() {
        if ch == '_' || ch == ' ' {
            if !out.ends_with('-') {
                out.push('-');
            }
            prev_lower = false;
        } else if ch.is_ascii_uppercase() {
            if prev_lower && !out.ends_with('-') {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
            prev_lower = false;
        } else {
            out.push(ch);
            prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        }
    }
    out.trim_matches('-').to_string()
}
