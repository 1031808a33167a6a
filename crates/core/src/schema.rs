//! Canonical field metadata.
//!
//! The introspector walks a [`RecordDesc`](argot_schema::RecordDesc) and
//! interprets each field's tags into a [`FieldSpec`] plus a kind decision
//! ([`FieldShape`]): command, positional, branching argument, embed,
//! excluded, or flag. All tag misuse detectable on a single field is
//! rejected here; cross-field and tree-shape rules live in the grammar
//! builder.

use argot_diagnostics::BuildError;
use argot_schema::{FieldDesc, Negation, Passthrough, Role, TagSet, ValueKind, kebab_case};
use serde::Serialize;

/// Index of a field in the grammar's field arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FieldId(pub usize);

/// How a field participates in its node, decided from tags and shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// A subcommand with a nested record.
    Command,
    /// A scalar positional argument.
    Positional,
    /// A positional whose value selects a nested subtree.
    Branch,
    /// Child fields merge into the owning node.
    Embed,
    /// The field does not participate in the grammar.
    Excluded,
    /// A named flag.
    Flag,
}

/// Decide a field's shape from its role tag and attached record.
pub fn classify(desc: &FieldDesc) -> Result<FieldShape, BuildError> {
    match desc.tags.role {
        Role::Command => {
            if desc.record.is_none() {
                return Err(BuildError::InvalidTag {
                    path: desc.ident.clone(),
                    detail: "cmd requires a nested record".into(),
                });
            }
            Ok(FieldShape::Command)
        }
        Role::Arg => {
            if desc.record.is_some() {
                Ok(FieldShape::Branch)
            } else {
                Ok(FieldShape::Positional)
            }
        }
        Role::Embed => {
            if desc.record.is_none() {
                return Err(BuildError::InvalidTag {
                    path: desc.ident.clone(),
                    detail: "embed requires a nested record".into(),
                });
            }
            Ok(FieldShape::Embed)
        }
        Role::Excluded => Ok(FieldShape::Excluded),
        Role::Flag => {
            // A plain nested record with no cmd/arg/embed tag has no
            // recognized kind.
            if desc.record.is_some() {
                return Err(BuildError::UnsupportedField {
                    path: desc.ident.clone(),
                });
            }
            Ok(FieldShape::Flag)
        }
    }
}

// ─── Inherited embed context ────────────────────────────────────────────────

/// Naming context accumulated while descending through embeds.
#[derive(Debug, Clone, Default)]
pub(crate) struct Inherited {
    /// Dotted source path of the enclosing record.
    pub(crate) path: String,
    /// Flag-name prefix from enclosing `prefix` tags.
    pub(crate) prefix: String,
    /// Env-name prefix from enclosing `envprefix` tags.
    pub(crate) envprefix: String,
    /// Group-tag prefix from enclosing `xorprefix` tags.
    pub(crate) xorprefix: String,
}

impl Inherited {
    pub(crate) fn root(app_name: &str) -> Self {
        Self {
            path: app_name.to_string(),
            ..Self::default()
        }
    }

    /// The context seen by fields embedded through `desc`.
    pub(crate) fn through_embed(&self, desc: &FieldDesc) -> Self {
        Self {
            path: format!("{}.{}", self.path, desc.ident),
            prefix: format!("{}{}", self.prefix, desc.tags.prefix.as_deref().unwrap_or("")),
            envprefix: format!(
                "{}{}",
                self.envprefix,
                desc.tags.envprefix.as_deref().unwrap_or("")
            ),
            xorprefix: format!(
                "{}{}",
                self.xorprefix,
                desc.tags.xorprefix.as_deref().unwrap_or("")
            ),
        }
    }

    /// The context seen inside a command or branch node named by `desc`.
    pub(crate) fn through_node(&self, desc: &FieldDesc) -> Self {
        Self {
            path: format!("{}.{}", self.path, desc.ident),
            ..Self::default()
        }
    }

    pub(crate) fn child_path(&self, ident: &str) -> String {
        format!("{}.{}", self.path, ident)
    }
}

// ─── Canonical field spec ───────────────────────────────────────────────────

/// Canonical metadata for one flag or positional argument.
///
/// Built once by the introspector, then frozen; interpolation rewrites the
/// textual tags before the grammar is finalized.
#[derive(Debug, Clone, Serialize)]
pub struct FieldSpec {
    /// Display name (kebab-cased identifier unless overridden), with any
    /// embed prefixes applied for flags.
    pub name: String,
    /// Dotted source path, used in build error messages.
    pub path: String,
    /// `true` for positional arguments, `false` for flags.
    pub positional: bool,
    /// Single-letter short alias.
    pub short: Option<char>,
    /// Additional long aliases.
    pub aliases: Vec<String>,
    /// Help text.
    pub help: String,
    /// Value placeholder for help rendering.
    pub placeholder: Option<String>,
    /// Environment variable names, in resolution order.
    pub env: Vec<String>,
    /// Semantic type.
    pub kind: ValueKind,
    /// Decoder key from the `type` tag.
    pub decoder_key: Option<String>,
    /// Default literal, if any.
    pub default: Option<String>,
    /// Allowed final values; empty means unconstrained.
    pub enum_values: Vec<String>,
    /// Xor group memberships.
    pub xor: Vec<String>,
    /// And group memberships.
    pub and: Vec<String>,
    /// The field must end up with a value.
    pub required: bool,
    /// The positional may be left unbound.
    pub optional: bool,
    /// Hidden from help output.
    pub hidden: bool,
    /// Resolved negation long name (`no-<name>` or a custom name).
    pub negation: Option<String>,
    /// Passthrough capture mode.
    pub passthrough: Passthrough,
    /// List separator; `None` disables splitting.
    pub list_sep: Option<char>,
    /// Map entry separator; `None` disables splitting.
    pub map_sep: Option<char>,
}

impl FieldSpec {
    /// Interpret a field description into canonical metadata.
    pub(crate) fn from_desc(
        desc: &FieldDesc,
        inherited: &Inherited,
        positional: bool,
    ) -> Result<FieldSpec, BuildError> {
        let tags = &desc.tags;
        let path = inherited.child_path(&desc.ident);
        let base = tags.name.clone().unwrap_or_else(|| kebab_case(&desc.ident));
        let name = if positional {
            base
        } else {
            format!("{}{}", inherited.prefix, base)
        };

        let negation = match &tags.negatable {
            Negation::Off => None,
            Negation::Default | Negation::Custom(_) if positional => {
                return Err(BuildError::InvalidTag {
                    path,
                    detail: "negatable is not valid on positional arguments".into(),
                });
            }
            Negation::Default | Negation::Custom(_) if !desc.kind.is_bool() => {
                return Err(BuildError::NegatableNonBool { path });
            }
            Negation::Default => Some(format!("no-{name}")),
            Negation::Custom(custom) => Some(custom.clone()),
        };

        if tags.passthrough != Passthrough::Off {
            let is_string_list =
                matches!(desc.kind.unwrapped(), ValueKind::List(e) if **e == ValueKind::String);
            if !positional || !is_string_list {
                return Err(BuildError::InvalidTag {
                    path,
                    detail: "passthrough requires a list-of-string positional argument".into(),
                });
            }
        }

        let env = tags
            .env
            .iter()
            .map(|var| format!("{}{}", inherited.envprefix, var))
            .collect();
        let group_tags = |groups: &[String]| {
            groups
                .iter()
                .map(|g| format!("{}{}", inherited.xorprefix, g))
                .collect::<Vec<_>>()
        };

        // A positional with a default is implicitly optional, and an
        // Optional kind tracks presence rather than demanding a value.
        let optional = tags.optional
            || tags.default.is_some()
            || matches!(desc.kind, ValueKind::Optional(_));

        Ok(FieldSpec {
            name,
            path,
            positional,
            short: tags.short,
            aliases: tags.aliases.clone(),
            help: tags.help.clone().unwrap_or_default(),
            placeholder: tags.placeholder.clone(),
            env,
            kind: desc.kind.clone(),
            decoder_key: tags.decoder.clone(),
            default: tags.default.clone(),
            enum_values: tags.enum_values.clone(),
            xor: group_tags(&tags.xor),
            and: group_tags(&tags.and),
            required: tags.required,
            optional,
            hidden: tags.hidden,
            negation,
            passthrough: tags.passthrough,
            list_sep: separator(tags.sep.as_deref(), ','),
            map_sep: separator(tags.mapsep.as_deref(), ';'),
        })
    }

    /// `true` when repeated occurrences accumulate.
    pub fn cumulative(&self) -> bool {
        self.kind.is_cumulative()
    }

    /// The user-facing display: `--name` for flags, `<name>` for
    /// positionals.
    pub fn display(&self) -> String {
        if self.positional {
            format!("<{}>", self.name)
        } else {
            format!("--{}", self.name)
        }
    }

    /// All long names this flag answers to, negation included.
    pub(crate) fn long_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str())
            .chain(self.aliases.iter().map(String::as_str))
            .chain(self.negation.as_deref())
    }
}

fn separator(tag: Option<&str>, default: char) -> Option<char> {
    match tag {
        None => Some(default),
        Some("none") => None,
        Some(s) => s.chars().next().or(Some(default)),
    }
}

/// `true` when every tag that only makes sense on flags is absent; used by
/// the builder to reject flag-only tags on commands.
pub(crate) fn node_tags_only(tags: &TagSet) -> bool {
    tags.short.is_none()
        && tags.enum_values.is_empty()
        && tags.negatable == Negation::Off
        && tags.sep.is_none()
        && tags.mapsep.is_none()
}
