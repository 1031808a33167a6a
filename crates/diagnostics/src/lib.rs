//! Diagnostics for the argot grammar engine.
//!
//! Provides the error taxonomy shared by the grammar builder, the parser,
//! and the CLI: [`BuildError`] for schema violations caught while compiling
//! a grammar, [`ParseError`] for invalid user input, and [`Error`] as the
//! top-level union. Parse errors are plain serializable values with stable
//! `Display` renderings — callers match on the rendered message or on the
//! variant, and the CLI serializes them into JSON envelopes.

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};

/// Boxed error type used by hooks, actions, and resolvers.
///
/// Run errors propagate through [`crate::Error`]-free channels unchanged;
/// hook errors are rendered into [`ParseError::Hook`] with the offending
/// element as prefix.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

// ─── Build-time errors ──────────────────────────────────────────────────────

/// A schema violation detected while compiling a grammar.
///
/// The builder is fail-fast: the first violation aborts the build and no
/// grammar is produced. Each variant names the offending field by its
/// dotted source path (e.g. `user.create.id`).
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum BuildError {
    /// A field carries no recognized kind (plain nested record without a
    /// `cmd`, `arg`, or `embed` tag).
    #[error("{path}: unsupported field (expected cmd, arg, or embed tag)")]
    UnsupportedField {
        /// Dotted source path of the field.
        path: String,
    },

    /// Two flags visible in the same scope chain share a long name or alias.
    #[error("{path}: duplicate flag --{name}")]
    DuplicateFlag {
        /// Dotted source path of the later field.
        path: String,
        /// The colliding long name.
        name: String,
    },

    /// Two flags visible in the same scope chain share a short letter.
    #[error("{path}: duplicate short flag -{short}")]
    DuplicateShort {
        /// Dotted source path of the later field.
        path: String,
        /// The colliding short letter.
        short: char,
    },

    /// A negation name collides with an existing long name in scope.
    #[error("{path}: duplicate negation flag --{name}")]
    DuplicateNegation {
        /// Dotted source path of the negatable field.
        path: String,
        /// The colliding negation name.
        name: String,
    },

    /// `negatable` was applied to a non-boolean flag.
    #[error("{path}: negatable is only valid on boolean flags")]
    NegatableNonBool {
        /// Dotted source path of the field.
        path: String,
    },

    /// A required positional argument follows an optional one.
    #[error("{path}: required positional argument may not follow an optional one")]
    RequiredAfterOptional {
        /// Dotted source path of the required positional.
        path: String,
    },

    /// A cumulative (list) positional is not the last positional of its node.
    #[error("{path}: cumulative positional argument must be the last one")]
    CumulativeNotLast {
        /// Dotted source path of the cumulative positional.
        path: String,
    },

    /// A node mixes scalar positionals with child commands.
    #[error("{path}: can't mix positional arguments and commands")]
    MixedPositionalsAndCommands {
        /// Dotted source path of the node.
        path: String,
    },

    /// A branching argument's record does not start with a positional key.
    #[error("{path}: branching argument must contain a leading positional argument")]
    BranchKeyMissing {
        /// Dotted source path of the branching argument.
        path: String,
    },

    /// A branching argument's key positional duplicates the branch name.
    #[error("{path}: branching argument key duplicates the branch name {name:?}")]
    BranchKeyDuplicatesName {
        /// Dotted source path of the branching argument.
        path: String,
        /// The duplicated name.
        name: String,
    },

    /// More than one child of a node is marked as the default command.
    #[error("{path}: can't have more than one default command under {parent}")]
    MultipleDefaultCommands {
        /// Dotted source path of the second default child.
        path: String,
        /// Display name of the parent node.
        parent: String,
    },

    /// A plain default command owns subcommands or positional arguments.
    #[error("{path}: default command {display} must not have subcommands or arguments")]
    DefaultCommandOwnsChildren {
        /// Dotted source path of the default command.
        path: String,
        /// Rendered display of the command (e.g. `one <command>`).
        display: String,
    },

    /// A passthrough command owns flags or subcommands.
    #[error("{path}: passthrough command {display} must not have subcommands or flags")]
    PassthroughCommandShape {
        /// Dotted source path of the command.
        path: String,
        /// Rendered display of the command.
        display: String,
    },

    /// A passthrough command's single positional is not a list of strings.
    #[error(
        "{path}: passthrough command {display} must contain exactly one positional argument of \
         list-of-string type"
    )]
    PassthroughCommandArgType {
        /// Dotted source path of the command.
        path: String,
        /// Rendered display of the command.
        display: String,
    },

    /// No decoder is registered for the field's semantic type or custom key.
    #[error("{path}: no decoder registered for {key:?}")]
    UnknownDecoder {
        /// Dotted source path of the field.
        path: String,
        /// The decoder key that failed to resolve.
        key: String,
    },

    /// A `${name}` interpolation referenced an undefined variable.
    #[error("{path}: undefined variable ${{{name}}}")]
    UnresolvedInterpolation {
        /// Dotted source path of the field carrying the tag.
        path: String,
        /// The unresolved variable name.
        name: String,
    },

    /// An xor group and an and group overlap in more than one field.
    #[error("invalid xor and combination, {xor} and {and} overlap with more than one: [{}]", .fields.join(" "))]
    XorAndOverlap {
        /// The xor group tag.
        xor: String,
        /// The and group tag.
        and: String,
        /// All fields sharing both groups, in declaration order.
        fields: Vec<String>,
    },

    /// An action/hook selector did not match any node or field.
    #[error("no such grammar element: {selector:?}")]
    UnknownSelector {
        /// The selector string passed to the builder.
        selector: String,
    },

    /// A tag was used on a field that cannot carry it.
    #[error("{path}: {detail}")]
    InvalidTag {
        /// Dotted source path of the field.
        path: String,
        /// Description of the misuse.
        detail: String,
    },
}

// ─── Parse-time errors ──────────────────────────────────────────────────────

/// Invalid user input detected while parsing a token stream.
///
/// Messages are short and human-oriented, naming the offending flag or
/// positional. In trace mode the parser records the error in the `Context`
/// instead of failing fast.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ParseError {
    /// A flag-shaped token did not resolve in the current scope chain.
    #[error("unknown flag {flag}")]
    UnknownFlag {
        /// The flag as written (`--frob` or `-x`).
        flag: String,
    },

    /// A token matched neither a positional, a child command, nor a default.
    #[error("unexpected argument {token}")]
    UnexpectedArgument {
        /// The offending token.
        token: String,
    },

    /// Input ended before all required positionals were bound.
    #[error("missing positional arguments {}", .placeholders.join(" "))]
    MissingPositionals {
        /// Placeholders of the unbound positionals (`<id>`, `<first>`...).
        placeholders: Vec<String>,
    },

    /// A command node needed a subcommand selection and none was given.
    #[error("expected one of {}", .expected.iter().map(|e| format!("{e:?}")).collect::<Vec<_>>().join(", "))]
    MissingCommand {
        /// Child command names and branch placeholders, in declaration
        /// order.
        expected: Vec<String>,
    },

    /// A value-consuming flag reached end of input (or a flag token) with
    /// no value available.
    #[error("{flag}: missing value")]
    MissingValue {
        /// The flag awaiting a value.
        flag: String,
    },

    /// A token failed to decode as the field's semantic type.
    #[error("{at}: expected {expected}, got {got:?}")]
    Decode {
        /// Display of the target (`--flag` or `<arg>`).
        at: String,
        /// The expected type (`integer`, `number`, `boolean`...).
        expected: String,
        /// The offending token text.
        got: String,
    },

    /// A final value is not a member of the field's enum set.
    #[error("{at} must be one of {} but got {got:?}", .allowed.iter().map(|v| format!("{v:?}")).collect::<Vec<_>>().join(","))]
    InvalidEnum {
        /// Display of the target.
        at: String,
        /// The allowed enum members, in declaration order.
        allowed: Vec<String>,
        /// The rejected value.
        got: String,
    },

    /// Two members of an xor group were both set.
    #[error("{first} and {second} can't be used together")]
    XorConflict {
        /// Display of the first set member, in declaration order.
        first: String,
        /// Display of the second set member.
        second: String,
    },

    /// An and group was only partially set.
    #[error("{} must be used together", .members.join(" and "))]
    AndIncomplete {
        /// Displays of all group members, in declaration order.
        members: Vec<String>,
    },

    /// Required flags are missing, grouped by their xor/and relationships.
    #[error("missing flags: {}", .entries.join(", "))]
    MissingFlags {
        /// Pre-rendered, sorted entries (`--four`, `--one or --two`,
        /// `--one and --three`).
        entries: Vec<String>,
    },

    /// Several independent violations detected in one pass.
    #[error("{}", .errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    Multi {
        /// The individual violations, in detection order.
        errors: Vec<ParseError>,
    },

    /// A user hook returned an error; the element display is the prefix.
    #[error("{}{message}", .at.as_deref().map(|a| format!("{a}: ")).unwrap_or_default())]
    Hook {
        /// Display of the element the hook belongs to; `None` for the
        /// application root, which is rendered unprefixed.
        at: Option<String>,
        /// The rendered hook error message.
        message: String,
    },
}

impl ParseError {
    /// Combine violations into a single error, unwrapping the trivial case.
    ///
    /// Returns `None` when `errors` is empty.
    pub fn combined(mut errors: Vec<ParseError>) -> Option<ParseError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(ParseError::Multi { errors }),
        }
    }
}

// ─── Top-level union ────────────────────────────────────────────────────────

/// Any error produced by the grammar engine itself.
///
/// Errors returned by user actions pass through `Context::run` unchanged as
/// [`BoxedError`] and never appear here.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum Error {
    /// The schema violated a structural rule; no grammar was produced.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// The token stream was invalid against the grammar.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// `run` was invoked on a path with no action anywhere along it.
    #[error("no command selected")]
    NoCommandSelected,
}
