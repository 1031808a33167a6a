//! Resolvers, defaults, and cross-field constraints.
//!
//! After token consumption the pipeline here runs over the selected path:
//! hook phases fire in batched order (all `BeforeReset`, all
//! `BeforeResolve`, resolution, all `BeforeApply`, all `AfterApply`), then
//! enum validation, missing positionals, xor/and violations, required
//! aggregation, `Validate` hooks, and finally the missing-command check.

use crate::context::{Binding, Origin};
use crate::decode::Value;
use crate::grammar::{Grammar, NodeId};
use crate::hooks::{BindingBus, ElementKind, HookArgs, Phase};
use crate::parse::{Path, PathElement};
use crate::schema::{FieldId, FieldSpec};
use argot_diagnostics::{BoxedError, ParseError};
use std::collections::{BTreeSet, HashMap, HashSet};

// ─── Resolvers ──────────────────────────────────────────────────────────────

/// An external source consulted for fields that have no parse-time value.
///
/// Resolvers run in registration order before the literal default applies;
/// the first resolver returning `Some` wins. The returned string decodes
/// through the field's regular decoder, so separator and enum discipline
/// apply to resolved values too.
pub trait Resolver {
    /// Produce a raw value for `field`, or `None` to pass.
    fn resolve(&self, field: &FieldSpec, bus: &BindingBus) -> Result<Option<String>, BoxedError>;
}

/// Resolves fields carrying `env` tags through an injected lookup
/// function. The process-environment backend stays outside the engine;
/// tests inject a plain map lookup.
pub struct EnvResolver {
    lookup: Box<dyn Fn(&str) -> Option<String>>,
}

impl EnvResolver {
    /// Build an env resolver around a lookup function.
    pub fn new<F: Fn(&str) -> Option<String> + 'static>(lookup: F) -> Self {
        Self {
            lookup: Box::new(lookup),
        }
    }
}

impl Resolver for EnvResolver {
    fn resolve(&self, field: &FieldSpec, _bus: &BindingBus) -> Result<Option<String>, BoxedError> {
        for var in &field.env {
            if let Some(value) = (self.lookup)(var) {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

// ─── Pipeline ───────────────────────────────────────────────────────────────

struct SeqItem {
    kind: ElementKind,
    name: String,
    at: Option<String>,
    node: Option<NodeId>,
    field: Option<FieldId>,
}

/// Run the post-consumption pipeline. `bindings` arrives holding the
/// parse-time values and leaves holding resolved and defaulted values too.
pub(crate) fn finalize(
    grammar: &Grammar,
    path: &Path,
    bindings: &mut HashMap<usize, Binding>,
    bus: &BindingBus,
) -> Result<(), ParseError> {
    let reachable = reachable_fields(grammar, path);
    let sequence = build_sequence(grammar, path, &reachable);

    fire_phase(grammar, &sequence, Phase::BeforeReset, bindings, bus)?;
    fire_phase(grammar, &sequence, Phase::BeforeResolve, bindings, bus)?;
    resolve_values(grammar, &reachable, bindings, bus)?;
    fire_phase(grammar, &sequence, Phase::BeforeApply, bindings, bus)?;
    fire_phase(grammar, &sequence, Phase::AfterApply, bindings, bus)?;

    check_enums(grammar, &reachable, bindings)?;
    check_missing_positionals(grammar, path, bindings)?;
    check_constraints(grammar, &reachable, bindings)?;
    run_validators(grammar, &sequence, bindings, bus)?;
    check_missing_command(grammar, path)?;
    Ok(())
}

fn deepest_node(grammar: &Grammar, path: &Path) -> NodeId {
    path.iter()
        .rev()
        .find_map(PathElement::node)
        .unwrap_or(grammar.root())
}

/// Fields in scope of the selected path: flags, positionals, and branch
/// keys of every node on the scope chain, in field-arena order.
pub(crate) fn reachable_fields(grammar: &Grammar, path: &Path) -> Vec<FieldId> {
    let mut ids = BTreeSet::new();
    for node_id in grammar.scope_chain(deepest_node(grammar, path)) {
        let node = grammar.node(node_id);
        for field in node.flags.iter().chain(&node.positionals).chain(&node.branch_key) {
            ids.insert(field.0);
        }
    }
    ids.into_iter().map(FieldId).collect()
}

/// The hook traversal order: path elements first, then reachable fields
/// that never made it into the path (unparsed flags and positionals that
/// may still receive resolved or default values).
fn build_sequence(grammar: &Grammar, path: &Path, reachable: &[FieldId]) -> Vec<SeqItem> {
    let mut seen_fields = HashSet::new();
    let mut sequence = Vec::new();

    for element in path {
        let kind = element.element_kind(grammar);
        let at = element.display(grammar);
        match element {
            PathElement::App { node, .. } => sequence.push(SeqItem {
                kind,
                name: grammar.node(*node).name.clone(),
                at,
                node: Some(*node),
                field: None,
            }),
            PathElement::Command { node, .. } => sequence.push(SeqItem {
                kind,
                name: grammar.node(*node).name.clone(),
                at,
                node: Some(*node),
                field: None,
            }),
            PathElement::ArgumentBranch { node, .. } => {
                let key = grammar.node(*node).branch_key;
                if let Some(field) = key {
                    seen_fields.insert(field.0);
                }
                sequence.push(SeqItem {
                    kind,
                    name: grammar.node(*node).name.clone(),
                    at,
                    node: Some(*node),
                    field: key,
                });
            }
            PathElement::Positional { field, .. } | PathElement::Flag { field, .. } => {
                seen_fields.insert(field.0);
                sequence.push(SeqItem {
                    kind,
                    name: grammar.field(*field).name.clone(),
                    at,
                    node: None,
                    field: Some(*field),
                });
            }
        }
    }

    for field in reachable {
        if seen_fields.contains(&field.0) {
            continue;
        }
        let spec = grammar.field(*field);
        sequence.push(SeqItem {
            kind: if spec.positional {
                ElementKind::Positional
            } else {
                ElementKind::Flag
            },
            name: spec.name.clone(),
            at: Some(spec.display()),
            node: None,
            field: Some(*field),
        });
    }
    sequence
}

fn hook_error(at: &Option<String>, err: BoxedError) -> ParseError {
    ParseError::Hook {
        at: at.clone(),
        message: err.to_string(),
    }
}

fn fire_phase(
    grammar: &Grammar,
    sequence: &[SeqItem],
    phase: Phase,
    bindings: &HashMap<usize, Binding>,
    bus: &BindingBus,
) -> Result<(), ParseError> {
    for item in sequence {
        // Apply-phase hooks only fire for fields that actually receive a
        // value; reset/resolve phases observe every reachable field.
        if matches!(phase, Phase::BeforeApply | Phase::AfterApply) {
            if let Some(field) = item.field {
                if !bindings.contains_key(&field.0) {
                    continue;
                }
            }
        }
        // The applied value is only observable once it has been applied.
        let value = match (phase, item.field) {
            (Phase::AfterApply, Some(field)) => bindings.get(&field.0).map(|b| &b.value),
            _ => None,
        };
        let args = HookArgs {
            kind: item.kind,
            name: item.name.as_str(),
            value,
            bus,
        };
        for (hook_phase, hook) in &grammar.hooks.observers {
            if *hook_phase == phase {
                hook(&args).map_err(|e| hook_error(&item.at, e))?;
            }
        }
        if let Some(field) = item.field {
            if let Some(hooks) = grammar.hooks.field_hooks.get(&(field.0, phase)) {
                for hook in hooks {
                    hook(&args).map_err(|e| hook_error(&item.at, e))?;
                }
            }
        }
    }
    Ok(())
}

// ─── Resolution ─────────────────────────────────────────────────────────────

fn resolve_values(
    grammar: &Grammar,
    reachable: &[FieldId],
    bindings: &mut HashMap<usize, Binding>,
    bus: &BindingBus,
) -> Result<(), ParseError> {
    for &field in reachable {
        if bindings.contains_key(&field.0) {
            continue;
        }
        let spec = grammar.field(field);

        let mut raw = None;
        for resolver in &grammar.resolvers {
            match resolver.resolve(spec, bus) {
                Ok(Some(value)) => {
                    raw = Some((value, Origin::Resolved));
                    break;
                }
                Ok(None) => {}
                Err(err) => return Err(hook_error(&Some(spec.display()), err)),
            }
        }
        if raw.is_none() {
            if let Some(default) = &spec.default {
                raw = Some((default.clone(), Origin::Defaulted));
            }
        }

        if let Some((value, origin)) = raw {
            let decoded = grammar.decoders[field.0].decode(&spec.display(), &value)?;
            bindings.insert(field.0, Binding {
                value: decoded,
                origin,
            });
        }
    }
    Ok(())
}

// ─── Validation ─────────────────────────────────────────────────────────────

fn check_enums(
    grammar: &Grammar,
    reachable: &[FieldId],
    bindings: &HashMap<usize, Binding>,
) -> Result<(), ParseError> {
    for &field in reachable {
        let spec = grammar.field(field);
        if spec.enum_values.is_empty() {
            continue;
        }
        let Some(binding) = bindings.get(&field.0) else {
            continue;
        };
        let rendered: Vec<String> = match &binding.value {
            Value::List(items) => items.iter().map(Value::render).collect(),
            other => vec![other.render()],
        };
        for got in rendered {
            if !spec.enum_values.contains(&got) {
                return Err(ParseError::InvalidEnum {
                    at: spec.display(),
                    allowed: spec.enum_values.clone(),
                    got,
                });
            }
        }
    }
    Ok(())
}

fn check_missing_positionals(
    grammar: &Grammar,
    path: &Path,
    bindings: &HashMap<usize, Binding>,
) -> Result<(), ParseError> {
    let node = grammar.node(deepest_node(grammar, path));
    let placeholders: Vec<String> = node
        .positionals
        .iter()
        .filter(|field| {
            let spec = grammar.field(**field);
            !spec.optional && !bindings.contains_key(&field.0)
        })
        .map(|field| grammar.field(*field).display())
        .collect();
    if placeholders.is_empty() {
        Ok(())
    } else {
        Err(ParseError::MissingPositionals { placeholders })
    }
}

/// Group membership over the reachable fields, in first-appearance order.
fn group_map(
    grammar: &Grammar,
    reachable: &[FieldId],
    pick: fn(&FieldSpec) -> &Vec<String>,
) -> Vec<(String, Vec<FieldId>)> {
    let mut order: Vec<(String, Vec<FieldId>)> = Vec::new();
    for &field in reachable {
        for tag in pick(grammar.field(field)) {
            match order.iter_mut().find(|(name, _)| name == tag) {
                Some((_, members)) => members.push(field),
                None => order.push((tag.clone(), vec![field])),
            }
        }
    }
    order
}

fn check_constraints(
    grammar: &Grammar,
    reachable: &[FieldId],
    bindings: &HashMap<usize, Binding>,
) -> Result<(), ParseError> {
    let set = |field: &FieldId| {
        bindings
            .get(&field.0)
            .is_some_and(|b| matches!(b.origin, Origin::Parsed | Origin::Resolved))
    };
    let valued = |field: &FieldId| bindings.contains_key(&field.0);

    let xor_groups = group_map(grammar, reachable, |s| &s.xor);
    let and_groups = group_map(grammar, reachable, |s| &s.and);

    // Violations: at most one member of an xor group may be set; an and
    // group is all-or-none.
    let mut violations = Vec::new();
    let mut seen_pairs = HashSet::new();
    for (_, members) in &xor_groups {
        let set_members: Vec<&FieldId> = members.iter().filter(|f| set(f)).collect();
        if set_members.len() >= 2 {
            let pair = (set_members[0].0, set_members[1].0);
            if seen_pairs.insert(pair) {
                violations.push(ParseError::XorConflict {
                    first: grammar.field(*set_members[0]).display(),
                    second: grammar.field(*set_members[1]).display(),
                });
            }
        }
    }
    for (_, members) in &and_groups {
        let set_count = members.iter().filter(|f| set(f)).count();
        if set_count > 0 && set_count < members.len() {
            violations.push(ParseError::AndIncomplete {
                members: members.iter().map(|f| grammar.field(*f).display()).collect(),
            });
        }
    }
    if let Some(err) = ParseError::combined(violations) {
        return Err(err);
    }

    // Required aggregation, grouped by xor ("or") and and ("and").
    let unsatisfied: Vec<FieldId> = reachable
        .iter()
        .filter(|f| grammar.field(**f).required && !valued(f))
        .copied()
        .collect();
    if unsatisfied.is_empty() {
        return Ok(());
    }

    let mut entries = BTreeSet::new();
    for field in &unsatisfied {
        let spec = grammar.field(*field);
        let mut grouped = false;
        for tag in &spec.xor {
            grouped = true;
            let members = &xor_groups.iter().find(|(name, _)| name == tag).unwrap().1;
            // A set member satisfies the whole xor group.
            if members.iter().any(|f| set(f)) {
                continue;
            }
            let missing: Vec<String> = members
                .iter()
                .filter(|f| grammar.field(**f).required && !valued(f))
                .map(|f| grammar.field(*f).display())
                .collect();
            entries.insert(missing.join(" or "));
        }
        for tag in &spec.and {
            grouped = true;
            let members = &and_groups.iter().find(|(name, _)| name == tag).unwrap().1;
            let missing: Vec<String> = members
                .iter()
                .filter(|f| !valued(f))
                .map(|f| grammar.field(*f).display())
                .collect();
            entries.insert(missing.join(" and "));
        }
        if !grouped {
            entries.insert(spec.display());
        }
    }
    if entries.is_empty() {
        return Ok(());
    }
    Err(ParseError::MissingFlags {
        entries: entries.into_iter().collect(),
    })
}

fn run_validators(
    grammar: &Grammar,
    sequence: &[SeqItem],
    bindings: &HashMap<usize, Binding>,
    bus: &BindingBus,
) -> Result<(), ParseError> {
    for item in sequence {
        let value = item.field.and_then(|f| bindings.get(&f.0)).map(|b| &b.value);
        let args = HookArgs {
            kind: item.kind,
            name: item.name.as_str(),
            value,
            bus,
        };
        if let Some(node) = item.node {
            if let Some(hooks) = grammar.hooks.node_validators.get(&node.0) {
                for hook in hooks {
                    hook(&args).map_err(|e| hook_error(&item.at, e))?;
                }
            }
        }
        // Field validators only see fields that ended up with a value.
        if let Some(field) = item.field {
            if bindings.contains_key(&field.0) {
                if let Some(hooks) = grammar.hooks.field_validators.get(&field.0) {
                    for hook in hooks {
                        hook(&args).map_err(|e| hook_error(&item.at, e))?;
                    }
                }
            }
        }
    }
    Ok(())
}

fn check_missing_command(grammar: &Grammar, path: &Path) -> Result<(), ParseError> {
    let node = grammar.node(deepest_node(grammar, path));
    let selection_needed = !node.children.is_empty()
        || node
            .branches
            .iter()
            .any(|b| !grammar.node(*b).optional);
    if !selection_needed {
        return Ok(());
    }
    let expected: Vec<String> = node
        .children
        .iter()
        .map(|c| grammar.node(*c).name.clone())
        .chain(
            node.branches
                .iter()
                .map(|b| format!("<{}>", grammar.node(*b).name)),
        )
        .collect();
    Err(ParseError::MissingCommand { expected })
}
