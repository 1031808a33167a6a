//! Grammar compilation.
//!
//! [`GrammarBuilder`] walks a [`RecordDesc`], interprets every field through
//! the schema introspector, assembles the node arena, and enforces all
//! structural rules before producing an immutable [`Grammar`]. The builder
//! is fail-fast: the first violation aborts the build.

use crate::context::Context;
use crate::decode::{Decoder, DecoderRegistry};
use crate::grammar::interpolate::interpolate;
use crate::grammar::{DefaultMode, Grammar, Node, NodeId, NodeKind};
use crate::hooks::{BindingBus, HookArgs, HookSet, Phase};
use crate::resolve::Resolver;
use crate::schema::{self, FieldId, FieldSpec, FieldShape, Inherited};
use argot_diagnostics::{BoxedError, BuildError};
use argot_schema::{FieldDesc, Passthrough, RecordDesc, ValueKind, kebab_case};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Builds a [`Grammar`] from a declarative description.
pub struct GrammarBuilder {
    app_name: String,
    desc: RecordDesc,
    vars: BTreeMap<String, String>,
    registry: DecoderRegistry,
    resolvers: Vec<Box<dyn Resolver>>,
    observers: Vec<(Phase, Box<dyn Fn(&HookArgs) -> Result<(), BoxedError>>)>,
    field_hooks: Vec<(String, Phase, Box<dyn Fn(&HookArgs) -> Result<(), BoxedError>>)>,
    validators: Vec<(String, Box<dyn Fn(&HookArgs) -> Result<(), BoxedError>>)>,
    actions: Vec<(String, Box<dyn Fn(&Context) -> Result<(), BoxedError>>)>,
    after_run: Vec<(String, Box<dyn Fn(&Context) -> Result<(), BoxedError>>)>,
    bindings: BindingBus,
    hyphen_prefixed_values: bool,
}

impl GrammarBuilder {
    /// Start building a grammar for an application named `app_name`.
    pub fn new(app_name: &str, desc: RecordDesc) -> Self {
        Self {
            app_name: app_name.to_string(),
            desc,
            vars: BTreeMap::new(),
            registry: DecoderRegistry::new(),
            resolvers: Vec::new(),
            observers: Vec::new(),
            field_hooks: Vec::new(),
            validators: Vec::new(),
            actions: Vec::new(),
            after_run: Vec::new(),
            bindings: BindingBus::new(),
            hyphen_prefixed_values: false,
        }
    }

    /// Define an interpolation variable usable as `${name}` in tag values.
    pub fn var(mut self, name: &str, value: &str) -> Self {
        self.vars.insert(name.to_string(), value.to_string());
        self
    }

    /// Register a named decoder, selectable with the `type` tag.
    pub fn decoder(mut self, key: &str, decoder: Arc<dyn Decoder>) -> Self {
        self.registry.register(key, decoder);
        self
    }

    /// Append a resolver to the chain consulted for unset fields.
    pub fn resolver<R: Resolver + 'static>(mut self, resolver: R) -> Self {
        self.resolvers.push(Box::new(resolver));
        self
    }

    /// Register a global observer fired for every path element at `phase`.
    pub fn observer<F>(mut self, phase: Phase, hook: F) -> Self
    where
        F: Fn(&HookArgs) -> Result<(), BoxedError> + 'static,
    {
        self.observers.push((phase, Box::new(hook)));
        self
    }

    /// Register a per-field hook. The selector addresses the field
    /// (`"--flag"`, `"user create <id>"`, `"user --verbose"`).
    pub fn hook_at<F>(mut self, phase: Phase, selector: &str, hook: F) -> Self
    where
        F: Fn(&HookArgs) -> Result<(), BoxedError> + 'static,
    {
        self.field_hooks
            .push((selector.to_string(), phase, Box::new(hook)));
        self
    }

    /// Register a `Validate` hook on a node or field. An empty selector
    /// addresses the application root.
    pub fn validate_at<F>(mut self, selector: &str, hook: F) -> Self
    where
        F: Fn(&HookArgs) -> Result<(), BoxedError> + 'static,
    {
        self.validators.push((selector.to_string(), Box::new(hook)));
        self
    }

    /// Attach the action dispatched when the addressed node is the deepest
    /// selected command.
    pub fn action_at<F>(mut self, selector: &str, action: F) -> Self
    where
        F: Fn(&Context) -> Result<(), BoxedError> + 'static,
    {
        self.actions.push((selector.to_string(), Box::new(action)));
        self
    }

    /// Attach an `AfterRun` hook fired after the action returns, ascending
    /// the selected path.
    pub fn after_run_at<F>(mut self, selector: &str, hook: F) -> Self
    where
        F: Fn(&Context) -> Result<(), BoxedError> + 'static,
    {
        self.after_run.push((selector.to_string(), Box::new(hook)));
        self
    }

    /// Seed the binding bus with a value injectable into hooks and actions.
    pub fn bind<T: Any>(mut self, value: T) -> Self {
        self.bindings.insert(value);
        self
    }

    /// Allow `-`-prefixed tokens as values of flags awaiting one.
    pub fn hyphen_prefixed_values(mut self, enabled: bool) -> Self {
        self.hyphen_prefixed_values = enabled;
        self
    }

    /// Compile the grammar, enforcing every structural rule.
    pub fn build(self) -> Result<Grammar, BuildError> {
        let mut state = BuildState {
            nodes: Vec::new(),
            fields: Vec::new(),
        };
        let root = state.push_node(None, NodeKind::Application, &self.app_name, &self.app_name);
        let record = self.desc.clone();
        state.build_record(root, &record, &Inherited::root(&self.app_name))?;

        state.check_node_shapes()?;
        state.check_flag_scopes()?;
        state.check_group_overlap()?;
        state.interpolate_tags(&self.vars)?;

        let mut decoders = Vec::with_capacity(state.fields.len());
        for spec in &state.fields {
            decoders.push(self.registry.for_field(spec)?);
        }

        let mut hooks = HookSet::default();
        for (phase, hook) in self.observers {
            hooks.observers.push((phase, hook));
        }
        for (selector, phase, hook) in self.field_hooks {
            match state.resolve_selector(&selector)? {
                Target::Field(id) => hooks
                    .field_hooks
                    .entry((id.0, phase))
                    .or_default()
                    .push(hook),
                Target::Node(_) => {
                    return Err(BuildError::UnknownSelector { selector });
                }
            }
        }
        for (selector, hook) in self.validators {
            match state.resolve_selector(&selector)? {
                Target::Field(id) => hooks.field_validators.entry(id.0).or_default().push(hook),
                Target::Node(id) => hooks.node_validators.entry(id.0).or_default().push(hook),
            }
        }
        for (selector, action) in self.actions {
            match state.resolve_selector(&selector)? {
                Target::Node(id) => {
                    hooks.actions.insert(id.0, action);
                }
                Target::Field(_) => return Err(BuildError::UnknownSelector { selector }),
            }
        }
        for (selector, hook) in self.after_run {
            match state.resolve_selector(&selector)? {
                Target::Node(id) => {
                    hooks.after_run.insert(id.0, hook);
                }
                Target::Field(_) => return Err(BuildError::UnknownSelector { selector }),
            }
        }

        Ok(Grammar {
            nodes: state.nodes,
            fields: state.fields,
            decoders,
            hooks,
            resolvers: self.resolvers,
            base_bindings: self.bindings,
            hyphen_prefixed_values: self.hyphen_prefixed_values,
        })
    }
}

// ─── Build state ────────────────────────────────────────────────────────────

enum Target {
    Node(NodeId),
    Field(FieldId),
}

struct BuildState {
    nodes: Vec<Node>,
    fields: Vec<FieldSpec>,
}

impl BuildState {
    fn push_node(&mut self, parent: Option<NodeId>, kind: NodeKind, name: &str, path: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            parent,
            kind,
            name: name.to_string(),
            path: path.to_string(),
            help: String::new(),
            children: Vec::new(),
            branches: Vec::new(),
            positionals: Vec::new(),
            flags: Vec::new(),
            branch_key: None,
            default_child: None,
            default_mode: None,
            passthrough: false,
            optional: false,
        });
        id
    }

    fn push_field(&mut self, spec: FieldSpec) -> FieldId {
        let id = FieldId(self.fields.len());
        self.fields.push(spec);
        id
    }

    // ── Tree assembly ───────────────────────────────────────────────────

    fn build_record(
        &mut self,
        node: NodeId,
        record: &RecordDesc,
        inherited: &Inherited,
    ) -> Result<(), BuildError> {
        for desc in &record.fields {
            match schema::classify(desc)? {
                FieldShape::Excluded => {}
                FieldShape::Flag => {
                    let spec = FieldSpec::from_desc(desc, inherited, false)?;
                    let id = self.push_field(spec);
                    self.nodes[node.0].flags.push(id);
                }
                FieldShape::Positional => {
                    let spec = FieldSpec::from_desc(desc, inherited, true)?;
                    let id = self.push_field(spec);
                    self.nodes[node.0].positionals.push(id);
                }
                FieldShape::Embed => {
                    let child_ctx = inherited.through_embed(desc);
                    // `record` is Some by classification.
                    self.build_record(node, desc.record.as_ref().unwrap(), &child_ctx)?;
                }
                FieldShape::Command => {
                    self.build_command(node, desc, inherited)?;
                }
                FieldShape::Branch => {
                    self.build_branch(node, desc, inherited)?;
                }
            }
        }
        Ok(())
    }

    fn build_command(
        &mut self,
        parent: NodeId,
        desc: &FieldDesc,
        inherited: &Inherited,
    ) -> Result<(), BuildError> {
        let path = inherited.child_path(&desc.ident);
        if !schema::node_tags_only(&desc.tags) {
            return Err(BuildError::InvalidTag {
                path,
                detail: "tag not valid on commands".into(),
            });
        }
        let name = desc
            .tags
            .name
            .clone()
            .unwrap_or_else(|| kebab_case(&desc.ident));
        let child = self.push_node(Some(parent), NodeKind::Command, &name, &path);
        self.nodes[child.0].help = desc.tags.help.clone().unwrap_or_default();
        self.nodes[child.0].passthrough = desc.tags.passthrough != Passthrough::Off;
        self.nodes[parent.0].children.push(child);

        if let Some(marker) = &desc.tags.default {
            let mode = if marker == "withargs" {
                DefaultMode::WithArgs
            } else {
                DefaultMode::Fallback
            };
            if self.nodes[parent.0].default_child.is_some() {
                return Err(BuildError::MultipleDefaultCommands {
                    path,
                    parent: format!("{} <command>", self.nodes[parent.0].name),
                });
            }
            self.nodes[parent.0].default_child = Some(child);
            self.nodes[parent.0].default_mode = Some(mode);
        }

        let child_ctx = inherited.through_node(desc);
        self.build_record(child, desc.record.as_ref().unwrap(), &child_ctx)
    }

    fn build_branch(
        &mut self,
        parent: NodeId,
        desc: &FieldDesc,
        inherited: &Inherited,
    ) -> Result<(), BuildError> {
        let path = inherited.child_path(&desc.ident);
        let name = desc
            .tags
            .name
            .clone()
            .unwrap_or_else(|| kebab_case(&desc.ident));
        let record = desc.record.as_ref().unwrap();

        let Some(key_desc) = record.fields.first() else {
            return Err(BuildError::BranchKeyMissing { path });
        };
        if schema::classify(key_desc)? != FieldShape::Positional {
            return Err(BuildError::BranchKeyMissing { path });
        }

        let child = self.push_node(Some(parent), NodeKind::ArgumentBranch, &name, &path);
        self.nodes[child.0].help = desc.tags.help.clone().unwrap_or_default();
        self.nodes[child.0].optional = desc.tags.optional;
        self.nodes[parent.0].branches.push(child);

        let child_ctx = inherited.through_node(desc);
        let key_spec = FieldSpec::from_desc(key_desc, &child_ctx, true)?;
        if key_spec.name == name {
            return Err(BuildError::BranchKeyDuplicatesName { path, name });
        }
        let key_id = self.push_field(key_spec);
        self.nodes[child.0].branch_key = Some(key_id);

        let rest = RecordDesc {
            fields: record.fields[1..].to_vec(),
        };
        self.build_record(child, &rest, &child_ctx)
    }

    // ── Structural validation ───────────────────────────────────────────

    fn node_summary(&self, id: NodeId) -> String {
        let node = &self.nodes[id.0];
        let mut out = node.name.clone();
        for field_id in &node.positionals {
            let field = &self.fields[field_id.0];
            if field.cumulative() && field.optional {
                out.push_str(&format!(" [<{}> ...]", field.name));
            } else if field.optional {
                out.push_str(&format!(" [<{}>]", field.name));
            } else {
                out.push_str(&format!(" <{}>", field.name));
            }
        }
        if !node.children.is_empty() || !node.branches.is_empty() {
            out.push_str(" <command>");
        }
        if !node.flags.is_empty() {
            out.push_str(" [flags]");
        }
        out
    }

    fn check_node_shapes(&self) -> Result<(), BuildError> {
        for node in &self.nodes {
            // Positionals cannot coexist with child commands, except that a
            // branch node's own key lives outside its positional schedule.
            if !node.positionals.is_empty()
                && (!node.children.is_empty() || !node.branches.is_empty())
            {
                return Err(BuildError::MixedPositionalsAndCommands {
                    path: node.path.clone(),
                });
            }

            // Positional ordering rules.
            let mut seen_optional = false;
            for (i, field_id) in node.positionals.iter().enumerate() {
                let field = &self.fields[field_id.0];
                if field.optional {
                    seen_optional = true;
                } else if seen_optional {
                    return Err(BuildError::RequiredAfterOptional {
                        path: field.path.clone(),
                    });
                }
                if field.cumulative() && i + 1 != node.positionals.len() {
                    return Err(BuildError::CumulativeNotLast {
                        path: field.path.clone(),
                    });
                }
            }

            // Default-command rules.
            if let (Some(child), Some(DefaultMode::Fallback)) =
                (node.default_child, node.default_mode)
            {
                let target = &self.nodes[child.0];
                if !target.positionals.is_empty()
                    || !target.children.is_empty()
                    || !target.branches.is_empty()
                {
                    return Err(BuildError::DefaultCommandOwnsChildren {
                        path: target.path.clone(),
                        display: self.node_summary(child),
                    });
                }
            }

            // Passthrough-command rules.
            if node.passthrough {
                if !node.children.is_empty() || !node.branches.is_empty() || !node.flags.is_empty()
                {
                    return Err(BuildError::PassthroughCommandShape {
                        path: node.path.clone(),
                        display: self.node_summary(node.id),
                    });
                }
                let ok = node.positionals.len() == 1
                    && matches!(
                        self.fields[node.positionals[0].0].kind.unwrapped(),
                        ValueKind::List(e) if **e == ValueKind::String
                    );
                if !ok {
                    return Err(BuildError::PassthroughCommandArgType {
                        path: node.path.clone(),
                        display: self.node_summary(node.id),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_flag_scopes(&self) -> Result<(), BuildError> {
        self.check_scope(NodeId(0), &HashMap::new(), &HashMap::new())
    }

    fn check_scope(
        &self,
        node: NodeId,
        longs: &HashMap<String, FieldId>,
        shorts: &HashMap<char, FieldId>,
    ) -> Result<(), BuildError> {
        let mut longs = longs.clone();
        let mut shorts = shorts.clone();
        for field_id in &self.nodes[node.0].flags {
            let field = &self.fields[field_id.0];
            for name in field.long_names() {
                if longs.insert(name.to_string(), *field_id).is_some() {
                    return Err(if field.negation.as_deref() == Some(name) {
                        BuildError::DuplicateNegation {
                            path: field.path.clone(),
                            name: name.to_string(),
                        }
                    } else {
                        BuildError::DuplicateFlag {
                            path: field.path.clone(),
                            name: name.to_string(),
                        }
                    });
                }
            }
            if let Some(short) = field.short {
                if shorts.insert(short, *field_id).is_some() {
                    return Err(BuildError::DuplicateShort {
                        path: field.path.clone(),
                        short,
                    });
                }
            }
        }
        for child in self.nodes[node.0]
            .children
            .iter()
            .chain(&self.nodes[node.0].branches)
        {
            self.check_scope(*child, &longs, &shorts)?;
        }
        Ok(())
    }

    fn check_group_overlap(&self) -> Result<(), BuildError> {
        // A single (xor, and) tag pair may not overlap in more than one
        // field, which would make the combined constraint ambiguous.
        let mut pairs: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
        for field in &self.fields {
            for x in &field.xor {
                for a in &field.and {
                    pairs
                        .entry((x.clone(), a.clone()))
                        .or_default()
                        .push(field.name.clone());
                }
            }
        }
        for ((xor, and), fields) in pairs {
            if fields.len() > 1 {
                return Err(BuildError::XorAndOverlap { xor, and, fields });
            }
        }
        Ok(())
    }

    // ── Interpolation ───────────────────────────────────────────────────

    fn interpolate_tags(&mut self, vars: &BTreeMap<String, String>) -> Result<(), BuildError> {
        let plain = |name: &str| vars.get(name).cloned();
        for field in &mut self.fields {
            let path = field.path.clone();
            let fail = |name: String| BuildError::UnresolvedInterpolation {
                path: path.clone(),
                name,
            };

            if let Some(default) = &field.default {
                field.default = Some(interpolate(default, &plain).map_err(fail)?);
            }
            for value in &mut field.enum_values {
                *value = interpolate(value, &plain).map_err(fail)?;
            }
            for var in &mut field.env {
                *var = interpolate(var, &plain).map_err(fail)?;
            }
            if let Some(placeholder) = &field.placeholder {
                field.placeholder = Some(interpolate(placeholder, &plain).map_err(fail)?);
            }

            // Help may reference ${default}, which resolves to the field's
            // computed default.
            let computed_default = field.default.clone();
            let help_lookup = |name: &str| {
                if name == "default" {
                    computed_default.clone().or_else(|| Some(String::new()))
                } else {
                    vars.get(name).cloned()
                }
            };
            field.help = interpolate(&field.help, &help_lookup).map_err(fail)?;
        }

        for node in &mut self.nodes {
            let path = node.path.clone();
            node.help = interpolate(&node.help, &plain).map_err(|name| {
                BuildError::UnresolvedInterpolation { path, name }
            })?;
        }
        Ok(())
    }

    // ── Selector resolution ─────────────────────────────────────────────

    /// Resolve a selector like `"user create --verbose"` or `"cmd <id>"` to
    /// a node or field. The empty selector addresses the application root.
    fn resolve_selector(&self, selector: &str) -> Result<Target, BuildError> {
        let unknown = || BuildError::UnknownSelector {
            selector: selector.to_string(),
        };
        let mut current = NodeId(0);
        let parts: Vec<&str> = selector.split_whitespace().collect();
        for (i, part) in parts.iter().enumerate() {
            let last = i + 1 == parts.len();
            if let Some(name) = part.strip_prefix("--") {
                if !last {
                    return Err(unknown());
                }
                // Search the scope chain so ancestor flags are addressable
                // from descendant selectors.
                let mut cursor = Some(current);
                while let Some(node) = cursor {
                    for field_id in &self.nodes[node.0].flags {
                        if self.fields[field_id.0].long_names().any(|n| n == name) {
                            return Ok(Target::Field(*field_id));
                        }
                    }
                    cursor = self.nodes[node.0].parent;
                }
                return Err(unknown());
            }
            if let Some(name) = part.strip_prefix('<').and_then(|p| p.strip_suffix('>')) {
                if !last {
                    return Err(unknown());
                }
                let node = &self.nodes[current.0];
                for field_id in node.positionals.iter().chain(&node.branch_key) {
                    if self.fields[field_id.0].name == name {
                        return Ok(Target::Field(*field_id));
                    }
                }
                return Err(unknown());
            }
            let node = &self.nodes[current.0];
            let child = node
                .children
                .iter()
                .chain(&node.branches)
                .find(|id| self.nodes[id.0].name == *part);
            match child {
                Some(id) => current = *id,
                None => return Err(unknown()),
            }
        }
        Ok(Target::Node(current))
    }
}
