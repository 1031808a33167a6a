//! The parse state machine.
//!
//! A context-sensitive recursive-descent walker: at each node it matches
//! the next token against the flags visible in the scope stack, the node's
//! positional schedule, child commands, branching arguments, and the
//! default child, in that order. Token consumption builds the selected
//! [`Path`] and stages decoded values; the resolver/constraint/hook
//! pipeline in [`crate::resolve`] runs afterwards.

mod path;

pub use path::{Path, PathElement};

use crate::context::{Binding, Context, Origin};
use crate::decode::Value;
use crate::grammar::{Grammar, NodeId};
use crate::resolve;
use crate::scan::{Token, TokenKind, TokenScanner};
use crate::schema::FieldId;
use argot_diagnostics::ParseError;
use argot_schema::Passthrough;
use std::collections::{HashMap, HashSet};

/// Drive a full parse. With `trace` set, user errors are recorded in the
/// returned context instead of aborting; trace mode stops after token
/// consumption and does not run resolution or hooks.
pub(crate) fn run<'g, S: AsRef<str>>(
    grammar: &'g Grammar,
    args: &[S],
    trace: bool,
) -> Result<Context<'g>, ParseError> {
    let mut walker = Walker {
        grammar,
        scan: TokenScanner::new(args),
        path: vec![PathElement::App {
            node: grammar.root(),
            next: 0,
        }],
        staged: HashMap::new(),
        flag_elements: HashSet::new(),
        literal_rest: false,
    };
    let outcome = walker.walk(grammar.root());

    let raw_args = walker.scan.raw().to_vec();
    let bus = grammar.base_bindings.clone();
    let mut bindings: HashMap<usize, Binding> = walker
        .staged
        .into_iter()
        .map(|(id, value)| {
            (
                id,
                Binding {
                    value,
                    origin: Origin::Parsed,
                },
            )
        })
        .collect();

    match outcome {
        Err(err) if trace => {
            return Ok(Context::new(
                grammar,
                raw_args,
                walker.path,
                bindings,
                bus,
                Some(err),
            ));
        }
        Err(err) => return Err(err),
        Ok(()) => {}
    }

    if trace {
        return Ok(Context::new(
            grammar, raw_args, walker.path, bindings, bus, None,
        ));
    }

    resolve::finalize(grammar, &walker.path, &mut bindings, &bus)?;
    Ok(Context::new(
        grammar, raw_args, walker.path, bindings, bus, None,
    ))
}

enum Step {
    Continue,
    Descend(NodeId),
    Done,
}

struct Walker<'g> {
    grammar: &'g Grammar,
    scan: TokenScanner,
    path: Path,
    staged: HashMap<usize, Value>,
    flag_elements: HashSet<usize>,
    literal_rest: bool,
}

impl<'g> Walker<'g> {
    fn walk(&mut self, node: NodeId) -> Result<(), ParseError> {
        if self.grammar.node(node).passthrough {
            self.capture_node(node);
            return Ok(());
        }
        let mut pos_idx = 0usize;
        loop {
            match self.step(node, &mut pos_idx)? {
                Step::Continue => {}
                Step::Descend(child) => return self.walk(child),
                Step::Done => return Ok(()),
            }
        }
    }

    fn step(&mut self, node: NodeId, pos_idx: &mut usize) -> Result<Step, ParseError> {
        let Some(token) = self.scan.pop() else {
            return self.end_of_input(node);
        };
        if !self.literal_rest {
            match token.kind {
                TokenKind::EndOfFlags => {
                    // A pending passthrough positional captures the `--`
                    // verbatim; otherwise it toggles literal-rest mode.
                    if let Some(field) = self.pending_passthrough(node, *pos_idx, true) {
                        self.capture_from(field, token);
                        return Ok(Step::Continue);
                    }
                    self.literal_rest = true;
                    return Ok(Step::Continue);
                }
                TokenKind::Long => return self.long_flag(node, token, *pos_idx),
                TokenKind::Short => return self.short_flag(node, token, *pos_idx),
                _ => {}
            }
        }
        self.positional_token(node, pos_idx, token)
    }

    // ── Flags ───────────────────────────────────────────────────────────

    fn long_flag(&mut self, node: NodeId, token: Token, pos_idx: usize) -> Result<Step, ParseError> {
        let (name, attached) = {
            let (n, a) = token.split_long();
            (n.to_string(), a.map(str::to_string))
        };
        if let Some((field, negated)) = self.find_long(node, &name) {
            self.consume_flag(field, negated, attached)?;
            return Ok(Step::Continue);
        }
        if let Some(field) = self.pending_passthrough(node, pos_idx, false) {
            self.capture_from(field, token);
            return Ok(Step::Continue);
        }
        Err(ParseError::UnknownFlag {
            flag: format!("--{name}"),
        })
    }

    fn short_flag(
        &mut self,
        node: NodeId,
        token: Token,
        pos_idx: usize,
    ) -> Result<Step, ParseError> {
        let body = token.short_body().to_string();
        // Short tokens have at least one letter after the dash.
        let letter = body.chars().next().unwrap();
        let rest = &body[letter.len_utf8()..];

        let Some(field) = self.find_short(node, letter) else {
            if let Some(field) = self.pending_passthrough(node, pos_idx, false) {
                self.capture_from(field, token);
                return Ok(Step::Continue);
            }
            return Err(ParseError::UnknownFlag {
                flag: format!("-{letter}"),
            });
        };

        let spec = self.grammar.field(field);
        if spec.kind.is_bool() && spec.decoder_key.is_none() {
            // Boolean shorts bundle: the remainder is more short flags.
            self.stage(field, Value::Bool(true));
            self.record_flag_element(field);
            if !rest.is_empty() {
                self.scan.push_front(Token {
                    text: format!("-{rest}"),
                    kind: TokenKind::Short,
                    raw_index: token.raw_index,
                });
            }
        } else {
            // A value-consuming short takes the remainder as its value.
            let attached = (!rest.is_empty()).then(|| rest.to_string());
            self.consume_flag(field, false, attached)?;
        }
        Ok(Step::Continue)
    }

    fn find_long(&self, node: NodeId, name: &str) -> Option<(FieldId, bool)> {
        for field in self.grammar.flags_in_scope(node) {
            let spec = self.grammar.field(field);
            if spec.name == name || spec.aliases.iter().any(|a| a == name) {
                return Some((field, false));
            }
            if spec.negation.as_deref() == Some(name) {
                return Some((field, true));
            }
        }
        None
    }

    fn find_short(&self, node: NodeId, letter: char) -> Option<FieldId> {
        self.grammar
            .flags_in_scope(node)
            .into_iter()
            .find(|field| self.grammar.field(*field).short == Some(letter))
    }

    fn consume_flag(
        &mut self,
        field: FieldId,
        negated: bool,
        attached: Option<String>,
    ) -> Result<(), ParseError> {
        let spec = self.grammar.field(field);
        let display = spec.display();
        let value = if spec.kind.is_bool() && spec.decoder_key.is_none() {
            // `--flag` true, `--no-flag` false; an attached `=false`
            // arithmetically inverts the entry form.
            let parsed = match &attached {
                Some(raw) => self.grammar.decoders[field.0]
                    .decode(&display, raw)?
                    .as_bool()
                    .unwrap_or(true),
                None => true,
            };
            Value::Bool(parsed != negated)
        } else {
            let raw = match attached {
                Some(raw) => raw,
                None => self.pop_flag_value(&display)?,
            };
            self.grammar.decoders[field.0].decode(&display, &raw)?
        };
        self.stage(field, value);
        self.record_flag_element(field);
        Ok(())
    }

    fn pop_flag_value(&mut self, display: &str) -> Result<String, ParseError> {
        let acceptable = match self.scan.peek() {
            Some(t) if matches!(t.kind, TokenKind::Positional | TokenKind::Value) => true,
            Some(t) if t.is_flag_like() => self.grammar.hyphen_prefixed_values,
            _ => false,
        };
        if acceptable {
            Ok(self.scan.pop().unwrap().text)
        } else {
            Err(ParseError::MissingValue {
                flag: display.to_string(),
            })
        }
    }

    // ── Positionals, commands, branches, defaults ───────────────────────

    fn positional_token(
        &mut self,
        node: NodeId,
        pos_idx: &mut usize,
        token: Token,
    ) -> Result<Step, ParseError> {
        let node_ref = self.grammar.node(node);

        if let Some(&field) = node_ref.positionals.get(*pos_idx) {
            let spec = self.grammar.field(field);
            if spec.passthrough != Passthrough::Off {
                self.capture_from(field, token);
                return Ok(Step::Continue);
            }
            let value = self.grammar.decoders[field.0].decode(&spec.display(), &token.text)?;
            if spec.cumulative() {
                // A cumulative positional greedily takes every remaining
                // non-flag token; the schedule does not advance.
                let first = !self.staged.contains_key(&field.0);
                self.stage(field, value);
                if first {
                    self.push_positional(field);
                }
            } else {
                self.stage(field, value);
                self.push_positional(field);
                *pos_idx += 1;
            }
            return Ok(Step::Continue);
        }

        // Child commands by name (skipped in literal-rest mode).
        if !self.literal_rest {
            let child = node_ref
                .children
                .iter()
                .find(|c| self.grammar.node(**c).name == token.text)
                .copied();
            if let Some(child) = child {
                self.path.push(PathElement::Command {
                    node: child,
                    next: self.scan.cursor(),
                });
                return Ok(Step::Descend(child));
            }
        }

        // Branching arguments: the first branch whose key decodes wins.
        let mut branch_err = None;
        for &branch in &node_ref.branches {
            // Branch nodes always carry a key.
            let key = self.grammar.node(branch).branch_key.unwrap();
            let spec = self.grammar.field(key);
            match self.grammar.decoders[key.0].decode(&spec.display(), &token.text) {
                Ok(value) => {
                    self.stage(key, value);
                    self.path.push(PathElement::ArgumentBranch {
                        node: branch,
                        next: self.scan.cursor(),
                    });
                    return Ok(Step::Descend(branch));
                }
                Err(err) => {
                    branch_err.get_or_insert(err);
                }
            }
        }

        // Default child: descend with the token unconsumed. A fallback
        // default owns nothing, so the token fails inside it; a withargs
        // default may consume it as its own argument or flag.
        if let Some(child) = node_ref.default_child {
            self.scan.push_front(token);
            self.path.push(PathElement::Command {
                node: child,
                next: self.scan.cursor(),
            });
            return Ok(Step::Descend(child));
        }

        if let Some(err) = branch_err {
            return Err(err);
        }
        Err(ParseError::UnexpectedArgument { token: token.text })
    }

    fn end_of_input(&mut self, node: NodeId) -> Result<Step, ParseError> {
        if let Some(child) = self.grammar.node(node).default_child {
            self.path.push(PathElement::Command {
                node: child,
                next: self.scan.cursor(),
            });
            return Ok(Step::Descend(child));
        }
        Ok(Step::Done)
    }

    // ── Passthrough capture ─────────────────────────────────────────────

    /// The node's next positional, when it is a passthrough field able to
    /// start capturing here. Unknown flags only start a capture in `all`
    /// mode; plain tokens and `--` start one in either mode.
    fn pending_passthrough(
        &self,
        node: NodeId,
        pos_idx: usize,
        include_partial: bool,
    ) -> Option<FieldId> {
        let field = *self.grammar.node(node).positionals.get(pos_idx)?;
        match self.grammar.field(field).passthrough {
            Passthrough::Off => None,
            Passthrough::Partial => include_partial.then_some(field),
            Passthrough::All => Some(field),
        }
    }

    /// Capture `first` and every remaining token verbatim.
    fn capture_from(&mut self, field: FieldId, first: Token) {
        let mut items = vec![Value::String(first.text)];
        while let Some(token) = self.scan.pop() {
            items.push(Value::String(token.text));
        }
        self.stage(field, Value::List(items));
        self.push_positional(field);
    }

    /// Passthrough command: everything after the command name is captured
    /// verbatim into its single list positional.
    fn capture_node(&mut self, node: NodeId) {
        let field = self.grammar.node(node).positionals[0];
        let mut items = Vec::new();
        while let Some(token) = self.scan.pop() {
            items.push(Value::String(token.text));
        }
        if !items.is_empty() {
            self.stage(field, Value::List(items));
            self.push_positional(field);
        }
    }

    // ── Staging ─────────────────────────────────────────────────────────

    fn stage(&mut self, field: FieldId, value: Value) {
        let cumulative = self.grammar.field(field).cumulative();
        match self.staged.remove(&field.0) {
            Some(existing) if cumulative => {
                self.staged.insert(field.0, existing.merged(value));
            }
            _ => {
                self.staged.insert(field.0, value);
            }
        }
    }

    fn push_positional(&mut self, field: FieldId) {
        self.path.push(PathElement::Positional {
            field,
            next: self.scan.cursor(),
        });
    }

    fn record_flag_element(&mut self, field: FieldId) {
        if self.flag_elements.insert(field.0) {
            self.path.push(PathElement::Flag {
                field,
                next: self.scan.cursor(),
            });
        }
    }
}
