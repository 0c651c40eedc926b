//! Declaration walker and call grouper.
//!
//! Transforms the raw syntax tree into four outputs: the ordered
//! passthrough-statement list, the custom decoder rules, the (currently
//! unused) aggregate declarations, and the call-group forest. Every
//! declaration is tagged with the conditional-compilation context active at
//! its site so the emitter can reproduce the same guards around generated
//! code.

use crate::ast::{self, Node};
use crate::diagnostic::Diagnostics;
use crate::model::{Model, ModelError, TypeClass, TypeId};
use crate::options::GenOptions;
use crate::source::Location;
use crate::{StringId, IOCTL_PREFIX, VARIANT_SEP};
use log::debug;
use thin_vec::ThinVec;
use thiserror::Error;

/// A passthrough preprocessor-style statement with its condition stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub text: String,
    pub conds: ThinVec<StringId>,
    pub loc: Location,
}

/// A custom decoder rule with a resolved pattern type.
#[derive(Debug, Clone)]
pub struct DecoderRule {
    pub pattern: TypeId,
    pub format: String,
    pub conds: ThinVec<StringId>,
    pub loc: Location,
}

/// A resolved call declaration.
#[derive(Debug, Clone)]
pub struct CallDecl {
    pub name: StringId,
    pub args: ThinVec<Argument>,
    pub ret: Option<TypeId>,
    /// Whether the call uses ioctl-style argument numbering.
    pub is_ioctl: bool,
    pub conds: ThinVec<StringId>,
    pub loc: Location,
}

/// One resolved call argument. `const_backing` is filled by the grouping
/// pass for constant-typed arguments whose parent declares the real
/// representation; types themselves stay immutable.
#[derive(Debug, Clone)]
pub struct Argument {
    pub name: StringId,
    pub ty: TypeId,
    pub const_backing: Option<TypeId>,
}

/// A node of the variant hierarchy; `call` indexes [`Output::calls`].
#[derive(Debug, Clone)]
pub struct CallGroup {
    pub call: usize,
    pub children: Vec<CallGroup>,
}

/// Everything the walker and grouper produce for the emitter.
#[derive(Debug)]
pub struct Output {
    pub statements: Vec<Statement>,
    pub rules: Vec<DecoderRule>,
    pub aggregates: Vec<ast::AggregateNode>,
    pub calls: Vec<CallDecl>,
    pub groups: Vec<CallGroup>,
}

impl Output {
    /// Flattens the group forest back to call names in pre-order.
    pub fn flatten_names(&self) -> Vec<StringId> {
        fn visit(out: &Output, group: &CallGroup, names: &mut Vec<StringId>) {
            names.push(out.calls[group.call].name);
            for child in &group.children {
                visit(out, child, names);
            }
        }
        let mut names = Vec::new();
        for group in &self.groups {
            visit(self, group, &mut names);
        }
        names
    }
}

/// Preprocessing errors. All of these are fatal for the run.
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("{source}")]
    Resolve {
        #[source]
        source: ModelError,
        loc: Location,
    },
    #[error("conditional nesting exceeds limit of {limit}")]
    ConditionTooDeep { limit: usize, loc: Location },
    #[error("too many call declarations (limit {limit})")]
    TooManyCalls { limit: usize, loc: Location },
}

impl PreprocessError {
    pub fn location(&self) -> Location {
        match *self {
            PreprocessError::Resolve { loc, .. } => loc,
            PreprocessError::ConditionTooDeep { loc, .. } => loc,
            PreprocessError::TooManyCalls { loc, .. } => loc,
        }
    }
}

/// Walks the syntax tree and groups call names into a variant hierarchy.
pub struct Preprocessor<'a> {
    model: &'a mut Model,
    diag: &'a mut Diagnostics,
    opts: GenOptions,
    cond_stack: Vec<StringId>,
    statements: Vec<Statement>,
    rules: Vec<DecoderRule>,
    aggregates: Vec<ast::AggregateNode>,
    calls: Vec<CallDecl>,
}

impl<'a> Preprocessor<'a> {
    pub fn new(model: &'a mut Model, diag: &'a mut Diagnostics, opts: GenOptions) -> Self {
        Self {
            model,
            diag,
            opts,
            cond_stack: Vec::new(),
            statements: Vec::new(),
            rules: Vec::new(),
            aggregates: Vec::new(),
            calls: Vec::new(),
        }
    }

    /// Runs the tree walk and the grouping pass.
    pub fn process(mut self, root: &Node) -> Result<Output, PreprocessError> {
        self.walk(root)?;
        debug!(
            "walked {} statements, {} rules, {} calls",
            self.statements.len(),
            self.rules.len(),
            self.calls.len()
        );
        let groups = self.group_calls();
        Ok(Output {
            statements: self.statements,
            rules: self.rules,
            aggregates: self.aggregates,
            calls: self.calls,
            groups,
        })
    }

    fn conditions(&self) -> ThinVec<StringId> {
        self.cond_stack.iter().copied().collect()
    }

    fn resolve(&mut self, expr: &ast::TypeExpr, loc: Location) -> Result<TypeId, PreprocessError> {
        self.model
            .resolve_expr(expr)
            .map_err(|source| PreprocessError::Resolve { source, loc })
    }

    fn walk(&mut self, node: &Node) -> Result<(), PreprocessError> {
        match node {
            Node::Sequence(children) => {
                for child in children {
                    self.walk(child)?;
                }
            }
            Node::Conditional(block) => {
                if self.cond_stack.len() >= self.opts.max_cond_depth {
                    return Err(PreprocessError::ConditionTooDeep {
                        limit: self.opts.max_cond_depth,
                        loc: block.loc,
                    });
                }
                self.cond_stack.push(block.guard);
                for child in &block.body {
                    self.walk(child)?;
                }
                self.cond_stack.pop();
            }
            Node::Rule(rule) => {
                let pattern = self.resolve(&rule.pattern, rule.loc)?;
                self.rules.push(DecoderRule {
                    pattern,
                    format: rule.format.trim_end().to_string(),
                    conds: self.conditions(),
                    loc: rule.loc,
                });
            }
            Node::Statement(stmt) => {
                self.statements.push(Statement {
                    text: stmt.text.clone(),
                    conds: self.conditions(),
                    loc: stmt.loc,
                });
            }
            Node::Call(call) => {
                if self.calls.len() >= self.opts.max_calls {
                    return Err(PreprocessError::TooManyCalls {
                        limit: self.opts.max_calls,
                        loc: call.loc,
                    });
                }
                let mut args = ThinVec::with_capacity(call.args.len());
                for arg in &call.args {
                    args.push(Argument {
                        name: arg.name,
                        ty: self.resolve(&arg.ty, call.loc)?,
                        const_backing: None,
                    });
                }
                let ret = match &call.ret {
                    Some(expr) => Some(self.resolve(expr, call.loc)?),
                    None => None,
                };
                let is_ioctl = call
                    .name
                    .as_str()
                    .strip_prefix(IOCTL_PREFIX)
                    .is_some_and(|rest| rest.starts_with(VARIANT_SEP));
                self.calls.push(CallDecl {
                    name: call.name,
                    args,
                    ret,
                    is_ioctl,
                    conds: self.conditions(),
                    loc: call.loc,
                });
            }
            Node::Aggregate(agg) => {
                if let Some(prev) = self.model.declare_aggregate(agg.name, agg.loc) {
                    self.diag.report(
                        format!(
                            "duplicate declaration of \"{}\" (first declared at {})",
                            agg.name, prev.loc
                        ),
                        agg.loc,
                    );
                }
                self.aggregates.push(agg.clone());
            }
        }
        Ok(())
    }

    // ----- grouping -----

    /// Sorts the flat call buffer by name and partitions it into a forest
    /// of variant groups.
    fn group_calls(&mut self) -> Vec<CallGroup> {
        let mut order: Vec<usize> = (0..self.calls.len()).collect();
        order.sort_by_key(|&i| self.calls[i].name.as_str());

        let mut groups = Vec::new();
        let mut i = 0;
        while i < order.len() {
            let (group, used) = self.group_at(&order, i, None);
            groups.push(group);
            i += used;
        }
        groups
    }

    /// Builds the group rooted at `order[start]` and returns it together
    /// with the number of buffer entries consumed, so the caller can
    /// advance past the whole subtree.
    fn group_at(&mut self, order: &[usize], start: usize, parent: Option<usize>) -> (CallGroup, usize) {
        let base = order[start];
        if let Some(parent) = parent {
            self.inherit_const_backing(parent, base);
        }
        let base_name = self.calls[base].name.as_str();
        let base_len = base_name.len();

        let mut children = Vec::new();
        let mut i = start + 1;
        while i < order.len() {
            let cand = order[i];
            let cand_name = self.calls[cand].name.as_str();
            if !cand_name.starts_with(base_name) {
                break;
            }
            match cand_name.rfind(VARIANT_SEP) {
                // Direct child: "base‖sep‖suffix" with no deeper separator.
                Some(p) if p == base_len => {
                    let (child, used) = self.group_at(order, i, Some(base));
                    children.push(child);
                    i += used;
                }
                // The variant point sits inside our own name: the candidate
                // belongs to an ancestor group.
                Some(p) if p < base_len => break,
                // Deeper variant whose immediate parent was not declared.
                Some(_) => {
                    let loc = self.calls[cand].loc;
                    self.diag.report(
                        format!("call \"{}\" has no declared parent variant", cand_name),
                        loc,
                    );
                    i += 1;
                }
                // A name that merely extends the base with no separator is
                // an independent call; sorting places every true variant
                // before it.
                None => break,
            }
        }
        (CallGroup { call: base, children }, i - start)
    }

    /// For every argument position shared with the parent, a constant-typed
    /// child argument inherits its real representation: the parent's
    /// backing type if the parent argument is itself constant, the parent's
    /// type otherwise. Deeply nested variants thereby resolve to the
    /// original non-constant representation several levels up.
    fn inherit_const_backing(&mut self, parent: usize, child: usize) {
        let shared = self.calls[parent]
            .args
            .len()
            .min(self.calls[child].args.len());
        for pos in 0..shared {
            let parent_arg = &self.calls[parent].args[pos];
            let parent_is_const = matches!(self.model.ty(parent_arg.ty).class, TypeClass::Const);
            let parent_backing = parent_arg.const_backing;
            let parent_ty = parent_arg.ty;

            let child_arg = &self.calls[child].args[pos];
            if !matches!(self.model.ty(child_arg.ty).class, TypeClass::Const) {
                continue;
            }
            self.calls[child].args[pos].const_backing = if parent_is_const {
                parent_backing
            } else {
                Some(parent_ty)
            };
        }
    }
}
