//! Code emitter.
//!
//! Consumes the grouped, typed model and produces one textual output file:
//! a decoding routine per leaf call and a dispatcher routine per internal
//! variant group, each wrapped in the condition-stack guards of its
//! declaration site.
//!
//! The generated code targets a strace-style decoding runtime and assumes
//! its vocabulary exists: `entering`/`exiting` phase predicates,
//! `tcp->u_arg[i]` / `tcp->u_rval` slots, `tprintf`/`tprints`,
//! `printflags`/`printxval`, `printaddr`, `printstr`, `umove`, and the
//! scoped `set_tcb_priv_data`/`get_tcb_priv_data` per-call storage with
//! automatic release.

use crate::diagnostic::Diagnostics;
use crate::model::{BasicClass, Dir, Model, OptId, Repr, TypeClass, TypeId, TypeOption};
use crate::options::GenOptions;
use crate::preprocess::{CallDecl, CallGroup, Output};
use crate::source::Location;
use crate::{StringId, VARIANT_SEP};
use hashbrown::HashMap;
use log::debug;

/// Whether code is being emitted for the call's entry (before the
/// underlying operation runs) or its exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Entering,
    Exiting,
}

/// Marker expression embedded where a value could not be resolved; the
/// generated file fails loudly at its own compile time, only there.
pub const UNRESOLVED_VALUE: &str = "tracegen_unresolved_value";
/// Intentionally undefined macro marking an unsupported printer.
pub const UNSUPPORTED_MACRO: &str = "TRACEGEN_UNSUPPORTED_TYPE";
/// Intentionally undefined macro marking a documented unsupported case.
pub const UNIMPLEMENTED_MACRO: &str = "TRACEGEN_UNIMPLEMENTED";

fn mangle(name: &str) -> String {
    name.replace(VARIANT_SEP, "_")
}

fn print_spec(class: BasicClass) -> (&'static str, &'static str) {
    match class {
        BasicClass::Unsigned => ("%llu", "unsigned long long"),
        _ => ("%lld", "long long"),
    }
}

/// Emits the generated source file for one preprocessed description.
pub struct Emitter<'a> {
    model: &'a Model,
    diag: &'a mut Diagnostics,
    out: &'a Output,
    opts: GenOptions,
    buf: String,
    indent: usize,
}

impl<'a> Emitter<'a> {
    pub fn new(model: &'a Model, diag: &'a mut Diagnostics, out: &'a Output, opts: GenOptions) -> Self {
        Self {
            model,
            diag,
            out,
            opts,
            buf: String::new(),
            indent: 1,
        }
    }

    /// Produces the full output file: banner, fixed prelude, passthrough
    /// statements, then the call-group forest (children before parents).
    pub fn emit(mut self, input_name: &str) -> String {
        self.buf.push_str(&format!(
            "/* Generated by tracegen from {}; do not edit. */\n\n",
            input_name
        ));
        self.buf.push_str("#include \"defs.h\"\n#include \"xmalloc.h\"\n\n");
        self.buf
            .push_str("typedef kernel_ulong_t tracegen_word_t;\n\n");

        let out = self.out;
        for stmt in &out.statements {
            self.open_guards(&stmt.conds);
            self.buf.push_str(&stmt.text);
            self.buf.push('\n');
            self.close_guards(&stmt.conds);
        }
        if !out.statements.is_empty() {
            self.buf.push('\n');
        }

        for group in &out.groups {
            self.emit_group(group);
        }
        debug!("emitted {} bytes", self.buf.len());
        self.buf
    }

    fn line(&mut self, extra: usize, text: &str) {
        if !text.is_empty() {
            for _ in 0..self.indent + extra {
                self.buf.push('\t');
            }
            self.buf.push_str(text);
        }
        self.buf.push('\n');
    }

    fn open_guards(&mut self, conds: &[StringId]) {
        for guard in conds {
            self.buf.push_str(&format!("#if {}\n", guard));
        }
    }

    fn close_guards(&mut self, conds: &[StringId]) {
        for _ in conds {
            self.buf.push_str("#endif\n");
        }
    }

    fn params(call: &CallDecl) -> &'static str {
        if call.is_ioctl {
            "struct tcb *tcp, unsigned int code, kernel_ulong_t arg"
        } else {
            "struct tcb *tcp"
        }
    }

    fn pass_args(call: &CallDecl) -> &'static str {
        if call.is_ioctl {
            "tcp, code, arg"
        } else {
            "tcp"
        }
    }

    // ----- value-expression resolution -----

    /// Run-time storage slot of one argument position. ioctl-style calls
    /// only expose the request code and the argument word to their
    /// decoders; anything else is out of bounds.
    fn arg_slot(&mut self, call: &CallDecl, index: usize) -> String {
        if call.is_ioctl {
            match index {
                1 => "code".to_string(),
                2 => "arg".to_string(),
                _ => {
                    self.diag.report(
                        format!(
                            "argument {} of \"{}\" is outside the ioctl pseudo-arguments",
                            index, call.name
                        ),
                        call.loc,
                    );
                    UNRESOLVED_VALUE.to_string()
                }
            }
        } else {
            format!("tcp->u_arg[{}]", index)
        }
    }

    /// Textual value of one type option in the context of `call`: literal
    /// numbers keep their source spelling, names resolve to the return
    /// value or an argument slot.
    fn resolve_value(&mut self, call: &CallDecl, opt: OptId) -> String {
        let model = self.model;
        match *model.opt(opt) {
            TypeOption::Number { text, .. } => text.as_str().to_string(),
            TypeOption::Type(ty) => {
                let name = model.ty(ty).name;
                if name.as_str() == "retval" {
                    return "tcp->u_rval".to_string();
                }
                if let Some(pos) = call.args.iter().position(|a| a.name == name) {
                    return self.arg_slot(call, pos);
                }
                self.diag.report(
                    format!("unknown argument \"{}\" in \"{}\"", name, call.name),
                    call.loc,
                );
                UNRESOLVED_VALUE.to_string()
            }
            _ => {
                self.diag.report(
                    format!("cannot resolve option value in \"{}\"", call.name),
                    call.loc,
                );
                UNRESOLVED_VALUE.to_string()
            }
        }
    }

    /// Name or number text of an option, for flag-set names and labels.
    fn option_text(&self, opt: OptId) -> Option<String> {
        match *self.model.opt(opt) {
            TypeOption::Number { text, .. } => Some(text.as_str().to_string()),
            TypeOption::Type(_) => self.model.plain_name(opt).map(|n| n.as_str().to_string()),
            _ => None,
        }
    }

    // ----- template substitution -----

    /// Pairs `pattern` against `actual` with a bounded explicit-stack walk,
    /// capturing the value of every placeholder position, then rewrites the
    /// format string: `$$` becomes the argument value, `$<id>` a captured
    /// value, both parenthesized. Placeholder ids are scoped to one call.
    fn substitute(
        &mut self,
        call: &CallDecl,
        pattern: TypeId,
        actual: TypeId,
        format: &str,
        value: &str,
        loc: Location,
    ) -> String {
        let model = self.model;
        let mut captures: HashMap<u32, String> = HashMap::new();
        let mut stack = vec![(pattern, actual)];
        let mut budget = self.opts.max_subst_pairs;

        while let Some((p, a)) = stack.pop() {
            if budget == 0 {
                self.diag.report(
                    format!(
                        "template walk exceeds limit of {} type pairs",
                        self.opts.max_subst_pairs
                    ),
                    loc,
                );
                break;
            }
            budget -= 1;

            let (tp, ta) = (model.ty(p), model.ty(a));
            if tp.name != ta.name {
                continue;
            }
            for (&po, &ao) in tp.options.iter().zip(ta.options.iter()) {
                match (*model.opt(po), *model.opt(ao)) {
                    (TypeOption::Template(id), _) => {
                        // captured once per walk
                        if !captures.contains_key(&id) {
                            let captured = self.resolve_value(call, ao);
                            captures.insert(id, captured);
                        }
                    }
                    (TypeOption::Type(pt), TypeOption::Type(at)) => {
                        if model.ty(pt).options.len() == model.ty(at).options.len() {
                            stack.push((pt, at));
                        }
                    }
                    // any other mismatch stops descending this branch
                    _ => {}
                }
            }
        }

        let mut rewritten = String::new();
        let mut chars = format.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '$' {
                rewritten.push(c);
                continue;
            }
            match chars.peek() {
                Some('$') => {
                    chars.next();
                    rewritten.push('(');
                    rewritten.push_str(value);
                    rewritten.push(')');
                }
                Some(d) if d.is_ascii_digit() => {
                    let mut id: u32 = 0;
                    while let Some(v) = chars.peek().and_then(|d| d.to_digit(10)) {
                        id = id * 10 + v;
                        chars.next();
                    }
                    match captures.get(&id) {
                        Some(captured) => {
                            rewritten.push('(');
                            rewritten.push_str(captured);
                            rewritten.push(')');
                        }
                        None => self
                            .diag
                            .report(format!("unresolved substitution id ${}", id), loc),
                    }
                }
                _ => rewritten.push('$'),
            }
        }
        rewritten
    }

    // ----- printer dispatch -----

    fn emit_printer(
        &mut self,
        call: &CallDecl,
        arg_name: StringId,
        value: &str,
        phase: Phase,
        ty: TypeId,
        saved: bool,
    ) {
        let model = self.model;
        let out = self.out;

        // custom decoder rules win; first match in declaration order
        if let Some(rule) = out.rules.iter().find(|r| model.matches(r.pattern, ty)) {
            let text = self.substitute(call, rule.pattern, ty, &rule.format, value, rule.loc);
            self.line(0, &format!("{};", text));
            return;
        }

        match model.ty(ty).class {
            TypeClass::Basic => self.emit_basic_printer(call, value, ty),
            TypeClass::Const => {
                let backing = call
                    .args
                    .iter()
                    .find(|a| a.name == arg_name)
                    .and_then(|a| a.const_backing);
                match backing {
                    Some(backing) => self.emit_printer(call, arg_name, value, phase, backing, saved),
                    None => self.diag.report(
                        format!(
                            "constant argument \"{}\" of \"{}\" has no backing type",
                            arg_name, call.name
                        ),
                        call.loc,
                    ),
                }
            }
            TypeClass::Ptr { dir, pointee } => {
                self.emit_ptr_printer(call, value, phase, dir, pointee, saved)
            }
            TypeClass::XorFlags { .. } | TypeClass::OrFlags { .. } => {
                let t = model.ty(ty);
                let set_name = self.option_text(t.options[0]).unwrap_or_default();
                let label = self.option_text(t.options[1]).unwrap_or_default();
                let printer = if matches!(t.class, TypeClass::XorFlags { .. }) {
                    "printxval"
                } else {
                    "printflags"
                };
                self.line(0, &format!("{}({}, {}, \"{}\");", printer, set_name, value, label));
            }
            TypeClass::Ref => {
                self.diag.report(
                    format!(
                        "argument \"{}\" of \"{}\" has an unprintable reference type",
                        arg_name, call.name
                    ),
                    call.loc,
                );
                self.line(0, &format!("{}({});", UNSUPPORTED_MACRO, value));
            }
        }
    }

    fn emit_basic_printer(&mut self, call: &CallDecl, value: &str, ty: TypeId) {
        let model = self.model;
        let name = model.ty(ty).name;
        match model.target_repr(ty) {
            Some(Repr::Basic(basic)) => match basic.class {
                BasicClass::Str => {
                    // direction is required to decode a string; it must be
                    // behind a pointer
                    self.diag.report(
                        format!(
                            "string-like type \"{}\" in \"{}\" must be wrapped in a pointer",
                            name, call.name
                        ),
                        call.loc,
                    );
                    self.line(0, &format!("{}({});", UNSUPPORTED_MACRO, value));
                }
                class => {
                    let (fmt, cast) = print_spec(class);
                    self.line(0, &format!("tprintf(\"{}\", ({}) ({}));", fmt, cast, value));
                }
            },
            _ => {
                self.diag.report(
                    format!("no printer for type \"{}\" in \"{}\"", name, call.name),
                    call.loc,
                );
                self.line(0, &format!("{}({});", UNSUPPORTED_MACRO, value));
            }
        }
    }

    /// Decode-and-print for a pointer argument. Only runs when the phase
    /// matches the direction (inbound/both decode on entry, outbound/both
    /// on exit); on a failed target-memory read prints the address and
    /// stops. With `saved`, the preserved pre-call value prints first.
    fn emit_ptr_printer(
        &mut self,
        call: &CallDecl,
        value: &str,
        phase: Phase,
        dir: Dir,
        pointee: TypeId,
        saved: bool,
    ) {
        let decode_now = match phase {
            Phase::Entering => dir.contains(Dir::IN),
            Phase::Exiting => dir.contains(Dir::OUT),
        };
        if !decode_now {
            return;
        }
        let model = self.model;
        match model.target_repr(pointee) {
            Some(Repr::Basic(basic)) if basic.class == BasicClass::Str => {
                self.line(0, &format!("printstr(tcp, {});", value));
            }
            Some(Repr::Basic(basic)) => {
                let ctype = basic.ctype.clone();
                let (fmt, cast) = print_spec(basic.class);
                self.line(0, "{");
                self.line(1, &format!("{} tmp;", ctype));
                if saved {
                    self.line(1, &format!("{} *saved = get_tcb_priv_data(tcp);", ctype));
                }
                self.line(1, "");
                self.line(1, &format!("if (umove(tcp, {}, &tmp) < 0) {{", value));
                self.line(2, &format!("printaddr({});", value));
                self.line(1, "} else {");
                self.line(2, "tprints(\"[\");");
                if saved {
                    self.line(2, "if (saved) {");
                    self.line(3, &format!("tprintf(\"{}\", ({}) *saved);", fmt, cast));
                    self.line(3, "tprints(\" => \");");
                    self.line(2, "}");
                }
                self.line(2, &format!("tprintf(\"{}\", ({}) tmp);", fmt, cast));
                self.line(2, "tprints(\"]\");");
                self.line(1, "}");
                self.line(0, "}");
            }
            _ => {
                let name = model.ty(pointee).name;
                self.diag.report(
                    format!(
                        "no decoder for pointee type \"{}\" in \"{}\"",
                        name, call.name
                    ),
                    call.loc,
                );
                self.line(0, &format!("{}({});", UNSUPPORTED_MACRO, value));
            }
        }
    }

    // ----- decoder-body synthesis -----

    fn return_stmt(&self, call: &CallDecl) -> String {
        let flag = call.ret.and_then(|ty| match self.model.target_repr(ty) {
            Some(Repr::Basic(basic)) => basic.rval_flag.clone(),
            _ => None,
        });
        match flag {
            Some(flag) => format!("return RVAL_DECODED | {};", flag),
            None => "return RVAL_DECODED;".to_string(),
        }
    }

    /// Decodes the pre-call value of an inout pointer into a heap
    /// allocation attached to the trace context, so it survives until the
    /// exit phase. Returns false when the pointee has no known
    /// representation to snapshot.
    fn emit_snapshot(&mut self, call: &CallDecl, index: usize, pointee: TypeId) -> bool {
        let model = self.model;
        let ctype = match model.target_repr(pointee) {
            Some(Repr::Basic(basic)) if basic.class != BasicClass::Str => basic.ctype.clone(),
            Some(Repr::Aggregate(name)) => format!("struct {}", name),
            _ => return false,
        };
        let value = self.arg_slot(call, index);
        self.line(0, "{");
        self.line(1, &format!("{} *saved = xmalloc(sizeof(*saved));", ctype));
        self.line(1, "");
        self.line(1, &format!("if (umove(tcp, {}, saved) < 0)", value));
        self.line(2, "free(saved);");
        self.line(1, "else");
        self.line(2, "set_tcb_priv_data(tcp, saved, free);");
        self.line(0, "}");
        true
    }

    /// Body of one decoding routine. Decoded arguments exclude the first
    /// two positions of ioctl-style calls, which the ioctl entry point
    /// handles itself.
    fn emit_call_decoder(&mut self, call: &CallDecl) {
        let model = self.model;
        let start = if call.is_ioctl { 2 } else { 0 }.min(call.args.len());
        let len = call.args.len();

        let outs: Vec<usize> = (start..len)
            .filter(|&i| {
                matches!(model.ty(call.args[i].ty).class,
                         TypeClass::Ptr { dir, .. } if dir.contains(Dir::OUT))
            })
            .collect();
        let ret = self.return_stmt(call);

        match outs.len() {
            0 => {
                if start < len {
                    self.line(0, "if (entering(tcp)) {");
                    self.indent += 1;
                    for (k, i) in (start..len).enumerate() {
                        if k > 0 {
                            self.line(0, "tprints(\", \");");
                        }
                        let value = self.arg_slot(call, i);
                        self.emit_printer(
                            call,
                            call.args[i].name,
                            &value,
                            Phase::Entering,
                            call.args[i].ty,
                            false,
                        );
                    }
                    self.indent -= 1;
                    self.line(0, "}");
                }
                self.line(0, &ret);
            }
            1 => {
                let split = outs[0];
                let (dir, pointee) = match model.ty(call.args[split].ty).class {
                    TypeClass::Ptr { dir, pointee } => (dir, pointee),
                    _ => unreachable!("out position is always a pointer"),
                };

                self.line(0, "if (entering(tcp)) {");
                self.indent += 1;
                for i in start..split {
                    let value = self.arg_slot(call, i);
                    self.emit_printer(
                        call,
                        call.args[i].name,
                        &value,
                        Phase::Entering,
                        call.args[i].ty,
                        false,
                    );
                    self.line(0, "tprints(\", \");");
                }
                let mut saved = false;
                if dir == Dir::INOUT {
                    saved = self.emit_snapshot(call, split, pointee);
                }
                self.line(0, "return 0;");
                self.indent -= 1;
                self.line(0, "}");

                let value = self.arg_slot(call, split);
                self.emit_printer(
                    call,
                    call.args[split].name,
                    &value,
                    Phase::Exiting,
                    call.args[split].ty,
                    saved,
                );
                for i in split + 1..len {
                    self.line(0, "tprints(\", \");");
                    let value = self.arg_slot(call, i);
                    self.emit_printer(
                        call,
                        call.args[i].name,
                        &value,
                        Phase::Exiting,
                        call.args[i].ty,
                        false,
                    );
                }
                self.line(0, &ret);
            }
            // documented limitation: no multi-out-pointer strategy
            _ => {
                self.diag.report(
                    format!("\"{}\" has more than one out pointer", call.name),
                    call.loc,
                );
                self.line(
                    0,
                    &format!("{}(\"{}: more than one out pointer\");", UNIMPLEMENTED_MACRO, call.name),
                );
            }
        }
    }

    // ----- variant dispatcher synthesis -----

    /// Comparison tests for one dispatcher child: every constant-typed
    /// argument contributes an equality or inclusive range test.
    fn dispatch_tests(&mut self, child: &CallDecl) -> Vec<String> {
        let model = self.model;
        let mut tests = Vec::new();
        for (i, arg) in child.args.iter().enumerate() {
            if !matches!(model.ty(arg.ty).class, TypeClass::Const) {
                continue;
            }
            let slot = self.arg_slot(child, i);
            let value_opt = model.ty(arg.ty).options[0];
            match *model.opt(value_opt) {
                TypeOption::Range { min, max } => {
                    let lo = self.resolve_value(child, min);
                    let hi = self.resolve_value(child, max);
                    tests.push(format!(
                        "{slot} >= (kernel_ulong_t) ({lo}) && {slot} <= (kernel_ulong_t) ({hi})"
                    ));
                }
                _ => {
                    let value = self.resolve_value(child, value_opt);
                    tests.push(format!("{slot} == (kernel_ulong_t) ({value})"));
                }
            }
        }
        tests
    }

    fn emit_group(&mut self, group: &CallGroup) {
        let out = self.out;
        for child in &group.children {
            self.emit_group(child);
        }

        let call = &out.calls[group.call];
        let mangled = mangle(call.name.as_str());
        let is_variant = call.name.as_str().contains(VARIANT_SEP);

        if group.children.is_empty() {
            self.open_guards(&call.conds);
            if is_variant {
                self.buf.push_str(&format!(
                    "static int\nvariant_leaf_{}({})\n{{\n",
                    mangled,
                    Self::params(call)
                ));
            } else {
                self.buf.push_str(&format!("SYS_FUNC({})\n{{\n", call.name));
            }
            self.emit_call_decoder(call);
            self.buf.push_str("}\n");
            self.close_guards(&call.conds);
            self.buf.push('\n');
            return;
        }

        self.open_guards(&call.conds);

        // the group's own base behavior, reachable as the dispatch fallback
        self.buf.push_str(&format!(
            "static int\nvariant_leaf_{}({})\n{{\n",
            mangled,
            Self::params(call)
        ));
        self.emit_call_decoder(call);
        self.buf.push_str("}\n\n");

        if is_variant {
            self.buf.push_str(&format!(
                "static int\nvariant_{}({})\n{{\n",
                mangled,
                Self::params(call)
            ));
        } else {
            self.buf.push_str(&format!("SYS_FUNC({})\n{{\n", call.name));
        }

        let forwards_ioctl = !call.is_ioctl
            && group
                .children
                .iter()
                .any(|c| out.calls[c.call].is_ioctl);
        if forwards_ioctl {
            self.line(0, "const unsigned int code = tcp->u_arg[1];");
            self.line(0, "const kernel_ulong_t arg = tcp->u_arg[2];");
            self.line(0, "");
        }

        for child_group in &group.children {
            let child = &out.calls[child_group.call];
            let target = if child_group.children.is_empty() {
                format!("variant_leaf_{}", mangle(child.name.as_str()))
            } else {
                format!("variant_{}", mangle(child.name.as_str()))
            };
            let extra = Self::extra_guards(&call.conds, &child.conds);
            self.open_guards(extra);
            let tests = self.dispatch_tests(child);
            if tests.is_empty() {
                self.line(0, &format!("return {}({});", target, Self::pass_args(child)));
            } else {
                self.line(0, &format!("if ({})", tests.join(" && ")));
                self.line(1, &format!("return {}({});", target, Self::pass_args(child)));
            }
            self.close_guards(extra);
        }
        self.line(
            0,
            &format!("return variant_leaf_{}({});", mangled, Self::pass_args(call)),
        );
        self.buf.push_str("}\n");
        self.close_guards(&call.conds);
        self.buf.push('\n');
    }

    /// Guards active on the child but not already opened by the parent
    /// routine's own stack.
    fn extra_guards<'c>(parent: &[StringId], child: &'c [StringId]) -> &'c [StringId] {
        let common = parent
            .iter()
            .zip(child.iter())
            .take_while(|(a, b)| a == b)
            .count();
        &child[common..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;
    use crate::preprocess::Argument;
    use crate::test_utils::sid;
    use thin_vec::{thin_vec, ThinVec};

    fn empty_output() -> Output {
        Output {
            statements: Vec::new(),
            rules: Vec::new(),
            aggregates: Vec::new(),
            calls: Vec::new(),
            groups: Vec::new(),
        }
    }

    fn test_call(model: &mut Model) -> CallDecl {
        let int32 = model.resolve(sid("int32"), ThinVec::new()).unwrap();
        CallDecl {
            name: sid("futex"),
            args: thin_vec![
                Argument {
                    name: sid("uaddr"),
                    ty: int32,
                    const_backing: None,
                },
                Argument {
                    name: sid("op"),
                    ty: int32,
                    const_backing: None,
                },
            ],
            ret: None,
            is_ioctl: false,
            conds: ThinVec::new(),
            loc: Location::default(),
        }
    }

    #[test]
    fn substitution_rewrites_markers() {
        let mut model = Model::new();
        let t0 = model.make_template(0);
        let pattern = model.resolve(sid("foo"), thin_vec![t0]).unwrap();
        let n42 = model.intern_number("42", 42);
        let actual = model.resolve(sid("foo"), thin_vec![n42]).unwrap();
        let call = test_call(&mut model);

        let out = empty_output();
        let mut diag = Diagnostics::new();
        let mut emitter = Emitter::new(&model, &mut diag, &out, GenOptions::default());
        let text = emitter.substitute(
            &call,
            pattern,
            actual,
            "val=$0 whole=$$",
            "arg3",
            Location::default(),
        );
        assert_eq!(text, "val=(42) whole=(arg3)");
        assert!(diag.is_empty());
    }

    #[test]
    fn substitution_reports_uncaptured_id() {
        let mut model = Model::new();
        let t0 = model.make_template(0);
        let pattern = model.resolve(sid("foo"), thin_vec![t0]).unwrap();
        let n42 = model.intern_number("42", 42);
        let actual = model.resolve(sid("foo"), thin_vec![n42]).unwrap();
        let call = test_call(&mut model);

        let out = empty_output();
        let mut diag = Diagnostics::new();
        let mut emitter = Emitter::new(&model, &mut diag, &out, GenOptions::default());
        let text = emitter.substitute(
            &call,
            pattern,
            actual,
            "a=$7!",
            "arg0",
            Location::default(),
        );
        // the uncaptured id contributes nothing but the rest survives
        assert_eq!(text, "a=!");
        assert_eq!(diag.len(), 1);
        assert!(diag.messages()[0].message.contains("$7"));
    }

    #[test]
    fn substitution_descends_into_nested_types() {
        let mut model = Model::new();
        let t1 = model.make_template(1);
        let inner_pat = model.resolve(sid("inner"), thin_vec![t1]).unwrap();
        let ip = model.intern_type_ref(inner_pat);
        let pattern = model.resolve(sid("outer"), thin_vec![ip]).unwrap();

        let n9 = model.intern_number("0x9", 9);
        let inner = model.resolve(sid("inner"), thin_vec![n9]).unwrap();
        let ia = model.intern_type_ref(inner);
        let actual = model.resolve(sid("outer"), thin_vec![ia]).unwrap();
        let call = test_call(&mut model);

        let out = empty_output();
        let mut diag = Diagnostics::new();
        let mut emitter = Emitter::new(&model, &mut diag, &out, GenOptions::default());
        let text = emitter.substitute(&call, pattern, actual, "$1", "x", Location::default());
        // the number keeps its source radix
        assert_eq!(text, "(0x9)");
    }

    #[test]
    fn resolve_value_maps_names_to_slots() {
        let mut model = Model::new();
        let call = test_call(&mut model);
        let retval = model.resolve(sid("retval"), ThinVec::new()).unwrap();
        let op = model.resolve(sid("op"), ThinVec::new()).unwrap();
        let missing = model.resolve(sid("nothere"), ThinVec::new()).unwrap();
        let retval_opt = model.intern_type_ref(retval);
        let op_opt = model.intern_type_ref(op);
        let missing_opt = model.intern_type_ref(missing);

        let out = empty_output();
        let mut diag = Diagnostics::new();
        let mut emitter = Emitter::new(&model, &mut diag, &out, GenOptions::default());
        assert_eq!(emitter.resolve_value(&call, retval_opt), "tcp->u_rval");
        assert_eq!(emitter.resolve_value(&call, op_opt), "tcp->u_arg[1]");
        assert_eq!(emitter.resolve_value(&call, missing_opt), UNRESOLVED_VALUE);
        assert_eq!(diag.len(), 1);
    }

    #[test]
    fn ioctl_slots_are_pseudo_arguments() {
        let mut model = Model::new();
        let mut call = test_call(&mut model);
        call.name = sid("ioctl$FIOCLEX");
        call.is_ioctl = true;

        let out = empty_output();
        let mut diag = Diagnostics::new();
        let mut emitter = Emitter::new(&model, &mut diag, &out, GenOptions::default());
        assert_eq!(emitter.arg_slot(&call, 1), "code");
        assert_eq!(emitter.arg_slot(&call, 2), "arg");
        assert_eq!(emitter.arg_slot(&call, 3), UNRESOLVED_VALUE);
        assert_eq!(diag.len(), 1);
        assert!(diag.messages()[0].message.contains("pseudo-argument"));
    }

    #[test]
    fn mangling_replaces_variant_separators() {
        assert_eq!(mangle("prctl$PR_CAP_AMBIENT"), "prctl_PR_CAP_AMBIENT");
        assert_eq!(mangle("openat"), "openat");
    }
}
