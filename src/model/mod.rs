//! Type/entity model.
//!
//! Arena + canonicalization layer for description types. All `TypeId` and
//! `OptId` creation goes through the [`Model`]; handles are small indices
//! into append-only arenas, so two handles are equal iff the arena index is
//! equal.
//!
//! Invariants:
//! - Types are never removed or mutated after resolution.
//! - Two template-free types with equal names and structurally equal option
//!   lists share one `TypeId`.
//! - An option list containing a template placeholder is never unified:
//!   each such type gets a fresh identity, so pattern types stay distinct
//!   from the concrete types they match.

use crate::ast::{OptionExpr, TypeExpr};
use crate::source::Location;
use crate::StringId;
use bitflags::bitflags;
use hashbrown::HashMap;
use thin_vec::ThinVec;
use thiserror::Error;

pub mod target;
pub use target::{BasicClass, BasicType, Repr, TargetTable};

bitflags! {
    /// Pointer direction: whether the pointed-to value is read before the
    /// call, written after it, or both.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Dir: u8 {
        const IN = 1 << 0;
        const OUT = 1 << 1;
    }
}

impl Dir {
    pub const INOUT: Dir = Dir::from_bits_truncate(Dir::IN.bits() | Dir::OUT.bits());
}

/// Handle to an interned type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct TypeId(u32);

impl TypeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to an interned type option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct OptId(u32);

impl OptId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Kind tag of a resolved type, with kind-specific payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    /// No special constructor semantics.
    Basic,
    /// Constant-value wrapper; the value is the single option.
    Const,
    /// Pointer with a direction and a resolved pointee.
    Ptr { dir: Dir, pointee: TypeId },
    /// Argument reference; the referenced name is the single option.
    Ref,
    /// Single-valued flag set with a resolved underlying integer type.
    XorFlags { underlying: TypeId },
    /// Bitmask flag set with a resolved underlying integer type.
    OrFlags { underlying: TypeId },
}

/// An interned type: name, ordered option list, and kind tag.
#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    pub name: StringId,
    pub options: ThinVec<OptId>,
    pub class: TypeClass,
}

/// An interned type option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeOption {
    /// A literal number; the raw source text is kept so emitted values
    /// preserve the radix chosen by the author.
    Number { text: StringId, value: u64 },
    /// A reference to an already-canonical type.
    Type(TypeId),
    /// A range; never deduplicated since its children may differ per use.
    Range { min: OptId, max: OptId },
    /// A template placeholder; never deduplicated by design.
    Template(u32),
}

/// Errors raised while resolving a (name, option-list) pair against the
/// built-in constructor names. Fatal for the offending declaration.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("\"{name}\" expects exactly {expected} option(s), got {got}")]
    OptionCount {
        name: StringId,
        expected: usize,
        got: usize,
    },
    #[error("first option of \"{name}\" must be one of \"in\", \"out\", \"inout\"")]
    BadDirection { name: StringId },
    #[error("first option of \"{name}\" must be a plain name")]
    BadFirstOption { name: StringId },
    #[error("option {index} of \"{name}\" must be a type")]
    OptionNotType { name: StringId, index: usize },
}

/// A user-declared aggregate recorded in the symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateInfo {
    pub name: StringId,
    pub loc: Location,
}

/// Structural key used by the type interning index. Option lists that
/// contain a template placeholder have no key and bypass the index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum OptKey {
    Number(u64),
    Type(u32),
    Range(Box<OptKey>, Box<OptKey>),
}

/// Pre-interned direction keywords for fast comparison.
struct DirKeywords {
    kw_in: StringId,
    kw_out: StringId,
    kw_inout: StringId,
}

impl DirKeywords {
    fn new() -> Self {
        Self {
            kw_in: StringId::new("in"),
            kw_out: StringId::new("out"),
            kw_inout: StringId::new("inout"),
        }
    }

    fn direction(&self, name: StringId) -> Option<Dir> {
        if name == self.kw_in {
            Some(Dir::IN)
        } else if name == self.kw_out {
            Some(Dir::OUT)
        } else if name == self.kw_inout {
            Some(Dir::INOUT)
        } else {
            None
        }
    }
}

/// Central arena & factory for types, options, and declared symbols.
pub struct Model {
    types: Vec<Type>,
    opts: Vec<TypeOption>,

    // Canonicalization indexes.
    type_index: HashMap<(StringId, Vec<OptKey>), TypeId>,
    number_index: HashMap<u64, OptId>,
    typeref_index: HashMap<TypeId, OptId>,

    symbols: HashMap<StringId, AggregateInfo>,
    target: TargetTable,
    keywords: DirKeywords,
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    pub fn new() -> Self {
        Self {
            types: Vec::new(),
            opts: Vec::new(),
            type_index: HashMap::new(),
            number_index: HashMap::new(),
            typeref_index: HashMap::new(),
            symbols: HashMap::new(),
            target: TargetTable::with_defaults(),
            keywords: DirKeywords::new(),
        }
    }

    pub fn ty(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    pub fn opt(&self, id: OptId) -> &TypeOption {
        &self.opts[id.index()]
    }

    // ----- option interning -----

    /// Interns a literal number, deduplicated by numeric value.
    pub fn intern_number(&mut self, text: &str, value: u64) -> OptId {
        if let Some(&id) = self.number_index.get(&value) {
            return id;
        }
        let id = self.push_opt(TypeOption::Number {
            text: StringId::new(text),
            value,
        });
        self.number_index.insert(value, id);
        id
    }

    /// Interns a nested-type reference, deduplicated by the identity of the
    /// already-canonical referenced type.
    pub fn intern_type_ref(&mut self, ty: TypeId) -> OptId {
        if let Some(&id) = self.typeref_index.get(&ty) {
            return id;
        }
        let id = self.push_opt(TypeOption::Type(ty));
        self.typeref_index.insert(ty, id);
        id
    }

    /// Allocates a range option; always fresh.
    pub fn make_range(&mut self, min: OptId, max: OptId) -> OptId {
        self.push_opt(TypeOption::Range { min, max })
    }

    /// Allocates a template placeholder option; always fresh.
    pub fn make_template(&mut self, id: u32) -> OptId {
        self.push_opt(TypeOption::Template(id))
    }

    fn push_opt(&mut self, opt: TypeOption) -> OptId {
        let id = OptId(self.opts.len() as u32);
        self.opts.push(opt);
        id
    }

    // ----- type interning -----

    /// Interns a type under the strict structural rule: template options
    /// never match, so any list containing one allocates a fresh entry.
    /// The canonical set only grows.
    pub fn intern_or_create(&mut self, ty: Type) -> TypeId {
        match self.type_key(ty.name, &ty.options) {
            Some(key) => {
                if let Some(&id) = self.type_index.get(&key) {
                    return id;
                }
                let id = self.push_type(ty);
                self.type_index.insert(key, id);
                id
            }
            None => self.push_type(ty),
        }
    }

    fn push_type(&mut self, ty: Type) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    fn type_key(&self, name: StringId, options: &[OptId]) -> Option<(StringId, Vec<OptKey>)> {
        let mut keys = Vec::with_capacity(options.len());
        for &o in options {
            keys.push(self.opt_key(o)?);
        }
        Some((name, keys))
    }

    fn opt_key(&self, id: OptId) -> Option<OptKey> {
        match *self.opt(id) {
            TypeOption::Number { value, .. } => Some(OptKey::Number(value)),
            TypeOption::Type(t) => Some(OptKey::Type(t.0)),
            TypeOption::Range { min, max } => Some(OptKey::Range(
                Box::new(self.opt_key(min)?),
                Box::new(self.opt_key(max)?),
            )),
            TypeOption::Template(_) => None,
        }
    }

    // ----- resolution -----

    /// Resolves a raw (name, option-list) pair into a canonical type,
    /// enforcing the built-in constructors' arity and shape rules.
    pub fn resolve(&mut self, name: StringId, options: ThinVec<OptId>) -> Result<TypeId, ModelError> {
        let class = self.classify(name, &options)?;
        Ok(self.intern_or_create(Type {
            name,
            options,
            class,
        }))
    }

    /// Resolves a raw type expression bottom-up: options first, then the
    /// type itself.
    pub fn resolve_expr(&mut self, expr: &TypeExpr) -> Result<TypeId, ModelError> {
        let mut opts = ThinVec::with_capacity(expr.options.len());
        for o in &expr.options {
            opts.push(self.lower_option(o)?);
        }
        self.resolve(expr.name, opts)
    }

    fn lower_option(&mut self, expr: &OptionExpr) -> Result<OptId, ModelError> {
        match expr {
            OptionExpr::Number { text, value } => Ok(self.intern_number(text, *value)),
            OptionExpr::Type(te) => {
                let ty = self.resolve_expr(te)?;
                Ok(self.intern_type_ref(ty))
            }
            OptionExpr::Range { min, max } => {
                let min = self.lower_option(min)?;
                let max = self.lower_option(max)?;
                Ok(self.make_range(min, max))
            }
            OptionExpr::Template(id) => Ok(self.make_template(*id)),
        }
    }

    fn classify(&self, name: StringId, options: &[OptId]) -> Result<TypeClass, ModelError> {
        // Declaring a type that contains a placeholder is legal (decoder
        // patterns do it); no constructor semantics attach to it.
        if options
            .iter()
            .any(|&o| matches!(self.opt(o), TypeOption::Template(_)))
        {
            return Ok(TypeClass::Basic);
        }

        match name.as_str() {
            "const" => {
                self.check_arity(name, 1, options)?;
                Ok(TypeClass::Const)
            }
            "ptr" => {
                self.check_arity(name, 2, options)?;
                let dir = self
                    .plain_name(options[0])
                    .and_then(|n| self.keywords.direction(n))
                    .ok_or(ModelError::BadDirection { name })?;
                let pointee = match *self.opt(options[1]) {
                    TypeOption::Type(t) => t,
                    _ => return Err(ModelError::OptionNotType { name, index: 2 }),
                };
                Ok(TypeClass::Ptr { dir, pointee })
            }
            "ref" => {
                self.check_arity(name, 1, options)?;
                if self.plain_name(options[0]).is_none() {
                    return Err(ModelError::BadFirstOption { name });
                }
                Ok(TypeClass::Ref)
            }
            "xor_flags" | "or_flags" => {
                self.check_arity(name, 3, options)?;
                if self.plain_name(options[0]).is_none() {
                    return Err(ModelError::BadFirstOption { name });
                }
                let underlying = match *self.opt(options[2]) {
                    TypeOption::Type(t) => t,
                    _ => return Err(ModelError::OptionNotType { name, index: 3 }),
                };
                if name.as_str() == "xor_flags" {
                    Ok(TypeClass::XorFlags { underlying })
                } else {
                    Ok(TypeClass::OrFlags { underlying })
                }
            }
            _ => Ok(TypeClass::Basic),
        }
    }

    fn check_arity(&self, name: StringId, expected: usize, options: &[OptId]) -> Result<(), ModelError> {
        if options.len() != expected {
            return Err(ModelError::OptionCount {
                name,
                expected,
                got: options.len(),
            });
        }
        Ok(())
    }

    /// Returns the name of an option that is a bare type reference with no
    /// options of its own.
    pub fn plain_name(&self, id: OptId) -> Option<StringId> {
        match *self.opt(id) {
            TypeOption::Type(t) => {
                let ty = self.ty(t);
                ty.options.is_empty().then_some(ty.name)
            }
            _ => None,
        }
    }

    // ----- pattern matching -----

    /// Structural equality where a template placeholder on either side
    /// makes that position match unconditionally. Used for decoder-pattern
    /// lookup, not for interning.
    pub fn matches(&self, a: TypeId, b: TypeId) -> bool {
        if a == b {
            return true;
        }
        let (ta, tb) = (self.ty(a), self.ty(b));
        if ta.name != tb.name || ta.options.len() != tb.options.len() {
            return false;
        }
        ta.options
            .iter()
            .zip(tb.options.iter())
            .all(|(&x, &y)| self.match_option(x, y))
    }

    fn match_option(&self, a: OptId, b: OptId) -> bool {
        match (self.opt(a), self.opt(b)) {
            (TypeOption::Template(_), _) | (_, TypeOption::Template(_)) => true,
            (TypeOption::Number { value: va, .. }, TypeOption::Number { value: vb, .. }) => va == vb,
            (&TypeOption::Type(x), &TypeOption::Type(y)) => self.matches(x, y),
            (
                &TypeOption::Range { min: am, max: ax },
                &TypeOption::Range { min: bm, max: bx },
            ) => self.match_option(am, bm) && self.match_option(ax, bx),
            _ => false,
        }
    }

    // ----- symbol table -----

    /// Records an aggregate declaration. Insertion is idempotent: on a
    /// duplicate name the original declaration is kept and returned so the
    /// caller can decide how to report it.
    pub fn declare_aggregate(&mut self, name: StringId, loc: Location) -> Option<AggregateInfo> {
        match self.symbols.entry(name) {
            hashbrown::hash_map::Entry::Occupied(prev) => Some(*prev.get()),
            hashbrown::hash_map::Entry::Vacant(slot) => {
                slot.insert(AggregateInfo { name, loc });
                None
            }
        }
    }

    pub fn lookup_aggregate(&self, name: StringId) -> Option<&AggregateInfo> {
        self.symbols.get(&name)
    }

    // ----- target representation -----

    /// Looks up the target representation of a type name: first the basic
    /// table, then the user-declared aggregates.
    pub fn target_repr(&self, ty: TypeId) -> Option<Repr<'_>> {
        let name = self.ty(ty).name;
        if let Some(basic) = self.target.get(name) {
            return Some(Repr::Basic(basic));
        }
        if self.symbols.contains_key(&name) {
            return Some(Repr::Aggregate(name));
        }
        None
    }

    /// Extends the basic-type table.
    pub fn register_basic(&mut self, name: &str, basic: BasicType) {
        self.target.register(name, basic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thin_vec::thin_vec;

    fn sid(s: &str) -> StringId {
        StringId::new(s)
    }

    #[test]
    fn interning_is_idempotent() {
        let mut m = Model::new();
        let n = m.intern_number("42", 42);
        let a = m.resolve(sid("const"), thin_vec![n]).unwrap();
        let b = m.resolve(sid("const"), thin_vec![n]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn numbers_dedupe_by_value_ranges_do_not() {
        let mut m = Model::new();
        assert_eq!(m.intern_number("42", 42), m.intern_number("0x2a", 42));
        let lo = m.intern_number("1", 1);
        let hi = m.intern_number("9", 9);
        assert_ne!(m.make_range(lo, hi), m.make_range(lo, hi));
    }

    #[test]
    fn structurally_equal_range_types_share_identity() {
        let mut m = Model::new();
        let lo = m.intern_number("1", 1);
        let hi = m.intern_number("9", 9);
        let r1 = m.make_range(lo, hi);
        let r2 = m.make_range(lo, hi);
        let a = m.resolve(sid("const"), thin_vec![r1]).unwrap();
        let b = m.resolve(sid("const"), thin_vec![r2]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn template_options_always_allocate_fresh_types() {
        let mut m = Model::new();
        let t1 = m.make_template(0);
        let t2 = m.make_template(0);
        let a = m.resolve(sid("foo"), thin_vec![t1]).unwrap();
        let b = m.resolve(sid("foo"), thin_vec![t2]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn template_short_circuits_constructor_semantics() {
        let mut m = Model::new();
        let t = m.make_template(1);
        // "const" with a placeholder stays basic instead of failing shape
        // checks; patterns may use constructor names freely.
        let ty = m.resolve(sid("const"), thin_vec![t]).unwrap();
        assert_eq!(m.ty(ty).class, TypeClass::Basic);
    }

    #[test]
    fn matches_treats_template_as_free() {
        let mut m = Model::new();
        let t = m.make_template(0);
        let pattern = m.resolve(sid("foo"), thin_vec![t]).unwrap();
        let n = m.intern_number("42", 42);
        let actual = m.resolve(sid("foo"), thin_vec![n]).unwrap();
        let other = m.resolve(sid("bar"), thin_vec![n]).unwrap();
        assert_ne!(pattern, actual);
        assert!(m.matches(pattern, actual));
        assert!(m.matches(actual, pattern));
        assert!(!m.matches(pattern, other));
    }

    #[test]
    fn matches_recurses_into_nested_options() {
        let mut m = Model::new();
        let t = m.make_template(0);
        let inner_pat = m.resolve(sid("inner"), thin_vec![t]).unwrap();
        let ip = m.intern_type_ref(inner_pat);
        let pattern = m.resolve(sid("outer"), thin_vec![ip]).unwrap();

        let n = m.intern_number("7", 7);
        let inner = m.resolve(sid("inner"), thin_vec![n]).unwrap();
        let ia = m.intern_type_ref(inner);
        let actual = m.resolve(sid("outer"), thin_vec![ia]).unwrap();

        assert!(m.matches(pattern, actual));
    }

    #[test]
    fn const_arity_message_names_expected_count() {
        let mut m = Model::new();
        let err = m.resolve(sid("const"), ThinVec::new()).unwrap_err();
        assert!(err.to_string().contains("exactly 1"), "{}", err);
        let a = m.intern_number("1", 1);
        let b = m.intern_number("2", 2);
        let err = m.resolve(sid("const"), thin_vec![a, b]).unwrap_err();
        assert!(err.to_string().contains("exactly 1"), "{}", err);
    }

    #[test]
    fn ptr_requires_direction_keyword() {
        let mut m = Model::new();
        let int32 = m.resolve(sid("int32"), ThinVec::new()).unwrap();
        let dir = m.resolve(sid("sideways"), ThinVec::new()).unwrap();
        let dir_opt = m.intern_type_ref(dir);
        let pointee = m.intern_type_ref(int32);
        let err = m.resolve(sid("ptr"), thin_vec![dir_opt, pointee]).unwrap_err();
        assert!(err.to_string().contains("\"inout\""), "{}", err);

        let inb = m.resolve(sid("in"), ThinVec::new()).unwrap();
        let inb = m.intern_type_ref(inb);
        let ty = m.resolve(sid("ptr"), thin_vec![inb, pointee]).unwrap();
        match m.ty(ty).class {
            TypeClass::Ptr { dir, pointee: p } => {
                assert_eq!(dir, Dir::IN);
                assert_eq!(p, int32);
            }
            ref other => panic!("expected pointer class, got {:?}", other),
        }
    }

    #[test]
    fn flag_sets_resolve_underlying_type() {
        let mut m = Model::new();
        let name = m.resolve(sid("open_flags"), ThinVec::new()).unwrap();
        let dflt = m.resolve(sid("O_QQQ"), ThinVec::new()).unwrap();
        let int32 = m.resolve(sid("int32"), ThinVec::new()).unwrap();
        let opts = thin_vec![
            m.intern_type_ref(name),
            m.intern_type_ref(dflt),
            m.intern_type_ref(int32),
        ];
        let ty = m.resolve(sid("or_flags"), opts).unwrap();
        assert_eq!(m.ty(ty).class, TypeClass::OrFlags { underlying: int32 });
    }

    #[test]
    fn duplicate_aggregate_reports_prior_declaration() {
        let mut m = Model::new();
        let first = Location::new(1, 1);
        assert!(m.declare_aggregate(sid("timespec"), first).is_none());
        let prev = m.declare_aggregate(sid("timespec"), Location::new(8, 1));
        assert_eq!(prev.unwrap().loc, first);
        // the original declaration is kept
        assert_eq!(m.lookup_aggregate(sid("timespec")).unwrap().loc, first);
    }

    #[test]
    fn target_repr_falls_back_to_aggregates() {
        let mut m = Model::new();
        m.declare_aggregate(sid("timespec"), Location::default());
        let ts = m.resolve(sid("timespec"), ThinVec::new()).unwrap();
        assert_eq!(m.target_repr(ts), Some(Repr::Aggregate(sid("timespec"))));
        let unknown = m.resolve(sid("mystery"), ThinVec::new()).unwrap();
        assert!(m.target_repr(unknown).is_none());
    }
}
