//! Syntax tree node shapes.
//!
//! The generator treats the parser as an external collaborator producing
//! exactly these shapes; nothing downstream re-validates grammar-level
//! syntax, only semantic shape (arities, kind-specific option forms).

use crate::source::Location;
use crate::StringId;
use thin_vec::ThinVec;

/// One node of the parsed description.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A conditional-compilation block with a raw guard expression.
    Conditional(ConditionalBlock),
    /// A custom decoder rule: pattern type plus a format string.
    Rule(DecoderRuleNode),
    /// A definition/include-style statement passed through to the output.
    Statement(StatementNode),
    /// An ordered sequence of child nodes.
    Sequence(Vec<Node>),
    /// A call declaration.
    Call(CallNode),
    /// An aggregate-type declaration.
    Aggregate(AggregateNode),
}

/// A conditional block; the guard text is reproduced verbatim around the
/// generated output of every declaration in `body`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalBlock {
    pub guard: StringId,
    pub body: Vec<Node>,
    pub loc: Location,
}

/// A custom decoder rule before pattern resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct DecoderRuleNode {
    pub pattern: TypeExpr,
    pub format: String,
    pub loc: Location,
}

/// A passthrough preprocessor-style statement, stored as the full output
/// line (e.g. `#include <linux/prctl.h>`).
#[derive(Debug, Clone, PartialEq)]
pub struct StatementNode {
    pub text: String,
    pub loc: Location,
}

/// A call declaration: name (possibly variant-qualified), ordered argument
/// list, and an optional return type.
#[derive(Debug, Clone, PartialEq)]
pub struct CallNode {
    pub name: StringId,
    pub args: ThinVec<ArgNode>,
    pub ret: Option<TypeExpr>,
    pub loc: Location,
}

/// One call argument: name plus raw type expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgNode {
    pub name: StringId,
    pub ty: TypeExpr,
}

/// An aggregate-type declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateNode {
    pub name: StringId,
    pub fields: ThinVec<FieldNode>,
    pub loc: Location,
}

/// One aggregate field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
    pub name: StringId,
    pub ty: TypeExpr,
}

/// A raw type expression: a name plus an ordered option list.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeExpr {
    pub name: StringId,
    pub options: ThinVec<OptionExpr>,
    pub loc: Location,
}

impl TypeExpr {
    /// A bare type name with no options.
    pub fn plain(name: StringId, loc: Location) -> Self {
        Self {
            name,
            options: ThinVec::new(),
            loc,
        }
    }
}

/// One positional parameter of a parametrized type.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionExpr {
    /// A literal number carrying its raw source text and numeric value.
    Number { text: String, value: u64 },
    /// A nested type reference.
    Type(TypeExpr),
    /// A range with a minimum and maximum option.
    Range {
        min: Box<OptionExpr>,
        max: Box<OptionExpr>,
    },
    /// A template placeholder carrying its numeric id; legal only inside a
    /// custom decoder's pattern type.
    Template(u32),
}
