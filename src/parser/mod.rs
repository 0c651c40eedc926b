//! Parser for the description language.
//!
//! The grammar is line-oriented: one declaration per line, except that
//! conditional blocks span until their matching `endif` and aggregate
//! bodies may spread across lines. The parser produces exactly the node
//! shapes in [`crate::ast`]; everything downstream treats those shapes as
//! its input boundary.

use crate::ast::{
    AggregateNode, ArgNode, CallNode, ConditionalBlock, DecoderRuleNode, FieldNode, Node,
    OptionExpr, StatementNode, TypeExpr,
};
use crate::source::Location;
use crate::StringId;
use log::debug;
use thin_vec::ThinVec;

pub mod error;
pub mod lexer;

pub use error::ParseError;
use lexer::{Lexer, Token, TokenKind};

/// Pre-interned declaration keywords for fast comparison.
struct KeywordTable {
    include: StringId,
    define: StringId,
    cond_if: StringId,
    endif: StringId,
    print: StringId,
    strukt: StringId,
}

impl KeywordTable {
    fn new() -> Self {
        Self {
            include: StringId::new("include"),
            define: StringId::new("define"),
            cond_if: StringId::new("if"),
            endif: StringId::new("endif"),
            print: StringId::new("print"),
            strukt: StringId::new("struct"),
        }
    }
}

/// A parser that converts description source into a syntax tree.
pub struct Parser<'src> {
    lexer: Lexer<'src>,
    peeked: Option<Token>,
    kw: KeywordTable,
}

/// Parses one description source into its syntax tree root.
pub fn parse(source: &str) -> Result<Node, ParseError> {
    Parser::new(source).parse()
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            lexer: Lexer::new(source),
            peeked: None,
            kw: KeywordTable::new(),
        }
    }

    pub fn parse(mut self) -> Result<Node, ParseError> {
        let items = self.parse_block(false)?;
        debug!("parsed {} top-level declarations", items.len());
        Ok(Node::Sequence(items))
    }

    // ----- token plumbing -----

    fn bump(&mut self) -> Result<Token, ParseError> {
        match self.peeked.take() {
            Some(tok) => Ok(tok),
            None => self.lexer.next_token(),
        }
    }

    fn peek(&mut self) -> Result<&Token, ParseError> {
        if self.peeked.is_none() {
            self.peeked = Some(self.lexer.next_token()?);
        }
        Ok(self.peeked.as_ref().expect("just filled"))
    }

    /// Consumes the next token if it matches `kind`.
    fn eat(&mut self, kind: &TokenKind) -> Result<bool, ParseError> {
        if &self.peek()?.kind == kind {
            self.bump()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        let tok = self.bump()?;
        if tok.kind == kind {
            return Ok(tok);
        }
        Err(self.unexpected(tok))
    }

    fn expect_ident(&mut self) -> Result<(StringId, Location), ParseError> {
        let tok = self.bump()?;
        match tok.kind {
            TokenKind::Ident(name) => Ok((name, tok.loc)),
            _ => Err(self.unexpected(tok)),
        }
    }

    fn expect_line_end(&mut self) -> Result<(), ParseError> {
        let tok = self.bump()?;
        match tok.kind {
            TokenKind::Newline | TokenKind::Eof => Ok(()),
            _ => Err(self.unexpected(tok)),
        }
    }

    fn skip_newlines(&mut self) -> Result<(), ParseError> {
        while self.eat(&TokenKind::Newline)? {}
        Ok(())
    }

    fn unexpected(&self, tok: Token) -> ParseError {
        match tok.kind {
            TokenKind::Eof => ParseError::UnexpectedEof { loc: tok.loc },
            kind => ParseError::UnexpectedToken {
                found: kind.describe(),
                loc: tok.loc,
            },
        }
    }

    // ----- declarations -----

    fn parse_block(&mut self, in_conditional: bool) -> Result<Vec<Node>, ParseError> {
        let mut items = Vec::new();
        loop {
            let tok = self.bump()?;
            match tok.kind {
                TokenKind::Newline => continue,
                TokenKind::Eof => {
                    if in_conditional {
                        return Err(ParseError::MissingEndif { loc: tok.loc });
                    }
                    return Ok(items);
                }
                TokenKind::Ident(name) => {
                    if name == self.kw.endif {
                        if !in_conditional {
                            return Err(ParseError::UnmatchedEndif { loc: tok.loc });
                        }
                        self.expect_line_end()?;
                        return Ok(items);
                    }
                    items.push(self.parse_declaration(name, tok.loc)?);
                }
                _ => return Err(self.unexpected(tok)),
            }
        }
    }

    fn parse_declaration(&mut self, name: StringId, loc: Location) -> Result<Node, ParseError> {
        if name == self.kw.include || name == self.kw.define {
            debug_assert!(self.peeked.is_none());
            let rest = self.lexer.take_rest_of_line();
            self.expect_line_end()?;
            return Ok(Node::Statement(StatementNode {
                text: format!("#{} {}", name, rest),
                loc,
            }));
        }
        if name == self.kw.cond_if {
            debug_assert!(self.peeked.is_none());
            let guard = self.lexer.take_rest_of_line();
            self.expect_line_end()?;
            let body = self.parse_block(true)?;
            return Ok(Node::Conditional(ConditionalBlock {
                guard: StringId::new(&guard),
                body,
                loc,
            }));
        }
        if name == self.kw.print {
            let pattern = self.parse_type_expr()?;
            self.expect(TokenKind::Eq)?;
            let tok = self.bump()?;
            let format = match tok.kind {
                TokenKind::Str(text) => text,
                _ => return Err(self.unexpected(tok)),
            };
            self.expect_line_end()?;
            return Ok(Node::Rule(DecoderRuleNode {
                pattern,
                format,
                loc,
            }));
        }
        if name == self.kw.strukt {
            return self.parse_aggregate(loc);
        }
        self.parse_call(name, loc)
    }

    fn parse_aggregate(&mut self, loc: Location) -> Result<Node, ParseError> {
        let (name, _) = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;
        let mut fields = ThinVec::new();
        loop {
            self.skip_newlines()?;
            if self.eat(&TokenKind::RBrace)? {
                break;
            }
            let (field_name, _) = self.expect_ident()?;
            let ty = self.parse_type_expr()?;
            fields.push(FieldNode {
                name: field_name,
                ty,
            });
            self.skip_newlines()?;
            self.eat(&TokenKind::Comma)?;
        }
        self.expect_line_end()?;
        Ok(Node::Aggregate(AggregateNode { name, fields, loc }))
    }

    fn parse_call(&mut self, name: StringId, loc: Location) -> Result<Node, ParseError> {
        self.expect(TokenKind::LParen)?;
        let mut args = ThinVec::new();
        if !self.eat(&TokenKind::RParen)? {
            loop {
                let (arg_name, _) = self.expect_ident()?;
                let ty = self.parse_type_expr()?;
                args.push(ArgNode { name: arg_name, ty });
                if self.eat(&TokenKind::Comma)? {
                    continue;
                }
                self.expect(TokenKind::RParen)?;
                break;
            }
        }
        let at_end = matches!(self.peek()?.kind, TokenKind::Newline | TokenKind::Eof);
        let ret = if at_end {
            None
        } else {
            Some(self.parse_type_expr()?)
        };
        self.expect_line_end()?;
        Ok(Node::Call(CallNode {
            name,
            args,
            ret,
            loc,
        }))
    }

    // ----- type expressions -----

    fn parse_type_expr(&mut self) -> Result<TypeExpr, ParseError> {
        let (name, loc) = self.expect_ident()?;
        self.parse_type_suffix(name, loc)
    }

    fn parse_type_suffix(&mut self, name: StringId, loc: Location) -> Result<TypeExpr, ParseError> {
        let mut options = ThinVec::new();
        if self.eat(&TokenKind::LBracket)? {
            loop {
                options.push(self.parse_option()?);
                if self.eat(&TokenKind::Comma)? {
                    continue;
                }
                self.expect(TokenKind::RBracket)?;
                break;
            }
        }
        Ok(TypeExpr { name, options, loc })
    }

    fn parse_option(&mut self) -> Result<OptionExpr, ParseError> {
        let first = self.parse_option_atom()?;
        if self.eat(&TokenKind::Colon)? {
            let second = self.parse_option_atom()?;
            return Ok(OptionExpr::Range {
                min: Box::new(first),
                max: Box::new(second),
            });
        }
        Ok(first)
    }

    fn parse_option_atom(&mut self) -> Result<OptionExpr, ParseError> {
        let tok = self.bump()?;
        match tok.kind {
            TokenKind::Number { text, value } => Ok(OptionExpr::Number { text, value }),
            TokenKind::Template(id) => Ok(OptionExpr::Template(id)),
            TokenKind::Ident(name) => Ok(OptionExpr::Type(self.parse_type_suffix(name, tok.loc)?)),
            _ => Err(self.unexpected(tok)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sid;

    fn parse_one(src: &str) -> Node {
        match parse(src).unwrap() {
            Node::Sequence(mut items) => {
                assert_eq!(items.len(), 1, "expected one declaration");
                items.remove(0)
            }
            other => panic!("expected sequence, got {:?}", other),
        }
    }

    #[test]
    fn parses_statements() {
        let node = parse_one("include <linux/prctl.h>\n");
        match node {
            Node::Statement(stmt) => {
                assert_eq!(stmt.text, "#include <linux/prctl.h>");
                assert_eq!(stmt.loc.line, 1);
            }
            other => panic!("expected statement, got {:?}", other),
        }

        let node = parse_one("define PR_SET_NAME 15\n");
        match node {
            Node::Statement(stmt) => assert_eq!(stmt.text, "#define PR_SET_NAME 15"),
            other => panic!("expected statement, got {:?}", other),
        }
    }

    #[test]
    fn parses_nested_conditionals() {
        let src = "if defined(__linux__)\nif defined(__NR_prctl)\nprctl()\nendif\nendif\n";
        let node = parse_one(src);
        match node {
            Node::Conditional(outer) => {
                assert_eq!(outer.guard, sid("defined(__linux__)"));
                assert_eq!(outer.body.len(), 1);
                match &outer.body[0] {
                    Node::Conditional(inner) => {
                        assert_eq!(inner.guard, sid("defined(__NR_prctl)"));
                        assert!(matches!(inner.body[0], Node::Call(_)));
                    }
                    other => panic!("expected inner conditional, got {:?}", other),
                }
            }
            other => panic!("expected conditional, got {:?}", other),
        }
    }

    #[test]
    fn missing_endif_is_an_error() {
        let err = parse("if defined(X)\nprctl()\n").unwrap_err();
        assert!(matches!(err, ParseError::MissingEndif { .. }));
        let err = parse("endif\n").unwrap_err();
        assert!(matches!(err, ParseError::UnmatchedEndif { .. }));
    }

    #[test]
    fn parses_call_with_types_and_return() {
        let node = parse_one("openat(dirfd fd, file ptr[in, string], flags int32) fd\n");
        match node {
            Node::Call(call) => {
                assert_eq!(call.name, sid("openat"));
                assert_eq!(call.args.len(), 3);
                assert_eq!(call.args[0].name, sid("dirfd"));
                let ptr = &call.args[1].ty;
                assert_eq!(ptr.name, sid("ptr"));
                assert_eq!(ptr.options.len(), 2);
                assert!(matches!(
                    &ptr.options[0],
                    OptionExpr::Type(t) if t.name == sid("in")
                ));
                assert_eq!(call.ret.as_ref().unwrap().name, sid("fd"));
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn parses_const_range_and_template_options() {
        let node = parse_one("print seconds[$0, 1:0x10] = \"print_secs($$, $0)\"\n");
        match node {
            Node::Rule(rule) => {
                assert_eq!(rule.pattern.name, sid("seconds"));
                assert!(matches!(rule.pattern.options[0], OptionExpr::Template(0)));
                match &rule.pattern.options[1] {
                    OptionExpr::Range { min, max } => {
                        assert!(matches!(**min, OptionExpr::Number { value: 1, .. }));
                        assert!(
                            matches!(&**max, OptionExpr::Number { text, value: 16 } if text.as_str() == "0x10")
                        );
                    }
                    other => panic!("expected range, got {:?}", other),
                }
                assert_eq!(rule.format, "print_secs($$, $0)");
            }
            other => panic!("expected rule, got {:?}", other),
        }
    }

    #[test]
    fn parses_aggregate_across_lines() {
        let src = "struct timespec {\n\tsec int64,\n\tnsec int64\n}\n";
        let node = parse_one(src);
        match node {
            Node::Aggregate(agg) => {
                assert_eq!(agg.name, sid("timespec"));
                assert_eq!(agg.fields.len(), 2);
                assert_eq!(agg.fields[1].name, sid("nsec"));
            }
            other => panic!("expected aggregate, got {:?}", other),
        }
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let src = "# leading comment\n\nprctl() # trailing\n";
        let node = parse_one(src);
        assert!(matches!(node, Node::Call(_)));
    }

    #[test]
    fn source_order_is_preserved() {
        let src = "b()\na()\ninclude <x.h>\n";
        match parse(src).unwrap() {
            Node::Sequence(items) => {
                assert!(matches!(&items[0], Node::Call(c) if c.name == sid("b")));
                assert!(matches!(&items[1], Node::Call(c) if c.name == sid("a")));
                assert!(matches!(&items[2], Node::Statement(_)));
            }
            other => panic!("expected sequence, got {:?}", other),
        }
    }
}
