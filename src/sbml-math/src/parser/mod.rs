// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Hand-written recursive descent parser for infix formulas.
//!
//! Two dialects share the parser.  Level 3 text has relational and
//! logical operators, `%`, units on numbers and package syntax.  Level 1
//! text only has arithmetic operators; everything else is a function call.

use crate::ast::{AstNode, NodeData};
use crate::common::{ErrorCode, ErrorLog, FormulaError, FormulaResult};
use crate::kinds::{self, NodeKind};
use crate::model::UnitContext;
use crate::settings::{ParseLogType, ParserSettings};
use crate::token::{Lexer, Spanned, Token};

#[cfg(test)]
mod tests;

/// Nesting depth past which a formula is rejected rather than parsed.
pub const MAX_PARSE_DEPTH: usize = 128;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Dialect {
    L1,
    L3,
}

/// TokenKind discriminant for efficient peek comparisons without payload matching
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TokenKind {
    Plus,
    Minus,
    Mul,
    Div,
    Exp,
    Percent,
    Lt,
    Lte,
    Gt,
    Gte,
    EqEq,
    Neq,
    And,
    Or,
    Not,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Ident,
    Num,
}

impl<'a> From<&Token<'a>> for TokenKind {
    fn from(token: &Token<'a>) -> Self {
        match token {
            Token::Plus => TokenKind::Plus,
            Token::Minus => TokenKind::Minus,
            Token::Mul => TokenKind::Mul,
            Token::Div => TokenKind::Div,
            Token::Exp => TokenKind::Exp,
            Token::Percent => TokenKind::Percent,
            Token::Lt => TokenKind::Lt,
            Token::Lte => TokenKind::Lte,
            Token::Gt => TokenKind::Gt,
            Token::Gte => TokenKind::Gte,
            Token::EqEq => TokenKind::EqEq,
            Token::Neq => TokenKind::Neq,
            Token::And => TokenKind::And,
            Token::Or => TokenKind::Or,
            Token::Not => TokenKind::Not,
            Token::LParen => TokenKind::LParen,
            Token::RParen => TokenKind::RParen,
            Token::LBrace => TokenKind::LBrace,
            Token::RBrace => TokenKind::RBrace,
            Token::LBracket => TokenKind::LBracket,
            Token::RBracket => TokenKind::RBracket,
            Token::Comma => TokenKind::Comma,
            Token::Ident(_) => TokenKind::Ident,
            Token::Num(_) => TokenKind::Num,
        }
    }
}

/// Parser state holding tokenized input
struct Parser<'input, 'a> {
    tokens: Vec<Spanned<Token<'input>>>,
    pos: usize,
    depth: usize,
    dialect: Dialect,
    settings: &'a ParserSettings,
}

impl<'input, 'a> Parser<'input, 'a> {
    /// Create a new parser from a lexer, collecting all tokens up front.
    /// Returns the first error the lexer produces.
    fn new(
        lexer: Lexer<'input>,
        dialect: Dialect,
        settings: &'a ParserSettings,
    ) -> FormulaResult<Self> {
        let tokens = lexer.collect::<FormulaResult<Vec<_>>>()?;
        Ok(Parser {
            tokens,
            pos: 0,
            depth: 0,
            dialect,
            settings,
        })
    }

    fn peek(&self) -> Option<&Spanned<Token<'input>>> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|(_, tok, _)| TokenKind::from(tok))
    }

    fn peek_kind_at(&self, offset: usize) -> Option<TokenKind> {
        self.tokens
            .get(self.pos + offset)
            .map(|(_, tok, _)| TokenKind::from(tok))
    }

    /// Consume the current token, which must exist.
    fn bump(&mut self) -> FormulaResult<Spanned<Token<'input>>> {
        match self.tokens.get(self.pos) {
            Some(tok) => {
                self.pos += 1;
                Ok(*tok)
            }
            None => Err(self.unexpected()),
        }
    }

    fn expect(&mut self, expected: TokenKind) -> FormulaResult<Spanned<Token<'input>>> {
        if self.peek_kind() == Some(expected) {
            self.bump()
        } else {
            Err(self.unexpected())
        }
    }

    /// The error for whatever is at the current position.
    fn unexpected(&self) -> FormulaError {
        match self.peek() {
            Some((start, _, end)) => FormulaError::new(ErrorCode::UnrecognizedToken, *start, *end),
            None => {
                let pos = self.eof_position();
                FormulaError::new(ErrorCode::UnrecognizedEof, pos, pos + 1)
            }
        }
    }

    fn eof_position(&self) -> usize {
        if let Some((_, _, end)) = self.tokens.last() {
            *end
        } else {
            0
        }
    }

    /// Runs `f` one level deeper, failing once formulas nest too deeply.
    fn nested<F>(&mut self, f: F) -> FormulaResult<AstNode>
    where
        F: FnOnce(&mut Self) -> FormulaResult<AstNode>,
    {
        self.depth += 1;
        if self.depth > MAX_PARSE_DEPTH {
            let (start, end) = match self.peek() {
                Some((start, _, end)) => (*start, *end),
                None => (self.eof_position(), self.eof_position()),
            };
            return formula_err!(ExpressionTooDeep, start, end);
        }
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn parse_formula(&mut self) -> FormulaResult<AstNode> {
        if self.tokens.is_empty() {
            return formula_err!(EmptyFormula, 0, 0);
        }

        let expr = self.parse_expr()?;

        if let Some((start, _, end)) = self.peek() {
            return formula_err!(ExtraToken, *start, *end);
        }

        Ok(expr)
    }

    fn parse_expr(&mut self) -> FormulaResult<AstNode> {
        self.nested(|parser| match parser.dialect {
            Dialect::L3 => parser.parse_or(),
            Dialect::L1 => parser.parse_additive(),
        })
    }

    /// Parse `||` chains into a single n-ary `or`
    fn parse_or(&mut self) -> FormulaResult<AstNode> {
        let mut operands = vec![self.parse_and()?];
        while self.peek_kind() == Some(TokenKind::Or) {
            self.bump()?;
            operands.push(self.parse_and()?);
        }
        Ok(nary(NodeKind::LogicalOr, operands))
    }

    fn parse_and(&mut self) -> FormulaResult<AstNode> {
        let mut operands = vec![self.parse_relational()?];
        while self.peek_kind() == Some(TokenKind::And) {
            self.bump()?;
            operands.push(self.parse_relational()?);
        }
        Ok(nary(NodeKind::LogicalAnd, operands))
    }

    /// Parse relational operators.  A chain of the same operator,
    /// `a < b < c`, becomes one node; `!=` is strictly binary.
    fn parse_relational(&mut self) -> FormulaResult<AstNode> {
        let mut left = self.parse_additive()?;
        let mut chained = false;

        loop {
            let kind = match self.peek_kind() {
                Some(TokenKind::Lt) => NodeKind::RelationalLt,
                Some(TokenKind::Lte) => NodeKind::RelationalLeq,
                Some(TokenKind::Gt) => NodeKind::RelationalGt,
                Some(TokenKind::Gte) => NodeKind::RelationalGeq,
                Some(TokenKind::EqEq) => NodeKind::RelationalEq,
                Some(TokenKind::Neq) => NodeKind::RelationalNeq,
                _ => break,
            };
            self.bump()?;
            let right = self.parse_additive()?;
            if chained && left.kind() == kind && kind != NodeKind::RelationalNeq {
                left.push(right);
            } else {
                left = AstNode::build(kind, vec![left, right]);
            }
            chained = true;
        }

        Ok(left)
    }

    /// Parse additive operators.  Consecutive `+` collapse into one `plus`
    /// node, but only within a chain: `(a + b) + c` keeps its nesting.
    fn parse_additive(&mut self) -> FormulaResult<AstNode> {
        let mut left = self.parse_multiplicative()?;
        let mut in_sum = false;

        loop {
            match self.peek_kind() {
                Some(TokenKind::Plus) => {
                    self.bump()?;
                    let right = self.parse_multiplicative()?;
                    if in_sum {
                        left.push(right);
                    } else {
                        left = AstNode::build(NodeKind::Plus, vec![left, right]);
                        in_sum = true;
                    }
                }
                Some(TokenKind::Minus) => {
                    self.bump()?;
                    let right = self.parse_multiplicative()?;
                    left = AstNode::build(NodeKind::Minus, vec![left, right]);
                    in_sum = false;
                }
                _ => break,
            }
        }

        Ok(left)
    }

    /// Parse multiplicative operators (*, /, %)
    fn parse_multiplicative(&mut self) -> FormulaResult<AstNode> {
        let mut left = self.parse_unary()?;
        let mut in_product = false;

        loop {
            match self.peek_kind() {
                Some(TokenKind::Mul) => {
                    self.bump()?;
                    let right = self.parse_unary()?;
                    if in_product {
                        left.push(right);
                    } else {
                        left = AstNode::build(NodeKind::Times, vec![left, right]);
                        in_product = true;
                    }
                }
                Some(TokenKind::Div) => {
                    self.bump()?;
                    let right = self.parse_unary()?;
                    left = AstNode::build(NodeKind::Divide, vec![left, right]);
                    in_product = false;
                }
                Some(TokenKind::Percent) if self.dialect == Dialect::L3 => {
                    self.bump()?;
                    let right = self.parse_unary()?;
                    left = if self.settings.modulo_l3v2 {
                        AstNode::build(NodeKind::FunctionRem, vec![left, right])
                    } else {
                        modulo_piecewise(&left, &right)
                    };
                    in_product = false;
                }
                _ => break,
            }
        }

        Ok(left)
    }

    /// Parse unary operators (-, +, !).  They bind tighter than every
    /// binary operator except `^`, so `-a^2` is `-(a^2)`.
    fn parse_unary(&mut self) -> FormulaResult<AstNode> {
        match self.peek_kind() {
            Some(TokenKind::Minus) => {
                self.bump()?;
                let operand = self.nested(Self::parse_unary)?;
                Ok(self.negate(operand))
            }
            Some(TokenKind::Plus) => {
                self.bump()?;
                self.nested(Self::parse_unary)
            }
            Some(TokenKind::Not) if self.dialect == Dialect::L3 => {
                self.bump()?;
                let operand = self.nested(Self::parse_unary)?;
                Ok(AstNode::build(NodeKind::LogicalNot, vec![operand]))
            }
            _ => self.parse_power(),
        }
    }

    fn negate(&self, operand: AstNode) -> AstNode {
        if self.settings.collapse_minus {
            if operand.is_unary_minus() {
                let mut children = operand.into_children();
                return children.remove(0);
            }
            if let Some(negated) = negated_literal(&operand) {
                return negated;
            }
        }
        AstNode::build(NodeKind::Minus, vec![operand])
    }

    /// Parse `^`, which is right associative: `a^b^c` is `a^(b^c)`.
    fn parse_power(&mut self) -> FormulaResult<AstNode> {
        let base = self.parse_postfix()?;

        if self.peek_kind() == Some(TokenKind::Exp) {
            self.bump()?;
            let exponent = self.nested(Self::parse_unary)?;
            return Ok(AstNode::build(NodeKind::Power, vec![base, exponent]));
        }

        Ok(base)
    }

    /// Parse subscripts, `x[i]`, which only a package can give meaning to.
    fn parse_postfix(&mut self) -> FormulaResult<AstNode> {
        let mut expr = self.parse_primary()?;

        while self.dialect == Dialect::L3 && self.peek_kind() == Some(TokenKind::LBracket) {
            let (lpos, _, rpos) = self.bump()?;
            let kind = match self.settings.plugins.subscript_kind() {
                Some(kind) => kind,
                None => return formula_err!(UnsupportedSyntax, lpos, rpos),
            };
            let mut children = vec![expr];
            children.extend(self.parse_list(TokenKind::RBracket)?);
            self.expect(TokenKind::RBracket)?;
            expr = AstNode::build(kind, children);
        }

        Ok(expr)
    }

    /// Parse an atomic expression: a number, identifier, call, or
    /// parenthesized expression
    fn parse_primary(&mut self) -> FormulaResult<AstNode> {
        let (lpos, tok, rpos) = match self.peek() {
            Some(tok) => *tok,
            None => return Err(self.unexpected()),
        };

        match tok {
            Token::Num(text) => {
                self.bump()?;
                let mut number = parse_number(text, lpos, rpos)?;
                if self.dialect == Dialect::L3
                    && self.settings.parse_units
                    && self.peek_kind() == Some(TokenKind::Ident)
                    && self.peek_kind_at(1) != Some(TokenKind::LParen)
                {
                    let (upos, units, uend) = self.bump()?;
                    if let Token::Ident(units) = units {
                        number
                            .set_units(units)
                            .map_err(|err| FormulaError::new(err.code, upos, uend))?;
                    }
                }
                Ok(number)
            }
            Token::Ident(name) => {
                self.bump()?;
                if self.peek_kind() == Some(TokenKind::LParen) {
                    self.bump()?;
                    let args = self.parse_list(TokenKind::RParen)?;
                    let (_, _, rpos) = self.expect(TokenKind::RParen)?;
                    self.call(name, args, lpos, rpos)
                } else {
                    Ok(self.identifier(name))
                }
            }
            Token::LParen => {
                self.bump()?;
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            Token::LBrace if self.dialect == Dialect::L3 => {
                self.bump()?;
                let kind = match self.settings.plugins.braces_kind() {
                    Some(kind) => kind,
                    None => return formula_err!(UnsupportedSyntax, lpos, rpos),
                };
                let items = self.parse_list(TokenKind::RBrace)?;
                self.expect(TokenKind::RBrace)?;
                Ok(AstNode::build(kind, items))
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Parse comma-separated expressions up to (not including) `close`
    fn parse_list(&mut self, close: TokenKind) -> FormulaResult<Vec<AstNode>> {
        let mut exprs = Vec::new();

        if self.peek_kind() == Some(close) {
            return Ok(exprs);
        }

        exprs.push(self.parse_expr()?);
        while self.peek_kind() == Some(TokenKind::Comma) {
            self.bump()?;
            exprs.push(self.parse_expr()?);
        }

        Ok(exprs)
    }

    fn is_model_id(&self, name: &str) -> bool {
        self.settings
            .model
            .as_ref()
            .is_some_and(|model| model.has_identifier(name))
    }

    // the form of `name` compared against built-in names, which are
    // spelled canonically
    fn builtin_key(&self, name: &str) -> String {
        if self.settings.case_sensitive {
            return name.to_owned();
        }
        let key = name.to_lowercase();
        match key.as_str() {
            "rateof" => "rateOf".to_owned(),
            "inf" => "INF".to_owned(),
            "nan" => "NaN".to_owned(),
            _ => key,
        }
    }

    fn identifier(&self, name: &str) -> AstNode {
        if self.is_model_id(name) {
            return AstNode::new_name(name);
        }

        let l3 = self.dialect == Dialect::L3;
        match self.builtin_key(name).as_str() {
            "pi" => AstNode::new(NodeKind::ConstantPi),
            "exponentiale" => AstNode::new(NodeKind::ConstantE),
            "true" => AstNode::new(NodeKind::ConstantTrue),
            "false" => AstNode::new(NodeKind::ConstantFalse),
            "INF" | "infinity" => AstNode::new_real(f64::INFINITY),
            "NaN" | "notanumber" => AstNode::new_real(f64::NAN),
            "avogadro" if l3 && self.settings.avogadro_csymbol => {
                AstNode::new(NodeKind::NameAvogadro).with_name(name)
            }
            "time" if l3 => AstNode::new(NodeKind::NameTime).with_name(name),
            _ => AstNode::new_name(name),
        }
    }

    /// Builds the node for `name(args)`.  Package functions come first,
    /// then the model's function definitions, then the built-in names;
    /// anything else is a call of a user-defined function.
    fn call(
        &self,
        name: &str,
        mut args: Vec<AstNode>,
        start: usize,
        end: usize,
    ) -> FormulaResult<AstNode> {
        use NodeKind::*;

        if let Some(kind) = self.settings.plugins.function_kind(name) {
            return self.checked(name, kind, args, start, end);
        }
        if let Some(model) = &self.settings.model {
            if model.function_definition(name).is_some() {
                return Ok(user_function(name, args));
            }
        }

        let l3 = self.dialect == Dialect::L3;
        let kind = match self.builtin_key(name).as_str() {
            "lambda" => return self.lambda(args, start, end),
            "sqrt" => return self.implicit_first(name, FunctionRoot, 2, args, start, end),
            "log10" => return self.implicit_first(name, FunctionLog, 10, args, start, end),
            "log" if args.len() == 1 => match (self.dialect, self.settings.parse_log) {
                (Dialect::L1, _) | (_, ParseLogType::Ln) => FunctionLn,
                (_, ParseLogType::Log10) => {
                    return self.implicit_first(name, FunctionLog, 10, args, start, end);
                }
                (_, ParseLogType::Error) => {
                    return Err(FormulaError::new(ErrorCode::AmbiguousLog, start, end)
                        .with_details("log(x) could be either log10(x) or ln(x)"));
                }
            },
            "sqr" if !l3 => {
                if args.len() != 1 {
                    return Err(bad_argument_count(name, args.len(), start, end));
                }
                args.push(AstNode::new_integer(2));
                Power
            }
            "pow" if !l3 => FunctionPower,
            "pow" | "power" => Power,
            "ceil" => FunctionCeiling,
            "delay" if l3 => FunctionDelay,
            "rateOf" if l3 => FunctionRateOf,
            "asin" => FunctionArcsin,
            "acos" => FunctionArccos,
            "atan" => FunctionArctan,
            "acot" => FunctionArccot,
            "acsc" => FunctionArccsc,
            "asec" => FunctionArcsec,
            "asinh" => FunctionArcsinh,
            "acosh" => FunctionArccosh,
            "atanh" => FunctionArctanh,
            "acoth" => FunctionArccoth,
            "acsch" => FunctionArccsch,
            "asech" => FunctionArcsech,
            key => match kinds::kind_from_name(key) {
                Function | Lambda => return Ok(user_function(name, args)),
                kind if kinds::is_callable(kind, None) => kind,
                _ => return Ok(user_function(name, args)),
            },
        };

        self.checked(name, kind, args, start, end)
    }

    fn checked(
        &self,
        name: &str,
        kind: NodeKind,
        args: Vec<AstNode>,
        start: usize,
        end: usize,
    ) -> FormulaResult<AstNode> {
        if let Some(arity) = kinds::arity(kind, Some(&self.settings.plugins)) {
            if !arity.accepts(args.len()) {
                return Err(bad_argument_count(name, args.len(), start, end));
            }
        }
        Ok(AstNode::build(kind, args))
    }

    // `sqrt(x)` and `log10(x)`: one argument, with the degree or base
    // made explicit
    fn implicit_first(
        &self,
        name: &str,
        kind: NodeKind,
        first: i64,
        args: Vec<AstNode>,
        start: usize,
        end: usize,
    ) -> FormulaResult<AstNode> {
        if args.len() != 1 {
            return Err(bad_argument_count(name, args.len(), start, end));
        }
        let mut children = vec![AstNode::new_integer(first)];
        children.extend(args);
        Ok(AstNode::build(kind, children))
    }

    fn lambda(&self, args: Vec<AstNode>, start: usize, end: usize) -> FormulaResult<AstNode> {
        let bvars = match args.split_last() {
            Some((_, bvars)) => bvars,
            None => return Err(bad_argument_count("lambda", 0, start, end)),
        };
        if bvars.iter().any(|bvar| bvar.kind() != NodeKind::Name) {
            return Err(FormulaError::new(ErrorCode::BadLambdaArgument, start, end)
                .with_details("lambda arguments must be plain names"));
        }
        Ok(AstNode::build(NodeKind::Lambda, args))
    }
}

fn bad_argument_count(name: &str, n: usize, start: usize, end: usize) -> FormulaError {
    FormulaError::new(ErrorCode::BadArgumentCount, start, end)
        .with_details(format!("'{name}' does not take {n} arguments"))
}

fn nary(kind: NodeKind, mut operands: Vec<AstNode>) -> AstNode {
    if operands.len() == 1 {
        operands.remove(0)
    } else {
        AstNode::build(kind, operands)
    }
}

fn user_function(name: &str, args: Vec<AstNode>) -> AstNode {
    AstNode::build(NodeKind::Function, args).with_name(name)
}

fn parse_number(text: &str, start: usize, end: usize) -> FormulaResult<AstNode> {
    let bad = |_| FormulaError::new(ErrorCode::ExpectedNumber, start, end);

    if let Some(e) = text.find(['e', 'E']) {
        let mantissa = text[..e].parse::<f64>().map_err(bad)?;
        let exponent = text[e + 1..]
            .parse::<i64>()
            .map_err(|_| FormulaError::new(ErrorCode::ExpectedNumber, start, end))?;
        return Ok(AstNode::new_real_e(mantissa, exponent));
    }
    if text.contains('.') {
        return text.parse::<f64>().map(AstNode::new_real).map_err(bad);
    }
    match text.parse::<i64>() {
        Ok(n) => Ok(AstNode::new_integer(n)),
        // too wide for an integer
        Err(_) => text.parse::<f64>().map(AstNode::new_real).map_err(bad),
    }
}

fn negated_literal(node: &AstNode) -> Option<AstNode> {
    let mut negated = match node.data() {
        NodeData::Integer(n) => AstNode::new_integer(n.checked_neg()?),
        NodeData::Real(r) => AstNode::new_real(-r),
        NodeData::RealE { mantissa, exponent } => AstNode::new_real_e(-mantissa, exponent),
        NodeData::Rational {
            numerator,
            denominator,
        } => AstNode::new_rational(numerator.checked_neg()?, denominator),
        NodeData::None => return None,
    };
    if let Some(units) = node.units() {
        negated.set_units(units).ok()?;
    }
    Some(negated)
}

/// The expansion of `a % b`, a remainder with the sign of `a`:
/// `piecewise(a - b*ceiling(a/b), xor(a < 0, b < 0), a - b*floor(a/b))`.
pub(crate) fn modulo_piecewise(a: &AstNode, b: &AstNode) -> AstNode {
    use NodeKind::*;

    let rounded = |kind| {
        let quotient = AstNode::build(Divide, vec![a.clone(), b.clone()]);
        let product = AstNode::build(Times, vec![b.clone(), AstNode::build(kind, vec![quotient])]);
        AstNode::build(Minus, vec![a.clone(), product])
    };
    let negative = |x: &AstNode| AstNode::build(RelationalLt, vec![x.clone(), AstNode::new_integer(0)]);

    AstNode::build(
        FunctionPiecewise,
        vec![
            rounded(FunctionCeiling),
            AstNode::build(LogicalXor, vec![negative(a), negative(b)]),
            rounded(FunctionFloor),
        ],
    )
}

fn parse(text: &str, dialect: Dialect, settings: &ParserSettings) -> FormulaResult<AstNode> {
    let lexer = Lexer::new(text);
    let mut parser = Parser::new(lexer, dialect, settings)?;
    parser.parse_formula()
}

/// Parses an SBML Level 1 formula.  Relational and logical operators
/// are written as function calls, and `log(x)` is the natural log.
pub fn parse_formula(text: &str) -> FormulaResult<AstNode> {
    let settings = ParserSettings {
        parse_log: ParseLogType::Ln,
        parse_units: false,
        avogadro_csymbol: false,
        ..ParserSettings::default()
    };
    parse(text, Dialect::L1, &settings)
}

/// Parses a Level 3 formula with the default settings.
pub fn parse_l3_formula(text: &str) -> FormulaResult<AstNode> {
    parse_l3_formula_with_settings(text, &ParserSettings::default())
}

pub fn parse_l3_formula_with_settings(
    text: &str,
    settings: &ParserSettings,
) -> FormulaResult<AstNode> {
    parse(text, Dialect::L3, settings)
}

/// Parses a Level 3 formula, recording any failure in `log` and standing
/// an `unknown` node in for the formula.
pub fn parse_l3_formula_logged(
    text: &str,
    settings: &ParserSettings,
    log: &mut ErrorLog,
) -> AstNode {
    match parse_l3_formula_with_settings(text, settings) {
        Ok(node) => node,
        Err(err) => {
            log.log_formula_error(text, &err);
            AstNode::new(NodeKind::Unknown)
        }
    }
}
