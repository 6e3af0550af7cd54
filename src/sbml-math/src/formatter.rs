// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Infix text for expression trees; parsing the output gives back the
//! same tree.

use crate::ast::{AstNode, NodeData};
use crate::kinds::{self, NodeKind};
use crate::parser::modulo_piecewise;
use crate::settings::ParserSettings;

const UNARY: u8 = 6;
const POWER: u8 = 7;
const ATOM: u8 = 8;

/// How a node is laid out in infix text.
#[derive(Clone, Copy)]
enum Shape<'n> {
    Infix(&'static str, u8),
    Prefix(&'static str, u8),
    Modulo(&'n AstNode, &'n AstNode),
    Call,
}

struct PrintVisitor<'a> {
    l3: bool,
    settings: &'a ParserSettings,
}

impl PrintVisitor<'_> {
    fn shape<'n>(&self, node: &'n AstNode) -> Shape<'n> {
        use NodeKind::*;
        use Shape::*;

        let n = node.num_children();
        match node.kind() {
            Plus if n >= 2 => Infix("+", 4),
            Minus if n == 2 => Infix("-", 4),
            Minus if n == 1 => Prefix("-", UNARY),
            Times if n >= 2 => Infix("*", 5),
            Divide if n == 2 => Infix("/", 5),
            Power if n == 2 => Infix("^", POWER),
            _ if !self.l3 => Call,
            FunctionPower if n == 2 => Infix("^", POWER),
            LogicalOr if n >= 2 => Infix("||", 1),
            LogicalAnd if n >= 2 => Infix("&&", 2),
            LogicalNot if n == 1 => Prefix("!", UNARY),
            RelationalNeq if n == 2 => Infix("!=", 3),
            RelationalEq if n >= 2 => Infix("==", 3),
            RelationalGt if n >= 2 => Infix(">", 3),
            RelationalGeq if n >= 2 => Infix(">=", 3),
            RelationalLt if n >= 2 => Infix("<", 3),
            RelationalLeq if n >= 2 => Infix("<=", 3),
            FunctionRem if n == 2 && self.settings.modulo_l3v2 => Infix("%", 5),
            FunctionPiecewise if !self.settings.modulo_l3v2 => match modulo_operands(node) {
                Some((a, b)) => Modulo(a, b),
                None => Call,
            },
            _ => Call,
        }
    }

    fn precedence(&self, node: &AstNode) -> u8 {
        if node.kind() == NodeKind::Semantics && node.num_children() == 1 {
            return self.precedence(&node.children()[0]);
        }
        match self.shape(node) {
            Shape::Infix(_, p) | Shape::Prefix(_, p) => p,
            Shape::Modulo(..) => 5,
            // a leading minus binds like unary minus
            Shape::Call if node.is_negative_literal() => UNARY,
            Shape::Call => ATOM,
        }
    }

    fn child_needs_parens(&self, parent: &AstNode, child: &AstNode, index: usize) -> bool {
        let child_prec = self.precedence(child);
        match self.shape(parent) {
            // children are comma separated, so no ambiguity possible
            Shape::Call => false,
            Shape::Prefix(_, p) => child_prec <= p,
            Shape::Modulo(..) => child_prec < 5 || (child_prec == 5 && index > 0),
            // (a^b)^c
            Shape::Infix("^", p) if index == 0 => child_prec <= p,
            Shape::Infix(_, p) => {
                child_prec < p
                    || (child_prec == p
                        && (index > 0 || p == 3 || collapses_into(parent.kind(), child.kind())))
            }
        }
    }

    fn operand(&self, parent: &AstNode, child: &AstNode, index: usize) -> String {
        let text = self.walk(child);
        if self.child_needs_parens(parent, child, index) {
            format!("({text})")
        } else {
            text
        }
    }

    fn walk(&self, node: &AstNode) -> String {
        use NodeKind::*;

        match self.shape(node) {
            Shape::Infix(op, _) => {
                let operands: Vec<String> = node
                    .children()
                    .iter()
                    .enumerate()
                    .map(|(i, child)| self.operand(node, child, i))
                    .collect();
                let sep = if op == "^" { op.to_owned() } else { format!(" {op} ") };
                return operands.join(&sep);
            }
            Shape::Prefix(op, _) => {
                return format!("{op}{}", self.operand(node, &node.children()[0], 0));
            }
            Shape::Modulo(a, b) => {
                return format!("{} % {}", self.operand(node, a, 0), self.operand(node, b, 1));
            }
            Shape::Call => {}
        }

        match node.kind() {
            Integer | Real | RealE | Rational => self.number(node),
            Name => node.name().unwrap_or_default().to_owned(),
            NameTime => node.name().unwrap_or("time").to_owned(),
            NameAvogadro => node.name().unwrap_or("avogadro").to_owned(),
            ConstantE => "exponentiale".to_owned(),
            ConstantPi => "pi".to_owned(),
            ConstantTrue => "true".to_owned(),
            ConstantFalse => "false".to_owned(),
            Semantics if node.num_children() == 1 => self.walk(&node.children()[0]),
            FunctionRoot if node.is_sqrt() => {
                format!("sqrt({})", self.walk(&node.children()[1]))
            }
            FunctionLog if node.is_log10() => {
                format!("log10({})", self.walk(&node.children()[1]))
            }
            FunctionLn if !self.l3 => self.call("log", node),
            Power | FunctionPower => self.call("pow", node),
            Function => self.call(node.name().unwrap_or_default(), node),
            Unknown => self.call(node.name().unwrap_or("unknown"), node),
            Extension(_) => {
                let args: Vec<String> = node.children().iter().map(|c| self.walk(c)).collect();
                match self.settings.plugins.format(node, &args) {
                    Some(text) => text,
                    None => {
                        let plugins = Some(&self.settings.plugins);
                        let name =
                            kinds::name_from_kind_with(node.kind(), plugins).unwrap_or("unknown");
                        format!("{name}({})", args.join(", "))
                    }
                }
            }
            kind => self.call(kinds::name_from_kind(kind).unwrap_or("unknown"), node),
        }
    }

    fn call(&self, name: &str, node: &AstNode) -> String {
        let args: Vec<String> = node.children().iter().map(|c| self.walk(c)).collect();
        format!("{name}({})", args.join(", "))
    }

    fn number(&self, node: &AstNode) -> String {
        let text = match node.data() {
            NodeData::Integer(n) => n.to_string(),
            NodeData::Real(r) => format_real(r),
            NodeData::RealE { mantissa, exponent } => format!("{mantissa}e{exponent}"),
            NodeData::Rational {
                numerator,
                denominator,
            } => format!("({numerator}/{denominator})"),
            NodeData::None => String::new(),
        };
        match node.units() {
            Some(units) if self.l3 && self.settings.print_units => format!("{text} {units}"),
            _ => text,
        }
    }
}

// `+`, `*`, `&&` and `||` chains parse into a single node, so a left
// operand of the same kind has to stay grouped
fn collapses_into(parent: NodeKind, child: NodeKind) -> bool {
    use NodeKind::*;
    parent == child && matches!(parent, Plus | Times | LogicalAnd | LogicalOr)
}

fn format_real(r: f64) -> String {
    if r.is_nan() {
        "NaN".to_owned()
    } else if r == f64::INFINITY {
        "INF".to_owned()
    } else if r == f64::NEG_INFINITY {
        "-INF".to_owned()
    } else {
        // Debug always marks a real, as in `3.0` or `1e20`
        format!("{r:?}")
    }
}

/// The operands of a piecewise node in the exact shape `a % b` parses to.
fn modulo_operands(node: &AstNode) -> Option<(&AstNode, &AstNode)> {
    let [_, cond, _] = node.children() else {
        return None;
    };
    if cond.kind() != NodeKind::LogicalXor {
        return None;
    }
    let [a_negative, b_negative] = cond.children() else {
        return None;
    };
    let a = a_negative.child(0)?;
    let b = b_negative.child(0)?;
    if modulo_piecewise(a, b) == *node {
        Some((a, b))
    } else {
        None
    }
}

/// Level 1 infix text: relational and logical operators are written as
/// function calls, and the natural log as `log`.
pub fn formula_to_string(node: &AstNode) -> String {
    let settings = ParserSettings::default();
    let visitor = PrintVisitor {
        l3: false,
        settings: &settings,
    };
    visitor.walk(node)
}

pub fn formula_to_l3_string(node: &AstNode) -> String {
    formula_to_l3_string_with_settings(node, &ParserSettings::default())
}

pub fn formula_to_l3_string_with_settings(node: &AstNode, settings: &ParserSettings) -> String {
    let visitor = PrintVisitor { l3: true, settings };
    visitor.walk(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::NodeKind::*;
    use crate::parser::{parse_formula, parse_l3_formula, parse_l3_formula_with_settings};
    use crate::testutils::{call, int, op, real, x};

    fn l3(node: &AstNode) -> String {
        formula_to_l3_string(node)
    }

    #[test]
    fn test_grouping() {
        let cases = vec![
            (op(Plus, vec![x("a"), op(Times, vec![x("b"), x("c")])]), "a + b * c"),
            (op(Times, vec![op(Plus, vec![x("a"), x("b")]), x("c")]), "(a + b) * c"),
            (op(Minus, vec![op(Minus, vec![x("a"), x("b")]), x("c")]), "a - b - c"),
            (op(Minus, vec![x("a"), op(Minus, vec![x("b"), x("c")])]), "a - (b - c)"),
            (op(Plus, vec![op(Plus, vec![x("a"), x("b")]), x("c")]), "(a + b) + c"),
            (op(Plus, vec![x("a"), x("b"), x("c")]), "a + b + c"),
            (op(Plus, vec![op(Minus, vec![x("a"), x("b")]), x("c")]), "a - b + c"),
            (op(Divide, vec![x("a"), op(Times, vec![x("b"), x("c")])]), "a / (b * c)"),
            (op(Power, vec![op(Power, vec![x("a"), x("b")]), x("c")]), "(a^b)^c"),
            (op(Power, vec![x("a"), op(Power, vec![x("b"), x("c")])]), "a^(b^c)"),
            (op(Minus, vec![op(Power, vec![x("a"), int(2)])]), "-a^2"),
            (op(Power, vec![op(Minus, vec![x("a")]), int(2)]), "(-a)^2"),
            (op(Power, vec![int(-2), int(2)]), "(-2)^2"),
            (op(Power, vec![op(Plus, vec![x("a"), x("b")]), x("c")]), "(a + b)^c"),
            (op(Times, vec![x("k"), op(Power, vec![x("S"), x("n")])]), "k * S^n"),
            (op(Minus, vec![op(Plus, vec![x("a"), x("b")])]), "-(a + b)"),
            (op(Minus, vec![op(Minus, vec![x("a")])]), "-(-a)"),
            (op(Times, vec![x("a"), int(-2)]), "a * -2"),
        ];

        for (node, expected) in cases {
            assert_eq!(expected, l3(&node));
        }
    }

    #[test]
    fn test_logical_and_relational() {
        let cases = vec![
            (op(RelationalLt, vec![x("a"), x("b"), x("c")]), "a < b < c"),
            (
                op(RelationalLt, vec![op(RelationalLt, vec![x("a"), x("b")]), x("c")]),
                "(a < b) < c",
            ),
            (op(RelationalNeq, vec![x("a"), x("b")]), "a != b"),
            (op(RelationalEq, vec![x("a"), x("b")]), "a == b"),
            (
                op(
                    LogicalAnd,
                    vec![op(LogicalOr, vec![x("a"), x("b")]), x("c")],
                ),
                "(a || b) && c",
            ),
            (
                op(
                    LogicalOr,
                    vec![op(LogicalAnd, vec![x("a"), x("b")]), x("c")],
                ),
                "a && b || c",
            ),
            (op(LogicalNot, vec![op(LogicalAnd, vec![x("a"), x("b")])]), "!(a && b)"),
            (op(LogicalXor, vec![x("a"), x("b")]), "xor(a, b)"),
            (op(LogicalImplies, vec![x("a"), x("b")]), "implies(a, b)"),
            (op(RelationalGt, vec![x("a")]), "gt(a)"),
        ];

        for (node, expected) in cases {
            assert_eq!(expected, l3(&node));
        }
    }

    #[test]
    fn test_sugar() {
        assert_eq!("sqrt(x)", l3(&op(FunctionRoot, vec![int(2), x("x")])));
        assert_eq!("root(3, x)", l3(&op(FunctionRoot, vec![int(3), x("x")])));
        assert_eq!("log10(x)", l3(&op(FunctionLog, vec![int(10), x("x")])));
        assert_eq!("log(2, x)", l3(&op(FunctionLog, vec![int(2), x("x")])));
        assert_eq!("ln(x)", l3(&op(FunctionLn, vec![x("x")])));

        let modulo = modulo_piecewise(&x("a"), &op(Plus, vec![x("b"), int(1)]));
        assert_eq!("a % (b + 1)", l3(&modulo));
        assert_eq!(
            "a * b % c",
            l3(&modulo_piecewise(&op(Times, vec![x("a"), x("b")]), &x("c")))
        );
        // a near miss stays a piecewise
        let mut near = modulo_piecewise(&x("a"), &x("b"));
        near.replace_child(2, int(0)).unwrap();
        assert!(l3(&near).starts_with("piecewise("));

        let rem = op(FunctionRem, vec![x("a"), x("b")]);
        assert_eq!("rem(a, b)", l3(&rem));
        let settings = ParserSettings::new().with_modulo_l3v2(true);
        assert_eq!("a % b", formula_to_l3_string_with_settings(&rem, &settings));
    }

    #[test]
    fn test_numbers() {
        assert_eq!("3", l3(&int(3)));
        assert_eq!("3.0", l3(&real(3.0)));
        assert_eq!("2.5", l3(&real(2.5)));
        assert_eq!("1e20", l3(&real(1e20)));
        assert_eq!("INF", l3(&real(f64::INFINITY)));
        assert_eq!("-INF", l3(&real(f64::NEG_INFINITY)));
        assert_eq!("NaN", l3(&real(f64::NAN)));
        assert_eq!("1e3", l3(&AstNode::new_real_e(1.0, 3)));
        assert_eq!("2.5e-3", l3(&AstNode::new_real_e(2.5, -3)));
        assert_eq!("(1/2)", l3(&AstNode::new_rational(1, 2)));

        let mut n = int(5);
        n.set_units("mole").unwrap();
        assert_eq!("5 mole", l3(&n));
        let quiet = ParserSettings::new().with_print_units(false);
        assert_eq!("5", formula_to_l3_string_with_settings(&n, &quiet));
        assert_eq!("5", formula_to_string(&n));
    }

    #[test]
    fn test_functions() {
        assert_eq!("f(a, 1)", l3(&call("f", vec![x("a"), int(1)])));
        assert_eq!("g()", l3(&call("g", vec![])));
        assert_eq!("plus()", l3(&op(Plus, vec![])));
        assert_eq!("plus(a)", l3(&op(Plus, vec![x("a")])));
        assert_eq!("delay(x, 2)", l3(&op(FunctionDelay, vec![x("x"), int(2)])));
        assert_eq!("rateOf(x)", l3(&op(FunctionRateOf, vec![x("x")])));
        assert_eq!("ceiling(x)", l3(&op(FunctionCeiling, vec![x("x")])));
        assert_eq!(
            "max(a, b, c)",
            l3(&op(FunctionMax, vec![x("a"), x("b"), x("c")]))
        );
        assert_eq!("pi", l3(&AstNode::new(ConstantPi)));
        assert_eq!(
            "lambda(x, y, x * y)",
            l3(&parse_l3_formula("lambda(x, y, x * y)").unwrap())
        );
        assert_eq!(
            "piecewise(1, x > 0, 2)",
            l3(&parse_l3_formula("piecewise(1, x > 0, 2)").unwrap())
        );
        assert_eq!("time", l3(&parse_l3_formula("time").unwrap()));
    }

    #[test]
    fn test_level1() {
        let cases = vec![
            (op(RelationalLt, vec![x("a"), x("b")]), "lt(a, b)"),
            (op(LogicalAnd, vec![x("a"), x("b")]), "and(a, b)"),
            (op(LogicalNot, vec![x("a")]), "not(a)"),
            (op(FunctionLn, vec![x("x")]), "log(x)"),
            (op(FunctionPower, vec![x("a"), x("b")]), "pow(a, b)"),
            (op(Power, vec![x("a"), x("b")]), "a^b"),
            (op(Times, vec![op(Plus, vec![x("a"), x("b")]), x("c")]), "(a + b) * c"),
            (op(Minus, vec![x("a")]), "-a"),
        ];

        for (node, expected) in cases {
            assert_eq!(expected, formula_to_string(&node));
            assert_eq!(node, parse_formula(expected).unwrap(), "{expected}");
        }
    }

    #[test]
    fn test_round_trip() {
        let formulas = [
            "a + b * c",
            "(a + b) + c",
            "a - b - c",
            "a - (b - c)",
            "-a^2",
            "(-a)^2",
            "a^(b^c)",
            "a < b < c",
            "(a < b) < c",
            "a == b && c || !d",
            "(a || b) && c",
            "sqrt(x) + log10(y) + ln(z)",
            "a % b",
            "a % (b + 1) * 2",
            "f(x, g(y))",
            "lambda(x, y, x^y)",
            "delay(x, 2.5) * rateOf(y)",
            "5 mole + 1e3 mole",
            "piecewise(1, x > 0, 2)",
            "-(a + b)",
        ];

        for formula in formulas {
            let parsed = parse_l3_formula(formula).unwrap();
            let printed = l3(&parsed);
            assert_eq!(formula, printed);
            assert_eq!(parsed, parse_l3_formula(&printed).unwrap());
        }

        let settings = ParserSettings::new().with_modulo_l3v2(true);
        let parsed = parse_l3_formula_with_settings("a % b % c", &settings).unwrap();
        assert_eq!(
            "a % b % c",
            formula_to_l3_string_with_settings(&parsed, &settings)
        );
    }
}
