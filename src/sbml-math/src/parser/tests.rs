// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::sync::Arc;

use super::*;
use crate::formatter::formula_to_l3_string;
use crate::kinds::NodeKind::*;
use crate::model::Model;
use crate::testutils::{call, int, op, real, x};

fn parse_ok(input: &str) -> AstNode {
    match parse_l3_formula(input) {
        Ok(node) => node,
        Err(err) => panic!("'{input}' failed to parse: {err}"),
    }
}

fn parse_with(input: &str, settings: &ParserSettings) -> AstNode {
    match parse_l3_formula_with_settings(input, settings) {
        Ok(node) => node,
        Err(err) => panic!("'{input}' failed to parse: {err}"),
    }
}

fn parse_err(input: &str) -> ErrorCode {
    match parse_l3_formula(input) {
        Ok(node) => panic!("'{input}' unexpectedly parsed as {node:?}"),
        Err(err) => err.code,
    }
}

#[test]
fn test_arithmetic_precedence() {
    let cases = vec![
        ("a + b * c", op(Plus, vec![x("a"), op(Times, vec![x("b"), x("c")])])),
        ("(a + b) * c", op(Times, vec![op(Plus, vec![x("a"), x("b")]), x("c")])),
        ("a - b - c", op(Minus, vec![op(Minus, vec![x("a"), x("b")]), x("c")])),
        ("a / b / c", op(Divide, vec![op(Divide, vec![x("a"), x("b")]), x("c")])),
        ("a * b / c", op(Divide, vec![op(Times, vec![x("a"), x("b")]), x("c")])),
        ("-a^2", op(Minus, vec![op(Power, vec![x("a"), int(2)])])),
        ("a^b^c", op(Power, vec![x("a"), op(Power, vec![x("b"), x("c")])])),
        ("2^-3", op(Power, vec![int(2), op(Minus, vec![int(3)])])),
        ("-a * b", op(Times, vec![op(Minus, vec![x("a")]), x("b")])),
        ("+a", x("a")),
    ];

    for (input, expected) in cases {
        assert_eq!(expected, parse_ok(input), "{input}");
    }
}

#[test]
fn test_nary_chains() {
    assert_eq!(
        op(Plus, vec![x("a"), x("b"), x("c")]),
        parse_ok("a + b + c")
    );
    // only a chain collapses; explicit grouping is kept
    assert_eq!(
        op(Plus, vec![op(Plus, vec![x("a"), x("b")]), x("c")]),
        parse_ok("(a + b) + c")
    );
    assert_eq!(
        op(Plus, vec![op(Minus, vec![op(Plus, vec![x("a"), x("b")]), x("c")]), x("d")]),
        parse_ok("a + b - c + d")
    );
    assert_eq!(
        op(Times, vec![x("a"), x("b"), x("c")]),
        parse_ok("a * b * c")
    );
    assert_eq!(
        op(LogicalAnd, vec![x("a"), x("b"), x("c")]),
        parse_ok("a && b && c")
    );
}

#[test]
fn test_relational_and_logical() {
    assert_eq!(
        op(RelationalLt, vec![x("a"), x("b"), x("c")]),
        parse_ok("a < b < c")
    );
    assert_eq!(
        op(
            RelationalGt,
            vec![op(RelationalLt, vec![x("a"), x("b")]), x("c")]
        ),
        parse_ok("a < b > c")
    );
    assert_eq!(
        op(
            RelationalNeq,
            vec![op(RelationalNeq, vec![x("a"), x("b")]), x("c")]
        ),
        parse_ok("a != b != c")
    );
    assert_eq!(
        op(
            LogicalOr,
            vec![
                op(
                    LogicalAnd,
                    vec![op(RelationalEq, vec![x("a"), x("b")]), x("c")]
                ),
                op(LogicalNot, vec![x("d")]),
            ]
        ),
        parse_ok("a == b && c || !d")
    );
    assert_eq!(
        op(
            RelationalGeq,
            vec![op(Plus, vec![x("a"), int(1)]), op(Times, vec![x("b"), int(2)])]
        ),
        parse_ok("a + 1 >= b * 2")
    );
    assert_eq!(
        op(RelationalLeq, vec![x("a"), x("b")]),
        parse_ok("a <= b")
    );
}

#[test]
fn test_collapse_minus() {
    assert_eq!(
        op(Minus, vec![op(Minus, vec![x("a")])]),
        parse_ok("--a")
    );
    assert_eq!(op(Minus, vec![int(2)]), parse_ok("-2"));

    let settings = ParserSettings::new().with_collapse_minus(true);
    assert_eq!(x("a"), parse_with("--a", &settings));
    assert_eq!(int(-2), parse_with("-2", &settings));
    assert_eq!(real(-2.5), parse_with("-2.5", &settings));
    assert_eq!(
        op(Minus, vec![x("a")]),
        parse_with("---a", &settings)
    );
    assert!(parse_with("-2", &settings).is_negative_literal());
}

#[test]
fn test_modulo() {
    let expected = modulo_piecewise(&x("a"), &x("b"));
    assert_eq!(expected, parse_ok("a % b"));
    assert_eq!(FunctionPiecewise, expected.kind());
    assert_eq!(3, expected.num_children());
    assert_eq!(LogicalXor, expected.children()[1].kind());

    let settings = ParserSettings::new().with_modulo_l3v2(true);
    assert_eq!(
        op(FunctionRem, vec![x("a"), x("b")]),
        parse_with("a % b", &settings)
    );
}

#[test]
fn test_numbers() {
    assert_eq!(int(42), parse_ok("42"));
    assert_eq!(real(2.5), parse_ok("2.5"));
    assert_eq!(real(0.5), parse_ok(".5"));
    assert_eq!(real(3.0), parse_ok("3."));
    assert_eq!(AstNode::new_real_e(1.0, 3), parse_ok("1e3"));
    assert_eq!(AstNode::new_real_e(2.5, -3), parse_ok("2.5E-3"));
    // too wide for an i64
    assert_eq!(real(1e20), parse_ok("100000000000000000000"));
}

#[test]
fn test_numbers_with_units() {
    let node = parse_ok("5 mole");
    assert_eq!(Integer, node.kind());
    assert_eq!(Some("mole"), node.units());

    let node = parse_ok("1.5 per_second * k");
    assert_eq!(Times, node.kind());
    assert_eq!(Some("per_second"), node.children()[0].units());

    let settings = ParserSettings::new().with_parse_units(false);
    let err = parse_l3_formula_with_settings("5 mole", &settings).unwrap_err();
    assert_eq!(ErrorCode::ExtraToken, err.code);
    assert_eq!((2, 6), (err.start, err.end));
}

#[test]
fn test_log_variants() {
    assert_eq!(
        op(FunctionLog, vec![int(10), x("x")]),
        parse_ok("log(x)")
    );
    assert_eq!(
        op(FunctionLog, vec![int(2), x("x")]),
        parse_ok("log(2, x)")
    );
    assert_eq!(
        op(FunctionLog, vec![int(10), x("x")]),
        parse_ok("log10(x)")
    );
    assert_eq!(op(FunctionLn, vec![x("x")]), parse_ok("ln(x)"));

    let ln = ParserSettings::new().with_parse_log(ParseLogType::Ln);
    assert_eq!(op(FunctionLn, vec![x("x")]), parse_with("log(x)", &ln));

    let strict = ParserSettings::new().with_parse_log(ParseLogType::Error);
    let err = parse_l3_formula_with_settings("log(x)", &strict).unwrap_err();
    assert_eq!(ErrorCode::AmbiguousLog, err.code);
    // an explicit base is never ambiguous
    assert!(parse_l3_formula_with_settings("log(10, x)", &strict).is_ok());
}

#[test]
fn test_sqrt_and_root() {
    let node = parse_ok("sqrt(x)");
    assert_eq!(op(FunctionRoot, vec![int(2), x("x")]), node);
    assert!(node.is_sqrt());
    assert_eq!(op(FunctionRoot, vec![int(3), x("x")]), parse_ok("root(3, x)"));
    assert_eq!(op(FunctionRoot, vec![x("x")]), parse_ok("root(x)"));
    assert_eq!(ErrorCode::BadArgumentCount, parse_err("sqrt(x, y)"));
    assert_eq!(ErrorCode::BadArgumentCount, parse_err("root(1, 2, 3)"));
}

#[test]
fn test_builtin_functions() {
    assert_eq!(op(FunctionSin, vec![x("x")]), parse_ok("sin(x)"));
    assert_eq!(op(FunctionSin, vec![x("x")]), parse_ok("SIN(x)"));
    assert_eq!(op(FunctionArcsin, vec![x("x")]), parse_ok("asin(x)"));
    assert_eq!(op(FunctionArccosh, vec![x("x")]), parse_ok("acosh(x)"));
    assert_eq!(op(FunctionCeiling, vec![x("x")]), parse_ok("ceil(x)"));
    assert_eq!(op(Power, vec![x("a"), x("b")]), parse_ok("pow(a, b)"));
    assert_eq!(
        op(FunctionDelay, vec![x("x"), int(2)]),
        parse_ok("delay(x, 2)")
    );
    assert_eq!(op(FunctionRateOf, vec![x("x")]), parse_ok("rateOf(x)"));
    assert_eq!(
        op(FunctionMax, vec![x("a"), x("b"), x("c")]),
        parse_ok("max(a, b, c)")
    );
    assert_eq!(
        op(FunctionPiecewise, vec![int(1), op(RelationalGt, vec![x("x"), int(0)]), int(2)]),
        parse_ok("piecewise(1, x > 0, 2)")
    );
    assert_eq!(
        op(LogicalXor, vec![x("a"), x("b")]),
        parse_ok("xor(a, b)")
    );
    assert_eq!(ErrorCode::BadArgumentCount, parse_err("sin(x, y)"));
    assert_eq!(ErrorCode::BadArgumentCount, parse_err("quotient(x)"));
    assert_eq!(ErrorCode::BadArgumentCount, parse_err("gt(x)"));

    let settings = ParserSettings::new().with_case_sensitive(true);
    assert_eq!(call("SIN", vec![x("x")]), parse_with("SIN(x)", &settings));
}

#[test]
fn test_case_sensitive_canonical_names() {
    let settings = ParserSettings::new().with_case_sensitive(true);

    assert_eq!(op(FunctionRateOf, vec![x("x")]), parse_with("rateOf(x)", &settings));
    assert_eq!(real(f64::INFINITY), parse_with("INF", &settings));
    assert_eq!(real(f64::INFINITY), parse_with("infinity", &settings));
    assert!(parse_with("NaN", &settings).value().is_nan());
    assert!(parse_with("notanumber", &settings).value().is_nan());

    // other spellings are plain identifiers
    assert_eq!(call("rateof", vec![x("x")]), parse_with("rateof(x)", &settings));
    assert_eq!(x("inf"), parse_with("inf", &settings));
    assert_eq!(x("NAN"), parse_with("NAN", &settings));

    // formatted output reads back under either setting
    for input in ["rateOf(x) + INF", "NaN * y"] {
        let node = parse_with(input, &settings);
        assert_eq!(input, formula_to_l3_string(&node));
        assert_eq!(node.kind(), parse_ok(input).kind());
    }
    assert_eq!(op(FunctionRateOf, vec![x("x")]), parse_ok("RATEOF(x)"));
}

#[test]
fn test_user_functions() {
    assert_eq!(call("f", vec![x("x"), int(1)]), parse_ok("f(x, 1)"));
    assert_eq!(call("g", vec![]), parse_ok("g()"));
    // names outside the call vocabulary are user functions too
    assert_eq!(call("pi", vec![]), parse_ok("pi()"));
}

#[test]
fn test_lambda() {
    let node = parse_ok("lambda(x, y, x + y)");
    assert_eq!(Lambda, node.kind());
    assert_eq!(2, node.num_bvars());
    assert_eq!(&[x("x"), x("y")], node.bound_variables());
    assert_eq!(Some(&op(Plus, vec![x("x"), x("y")])), node.body());
    assert!(node.is_well_formed_node());

    let node = parse_ok("lambda(3)");
    assert_eq!(0, node.num_bvars());

    assert_eq!(ErrorCode::BadLambdaArgument, parse_err("lambda(2, x)"));
    assert_eq!(ErrorCode::BadArgumentCount, parse_err("lambda()"));
}

#[test]
fn test_constants_and_csymbols() {
    assert_eq!(AstNode::new(ConstantPi), parse_ok("pi"));
    assert_eq!(AstNode::new(ConstantE), parse_ok("exponentiale"));
    assert_eq!(AstNode::new(ConstantTrue), parse_ok("true"));
    assert_eq!(AstNode::new(ConstantFalse), parse_ok("False"));
    assert_eq!(real(f64::INFINITY), parse_ok("INF"));
    assert!(parse_ok("NaN").value().is_nan());

    let node = parse_ok("avogadro");
    assert_eq!(NameAvogadro, node.kind());
    assert_eq!(Some("avogadro"), node.name());
    let node = parse_ok("time");
    assert_eq!(NameTime, node.kind());

    let settings = ParserSettings::new().with_avogadro_csymbol(false);
    assert_eq!(x("avogadro"), parse_with("avogadro", &settings));
}

#[test]
fn test_model_ids_shadow_builtins() {
    let model = Model::new()
        .with_declaration("pi", None)
        .with_declaration("time", None)
        .with_function_definition("sin", parse_ok("lambda(x, x)"))
        .unwrap();
    let settings = ParserSettings::new().with_model(Arc::new(model));

    assert_eq!(x("pi"), parse_with("pi", &settings));
    assert_eq!(x("time"), parse_with("time", &settings));
    assert_eq!(call("sin", vec![x("a")]), parse_with("sin(a)", &settings));
    // everything else keeps its meaning
    assert_eq!(op(FunctionCos, vec![x("a")]), parse_with("cos(a)", &settings));
}

#[test]
fn test_package_syntax_needs_a_plugin() {
    assert_eq!(ErrorCode::UnsupportedSyntax, parse_err("{1, 2}"));
    assert_eq!(ErrorCode::UnsupportedSyntax, parse_err("a[1]"));
}

#[test]
fn test_errors() {
    let cases: &[(&str, ErrorCode, usize, usize)] = &[
        ("", ErrorCode::EmptyFormula, 0, 0),
        ("   ", ErrorCode::EmptyFormula, 0, 0),
        ("a +", ErrorCode::UnrecognizedEof, 3, 4),
        ("(a", ErrorCode::UnrecognizedEof, 2, 3),
        ("a b", ErrorCode::ExtraToken, 2, 3),
        ("a + * b", ErrorCode::UnrecognizedToken, 4, 5),
        ("a = b", ErrorCode::UnrecognizedToken, 2, 3),
        ("f(a,)", ErrorCode::UnrecognizedToken, 4, 5),
        ("sin(x, y)", ErrorCode::BadArgumentCount, 0, 9),
    ];

    for (input, code, start, end) in cases.iter() {
        let err = parse_l3_formula(input).unwrap_err();
        assert_eq!(*code, err.code, "{input}");
        assert_eq!((*start, *end), (err.start, err.end), "{input}");
    }
}

#[test]
fn test_depth_limit() {
    // deep nesting needs more stack than the default test thread has
    let child = std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(|| {
            let nested = format!("{}a{}", "(".repeat(1000), ")".repeat(1000));
            assert_eq!(ErrorCode::ExpressionTooDeep, parse_err(&nested));

            let negated = format!("{}a", "-".repeat(1000));
            assert_eq!(ErrorCode::ExpressionTooDeep, parse_err(&negated));

            let tower = vec!["a"; 1000].join("^");
            assert_eq!(ErrorCode::ExpressionTooDeep, parse_err(&tower));

            let fine = format!("{}a{}", "(".repeat(50), ")".repeat(50));
            assert_eq!(x("a"), parse_ok(&fine));
        })
        .unwrap();
    child.join().unwrap();
}

#[test]
fn test_logged() {
    let mut log = ErrorLog::new();
    let settings = ParserSettings::default();

    let node = parse_l3_formula_logged("a + 1", &settings, &mut log);
    assert_eq!(Plus, node.kind());
    assert!(log.is_empty());

    let node = parse_l3_formula_logged("a +\n (b", &settings, &mut log);
    assert!(node.is_unknown());
    assert_eq!(1, log.len());
    assert!(log.has_code(ErrorCode::UnrecognizedEof));
    assert_eq!(2, log.errors()[0].line);
}

#[test]
fn test_level1() {
    let l1 = |input: &str| parse_formula(input).unwrap();

    assert_eq!(
        op(Plus, vec![x("a"), op(Times, vec![x("b"), x("c")])]),
        l1("a + b * c")
    );
    assert_eq!(op(FunctionLn, vec![x("x")]), l1("log(x)"));
    assert_eq!(op(Power, vec![x("x"), int(2)]), l1("sqr(x)"));
    assert_eq!(op(FunctionPower, vec![x("a"), x("b")]), l1("pow(a, b)"));
    assert_eq!(op(FunctionRoot, vec![int(2), x("x")]), l1("sqrt(x)"));
    assert_eq!(op(RelationalLt, vec![x("a"), x("b")]), l1("lt(a, b)"));
    assert_eq!(op(LogicalAnd, vec![x("a"), x("b")]), l1("and(a, b)"));
    // no csymbols in Level 1
    assert_eq!(x("time"), l1("time"));
    assert_eq!(x("avogadro"), l1("avogadro"));
    assert_eq!(call("delay", vec![x("x"), int(1)]), l1("delay(x, 1)"));

    assert_eq!(ErrorCode::ExtraToken, parse_formula("a < b").unwrap_err().code);
    assert_eq!(ErrorCode::ExtraToken, parse_formula("a % b").unwrap_err().code);
    assert_eq!(ErrorCode::ExtraToken, parse_formula("5 mole").unwrap_err().code);
    assert_eq!(
        ErrorCode::UnrecognizedToken,
        parse_formula("!a").unwrap_err().code
    );
    assert_eq!(
        ErrorCode::BadArgumentCount,
        parse_formula("sqr(a, b)").unwrap_err().code
    );
}
