// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Property-based tests for the infix and MathML encodings.
//!
//! These tests verify that:
//! 1. Formatting a tree and parsing the text back reaches a fixed point
//!    after one round
//! 2. Parsed trees survive a trip through MathML unchanged

use proptest::prelude::*;

use crate::ast::AstNode;
use crate::common::ErrorLog;
use crate::formatter::formula_to_l3_string;
use crate::kinds::NodeKind;
use crate::mathml::{read_mathml, write_mathml};
use crate::parser::parse_l3_formula;
use crate::testutils::{call, op};

// prefixed so that no generated name collides with a constant or function
fn name_strategy() -> impl Strategy<Value = String> {
    "v_[a-z0-9]{0,4}".prop_map(|s| s.to_string())
}

fn leaf_strategy() -> impl Strategy<Value = AstNode> {
    prop_oneof![
        4 => name_strategy().prop_map(|name| AstNode::new_name(&name)),
        2 => (0i64..1000).prop_map(AstNode::new_integer),
        1 => (0i32..400).prop_map(|n| AstNode::new_real(n as f64 / 4.0)),
        1 => Just(AstNode::new(NodeKind::ConstantPi)),
        1 => Just(AstNode::new(NodeKind::ConstantTrue)),
    ]
}

fn binary(kind: NodeKind, inner: BoxedStrategy<AstNode>) -> impl Strategy<Value = AstNode> {
    (inner.clone(), inner).prop_map(move |(a, b)| op(kind, vec![a, b]))
}

fn node_strategy() -> impl Strategy<Value = AstNode> {
    leaf_strategy().prop_recursive(5, 48, 4, |inner| {
        let inner = inner.boxed();
        prop_oneof![
            prop::collection::vec(inner.clone(), 2..5).prop_map(|c| op(NodeKind::Plus, c)),
            prop::collection::vec(inner.clone(), 2..5).prop_map(|c| op(NodeKind::Times, c)),
            binary(NodeKind::Minus, inner.clone()),
            binary(NodeKind::Divide, inner.clone()),
            binary(NodeKind::Power, inner.clone()),
            binary(NodeKind::RelationalLt, inner.clone()),
            binary(NodeKind::RelationalEq, inner.clone()),
            binary(NodeKind::RelationalNeq, inner.clone()),
            binary(NodeKind::LogicalAnd, inner.clone()),
            binary(NodeKind::LogicalOr, inner.clone()),
            inner.clone().prop_map(|a| op(NodeKind::Minus, vec![a])),
            inner.clone().prop_map(|a| op(NodeKind::LogicalNot, vec![a])),
            inner.clone().prop_map(|a| op(NodeKind::FunctionSin, vec![a])),
            inner.clone().prop_map(|a| {
                op(NodeKind::FunctionRoot, vec![AstNode::new_integer(2), a])
            }),
            (
                "f_[a-z]{0,3}",
                prop::collection::vec(inner.clone(), 0..3)
            )
                .prop_map(|(name, args)| call(&name, args)),
        ]
    })
}

fn reparse(node: &AstNode) -> AstNode {
    let text = formula_to_l3_string(node);
    match parse_l3_formula(&text) {
        Ok(parsed) => parsed,
        Err(err) => panic!("'{text}' failed to parse: {err}"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn format_parse_reaches_fixed_point(node in node_strategy()) {
        let first = reparse(&node);
        let second = reparse(&first);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(formula_to_l3_string(&first), formula_to_l3_string(&second));
    }

    #[test]
    fn mathml_roundtrip(node in node_strategy()) {
        let parsed = reparse(&node);
        let xml = write_mathml(&parsed).unwrap();
        let mut log = ErrorLog::new();
        let read = read_mathml(&xml, &mut log);
        prop_assert!(log.is_empty(), "{:?}", log);
        prop_assert_eq!(parsed, read);
    }
}
