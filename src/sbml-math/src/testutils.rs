// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

// terse tree builders for tests

use crate::ast::AstNode;
use crate::kinds::NodeKind;

pub(crate) fn x(name: &str) -> AstNode {
    AstNode::new_name(name)
}

pub(crate) fn int(n: i64) -> AstNode {
    AstNode::new_integer(n)
}

pub(crate) fn real(r: f64) -> AstNode {
    AstNode::new_real(r)
}

pub(crate) fn op(kind: NodeKind, children: Vec<AstNode>) -> AstNode {
    AstNode::build(kind, children)
}

pub(crate) fn call(name: &str, args: Vec<AstNode>) -> AstNode {
    AstNode::build(NodeKind::Function, args).with_name(name)
}
