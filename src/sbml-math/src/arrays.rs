// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The `arrays` package: `selector` and `vector`.
//!
//! In infix text a vector is written `{a, b, c}` and a selection
//! `x[i]` or `x[i, j]`; both read and write as the `<selector>` and
//! `<vector>` MathML elements.

use crate::ast::AstNode;
use crate::kinds::{Arity, ExtensionKind, KindClass, NodeKind};
use crate::plugin::{AstPlugin, UnitRule};

pub const ARRAYS_PACKAGE: &str = "arrays";

const SELECTOR_CODE: u16 = 0;
const VECTOR_CODE: u16 = 1;

pub const SELECTOR: NodeKind = NodeKind::Extension(ExtensionKind {
    package: ARRAYS_PACKAGE,
    code: SELECTOR_CODE,
});

pub const VECTOR: NodeKind = NodeKind::Extension(ExtensionKind {
    package: ARRAYS_PACKAGE,
    code: VECTOR_CODE,
});

#[derive(Copy, Clone, Debug, Default)]
pub struct ArraysPlugin;

// whether a selected expression can be subscripted without parens
fn is_atomic(node: &AstNode) -> bool {
    match node.kind() {
        NodeKind::Extension(_) | NodeKind::Function => true,
        _ => node.is_name() || (node.is_number() && !node.is_negative_literal()),
    }
}

impl AstPlugin for ArraysPlugin {
    fn package(&self) -> &'static str {
        ARRAYS_PACKAGE
    }

    fn kind_for_name(&self, name: &str) -> Option<NodeKind> {
        match name {
            "selector" => Some(SELECTOR),
            "vector" => Some(VECTOR),
            _ => None,
        }
    }

    fn name_for_kind(&self, kind: ExtensionKind) -> Option<&'static str> {
        match kind.code {
            SELECTOR_CODE => Some("selector"),
            VECTOR_CODE => Some("vector"),
            _ => None,
        }
    }

    fn classify(&self, kind: ExtensionKind) -> Option<KindClass> {
        match kind.code {
            SELECTOR_CODE => Some(KindClass::NaryFunction),
            VECTOR_CODE => Some(KindClass::Other),
            _ => None,
        }
    }

    fn arity(&self, kind: ExtensionKind) -> Option<Arity> {
        match kind.code {
            SELECTOR_CODE => Some(Arity::Between(2, 3)),
            VECTOR_CODE => Some(Arity::Any),
            _ => None,
        }
    }

    fn is_container(&self, kind: ExtensionKind) -> bool {
        kind.code == VECTOR_CODE
    }

    fn function_kind(&self, name: &str) -> Option<NodeKind> {
        (name == "selector").then_some(SELECTOR)
    }

    fn braces_kind(&self) -> Option<NodeKind> {
        Some(VECTOR)
    }

    fn subscript_kind(&self) -> Option<NodeKind> {
        Some(SELECTOR)
    }

    fn format(&self, node: &AstNode, children: &[String]) -> Option<String> {
        match node.kind() {
            VECTOR => Some(format!("{{{}}}", children.join(", "))),
            SELECTOR => {
                let (first, indices) = children.split_first()?;
                if indices.is_empty() {
                    return None;
                }
                let selected = node.child(0)?;
                let first = if is_atomic(selected) {
                    first.clone()
                } else {
                    format!("({first})")
                };
                Some(format!("{first}[{}]", indices.join(", ")))
            }
            _ => None,
        }
    }

    fn unit_rule(&self, kind: ExtensionKind) -> Option<UnitRule> {
        match kind.code {
            SELECTOR_CODE | VECTOR_CODE => Some(UnitRule::FromChild(0)),
            _ => None,
        }
    }
}
