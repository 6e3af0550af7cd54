// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use super::AstNode;
use crate::kinds::NodeKind;

impl AstNode {
    /// Whether a `Name` node referencing `name` occurs in this subtree.
    pub fn contains_name(&self, name: &str) -> bool {
        (self.kind == NodeKind::Name && self.name.as_deref() == Some(name))
            || self.children.iter().any(|child| child.contains_name(name))
    }

    /// Every referenced name, in document order, duplicates included.
    pub fn list_of_names(&self) -> Vec<&str> {
        let mut names = vec![];
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        if self.kind == NodeKind::Name {
            if let Some(name) = self.name.as_deref() {
                names.push(name);
            }
        }
        for child in self.children.iter() {
            child.collect_names(names);
        }
    }

    /// Substitutes a copy of `arg` for every reference to `bvar`.
    pub fn replace_argument(&mut self, bvar: &str, arg: &AstNode) {
        if self.kind == NodeKind::Name && self.name.as_deref() == Some(bvar) {
            let is_child = self.is_child;
            *self = arg.deep_copy();
            self.is_child = is_child;
            return;
        }
        for child in self.children.iter_mut() {
            child.replace_argument(bvar, arg);
        }
    }

    /// Renames references to the identifier `old`, both names and calls
    /// of user-defined functions.
    pub fn rename_sid_refs(&mut self, old: &str, new: &str) {
        if matches!(self.kind, NodeKind::Name | NodeKind::Function)
            && self.name.as_deref() == Some(old)
        {
            self.name = Some(new.to_owned());
        }
        for child in self.children.iter_mut() {
            child.rename_sid_refs(old, new);
        }
    }

    pub fn rename_unit_sid_refs(&mut self, old: &str, new: &str) {
        if self.units.as_deref() == Some(old) {
            self.units = Some(new.to_owned());
        }
        for child in self.children.iter_mut() {
            child.rename_unit_sid_refs(old, new);
        }
    }

    /// Rewrites n-ary `plus`, `times`, `and`, `or` and `xor` as nested
    /// binary applications, left-associated.
    pub fn reduce_to_binary(&mut self) {
        for child in self.children.iter_mut() {
            child.reduce_to_binary();
        }

        let reducible = matches!(
            self.kind,
            NodeKind::Plus
                | NodeKind::Times
                | NodeKind::LogicalAnd
                | NodeKind::LogicalOr
                | NodeKind::LogicalXor
        );
        if !reducible || self.children.len() <= 2 {
            return;
        }

        let mut operands = std::mem::take(&mut self.children).into_iter();
        let (Some(first), Some(second)) = (operands.next(), operands.next()) else {
            return;
        };
        let mut acc = AstNode::build(self.kind, vec![first, second]);
        let last = operands.next_back();
        for operand in operands {
            acc = AstNode::build(self.kind, vec![acc, operand]);
        }
        self.children = vec![acc];
        if let Some(last) = last {
            self.children.push(last);
        }
        for child in self.children.iter_mut() {
            child.is_child = true;
        }
    }
}
