// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use super::AstNode;
use crate::kinds::{self, NodeKind};
use crate::plugin::PluginRegistry;

impl AstNode {
    pub fn has_correct_number_arguments(&self) -> bool {
        self.has_correct_number_arguments_with(None)
    }

    /// Whether the child count fits the node's kind.  Unknown nodes never
    /// do; extension kinds whose package isn't in `plugins` always do.
    pub fn has_correct_number_arguments_with(&self, plugins: Option<&PluginRegistry>) -> bool {
        let n = self.num_children();
        match self.kind() {
            NodeKind::Unknown => false,
            NodeKind::Lambda => n >= 1 && self.num_bvars() == n - 1,
            kind => match kinds::arity(kind, plugins) {
                Some(arity) => arity.accepts(n),
                None => true,
            },
        }
    }

    pub fn is_well_formed_node(&self) -> bool {
        self.is_well_formed_node_with(None)
    }

    pub fn is_well_formed_node_with(&self, plugins: Option<&PluginRegistry>) -> bool {
        self.has_correct_number_arguments_with(plugins)
            && self
                .children()
                .iter()
                .all(|child| child.is_well_formed_node_with(plugins))
    }
}
