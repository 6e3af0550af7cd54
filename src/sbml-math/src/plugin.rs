// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Registry of package extensions.
//!
//! A package introduces its own node kinds (as [`NodeKind::Extension`]) and
//! teaches the core about them through [`AstPlugin`].  The core only asks
//! at fixed points: kind classification and arity, MathML element names,
//! infix syntax, formatting and unit inference.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::ast::AstNode;
use crate::kinds::{Arity, ExtensionKind, KindClass, NodeKind};

/// How the units of an extension node derive from its children.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnitRule {
    Dimensionless,
    FromChild(usize),
    Undeclared,
}

pub trait AstPlugin: fmt::Debug + Send + Sync {
    /// The package name; the `package` of every kind this plugin owns.
    fn package(&self) -> &'static str;

    /// The kind for a MathML element name.
    fn kind_for_name(&self, _name: &str) -> Option<NodeKind> {
        None
    }

    fn name_for_kind(&self, _kind: ExtensionKind) -> Option<&'static str> {
        None
    }

    fn classify(&self, _kind: ExtensionKind) -> Option<KindClass> {
        None
    }

    fn arity(&self, _kind: ExtensionKind) -> Option<Arity> {
        None
    }

    /// Whether the element wraps its children directly, like `<vector>`,
    /// rather than appearing as the operator of an `<apply>`.
    fn is_container(&self, _kind: ExtensionKind) -> bool {
        false
    }

    /// The kind for a function name used in call position in infix text.
    fn function_kind(&self, _name: &str) -> Option<NodeKind> {
        None
    }

    /// The kind built from infix `{a, b, ...}`.
    fn braces_kind(&self) -> Option<NodeKind> {
        None
    }

    /// The kind built from infix `x[i, ...]`; the subscripted expression
    /// becomes the first child.
    fn subscript_kind(&self) -> Option<NodeKind> {
        None
    }

    /// Infix text for `node`, given its already formatted children.
    fn format(&self, _node: &AstNode, _children: &[String]) -> Option<String> {
        None
    }

    fn unit_rule(&self, _kind: ExtensionKind) -> Option<UnitRule> {
        None
    }
}

/// Package-private state carried by a node of an extension kind.  The
/// MathML reader keeps element attributes the core doesn't understand
/// here so that they are written back out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtensionPayload {
    pub package: String,
    pub attributes: BTreeMap<String, String>,
}

impl ExtensionPayload {
    pub fn new(package: &str) -> Self {
        ExtensionPayload {
            package: package.to_owned(),
            attributes: BTreeMap::new(),
        }
    }
}

#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: Vec<Arc<dyn AstPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Builder-style registration.  A plugin for an already registered
    /// package replaces the earlier one.
    pub fn with_plugin(mut self, plugin: Arc<dyn AstPlugin>) -> Self {
        self.register(plugin);
        self
    }

    pub fn register(&mut self, plugin: Arc<dyn AstPlugin>) {
        self.plugins.retain(|p| p.package() != plugin.package());
        self.plugins.push(plugin);
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn packages(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.package()).collect()
    }

    pub fn get(&self, package: &str) -> Option<&dyn AstPlugin> {
        self.plugins
            .iter()
            .find(|p| p.package() == package)
            .map(|p| p.as_ref())
    }

    fn owner(&self, kind: ExtensionKind) -> Option<&dyn AstPlugin> {
        self.get(kind.package)
    }

    pub fn kind_for_name(&self, name: &str) -> Option<NodeKind> {
        self.plugins.iter().find_map(|p| p.kind_for_name(name))
    }

    pub fn name_for_kind(&self, kind: ExtensionKind) -> Option<&'static str> {
        self.owner(kind).and_then(|p| p.name_for_kind(kind))
    }

    pub fn classify(&self, kind: ExtensionKind) -> Option<KindClass> {
        self.owner(kind).and_then(|p| p.classify(kind))
    }

    pub fn arity(&self, kind: ExtensionKind) -> Option<Arity> {
        self.owner(kind).and_then(|p| p.arity(kind))
    }

    pub fn is_container(&self, kind: ExtensionKind) -> bool {
        self.owner(kind).is_some_and(|p| p.is_container(kind))
    }

    pub fn function_kind(&self, name: &str) -> Option<NodeKind> {
        self.plugins.iter().find_map(|p| p.function_kind(name))
    }

    pub fn braces_kind(&self) -> Option<NodeKind> {
        self.plugins.iter().find_map(|p| p.braces_kind())
    }

    pub fn subscript_kind(&self) -> Option<NodeKind> {
        self.plugins.iter().find_map(|p| p.subscript_kind())
    }

    pub fn format(&self, node: &AstNode, children: &[String]) -> Option<String> {
        match node.kind() {
            NodeKind::Extension(kind) => self
                .owner(kind)
                .and_then(|p| p.format(node, children)),
            _ => None,
        }
    }

    pub fn unit_rule(&self, kind: ExtensionKind) -> Option<UnitRule> {
        self.owner(kind).and_then(|p| p.unit_rule(kind))
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.packages()).finish()
    }
}

// registries compare by the set of packages they carry
impl PartialEq for PluginRegistry {
    fn eq(&self, other: &Self) -> bool {
        self.packages() == other.packages()
    }
}
