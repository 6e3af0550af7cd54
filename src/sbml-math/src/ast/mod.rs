// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The expression tree.
//!
//! Every node has a [`NodeKind`] and owns its children outright; cloning
//! copies the whole subtree.  `lambda` nodes keep their bound variables as
//! plain name children in front of the body and track how many of the
//! leading children are bound variables, so the `<bvar>` wrapper of the
//! MathML encoding never shows up in the tree.

use std::mem;
use std::sync::{Arc, Weak};

use lazy_static::lazy_static;
use regex::Regex;

use crate::common::Result;
use crate::kinds::{self, NodeKind};
use crate::model::SbmlElement;
use crate::plugin::ExtensionPayload;

mod check;
mod transform;


lazy_static! {
    static ref SID_RE: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

/// Whether `s` is a valid SBML identifier.
pub fn is_valid_sid(s: &str) -> bool {
    SID_RE.is_match(s)
}

/// The numeric payload of a number node.
#[derive(Copy, Clone, Debug)]
pub enum NodeData {
    None,
    Integer(i64),
    Real(f64),
    RealE { mantissa: f64, exponent: i64 },
    Rational { numerator: i64, denominator: i64 },
}

impl PartialEq for NodeData {
    fn eq(&self, other: &Self) -> bool {
        use NodeData::*;
        // NaN literals are the same literal
        let same = |a: f64, b: f64| a == b || (a.is_nan() && b.is_nan());
        match (self, other) {
            (None, None) => true,
            (Integer(a), Integer(b)) => a == b,
            (Real(a), Real(b)) => same(*a, *b),
            (
                RealE {
                    mantissa: m1,
                    exponent: e1,
                },
                RealE {
                    mantissa: m2,
                    exponent: e2,
                },
            ) => same(*m1, *m2) && e1 == e2,
            (
                Rational {
                    numerator: n1,
                    denominator: d1,
                },
                Rational {
                    numerator: n2,
                    denominator: d2,
                },
            ) => n1 == n2 && d1 == d2,
            _ => false,
        }
    }
}

#[derive(Debug)]
pub struct AstNode {
    kind: NodeKind,
    data: NodeData,
    name: Option<String>,
    units: Option<String>,
    id: Option<String>,
    class: Option<String>,
    style: Option<String>,
    definition_url: Option<String>,
    // for lambdas: children[..num_bvars] are bound variables
    num_bvars: usize,
    children: Vec<AstNode>,
    annotations: Vec<String>,
    is_child: bool,
    parent_element: Option<Weak<dyn SbmlElement>>,
    extension: Option<ExtensionPayload>,
}

impl AstNode {
    pub fn new(kind: NodeKind) -> Self {
        let data = match kind {
            NodeKind::Integer => NodeData::Integer(0),
            NodeKind::Real => NodeData::Real(0.0),
            NodeKind::RealE => NodeData::RealE {
                mantissa: 0.0,
                exponent: 0,
            },
            NodeKind::Rational => NodeData::Rational {
                numerator: 0,
                denominator: 1,
            },
            _ => NodeData::None,
        };
        AstNode {
            kind,
            data,
            name: None,
            units: None,
            id: None,
            class: None,
            style: None,
            definition_url: None,
            num_bvars: 0,
            children: vec![],
            annotations: vec![],
            is_child: false,
            parent_element: None,
            extension: None,
        }
    }

    pub fn new_integer(value: i64) -> Self {
        let mut node = AstNode::new(NodeKind::Integer);
        node.data = NodeData::Integer(value);
        node
    }

    pub fn new_real(value: f64) -> Self {
        let mut node = AstNode::new(NodeKind::Real);
        node.data = NodeData::Real(value);
        node
    }

    pub fn new_real_e(mantissa: f64, exponent: i64) -> Self {
        let mut node = AstNode::new(NodeKind::RealE);
        node.data = NodeData::RealE { mantissa, exponent };
        node
    }

    pub fn new_rational(numerator: i64, denominator: i64) -> Self {
        let mut node = AstNode::new(NodeKind::Rational);
        node.data = NodeData::Rational {
            numerator,
            denominator,
        };
        node
    }

    pub fn new_name(name: &str) -> Self {
        let mut node = AstNode::new(NodeKind::Name);
        node.name = Some(name.to_owned());
        node
    }

    /// A call of the user-defined function `name`.
    pub fn new_function(name: &str) -> Self {
        let mut node = AstNode::new(NodeKind::Function);
        node.name = Some(name.to_owned());
        node
    }

    /// Builds a node of `kind` with `children` added in order, so lambda
    /// bound variables are counted exactly as with [`AstNode::add_child`].
    pub fn new_with_children(kind: NodeKind, children: Vec<AstNode>) -> Result<Self> {
        let mut node = AstNode::new(kind);
        for child in children {
            node.add_child(child)?;
        }
        Ok(node)
    }

    // construction for kinds known to take children
    pub(crate) fn build(kind: NodeKind, children: Vec<AstNode>) -> Self {
        let mut node = AstNode::new(kind);
        if kind == NodeKind::Lambda {
            node.num_bvars = children.len().saturating_sub(1);
        }
        node.children = children
            .into_iter()
            .map(|mut child| {
                child.is_child = true;
                child
            })
            .collect();
        node
    }

    // names csymbols and user function calls, whatever their kind
    pub(crate) fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_owned());
        self
    }

    // appends to a node known to take children
    pub(crate) fn push(&mut self, child: AstNode) {
        self.children.push(AstNode::attach(child));
    }

    pub(crate) fn into_children(self) -> Vec<AstNode> {
        self.children
            .into_iter()
            .map(|mut child| {
                child.is_child = false;
                child
            })
            .collect()
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Changes the kind of this node.  Numeric payloads are converted
    /// through [`AstNode::value`]; switching to a leaf kind is refused
    /// while the node still has children.
    pub fn set_kind(&mut self, kind: NodeKind) -> Result<()> {
        if kind == self.kind {
            return Ok(());
        }
        if kinds::represents_leaf(kind, None) && !self.children.is_empty() {
            return ast_err!(
                InvalidObject,
                format!("{kind:?} nodes cannot have children")
            );
        }

        let value = self.value();
        self.data = match kind {
            NodeKind::Integer => {
                NodeData::Integer(if value.is_finite() && value.fract() == 0.0 {
                    value as i64
                } else {
                    0
                })
            }
            NodeKind::Real => NodeData::Real(value),
            NodeKind::RealE => NodeData::RealE {
                mantissa: value,
                exponent: 0,
            },
            NodeKind::Rational => match self.data {
                NodeData::Rational { .. } => self.data,
                NodeData::Integer(n) => NodeData::Rational {
                    numerator: n,
                    denominator: 1,
                },
                _ => NodeData::Rational {
                    numerator: 0,
                    denominator: 1,
                },
            },
            _ => NodeData::None,
        };
        if !kinds::represents_number(kind, None) {
            self.units = None;
        }
        self.num_bvars = if kind == NodeKind::Lambda {
            self.children.len().saturating_sub(1)
        } else {
            0
        };
        self.kind = kind;
        Ok(())
    }

    pub fn data(&self) -> NodeData {
        self.data
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Sets the referenced name.  Numbers, constants and childless unknown
    /// nodes become plain names; operators have no name to set.
    pub fn set_name(&mut self, name: &str) -> Result<()> {
        use NodeKind::*;
        match self.kind {
            Name | NameAvogadro | NameTime | Function | FunctionDelay | FunctionRateOf
            | Extension(_) => {}
            Unknown if !self.children.is_empty() => {
                return ast_err!(
                    InvalidObject,
                    "cannot turn an unknown node with children into a name".to_owned()
                );
            }
            Unknown | Integer | Real | RealE | Rational | ConstantE | ConstantFalse
            | ConstantPi | ConstantTrue => {
                self.kind = Name;
                self.data = NodeData::None;
                self.units = None;
            }
            kind => {
                return ast_err!(InvalidObject, format!("{kind:?} nodes have no name"));
            }
        }
        self.name = Some(name.to_owned());
        Ok(())
    }

    fn ensure_no_children(&self) -> Result<()> {
        if self.children.is_empty() {
            Ok(())
        } else {
            ast_err!(
                InvalidObject,
                "a node with children cannot become a number".to_owned()
            )
        }
    }

    pub fn set_integer(&mut self, value: i64) -> Result<()> {
        self.ensure_no_children()?;
        self.become_number(NodeKind::Integer, NodeData::Integer(value));
        Ok(())
    }

    pub fn set_real(&mut self, value: f64) -> Result<()> {
        self.ensure_no_children()?;
        self.become_number(NodeKind::Real, NodeData::Real(value));
        Ok(())
    }

    pub fn set_real_e(&mut self, mantissa: f64, exponent: i64) -> Result<()> {
        self.ensure_no_children()?;
        self.become_number(NodeKind::RealE, NodeData::RealE { mantissa, exponent });
        Ok(())
    }

    pub fn set_rational(&mut self, numerator: i64, denominator: i64) -> Result<()> {
        self.ensure_no_children()?;
        self.become_number(
            NodeKind::Rational,
            NodeData::Rational {
                numerator,
                denominator,
            },
        );
        Ok(())
    }

    fn become_number(&mut self, kind: NodeKind, data: NodeData) {
        if !kinds::represents_number(self.kind, None) {
            self.units = None;
        }
        self.kind = kind;
        self.data = data;
        self.name = None;
        self.num_bvars = 0;
    }

    /// The numeric value of a number or constant; NaN for anything else.
    pub fn value(&self) -> f64 {
        match self.data {
            NodeData::Integer(n) => n as f64,
            NodeData::Real(r) => r,
            NodeData::RealE { mantissa, exponent } => mantissa * 10f64.powf(exponent as f64),
            NodeData::Rational {
                numerator,
                denominator,
            } => numerator as f64 / denominator as f64,
            NodeData::None => match self.kind {
                NodeKind::ConstantE => std::f64::consts::E,
                NodeKind::ConstantPi => std::f64::consts::PI,
                NodeKind::ConstantTrue => 1.0,
                NodeKind::ConstantFalse => 0.0,
                _ => f64::NAN,
            },
        }
    }

    pub fn integer(&self) -> Option<i64> {
        match self.data {
            NodeData::Integer(n) => Some(n),
            _ => None,
        }
    }

    pub fn mantissa(&self) -> Option<f64> {
        match self.data {
            NodeData::Real(r) => Some(r),
            NodeData::RealE { mantissa, .. } => Some(mantissa),
            _ => None,
        }
    }

    pub fn exponent(&self) -> Option<i64> {
        match self.data {
            NodeData::Real(_) => Some(0),
            NodeData::RealE { exponent, .. } => Some(exponent),
            _ => None,
        }
    }

    pub fn numerator(&self) -> Option<i64> {
        match self.data {
            NodeData::Integer(n) => Some(n),
            NodeData::Rational { numerator, .. } => Some(numerator),
            _ => None,
        }
    }

    pub fn denominator(&self) -> Option<i64> {
        match self.data {
            NodeData::Integer(_) => Some(1),
            NodeData::Rational { denominator, .. } => Some(denominator),
            _ => None,
        }
    }

    /// The value as a whole number, if it is one.
    pub fn integral_value(&self) -> Option<i64> {
        if let NodeData::Integer(n) = self.data {
            return Some(n);
        }
        let value = self.value();
        if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            Some(value as i64)
        } else {
            None
        }
    }

    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    /// Declares the units of a number literal.
    pub fn set_units(&mut self, units: &str) -> Result<()> {
        if !kinds::represents_number(self.kind, None) {
            return ast_err!(
                UnexpectedAttribute,
                format!("units only apply to numbers, not {:?}", self.kind)
            );
        }
        if !is_valid_sid(units) {
            return ast_err!(
                InvalidAttributeValue,
                format!("'{units}' is not a valid unit identifier")
            );
        }
        self.units = Some(units.to_owned());
        Ok(())
    }

    pub fn unset_units(&mut self) {
        self.units = None;
    }

    pub fn has_units(&self) -> bool {
        self.units.is_some() || self.children.iter().any(|child| child.has_units())
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: &str) -> Result<()> {
        if !is_valid_sid(id) {
            return ast_err!(InvalidAttributeValue, format!("'{id}' is not a valid id"));
        }
        self.id = Some(id.to_owned());
        Ok(())
    }

    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    pub fn set_class(&mut self, class: &str) {
        self.class = Some(class.to_owned());
    }

    pub fn style(&self) -> Option<&str> {
        self.style.as_deref()
    }

    pub fn set_style(&mut self, style: &str) {
        self.style = Some(style.to_owned());
    }

    pub fn definition_url(&self) -> Option<&str> {
        self.definition_url.as_deref()
    }

    pub fn set_definition_url(&mut self, url: &str) {
        self.definition_url = Some(url.to_owned());
    }

    /// Raw XML of the annotations of a `semantics` node.
    pub fn annotations(&self) -> &[String] {
        &self.annotations
    }

    pub fn add_annotation(&mut self, xml: &str) {
        self.annotations.push(xml.to_owned());
    }

    pub fn extension(&self) -> Option<&ExtensionPayload> {
        self.extension.as_ref()
    }

    pub fn extension_mut(&mut self) -> Option<&mut ExtensionPayload> {
        self.extension.as_mut()
    }

    pub fn set_extension(&mut self, payload: ExtensionPayload) {
        self.extension = Some(payload);
    }

    /// Whether this node is currently attached to a parent.
    pub fn is_child(&self) -> bool {
        self.is_child
    }

    /// The element this expression belongs to, if it is still alive.
    pub fn parent_element(&self) -> Option<Arc<dyn SbmlElement>> {
        self.parent_element.as_ref().and_then(|weak| weak.upgrade())
    }

    /// Records `element` as the owner of this expression and its whole
    /// subtree.  The node holds no strong reference to it.
    pub fn set_parent_element(&mut self, element: &Arc<dyn SbmlElement>) {
        self.set_parent_weak(Arc::downgrade(element));
    }

    fn set_parent_weak(&mut self, element: Weak<dyn SbmlElement>) {
        for child in self.children.iter_mut() {
            child.set_parent_weak(element.clone());
        }
        self.parent_element = Some(element);
    }

    pub fn unset_parent_element(&mut self) {
        for child in self.children.iter_mut() {
            child.unset_parent_element();
        }
        self.parent_element = None;
    }

    pub fn num_children(&self) -> usize {
        self.children.len()
    }

    pub fn children(&self) -> &[AstNode] {
        &self.children
    }

    /// The `n`th child.  Lambda bound variables come back as the name
    /// nodes they are, never wrapped in a `bvar` qualifier.
    pub fn child(&self, n: usize) -> Option<&AstNode> {
        self.children.get(n)
    }

    /// Mutable access to the `n`th child.  Use [`AstNode::replace_child`]
    /// to swap a child out.
    pub fn child_mut(&mut self, n: usize) -> Option<&mut AstNode> {
        self.children.get_mut(n)
    }

    pub fn left_child(&self) -> Option<&AstNode> {
        self.children.first()
    }

    /// The last child, when there are at least two.
    pub fn right_child(&self) -> Option<&AstNode> {
        if self.children.len() > 1 {
            self.children.last()
        } else {
            None
        }
    }

    fn attach(mut child: AstNode) -> AstNode {
        child.is_child = true;
        child
    }

    fn check_accepts_children(&self) -> Result<()> {
        if kinds::represents_leaf(self.kind, None) {
            ast_err!(
                InvalidObject,
                format!("{:?} nodes cannot have children", self.kind)
            )
        } else {
            Ok(())
        }
    }

    /// Appends `child`.  Appending to a lambda that already has a body
    /// turns that body into another bound variable.
    pub fn add_child(&mut self, child: AstNode) -> Result<()> {
        self.check_accepts_children()?;
        if self.kind == NodeKind::Lambda && self.num_bvars < self.children.len() {
            self.num_bvars += 1;
        }
        self.children.push(AstNode::attach(child));
        Ok(())
    }

    /// Appends a bound variable to a lambda, after any existing ones and
    /// before the body.
    pub fn add_bound_variable(&mut self, bvar: AstNode) -> Result<()> {
        if self.kind != NodeKind::Lambda {
            return ast_err!(
                InvalidObject,
                format!("{:?} nodes have no bound variables", self.kind)
            );
        }
        let pos = self.num_bvars.min(self.children.len());
        self.children.insert(pos, AstNode::attach(bvar));
        self.num_bvars = pos + 1;
        Ok(())
    }

    pub fn insert_child(&mut self, pos: usize, child: AstNode) -> Result<()> {
        self.check_accepts_children()?;
        let len = self.children.len();
        if pos > len {
            return ast_err!(
                IndexExceedsSize,
                format!("position {pos} is past the {len} children")
            );
        }
        if pos == len {
            return self.add_child(child);
        }
        if self.kind == NodeKind::Lambda {
            self.num_bvars += 1;
        }
        self.children.insert(pos, AstNode::attach(child));
        Ok(())
    }

    pub fn prepend_child(&mut self, child: AstNode) -> Result<()> {
        self.insert_child(0, child)
    }

    /// Puts `child` at `pos` and hands back the node it displaced.
    pub fn replace_child(&mut self, pos: usize, child: AstNode) -> Result<AstNode> {
        let len = self.children.len();
        if pos >= len {
            return ast_err!(
                IndexExceedsSize,
                format!("position {pos} is past the {len} children")
            );
        }
        let mut old = mem::replace(&mut self.children[pos], AstNode::attach(child));
        old.is_child = false;
        Ok(old)
    }

    /// Detaches and returns the child at `pos`.
    pub fn remove_child(&mut self, pos: usize) -> Result<AstNode> {
        let len = self.children.len();
        if pos >= len {
            return ast_err!(
                IndexExceedsSize,
                format!("position {pos} is past the {len} children")
            );
        }
        if self.kind == NodeKind::Lambda && pos < self.num_bvars {
            self.num_bvars -= 1;
        }
        let mut old = self.children.remove(pos);
        old.is_child = false;
        Ok(old)
    }

    /// Exchanges the children of two nodes.
    pub fn swap_children(&mut self, other: &mut AstNode) -> Result<()> {
        if !self.children.is_empty() {
            other.check_accepts_children()?;
        }
        if !other.children.is_empty() {
            self.check_accepts_children()?;
        }
        mem::swap(&mut self.children, &mut other.children);
        for node in [&mut *self, &mut *other] {
            if node.kind == NodeKind::Lambda {
                node.num_bvars = node.children.len().saturating_sub(1);
            }
        }
        Ok(())
    }

    pub fn num_bvars(&self) -> usize {
        self.num_bvars
    }

    pub fn bound_variables(&self) -> &[AstNode] {
        &self.children[..self.num_bvars.min(self.children.len())]
    }

    /// The body of a lambda: the child after its bound variables.
    pub fn body(&self) -> Option<&AstNode> {
        if self.kind == NodeKind::Lambda {
            self.children.get(self.num_bvars)
        } else {
            None
        }
    }

    /// A detached copy of this node and everything under it.
    pub fn deep_copy(&self) -> AstNode {
        self.clone()
    }

    pub fn is_number(&self) -> bool {
        kinds::represents_number(self.kind, None)
    }

    pub fn is_integer(&self) -> bool {
        self.kind == NodeKind::Integer
    }

    pub fn is_real(&self) -> bool {
        matches!(self.kind, NodeKind::Real | NodeKind::RealE)
    }

    pub fn is_rational(&self) -> bool {
        self.kind == NodeKind::Rational
    }

    pub fn is_name(&self) -> bool {
        kinds::represents_name(self.kind, None)
    }

    pub fn is_constant(&self) -> bool {
        kinds::represents_constant(self.kind, None)
    }

    pub fn is_lambda(&self) -> bool {
        self.kind == NodeKind::Lambda
    }

    pub fn is_piecewise(&self) -> bool {
        self.kind == NodeKind::FunctionPiecewise
    }

    pub fn is_relational(&self) -> bool {
        kinds::is_relational(self.kind)
    }

    pub fn is_logical(&self) -> bool {
        kinds::is_logical(self.kind)
    }

    pub fn is_user_function(&self) -> bool {
        self.kind == NodeKind::Function
    }

    pub fn is_unknown(&self) -> bool {
        self.kind == NodeKind::Unknown
    }

    pub fn is_unary_minus(&self) -> bool {
        self.kind == NodeKind::Minus && self.children.len() == 1
    }

    pub fn is_operator(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Plus | NodeKind::Minus | NodeKind::Times | NodeKind::Divide | NodeKind::Power
        )
    }

    /// A root with the constant degree 2.
    pub fn is_sqrt(&self) -> bool {
        self.kind == NodeKind::FunctionRoot
            && self.children.len() == 2
            && self.children[0].is_number()
            && self.children[0].value() == 2.0
    }

    /// A logarithm with the constant base 10.
    pub fn is_log10(&self) -> bool {
        self.kind == NodeKind::FunctionLog
            && self.children.len() == 2
            && self.children[0].is_number()
            && self.children[0].value() == 10.0
    }

    /// A negative number literal, which prints with a leading minus.
    pub fn is_negative_literal(&self) -> bool {
        match self.data {
            NodeData::Integer(n) => n < 0,
            NodeData::Real(r) => r.is_sign_negative() && !r.is_nan(),
            NodeData::RealE { mantissa, .. } => mantissa.is_sign_negative() && !mantissa.is_nan(),
            NodeData::Rational { .. } => false,
            NodeData::None => false,
        }
    }
}

impl Clone for AstNode {
    fn clone(&self) -> Self {
        AstNode {
            kind: self.kind,
            data: self.data,
            name: self.name.clone(),
            units: self.units.clone(),
            id: self.id.clone(),
            class: self.class.clone(),
            style: self.style.clone(),
            definition_url: self.definition_url.clone(),
            num_bvars: self.num_bvars,
            children: self
                .children
                .iter()
                .map(|child| AstNode::attach(child.clone()))
                .collect(),
            annotations: self.annotations.clone(),
            // a copy starts out detached
            is_child: false,
            parent_element: self.parent_element.clone(),
            extension: self.extension.clone(),
        }
    }
}

// attachment state and the owning element are not part of a node's value
impl PartialEq for AstNode {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.data == other.data
            && self.name == other.name
            && self.units == other.units
            && self.id == other.id
            && self.class == other.class
            && self.style == other.style
            && self.definition_url == other.definition_url
            && self.num_bvars == other.num_bvars
            && self.annotations == other.annotations
            && self.extension == other.extension
            && self.children == other.children
    }
}
