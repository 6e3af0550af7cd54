// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use log::debug;

use crate::ast::AstNode;
use crate::kinds::{self, NodeKind};
use crate::model::UnitContext;
use crate::plugin::{PluginRegistry, UnitRule};
use crate::units::{Unit, UnitDefinition, UnitKind};

/// The outcome of unit inference.  Inference never fails: when part of
/// the expression has no declared units the flags say so and
/// `unit_definition` is a best effort.
#[derive(Clone, Debug, PartialEq)]
pub struct InferredUnits {
    pub unit_definition: UnitDefinition,
    pub contains_undeclared_units: bool,
    /// Set when every undeclared part could be disregarded, such as a
    /// bare number added to a quantity with known units.
    pub can_ignore_undeclared_units: bool,
}

// ordered: merging keeps the worst
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
enum Undeclared {
    #[default]
    No,
    Ignorable,
    Fatal,
}

#[derive(Clone, Debug)]
struct Units {
    def: UnitDefinition,
    undeclared: Undeclared,
}

impl Units {
    fn declared(def: UnitDefinition) -> Self {
        Units {
            def,
            undeclared: Undeclared::No,
        }
    }

    fn dimensionless() -> Self {
        Units::declared(UnitDefinition::dimensionless())
    }

    fn unknown() -> Self {
        Units {
            def: UnitDefinition::dimensionless(),
            undeclared: Undeclared::Fatal,
        }
    }

    fn bare_literal() -> Self {
        Units {
            def: UnitDefinition::dimensionless(),
            undeclared: Undeclared::Ignorable,
        }
    }

    fn with_undeclared(mut self, undeclared: Undeclared) -> Self {
        self.undeclared = self.undeclared.max(undeclared);
        self
    }
}

pub struct UnitInferer<'a, C: UnitContext> {
    ctx: &'a mut C,
    plugins: Option<&'a PluginRegistry>,
}

impl<'a, C: UnitContext> UnitInferer<'a, C> {
    pub fn new(ctx: &'a mut C) -> Self {
        UnitInferer { ctx, plugins: None }
    }

    pub fn with_plugins(mut self, plugins: &'a PluginRegistry) -> Self {
        self.plugins = Some(plugins);
        self
    }

    /// Infers the units of `node`.  A composite result that matches no
    /// definition in the context is registered there under a fresh
    /// `unitSid_<n>` identifier.
    pub fn infer(&mut self, node: &AstNode) -> InferredUnits {
        let mut expanding = vec![];
        let units = self.walk(node, &mut expanding);

        let unit_definition = self.register(units.def);
        InferredUnits {
            unit_definition,
            contains_undeclared_units: units.undeclared != Undeclared::No,
            can_ignore_undeclared_units: units.undeclared == Undeclared::Ignorable,
        }
    }

    fn register(&mut self, mut def: UnitDefinition) -> UnitDefinition {
        if def.is_empty() || def.id.is_some() {
            return def;
        }
        // a lone base unit is named after its kind
        if let [unit] = def.units[..] {
            if unit == Unit::new(unit.kind) {
                def.id = Some(unit.kind.name().to_owned());
                return def;
            }
        }

        if let Some(existing) = self
            .ctx
            .unit_definitions()
            .iter()
            .find(|existing| UnitDefinition::are_identical(existing, &def))
        {
            def.id = existing.id.clone();
            return def;
        }

        let mut n = 0;
        let id = loop {
            let candidate = format!("unitSid_{n}");
            if !self.ctx.has_identifier(&candidate) {
                break candidate;
            }
            n += 1;
        };
        debug!("registering unit definition {id} as {}", def.pretty_print());
        def.id = Some(id);
        self.ctx.add_unit_definition(def.clone());
        def
    }

    fn walk(&self, node: &AstNode, expanding: &mut Vec<String>) -> Units {
        use NodeKind::*;
        match node.kind() {
            Integer | Real | RealE | Rational => match node.units() {
                Some(units) => match self.ctx.resolve_units(units) {
                    Some(def) => Units::declared(def),
                    None => Units::unknown(),
                },
                None => Units::bare_literal(),
            },
            Name => match node.name().and_then(|name| self.ctx.units_for(name)) {
                Some(def) => Units::declared(def),
                None => Units::unknown(),
            },
            NameTime => self.time_units(),
            NameAvogadro => Units::declared(UnitDefinition::new(
                None,
                vec![Unit::new(UnitKind::Mole).with_exponent(-1.0)],
            )),
            ConstantE | ConstantFalse | ConstantPi | ConstantTrue => Units::dimensionless(),

            Plus | LogicalAnd | LogicalOr | LogicalXor | LogicalImplies | LogicalNot
            | RelationalEq | RelationalGeq | RelationalGt | RelationalLeq | RelationalLt
            | RelationalNeq | FunctionMax | FunctionMin => {
                self.first_declared(node.children().iter(), expanding)
            }
            Minus => self.first_declared(node.children().iter(), expanding),
            Times => node
                .children()
                .iter()
                .map(|child| self.walk(child, expanding))
                .fold(Units::dimensionless(), |acc, units| Units {
                    def: UnitDefinition::multiply(&acc.def, &units.def),
                    undeclared: acc.undeclared.max(units.undeclared),
                }),
            Divide | FunctionQuotient => match node.children() {
                [numerator, denominator] => {
                    let numerator = self.walk(numerator, expanding);
                    let denominator = self.walk(denominator, expanding);
                    Units {
                        def: UnitDefinition::divide(&numerator.def, &denominator.def),
                        undeclared: numerator.undeclared.max(denominator.undeclared),
                    }
                }
                _ => Units::unknown(),
            },
            Power | FunctionPower => match node.children() {
                [base, exponent] => self.power(base, exponent, expanding),
                _ => Units::unknown(),
            },
            FunctionRoot => match node.children() {
                [radicand] => self.root(radicand, 2, expanding),
                [degree, radicand] => match constant_exponent(degree).and_then(|d| {
                    if d.fract() == 0.0 && d != 0.0 {
                        Some(d as i64)
                    } else {
                        None
                    }
                }) {
                    Some(degree) => self.root(radicand, degree, expanding),
                    None => Units::unknown(),
                },
                _ => Units::unknown(),
            },
            FunctionAbs | FunctionCeiling | FunctionFloor | FunctionRem | Semantics
            | QualifierBvar | QualifierLogbase | QualifierDegree | ConstructorOtherwise => {
                match node.child(0) {
                    Some(child) => self.walk(child, expanding),
                    None => Units::unknown(),
                }
            }
            FunctionDelay => match node.child(0) {
                // the delay time doesn't affect the result
                Some(child) => self.walk(child, expanding),
                None => Units::unknown(),
            },
            FunctionRateOf => match node.children() {
                [child] => {
                    let units = self.walk(child, expanding);
                    let time = self.time_units();
                    Units {
                        def: UnitDefinition::divide(&units.def, &time.def),
                        undeclared: units.undeclared.max(time.undeclared),
                    }
                }
                _ => Units::unknown(),
            },
            FunctionPiecewise => {
                let children = node.children();
                // values sit at even positions, and a trailing default
                let values = children
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| i % 2 == 0)
                    .map(|(_, child)| child);
                self.first_declared(values, expanding)
            }
            ConstructorPiece => match node.child(0) {
                Some(child) => self.walk(child, expanding),
                None => Units::unknown(),
            },
            Lambda => match node.body() {
                Some(body) => self.walk(body, expanding),
                None => Units::unknown(),
            },
            Function => self.user_function(node, expanding),
            kind if kinds::is_trigonometric(kind)
                || matches!(kind, FunctionExp | FunctionLn | FunctionLog | FunctionFactorial) =>
            {
                // the result is dimensionless whatever the argument is
                let undeclared = node
                    .children()
                    .iter()
                    .map(|child| self.walk(child, expanding).undeclared)
                    .max()
                    .unwrap_or_default();
                Units::dimensionless().with_undeclared(undeclared)
            }
            Extension(ext) => match self.plugins.and_then(|p| p.unit_rule(ext)) {
                Some(UnitRule::Dimensionless) => Units::dimensionless(),
                Some(UnitRule::FromChild(i)) => match node.child(i) {
                    Some(child) => self.walk(child, expanding),
                    None => Units::unknown(),
                },
                Some(UnitRule::Undeclared) | None => Units::unknown(),
            },
            _ => Units::unknown(),
        }
    }

    fn time_units(&self) -> Units {
        match self.ctx.time_units() {
            Some(def) => Units::declared(def),
            None => Units::unknown(),
        }
    }

    /// The units of the first operand whose units are fully declared.
    /// When there is one, anything undeclared in the other operands can
    /// be ignored.  Compatible but different units aren't reconciled.
    fn first_declared<'n>(
        &self,
        operands: impl Iterator<Item = &'n AstNode>,
        expanding: &mut Vec<String>,
    ) -> Units {
        let operands: Vec<Units> = operands.map(|op| self.walk(op, expanding)).collect();
        let Some(first) = operands.first() else {
            return Units::unknown();
        };
        let worst = operands
            .iter()
            .map(|units| units.undeclared)
            .max()
            .unwrap_or_default();

        match operands.iter().find(|units| units.undeclared == Undeclared::No) {
            Some(declared) => {
                let undeclared = worst.min(Undeclared::Ignorable);
                Units::declared(declared.def.clone()).with_undeclared(undeclared)
            }
            None => first.clone().with_undeclared(worst),
        }
    }

    fn power(&self, base: &AstNode, exponent: &AstNode, expanding: &mut Vec<String>) -> Units {
        let base = self.walk(base, expanding);
        match constant_exponent(exponent) {
            Some(exponent) => Units {
                def: base.def.pow(exponent),
                undeclared: base.undeclared,
            },
            // a dimensionless base stays dimensionless whatever the exponent
            None if base.undeclared == Undeclared::No && base.def.is_dimensionless() => {
                let exponent = self.walk(exponent, expanding);
                Units::dimensionless().with_undeclared(exponent.undeclared)
            }
            None => Units::unknown(),
        }
    }

    fn root(&self, radicand: &AstNode, degree: i64, expanding: &mut Vec<String>) -> Units {
        let radicand = self.walk(radicand, expanding);
        Units {
            def: radicand.def.pow(1.0 / degree as f64),
            undeclared: radicand.undeclared,
        }
    }

    fn user_function(&self, node: &AstNode, expanding: &mut Vec<String>) -> Units {
        let Some(name) = node.name() else {
            return Units::unknown();
        };
        if expanding.iter().any(|f| f == name) {
            // recursive definitions have no units to find
            return Units::unknown();
        }
        let Some(lambda) = self.ctx.function_definition(name) else {
            return Units::unknown();
        };
        let Some(body) = lambda.body() else {
            return Units::unknown();
        };
        if lambda.num_bvars() != node.num_children() {
            return Units::unknown();
        }

        let mut body = body.deep_copy();
        for (bvar, arg) in lambda.bound_variables().iter().zip(node.children()) {
            if let Some(bvar) = bvar.name() {
                body.replace_argument(bvar, arg);
            }
        }

        expanding.push(name.to_owned());
        let units = self.walk(&body, expanding);
        expanding.pop();
        units
    }
}

/// The value of an exponent that can be applied to units: an integer,
/// a whole real, a rational, or the negation of one of those.
fn constant_exponent(node: &AstNode) -> Option<f64> {
    match node.kind() {
        NodeKind::Integer | NodeKind::Real | NodeKind::RealE => {
            node.integral_value().map(|n| n as f64)
        }
        NodeKind::Rational => match (node.numerator(), node.denominator()) {
            (Some(_), Some(0)) => None,
            (Some(n), Some(d)) => Some(n as f64 / d as f64),
            _ => None,
        },
        NodeKind::Minus if node.num_children() == 1 => {
            node.child(0).and_then(constant_exponent).map(|e| -e)
        }
        _ => None,
    }
}

/// Infers the units of `node` against `ctx`.
pub fn infer_units<C: UnitContext>(node: &AstNode, ctx: &mut C) -> InferredUnits {
    UnitInferer::new(ctx).infer(node)
}
