// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The model-side collaborators of the math core: who owns an
//! expression, which identifiers exist and what units they carry.

use std::collections::BTreeMap;
use std::fmt;

use crate::ast::AstNode;
use crate::common::{Error, ErrorCode, ErrorKind, Result};
use crate::kinds::NodeKind;
use crate::units::{UnitDefinition, UnitKind};

/// An SBML element that can own an expression.
pub trait SbmlElement: fmt::Debug + Send + Sync {
    fn element_name(&self) -> &str;

    fn id(&self) -> Option<&str> {
        None
    }
}

/// Unit declarations consulted, and extended, by unit inference.
pub trait UnitContext {
    /// The declared units of the identifier `id`.
    fn units_for(&self, id: &str) -> Option<UnitDefinition>;

    /// Resolves a units reference, as found in a declaration or on a
    /// number literal.
    fn resolve_units(&self, units: &str) -> Option<UnitDefinition>;

    /// The units of the `time` csymbol.
    fn time_units(&self) -> Option<UnitDefinition>;

    /// The lambda of the function definition `id`.
    fn function_definition(&self, id: &str) -> Option<&AstNode>;

    fn unit_definitions(&self) -> &[UnitDefinition];

    /// Registers a definition synthesized during inference.
    fn add_unit_definition(&mut self, def: UnitDefinition);

    /// Whether `id` names anything at all in the model.
    fn has_identifier(&self, id: &str) -> bool;
}

/// A minimal model: unit definitions, identifiers with optional unit
/// declarations, and function definitions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Model {
    id: Option<String>,
    unit_definitions: Vec<UnitDefinition>,
    // identifier -> declared units, a unit definition id or a base unit
    declarations: BTreeMap<String, Option<String>>,
    function_definitions: BTreeMap<String, AstNode>,
    time_units: Option<String>,
}

impl Model {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_owned());
        self
    }

    pub fn with_unit_definition(mut self, def: UnitDefinition) -> Self {
        self.unit_definitions.push(def);
        self
    }

    /// Declares the identifier `id`, optionally with units.
    pub fn with_declaration(mut self, id: &str, units: Option<&str>) -> Self {
        self.declare(id, units);
        self
    }

    pub fn declare(&mut self, id: &str, units: Option<&str>) {
        self.declarations
            .insert(id.to_owned(), units.map(|units| units.to_owned()));
    }

    /// Adds the function definition `id`; `lambda` must be a lambda node.
    pub fn with_function_definition(mut self, id: &str, lambda: AstNode) -> Result<Self> {
        if lambda.kind() != NodeKind::Lambda {
            return Err(Error::new(
                ErrorKind::Units,
                ErrorCode::InvalidObject,
                Some(format!("function definition '{id}' is not a lambda")),
            ));
        }
        self.function_definitions.insert(id.to_owned(), lambda);
        Ok(self)
    }

    pub fn with_time_units(mut self, units: &str) -> Self {
        self.time_units = Some(units.to_owned());
        self
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.declarations
            .keys()
            .chain(self.function_definitions.keys())
            .map(|id| id.as_str())
    }
}

impl SbmlElement for Model {
    fn element_name(&self) -> &str {
        "model"
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

impl UnitContext for Model {
    fn units_for(&self, id: &str) -> Option<UnitDefinition> {
        self.declarations
            .get(id)
            .and_then(|units| units.as_deref())
            .and_then(|units| self.resolve_units(units))
    }

    // a unit definition in this model, or else one of the base kinds
    fn resolve_units(&self, units: &str) -> Option<UnitDefinition> {
        self.unit_definitions
            .iter()
            .find(|def| def.id.as_deref() == Some(units))
            .cloned()
            .or_else(|| UnitKind::from_name(units).map(UnitDefinition::from_kind))
    }

    fn time_units(&self) -> Option<UnitDefinition> {
        self.time_units
            .as_deref()
            .and_then(|units| self.resolve_units(units))
    }

    fn function_definition(&self, id: &str) -> Option<&AstNode> {
        self.function_definitions.get(id)
    }

    fn unit_definitions(&self) -> &[UnitDefinition] {
        &self.unit_definitions
    }

    fn add_unit_definition(&mut self, def: UnitDefinition) {
        self.unit_definitions.push(def);
    }

    fn has_identifier(&self, id: &str) -> bool {
        self.declarations.contains_key(id)
            || self.function_definitions.contains_key(id)
            || self
                .unit_definitions
                .iter()
                .any(|def| def.id.as_deref() == Some(id))
            || self.id.as_deref() == Some(id)
    }
}
