// Copyright 2025 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

#![forbid(unsafe_code)]

#[macro_use]
pub mod common;
pub mod arrays;
pub mod ast;
pub mod formatter;
pub mod kinds;
pub mod mathml;
pub mod model;
pub mod parser;
pub mod plugin;
pub mod settings;
mod token;
pub mod units;

#[cfg(test)]
mod formula_proptest;
#[cfg(test)]
mod testutils;

pub use self::arrays::ArraysPlugin;
pub use self::ast::{AstNode, NodeData};
pub use self::common::{Error, ErrorCode, ErrorKind, ErrorLog, FormulaError, Result};
pub use self::formatter::{formula_to_l3_string, formula_to_l3_string_with_settings, formula_to_string};
pub use self::kinds::{ExtensionKind, NodeKind};
pub use self::mathml::{read_mathml, read_mathml_with_plugins, write_mathml, write_mathml_with_plugins};
pub use self::model::{Model, SbmlElement, UnitContext};
pub use self::parser::{
    parse_formula, parse_l3_formula, parse_l3_formula_logged, parse_l3_formula_with_settings,
};
pub use self::plugin::{AstPlugin, ExtensionPayload, PluginRegistry, UnitRule};
pub use self::settings::{ParseLogType, ParserSettings};
pub use self::units::{infer_units, InferredUnits, Unit, UnitDefinition, UnitInferer, UnitKind};
